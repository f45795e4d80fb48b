use crate::error::{Error, Result};

/// Per-query hydration flags, consulted after IDs have been resolved.
///
/// Deletes run with a writable decorator, which refuses to be asked for
/// payloads or labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentDecorator {
    include_data: bool,
    include_labels: bool,
    writable: bool,
}

impl DocumentDecorator {
    pub fn writable() -> Self {
        Self {
            writable: true,
            ..Self::default()
        }
    }

    pub fn include_data(&mut self) -> Result<()> {
        if self.writable {
            return Err(Error::internal("cannot include data in document"));
        }
        self.include_data = true;
        Ok(())
    }

    pub fn include_labels(&mut self) -> Result<()> {
        if self.writable {
            return Err(Error::internal("cannot include labels in document"));
        }
        self.include_labels = true;
        Ok(())
    }

    pub fn wants_data(&self) -> bool {
        self.include_data
    }

    pub fn wants_labels(&self) -> bool {
        self.include_labels
    }
}
