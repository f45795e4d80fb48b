//! Write-Ahead Log (WAL) for durability
//!
//! Append-only log of committed write transactions. Each entry carries the
//! ordered bucket operations of one transaction, so replaying the log in
//! sequence order rebuilds the store exactly as it was committed.

use crate::error::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};
use crc32fast::Hasher;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

const MAGIC: &[u8] = b"DVAULT01";
const MAX_ENTRY_SIZE: usize = 256 * 1024 * 1024;
pub const DEFAULT_SEGMENT_SIZE: u64 = 64 * 1024 * 1024; // 64MB segments

const OP_CREATE_BUCKET: u8 = 1;
const OP_PUT: u8 = 2;
const OP_DELETE: u8 = 3;

/// One committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub sequence: u64,
    pub timestamp: u64,
    pub ops: Vec<Operation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateBucket { bucket: String },
    Put { bucket: String, key: Vec<u8>, value: Vec<u8> },
    Delete { bucket: String, key: Vec<u8> },
}

pub struct WriteAheadLog {
    dir: PathBuf,
    segment_size: u64,
    sync: bool,
    current: Mutex<Segment>,
    sequence: AtomicU64,
}

struct Segment {
    id: u64,
    file: File,
    size: u64,
}

impl WriteAheadLog {
    pub fn open(dir: impl AsRef<Path>, segment_size: u64, sync: bool) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let segments = list_segments(&dir)?;
        let mut next_seq = 0;
        for (_, path) in &segments {
            if let Some(seq) = Self::last_sequence(path)? {
                next_seq = next_seq.max(seq + 1);
            }
        }
        let segment = match segments.last() {
            Some((id, _)) => Segment::open_tail(&dir, *id)?,
            None => Segment::create(&dir, 0)?,
        };
        debug!(
            "opened WAL at {} (segment {}, next sequence {})",
            dir.display(),
            segment.id,
            next_seq
        );

        Ok(Self {
            dir,
            segment_size,
            sync,
            current: Mutex::new(segment),
            sequence: AtomicU64::new(next_seq),
        })
    }

    /// Append a committed transaction and return its sequence number.
    pub fn append(&self, ops: Vec<Operation>) -> Result<u64> {
        let mut segment = self.current.lock();
        let sequence = self.sequence.load(Ordering::SeqCst);
        let entry = LogEntry {
            sequence,
            timestamp: chrono::Utc::now().timestamp_millis() as u64,
            ops,
        };
        let encoded = encode_entry(&entry)?;

        if segment.size > MAGIC.len() as u64
            && segment.size + encoded.len() as u64 > self.segment_size
        {
            let next = Segment::create(&self.dir, segment.id + 1)?;
            debug!("rotated WAL to segment {}", next.id);
            *segment = next;
        }

        segment.discard_torn_tail()?;
        if let Err(e) = segment.write(&encoded, self.sync) {
            warn!("WAL append to segment {} failed: {}", segment.id, e);
            segment.file.set_len(segment.size)?;
            return Err(e.into());
        }
        segment.size += encoded.len() as u64;
        self.sequence.store(sequence + 1, Ordering::SeqCst);

        Ok(sequence)
    }

    /// Read entries with a sequence at or after `start_seq`, in log order.
    pub fn read_from(&self, start_seq: u64) -> Result<Vec<LogEntry>> {
        let mut entries = Vec::new();

        for (_, path) in list_segments(&self.dir)? {
            let mut reader = BufReader::new(File::open(&path)?);

            let mut magic = [0u8; 8];
            if reader.read_exact(&mut magic).is_err() {
                continue;
            }
            if magic != MAGIC {
                return Err(Error::Invalid(format!(
                    "invalid WAL segment {}",
                    path.display()
                )));
            }

            while let Ok((entry, _)) = decode_entry(&mut reader) {
                if entry.sequence >= start_seq {
                    entries.push(entry);
                }
            }
        }

        Ok(entries)
    }

    /// Sequence number the next append will receive.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    pub fn current_segment(&self) -> u64 {
        self.current.lock().id
    }

    fn last_sequence(path: &Path) -> Result<Option<u64>> {
        let mut reader = BufReader::new(File::open(path)?);
        if reader.seek(SeekFrom::Start(MAGIC.len() as u64)).is_err() {
            return Ok(None);
        }
        let mut last = None;
        while let Ok((entry, _)) = decode_entry(&mut reader) {
            last = Some(entry.sequence);
        }
        Ok(last)
    }
}

fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("wal-{:08}.log", id))
}

/// Segment ids and paths found in `dir`, in ascending id order.
fn list_segments(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let mut segments = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(id) = name
            .strip_prefix("wal-")
            .and_then(|rest| rest.strip_suffix(".log"))
            .and_then(|id| id.parse::<u64>().ok())
        {
            segments.push((id, entry.path()));
        }
    }
    segments.sort_by_key(|(id, _)| *id);
    Ok(segments)
}

impl Segment {
    fn create(dir: &Path, id: u64) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(segment_path(dir, id))?;

        if file.metadata()?.len() == 0 {
            file.write_all(MAGIC)?;
            file.sync_data()?;
        }

        let size = file.metadata()?.len();
        Ok(Self { id, file, size })
    }

    fn write(&mut self, bytes: &[u8], sync: bool) -> std::io::Result<()> {
        self.file.write_all(bytes)?;
        if sync {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Cut anything past the last acknowledged entry, such as the remains of
    /// a failed write, so the next entry lands on a decodable boundary.
    fn discard_torn_tail(&mut self) -> Result<()> {
        let len = self.file.metadata()?.len();
        if len > self.size {
            warn!(
                "discarding {} unacknowledged bytes from WAL segment {}",
                len - self.size,
                self.id
            );
            self.file.set_len(self.size)?;
        }
        Ok(())
    }

    /// Reopen the newest segment, cutting off a torn or corrupt tail so new
    /// entries are never appended behind unreadable bytes.
    fn open_tail(dir: &Path, id: u64) -> Result<Self> {
        let path = segment_path(dir, id);
        let len = std::fs::metadata(&path)?.len();
        let mut valid = MAGIC.len() as u64;
        if len >= valid {
            let mut reader = BufReader::new(File::open(&path)?);
            reader.seek(SeekFrom::Start(valid))?;
            while let Ok((_, consumed)) = decode_entry(&mut reader) {
                valid += consumed;
            }
        }
        if len > valid {
            warn!(
                "truncating {} trailing bytes from WAL segment {}",
                len - valid,
                path.display()
            );
            OpenOptions::new().write(true).open(&path)?.set_len(valid)?;
        } else if len < valid {
            // Not even a full magic header survived.
            std::fs::remove_file(&path)?;
        }
        Self::create(dir, id)
    }
}

fn put_bytes(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

fn encode_entry(entry: &LogEntry) -> Result<Vec<u8>> {
    let mut buf = BytesMut::new();

    buf.put_u64(entry.sequence);
    buf.put_u64(entry.timestamp);
    buf.put_u32(entry.ops.len() as u32);

    for op in &entry.ops {
        match op {
            Operation::CreateBucket { bucket } => {
                buf.put_u8(OP_CREATE_BUCKET);
                put_bytes(&mut buf, bucket.as_bytes());
            }
            Operation::Put { bucket, key, value } => {
                buf.put_u8(OP_PUT);
                put_bytes(&mut buf, bucket.as_bytes());
                put_bytes(&mut buf, key);
                put_bytes(&mut buf, value);
            }
            Operation::Delete { bucket, key } => {
                buf.put_u8(OP_DELETE);
                put_bytes(&mut buf, bucket.as_bytes());
                put_bytes(&mut buf, key);
            }
        }
    }

    if buf.len() + 4 > MAX_ENTRY_SIZE {
        return Err(Error::Invalid("transaction too large for the WAL".to_string()));
    }

    // Length prefix and CRC
    let data = buf.freeze();
    let mut hasher = Hasher::new();
    hasher.update(&data);
    let crc = hasher.finalize();

    let mut result = BytesMut::with_capacity(data.len() + 8);
    result.put_u32(data.len() as u32 + 4); // Include CRC in length
    result.put(data);
    result.put_u32(crc);

    Ok(result.to_vec())
}

/// Decode one entry, returning it with the number of bytes consumed.
fn decode_entry<R: Read>(reader: &mut R) -> Result<(LogEntry, u64)> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if !(4..=MAX_ENTRY_SIZE).contains(&len) {
        return Err(corrupt("bad entry length"));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;

    let (data, crc) = buf.split_at(len - 4);
    let crc = u32::from_be_bytes([crc[0], crc[1], crc[2], crc[3]]);
    let mut hasher = Hasher::new();
    hasher.update(data);
    if hasher.finalize() != crc {
        return Err(corrupt("CRC mismatch"));
    }

    let mut data = data;
    let sequence = take_u64(&mut data)?;
    let timestamp = take_u64(&mut data)?;
    let count = take_u32(&mut data)? as usize;

    let mut ops = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let tag = take_u8(&mut data)?;
        let bucket = String::from_utf8(take_bytes(&mut data)?)
            .map_err(|_| corrupt("bucket name is not UTF-8"))?;
        let op = match tag {
            OP_CREATE_BUCKET => Operation::CreateBucket { bucket },
            OP_PUT => {
                let key = take_bytes(&mut data)?;
                let value = take_bytes(&mut data)?;
                Operation::Put { bucket, key, value }
            }
            OP_DELETE => {
                let key = take_bytes(&mut data)?;
                Operation::Delete { bucket, key }
            }
            _ => return Err(corrupt("unknown operation type")),
        };
        ops.push(op);
    }

    Ok((
        LogEntry {
            sequence,
            timestamp,
            ops,
        },
        len as u64 + 4,
    ))
}

fn corrupt(what: &str) -> Error {
    Error::Invalid(format!("corrupt WAL entry: {}", what))
}

fn take_u8(data: &mut &[u8]) -> Result<u8> {
    if data.remaining() < 1 {
        return Err(corrupt("truncated entry"));
    }
    Ok(data.get_u8())
}

fn take_u32(data: &mut &[u8]) -> Result<u32> {
    if data.remaining() < 4 {
        return Err(corrupt("truncated entry"));
    }
    Ok(data.get_u32())
}

fn take_u64(data: &mut &[u8]) -> Result<u64> {
    if data.remaining() < 8 {
        return Err(corrupt("truncated entry"));
    }
    Ok(data.get_u64())
}

fn take_bytes(data: &mut &[u8]) -> Result<Vec<u8>> {
    let len = take_u32(data)? as usize;
    if data.remaining() < len {
        return Err(corrupt("truncated entry"));
    }
    let out = data[..len].to_vec();
    data.advance(len);
    Ok(out)
}
