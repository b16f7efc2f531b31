//! Write-ahead log of collection rows.
//!
//! Frame layout: `[len: u32 LE][crc32: u32 LE][bincode(StoredRow)]`. Every
//! append is fsynced before it returns. Replay yields rows up to the first
//! frame that is incomplete or fails its checksum; the bytes after that point
//! must be cut with [`WriteAheadLog::discard_tail`] before appending again.

use crate::collection::StoredRow;
use crate::error::{ClassifierError, Result};
use crate::persistence::serialization;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

const HEADER_LEN: usize = 8;

enum Frame {
    Row(StoredRow, u64),
    End,
    Torn(&'static str),
}

fn encode_frame(row: &StoredRow) -> Result<Vec<u8>> {
    let payload = serialization::to_bincode(row)?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

fn read_frame(reader: &mut impl Read) -> Result<Frame> {
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header[..4]) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(Frame::End),
        Err(e) => return Err(ClassifierError::IoError(e)),
    }
    if reader.read_exact(&mut header[4..]).is_err() {
        return Ok(Frame::Torn("incomplete header"));
    }

    let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    let mut payload = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut payload)?;
    if payload.len() < len {
        return Ok(Frame::Torn("incomplete payload"));
    }
    if crc32fast::hash(&payload) != crc {
        return Ok(Frame::Torn("checksum mismatch"));
    }
    match serialization::from_bincode::<StoredRow>(&payload) {
        Ok(row) => Ok(Frame::Row(row, (HEADER_LEN + len) as u64)),
        Err(_) => Ok(Frame::Torn("undecodable payload")),
    }
}

/// Rows recovered from the log and the length of the intact prefix.
#[derive(Debug)]
pub struct Replay {
    pub rows: Vec<StoredRow>,
    pub valid_len: u64,
}

/// Append-only log file.
pub struct WriteAheadLog {
    path: PathBuf,
    file: File,
}

impl WriteAheadLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    /// Write one row as a single frame and fsync.
    pub fn append(&mut self, row: &StoredRow) -> Result<()> {
        self.file.write_all(&encode_frame(row)?)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Every intact row, oldest first.
    pub fn replay(&self) -> Result<Replay> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut rows = Vec::new();
        let mut valid_len = 0u64;
        loop {
            match read_frame(&mut reader)? {
                Frame::Row(row, frame_len) => {
                    rows.push(row);
                    valid_len += frame_len;
                }
                Frame::End => break,
                Frame::Torn(reason) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        recovered = rows.len(),
                        reason,
                        "ignoring damaged WAL tail"
                    );
                    break;
                }
            }
        }
        Ok(Replay { rows, valid_len })
    }

    /// Cut everything after the intact prefix so new frames follow the last
    /// good one. Returns the number of bytes dropped.
    pub fn discard_tail(&mut self, valid_len: u64) -> Result<u64> {
        let len = self.file.metadata()?.len();
        if len <= valid_len {
            return Ok(0);
        }
        self.file.set_len(valid_len)?;
        self.file.sync_all()?;
        Ok(len - valid_len)
    }

    /// Empty the log once its rows are covered by a snapshot.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        Ok(())
    }
}
