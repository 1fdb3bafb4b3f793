//! File-backed recovery log.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageIdentity, Result, TransactionId};
use crate::recovery::RecoveryLog;
use crate::storage::page::Page;

/// Bytes of the record header: payload length then CRC32 of the payload.
const HEADER_SIZE: usize = 8;

/// Bytes of a record payload: tid, table id, page number, two page images.
const PAYLOAD_SIZE: usize = 8 + 4 + 4 + 2 * PAGE_SIZE;

/// A page update read back from the log.
#[derive(Debug, PartialEq, Eq)]
pub struct LogRecord {
    /// Numeric value of the writing transaction's handle.
    pub tid: u64,
    pub page: PageIdentity,
    pub before: Page,
    pub after: Page,
}

/// Append-only log file of page images.
///
/// # Record Layout
/// ```text
/// Offset  Size       Field
/// ------  ---------  -----
/// 0       4          payload length (little-endian)
/// 4       4          CRC32 of the payload (little-endian)
/// 8       8          transaction id
/// 16      4          table id
/// 20      4          page number
/// 24      PAGE_SIZE  before-image
/// ...     PAGE_SIZE  after-image
/// ```
pub struct FileLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileLog {
    /// Open the log at `path` for appending, creating it if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Read back every record in the log, oldest first.
    ///
    /// Buffered records are flushed first, so they are included.
    ///
    /// # Errors
    /// - `Error::CorruptLog` for a truncated record or checksum mismatch
    pub fn records(&self) -> Result<Vec<LogRecord>> {
        self.writer.lock().flush()?;

        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        let mut offset = 0u64;

        loop {
            let mut header = [0u8; HEADER_SIZE];
            match read_full(&mut reader, &mut header)? {
                0 => break,
                HEADER_SIZE => {}
                _ => return Err(Error::CorruptLog { offset }),
            }

            let len = le_u32(&header[0..4]) as usize;
            let checksum = le_u32(&header[4..8]);
            if len != PAYLOAD_SIZE {
                return Err(Error::CorruptLog { offset });
            }

            let mut payload = vec![0u8; len];
            if read_full(&mut reader, &mut payload)? != len
                || crc32fast::hash(&payload) != checksum
            {
                return Err(Error::CorruptLog { offset });
            }

            records.push(decode(&payload));
            offset += (HEADER_SIZE + len) as u64;
        }

        Ok(records)
    }
}

impl RecoveryLog for FileLog {
    fn log_write(
        &self,
        tid: TransactionId,
        pid: PageIdentity,
        before: &Page,
        after: &Page,
    ) -> Result<()> {
        let mut payload = Vec::with_capacity(PAYLOAD_SIZE);
        payload.extend_from_slice(&tid.as_u64().to_le_bytes());
        payload.extend_from_slice(&pid.table_id.to_le_bytes());
        payload.extend_from_slice(&pid.page_no.to_le_bytes());
        payload.extend_from_slice(before.as_slice());
        payload.extend_from_slice(after.as_slice());

        let mut writer = self.writer.lock();
        writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
        writer.write_all(&payload)?;

        tracing::debug!(%tid, page = %pid, "logged page images");
        Ok(())
    }

    fn force(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(())
    }
}

/// Fill `buf` as far as the input allows; returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(bytes);
    u32::from_le_bytes(word)
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(bytes);
    u64::from_le_bytes(word)
}

/// Decode a payload whose length and checksum were already verified.
fn decode(payload: &[u8]) -> LogRecord {
    let images = &payload[16..];
    LogRecord {
        tid: le_u64(&payload[0..8]),
        page: PageIdentity::new(le_u32(&payload[8..12]), le_u32(&payload[12..16])),
        before: Page::from_bytes(&images[..PAGE_SIZE]),
        after: Page::from_bytes(&images[PAGE_SIZE..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn page_with(byte: u8) -> Page {
        let mut page = Page::new();
        page.as_mut_slice()[0] = byte;
        page
    }

    #[test]
    fn test_empty_log() {
        let dir = tempdir().unwrap();
        let log = FileLog::open(dir.path().join("wal.log")).unwrap();
        assert!(log.records().unwrap().is_empty());
    }

    #[test]
    fn test_records_read_back_in_order() {
        let dir = tempdir().unwrap();
        let log = FileLog::open(dir.path().join("wal.log")).unwrap();
        let tid = TransactionId::new();

        log.log_write(tid, PageIdentity::new(1, 0), &page_with(1), &page_with(2))
            .unwrap();
        log.log_write(tid, PageIdentity::new(1, 5), &page_with(3), &page_with(4))
            .unwrap();
        log.force().unwrap();

        let records = log.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tid, tid.as_u64());
        assert_eq!(records[0].page, PageIdentity::new(1, 0));
        assert_eq!(records[0].before, page_with(1));
        assert_eq!(records[0].after, page_with(2));
        assert_eq!(records[1].page, PageIdentity::new(1, 5));
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let tid = TransactionId::new();

        {
            let log = FileLog::open(&path).unwrap();
            log.log_write(tid, PageIdentity::new(1, 0), &page_with(1), &page_with(2))
                .unwrap();
            log.force().unwrap();
        }

        let log = FileLog::open(&path).unwrap();
        log.log_write(tid, PageIdentity::new(1, 1), &page_with(1), &page_with(2))
            .unwrap();
        assert_eq!(log.records().unwrap().len(), 2);
    }

    #[test]
    fn test_corruption_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let tid = TransactionId::new();

        {
            let log = FileLog::open(&path).unwrap();
            log.log_write(tid, PageIdentity::new(1, 0), &page_with(1), &page_with(2))
                .unwrap();
            log.force().unwrap();
        }

        // Flip a byte inside the after-image
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let log = FileLog::open(&path).unwrap();
        assert!(matches!(log.records(), Err(Error::CorruptLog { offset: 0 })));
    }

    #[test]
    fn test_truncated_record_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let tid = TransactionId::new();

        {
            let log = FileLog::open(&path).unwrap();
            log.log_write(tid, PageIdentity::new(1, 0), &page_with(1), &page_with(2))
                .unwrap();
            log.force().unwrap();
        }

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();

        let log = FileLog::open(&path).unwrap();
        assert!(matches!(log.records(), Err(Error::CorruptLog { .. })));
    }
}
