//! the byte-buffer boundary between the conveyor and whatever produces
//! raw binlog bytes
use crate::error::{Error, Result};
use docbridge_core::{BINLOG_MAGIC, EVENT_LEN_OFFSET, LOG_EVENT_HEADER_LEN};
use log::warn;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// One framed message per `fetch` call. `Ok(None)` ends the current
/// stream: the live transport's empty packet (the caller reconnects) or a
/// file running out of events (the caller terminates).
pub trait ByteTransport {
    fn open(&mut self, file: &str, start_pos: u32) -> Result<()>;
    fn fetch(&mut self) -> Result<Option<&[u8]>>;
    fn close(&mut self);
}

/// Reads a binlog file from disk, one event window at a time.
///
/// The event buffer is a growth-only allocation sized to the largest event
/// seen so far; each `fetch` invalidates the previous window.
pub struct FileTransport {
    path: PathBuf,
    file: File,
    buf: Vec<u8>,
}

impl FileTransport {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if u32::from_le_bytes(magic) != BINLOG_MAGIC {
            return Err(Error::Binlog(format!(
                "'{}' is not a binlog file",
                path.display()
            )));
        }
        Ok(FileTransport {
            path,
            file,
            buf: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteTransport for FileTransport {
    fn open(&mut self, _file: &str, start_pos: u32) -> Result<()> {
        self.file.seek(SeekFrom::Start(start_pos as u64))?;
        Ok(())
    }

    fn fetch(&mut self) -> Result<Option<&[u8]>> {
        let mut header = [0u8; LOG_EVENT_HEADER_LEN];
        match read_or_eof(&mut self.file, &mut header)? {
            Filled::Eof => return Ok(None),
            Filled::Short => {
                // a truncated trailing event is the normal end of a file
                // that is still being written
                warn!("truncated event header at tail of {}", self.path.display());
                return Ok(None);
            }
            Filled::Full => {}
        }
        let size = u32::from_le_bytes([
            header[EVENT_LEN_OFFSET],
            header[EVENT_LEN_OFFSET + 1],
            header[EVENT_LEN_OFFSET + 2],
            header[EVENT_LEN_OFFSET + 3],
        ]) as usize;
        if size < LOG_EVENT_HEADER_LEN {
            warn!(
                "event at tail of {} declares impossible size {}",
                self.path.display(),
                size
            );
            return Ok(None);
        }

        self.buf.clear();
        self.buf.extend_from_slice(&header);
        self.buf.resize(size, 0);
        match read_or_eof(&mut self.file, &mut self.buf[LOG_EVENT_HEADER_LEN..])? {
            Filled::Full => Ok(Some(&self.buf[..])),
            Filled::Eof | Filled::Short => {
                warn!("truncated event body at tail of {}", self.path.display());
                Ok(None)
            }
        }
    }

    fn close(&mut self) {}
}

enum Filled {
    Full,
    Eof,
    Short,
}

fn read_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<Filled> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 if filled == 0 => return Ok(Filled::Eof),
            0 => return Ok(Filled::Short),
            n => filled += n,
        }
    }
    Ok(Filled::Full)
}
