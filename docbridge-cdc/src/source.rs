//! stage one: raw event windows out of a transport
use crate::conn::DbTransport;
use crate::error::{Error, Result};
use crate::transport::{ByteTransport, FileTransport};
use docbridge_core::event::{Event, EventCodec, FormatDescription, LogEventType};
use docbridge_core::{EVENT_TYPE_OFFSET, LOG_EVENT_HEADER_LEN, LOG_POS_OFFSET};
use log::{debug, info};
use std::path::Path;

/// position where events start, right behind the file magic
const BIN_LOG_HEADER_SIZE: u32 = 4;

/// Produces successive event windows and keeps the stream well-framed.
///
/// Rotate and format description events are processed here before they are
/// handed up: a rotate retargets `(file, position)` and resets the format
/// state for the next file, a format description replaces the state. The
/// consumer still sees both events.
///
/// The returned window lives in a reusable buffer owned by this source and
/// is only valid until the next call to [`ByteSource::next`].
pub struct ByteSource<T> {
    transport: T,
    codec: EventCodec,
    fde: FormatDescription,
    current_file: String,
    next_pos: u32,
    /// live sessions reconnect on an empty fetch, files just end
    reconnect: bool,
    opened: bool,
    buf: Vec<u8>,
    handler: Option<Box<dyn FnMut(&[u8])>>,
}

impl ByteSource<DbTransport> {
    /// follow a live replication session, starting at the server's oldest
    /// binlog
    pub fn from_db(host: &str, user: &str, password: &str, db: &str, port: u16) -> Self {
        ByteSource::new(DbTransport::new(host, user, password, db, port), true)
    }
}

impl ByteSource<FileTransport> {
    /// read one recorded binlog file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(ByteSource::new(FileTransport::new(path)?, false))
    }
}

impl<T: ByteTransport> ByteSource<T> {
    pub fn new(transport: T, reconnect: bool) -> Self {
        ByteSource {
            transport,
            codec: EventCodec::new(),
            fde: FormatDescription::default(),
            current_file: String::new(),
            next_pos: BIN_LOG_HEADER_SIZE,
            reconnect,
            opened: false,
            buf: Vec::new(),
            handler: None,
        }
    }

    /// observation hook, fired for every window before it is handed up
    pub fn set_handler(&mut self, handler: Box<dyn FnMut(&[u8])>) {
        self.handler = Some(handler);
    }

    /// format state governing the events currently being framed
    pub fn format_state(&self) -> &FormatDescription {
        &self.fde
    }

    pub fn current_file(&self) -> &str {
        &self.current_file
    }

    pub fn next_pos(&self) -> u32 {
        self.next_pos
    }

    /// next event window together with the format state to decode it under
    pub fn next(&mut self) -> Result<Option<(&[u8], &FormatDescription)>> {
        loop {
            if !self.opened {
                self.transport.open(&self.current_file, self.next_pos)?;
                self.opened = true;
            }
            match self.transport.fetch()? {
                Some(window) => {
                    self.buf.clear();
                    self.buf.extend_from_slice(window);
                }
                None => {
                    if !self.reconnect {
                        return Ok(None);
                    }
                    info!(
                        "stream ended, reconnecting at {}:{}",
                        self.current_file, self.next_pos
                    );
                    self.transport.close();
                    self.opened = false;
                    continue;
                }
            }
            self.process_window()?;
            if let Some(handler) = &mut self.handler {
                handler(&self.buf);
            }
            return Ok(Some((&self.buf[..], &self.fde)));
        }
    }

    /// keep framing state in step with the event about to be handed up
    fn process_window(&mut self) -> Result<()> {
        if self.buf.len() < LOG_EVENT_HEADER_LEN {
            return Err(Error::Binlog(format!(
                "short event ({} bytes) in {} at {}",
                self.buf.len(),
                self.current_file,
                self.next_pos
            )));
        }
        let event_type = LogEventType::from(self.buf[EVENT_TYPE_OFFSET]);
        let log_pos = u32::from_le_bytes([
            self.buf[LOG_POS_OFFSET],
            self.buf[LOG_POS_OFFSET + 1],
            self.buf[LOG_POS_OFFSET + 2],
            self.buf[LOG_POS_OFFSET + 3],
        ]);

        match event_type {
            LogEventType::RotateEvent => {
                let event = self.decode_self()?;
                if let Event::Rotate(rotate) = event {
                    info!(
                        "rotating to {}:{}",
                        rotate.data.new_log_ident, rotate.data.pos
                    );
                    self.current_file = rotate.data.new_log_ident;
                    self.next_pos = rotate.data.pos as u32;
                    self.fde = FormatDescription::default();
                    if self.reconnect {
                        // the next fetch must come from the new file
                        self.transport.close();
                        self.opened = false;
                    }
                }
            }
            LogEventType::FormatDescriptionEvent => {
                let event = self.decode_self()?;
                if let Event::FormatDescription(fde) = event {
                    debug!(
                        "format description from server {} (checksum: {})",
                        fde.data.server_version, fde.data.has_checksum
                    );
                    self.fde = fde.data;
                }
                if log_pos != 0 {
                    self.next_pos = log_pos;
                }
            }
            _ => {
                if log_pos != 0 {
                    self.next_pos = log_pos;
                } else {
                    debug!("virtual {:?} does not advance the position", event_type);
                }
            }
        }
        Ok(())
    }

    fn decode_self(&mut self) -> Result<Event> {
        self.codec
            .decode(&self.buf, &self.fde)
            .map_err(|e| Error::event(&self.current_file, self.next_pos, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbridge_core::util::checksum_crc32;
    use docbridge_core::ST_SERVER_VER_LEN;

    /// transport handing out a scripted list of windows
    struct ScriptedTransport {
        windows: Vec<Vec<u8>>,
        at: usize,
    }

    impl ScriptedTransport {
        fn new(windows: Vec<Vec<u8>>) -> Self {
            ScriptedTransport { windows, at: 0 }
        }
    }

    impl ByteTransport for ScriptedTransport {
        fn open(&mut self, _file: &str, _start_pos: u32) -> Result<()> {
            Ok(())
        }

        fn fetch(&mut self) -> Result<Option<&[u8]>> {
            if self.at == self.windows.len() {
                return Ok(None);
            }
            self.at += 1;
            Ok(Some(&self.windows[self.at - 1]))
        }

        fn close(&mut self) {}
    }

    fn frame(type_code: u8, payload: &[u8], log_pos: u32) -> Vec<u8> {
        let size = LOG_EVENT_HEADER_LEN + payload.len() + 4;
        let mut raw = Vec::new();
        raw.extend_from_slice(&0u32.to_le_bytes());
        raw.push(type_code);
        raw.extend_from_slice(&1u32.to_le_bytes());
        raw.extend_from_slice(&(size as u32).to_le_bytes());
        raw.extend_from_slice(&log_pos.to_le_bytes());
        raw.extend_from_slice(&0u16.to_le_bytes());
        raw.extend_from_slice(payload);
        let crc = checksum_crc32(&raw);
        raw.extend_from_slice(&crc.to_le_bytes());
        raw
    }

    fn rotate_window(file: &str, pos: u64) -> Vec<u8> {
        let mut payload = pos.to_le_bytes().to_vec();
        payload.extend_from_slice(file.as_bytes());
        frame(4, &payload, 0)
    }

    fn fde_window(version: &str, log_pos: u32) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&4u16.to_le_bytes());
        let mut server_version = [0u8; ST_SERVER_VER_LEN];
        server_version[..version.len()].copy_from_slice(version.as_bytes());
        payload.extend_from_slice(&server_version);
        payload.extend_from_slice(&0u32.to_le_bytes());
        payload.push(19);
        payload.extend_from_slice(&FormatDescription::default().post_header_len);
        payload.push(1);
        frame(15, &payload, log_pos)
    }

    #[test]
    fn test_rotate_and_fde_self_processing() -> Result<()> {
        let windows = vec![
            rotate_window("mysql-bin.000121", 16777220),
            fde_window("5.7.30-log", 0),
            frame(16, &1u64.to_le_bytes(), 2048),
        ];
        let mut source = ByteSource::new(ScriptedTransport::new(windows.clone()), false);

        // the rotate is handed up and retargets the source
        let (window, _) = source.next()?.unwrap();
        assert_eq!(windows[0], window);
        assert_eq!("mysql-bin.000121", source.current_file());
        assert_eq!(16777220, source.next_pos());

        // the format description replaces the default state
        let (_, fde) = source.next()?.unwrap();
        assert_eq!("5.7.30-log", fde.server_version);
        // its log_pos is zero, so the position stays put
        assert_eq!(16777220, source.next_pos());

        // an ordinary event advances the position
        source.next()?.unwrap();
        assert_eq!(2048, source.next_pos());

        assert!(source.next()?.is_none());
        Ok(())
    }

    #[test]
    fn test_short_window_is_fatal() {
        let mut source = ByteSource::new(ScriptedTransport::new(vec![vec![1, 2, 3]]), false);
        assert!(matches!(source.next(), Err(Error::Binlog(_))));
    }

    #[test]
    fn test_handler_sees_every_window() -> Result<()> {
        use std::cell::RefCell;
        use std::rc::Rc;

        let windows = vec![
            frame(16, &1u64.to_le_bytes(), 100),
            frame(16, &2u64.to_le_bytes(), 200),
        ];
        let mut source = ByteSource::new(ScriptedTransport::new(windows), false);
        let count = Rc::new(RefCell::new(0usize));
        let seen = Rc::clone(&count);
        source.set_handler(Box::new(move |_| *seen.borrow_mut() += 1));
        while source.next()?.is_some() {}
        assert_eq!(2, *count.borrow());
        Ok(())
    }
}
