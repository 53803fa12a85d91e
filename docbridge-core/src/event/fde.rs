//! format description event and the running decoder state derived from it
use crate::error::{Error, Result};
use crate::event::LogEventType;
use crate::{
    BINLOG_VERSION, CHECKSUM_VERSION_VALUE, DEFAULT_SERVER_VERSION, LOG_EVENT_HEADER_LEN,
    ST_SERVER_VER_LEN,
};
use bytes_cursor::ByteCursor;

/// Format description of the stream currently being read.
///
/// The first event of every binlog file replaces this state; a rotate
/// resets it to the default until the next file's format description
/// arrives. Every other parser borrows it for the duration of one decode.
#[derive(Debug, Clone)]
pub struct FormatDescription {
    pub binlog_version: u16,
    pub server_version: String,
    pub created: u32,
    pub common_header_len: u8,
    /// indexed by event type code minus one
    pub post_header_len: Vec<u8>,
    pub has_checksum: bool,
}

impl Default for FormatDescription {
    /// State assumed for the events a server sends before any format
    /// description (the artificial rotate at the start of a dump).
    fn default() -> Self {
        FormatDescription {
            binlog_version: BINLOG_VERSION,
            server_version: DEFAULT_SERVER_VERSION.to_string(),
            created: 0,
            common_header_len: LOG_EVENT_HEADER_LEN as u8,
            post_header_len: default_post_header_len(),
            has_checksum: true,
        }
    }
}

impl FormatDescription {
    /// Numeric value of the leading `a.b.c` of the server version,
    /// `((a * 256) + b) * 256 + c`, or 0 when the version does not parse.
    pub fn server_version_value(&self) -> u64 {
        let mut parts = [0u64; 3];
        let mut split = self.server_version.split('.');
        for part in parts.iter_mut() {
            let component = match split.next() {
                Some(c) => c,
                None => return 0,
            };
            let digits: String = component.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                return 0;
            }
            let n: u64 = match digits.parse() {
                Ok(n) => n,
                Err(_) => return 0,
            };
            if n >= 256 {
                return 0;
            }
            *part = n;
        }
        ((parts[0] * 256) + parts[1]) * 256 + parts[2]
    }

    pub fn post_header_len_for(&self, event_type: LogEventType, code: u8) -> Result<u8> {
        if code == 0 {
            return Err(Error::protocol("no post header length for unknown event"));
        }
        self.post_header_len
            .get(code as usize - 1)
            .copied()
            .ok_or_else(|| {
                Error::protocol(format!(
                    "post header length not initialized for {:?} (code {})",
                    event_type, code
                ))
            })
    }

    pub fn read_from(cursor: &mut ByteCursor) -> Result<Self> {
        let binlog_version = cursor.read_le_u16()?;
        let mut server_version = [0u8; ST_SERVER_VER_LEN];
        cursor.read_into(&mut server_version)?;
        server_version[ST_SERVER_VER_LEN - 1] = 0;
        let nul = server_version
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(ST_SERVER_VER_LEN - 1);
        let server_version = std::str::from_utf8(&server_version[..nul])?.to_string();
        let created = cursor.read_le_u32()?;
        let common_header_len = cursor.read_u8()?;
        if (common_header_len as usize) < LOG_EVENT_HEADER_LEN {
            return Err(Error::protocol(format!(
                "common header length {} below minimum {}",
                common_header_len, LOG_EVENT_HEADER_LEN
            )));
        }

        let mut fde = FormatDescription {
            binlog_version,
            server_version,
            created,
            common_header_len,
            post_header_len: Vec::new(),
            has_checksum: false,
        };

        // from 5.6.1 the payload ends with a checksum-algorithm byte and
        // the event's own CRC32, neither part of the length table
        let mut rem = cursor.available();
        if fde.server_version_value() >= CHECKSUM_VERSION_VALUE {
            fde.has_checksum = true;
            rem = rem.checked_sub(1 + 4).ok_or_else(|| {
                Error::protocol("format description too short for checksum suffix")
            })?;
        }
        fde.post_header_len = cursor.read_bytes(rem)?.to_vec();
        Ok(fde)
    }
}

/// The compiled-in table used before any format description event has been
/// seen, covering every type code of the mainline set.
fn default_post_header_len() -> Vec<u8> {
    vec![
        56, // StartEventV3
        13, // QueryEvent
        0,  // StopEvent
        8,  // RotateEvent
        0,  // IntvarEvent
        18, // LoadEvent
        0,  // SlaveEvent
        4,  // CreateFileEvent
        4,  // AppendBlockEvent
        4,  // ExecLoadEvent
        4,  // DeleteFileEvent
        18, // NewLoadEvent
        0,  // RandEvent
        0,  // UserVarEvent
        99, // FormatDescriptionEvent
        0,  // XidEvent
        4,  // BeginLoadQueryEvent
        26, // ExecuteLoadQueryEvent
        8,  // TableMapEvent
        0,  // WriteRowsEventV0
        0,  // UpdateRowsEventV0
        0,  // DeleteRowsEventV0
        8,  // WriteRowsEventV1
        8,  // UpdateRowsEventV1
        8,  // DeleteRowsEventV1
        2,  // IncidentEvent
        0,  // HeartbeatLogEvent
        0,  // IgnorableLogEvent
        0,  // RowsQueryLogEvent
        10, // WriteRowsEvent
        10, // UpdateRowsEvent
        10, // DeleteRowsEvent
        42, // GtidLogEvent
        42, // AnonymousGtidLogEvent
        0,  // PreviousGtidsLogEvent
        18, // TransactionContextEvent
        52, // ViewChangeEvent
        0,  // XaPrepareLogEvent
        10, // PartialUpdateRowsEvent
        0,  // TransactionPayloadEvent
        0,  // HeartbeatLogEventV2
        42, // GtidTaggedLogEvent
    ]
}
