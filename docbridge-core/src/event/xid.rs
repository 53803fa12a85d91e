//! small transaction-control events the conveyor recognizes but does not
//! act on
use crate::error::Result;
use bytes_cursor::ByteCursor;
use smol_str::SmolStr;

/// commit marker of a transaction touching transactional tables
#[derive(Debug, Clone)]
pub struct XidData {
    pub xid: u64,
}

impl XidData {
    pub fn read_from(cursor: &mut ByteCursor) -> Result<Self> {
        let xid = cursor.read_le_u64()?;
        Ok(XidData { xid })
    }
}

/// keepalive the server sends on an idle replication session; carries the
/// name of the file it is holding open
#[derive(Debug, Clone)]
pub struct HeartbeatData {
    pub log_ident: SmolStr,
}

impl HeartbeatData {
    pub fn read_from(cursor: &mut ByteCursor) -> Result<Self> {
        let raw = cursor.read_bytes(cursor.available())?;
        Ok(HeartbeatData {
            log_ident: SmolStr::new(String::from_utf8_lossy(raw)),
        })
    }
}
