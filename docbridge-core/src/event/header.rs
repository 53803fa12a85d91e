use crate::error::Result;
use bitflags::bitflags;
use bytes_cursor::ByteCursor;

bitflags! {
    pub struct EventHeaderFlags: u16 {
        const BINLOG_IN_USE         = 0x0001;
        const FORCED_ROTATE         = 0x0002;
        const THREAD_SPECIFIC       = 0x0004;
        const SUPPRESS_USE          = 0x0008;
        const UPDATE_TABLE_MAP_VERSION = 0x0010;
        const ARTIFICIAL            = 0x0020;
        const RELAY_LOG             = 0x0040;
        const IGNORABLE             = 0x0080;
        const NO_FILTER             = 0x0100;
        const MTS_ISOLATE           = 0x0200;
    }
}

/// Common v4 event header, fixed 19-byte layout:
/// timestamp 0:4, type_code 4:1, server_id 5:4,
/// data_written 9:4, log_pos 13:4, flags 17:2
#[derive(Debug, Clone)]
pub struct EventHeader {
    pub when: u32,
    pub type_code: u8,
    pub server_id: u32,
    /// total event size including header and trailing checksum
    pub data_written: u32,
    /// position of the next event in the source file, 0 for virtual events
    pub log_pos: u32,
    pub flags: EventHeaderFlags,
}

impl EventHeader {
    pub fn read_from(cursor: &mut ByteCursor) -> Result<Self> {
        let when = cursor.read_le_u32()?;
        let type_code = cursor.read_u8()?;
        let server_id = cursor.read_le_u32()?;
        let data_written = cursor.read_le_u32()?;
        let log_pos = cursor.read_le_u32()?;
        let flags = cursor.read_le_u16()?;
        Ok(EventHeader {
            when,
            type_code,
            server_id,
            data_written,
            log_pos,
            flags: EventHeaderFlags::from_bits_truncate(flags),
        })
    }
}
