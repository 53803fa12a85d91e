use crate::error::{Error, Result};
use crate::event::{FormatDescription, LogEventType};
use crate::ROTATE_MAX_FULL_NAME_SIZE;
use bytes_cursor::ByteCursor;

/// Rotate event: names the next binlog file and the position to resume at.
#[derive(Debug, Clone)]
pub struct RotateData {
    pub new_log_ident: String,
    pub flags: u32,
    pub pos: u64,
}

impl RotateData {
    /// flag carried by every rotate the server emits itself
    pub const DUPNAME: u32 = 2;
    pub const RELOG: u32 = 4;

    pub fn read_from(cursor: &mut ByteCursor, fde: &FormatDescription) -> Result<Self> {
        let phl = fde.post_header_len_for(LogEventType::RotateEvent, 4)?;
        let pos = if phl > 0 { cursor.read_le_u64()? } else { 4 };
        let ident_len = cursor.available().min(ROTATE_MAX_FULL_NAME_SIZE - 1);
        if ident_len == 0 {
            return Err(Error::protocol("rotate event too short"));
        }
        let new_log_ident = String::from_utf8(cursor.read_bytes(ident_len)?.to_vec())?;
        Ok(RotateData {
            new_log_ident,
            flags: Self::DUPNAME,
            pos,
        })
    }
}
