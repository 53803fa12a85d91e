use crate::error::{Error, Result};
use crate::event::{FormatDescription, LogEventType};
use bytes::Bytes;
use bytes_cursor::packed::ReadPackedExt;
use bytes_cursor::ByteCursor;

/// the three mutations a rows event can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowsKind {
    Write,
    Update,
    Delete,
}

impl RowsKind {
    pub fn from_event_type(event_type: LogEventType) -> Option<RowsKind> {
        let kind = match event_type {
            LogEventType::WriteRowsEventV1 | LogEventType::WriteRowsEvent => RowsKind::Write,
            LogEventType::UpdateRowsEventV1
            | LogEventType::UpdateRowsEvent
            | LogEventType::PartialUpdateRowsEvent => RowsKind::Update,
            LogEventType::DeleteRowsEventV1 | LogEventType::DeleteRowsEvent => RowsKind::Delete,
            _ => return None,
        };
        Some(kind)
    }
}

/// Write/Update/Delete rows event, v1 and v2 layouts.
///
/// The row images stay raw here; materializing values needs the table map
/// metadata, which lives downstream with the diff source.
#[derive(Debug, Clone)]
pub struct RowsData {
    pub kind: RowsKind,
    pub table_id: u64,
    pub flags: u16,
    /// v2 extra-info block size, 0 on v1 events
    pub var_header_len: u16,
    pub width: u64,
    pub columns_before_image: Bytes,
    pub columns_after_image: Bytes,
    pub row: Bytes,
}

impl RowsData {
    pub fn read_from(
        cursor: &mut ByteCursor,
        fde: &FormatDescription,
        event_type: LogEventType,
        code: u8,
    ) -> Result<Self> {
        let kind = RowsKind::from_event_type(event_type).ok_or_else(|| {
            Error::protocol(format!("{:?} is not a rows event", event_type))
        })?;
        let phl = fde.post_header_len_for(event_type, code)?;
        let table_id = if phl == 6 {
            cursor.read_le_u32()? as u64
        } else {
            cursor.read_le_u48()?
        };
        let flags = cursor.read_le_u16()?;

        let mut var_header_len = 0;
        if phl == 10 {
            // v2 layout: the length includes its own two bytes
            var_header_len = cursor.read_le_u16()?;
            let extra = var_header_len.checked_sub(2).ok_or_else(|| {
                Error::protocol(format!("bad rows extra header length {}", var_header_len))
            })?;
            cursor.skip(extra as usize)?;
        }

        let width = cursor.read_packed_int()?.to_u64();
        if width == 0 {
            return Err(Error::protocol("rows event with zero columns"));
        }
        let n_bits = ((width + 7) / 8) as usize;
        let columns_before_image = Bytes::copy_from_slice(cursor.read_bytes(n_bits)?);
        let columns_after_image = if kind == RowsKind::Update {
            Bytes::copy_from_slice(cursor.read_bytes(n_bits)?)
        } else {
            columns_before_image.clone()
        };
        let row = Bytes::copy_from_slice(cursor.rest());

        Ok(RowsData {
            kind,
            table_id,
            flags,
            var_header_len,
            width,
            columns_before_image,
            columns_after_image,
            row,
        })
    }
}
