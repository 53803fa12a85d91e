use crate::error::{Error, Result};
use crate::event::metadata;
use crate::event::{FormatDescription, LogEventType};
use bytes::Bytes;
use bytes_cursor::packed::ReadPackedExt;
use bytes_cursor::ByteCursor;
use smol_str::SmolStr;

/// Table map event: declares the schema of the table a following rows
/// event refers to by id.
///
/// The variable tail (`optional_metadata`) is kept raw; the accessor
/// methods walk its tag-length-value sequence on demand.
#[derive(Debug, Clone)]
pub struct TableMapData {
    pub table_id: u64,
    pub flags: u16,
    pub db_name: SmolStr,
    pub table_name: SmolStr,
    pub column_count: u64,
    pub column_types: Bytes,
    pub field_metadata: Bytes,
    pub null_bits: Bytes,
    pub optional_metadata: Bytes,
}

impl TableMapData {
    pub fn read_from(cursor: &mut ByteCursor, fde: &FormatDescription) -> Result<Self> {
        let phl = fde.post_header_len_for(LogEventType::TableMapEvent, 19)?;
        // the table id shrank to 4 bytes exactly once in history, signalled
        // by a post header length of 6
        let table_id = if phl == 6 {
            cursor.read_le_u32()? as u64
        } else {
            cursor.read_le_u48()?
        };
        let flags = cursor.read_le_u16()?;

        let db_name = read_name(cursor)?;
        let table_name = read_name(cursor)?;

        let column_count = cursor.read_packed_int()?.to_u64();
        let column_types = Bytes::copy_from_slice(cursor.read_bytes(column_count as usize)?);

        let mut field_metadata = Bytes::new();
        let mut null_bits = Bytes::new();
        if cursor.available() > 0 {
            let meta_size = cursor.read_packed_int()?.to_u64();
            if meta_size > 4 * column_count {
                return Err(Error::protocol(format!(
                    "field metadata length {} exceeds limit for {} columns",
                    meta_size, column_count
                )));
            }
            field_metadata = Bytes::copy_from_slice(cursor.read_bytes(meta_size as usize)?);
            let null_bits_len = ((column_count + 7) / 8) as usize;
            null_bits = Bytes::copy_from_slice(cursor.read_bytes(null_bits_len)?);
        }
        let optional_metadata = Bytes::copy_from_slice(cursor.rest());

        Ok(TableMapData {
            table_id,
            flags,
            db_name,
            table_name,
            column_count,
            column_types,
            field_metadata,
            null_bits,
            optional_metadata,
        })
    }

    /// column names in declaration order, empty when the server was not
    /// configured to write full row metadata
    pub fn column_names(&self) -> Result<Vec<SmolStr>> {
        metadata::column_names(self.optional_metadata.as_ref())
    }

    /// indices of the primary key columns (without prefix)
    pub fn simple_primary_key(&self) -> Result<Vec<u16>> {
        metadata::simple_primary_key(self.optional_metadata.as_ref())
    }

    /// MSB-first bitstring, one bit per numeric column, set when unsigned
    pub fn signedness(&self) -> Result<Bytes> {
        metadata::signedness(self.optional_metadata.as_ref())
    }
}

/// packed length, that many bytes of name, then the trailing NUL
fn read_name(cursor: &mut ByteCursor) -> Result<SmolStr> {
    let len = cursor.read_packed_int()?.to_u64() as usize;
    let raw = cursor.read_bytes(len + 1)?;
    Ok(SmolStr::new(std::str::from_utf8(&raw[..len])?))
}
