//! optional metadata of a table map event
//!
//! a tag-length-value sequence at the tail of the event, present when the
//! server writes full row metadata
use crate::error::Result;
use bytes::Bytes;
use bytes_cursor::packed::ReadPackedExt;
use bytes_cursor::ByteCursor;
use smol_str::SmolStr;

/// recognized field tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataType {
    /// UNSIGNED flag of numeric columns, MSB-first bitstring
    Signedness = 1,
    /// default character set of string columns
    DefaultCharset = 2,
    /// character set of string columns
    ColumnCharset = 3,
    ColumnName = 4,
    /// string values of SET columns
    SetStrValue = 5,
    /// string values of ENUM columns
    EnumStrValue = 6,
    /// real type of geometry columns
    GeometryType = 7,
    /// primary key without prefix
    SimplePrimaryKey = 8,
    /// primary key with prefix
    PrimaryKeyWithPrefix = 9,
    EnumAndSetDefaultCharset = 10,
    EnumAndSetColumnCharset = 11,
    /// column visibility attribute
    ColumnVisibility = 12,
}

/// walk the sequence and return the payload of the first field with `tag`
fn find<'a>(meta: &'a [u8], tag: u8) -> Result<Option<&'a [u8]>> {
    let mut cursor = ByteCursor::new(meta);
    while cursor.available() > 0 {
        let field_tag = cursor.read_u8()?;
        let len = cursor.read_packed_int()?.to_u64() as usize;
        let payload = cursor.read_bytes(len)?;
        if field_tag == tag {
            return Ok(Some(payload));
        }
    }
    Ok(None)
}

pub(crate) fn column_names(meta: &[u8]) -> Result<Vec<SmolStr>> {
    let payload = match find(meta, MetadataType::ColumnName as u8)? {
        Some(p) => p,
        None => return Ok(Vec::new()),
    };
    let mut cursor = ByteCursor::new(payload);
    let mut names = Vec::new();
    while cursor.available() > 0 {
        let len = cursor.read_packed_int()?.to_u64() as usize;
        let raw = cursor.read_bytes(len)?;
        names.push(SmolStr::new(std::str::from_utf8(raw)?));
    }
    Ok(names)
}

pub(crate) fn simple_primary_key(meta: &[u8]) -> Result<Vec<u16>> {
    let payload = match find(meta, MetadataType::SimplePrimaryKey as u8)? {
        Some(p) => p,
        None => return Ok(Vec::new()),
    };
    let mut cursor = ByteCursor::new(payload);
    let mut indices = Vec::new();
    while cursor.available() > 0 {
        indices.push(cursor.read_packed_int()?.to_u64() as u16);
    }
    Ok(indices)
}

pub(crate) fn signedness(meta: &[u8]) -> Result<Bytes> {
    Ok(find(meta, MetadataType::Signedness as u8)?
        .map(Bytes::copy_from_slice)
        .unwrap_or_default())
}
