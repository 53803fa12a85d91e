//! stage four: table diffs to document-store plans
use crate::diff::{DiffKind, TableDiff};
use crate::error::{Error, Result};
use crate::plan::{Match, Params, Plan};
use crate::store::DocStore;
use bytes_cursor::bits::{BitCursor, BitOrder};
use bytes_cursor::ByteCursor;
use docbridge_core::col::ColumnType;
use serde_json::{json, Map, Number, Value};
use smol_str::SmolStr;
use std::collections::HashSet;
use std::convert::TryFrom;

const ID_COLUMN: &str = "_id";

/// Translates each diff into plans and pushes them into the store.
///
/// The primary-key contract is strict: exactly one primary-key column,
/// named `_id`, declared unsigned `LONGLONG`, never null. Its value keys
/// the document as a zero-padded 24-digit decimal string.
pub struct DocumentSink<S> {
    store: S,
    seen_dbs: HashSet<SmolStr>,
    seen_collections: HashSet<(SmolStr, SmolStr)>,
    handler: Option<Box<dyn FnMut(&TableDiff)>>,
}

impl<S: DocStore> DocumentSink<S> {
    pub fn new(store: S) -> Self {
        DocumentSink {
            store,
            seen_dbs: HashSet::new(),
            seen_collections: HashSet::new(),
            handler: None,
        }
    }

    /// observation hook, fired before the diff is processed
    pub fn set_handler(&mut self, handler: Box<dyn FnMut(&TableDiff)>) {
        self.handler = Some(handler);
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn put(&mut self, diff: TableDiff) -> Result<()> {
        if let Some(handler) = &mut self.handler {
            handler(&diff);
        }
        self.ensure_target(&diff)?;
        match diff.kind {
            DiffKind::Insert => self.put_insert(&diff),
            DiffKind::Delete => self.put_delete(&diff),
            DiffKind::Update => self.put_update(&diff),
        }
    }

    fn ensure_target(&mut self, diff: &TableDiff) -> Result<()> {
        if !self.seen_dbs.contains(&diff.database) {
            self.store.ensure_database(&diff.database)?;
            self.seen_dbs.insert(diff.database.clone());
        }
        let key = (diff.database.clone(), diff.table.clone());
        if !self.seen_collections.contains(&key) {
            self.store.ensure_collection(&diff.database, &diff.table)?;
            self.seen_collections.insert(key);
        }
        Ok(())
    }

    fn put_insert(&mut self, diff: &TableDiff) -> Result<()> {
        let mut reader = RowReader::new(diff)?;
        let mut docs = Vec::new();
        while reader.has_rows() {
            docs.push(reader.next_document()?);
        }
        self.store.execute(
            Plan::InsertMany {
                database: diff.database.clone(),
                collection: diff.table.clone(),
                docs,
            },
            Params::new(),
        )
    }

    fn put_delete(&mut self, diff: &TableDiff) -> Result<()> {
        let mut reader = RowReader::new(diff)?;
        while reader.has_rows() {
            let doc = reader.next_document()?;
            let mut params = Params::new();
            params.push(1, doc[ID_COLUMN].clone());
            self.store.execute(
                Plan::DeleteOne {
                    database: diff.database.clone(),
                    collection: diff.table.clone(),
                    filter: Match::eq(ID_COLUMN, 1),
                },
                params,
            )?;
        }
        Ok(())
    }

    fn put_update(&mut self, diff: &TableDiff) -> Result<()> {
        let mut reader = RowReader::new(diff)?;
        while reader.has_rows() {
            let before = reader.next_document()?;
            let mut after = reader.next_document()?;
            if let Some(after) = after.as_object_mut() {
                after.remove(ID_COLUMN);
            }
            let mut params = Params::new();
            params.push(1, before[ID_COLUMN].clone());
            self.store.execute(
                Plan::UpdateOne {
                    database: diff.database.clone(),
                    collection: diff.table.clone(),
                    filter: Match::eq(ID_COLUMN, 1),
                    set: json!({ "$set": after }),
                },
                params,
            )?;
        }
        Ok(())
    }
}

/// Cursors over one diff's row batch. Each document resets the type,
/// metadata and signedness cursors; the row cursor runs through the whole
/// batch.
struct RowReader<'a> {
    diff: &'a TableDiff,
    types: ByteCursor<'a>,
    metas: ByteCursor<'a>,
    row: ByteCursor<'a>,
    signedness: BitCursor<'a>,
    pk_index: usize,
}

impl<'a> RowReader<'a> {
    fn new(diff: &'a TableDiff) -> Result<Self> {
        if diff.primary_key.len() != 1 {
            return Err(Error::sink(format!(
                "{}.{} needs exactly one primary key column, found {}",
                diff.database,
                diff.table,
                diff.primary_key.len()
            )));
        }
        let pk_index = diff.primary_key[0] as usize;
        match diff.column_names.get(pk_index) {
            Some(name) if name.as_str() == ID_COLUMN => {}
            Some(name) => {
                return Err(Error::sink(format!(
                    "{}.{} primary key column is named '{}', expected '{}'",
                    diff.database, diff.table, name, ID_COLUMN
                )))
            }
            None => {
                return Err(Error::sink(format!(
                    "{}.{} has no name for primary key column {}",
                    diff.database, diff.table, pk_index
                )))
            }
        }
        if (diff.column_names.len() as u64) < diff.width {
            return Err(Error::sink(format!(
                "{}.{} column names incomplete: {} of {}",
                diff.database,
                diff.table,
                diff.column_names.len(),
                diff.width
            )));
        }
        Ok(RowReader {
            diff,
            types: ByteCursor::new(diff.column_types.as_ref()),
            metas: ByteCursor::new(diff.column_metatypes.as_ref()),
            row: ByteCursor::new(diff.row.as_ref()),
            signedness: BitCursor::new(diff.signedness.as_ref(), BitOrder::BigEndian),
            pk_index,
        })
    }

    fn has_rows(&self) -> bool {
        self.row.available() > 0
    }

    fn next_document(&mut self) -> Result<Value> {
        let width = self.diff.width as usize;
        let null_bitmap = self.row.read_bytes((width + 7) / 8)?;
        self.types.restart();
        self.metas.restart();
        self.signedness.restart();

        let mut doc = Map::new();
        for i in 0..width {
            // LSB-first within each byte, unlike the signedness bits
            let is_null = (null_bitmap[i / 8] >> (i % 8)) & 1 == 1;
            let name = self.diff.column_names[i].as_str();
            if i == self.pk_index {
                if is_null {
                    return Err(Error::sink(format!(
                        "{}.{} primary key is null",
                        self.diff.database, self.diff.table
                    )));
                }
                doc.insert(ID_COLUMN.to_string(), self.read_primary_key()?);
            } else if is_null {
                doc.insert(name.to_string(), Value::Null);
            } else {
                let value = self.read_value()?;
                doc.insert(name.to_string(), value);
            }
        }
        Ok(Value::Object(doc))
    }

    fn read_primary_key(&mut self) -> Result<Value> {
        if !self.signedness.read()? {
            return Err(Error::sink(format!(
                "{}.{} primary key must be unsigned",
                self.diff.database, self.diff.table
            )));
        }
        let type_code = self.types.read_u8()?;
        if ColumnType::try_from(type_code).ok() != Some(ColumnType::LongLong) {
            return Err(Error::sink(format!(
                "{}.{} primary key must be LONGLONG, found type {}",
                self.diff.database, self.diff.table, type_code
            )));
        }
        let value = self.row.read_le_u64()?;
        Ok(Value::String(format!("{:024}", value)))
    }

    fn read_value(&mut self) -> Result<Value> {
        let type_code = self.types.read_u8()?;
        let column_type = ColumnType::try_from(type_code)
            .map_err(|_| Error::sink(format!("Unknown type {}", type_code)))?;
        let value = match column_type {
            ColumnType::Tiny => {
                if self.signedness.read()? {
                    Value::from(self.row.read_u8()? as u64)
                } else {
                    Value::from(self.row.read_i8()? as i64)
                }
            }
            ColumnType::Short => {
                if self.signedness.read()? {
                    Value::from(self.row.read_le_u16()? as u64)
                } else {
                    Value::from(self.row.read_le_i16()? as i64)
                }
            }
            ColumnType::Int24 => {
                if self.signedness.read()? {
                    Value::from(self.row.read_le_u24()? as u64)
                } else {
                    // the high bit of the third payload byte decides the
                    // sign before the 3-byte copy lands in the low end
                    let negative = self.row.peek_u8(2)? & 0x80 != 0;
                    let prefix: u32 = if negative { (-1i32 << 24) as u32 } else { 0 };
                    let value = (prefix | self.row.read_le_u24()?) as i32;
                    Value::from(value as i64)
                }
            }
            ColumnType::Long => {
                if self.signedness.read()? {
                    Value::from(self.row.read_le_u32()? as u64)
                } else {
                    Value::from(self.row.read_le_i32()? as i64)
                }
            }
            ColumnType::LongLong => {
                if self.signedness.read()? {
                    Value::from(self.row.read_le_u64()?)
                } else {
                    Value::from(self.row.read_le_i64()?)
                }
            }
            ColumnType::Float => {
                self.signedness.read()?;
                self.metas.read_u8()?;
                float_value(self.row.read_le_f32()? as f64)
            }
            ColumnType::Double => {
                self.signedness.read()?;
                self.metas.read_u8()?;
                float_value(self.row.read_le_f64()?)
            }
            ColumnType::Bool => {
                self.signedness.read()?;
                Value::Bool(self.row.read_u8()? != 0)
            }
            ColumnType::Varchar => {
                let max_length = self.metas.read_le_u16()?;
                let len = if max_length <= 255 {
                    self.row.read_u8()? as usize
                } else {
                    self.row.read_le_u16()? as usize
                };
                string_value(self.row.read_bytes(len)?)?
            }
            ColumnType::String => {
                let real_type = self.metas.read_u8()?;
                if ColumnType::try_from(real_type).ok() != Some(ColumnType::String) {
                    return Err(Error::sink(format!("Unknown type {}", real_type)));
                }
                // the metadata length byte counts character cells
                let _char_count = self.metas.read_u8()? / 4;
                let len = self.row.read_u8()? as usize;
                string_value(self.row.read_bytes(len)?)?
            }
            other => return Err(Error::sink(format!("Unknown type {:?}", other))),
        };
        Ok(value)
    }
}

fn float_value(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

fn string_value(raw: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| Error::sink("string column is not valid utf8"))?;
    Ok(Value::String(text.to_string()))
}
