//! stage three: row events correlated with their table maps
use crate::error::{Error, Result};
use crate::events::EventSource;
use crate::transport::ByteTransport;
use bytes::Bytes;
use docbridge_core::event::{Event, RowsKind};
use smol_str::SmolStr;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Insert,
    Delete,
    Update,
}

/// One row mutation with everything needed to translate it, detached from
/// the stream it came from. Produced and consumed in lock step; nothing is
/// retained across iterations.
#[derive(Debug)]
pub struct TableDiff {
    pub kind: DiffKind,
    pub database: SmolStr,
    pub table: SmolStr,
    pub column_types: Bytes,
    pub column_metatypes: Bytes,
    pub column_names: Vec<SmolStr>,
    pub primary_key: Vec<u16>,
    pub signedness: Bytes,
    pub row: Bytes,
    pub width: u64,
}

/// Pairs each rows event with the latest table map declaring its table id.
///
/// Table maps may be re-declared at any time (schema reload); a rows event
/// whose id was never declared is a protocol violation.
pub struct TableDiffSource<T> {
    events: EventSource<T>,
    table_info: HashMap<u64, docbridge_core::event::TableMapData>,
    handler: Option<Box<dyn FnMut(&TableDiff)>>,
}

impl<T: ByteTransport> TableDiffSource<T> {
    pub fn new(events: EventSource<T>) -> Self {
        TableDiffSource {
            events,
            table_info: HashMap::new(),
            handler: None,
        }
    }

    /// observation hook, fired for every yielded diff
    pub fn set_handler(&mut self, handler: Box<dyn FnMut(&TableDiff)>) {
        self.handler = Some(handler);
    }

    pub fn next(&mut self) -> Result<Option<TableDiff>> {
        loop {
            let event = match self.events.next()? {
                Some(event) => event,
                None => return Ok(None),
            };
            match event {
                Event::TableMap(table_map) => {
                    self.table_info
                        .insert(table_map.data.table_id, table_map.data);
                }
                Event::Rows(rows) => {
                    let rows = rows.data;
                    let table_map = self.table_info.remove(&rows.table_id).ok_or_else(|| {
                        Error::TableDiff(format!(
                            "rows event before table map for table id {}",
                            rows.table_id
                        ))
                    })?;
                    debug_assert_eq!(table_map.table_id, rows.table_id);

                    let kind = match rows.kind {
                        RowsKind::Write => DiffKind::Insert,
                        RowsKind::Delete => DiffKind::Delete,
                        RowsKind::Update => DiffKind::Update,
                    };
                    let diff = TableDiff {
                        kind,
                        column_names: table_map.column_names()?,
                        primary_key: table_map.simple_primary_key()?,
                        signedness: table_map.signedness()?,
                        database: table_map.db_name,
                        table: table_map.table_name,
                        column_types: table_map.column_types,
                        column_metatypes: table_map.field_metadata,
                        row: rows.row,
                        width: table_map.column_count,
                    };
                    if let Some(handler) = &mut self.handler {
                        handler(&diff);
                    }
                    return Ok(Some(diff));
                }
                _ => {}
            }
        }
    }
}
