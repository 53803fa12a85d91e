//! stage traits and the driver loop
use crate::diff::{TableDiff, TableDiffSource};
use crate::error::Result;
use crate::sink::DocumentSink;
use crate::store::DocStore;
use crate::transport::ByteTransport;

/// pull side of a conveyor stage
pub trait Source {
    type Item;
    fn next(&mut self) -> Result<Option<Self::Item>>;
}

/// push side of a conveyor stage
pub trait Sink {
    type Item;
    fn put(&mut self, item: Self::Item) -> Result<()>;
}

impl<T: ByteTransport> Source for TableDiffSource<T> {
    type Item = TableDiff;

    fn next(&mut self) -> Result<Option<TableDiff>> {
        TableDiffSource::next(self)
    }
}

impl<S: DocStore> Sink for DocumentSink<S> {
    type Item = TableDiff;

    fn put(&mut self, item: TableDiff) -> Result<()> {
        DocumentSink::put(self, item)
    }
}

/// Drains the source into the sink until the source is exhausted.
/// Back-pressure is simply this loop's cadence.
pub struct Pipeline<So, Si> {
    source: So,
    sink: Si,
}

impl<So, Si> Pipeline<So, Si>
where
    So: Source,
    Si: Sink<Item = So::Item>,
{
    pub fn new(source: So, sink: Si) -> Self {
        Pipeline { source, sink }
    }

    pub fn run(&mut self) -> Result<()> {
        while let Some(item) = self.source.next()? {
            self.sink.put(item)?;
        }
        Ok(())
    }

    pub fn into_parts(self) -> (So, Si) {
        (self.source, self.sink)
    }
}
