//! logical plans against the downstream document store
use serde_json::Value;
use smol_str::SmolStr;

/// conjunction of `field = $param` comparisons
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub eq: Vec<(SmolStr, u16)>,
}

impl Match {
    pub fn eq(field: &str, param: u16) -> Self {
        Match {
            eq: vec![(SmolStr::new(field), param)],
        }
    }
}

/// One operation against a collection. Values referenced by a `Match` live
/// in the accompanying parameter bag, never inline.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    InsertMany {
        database: SmolStr,
        collection: SmolStr,
        docs: Vec<Value>,
    },
    DeleteOne {
        database: SmolStr,
        collection: SmolStr,
        filter: Match,
    },
    UpdateOne {
        database: SmolStr,
        collection: SmolStr,
        filter: Match,
        /// `{"$set": {...}}` shaped setter document
        set: Value,
    },
}

impl Plan {
    pub fn database(&self) -> &SmolStr {
        match self {
            Plan::InsertMany { database, .. }
            | Plan::DeleteOne { database, .. }
            | Plan::UpdateOne { database, .. } => database,
        }
    }

    pub fn collection(&self) -> &SmolStr {
        match self {
            Plan::InsertMany { collection, .. }
            | Plan::DeleteOne { collection, .. }
            | Plan::UpdateOne { collection, .. } => collection,
        }
    }
}

/// numbered parameter bag; ids start at 1
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<(u16, Value)>);

impl Params {
    pub fn new() -> Self {
        Params::default()
    }

    pub fn push(&mut self, id: u16, value: Value) {
        self.0.push((id, value));
    }

    pub fn get(&self, id: u16) -> Option<&Value> {
        self.0
            .iter()
            .find(|(param_id, _)| *param_id == id)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
