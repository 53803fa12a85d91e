//! consumer boundary of the conveyor
use crate::error::{Error, Result};
use crate::plan::{Params, Plan};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Whatever executes plans downstream. Databases and collections are
/// created on demand by the sink before the first plan touching them.
pub trait DocStore {
    fn ensure_database(&mut self, name: &str) -> Result<()>;
    fn ensure_collection(&mut self, db: &str, name: &str) -> Result<()>;
    fn execute(&mut self, plan: Plan, params: Params) -> Result<()>;
}

type Collection = BTreeMap<String, Value>;

/// In-memory plan executor keyed by `_id`, the reference consumer used by
/// the pipeline tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    dbs: HashMap<String, HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn collection(&self, db: &str, name: &str) -> Option<&Collection> {
        self.dbs.get(db)?.get(name)
    }

    fn collection_mut(&mut self, db: &str, name: &str) -> Result<&mut Collection> {
        self.dbs
            .get_mut(db)
            .and_then(|db| db.get_mut(name))
            .ok_or_else(|| Error::Store(format!("unknown collection {}.{}", db, name)))
    }

    fn resolve_id(filter: &crate::plan::Match, params: &Params) -> Result<String> {
        match filter.eq.as_slice() {
            [(field, param)] if field.as_str() == "_id" => {
                let value = params
                    .get(*param)
                    .ok_or_else(|| Error::Store(format!("missing parameter ${}", param)))?;
                value
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::Store("_id parameter is not a string".into()))
            }
            _ => Err(Error::Store("only lookups by _id are supported".into())),
        }
    }
}

impl DocStore for MemoryStore {
    fn ensure_database(&mut self, name: &str) -> Result<()> {
        self.dbs.entry(name.to_string()).or_default();
        Ok(())
    }

    fn ensure_collection(&mut self, db: &str, name: &str) -> Result<()> {
        self.dbs
            .get_mut(db)
            .ok_or_else(|| Error::Store(format!("unknown database {}", db)))?
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    fn execute(&mut self, plan: Plan, params: Params) -> Result<()> {
        match plan {
            Plan::InsertMany {
                database,
                collection,
                docs,
            } => {
                let target = self.collection_mut(&database, &collection)?;
                for doc in docs {
                    let id = doc
                        .get("_id")
                        .and_then(Value::as_str)
                        .ok_or_else(|| Error::Store("document without _id".into()))?
                        .to_string();
                    target.insert(id, doc);
                }
                Ok(())
            }
            Plan::DeleteOne {
                database,
                collection,
                filter,
            } => {
                let id = Self::resolve_id(&filter, &params)?;
                let target = self.collection_mut(&database, &collection)?;
                target.remove(&id);
                Ok(())
            }
            Plan::UpdateOne {
                database,
                collection,
                filter,
                set,
            } => {
                let id = Self::resolve_id(&filter, &params)?;
                let target = self.collection_mut(&database, &collection)?;
                let doc = target
                    .get_mut(&id)
                    .ok_or_else(|| Error::Store(format!("no document with _id {}", id)))?;
                let fields = set
                    .get("$set")
                    .and_then(Value::as_object)
                    .ok_or_else(|| Error::Store("setter without $set document".into()))?;
                let doc = doc
                    .as_object_mut()
                    .ok_or_else(|| Error::Store("stored document is not an object".into()))?;
                for (key, value) in fields {
                    doc.insert(key.clone(), value.clone());
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Match;
    use serde_json::json;
    use smol_str::SmolStr;

    fn ensure(store: &mut MemoryStore) {
        store.ensure_database("e_store").unwrap();
        store.ensure_collection("e_store", "brands").unwrap();
    }

    #[test]
    fn test_insert_and_delete() -> Result<()> {
        let mut store = MemoryStore::new();
        ensure(&mut store);
        store.execute(
            Plan::InsertMany {
                database: SmolStr::new("e_store"),
                collection: SmolStr::new("brands"),
                docs: vec![json!({"_id": "000000000000000000000001", "name": "a"})],
            },
            Params::new(),
        )?;
        assert_eq!(1, store.collection("e_store", "brands").unwrap().len());

        let mut params = Params::new();
        params.push(1, json!("000000000000000000000001"));
        store.execute(
            Plan::DeleteOne {
                database: SmolStr::new("e_store"),
                collection: SmolStr::new("brands"),
                filter: Match::eq("_id", 1),
            },
            params,
        )?;
        assert!(store.collection("e_store", "brands").unwrap().is_empty());
        Ok(())
    }

    #[test]
    fn test_update_merges_set_document() -> Result<()> {
        let mut store = MemoryStore::new();
        ensure(&mut store);
        store.execute(
            Plan::InsertMany {
                database: SmolStr::new("e_store"),
                collection: SmolStr::new("brands"),
                docs: vec![json!({"_id": "000000000000000000000001", "name": "a", "rank": 3})],
            },
            Params::new(),
        )?;
        let mut params = Params::new();
        params.push(1, json!("000000000000000000000001"));
        store.execute(
            Plan::UpdateOne {
                database: SmolStr::new("e_store"),
                collection: SmolStr::new("brands"),
                filter: Match::eq("_id", 1),
                set: json!({"$set": {"name": "b"}}),
            },
            params,
        )?;
        let doc = store
            .collection("e_store", "brands")
            .unwrap()
            .get("000000000000000000000001")
            .unwrap();
        assert_eq!(json!("b"), doc["name"]);
        assert_eq!(json!(3), doc["rank"]);
        Ok(())
    }

    #[test]
    fn test_execute_against_unknown_collection() {
        let mut store = MemoryStore::new();
        let result = store.execute(
            Plan::InsertMany {
                database: SmolStr::new("nope"),
                collection: SmolStr::new("nope"),
                docs: vec![],
            },
            Params::new(),
        );
        assert!(matches!(result, Err(Error::Store(_))));
    }
}
