//! MongoDB engine: documents `{_id: key, value}` in a collection per stash

use super::{frame_str, Backend};
use crate::config::Engine;
use mongodb::bson::{doc, Document};
use mongodb::options::ReplaceOptions;
use mongodb::sync::{Client, Collection};
use stash_core::{Error, Result};

fn mongo_error(operation: &'static str) -> impl Fn(mongodb::error::Error) -> Error {
    move |e| Error::backend("mongo", operation, e)
}

#[derive(Debug)]
pub struct MongoBackend {
    collection: Collection<Document>,
}

/// Collection name for a stash name; path separators become dots
fn collection_name(name: &str) -> String {
    name.replace(['/', '\\'], ".")
}

impl MongoBackend {
    pub fn open(url: &str, dbname: &str, name: &str) -> Result<Self> {
        let client = Client::with_uri_str(url).map_err(mongo_error("connect"))?;
        let collection = client
            .database(dbname)
            .collection::<Document>(&collection_name(name));
        Ok(Self { collection })
    }

    fn value_of(document: &Document) -> Result<Vec<u8>> {
        document
            .get_str("value")
            .map(|v| v.as_bytes().to_vec())
            .map_err(|e| Error::backend("mongo", "read", e))
    }
}

impl Backend for MongoBackend {
    fn engine(&self) -> Engine {
        Engine::Mongo
    }

    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let key = frame_str(Engine::Mongo, key)?;
        let found = self
            .collection
            .find_one(doc! { "_id": key }, None)
            .map_err(mongo_error("get"))?;
        found.as_ref().map(Self::value_of).transpose()
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let key = frame_str(Engine::Mongo, key)?;
        let value = frame_str(Engine::Mongo, value)?;
        let options = ReplaceOptions::builder().upsert(true).build();
        self.collection
            .replace_one(doc! { "_id": key }, doc! { "_id": key, "value": value }, options)
            .map_err(mongo_error("set"))?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let key = frame_str(Engine::Mongo, key)?;
        let result = self
            .collection
            .delete_one(doc! { "_id": key }, None)
            .map_err(mongo_error("delete"))?;
        Ok(result.deleted_count > 0)
    }

    fn len(&mut self) -> Result<usize> {
        let count = self
            .collection
            .count_documents(None, None)
            .map_err(mongo_error("len"))?;
        Ok(usize::try_from(count).unwrap_or(usize::MAX))
    }

    fn keys(&mut self) -> Result<Vec<Vec<u8>>> {
        Ok(self.items()?.into_iter().map(|(k, _)| k).collect())
    }

    fn items(&mut self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let cursor = self
            .collection
            .find(None, None)
            .map_err(mongo_error("iterate"))?;
        let mut items = Vec::new();
        for document in cursor {
            let document = document.map_err(mongo_error("iterate"))?;
            let key = document
                .get_str("_id")
                .map_err(|e| Error::backend("mongo", "read", e))?;
            items.push((key.as_bytes().to_vec(), Self::value_of(&document)?));
        }
        Ok(items)
    }

    fn clear(&mut self) -> Result<()> {
        self.collection
            .delete_many(doc! {}, None)
            .map_err(mongo_error("clear"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_name_from_nested_stash() {
        assert_eq!(collection_name("parent/child"), "parent.child");
        assert_eq!(collection_name("flat"), "flat");
    }

    #[test]
    #[ignore = "needs a mongod on localhost"]
    fn test_round_trip_against_local_server() {
        let mut backend = MongoBackend::open("mongodb://127.0.0.1:27017", "stash", "unit").unwrap();
        backend.clear().unwrap();
        backend.set(b"a2V5", b"dmFsdWU=").unwrap();
        assert_eq!(backend.get(b"a2V5").unwrap(), Some(b"dmFsdWU=".to_vec()));
        assert_eq!(backend.keys().unwrap(), vec![b"a2V5".to_vec()]);
        backend.clear().unwrap();
    }
}
