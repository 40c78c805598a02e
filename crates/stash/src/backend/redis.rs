//! Redis engine: one hash per stash, keyed `<dbname>:<name>`

use super::{frame_str, Backend};
use crate::config::Engine;
use redis::{Client, Commands, Connection, RedisError};
use stash_core::{Error, Result};

fn redis_error(operation: &'static str) -> impl Fn(RedisError) -> Error {
    move |e| Error::backend("redis", operation, e)
}

pub struct RedisBackend {
    conn: Connection,
    namespace: String,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl RedisBackend {
    pub fn open(url: &str, dbname: &str, name: &str) -> Result<Self> {
        let client = Client::open(url).map_err(redis_error("open"))?;
        let conn = client.get_connection().map_err(redis_error("connect"))?;
        Ok(Self {
            conn,
            namespace: format!("{dbname}:{name}"),
        })
    }
}

impl Backend for RedisBackend {
    fn engine(&self) -> Engine {
        Engine::Redis
    }

    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let key = frame_str(Engine::Redis, key)?;
        self.conn
            .hget(&self.namespace, key)
            .map_err(redis_error("get"))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let key = frame_str(Engine::Redis, key)?;
        let value = frame_str(Engine::Redis, value)?;
        self.conn
            .hset(&self.namespace, key, value)
            .map_err(redis_error("set"))
    }

    fn contains(&mut self, key: &[u8]) -> Result<bool> {
        let key = frame_str(Engine::Redis, key)?;
        self.conn
            .hexists(&self.namespace, key)
            .map_err(redis_error("contains"))
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let key = frame_str(Engine::Redis, key)?;
        let removed: i64 = self
            .conn
            .hdel(&self.namespace, key)
            .map_err(redis_error("delete"))?;
        Ok(removed > 0)
    }

    fn len(&mut self) -> Result<usize> {
        self.conn
            .hlen(&self.namespace)
            .map_err(redis_error("len"))
    }

    fn keys(&mut self) -> Result<Vec<Vec<u8>>> {
        self.conn
            .hkeys(&self.namespace)
            .map_err(redis_error("keys"))
    }

    fn items(&mut self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.conn
            .hgetall(&self.namespace)
            .map_err(redis_error("items"))
    }

    fn clear(&mut self) -> Result<()> {
        self.conn
            .del(&self.namespace)
            .map_err(redis_error("clear"))
    }
}
