//! Every local engine passes the same mapping contract

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstest::rstest;
use stash::{Engine, Value};
use std::collections::HashSet;

mod common;
use common::{open, reopen};

fn sorted(mut keys: Vec<Value>) -> Vec<String> {
    let mut rendered: Vec<String> = keys.drain(..).map(|k| format!("{k:?}")).collect();
    rendered.sort();
    rendered
}

#[rstest]
fn test_set_then_get_contains_and_len(
    #[values(
        Engine::Memory,
        Engine::File,
        Engine::PairTree,
        Engine::Sqlite,
        Engine::Lmdb,
        Engine::Shelve,
        Engine::DiskCache,
        Engine::PickleDb
    )]
    engine: Engine,
) {
    let stash = open(engine);
    assert_eq!(stash.len().unwrap(), 0);

    stash.set("k", Value::from(1)).unwrap();
    assert!(stash.contains("k").unwrap());
    assert_eq!(stash.get("k").unwrap(), Some(Value::Int(1)));
    assert_eq!(stash.len().unwrap(), 1);

    // Overwriting does not grow the stash
    stash.set("k", Value::from(2)).unwrap();
    assert_eq!(stash.get("k").unwrap(), Some(Value::Int(2)));
    assert_eq!(stash.len().unwrap(), 1);

    stash.set(Value::tuple([1, 2]), "tuple key").unwrap();
    assert_eq!(stash.len().unwrap(), 2);
    assert_eq!(
        stash.get(Value::tuple([1, 2])).unwrap(),
        Some(Value::from("tuple key"))
    );
    // A list is a different key from a tuple with the same items
    assert!(!stash.contains(vec![1, 2]).unwrap());
}

#[rstest]
fn test_iteration_is_complete(
    #[values(
        Engine::Memory,
        Engine::File,
        Engine::PairTree,
        Engine::Sqlite,
        Engine::Lmdb,
        Engine::Shelve,
        Engine::DiskCache,
        Engine::PickleDb
    )]
    engine: Engine,
) {
    let stash = open(engine);
    let mut expected = Vec::new();
    for i in 0..25 {
        let key = Value::from(format!("key-{i}"));
        stash.set(key.clone(), i).unwrap();
        expected.push(key);
    }

    assert_eq!(sorted(stash.keys().unwrap()), sorted(expected));

    let values: HashSet<i64> = stash
        .values()
        .unwrap()
        .iter()
        .filter_map(Value::as_i64)
        .collect();
    assert_eq!(values, (0..25).collect());

    for (key, value) in stash.items().unwrap() {
        let i = value.as_i64().unwrap();
        assert_eq!(key, Value::from(format!("key-{i}")));
    }
    assert_eq!(stash.copy().unwrap().len(), 25);
}

#[rstest]
fn test_delete_pop_and_clear(
    #[values(
        Engine::Memory,
        Engine::File,
        Engine::PairTree,
        Engine::Sqlite,
        Engine::Lmdb,
        Engine::Shelve,
        Engine::DiskCache,
        Engine::PickleDb
    )]
    engine: Engine,
) {
    let stash = open(engine);
    stash
        .update([("a", 1), ("b", 2), ("c", 3)])
        .unwrap();
    assert_eq!(stash.len().unwrap(), 3);

    assert!(stash.delete("a").unwrap());
    assert!(!stash.delete("a").unwrap());
    assert_eq!(stash.pop("b").unwrap(), Some(Value::Int(2)));
    assert_eq!(stash.pop_or("b", 0).unwrap(), Value::Int(0));
    assert_eq!(stash.len().unwrap(), 1);

    stash.clear().unwrap();
    assert_eq!(stash.len().unwrap(), 0);
    assert!(stash.keys().unwrap().is_empty());
    assert!(stash.is_empty().unwrap());
}

#[rstest]
fn test_absent_reads_do_not_mutate(
    #[values(
        Engine::Memory,
        Engine::File,
        Engine::PairTree,
        Engine::Sqlite,
        Engine::Lmdb,
        Engine::Shelve,
        Engine::DiskCache,
        Engine::PickleDb
    )]
    engine: Engine,
) {
    let stash = open(engine);
    assert_eq!(stash.get("missing").unwrap(), None);
    assert_eq!(stash.get_or("missing", "fallback").unwrap(), Value::from("fallback"));
    assert!(!stash.contains("missing").unwrap());
    assert_eq!(stash.len().unwrap(), 0);
}

#[rstest]
fn test_boundary_keys_and_values(
    #[values(
        Engine::Memory,
        Engine::File,
        Engine::PairTree,
        Engine::Sqlite,
        Engine::Lmdb,
        Engine::Shelve,
        Engine::DiskCache,
        Engine::PickleDb
    )]
    engine: Engine,
) {
    let stash = open(engine);

    stash.set("", Value::Dict(Default::default())).unwrap();
    assert_eq!(
        stash.get("").unwrap(),
        Some(Value::Dict(Default::default()))
    );

    stash.set("ключ-🔑-鍵", "unicode").unwrap();
    assert_eq!(stash.get("ключ-🔑-鍵").unwrap(), Some(Value::from("unicode")));

    let nul = Value::bytes(b"\0before\0after\0".to_vec());
    stash.set("bytes", nul.clone()).unwrap();
    assert_eq!(stash.get("bytes").unwrap(), Some(nul));

    assert_eq!(stash.len().unwrap(), 3);
}

/// A hex string that compresses poorly, so its frame stays long
fn incompressible_key(len: usize) -> String {
    let mut rng = StdRng::seed_from_u64(7);
    (0..len)
        .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0'))
        .collect()
}

#[rstest]
fn test_long_keys(
    #[values(
        Engine::Memory,
        Engine::File,
        Engine::PairTree,
        Engine::Sqlite,
        Engine::Lmdb,
        Engine::Shelve,
        Engine::DiskCache,
        Engine::PickleDb
    )]
    engine: Engine,
) {
    let stash = open(engine);
    let key = Value::from(incompressible_key(2000));
    let memo_key = Value::tuple([
        Value::from(incompressible_key(1000)),
        Value::List((0..64).map(Value::from).collect()),
    ]);

    stash.set(key.clone(), 1).unwrap();
    stash.set(memo_key.clone(), 2).unwrap();
    assert_eq!(stash.get(key.clone()).unwrap(), Some(Value::Int(1)));
    assert_eq!(stash.get(memo_key.clone()).unwrap(), Some(Value::Int(2)));
    assert_eq!(
        sorted(stash.keys().unwrap()),
        sorted(vec![key.clone(), memo_key])
    );

    assert!(stash.delete(key.clone()).unwrap());
    assert!(!stash.contains(key).unwrap());
    assert_eq!(stash.len().unwrap(), 1);
}

#[rstest]
fn test_entries_survive_close_and_reopen(
    #[values(
        Engine::Memory,
        Engine::File,
        Engine::PairTree,
        Engine::Sqlite,
        Engine::Lmdb,
        Engine::Shelve,
        Engine::DiskCache,
        Engine::PickleDb
    )]
    engine: Engine,
) {
    let test = open(engine);
    test.set("persisted", vec!["a", "b"]).unwrap();
    test.close().unwrap();

    let reopened = reopen(&test);
    assert_eq!(
        reopened.get("persisted").unwrap(),
        Some(Value::List(vec!["a".into(), "b".into()]))
    );
    assert_eq!(reopened.len().unwrap(), 1);
}

#[test]
fn test_local_engines_cover_every_filesystem_engine() {
    for engine in Engine::ALL {
        let local = common::LOCAL_ENGINES.contains(&engine);
        assert_eq!(local, !matches!(engine, Engine::Redis | Engine::Mongo));
    }
}

#[test]
fn test_close_releases_the_disk_cache_lock() {
    let test = open(Engine::DiskCache);
    test.set("k", "v").unwrap();
    test.close().unwrap();

    // redb only grants one handle per file at a time
    let exclusive = redb::Database::create(test.config().path()).unwrap();
    drop(exclusive);

    assert_eq!(test.get("k").unwrap(), Some(Value::from("v")));
}
