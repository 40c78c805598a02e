//! Instance cache, child stashes and process-wide memory stores

use serial_test::serial;
use stash::{create_stash, reset_instances, reset_registry, Compression, Engine, StashConfig, Value};
use std::thread;

fn config(root: &tempfile::TempDir, engine: Engine) -> StashConfig {
    StashConfig::builder()
        .with_engine(engine)
        .with_root_dir(root.path())
        .with_name("factory")
        .build()
        .unwrap()
}

#[test]
#[serial]
fn test_identity_ignores_the_serializer() {
    reset_instances();
    let root = tempfile::TempDir::new().unwrap();
    let a = create_stash(config(&root, Engine::Sqlite)).unwrap();

    let mut other = config(&root, Engine::Sqlite);
    other.serializer = stash::SerializerKind::JsonPickle;
    let b = create_stash(other).unwrap();
    assert!(a.same_instance(&b));

    let mut other = config(&root, Engine::Sqlite);
    other.dbname = "other".into();
    let c = create_stash(other).unwrap();
    assert!(!a.same_instance(&c));
    reset_instances();
}

#[test]
#[serial]
fn test_invalid_configurations_are_rejected() {
    reset_instances();
    let root = tempfile::TempDir::new().unwrap();
    let mut bad = config(&root, Engine::Shelve);
    bad.b64 = false;
    assert!(matches!(
        create_stash(bad),
        Err(stash::Error::Configuration { .. })
    ));
}

#[test]
#[serial]
fn test_children_nest_under_the_parent() {
    reset_instances();
    let root = tempfile::TempDir::new().unwrap();
    let parent = create_stash(config(&root, Engine::File)).unwrap();
    let child = parent.child("runs").unwrap();
    assert_eq!(child.name(), "factory/runs");
    assert!(child.same_instance(&parent.child("runs").unwrap()));

    child.set("k", 1).unwrap();
    assert!(!parent.contains("k").unwrap());
    assert!(root.path().join("factory/runs/files").is_dir());
    reset_instances();
}

#[test]
#[serial]
fn test_memory_stores_are_shared_by_path_until_reset() {
    reset_instances();
    reset_registry();
    let root = tempfile::TempDir::new().unwrap();
    let a = create_stash(config(&root, Engine::Memory)).unwrap();

    // A different encoding is a different handle on the same store
    let mut raw = config(&root, Engine::Memory);
    raw.compress = Compression::Raw;
    raw.b64 = false;
    let b = create_stash(raw).unwrap();
    assert!(!a.same_instance(&b));

    a.set("k", "v").unwrap();
    assert_eq!(b.len().unwrap(), 1);

    reset_registry();
    a.close().unwrap();
    assert_eq!(a.len().unwrap(), 0);
    reset_instances();
}

#[test]
#[serial]
fn test_concurrent_writers_on_one_handle() {
    reset_instances();
    let root = tempfile::TempDir::new().unwrap();
    let stash = create_stash(config(&root, Engine::Sqlite)).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let stash = stash.clone();
            thread::spawn(move || {
                for i in 0..20 {
                    stash.set(Value::tuple([t, i]), t * 100 + i).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(stash.len().unwrap(), 160);
    assert_eq!(stash.get(Value::tuple([3, 7])).unwrap(), Some(Value::Int(307)));
    reset_instances();
}

#[test]
#[serial]
fn test_guard_serializes_read_modify_write() {
    reset_instances();
    let root = tempfile::TempDir::new().unwrap();
    let stash = create_stash(config(&root, Engine::Memory)).unwrap();
    stash.set("counter", 0).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let stash = stash.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    let _guard = stash.lock();
                    let n = stash.get("counter").unwrap().and_then(|v| v.as_i64()).unwrap();
                    stash.set("counter", n + 1).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(stash.get("counter").unwrap(), Some(Value::Int(100)));
    reset_instances();
}
