//! End-to-end scenarios through the public stash API

use proptest::prelude::*;
use rand::Rng;
use stash::{Compression, Engine, SchemaMode, Value};
use stash_core::{ClassDef, FunctionRef, Instance, NdArray, State};
use std::collections::BTreeMap;

mod common;
use common::{open, open_with};

#[test]
fn test_small_value_round_trip() {
    let stash = open(Engine::Sqlite);
    let value = Value::from_json(serde_json::json!({"a": 1, "b": [true, null, "x"]}));
    stash.set("k", value).unwrap();

    let expected = Value::dict([
        ("a", Value::Int(1)),
        (
            "b",
            Value::List(vec![Value::Bool(true), Value::None, Value::from("x")]),
        ),
    ]);
    assert_eq!(stash.get("k").unwrap(), Some(expected));
    assert_eq!(stash.len().unwrap(), 1);
}

#[test]
fn test_compression_shrinks_repetitive_values() {
    let map: BTreeMap<String, &str> = (0..20_000)
        .map(|i| (format!("repeated-key-{i:06}"), "repeated value text"))
        .collect();
    let value = Value::from(map);

    let raw = open_with(Engine::Memory, Compression::Raw, SchemaMode::Required);
    let raw_frame = raw.frame(&value).unwrap();
    assert!(raw_frame.len() > 1_000_000);

    for compress in [
        Compression::Zlib,
        Compression::Lz4,
        Compression::Gzip,
        Compression::Bzip2,
        Compression::Blosc,
    ] {
        let stash = open_with(Engine::Memory, compress, SchemaMode::Required);
        let frame = stash.frame(&value).unwrap();
        assert!(
            frame.len() < raw_frame.len(),
            "{compress}: {} >= {}",
            frame.len(),
            raw_frame.len()
        );
        stash.set("big", value.clone()).unwrap();
        assert_eq!(stash.get("big").unwrap(), Some(value.clone()));
    }
}

#[test]
fn test_multi_shape_value() {
    let stash = open(Engine::File);
    let value = Value::dict([
        ("s", Value::from("abc")),
        ("n", Value::Int(42)),
        ("l", Value::from(vec![1, 2, 3])),
        ("m", Value::dict([("x", Value::from(vec![true]))])),
    ]);
    stash.set("shape", value.clone()).unwrap();
    assert_eq!(stash.get("shape").unwrap(), Some(value));
}

#[test]
fn test_very_large_value() {
    let stash = open(Engine::DiskCache);
    let mut rng = rand::thread_rng();
    let map: BTreeMap<String, Value> = (0..100_000)
        .map(|i| (format!("k{i}"), Value::Float(rng.gen::<f64>() * 1e6)))
        .collect();
    let value = Value::Dict(map);
    stash.set("large", value.clone()).unwrap();
    assert_eq!(stash.get("large").unwrap(), Some(value));
}

#[test]
fn test_rich_values_round_trip() {
    let stash = open(Engine::PairTree);
    let array = NdArray::from(ndarray::arr2(&[[1.5f64, 2.0], [3.25, -4.0]]));
    let value = Value::dict([
        ("array", Value::from(array)),
        ("set", Value::set([3, 1, 2])),
        ("frozen", Value::frozenset(["b", "a"])),
        ("bytes", Value::bytes(vec![0u8, 255, 10])),
        ("path", Value::path("/tmp/stash")),
        ("inf", Value::Float(f64::INFINITY)),
        ("tuple", Value::tuple([Value::None, Value::from("x")])),
    ]);
    stash.set(Value::tuple(["rich", "key"]), value.clone()).unwrap();
    assert_eq!(stash.get(Value::tuple(["rich", "key"])).unwrap(), Some(value));
}

#[test]
fn test_registered_instances_round_trip() {
    let stash = open(Engine::Sqlite);
    stash.registry().register_class("geometry.Point");
    let mut state = State::new();
    state.insert("x".into(), Value::Int(1));
    state.insert("y".into(), Value::Int(2));
    let point = Value::Instance(Instance::new("geometry.Point", state));

    stash.set("origin", point.clone()).unwrap();
    assert_eq!(stash.get("origin").unwrap(), Some(point));
}

#[test]
fn test_unregistered_types_fail_the_write_by_default() {
    let stash = open(Engine::Sqlite);
    let point = Value::Instance(Instance::new("geometry.Point", State::new()));
    let err = stash.set("origin", point).unwrap_err();
    assert!(matches!(err, stash::Error::UnregisteredType { .. }), "{err}");
    assert_eq!(stash.len().unwrap(), 0);
}

#[test]
fn test_embedded_source_survives_a_lost_address() {
    let stash = open_with(Engine::Sqlite, Compression::Zlib, SchemaMode::Lenient);
    let function = FunctionRef::new("scratch.double").with_source("fn double(x: i64) -> i64 { x * 2 }");
    stash.set("f", function.clone()).unwrap();

    // Nothing ever registered the address; the source travels with the entry
    assert!(!stash.registry().is_function("scratch.double"));
    assert_eq!(stash.get("f").unwrap(), Some(Value::Function(function)));
}

#[test]
fn test_inline_classes_are_synthesized_on_read() {
    let stash = open_with(Engine::Memory, Compression::Raw, SchemaMode::Lenient);
    let class = ClassDef::new("scratch", "Config").with_attribute("version", 3);
    let mut state = State::new();
    state.insert("debug".into(), Value::Bool(true));
    let instance = Value::Instance(Instance::new(class, state));

    stash.set("cfg", instance).unwrap();
    let read = stash.get("cfg").unwrap().unwrap();
    let read = read.as_instance().unwrap();
    assert_eq!(read.address(), "scratch.Config");
    assert_eq!(read.get("debug"), Some(&Value::Bool(true)));
    assert!(stash.registry().class_def("scratch.Config").is_some());
}

#[test]
fn test_every_serializer_stores_plain_values() {
    for serializer in stash::SerializerKind::ALL {
        let root = tempfile::TempDir::new().unwrap();
        let mut config = common::config(&root, Engine::Sqlite);
        config.serializer = serializer;
        let stash = stash::Stash::open(config).unwrap();
        let value = Value::dict([("n", Value::Int(1)), ("s", Value::from("two"))]);
        stash.set("k", value.clone()).unwrap();
        assert_eq!(stash.get("k").unwrap(), Some(value), "{serializer}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_string_maps_round_trip_through_files(
        entries in prop::collection::btree_map("[a-z_]{0,12}", any::<i64>(), 0..16)
    ) {
        let stash = open(Engine::File);
        let value = Value::from(entries.clone());
        stash.set("map", value.clone()).unwrap();
        prop_assert_eq!(stash.get("map").unwrap(), Some(value));
    }
}
