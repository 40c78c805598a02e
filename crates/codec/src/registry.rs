//! Type registry: the set of "importable" addresses
//!
//! An address is importable when a class, a function or a custom node codec
//! has been registered under it. Importable classes and functions serialize
//! as a bare reference; everything else must carry its own definition or, in
//! schema-required mode, fails the write.

use crate::structural::{NodeMap, StructuralSerializer};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use stash_core::{ClassDef, Result, State, Stashable, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Checks stored instance state against a registered type
pub type StateValidator = Arc<dyn Fn(&State) -> Result<()> + Send + Sync>;

/// Custom encoding for values of one address
///
/// `encode` produces the node fields besides `__py__`; `decode` receives the
/// whole node. Codecs take precedence over the generic instance encoding.
pub trait NodeCodec: Send + Sync {
    fn encode(&self, value: &Value, serializer: &StructuralSerializer) -> Result<NodeMap>;

    fn decode(&self, node: &NodeMap, serializer: &StructuralSerializer) -> Result<Value>;
}

#[derive(Clone)]
enum ClassEntry {
    /// A Rust type, optionally validating instance state
    Native(Option<StateValidator>),
    /// A class rebuilt from its serialized definition
    Synthesized(ClassDef),
}

#[derive(Default)]
struct RegistryInner {
    classes: BTreeMap<String, ClassEntry>,
    functions: BTreeSet<String>,
    codecs: BTreeMap<String, Arc<dyn NodeCodec>>,
}

/// Address-keyed registry of classes, functions and node codecs
#[derive(Default)]
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

static SHARED: Lazy<Arc<TypeRegistry>> = Lazy::new(|| Arc::new(TypeRegistry::new()));

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("TypeRegistry")
            .field("classes", &inner.classes.keys().collect::<Vec<_>>())
            .field("functions", &inner.functions)
            .field("codecs", &inner.codecs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used when a stash is not given its own
    #[must_use]
    pub fn shared() -> Arc<TypeRegistry> {
        Arc::clone(&SHARED)
    }

    /// Register a Rust type; stored state is validated through `from_state`
    pub fn register<T: Stashable + 'static>(&self) {
        let validator: StateValidator = Arc::new(|state| T::from_state(state).map(|_| ()));
        self.inner
            .write()
            .classes
            .insert(T::ADDRESS.to_string(), ClassEntry::Native(Some(validator)));
    }

    /// Register a class address without state validation
    pub fn register_class(&self, address: impl Into<String>) {
        self.inner
            .write()
            .classes
            .insert(address.into(), ClassEntry::Native(None));
    }

    /// Register a class synthesized from its definition
    ///
    /// Native registrations win: a definition never shadows a Rust type.
    pub fn register_class_def(&self, def: ClassDef) {
        let mut inner = self.inner.write();
        let address = def.address();
        if !matches!(inner.classes.get(&address), Some(ClassEntry::Native(_))) {
            inner.classes.insert(address, ClassEntry::Synthesized(def));
        }
    }

    pub fn register_function(&self, address: impl Into<String>) {
        self.inner.write().functions.insert(address.into());
    }

    pub fn register_codec(&self, address: impl Into<String>, codec: Arc<dyn NodeCodec>) {
        self.inner.write().codecs.insert(address.into(), codec);
    }

    /// Whether `address` names a registered Rust type
    #[must_use]
    pub fn is_native_class(&self, address: &str) -> bool {
        matches!(
            self.inner.read().classes.get(address),
            Some(ClassEntry::Native(_))
        )
    }

    #[must_use]
    pub fn class_def(&self, address: &str) -> Option<ClassDef> {
        match self.inner.read().classes.get(address) {
            Some(ClassEntry::Synthesized(def)) => Some(def.clone()),
            _ => None,
        }
    }

    /// Whether `address` names a registered function or a method of a
    /// registered class
    #[must_use]
    pub fn is_function(&self, address: &str) -> bool {
        let inner = self.inner.read();
        if inner.functions.contains(address) {
            return true;
        }
        address
            .rsplit_once('.')
            .is_some_and(|(owner, _)| inner.classes.contains_key(owner))
    }

    #[must_use]
    pub fn codec(&self, address: &str) -> Option<Arc<dyn NodeCodec>> {
        self.inner.read().codecs.get(address).cloned()
    }

    /// Validate instance state for a native class
    ///
    /// Returns `None` when the address is not a native class.
    pub fn validate(&self, address: &str, state: &State) -> Option<Result<()>> {
        let validator = match self.inner.read().classes.get(address) {
            Some(ClassEntry::Native(validator)) => validator.clone(),
            _ => return None,
        };
        Some(validator.map_or(Ok(()), |validate| validate(state)))
    }

    /// Forget every registration
    pub fn clear(&self) {
        *self.inner.write() = RegistryInner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stash_core::Error;

    struct Counter(i64);

    impl Stashable for Counter {
        const ADDRESS: &'static str = "tests.Counter";

        fn to_state(&self) -> State {
            State::from([("n".to_string(), Value::Int(self.0))])
        }

        fn from_state(state: &State) -> Result<Self> {
            state
                .get("n")
                .and_then(Value::as_i64)
                .map(Counter)
                .ok_or_else(|| Error::missing_field(Self::ADDRESS, "n"))
        }
    }

    #[test]
    fn test_native_registration_validates_state() {
        let registry = TypeRegistry::new();
        registry.register::<Counter>();

        assert!(registry.is_native_class("tests.Counter"));
        assert!(registry
            .validate("tests.Counter", &Counter(3).to_state())
            .unwrap()
            .is_ok());
        assert!(registry
            .validate("tests.Counter", &State::new())
            .unwrap()
            .is_err());
        assert!(registry.validate("tests.Other", &State::new()).is_none());
    }

    #[test]
    fn test_methods_of_registered_classes_are_functions() {
        let registry = TypeRegistry::new();
        registry.register_class("shapes.Square");
        registry.register_function("shapes.area");

        assert!(registry.is_function("shapes.area"));
        assert!(registry.is_function("shapes.Square.area"));
        assert!(!registry.is_function("shapes.Circle.area"));
    }

    #[test]
    fn test_definitions_do_not_shadow_native_classes() {
        let registry = TypeRegistry::new();
        registry.register::<Counter>();
        registry.register_class_def(ClassDef::new("tests", "Counter"));
        assert!(registry.is_native_class("tests.Counter"));
        assert!(registry.class_def("tests.Counter").is_none());

        registry.register_class_def(ClassDef::new("tests", "Dynamic"));
        assert_eq!(
            registry.class_def("tests.Dynamic").map(|d| d.name),
            Some("Dynamic".to_string())
        );

        registry.clear();
        assert!(!registry.is_native_class("tests.Counter"));
    }
}
