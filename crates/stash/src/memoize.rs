//! Stash-backed memoization
//!
//! A memoized call is keyed by `(function, positional args, keyword args)`
//! serialized like any other key. Results are written after `f` returns
//! successfully; errors are never cached.

use crate::stash::Stash;
use stash_core::{Error, FunctionRef, Result, Value};
use std::collections::BTreeMap;

/// Keyword argument that skips the lookup and recomputes
pub const FORCE_KWARG: &str = "_force";

/// Arguments of a memoized call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    keyword: BTreeMap<String, Value>,
}

impl Args {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// Shorthand for `kwarg("_force", force)`
    #[must_use]
    pub fn force(self, force: bool) -> Self {
        self.kwarg(FORCE_KWARG, force)
    }

    #[must_use]
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    #[must_use]
    pub fn keyword(&self) -> &BTreeMap<String, Value> {
        &self.keyword
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    #[must_use]
    pub fn kw(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }

    /// Remove the force flag, returning whether it was set
    fn take_force(&mut self) -> bool {
        match self.keyword.remove(FORCE_KWARG) {
            Some(Value::Bool(force)) => force,
            Some(Value::Int(n)) => n != 0,
            Some(Value::None) | None => false,
            Some(_) => true,
        }
    }
}

/// A function whose results are cached in a stash
pub struct Memoized<F> {
    stash: Stash,
    function: FunctionRef,
    f: F,
}

impl<F> std::fmt::Debug for Memoized<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memoized")
            .field("function", &self.function.address())
            .field("stash", &self.stash)
            .finish_non_exhaustive()
    }
}

impl<F> Memoized<F>
where
    F: Fn(&Args) -> anyhow::Result<Value>,
{
    /// Registers `function` so it serializes as a bare reference
    pub fn new(stash: Stash, function: FunctionRef, f: F) -> Self {
        if function.closure().is_empty() {
            stash.registry().register_function(function.address());
        }
        Self { stash, function, f }
    }

    #[must_use]
    pub fn function(&self) -> &FunctionRef {
        &self.function
    }

    #[must_use]
    pub fn stash(&self) -> &Stash {
        &self.stash
    }

    /// The stash key a call is stored under
    ///
    /// When the first positional argument is a class or an instance the
    /// function is addressed as its method, so `obj.m(x)` and `C.m(obj, x)`
    /// share an entry.
    pub fn key(&self, args: &Args) -> Value {
        let function = match args.positional.first() {
            Some(Value::Instance(instance)) => self.method_of(&instance.address()),
            Some(Value::Class(class)) => self.method_of(&class.address()),
            _ => self.function.clone(),
        };
        Value::Tuple(vec![
            Value::Function(function),
            Value::Tuple(args.positional.clone()),
            Value::Dict(args.keyword.clone()),
        ])
    }

    fn method_of(&self, class_address: &str) -> FunctionRef {
        let method = self.function.as_method_of(class_address);
        if method.closure().is_empty() {
            self.stash.registry().register_function(method.address());
        }
        method
    }

    /// Answer from the stash, or call `f` and store its result
    ///
    /// The stash lock is not held while `f` runs.
    pub fn call(&self, mut args: Args) -> Result<Value> {
        let force = args.take_force();
        let key = self.key(&args);

        if !force {
            if let Some(value) = self.stash.get(key.clone())? {
                tracing::trace!(function = %self.function.address(), "memoized hit");
                return Ok(value);
            }
        }

        let value = (self.f)(&args)
            .map_err(|e| Error::callable(self.function.address(), e))?;
        self.stash.set(key, value.clone())?;
        Ok(value)
    }

    /// Call with `receiver` as the first positional argument
    pub fn call_method(&self, receiver: impl Into<Value>, mut args: Args) -> Result<Value> {
        args.positional.insert(0, receiver.into());
        self.call(args)
    }
}
