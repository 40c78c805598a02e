//! Classes, functions, instances and opaque placeholders

use super::nodes::{self, Node, NodeMap};
use super::{SchemaMode, StructuralSerializer};
use stash_core::{ClassDef, ClassRef, Error, FunctionRef, Instance, Opaque, Result, Value};

/// Closure cell holding the function it belongs to
const SELF_CELL: &str = "<self>";

impl StructuralSerializer {
    fn unregistered(&self, address: &str, kind: &'static str) -> Result<()> {
        match self.schema {
            SchemaMode::Required => Err(Error::unregistered(address, kind)),
            SchemaMode::Lenient => Ok(()),
        }
    }

    pub(super) fn class_node(&self, class: &ClassRef) -> Result<Node> {
        match class {
            ClassRef::Inline(def) => self.class_def_node(def),
            ClassRef::Address(address) => {
                if let Some(def) = self.registry.class_def(address) {
                    return self.class_def_node(&def);
                }
                if !self.registry.is_native_class(address) {
                    self.unregistered(address, "class")?;
                }
                Ok(Node::Object(nodes::tagged(address.as_str())))
            }
        }
    }

    fn class_def_node(&self, def: &ClassDef) -> Result<Node> {
        let mut map = nodes::tagged(def.address());
        map.insert(nodes::NAME.into(), Node::String(def.name.clone()));
        map.insert(nodes::MODULE.into(), Node::String(def.module.clone()));
        map.insert(nodes::QUALNAME.into(), Node::String(def.qualname.clone()));
        map.insert(
            nodes::BASES.into(),
            Node::Array(def.bases.iter().cloned().map(Node::String).collect()),
        );
        map.insert(
            nodes::DICT.into(),
            Node::Object(self.to_node_map(&def.attributes)?),
        );
        let methods = def
            .methods
            .iter()
            .map(|(name, method)| Ok((name.clone(), self.function_node(method, false)?)))
            .collect::<Result<NodeMap>>()?;
        map.insert(nodes::METHODS.into(), Node::Object(methods));
        Ok(Node::Object(map))
    }

    /// `strict` applies the schema check to source-less unregistered
    /// functions; methods of inline classes are part of the class data
    pub(super) fn function_node(&self, function: &FunctionRef, strict: bool) -> Result<Node> {
        let address = function.address();
        let registered = self.registry.is_function(address);
        let mut map = nodes::tagged(address);

        if registered && function.closure().is_empty() {
            return Ok(Node::Object(map));
        }
        if function.source().is_none() && function.closure().is_empty() {
            if strict {
                self.unregistered(address, "function")?;
            }
            return Ok(Node::Object(map));
        }

        if let Some(source) = function.source() {
            map.insert(nodes::SRC.into(), Node::String(source.to_string()));
        }
        let cells = function
            .closure()
            .iter()
            .map(|(name, cell)| {
                let node = match cell {
                    Value::Function(inner) if inner.address() == address => {
                        Node::String(SELF_CELL.to_string())
                    }
                    Value::Function(inner) => Node::String(format!("<function {}>", inner.name())),
                    other => self.to_node(other)?,
                };
                Ok((name.clone(), node))
            })
            .collect::<Result<NodeMap>>()?;
        map.insert(nodes::CLOSURE.into(), Node::Object(cells));
        Ok(Node::Object(map))
    }

    pub(super) fn instance_node(&self, value: &Value, instance: &Instance) -> Result<Node> {
        let address = instance.address();

        if let Some(codec) = self.registry.codec(&address) {
            let mut map = codec.encode(value, self)?;
            map.insert(nodes::PY.into(), Node::String(address));
            return Ok(Node::Object(map));
        }

        let class = match instance.class() {
            ClassRef::Inline(def) => self.class_def_node(def)?,
            ClassRef::Address(class_address) => match self.registry.class_def(class_address) {
                Some(def) => self.class_def_node(&def)?,
                None => {
                    if !self.registry.is_native_class(class_address) {
                        self.unregistered(class_address, "instance")?;
                    }
                    Node::String(class_address.clone())
                }
            },
        };

        let mut map = nodes::tagged(address);
        map.insert(nodes::CLASS.into(), class);
        map.insert(
            nodes::STATE.into(),
            Node::Object(self.to_node_map(instance.state())?),
        );
        Ok(Node::Object(map))
    }

    pub(super) fn instance_from_node(&self, address: &str, map: &NodeMap) -> Result<Value> {
        let class = match map.get(nodes::CLASS) {
            None => ClassRef::Address(address.to_string()),
            Some(Node::String(class_address)) => ClassRef::Address(class_address.clone()),
            Some(Node::Object(class_map)) => {
                let class_address = nodes::str_field(class_map, address, nodes::PY)?;
                let def = self.class_def_from_map(class_address, class_map)?;
                self.registry.register_class_def(def.clone());
                ClassRef::from(def)
            }
            Some(_) => {
                return Err(Error::deserialization(
                    address,
                    "'__py_class__' must be an address or a class node",
                ))
            }
        };
        let state = self.from_node_map(nodes::object_field(map, address, nodes::STATE)?)?;

        if let ClassRef::Address(class_address) = &class {
            match self.registry.validate(class_address, &state) {
                Some(validation) => validation?,
                None if self.registry.class_def(class_address).is_some() => {}
                None => return Ok(self.opaque(address, map)),
            }
        }
        Ok(Value::Instance(Instance::new(class, state)))
    }

    pub(super) fn class_from_node(&self, address: &str, map: &NodeMap) -> Result<Value> {
        let def = self.class_def_from_map(address, map)?;
        self.registry.register_class_def(def.clone());
        Ok(Value::Class(ClassRef::from(def)))
    }

    fn class_def_from_map(&self, address: &str, map: &NodeMap) -> Result<ClassDef> {
        let bases = match map.get(nodes::BASES) {
            Some(_) => nodes::strings(nodes::array_field(map, address, nodes::BASES)?, address, "bases")?,
            None => Vec::new(),
        };
        let attributes = match map.get(nodes::DICT) {
            Some(_) => self.from_node_map(nodes::object_field(map, address, nodes::DICT)?)?,
            None => Default::default(),
        };
        let mut methods = std::collections::BTreeMap::new();
        if map.contains_key(nodes::METHODS) {
            for (name, node) in nodes::object_field(map, address, nodes::METHODS)? {
                let method = node.as_object().ok_or_else(|| {
                    Error::deserialization(address, format!("method '{name}' must be a function node"))
                })?;
                let method_address = nodes::str_field(method, address, nodes::PY)?;
                methods.insert(
                    name.clone(),
                    function_from_node(self, method_address, method)?,
                );
            }
        }
        Ok(ClassDef {
            name: nodes::str_field(map, address, nodes::NAME)?.to_string(),
            module: nodes::str_field(map, address, nodes::MODULE)?.to_string(),
            qualname: nodes::str_field(map, address, nodes::QUALNAME)?.to_string(),
            bases,
            attributes,
            methods,
        })
    }

    /// A bare `{__py__}` node: a registered class or function
    pub(super) fn reference_from_node(&self, address: &str, map: &NodeMap) -> Value {
        if self.registry.is_native_class(address) || self.registry.class_def(address).is_some() {
            Value::Class(ClassRef::Address(address.to_string()))
        } else if self.registry.is_function(address) {
            Value::Function(FunctionRef::new(address))
        } else {
            self.opaque(address, map)
        }
    }
}

/// A function carrying its own source and closure
pub(super) fn function_from_node(
    serializer: &StructuralSerializer,
    address: &str,
    map: &NodeMap,
) -> Result<FunctionRef> {
    let mut function = FunctionRef::new(address);
    match map.get(nodes::SRC) {
        None => {}
        Some(Node::String(source)) => function = function.with_source(source.clone()),
        Some(_) => return Err(Error::deserialization(address, "'__py_src__' must be a string")),
    }
    if map.contains_key(nodes::CLOSURE) {
        for (name, cell) in nodes::object_field(map, address, nodes::CLOSURE)? {
            let value = match cell {
                Node::String(s) if s == SELF_CELL => Value::Function(FunctionRef::new(address)),
                other => serializer.from_node(other)?,
            };
            function = function.with_closure(name.clone(), value);
        }
    }
    Ok(function)
}

/// Re-emit the node an opaque placeholder was read from
pub(super) fn opaque_node(opaque: &Opaque) -> Node {
    match serde_json::from_str::<Node>(&opaque.repr) {
        Ok(Node::Object(map))
            if map.get(nodes::PY).and_then(Node::as_str) == Some(opaque.address.as_str()) =>
        {
            Node::Object(map)
        }
        _ => {
            let mut map = nodes::tagged(opaque.address.as_str());
            map.insert(nodes::SRC.into(), Node::String(opaque.repr.clone()));
            Node::Object(map)
        }
    }
}
