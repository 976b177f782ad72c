//! Abstract Syntax Tree for the Thrift IDL.
//!
//! One [`Thrift`] value is produced per source file. Cross-declaration references
//! (a field typed with another struct's name, a service's `extends`, a constant
//! referring to another constant) are kept as plain names and resolved by whoever
//! consumes the model.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Line/column of a syntactic node (1-based). Zeroed when positions are disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Pos {
    pub line: usize,
    pub col: usize,
}

/// Root of one parsed file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Thrift {
    pub filename: String,
    /// Include name (file stem) -> path. Literal path after parsing, canonical path after resolution.
    pub includes: HashMap<String, PathBuf>,
    pub namespaces: HashMap<String, String>,
    pub typedefs: HashMap<String, Typedef>,
    pub constants: HashMap<String, Constant>,
    pub enums: HashMap<String, Enum>,
    pub senums: HashMap<String, SEnum>,
    pub structs: HashMap<String, Struct>,
    pub exceptions: HashMap<String, Struct>,
    pub unions: HashMap<String, Struct>,
    pub templates: HashMap<String, TemplateDef>,
    pub services: HashMap<String, Service>,
}

/// The type of a field, argument, return value, constant or typedef.
///
/// `name` is a base type (`i32`, `string`, ...), a container kind (`map`, `list`, `set`)
/// or a user type name. Containers carry their element types in `key_type` (map only)
/// and `value_type`. A not-yet-expanded template reference carries `template_instance`
/// and its `name` is the composite name of the struct it will expand to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Type {
    pub pos: Pos,
    pub name: String,
    pub key_type: Option<Box<Type>>,
    pub value_type: Option<Box<Type>>,
    pub annotations: Vec<Annotation>,
    pub template_instance: Option<TemplateInstance>,
}

impl Type {
    /// A base or user type referenced by name.
    pub fn named(name: impl Into<String>) -> Self {
        Type {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type {
            name: "map".to_string(),
            key_type: Some(Box::new(key)),
            value_type: Some(Box::new(value)),
            ..Default::default()
        }
    }

    pub fn list(value: Type) -> Self {
        Type {
            name: "list".to_string(),
            value_type: Some(Box::new(value)),
            ..Default::default()
        }
    }

    pub fn set(value: Type) -> Self {
        Type {
            name: "set".to_string(),
            value_type: Some(Box::new(value)),
            ..Default::default()
        }
    }

    /// A reference to `template` applied to `args`, named after the struct it expands to.
    pub fn instance(template: impl Into<String>, args: Vec<Type>) -> Self {
        let instance = TemplateInstance {
            template_name: template.into(),
            type_args: args,
        };
        Type {
            name: instance.type_name(),
            template_instance: Some(instance),
            ..Default::default()
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self.name.as_str(), "map" | "list" | "set") && self.value_type.is_some()
    }

    /// Identifier-safe rendering used in instance names: `list<i32>` becomes `list_i32`,
    /// `map<string,list<i64>>` becomes `map_string_list_i64`.
    pub fn mangled_name(&self) -> String {
        match (self.name.as_str(), &self.key_type, &self.value_type) {
            ("map", Some(key), Some(value)) => format!("map_{}_{}", key.mangled_name(), value.mangled_name()),
            ("list", None, Some(value)) => format!("list_{}", value.mangled_name()),
            ("set", None, Some(value)) => format!("set_{}", value.mangled_name()),
            _ => self.name.clone(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name.as_str(), &self.key_type, &self.value_type) {
            ("map", Some(key), Some(value)) => write!(f, "map<{},{}>", key, value),
            ("list", None, Some(value)) => write!(f, "list<{}>", value),
            ("set", None, Some(value)) => write!(f, "set<{}>", value),
            _ => f.write_str(&self.name),
        }
    }
}

/// A template applied to concrete type arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateInstance {
    pub template_name: String,
    pub type_args: Vec<Type>,
}

impl TemplateInstance {
    /// Name of the struct this instance expands to: `Template__Arg0__Arg1`.
    pub fn type_name(&self) -> String {
        let args: Vec<String> = self.type_args.iter().map(Type::mangled_name).collect();
        format!("{}__{}", self.template_name, args.join("__"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    pub pos: Pos,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Typedef {
    pub pos: Pos,
    pub comment: String,
    pub alias: String,
    pub ty: Type,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumValue {
    pub pos: Pos,
    pub comment: String,
    pub name: String,
    pub value: i64,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enum {
    pub pos: Pos,
    pub comment: String,
    pub name: String,
    pub values: HashMap<String, EnumValue>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SEnumValue {
    pub pos: Pos,
    pub comment: String,
    pub value: String,
    pub annotations: Vec<Annotation>,
}

/// String enum: the values are the strings themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SEnum {
    pub pos: Pos,
    pub comment: String,
    pub name: String,
    pub values: HashMap<String, SEnumValue>,
    pub annotations: Vec<Annotation>,
}

/// Literal value of a constant or a field default.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Double(f64),
    Bool(bool),
    String(String),
    /// Bare reference to another constant, unresolved.
    Identifier(String),
    List(Vec<ConstValue>),
    Set(Vec<ConstValue>),
    /// Entries in source order; duplicate keys are kept.
    Map(Vec<KeyValue>),
}

impl ConstValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConstValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConstValue::String(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub key: ConstValue,
    pub value: ConstValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub pos: Pos,
    pub comment: String,
    pub name: String,
    pub ty: Type,
    pub value: ConstValue,
}

/// A numbered field of a struct, union, exception, method argument list or throws clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Field {
    pub pos: Pos,
    pub comment: String,
    pub id: i32,
    pub name: String,
    pub optional: bool,
    pub ty: Type,
    pub default: Option<ConstValue>,
    pub annotations: Vec<Annotation>,
}

/// Shared shape of structs, unions and exceptions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Struct {
    pub pos: Pos,
    pub comment: String,
    pub name: String,
    pub fields: Vec<Field>,
    pub annotations: Vec<Annotation>,
}

/// A struct body parametrised by type parameter names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateDef {
    pub def: Struct,
    pub type_params: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Method {
    pub pos: Pos,
    pub comment: String,
    pub name: String,
    pub oneway: bool,
    /// `None` for `void`.
    pub return_type: Option<Type>,
    pub arguments: Vec<Field>,
    pub exceptions: Vec<Field>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Service {
    pub pos: Pos,
    pub comment: String,
    pub name: String,
    /// Base service name, unresolved.
    pub extends: Option<String>,
    pub methods: HashMap<String, Method>,
    pub annotations: Vec<Annotation>,
}
