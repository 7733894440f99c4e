//! Parsed-document node types.
//!
//! The parser that produces these nodes is an external collaborator (out of
//! scope for this crate); what lives here is the contract the execution core
//! consumes — selection sets, fragments, directives and literal values.

use indexmap::IndexMap;
use std::fmt;
use std::ops::Deref;

pub type Name = String;

/// A location within the source document, used only for error reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A node annotated with its source position.
#[derive(Debug, Clone)]
pub struct Positioned<T> {
    pub pos: Pos,
    pub node: T,
}

impl<T> Positioned<T> {
    pub fn new(pos: Pos, node: T) -> Self {
        Self { pos, node }
    }

    pub fn position(&self) -> Pos {
        self.pos
    }
}

impl<T> Deref for Positioned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.node
    }
}

/// A literal value as it appears in an operation document: may reference a
/// variable, which the coercion layer (`schema::coerce`) resolves against
/// the request's variable values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Variable(Name),
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Enum(Name),
    List(Vec<Value>),
    Object(IndexMap<Name, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Collects the names of every variable referenced anywhere inside this
    /// value, depth-first, left-to-right.
    pub fn referenced_variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_referenced_variables(&mut out);
        out
    }

    fn collect_referenced_variables<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Value::Variable(name) => out.push(name.as_str()),
            Value::List(items) => items.iter().for_each(|v| v.collect_referenced_variables(out)),
            Value::Object(fields) => fields.values().for_each(|v| v.collect_referenced_variables(out)),
            _ => {}
        }
    }
}

/// An input type reference as written in the document (`Int`, `[Int]`, `Int!`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Named(Name),
    List(Box<Type>),
    NonNull(Box<Type>),
}

impl Type {
    pub fn inner_name(&self) -> &str {
        match self {
            Type::Named(name) => name,
            Type::List(inner) | Type::NonNull(inner) => inner.inner_name(),
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, Type::NonNull(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Named(name) => write!(f, "{}", name),
            Type::List(inner) => write!(f, "[{}]", inner),
            Type::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Directive {
    pub name: Name,
    pub arguments: Vec<(Positioned<Name>, Positioned<Value>)>,
}

impl Directive {
    pub fn get_argument(&self, name: &str) -> Option<&Positioned<Value>> {
        self.arguments
            .iter()
            .find(|(arg_name, _)| arg_name.node == name)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    pub items: Vec<Selection>,
}

#[derive(Debug, Clone)]
pub enum Selection {
    Field(Positioned<Field>),
    FragmentSpread(Positioned<FragmentSpread>),
    InlineFragment(Positioned<InlineFragment>),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub alias: Option<Positioned<Name>>,
    pub name: Positioned<Name>,
    pub arguments: Vec<(Positioned<Name>, Positioned<Value>)>,
    pub directives: Vec<Positioned<Directive>>,
    pub selection_set: Positioned<SelectionSet>,
}

impl Field {
    /// The alias if present, else the field name — the grouped-field-set key.
    pub fn response_key(&self) -> &str {
        self.alias.as_ref().map(|a| a.node.as_str()).unwrap_or(&self.name.node)
    }

    pub fn get_argument(&self, name: &str) -> Option<&Positioned<Value>> {
        self.arguments
            .iter()
            .find(|(arg_name, _)| arg_name.node == name)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone)]
pub struct FragmentSpread {
    pub fragment_name: Name,
    pub directives: Vec<Positioned<Directive>>,
}

#[derive(Debug, Clone)]
pub struct TypeCondition {
    pub on: Name,
}

#[derive(Debug, Clone)]
pub struct InlineFragment {
    pub type_condition: Option<Positioned<TypeCondition>>,
    pub directives: Vec<Positioned<Directive>>,
    pub selection_set: Positioned<SelectionSet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationType::Query => "query",
            OperationType::Mutation => "mutation",
            OperationType::Subscription => "subscription",
        })
    }
}

#[derive(Debug, Clone)]
pub struct VariableDefinition {
    pub name: Positioned<Name>,
    pub var_type: Positioned<Type>,
    pub default_value: Option<Positioned<Value>>,
}

#[derive(Debug, Clone)]
pub struct OperationDefinition {
    pub ty: OperationType,
    pub name: Option<Name>,
    pub variable_definitions: Vec<Positioned<VariableDefinition>>,
    pub directives: Vec<Positioned<Directive>>,
    pub selection_set: Positioned<SelectionSet>,
}

#[derive(Debug, Clone)]
pub struct FragmentDefinition {
    pub name: Name,
    pub type_condition: Positioned<TypeCondition>,
    pub variable_definitions: Vec<Positioned<VariableDefinition>>,
    pub directives: Vec<Positioned<Directive>>,
    pub selection_set: Positioned<SelectionSet>,
}

/// A parsed operation document: a set of named operations plus the
/// fragments they may spread.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub operations: Vec<Positioned<OperationDefinition>>,
    pub fragments: IndexMap<Name, FragmentDefinition>,
}

impl Document {
    /// Locates the operation to execute: by name if given, else the sole
    /// operation, else an error if the document declares more than one.
    pub fn get_operation(&self, operation_name: Option<&str>) -> Result<&OperationDefinition, String> {
        match operation_name {
            Some(name) => self
                .operations
                .iter()
                .map(|p| &p.node)
                .find(|op| op.name.as_deref() == Some(name))
                .ok_or_else(|| format!("Unknown operation named \"{}\".", name)),
            None => match self.operations.len() {
                0 => Err("Must provide an operation.".to_string()),
                1 => Ok(&self.operations[0].node),
                _ => Err("Must provide operation name if query contains multiple operations.".to_string()),
            },
        }
    }
}
