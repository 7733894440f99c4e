//! The schema object model: a runtime, introspectable description of a
//! GraphQL schema that the execution core dispatches against.
//!
//! Schema construction, SDL parsing and validation are out of scope — this
//! module only fixes the *contract* the execution core relies on: a map
//! from type name to type, object types exposing field definitions, and
//! field definitions carrying typed arguments, a return type and optional
//! resolver hooks. This mirrors a `Type`/`Field`/`Registry` object model
//! generalized onto a dynamic, hook-carrying shape built from closures
//! rather than a static, derive-macro-driven `ObjectType` trait.

pub mod coerce;
pub mod scalars;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use indexmap::IndexMap;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::abort::AbortSignal;
use crate::ast;
use crate::error::{FieldResult, InputValueResult};
use crate::future::MaybeFuture;
use crate::path::Path;

/// An output or input type reference as it appears on a field/argument/
/// variable: `Int`, `[Int]`, `Int!`, etc. Reuses the AST's wrapper shape —
/// the only difference between "input type reference" and "output type
/// reference" is which half of `types` the name resolves into.
pub type TypeRef = ast::Type;

/// A request-scoped, type-keyed bag of arbitrary context data (database
/// handles, loaders, the authenticated user, ...). Populated once before
/// execution starts and read-only afterward.
#[derive(Default)]
pub struct Data(HashMap<TypeId, Box<dyn Any + Send + Sync>>);

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> &mut Self {
        self.0.insert(TypeId::of::<T>(), Box::new(value));
        self
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.0.get(&TypeId::of::<T>()).and_then(|v| v.downcast_ref())
    }
}

/// What a resolver is given: the parent value, its coerced arguments, the
/// field coordinates, and the ambient request data.
pub struct ResolverContext<'a> {
    pub source: &'a serde_json::Value,
    pub args: &'a IndexMap<String, serde_json::Value>,
    pub field_name: &'a str,
    pub parent_type: &'a str,
    pub return_type: &'a TypeRef,
    pub path: &'a Path,
    pub context_data: &'a Data,
    pub root_value: &'a serde_json::Value,
    pub abort_signal: Option<&'a AbortSignal>,
}

/// A resolver's eventual result: either ready immediately (no future
/// allocated) or pending on a boxed future — the promise-or-value fusion
/// applied at the actual resolver boundary, rather than only internally.
pub type FieldFuture<'a> = MaybeFuture<'a, FieldResult<Option<serde_json::Value>>>;
pub type ResolverFn = Arc<dyn for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync>;

pub type SubscribeFuture<'a> = BoxFuture<'a, FieldResult<BoxStream<'static, serde_json::Value>>>;
pub type SubscribeFn = Arc<dyn for<'a> Fn(ResolverContext<'a>) -> SubscribeFuture<'a> + Send + Sync>;

pub type IsTypeOfFn =
    Arc<dyn for<'a> Fn(&'a serde_json::Value, &'a Data) -> BoxFuture<'a, bool> + Send + Sync>;
pub type ResolveTypeFn = Arc<
    dyn for<'a> Fn(&'a serde_json::Value, &'a Data) -> BoxFuture<'a, Option<String>> + Send + Sync,
>;

pub type ParseValueFn =
    Arc<dyn Fn(&serde_json::Value) -> InputValueResult<serde_json::Value> + Send + Sync>;
pub type ParseLiteralFn =
    Arc<dyn Fn(&ast::Value) -> InputValueResult<serde_json::Value> + Send + Sync>;
pub type SerializeFn = Arc<dyn Fn(&serde_json::Value) -> Option<serde_json::Value> + Send + Sync>;

#[derive(Clone)]
pub struct InputValueDefinition {
    pub name: String,
    pub input_type: TypeRef,
    pub default_value: Option<ast::Value>,
}

impl InputValueDefinition {
    pub fn new(name: impl Into<String>, input_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            input_type,
            default_value: None,
        }
    }

    pub fn default_value(mut self, value: ast::Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

pub struct FieldDefinition {
    pub name: String,
    pub arguments: IndexMap<String, InputValueDefinition>,
    pub return_type: TypeRef,
    pub resolve: Option<ResolverFn>,
    pub subscribe: Option<SubscribeFn>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, return_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            arguments: IndexMap::new(),
            return_type,
            resolve: None,
            subscribe: None,
        }
    }

    pub fn argument(mut self, arg: InputValueDefinition) -> Self {
        self.arguments.insert(arg.name.clone(), arg);
        self
    }

    pub fn resolve(mut self, f: ResolverFn) -> Self {
        self.resolve = Some(f);
        self
    }

    pub fn subscribe(mut self, f: SubscribeFn) -> Self {
        self.subscribe = Some(f);
        self
    }
}

#[derive(Clone)]
pub struct EnumValueDefinition {
    pub value: serde_json::Value,
}

pub struct ScalarType {
    pub name: String,
    pub parse_value: ParseValueFn,
    pub parse_literal: ParseLiteralFn,
    pub serialize: SerializeFn,
}

pub struct ObjectType {
    pub name: String,
    pub fields: IndexMap<String, FieldDefinition>,
    pub interfaces: HashSet<String>,
    pub is_type_of: Option<IsTypeOfFn>,
}

impl ObjectType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            interfaces: HashSet::new(),
            is_type_of: None,
        }
    }

    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.insert(interface.into());
        self
    }

    pub fn is_type_of(mut self, f: IsTypeOfFn) -> Self {
        self.is_type_of = Some(f);
        self
    }
}

pub struct InterfaceType {
    pub name: String,
    pub fields: IndexMap<String, FieldDefinition>,
    pub possible_types: HashSet<String>,
    pub resolve_type: Option<ResolveTypeFn>,
}

impl InterfaceType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            possible_types: HashSet::new(),
            resolve_type: None,
        }
    }

    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn possible_type(mut self, name: impl Into<String>) -> Self {
        self.possible_types.insert(name.into());
        self
    }

    pub fn resolve_type(mut self, f: ResolveTypeFn) -> Self {
        self.resolve_type = Some(f);
        self
    }
}

pub struct UnionType {
    pub name: String,
    pub possible_types: HashSet<String>,
    pub resolve_type: Option<ResolveTypeFn>,
}

impl UnionType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            possible_types: HashSet::new(),
            resolve_type: None,
        }
    }

    pub fn possible_type(mut self, name: impl Into<String>) -> Self {
        self.possible_types.insert(name.into());
        self
    }

    pub fn resolve_type(mut self, f: ResolveTypeFn) -> Self {
        self.resolve_type = Some(f);
        self
    }
}

pub struct EnumType {
    pub name: String,
    pub values: IndexMap<String, EnumValueDefinition>,
}

impl EnumType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: IndexMap::new(),
        }
    }

    pub fn value(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.insert(name.into(), EnumValueDefinition { value });
        self
    }
}

pub struct InputObjectType {
    pub name: String,
    pub fields: IndexMap<String, InputValueDefinition>,
}

impl InputObjectType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn field(mut self, field: InputValueDefinition) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }
}

pub enum Type {
    Scalar(ScalarType),
    Object(ObjectType),
    Interface(InterfaceType),
    Union(UnionType),
    Enum(EnumType),
    InputObject(InputObjectType),
}

impl Type {
    pub fn name(&self) -> &str {
        match self {
            Type::Scalar(t) => &t.name,
            Type::Object(t) => &t.name,
            Type::Interface(t) => &t.name,
            Type::Union(t) => &t.name,
            Type::Enum(t) => &t.name,
            Type::InputObject(t) => &t.name,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Type::Scalar(_) | Type::Enum(_))
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, Type::Interface(_) | Type::Union(_))
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Type::Object(_) | Type::Interface(_) | Type::Union(_))
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Type::Scalar(_) | Type::Enum(_) | Type::InputObject(_))
    }

    pub fn fields(&self) -> Option<&IndexMap<String, FieldDefinition>> {
        match self {
            Type::Object(t) => Some(&t.fields),
            Type::Interface(t) => Some(&t.fields),
            _ => None,
        }
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields().and_then(|fields| fields.get(name))
    }

    pub fn possible_types(&self) -> Option<&HashSet<String>> {
        match self {
            Type::Interface(t) => Some(&t.possible_types),
            Type::Union(t) => Some(&t.possible_types),
            _ => None,
        }
    }

    /// Whether `type_name` is (or, for a concrete object, equals) a runtime
    /// member of this type — the rule used both for fragment-type-condition
    /// matching (4.2) and for validating a resolved abstract type (4.4.2).
    pub fn is_possible_type(&self, type_name: &str) -> bool {
        match self {
            Type::Object(t) => t.name == type_name,
            Type::Interface(t) => t.possible_types.contains(type_name),
            Type::Union(t) => t.possible_types.contains(type_name),
            _ => false,
        }
    }
}

pub struct Schema {
    pub types: HashMap<String, Type>,
    pub query_type: String,
    pub mutation_type: Option<String>,
    pub subscription_type: Option<String>,
    /// Whether the operation carries an `errorPropagation` style directive
    /// telling the executor whether a resolver error bubbles past a
    /// non-null ancestor. Defaults to enabled.
    pub error_propagation_default: bool,
}

impl Schema {
    pub fn new(query_type: impl Into<String>) -> Self {
        Self {
            types: HashMap::new(),
            query_type: query_type.into(),
            mutation_type: None,
            subscription_type: None,
            error_propagation_default: true,
        }
    }

    pub fn mutation_type(mut self, name: impl Into<String>) -> Self {
        self.mutation_type = Some(name.into());
        self
    }

    pub fn subscription_type(mut self, name: impl Into<String>) -> Self {
        self.subscription_type = Some(name.into());
        self
    }

    pub fn error_propagation(mut self, enabled: bool) -> Self {
        self.error_propagation_default = enabled;
        self
    }

    pub fn type_(mut self, ty: Type) -> Self {
        self.types.insert(ty.name().to_string(), ty);
        self
    }

    pub fn get_type(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    pub fn get_object_type(&self, name: &str) -> Option<&ObjectType> {
        match self.types.get(name) {
            Some(Type::Object(obj)) => Some(obj),
            _ => None,
        }
    }

    pub fn get_field(&self, type_name: &str, field_name: &str) -> Option<&FieldDefinition> {
        self.types.get(type_name)?.field_by_name(field_name)
    }

    pub fn root_type_name(&self, op: ast::OperationType) -> Option<&str> {
        match op {
            ast::OperationType::Query => Some(&self.query_type),
            ast::OperationType::Mutation => self.mutation_type.as_deref(),
            ast::OperationType::Subscription => self.subscription_type.as_deref(),
        }
    }

    /// Is `sub_name` an object type that could appear at runtime wherever
    /// `super_name` (an object, interface, or union type) is declared?
    pub fn is_sub_type(&self, super_name: &str, sub_name: &str) -> bool {
        if super_name == sub_name {
            return true;
        }
        match self.types.get(super_name) {
            Some(ty) if ty.is_abstract() => ty.is_possible_type(sub_name),
            _ => false,
        }
    }
}
