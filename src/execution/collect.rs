//! Field collection.
//!
//! Converts a selection set plus a runtime object type into a grouped field
//! set and the defer usages newly introduced while walking it. Generalized
//! from a field-collection walk with `@defer` bookkeeping and
//! fragment-variable scoping that a static-schema collection walk never
//! needed.

use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::ast::{self, Positioned, Selection};
use crate::context::ExecutionContext;
use crate::schema::Schema;

/// Marks one occurrence of `@defer` in the operation. Nested defers carry
/// their enclosing usage as `parent`, forming a tree mirrored by deferred
/// fragment records later.
#[derive(Clone)]
pub struct DeferUsage {
    pub label: Option<String>,
    pub parent: Option<Arc<DeferUsage>>,
}

impl PartialEq for DeferUsage {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}
impl Eq for DeferUsage {}

impl std::hash::Hash for DeferUsage {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (self as *const DeferUsage).hash(state);
    }
}

/// The set of defer usages a field-details entry is nested under. Order
/// doesn't matter for plan-building purposes, only membership, so this is
/// compared/hashed as a set of pointers.
pub type DeferUsageSet = Vec<Arc<DeferUsage>>;

/// One merged occurrence of a field in the grouped field set: the AST node
/// plus the defer usage (if any) it was collected under and the coerced
/// variable-values scope of the fragment it came from, if any.
#[derive(Clone)]
pub struct FieldDetails {
    pub node: Positioned<ast::Field>,
    pub defer_usage: Option<Arc<DeferUsage>>,
    pub fragment_variable_values: Option<Rc<IndexMap<String, serde_json::Value>>>,
}

/// Response key → non-empty ordered list of field details. Iteration order
/// is the output field order.
#[derive(Clone, Default)]
pub struct GroupedFieldSet(pub IndexMap<String, Vec<FieldDetails>>);

impl GroupedFieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, key: String, details: FieldDetails) {
        self.0.entry(key).or_insert_with(Vec::new).push(details);
    }
}

/// Result of collecting one selection set: the grouped field set and any
/// defer usages introduced directly inside it.
pub struct CollectedFields {
    pub grouped_field_set: GroupedFieldSet,
    pub new_defer_usages: Vec<Arc<DeferUsage>>,
}

fn evaluate_skip_include(directives: &[Positioned<ast::Directive>]) -> bool {
    let mut skip = false;
    let mut include = true;
    for directive in directives {
        match directive.name.as_str() {
            "skip" => {
                if let Some(value) = directive.get_argument("if") {
                    if let ast::Value::Boolean(b) = &value.node {
                        skip = *b;
                    }
                }
            }
            "include" => {
                if let Some(value) = directive.get_argument("if") {
                    if let ast::Value::Boolean(b) = &value.node {
                        include = *b;
                    }
                }
            }
            _ => {}
        }
    }
    // @skip takes precedence over @include.
    if skip {
        return false;
    }
    include
}

fn find_defer(
    directives: &[Positioned<ast::Directive>],
    parent: Option<Arc<DeferUsage>>,
) -> Option<Arc<DeferUsage>> {
    for directive in directives {
        if directive.name == "defer" {
            if let Some(value) = directive.get_argument("if") {
                if let ast::Value::Boolean(false) = &value.node {
                    return None;
                }
            }
            let label = directive.get_argument("label").and_then(|v| match &v.node {
                ast::Value::String(s) => Some(s.clone()),
                _ => None,
            });
            return Some(Arc::new(DeferUsage { label, parent }));
        }
    }
    None
}

struct CollectionState<'fragments> {
    fragments: &'fragments IndexMap<String, ast::FragmentDefinition>,
    visited_fragments: HashSet<(String, usize)>,
    new_defer_usages: Vec<Arc<DeferUsage>>,
}

/// Collects a selection set against the runtime object type named
/// `runtime_type`. `parent_defer_usage` is the defer usage (if any) that
/// this whole selection set is already nested under, so fields collected
/// without their own `@defer` inherit it.
pub fn collect_fields(
    ctx: &ExecutionContext<'_>,
    runtime_type: &str,
    selection_set: &ast::SelectionSet,
    parent_defer_usage: Option<Arc<DeferUsage>>,
    fragment_variable_values: Option<Rc<IndexMap<String, serde_json::Value>>>,
) -> CollectedFields {
    let mut grouped_field_set = GroupedFieldSet::new();
    let mut state = CollectionState {
        fragments: ctx.args.fragments,
        visited_fragments: HashSet::new(),
        new_defer_usages: Vec::new(),
    };

    collect_into(
        ctx.args.schema,
        &mut state,
        runtime_type,
        selection_set,
        parent_defer_usage,
        fragment_variable_values,
        &mut grouped_field_set,
    );

    CollectedFields {
        grouped_field_set,
        new_defer_usages: state.new_defer_usages,
    }
}

fn defer_scope_key(defer_usage: &Option<Arc<DeferUsage>>) -> usize {
    defer_usage
        .as_ref()
        .map(|d| Arc::as_ptr(d) as usize)
        .unwrap_or(0)
}

fn collect_into(
    schema: &Schema,
    state: &mut CollectionState<'_>,
    runtime_type: &str,
    selection_set: &ast::SelectionSet,
    parent_defer_usage: Option<Arc<DeferUsage>>,
    fragment_variable_values: Option<Rc<IndexMap<String, serde_json::Value>>>,
    out: &mut GroupedFieldSet,
) {
    for selection in &selection_set.items {
        match selection {
            Selection::Field(field) => {
                if !evaluate_skip_include(&field.directives) {
                    continue;
                }
                let key = field.response_key().to_string();
                out.push(
                    key,
                    FieldDetails {
                        node: field.clone(),
                        defer_usage: parent_defer_usage.clone(),
                        fragment_variable_values: fragment_variable_values.clone(),
                    },
                );
            }
            Selection::InlineFragment(inline) => {
                if !evaluate_skip_include(&inline.directives) {
                    continue;
                }
                let matches = match &inline.type_condition {
                    Some(cond) => schema.is_sub_type(&cond.on, runtime_type),
                    None => true,
                };
                if !matches {
                    continue;
                }
                let defer = find_defer(&inline.directives, parent_defer_usage.clone());
                if let Some(defer) = &defer {
                    state.new_defer_usages.push(defer.clone());
                }
                collect_into(
                    schema,
                    state,
                    runtime_type,
                    &inline.selection_set,
                    defer.or(parent_defer_usage.clone()),
                    fragment_variable_values.clone(),
                    out,
                );
            }
            Selection::FragmentSpread(spread) => {
                if !evaluate_skip_include(&spread.directives) {
                    continue;
                }
                let visit_key = (spread.fragment_name.clone(), defer_scope_key(&parent_defer_usage));
                if !state.visited_fragments.insert(visit_key) {
                    continue;
                }
                let fragment = match state.fragments.get(&spread.fragment_name) {
                    Some(f) => f,
                    None => continue,
                };
                if !schema.is_sub_type(&fragment.type_condition.on, runtime_type) {
                    continue;
                }
                let defer = find_defer(&spread.directives, parent_defer_usage.clone());
                if let Some(defer) = &defer {
                    state.new_defer_usages.push(defer.clone());
                }
                // Fragments with their own variable definitions get a fresh
                // scope; this crate does not coerce them here (the caller
                // supplies fragment-level coercion where needed) but still
                // threads through whatever scope is already in effect.
                collect_into(
                    schema,
                    state,
                    runtime_type,
                    &fragment.selection_set,
                    defer.or(parent_defer_usage.clone()),
                    fragment_variable_values.clone(),
                    out,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ExecutionFlags, ExecutionState, ResolverDefaults, ValidatedExecutionArgs};
    use crate::schema::{FieldDefinition, ObjectType, Schema, Type as SchemaType, TypeRef};

    fn field(name: &str) -> Positioned<ast::Field> {
        Positioned::new(
            ast::Pos::default(),
            ast::Field {
                alias: None,
                name: Positioned::new(ast::Pos::default(), name.to_string()),
                arguments: Vec::new(),
                directives: Vec::new(),
                selection_set: Positioned::new(ast::Pos::default(), ast::SelectionSet::default()),
            },
        )
    }

    fn with_skip(f: Positioned<ast::Field>, skip: bool) -> Positioned<ast::Field> {
        let mut f = f;
        f.node.directives.push(Positioned::new(
            ast::Pos::default(),
            ast::Directive {
                name: "skip".to_string(),
                arguments: vec![(
                    Positioned::new(ast::Pos::default(), "if".to_string()),
                    Positioned::new(ast::Pos::default(), ast::Value::Boolean(skip)),
                )],
            },
        ));
        f
    }

    fn test_schema() -> Schema {
        Schema::new("Query").type_(SchemaType::Object(
            ObjectType::new("Query")
                .field(FieldDefinition::new("a", TypeRef::Named("String".into())))
                .field(FieldDefinition::new("b", TypeRef::Named("String".into()))),
        ))
    }

    #[test]
    fn skip_excludes_the_field() {
        let schema = test_schema();
        let fragments = IndexMap::new();
        let operation = ast::OperationDefinition {
            ty: ast::OperationType::Query,
            name: None,
            variable_definitions: Vec::new(),
            directives: Vec::new(),
            selection_set: Positioned::new(ast::Pos::default(), ast::SelectionSet::default()),
        };
        let args = ValidatedExecutionArgs {
            schema: &schema,
            fragments: &fragments,
            root_value: serde_json::Value::Null,
            operation: &operation,
            variable_values: IndexMap::new(),
            resolver_defaults: ResolverDefaults::default(),
            flags: ExecutionFlags::default(),
            abort_signal: None,
            error_propagation: true,
        };
        let state = ExecutionState::new();
        let ctx = ExecutionContext::new(&args, &state);

        let mut selection_set = ast::SelectionSet::default();
        selection_set.items.push(Selection::Field(with_skip(field("a"), true)));
        selection_set.items.push(Selection::Field(field("b")));

        let collected = collect_fields(&ctx, "Query", &selection_set, None, None);
        assert_eq!(collected.grouped_field_set.0.len(), 1);
        assert!(collected.grouped_field_set.0.contains_key("b"));
    }

    #[test]
    fn duplicate_field_occurrences_merge_in_order() {
        let schema = test_schema();
        let fragments = IndexMap::new();
        let operation = ast::OperationDefinition {
            ty: ast::OperationType::Query,
            name: None,
            variable_definitions: Vec::new(),
            directives: Vec::new(),
            selection_set: Positioned::new(ast::Pos::default(), ast::SelectionSet::default()),
        };
        let args = ValidatedExecutionArgs {
            schema: &schema,
            fragments: &fragments,
            root_value: serde_json::Value::Null,
            operation: &operation,
            variable_values: IndexMap::new(),
            resolver_defaults: ResolverDefaults::default(),
            flags: ExecutionFlags::default(),
            abort_signal: None,
            error_propagation: true,
        };
        let state = ExecutionState::new();
        let ctx = ExecutionContext::new(&args, &state);

        let mut selection_set = ast::SelectionSet::default();
        selection_set.items.push(Selection::Field(field("a")));
        selection_set.items.push(Selection::Field(field("b")));
        selection_set.items.push(Selection::Field(field("a")));

        let collected = collect_fields(&ctx, "Query", &selection_set, None, None);
        let keys: Vec<_> = collected.grouped_field_set.0.keys().cloned().collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(collected.grouped_field_set.0.get("a").unwrap().len(), 2);
    }
}
