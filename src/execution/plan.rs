//! Execution plan builder.
//!
//! Splits a grouped field set into the part executed immediately and the
//! parts deferred behind a particular set of `@defer` usages, keyed by that
//! set's identity so repeated bucket membership merges.

use std::collections::HashMap;
use std::sync::Arc;

use super::collect::{DeferUsage, DeferUsageSet, FieldDetails, GroupedFieldSet};

/// `{ groupedFieldSet, newGroupedFieldSets }`: the fields to run now, and
/// a map from defer-usage set to the sub-grouped-field-set deferred
/// behind exactly that set.
pub struct ExecutionPlan {
    pub grouped_field_set: GroupedFieldSet,
    pub new_grouped_field_sets: Vec<(DeferUsageSet, GroupedFieldSet)>,
}

fn defer_set_key(set: &DeferUsageSet) -> Vec<usize> {
    let mut ptrs: Vec<usize> = set.iter().map(|d| Arc::as_ptr(d) as usize).collect();
    ptrs.sort_unstable();
    ptrs
}

fn set_eq(a: &DeferUsageSet, b: &DeferUsageSet) -> bool {
    defer_set_key(a) == defer_set_key(b)
}

/// Builds a plan for `grouped_field_set`, given the set of defer usages
/// already "in scope" for the calling execution (empty at the root).
pub fn build_execution_plan(
    grouped_field_set: &GroupedFieldSet,
    parent_defer_usages: &DeferUsageSet,
) -> ExecutionPlan {
    let mut immediate = GroupedFieldSet::new();
    let mut buckets: Vec<(DeferUsageSet, GroupedFieldSet)> = Vec::new();
    let mut bucket_index: HashMap<Vec<usize>, usize> = HashMap::new();

    for (key, details_list) in &grouped_field_set.0 {
        // All merged occurrences of one response key share a defer-usage
        // set in valid documents; take the first entry's as representative.
        let field_defer_set: DeferUsageSet = details_list
            .iter()
            .filter_map(|d| d.defer_usage.clone())
            .fold(Vec::new(), |mut acc, usage| {
                if !acc.iter().any(|existing: &Arc<DeferUsage>| Arc::ptr_eq(existing, &usage)) {
                    acc.push(usage);
                }
                acc
            });

        if set_eq(&field_defer_set, parent_defer_usages) {
            for details in details_list {
                immediate.0.entry(key.clone()).or_insert_with(Vec::new).push(details.clone());
            }
            continue;
        }

        let bucket_key = defer_set_key(&field_defer_set);
        let idx = *bucket_index.entry(bucket_key).or_insert_with(|| {
            buckets.push((field_defer_set.clone(), GroupedFieldSet::new()));
            buckets.len() - 1
        });
        let (_, bucket_gfs) = &mut buckets[idx];
        for details in details_list {
            bucket_gfs.0.entry(key.clone()).or_insert_with(Vec::new).push(details.clone());
        }
    }

    ExecutionPlan {
        grouped_field_set: immediate,
        new_grouped_field_sets: buckets,
    }
}

#[allow(dead_code)]
fn clone_details(details: &FieldDetails) -> FieldDetails {
    details.clone()
}
