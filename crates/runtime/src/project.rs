//! Result projection: synthetic rule bindings back to rule names.

use crate::selection::SyntheticNames;
use crate::types::QueryResult;
use serde_json::{Map, Value};
use tracing::warn;

/// Replace each synthetic binding with the rule it stands for. The binding
/// holds the set of the rule's values; its first element becomes the rule's
/// value and an empty set drops the binding.
pub fn project(results: Vec<QueryResult>, synthetic: &SyntheticNames) -> Vec<QueryResult> {
    results
        .into_iter()
        .map(|result| QueryResult {
            bindings: project_bindings(result.bindings, synthetic),
            expressions: result.expressions,
        })
        .collect()
}

fn project_bindings(bindings: Map<String, Value>, synthetic: &SyntheticNames) -> Map<String, Value> {
    let mut projected = Map::with_capacity(bindings.len());
    for (name, value) in bindings {
        let Some(rule) = synthetic.original(&name) else {
            projected.insert(name, value);
            continue;
        };
        let Value::Array(mut values) = value else {
            continue;
        };
        if values.len() > 1 {
            warn!(
                rule,
                count = values.len(),
                "synthetic assignment produced more than one value"
            );
        }
        if !values.is_empty() {
            projected.insert(rule.to_string(), values.swap_remove(0));
        }
    }
    projected
}
