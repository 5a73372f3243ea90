//! Filter fragments for narrowing DAO queries.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde_json::Value;

use crate::error::DatabaseError;
use crate::store::{Condition, QueryOptions};

fn placeholder_stem(attribute: &str) -> String {
    attribute.replace('.', "_")
}

fn bound_values(
    stem: &str,
    values: &[Value],
) -> Result<(Vec<String>, BTreeMap<String, Value>), DatabaseError> {
    if values.is_empty() {
        return Err(DatabaseError::Expression(format!(
            "filter on `{stem}` needs at least one value"
        )));
    }
    let placeholders: Vec<String> = (0..values.len()).map(|i| format!(":{stem}_{i}")).collect();
    let bound = placeholders.iter().cloned().zip(values.iter().cloned()).collect();
    Ok((placeholders, bound))
}

/// `contains(#a, :a_0) OR contains(#a, :a_1) ...`
///
/// # Errors
///
/// Returns `DatabaseError::Expression` when `values` is empty.
pub fn contains_filter(attribute: &str, values: &[Value]) -> Result<Condition, DatabaseError> {
    let stem = placeholder_stem(attribute);
    let (placeholders, bound) = bound_values(&stem, values)?;
    let expression = placeholders
        .iter()
        .map(|p| format!("contains(#{stem}, {p})"))
        .collect::<Vec<_>>()
        .join(" OR ");
    Ok(Condition {
        expression,
        names: Some(BTreeMap::from([(format!("#{stem}"), attribute.to_string())])),
        values: Some(bound),
    })
}

/// `#a IN (:a_0, :a_1, ...)`
///
/// # Errors
///
/// Returns `DatabaseError::Expression` when `values` is empty.
pub fn in_filter(attribute: &str, values: &[Value]) -> Result<Condition, DatabaseError> {
    let stem = placeholder_stem(attribute);
    let (placeholders, bound) = bound_values(&stem, values)?;
    Ok(Condition {
        expression: format!("#{stem} IN ({})", placeholders.join(", ")),
        names: Some(BTreeMap::from([(format!("#{stem}"), attribute.to_string())])),
        values: Some(bound),
    })
}

/// `#a = :a`
pub fn eq_filter(attribute: &str, value: Value) -> Condition {
    let stem = placeholder_stem(attribute);
    Condition {
        expression: format!("#{stem} = :{stem}"),
        names: Some(BTreeMap::from([(format!("#{stem}"), attribute.to_string())])),
        values: Some(BTreeMap::from([(format!(":{stem}"), value)])),
    }
}

/// AND `extra` into the filter of `options` as `(base) AND (extra)`.
///
/// # Errors
///
/// Returns `DatabaseError::Expression` when a placeholder is already bound
/// to something else.
pub fn merge_filter(
    mut options: QueryOptions,
    extra: Condition,
) -> Result<QueryOptions, DatabaseError> {
    options.filter_expression = Some(match options.filter_expression.take() {
        Some(base) => format!("({base}) AND ({})", extra.expression),
        None => extra.expression,
    });
    merge_bindings(&mut options.expression_attribute_names, extra.names)?;
    merge_bindings(&mut options.expression_attribute_values, extra.values)?;
    Ok(options)
}

/// Union two placeholder maps; identical rebindings are allowed.
pub(crate) fn merge_bindings<V: PartialEq + Debug>(
    target: &mut Option<BTreeMap<String, V>>,
    extra: Option<BTreeMap<String, V>>,
) -> Result<(), DatabaseError> {
    let Some(extra) = extra else {
        return Ok(());
    };
    let merged = target.get_or_insert_with(BTreeMap::new);
    for (placeholder, binding) in extra {
        match merged.get(&placeholder) {
            Some(existing) if *existing != binding => {
                return Err(DatabaseError::Expression(format!(
                    "placeholder {placeholder} is bound to both {existing:?} and {binding:?}"
                )));
            }
            Some(_) => {}
            None => {
                merged.insert(placeholder, binding);
            }
        }
    }
    Ok(())
}
