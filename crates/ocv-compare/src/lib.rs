//! Intersection comparison of JSON trees
//!
//! Compares a wanted JSON value against a received one, requiring only that
//! the wanted content is present: extra keys and extra list elements in the
//! received value never fail the comparison. The first mismatch found, in
//! sorted key order, produces a human-readable diagnostic.

use serde_json::Value;

/// Outcome of an intersection comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    /// True when every wanted element was found.
    pub matched: bool,
    /// Diagnostic for the first mismatch; empty when matched.
    pub diff: String,
}

impl Comparison {
    fn equal() -> Self {
        Self {
            matched: true,
            diff: String::new(),
        }
    }

    fn differs(diff: String) -> Self {
        Self {
            matched: false,
            diff,
        }
    }
}

/// Compare `want` against `got`, intersection-wise.
///
/// Mappings: every key of `want` must exist in `got`; nested mappings and
/// sequences recurse, anything else compares by equality. Sequences are
/// unordered: each wanted element claims the first still-unclaimed received
/// element it matches (mapping elements match by intersection, others by
/// equality). A wanted element can claim a received element that a later
/// wanted element would have needed, so the match is not guaranteed to be
/// optimal.
pub fn intersect_cmp(want: &Value, got: &Value) -> Comparison {
    match (want, got) {
        (Value::Object(want_map), Value::Object(got_map)) => {
            for (key, want_value) in want_map {
                let got_value = match got_map.get(key) {
                    Some(v) => v,
                    None => return Comparison::differs(format!("key {} not found", key)),
                };
                match (want_value, got_value) {
                    (Value::Object(_), Value::Object(_)) | (Value::Array(_), Value::Array(_)) => {
                        let nested = intersect_cmp(want_value, got_value);
                        if !nested.matched {
                            return nested;
                        }
                    }
                    _ => {
                        if want_value != got_value {
                            return Comparison::differs(format!(
                                "key {}: got '{}', wanted '{}'",
                                key,
                                render(got_value),
                                render(want_value)
                            ));
                        }
                    }
                }
            }
            Comparison::equal()
        }
        (Value::Array(want_items), Value::Array(got_items)) => {
            let mut claimed = vec![false; got_items.len()];
            for want_item in want_items {
                let mut found = false;
                for (i, got_item) in got_items.iter().enumerate() {
                    if claimed[i] {
                        continue;
                    }
                    if element_matches(want_item, got_item) {
                        claimed[i] = true;
                        found = true;
                        break;
                    }
                }
                if !found {
                    return Comparison::differs(format!(
                        "List element {} not matched",
                        render(want_item)
                    ));
                }
            }
            Comparison::equal()
        }
        _ => {
            if want == got {
                Comparison::equal()
            } else {
                Comparison::differs(format!(
                    "got '{}', wanted '{}'",
                    render(got),
                    render(want)
                ))
            }
        }
    }
}

fn element_matches(want: &Value, got: &Value) -> bool {
    match (want, got) {
        (Value::Object(_), Value::Object(_)) | (Value::Array(_), Value::Array(_)) => {
            intersect_cmp(want, got).matched
        }
        _ => want == got,
    }
}

/// Render a value for diagnostics: strings bare, everything else as JSON.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
