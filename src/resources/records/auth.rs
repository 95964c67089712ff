//! Access-control groups.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{Extra, Resource};
use crate::resources::identifier::Identifier;

/// An access-control group.
///
/// Each capability is a single-key object such as
/// `{"datasetsAcl": {"actions": [...], "scope": {...}}}`. Actions, scope id
/// lists and the capability list itself are unordered sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Group name.
    pub name: String,
    /// Id of the group in the identity provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Granted capabilities.
    #[serde(default)]
    pub capabilities: Vec<Value>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Unmodeled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Group {
    fn acls(&self) -> impl Iterator<Item = &Value> {
        self.capabilities
            .iter()
            .filter_map(Value::as_object)
            .flat_map(|capability| capability.values())
    }
}

impl Resource for Group {
    fn identifier(&self) -> Identifier {
        Identifier::Group {
            name: self.name.clone(),
        }
    }

    fn dependencies(&self) -> Vec<Identifier> {
        let mut deps = Vec::new();
        for acl in self.acls() {
            let Some(scope) = acl.get("scope") else {
                continue;
            };
            for id in scope_ids(scope, "datasetScope", "ids") {
                deps.push(Identifier::data_set(id));
            }
            for space in scope_ids(scope, "spaceIdScope", "spaceIds") {
                deps.push(Identifier::space(space));
            }
        }
        deps
    }

    fn canonicalize(&mut self) {
        for capability in &mut self.capabilities {
            let Some(capability) = capability.as_object_mut() else {
                continue;
            };
            for acl in capability.values_mut() {
                if let Some(actions) = acl.get_mut("actions").and_then(Value::as_array_mut) {
                    sort_values(actions);
                }
                let Some(scope) = acl.get_mut("scope").and_then(Value::as_object_mut) else {
                    continue;
                };
                for scope_body in scope.values_mut().filter_map(Value::as_object_mut) {
                    for ids in scope_body.values_mut().filter_map(Value::as_array_mut) {
                        sort_values(ids);
                    }
                }
            }
        }
        sort_values(&mut self.capabilities);
    }

    fn extra(&self) -> &Extra {
        &self.extra
    }

    fn extra_mut(&mut self) -> &mut Extra {
        &mut self.extra
    }
}

/// Collects the string ids under `scope[scope_name][list_name]`.
fn scope_ids<'a>(scope: &'a Value, scope_name: &str, list_name: &str) -> Vec<&'a str> {
    scope
        .get(scope_name)
        .and_then(|s| s.get(list_name))
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

/// Sorts JSON values by their compact rendering.
fn sort_values(values: &mut [Value]) {
    values.sort_by_cached_key(Value::to_string);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn group(capabilities: Vec<Value>) -> Group {
        Group {
            name: String::from("readers"),
            source_id: None,
            capabilities,
            metadata: BTreeMap::new(),
            extra: Extra::new(),
        }
    }

    #[test]
    fn test_capability_order_is_ignored() {
        let ts = json!({"timeSeriesAcl": {"actions": ["READ", "WRITE"], "scope": {"all": {}}}});
        let ds = json!({"datasetsAcl": {"actions": ["READ"], "scope": {"datasetScope": {"ids": ["b", "a"]}}}});
        let ds_sorted = json!({"datasetsAcl": {"actions": ["READ"], "scope": {"datasetScope": {"ids": ["a", "b"]}}}});
        let ts_flipped = json!({"timeSeriesAcl": {"actions": ["WRITE", "READ"], "scope": {"all": {}}}});

        let mut a = group(vec![ts, ds]);
        let mut b = group(vec![ds_sorted, ts_flipped]);
        a.canonicalize();
        b.canonicalize();
        assert_eq!(a, b);
    }

    #[test]
    fn test_scoped_dependencies() {
        let g = group(vec![
            json!({"datasetsAcl": {"actions": ["READ"], "scope": {"datasetScope": {"ids": ["ds_1"]}}}}),
            json!({"dataModelInstancesAcl": {"actions": ["READ"], "scope": {"spaceIdScope": {"spaceIds": ["sp"]}}}}),
            json!({"groupsAcl": {"actions": ["LIST"], "scope": {"all": {}}}}),
        ]);
        assert_eq!(
            g.dependencies(),
            vec![Identifier::data_set("ds_1"), Identifier::space("sp")]
        );
    }
}
