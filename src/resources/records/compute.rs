//! Compute records: functions, transformations and workflows.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{str_field, Extra, Resource};
use crate::resources::identifier::Identifier;

/// Entry point used when a function declares none.
pub const DEFAULT_FUNCTION_PATH: &str = "handler.py";

/// A hosted function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Function {
    /// External id.
    pub external_id: String,
    /// Display name.
    pub name: String,
    /// Entry point inside the function package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_path: Option<String>,
    /// Runtime, e.g. `py311`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    /// Owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Owning data set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_set_external_id: Option<String>,
    /// Environment variables passed to the function.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env_vars: BTreeMap<String, String>,
    /// Requested CPU cores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,
    /// Requested memory in GB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<f64>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Unmodeled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Resource for Function {
    fn identifier(&self) -> Identifier {
        Identifier::Function {
            external_id: self.external_id.clone(),
        }
    }

    fn dependencies(&self) -> Vec<Identifier> {
        self.data_set_external_id
            .iter()
            .map(Identifier::data_set)
            .collect()
    }

    fn fill_defaults(&mut self) {
        self.function_path
            .get_or_insert_with(|| DEFAULT_FUNCTION_PATH.to_string());
    }

    fn scope_key(&self) -> Option<String> {
        self.data_set_external_id.clone()
    }

    fn extra(&self) -> &Extra {
        &self.extra
    }

    fn extra_mut(&mut self) -> &mut Extra {
        &mut self.extra
    }
}

/// A transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transformation {
    /// External id.
    pub external_id: String,
    /// Display name.
    pub name: String,
    /// Query text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Write destination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Value>,
    /// Owning data set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_set_external_id: Option<String>,
    /// Whether the transformation is visible to all users.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    /// Whether null values leave fields untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_null_fields: Option<bool>,
    /// Write mode, e.g. `upsert`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_mode: Option<String>,
    /// Unmodeled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Transformation {
    fn destination_dependencies(destination: &Value) -> Vec<Identifier> {
        let mut deps = Vec::new();
        match str_field(destination, "type") {
            Some("raw") => {
                if let (Some(db_name), Some(table_name)) = (
                    str_field(destination, "database"),
                    str_field(destination, "table"),
                ) {
                    deps.push(Identifier::RawTable {
                        db_name: db_name.to_string(),
                        table_name: table_name.to_string(),
                    });
                }
            }
            Some("nodes" | "edges" | "instances") => {
                if let Some(view) = destination.get("view") {
                    if let Some(id) = versioned_ref(view) {
                        deps.push(Identifier::View {
                            space: id.0,
                            external_id: id.1,
                            version: id.2,
                        });
                    }
                }
                if let Some(model) = destination.get("dataModel") {
                    if let Some(id) = versioned_ref(model) {
                        deps.push(Identifier::DataModel {
                            space: id.0,
                            external_id: id.1,
                            version: id.2,
                        });
                    }
                }
                if let Some(space) = str_field(destination, "instanceSpace") {
                    deps.push(Identifier::space(space));
                }
            }
            _ => {}
        }
        deps
    }
}

/// Reads `{space, externalId, version}` from a destination reference.
fn versioned_ref(value: &Value) -> Option<(String, String, String)> {
    let version = match value.get("version")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some((
        str_field(value, "space")?.to_string(),
        str_field(value, "externalId")?.to_string(),
        version,
    ))
}

impl Resource for Transformation {
    fn identifier(&self) -> Identifier {
        Identifier::Transformation {
            external_id: self.external_id.clone(),
        }
    }

    fn dependencies(&self) -> Vec<Identifier> {
        let mut deps: Vec<Identifier> = self
            .data_set_external_id
            .iter()
            .map(Identifier::data_set)
            .collect();
        if let Some(destination) = &self.destination {
            deps.extend(Self::destination_dependencies(destination));
        }
        deps
    }

    fn fill_defaults(&mut self) {
        self.is_public.get_or_insert(true);
        self.ignore_null_fields.get_or_insert(false);
        self.conflict_mode
            .get_or_insert_with(|| String::from("upsert"));
    }

    fn scope_key(&self) -> Option<String> {
        self.data_set_external_id.clone()
    }

    fn extra(&self) -> &Extra {
        &self.extra
    }

    fn extra_mut(&mut self) -> &mut Extra {
        &mut self.extra
    }
}

/// One step of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTask {
    /// Task id, unique within the workflow.
    pub external_id: String,
    /// Task type, e.g. `transformation` or `function`.
    #[serde(rename = "type")]
    pub task_type: String,
    /// Type-specific parameters.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub parameters: Value,
    /// Unmodeled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl WorkflowTask {
    fn dependency(&self) -> Option<Identifier> {
        let params = &self.parameters;
        if let Some(id) = params
            .get("transformation")
            .and_then(|t| str_field(t, "externalId"))
        {
            return Some(Identifier::Transformation {
                external_id: id.to_string(),
            });
        }
        params
            .get("function")
            .and_then(|f| str_field(f, "externalId"))
            .map(|id| Identifier::Function {
                external_id: id.to_string(),
            })
    }
}

/// A workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// External id.
    pub external_id: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Owning data set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_set_external_id: Option<String>,
    /// Tasks, unordered.
    #[serde(default)]
    pub tasks: Vec<WorkflowTask>,
    /// Unmodeled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Resource for Workflow {
    fn identifier(&self) -> Identifier {
        Identifier::Workflow {
            external_id: self.external_id.clone(),
        }
    }

    fn dependencies(&self) -> Vec<Identifier> {
        let mut deps: Vec<Identifier> = self
            .data_set_external_id
            .iter()
            .map(Identifier::data_set)
            .collect();
        deps.extend(self.tasks.iter().filter_map(WorkflowTask::dependency));
        deps
    }

    fn canonicalize(&mut self) {
        self.tasks
            .sort_by(|a, b| a.external_id.cmp(&b.external_id));
    }

    fn scope_key(&self) -> Option<String> {
        self.data_set_external_id.clone()
    }

    fn extra(&self) -> &Extra {
        &self.extra
    }

    fn extra_mut(&mut self) -> &mut Extra {
        &mut self.extra
    }

    fn clear_extra(&mut self) {
        self.extra.clear();
        for task in &mut self.tasks {
            task.extra.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transformation_raw_destination() {
        let t: Transformation = serde_yaml::from_str(
            r"
externalId: tr_assets
name: Assets
dataSetExternalId: ds_ingest
destination:
  type: raw
  database: ingest
  table: assets
",
        )
        .unwrap();
        assert_eq!(
            t.dependencies(),
            vec![
                Identifier::data_set("ds_ingest"),
                Identifier::RawTable {
                    db_name: String::from("ingest"),
                    table_name: String::from("assets"),
                },
            ]
        );
    }

    #[test]
    fn test_transformation_view_destination() {
        let t: Transformation = serde_yaml::from_str(
            r"
externalId: tr_pumps
name: Pumps
destination:
  type: nodes
  view: { space: sp, externalId: Pump, version: 1 }
  instanceSpace: sp_instances
",
        )
        .unwrap();
        let deps = t.dependencies();
        assert!(deps.contains(&Identifier::View {
            space: String::from("sp"),
            external_id: String::from("Pump"),
            version: String::from("1"),
        }));
        assert!(deps.contains(&Identifier::space("sp_instances")));
    }

    #[test]
    fn test_transformation_defaults() {
        let mut t: Transformation =
            serde_yaml::from_str("externalId: tr\nname: T\n").unwrap();
        t.fill_defaults();
        assert_eq!(t.is_public, Some(true));
        assert_eq!(t.ignore_null_fields, Some(false));
        assert_eq!(t.conflict_mode.as_deref(), Some("upsert"));
    }

    #[test]
    fn test_workflow_tasks_are_unordered() {
        let yaml = r"
externalId: wf
tasks:
  - externalId: b
    type: function
    parameters: { function: { externalId: fn_1 } }
  - externalId: a
    type: transformation
    parameters: { transformation: { externalId: tr_1 } }
";
        let mut wf: Workflow = serde_yaml::from_str(yaml).unwrap();
        let deps = wf.dependencies();
        assert!(deps.contains(&Identifier::Function {
            external_id: String::from("fn_1")
        }));
        assert!(deps.contains(&Identifier::Transformation {
            external_id: String::from("tr_1")
        }));

        wf.canonicalize();
        assert_eq!(wf.tasks[0].external_id, "a");
    }
}
