//! Built-in instance actions and the read-only catalog that holds them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value, json};
use utoipa::ToSchema;

use crate::cloud::InstanceOperation;

/// Field errors keyed by payload field name
pub type FieldErrors = Map<String, Value>;

/// A named instance-level action
pub trait InstanceAction: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON-schema style description of the `data` payload
    fn schema(&self) -> Value;

    /// Validate `data` and turn it into a provider operation
    fn prepare(&self, data: &Map<String, Value>) -> Result<InstanceOperation, FieldErrors>;
}

/// Catalog metadata returned by `GET /instances/{id}/action`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActionInfo {
    pub name: String,
    pub description: String,
    #[schema(value_type = Object)]
    pub schema: Value,
}

fn empty_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// Actions that take no payload
struct Simple {
    name: &'static str,
    description: &'static str,
    operation: InstanceOperation,
}

impl InstanceAction for Simple {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn schema(&self) -> Value {
        empty_schema()
    }

    fn prepare(&self, _data: &Map<String, Value>) -> Result<InstanceOperation, FieldErrors> {
        Ok(self.operation.clone())
    }
}

struct Reboot;

impl InstanceAction for Reboot {
    fn name(&self) -> &'static str {
        "reboot"
    }

    fn description(&self) -> &'static str {
        "Reboot the instance. reboot_type HARD power-cycles it."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "reboot_type": { "type": "string", "enum": ["SOFT", "HARD"], "default": "SOFT" }
            }
        })
    }

    fn prepare(&self, data: &Map<String, Value>) -> Result<InstanceOperation, FieldErrors> {
        let hard = match data.get("reboot_type") {
            None | Some(Value::Null) => false,
            Some(Value::String(kind)) if kind.eq_ignore_ascii_case("SOFT") => false,
            Some(Value::String(kind)) if kind.eq_ignore_ascii_case("HARD") => true,
            Some(other) => {
                let mut errors = FieldErrors::new();
                errors.insert(
                    "reboot_type".into(),
                    json!([format!("{} is not a valid choice.", other)]),
                );
                return Err(errors);
            }
        };
        Ok(InstanceOperation::Reboot { hard })
    }
}

struct Resize;

impl InstanceAction for Resize {
    fn name(&self) -> &'static str {
        "resize"
    }

    fn description(&self) -> &'static str {
        "Resize the instance to another size."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "size": { "type": "string" } },
            "required": ["size"]
        })
    }

    fn prepare(&self, data: &Map<String, Value>) -> Result<InstanceOperation, FieldErrors> {
        let size_id = match data.get("size") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                let mut errors = FieldErrors::new();
                errors.insert("size".into(), json!(["This field is required."]));
                return Err(errors);
            }
        };
        Ok(InstanceOperation::Resize { size_id })
    }
}

/// Immutable name → action registry, built once at startup
#[derive(Clone)]
pub struct ActionCatalog {
    actions: BTreeMap<&'static str, Arc<dyn InstanceAction>>,
}

impl ActionCatalog {
    pub fn new(actions: Vec<Arc<dyn InstanceAction>>) -> Self {
        Self {
            actions: actions.into_iter().map(|a| (a.name(), a)).collect(),
        }
    }

    /// The stock start/stop/reboot/resize/suspend/resume catalog
    pub fn builtin() -> Self {
        let simple = |name, description, operation| -> Arc<dyn InstanceAction> {
            Arc::new(Simple {
                name,
                description,
                operation,
            })
        };

        Self::new(vec![
            simple("start", "Start a stopped instance.", InstanceOperation::Start),
            simple("stop", "Stop a running instance.", InstanceOperation::Stop),
            Arc::new(Reboot),
            Arc::new(Resize),
            simple("suspend", "Suspend a running instance.", InstanceOperation::Suspend),
            simple("resume", "Resume a suspended instance.", InstanceOperation::Resume),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn InstanceAction>> {
        self.actions.get(name)
    }

    /// Catalog metadata sorted by name
    pub fn list(&self) -> Vec<ActionInfo> {
        self.actions
            .values()
            .map(|action| ActionInfo {
                name: action.name().to_string(),
                description: action.description().to_string(),
                schema: action.schema(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.actions.keys().copied().collect()
    }
}

impl Default for ActionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
