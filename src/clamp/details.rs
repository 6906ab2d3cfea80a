//! Loop details document returned by CLAMP
//!
//! CLAMP returns a large, loosely specified JSON document for a loop. It is kept
//! as a `serde_json::Value` and read through typed accessors; `validate` reports
//! the fields the workflow relies on that are missing.

use serde::Serialize;
use serde_json::Value;

/// Component whose state CLAMP tracks per loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Policy,
    Dcae,
}

impl Component {
    pub fn key(&self) -> &'static str {
        match self {
            Component::Policy => "POLICY",
            Component::Dcae => "DCAE",
        }
    }
}

/// VF module identifiers used to target drools operations
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityIds {
    pub resource_id: String,
    pub model_invariant_id: String,
    pub model_version_id: String,
    pub model_name: String,
    pub model_version: String,
    pub model_customization_id: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopDetails(Value);

impl LoopDetails {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// True for null, `{}` and `[]`
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn micro_service_policies(&self) -> &[Value] {
        self.array("microServicePolicies")
    }

    pub fn operational_policies(&self) -> &[Value] {
        self.array("operationalPolicies")
    }

    /// Names of attached operational policies, in backend order
    pub fn operational_policy_names(&self) -> Vec<&str> {
        self.operational_policies()
            .iter()
            .filter_map(|p| p.get("name").and_then(Value::as_str))
            .collect()
    }

    pub fn component_state(&self, component: Component) -> Option<&str> {
        self.0
            .pointer(&format!("/components/{}/componentState/stateName", component.key()))
            .and_then(Value::as_str)
    }

    /// Entity ids of the last VF module in the loop's model service
    pub fn entity_ids(&self) -> Option<EntityIds> {
        let modules = self.0.pointer("/modelService/resourceDetails/VFModule")?.as_object()?;
        let module = modules.values().last()?;
        let field = |key: &str| module.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
        Some(EntityIds {
            resource_id: field("vfModuleModelName"),
            model_invariant_id: field("vfModuleModelInvariantUUID"),
            model_version_id: field("vfModuleModelUUID"),
            model_name: field("vfModuleModelName"),
            model_version: field("vfModuleModelVersion"),
            model_customization_id: field("vfModuleModelCustomizationUUID"),
        })
    }

    /// Missing or mistyped fields, empty when the document is usable
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.0.is_object() {
            problems.push("details is not a JSON object".to_string());
            return problems;
        }
        if self.name().is_none() {
            problems.push("/name: missing string".to_string());
        }
        for key in ["operationalPolicies", "microServicePolicies"] {
            if !self.0.get(key).is_some_and(Value::is_array) {
                problems.push(format!("/{}: missing array", key));
            }
        }
        for component in [Component::Policy, Component::Dcae] {
            if self.component_state(component).is_none() {
                problems.push(format!("/components/{}/componentState/stateName: missing string", component.key()));
            }
        }
        problems
    }

    fn array(&self, key: &str) -> &[Value] {
        self.0.get(key).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
    }
}
