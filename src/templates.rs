//! Payload Renderer - JSON request bodies rendered from embedded Handlebars templates
//!
//! Templates are compiled into the binary. String values are inserted with the
//! `json` helper so they are always valid JSON literals, and every rendered
//! payload is parsed back before it is sent.

use handlebars::{Handlebars, handlebars_helper};
use serde::Serialize;
use serde_json::{Value, json};

use crate::clamp::details::EntityIds;
use crate::clamp::policy::{PolicyConfig, PolicyKey};
use crate::error::{ClampError, Result};

/// TCA microservice policy configuration
pub const TCA_CONFIG: &str = include_str!("../templates/tca_config.json.hbs");

/// MinMax guard configuration
pub const MINMAX_CONFIG: &str = include_str!("../templates/minmax_config.json.hbs");

/// FrequencyLimiter guard configuration
pub const FREQUENCY_LIMITER_CONFIG: &str = include_str!("../templates/frequency_limiter_config.json.hbs");

/// Drools operational configuration
pub const DROOLS_CONFIG: &str = include_str!("../templates/drools_config.json.hbs");

handlebars_helper!(to_json: |v: Json| v.to_string());

pub struct PayloadRenderer {
    handlebars: Handlebars<'static>,
}

impl PayloadRenderer {
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.register_helper("json", Box::new(to_json));

        for (name, template) in [
            ("tca_config", TCA_CONFIG),
            ("minmax_config", MINMAX_CONFIG),
            ("frequency_limiter_config", FREQUENCY_LIMITER_CONFIG),
            ("drools_config", DROOLS_CONFIG),
        ] {
            handlebars
                .register_template_string(name, template)
                .map_err(|e| ClampError::Template(format!("{}: {}", name, e)))?;
        }

        Ok(Self { handlebars })
    }

    /// Render a registered template and parse the result as JSON
    pub fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<Value> {
        let rendered = self
            .handlebars
            .render(name, context)
            .map_err(|e| ClampError::Template(format!("Failed to render {}: {}", name, e)))?;
        serde_json::from_str(&rendered)
            .map_err(|e| ClampError::Template(format!("{} rendered invalid JSON: {}", name, e)))
    }

    /// Body for `loop/updateMicroservicePolicy`
    pub fn microservice_policy(&self, loop_name: &str, microservice_name: &str) -> Result<Value> {
        self.render(
            "tca_config",
            &json!({ "loop_name": loop_name, "microservice_name": microservice_name }),
        )
    }

    /// Body for `loop/updateOperationalPolicies`
    pub fn operational_policy(
        &self,
        loop_name: &str,
        policy_name: &str,
        key: &PolicyKey,
        config: &PolicyConfig,
        entity_ids: Option<&EntityIds>,
    ) -> Result<Value> {
        if config.needs_entity_ids() && entity_ids.is_none() {
            return Err(ClampError::Template(format!(
                "{} needs VF module entity ids, none found for {}",
                config.template_name(),
                loop_name
            )));
        }

        let mut context = serde_json::to_value(config)?;
        context["loop_name"] = json!(loop_name);
        context["policy_name"] = json!(policy_name);
        context["policy_type"] = json!(key.policy_type);
        context["version"] = json!(key.version);
        if let Some(ids) = entity_ids {
            context["entity_ids"] = serde_json::to_value(ids)?;
        }
        self.render(config.template_name(), &context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minmax_key() -> PolicyKey {
        PolicyKey::new("onap.policies.controlloop.guard.common.MinMax", "1.0.0")
    }

    #[test]
    fn test_templates_register() {
        assert!(PayloadRenderer::new().is_ok());
    }

    #[test]
    fn test_microservice_policy() {
        let renderer = PayloadRenderer::new().unwrap();
        let body = renderer.microservice_policy("LOOP_instance01", "MICROSERVICE_x").unwrap();
        assert_eq!(body["name"], "MICROSERVICE_x");
        let threshold = &body["properties"]["tca.policy"]["metricsPerEventName"][0]["thresholds"][0];
        assert_eq!(threshold["closedLoopControlName"], "LOOP_instance01");
    }

    #[test]
    fn test_minmax_payload() {
        let renderer = PayloadRenderer::new().unwrap();
        let body = renderer
            .operational_policy(
                "LOOP_instance01",
                "OPERATIONAL_Test_SDKMinMax",
                &minmax_key(),
                &PolicyConfig::default(),
                None,
            )
            .unwrap();
        let policy = &body[0];
        assert_eq!(policy["name"], "OPERATIONAL_Test_SDKMinMax");
        assert_eq!(policy["policyModel"]["version"], "1.0.0");
        assert_eq!(policy["configurationsJson"]["min"], 1);
        assert_eq!(policy["configurationsJson"]["max"], 5);
        assert_eq!(policy["configurationsJson"]["target"], ".*");
    }

    #[test]
    fn test_strings_are_escaped() {
        let renderer = PayloadRenderer::new().unwrap();
        let body = renderer
            .operational_policy(
                "LOOP_\"quoted\"",
                "name",
                &minmax_key(),
                &PolicyConfig::default(),
                None,
            )
            .unwrap();
        assert_eq!(body[0]["configurationsJson"]["id"], "LOOP_\"quoted\"");
    }

    #[test]
    fn test_frequency_limiter_payload() {
        let renderer = PayloadRenderer::new().unwrap();
        let config: PolicyConfig = serde_yaml::from_str("kind: frequency_limiter\nlimit: 1\n").unwrap();
        let key = PolicyKey::new("onap.policies.controlloop.guard.common.FrequencyLimiter", "1.0.0");
        let body = renderer
            .operational_policy("LOOP_test", "OPERATIONAL_test", &key, &config, None)
            .unwrap();
        assert_eq!(body[0]["configurationsJson"]["limit"], 1);
        assert_eq!(body[0]["configurationsJson"]["timeUnits"], "minute");
    }

    #[test]
    fn test_drools_requires_entity_ids() {
        let renderer = PayloadRenderer::new().unwrap();
        let config: PolicyConfig = serde_yaml::from_str("kind: drools\n").unwrap();
        let key = PolicyKey::new("onap.policies.controlloop.operational.common.Drools", "1.0.0");

        let missing = renderer.operational_policy("LOOP_test", "OPERATIONAL_test", &key, &config, None);
        assert!(matches!(missing, Err(ClampError::Template(_))));

        let ids = EntityIds {
            resource_id: "resourceID".to_string(),
            ..Default::default()
        };
        let body = renderer
            .operational_policy("LOOP_test", "OPERATIONAL_test", &key, &config, Some(&ids))
            .unwrap();
        let target = &body[0]["configurationsJson"]["operations"][0]["operation"]["target"];
        assert_eq!(target["entityIds"]["resourceID"], "resourceID");
        assert_eq!(target["targetType"], "VFMODULE");
    }
}
