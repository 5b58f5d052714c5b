use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::engine::Gender;

/// Buyer-supplied requirement attached to a marketplace job.
///
/// Every field is optional; handlers decide which ones they need.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents: Option<Vec<AgentProfile>>,
}

/// One agent in an agentMatch request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
}

impl AgentProfile {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(object) => Self {
                name: string_field(object, "name"),
                birth_date: string_field(object, "birth_date"),
            },
            _ => Self::default(),
        }
    }
}

fn string_field(object: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

impl Requirement {
    /// Parse a raw requirement string.
    ///
    /// Anything that is not a JSON object yields an empty requirement, and
    /// non-string field values are treated as absent.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(object)) => Self {
                target_date: string_field(&object, "target_date"),
                birth_date: string_field(&object, "birth_date"),
                birth_time: string_field(&object, "birth_time"),
                gender: string_field(&object, "gender"),
                agents: object
                    .get("agents")
                    .and_then(Value::as_array)
                    .map(|list| list.iter().map(AgentProfile::from_value).collect()),
            },
            _ => Self::default(),
        }
    }

    /// The target date if present and non-empty.
    pub fn target_date(&self) -> Option<&str> {
        self.target_date.as_deref().filter(|s| !s.is_empty())
    }

    pub fn birth_date(&self) -> Option<&str> {
        self.birth_date.as_deref().filter(|s| !s.is_empty())
    }

    /// Replace an explicitly empty target date. An absent one stays absent.
    pub fn with_default_target(mut self, today: &str) -> Self {
        if self.target_date.as_deref() == Some("") {
            self.target_date = Some(today.to_string());
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceKind {
    #[serde(rename = "dailyLuck")]
    DailyLuck,
    #[serde(rename = "deepLuck")]
    DeepLuck,
    #[serde(rename = "agentMatch")]
    AgentMatch,
}

impl ServiceKind {
    pub fn name(self) -> &'static str {
        match self {
            ServiceKind::DailyLuck => "dailyLuck",
            ServiceKind::DeepLuck => "deepLuck",
            ServiceKind::AgentMatch => "agentMatch",
        }
    }

    pub const ALL: [ServiceKind; 3] = [
        ServiceKind::DailyLuck,
        ServiceKind::DeepLuck,
        ServiceKind::AgentMatch,
    ];

    /// Listing price. For agentMatch this is the two-agent base price.
    pub fn price(self, prices: &ServicePrices) -> f64 {
        match self {
            ServiceKind::DailyLuck => prices.daily_luck,
            ServiceKind::DeepLuck => prices.deep_luck,
            ServiceKind::AgentMatch => prices.agent_match,
        }
    }

    /// What this particular request costs.
    pub fn price_for(self, prices: &ServicePrices, requirement: &Requirement) -> f64 {
        match self {
            ServiceKind::AgentMatch => {
                prices.agent_match_price(requirement.agents.as_ref().map_or(0, Vec::len))
            }
            _ => self.price(prices),
        }
    }

    /// Decide which service a job is buying.
    ///
    /// agentMatch is chosen by name only. Otherwise a `dailyluck` name or a
    /// `target_date` key means dailyLuck, checked before a `deepluck` name or a
    /// `birth_date` key, so a request carrying both dates is a dailyLuck.
    pub fn route(job_name: &str, requirement: &Requirement) -> Option<Self> {
        let name = job_name.to_lowercase();
        if name.contains("agentmatch") {
            return Some(ServiceKind::AgentMatch);
        }
        if name.contains("dailyluck") || requirement.target_date.is_some() {
            return Some(ServiceKind::DailyLuck);
        }
        if name.contains("deepluck") || requirement.birth_date.is_some() {
            return Some(ServiceKind::DeepLuck);
        }
        None
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Listing prices in USDC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicePrices {
    pub daily_luck: f64,
    pub deep_luck: f64,
    /// agentMatch for two agents
    pub agent_match: f64,
    /// Added per agent beyond the second
    pub agent_match_extra: f64,
}

impl Default for ServicePrices {
    fn default() -> Self {
        Self {
            daily_luck: 0.01,
            deep_luck: 0.50,
            agent_match: 1.00,
            agent_match_extra: 0.50,
        }
    }
}

impl ServicePrices {
    pub fn agent_match_price(&self, agents: usize) -> f64 {
        let extra = agents.saturating_sub(2) as f64;
        ((self.agent_match + extra * self.agent_match_extra) * 100.0).round() / 100.0
    }
}

/// Birth data used when a request does not carry its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceBirth {
    pub birth_date: String,
    pub birth_time: String,
    pub gender: Gender,
}

impl Default for ReferenceBirth {
    fn default() -> Self {
        Self {
            birth_date: "1990-01-01".to_string(),
            birth_time: "12:00".to_string(),
            gender: Gender::Male,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object() {
        let req = Requirement::parse(r#"{"birth_date":"1990-05-15","birth_time":"14:30"}"#);
        assert_eq!(req.birth_date.as_deref(), Some("1990-05-15"));
        assert_eq!(req.birth_time.as_deref(), Some("14:30"));
        assert_eq!(req.target_date, None);
    }

    #[test]
    fn test_parse_garbage_is_empty() {
        assert_eq!(Requirement::parse("not json"), Requirement::default());
        assert_eq!(Requirement::parse("[1, 2]"), Requirement::default());
        assert_eq!(Requirement::parse("\"2026-02-20\""), Requirement::default());
        assert_eq!(Requirement::parse(""), Requirement::default());
    }

    #[test]
    fn test_parse_ignores_non_string_values() {
        let req = Requirement::parse(r#"{"target_date": 20260220, "gender": "F"}"#);
        assert_eq!(req.target_date, None);
        assert_eq!(req.gender.as_deref(), Some("F"));
    }

    #[test]
    fn test_default_target_fills_empty() {
        let req = Requirement::parse(r#"{"target_date": ""}"#).with_default_target("2026-02-20");
        assert_eq!(req.target_date.as_deref(), Some("2026-02-20"));

        let req = Requirement::parse(r#"{"target_date": "2025-01-01"}"#)
            .with_default_target("2026-02-20");
        assert_eq!(req.target_date.as_deref(), Some("2025-01-01"));

        let req = Requirement::default().with_default_target("2026-02-20");
        assert_eq!(req.target_date, None);
    }

    #[test]
    fn test_route_by_name() {
        let empty = Requirement::default();
        assert_eq!(ServiceKind::route("Trinity DailyLuck", &empty), Some(ServiceKind::DailyLuck));
        assert_eq!(ServiceKind::route("deepLuck", &empty), Some(ServiceKind::DeepLuck));
    }

    #[test]
    fn test_target_date_routes_before_birth_date() {
        let req = Requirement {
            target_date: Some("2026-02-20".to_string()),
            birth_date: Some("1990-05-15".to_string()),
            ..Default::default()
        };
        assert_eq!(ServiceKind::route("", &req), Some(ServiceKind::DailyLuck));
        assert_eq!(ServiceKind::route("deepLuck", &req), Some(ServiceKind::DailyLuck));
        assert_eq!(ServiceKind::route("dailyLuck", &req), Some(ServiceKind::DailyLuck));

        let birth_only = Requirement {
            birth_date: Some("1990-05-15".to_string()),
            ..Default::default()
        };
        assert_eq!(ServiceKind::route("", &birth_only), Some(ServiceKind::DeepLuck));
        assert_eq!(ServiceKind::route("dailyLuck", &birth_only), Some(ServiceKind::DailyLuck));

        // An empty target date still counts as present
        let empty_target = Requirement::parse(r#"{"target_date":"","birth_date":"1990-05-15"}"#);
        assert_eq!(ServiceKind::route("deepLuck", &empty_target), Some(ServiceKind::DailyLuck));
    }

    #[test]
    fn test_agent_match_routes_by_name() {
        let req = Requirement::parse(
            r#"{"agents":[{"name":"A","birth_date":"2024-03-15"}],"target_date":"2026-02-20"}"#,
        );
        assert_eq!(ServiceKind::route("Trinity agentMatch", &req), Some(ServiceKind::AgentMatch));
        assert_eq!(ServiceKind::route("", &req), Some(ServiceKind::DailyLuck));
    }

    #[test]
    fn test_parse_agents() {
        let req = Requirement::parse(
            r#"{"agents":[{"name":"Alpha","birth_date":"1990-05-15"},{"birth_date":"1985-11-30"},"junk"]}"#,
        );
        let agents = req.agents.unwrap();
        assert_eq!(agents.len(), 3);
        assert_eq!(agents[0].name.as_deref(), Some("Alpha"));
        assert_eq!(agents[1].name, None);
        assert_eq!(agents[2], AgentProfile::default());

        assert_eq!(Requirement::parse(r#"{"agents":"Alpha"}"#).agents, None);
    }

    #[test]
    fn test_route_unknown() {
        assert_eq!(ServiceKind::route("horoscope", &Requirement::default()), None);
    }

    #[test]
    fn test_prices() {
        let prices = ServicePrices::default();
        assert_eq!(ServiceKind::DailyLuck.price(&prices), 0.01);
        assert_eq!(ServiceKind::DeepLuck.price(&prices), 0.50);
        assert_eq!(ServiceKind::AgentMatch.price(&prices), 1.00);
    }

    #[test]
    fn test_agent_match_price_scales_with_agents() {
        let prices = ServicePrices::default();
        assert_eq!(prices.agent_match_price(2), 1.00);
        assert_eq!(prices.agent_match_price(3), 1.50);
        assert_eq!(prices.agent_match_price(5), 2.50);

        let req = Requirement::parse(r#"{"agents":[{},{},{},{}]}"#);
        assert_eq!(ServiceKind::AgentMatch.price_for(&prices, &req), 2.00);
        assert_eq!(ServiceKind::DeepLuck.price_for(&prices, &req), 0.50);
    }
}
