use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::matching::{handle_agent_match, AgentMatchResponse};
use super::requests::{ReferenceBirth, Requirement, ServiceKind, ServicePrices};
use crate::engine::validation::DATE_FORMAT;
use crate::engine::{InvalidInputError, LuckReport, ScoreEngine};

pub const DAILY_PROVIDER: &str = "Trinity Agent — Eastern Metaphysics";
pub const DEEP_PROVIDER: &str = "Trinity Agent — Saju Eastern Metaphysics";

const DEEP_DEFAULT_BIRTH_TIME: &str = "12:00";
const LOW_RISK_ABOVE: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLuckResponse {
    #[serde(flatten)]
    pub report: LuckReport,
    pub strategy: String,
    pub provider: String,
    pub analysis_date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "LOW_RISK (Buy/Hold)")]
    Low,
    #[serde(rename = "HIGH_RISK (Sell/Avoid)")]
    High,
}

impl RiskLevel {
    pub fn from_score(trading_luck_score: f64) -> Self {
        if trading_luck_score > LOW_RISK_ABOVE {
            RiskLevel::Low
        } else {
            RiskLevel::High
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepLuckResponse {
    #[serde(flatten)]
    pub report: LuckReport,
    pub strategy: String,
    pub risk_level: RiskLevel,
    pub birth_date: String,
    pub birth_time: String,
    pub provider: String,
    pub analysis_date: String,
}

/// What a buyer receives: a result, or an `{"error": ...}` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServiceOutcome {
    DailyLuck(DailyLuckResponse),
    DeepLuck(DeepLuckResponse),
    AgentMatch(AgentMatchResponse),
    Failed { error: String },
}

impl ServiceOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, ServiceOutcome::Failed { .. })
    }

    pub fn report(&self) -> Option<&LuckReport> {
        match self {
            ServiceOutcome::DailyLuck(r) => Some(&r.report),
            ServiceOutcome::DeepLuck(r) => Some(&r.report),
            ServiceOutcome::AgentMatch(_) | ServiceOutcome::Failed { .. } => None,
        }
    }

    pub fn to_json(&self) -> String {
        // Every variant is plain data, serialization cannot fail
        serde_json::to_string(self).unwrap_or_else(|e| format!(r#"{{"error":"{}"}}"#, e))
    }
}

fn analysis_date(requirement: &Requirement, today: NaiveDate) -> String {
    requirement
        .target_date()
        .map(str::to_string)
        .unwrap_or_else(|| today.format(DATE_FORMAT).to_string())
}

/// Market-wide reading for a date, optionally personalised by birth data.
pub fn handle_daily_luck(
    engine: &ScoreEngine,
    requirement: &Requirement,
    today: NaiveDate,
    reference: &ReferenceBirth,
) -> Result<DailyLuckResponse, InvalidInputError> {
    let target_date = analysis_date(requirement, today);
    let birth_date = requirement
        .birth_date()
        .unwrap_or(&reference.birth_date)
        .to_string();
    let birth_time = requirement
        .birth_time
        .clone()
        .unwrap_or_else(|| reference.birth_time.clone());
    let gender = requirement
        .gender
        .clone()
        .unwrap_or_else(|| reference.gender.to_string());

    tracing::debug!(target = %target_date, "dailyLuck");
    let report = engine.calculate_daily_luck(&birth_date, &birth_time, &target_date, &gender)?;

    Ok(DailyLuckResponse {
        strategy: report.keyword.strategy().to_string(),
        provider: DAILY_PROVIDER.to_string(),
        analysis_date: target_date,
        report,
    })
}

/// Personal reading. Requires a birth date.
pub fn handle_deep_luck(
    engine: &ScoreEngine,
    requirement: &Requirement,
    today: NaiveDate,
) -> Result<DeepLuckResponse, InvalidInputError> {
    let birth_date = requirement
        .birth_date()
        .ok_or(InvalidInputError::Missing(
            "birth_date is required for deepLuck service",
        ))?
        .to_string();
    let birth_time = requirement
        .birth_time
        .clone()
        .unwrap_or_else(|| DEEP_DEFAULT_BIRTH_TIME.to_string());
    let target_date = analysis_date(requirement, today);
    let gender = requirement.gender.clone().unwrap_or_else(|| "M".to_string());

    tracing::debug!(birth = %birth_date, time = %birth_time, target = %target_date, "deepLuck");
    let report = engine.calculate_daily_luck(&birth_date, &birth_time, &target_date, &gender)?;

    Ok(DeepLuckResponse {
        strategy: report.keyword.strategy().to_string(),
        risk_level: RiskLevel::from_score(report.trading_luck_score),
        birth_date,
        birth_time,
        provider: DEEP_PROVIDER.to_string(),
        analysis_date: target_date,
        report,
    })
}

/// Everything a handler needs besides the request.
#[derive(Debug, Clone, Copy)]
pub struct ServiceContext<'a> {
    pub now: DateTime<Utc>,
    pub reference: &'a ReferenceBirth,
    pub prices: &'a ServicePrices,
}

impl ServiceContext<'_> {
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }
}

/// Run the handler for `kind`, folding input errors into a failure payload.
pub fn handle(
    kind: ServiceKind,
    engine: &ScoreEngine,
    requirement: &Requirement,
    context: &ServiceContext<'_>,
) -> ServiceOutcome {
    let today = context.today();
    let result = match kind {
        ServiceKind::DailyLuck => {
            handle_daily_luck(engine, requirement, today, context.reference)
                .map(ServiceOutcome::DailyLuck)
        }
        ServiceKind::DeepLuck => {
            handle_deep_luck(engine, requirement, today).map(ServiceOutcome::DeepLuck)
        }
        ServiceKind::AgentMatch => handle_agent_match(
            engine,
            requirement,
            &analysis_date(requirement, today),
            context.now,
            context.reference,
            context.prices,
        )
        .map(ServiceOutcome::AgentMatch),
    };

    result.unwrap_or_else(|e| {
        tracing::warn!(service = %kind, error = %e, "Service request rejected");
        ServiceOutcome::Failed {
            error: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Keyword;
    use chrono::TimeZone;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 20).unwrap()
    }

    fn run(kind: ServiceKind, req: &Requirement) -> ServiceOutcome {
        let reference = ReferenceBirth::default();
        let prices = ServicePrices::default();
        let context = ServiceContext {
            now: Utc.with_ymd_and_hms(2026, 2, 20, 9, 0, 0).unwrap(),
            reference: &reference,
            prices: &prices,
        };
        handle(kind, &ScoreEngine::new(), req, &context)
    }

    #[test]
    fn test_daily_luck_uses_reference_birth() {
        let req = Requirement::parse(r#"{"target_date":"2026-02-20"}"#);
        let resp =
            handle_daily_luck(&ScoreEngine::new(), &req, today(), &ReferenceBirth::default())
                .unwrap();
        assert_eq!(resp.report.raw_score, 70);
        assert_eq!(resp.report.keyword, Keyword::Bullish);
        assert_eq!(resp.strategy, "Moderate Entry — Buy on Dips");
        assert_eq!(resp.provider, DAILY_PROVIDER);
        assert_eq!(resp.analysis_date, "2026-02-20");
    }

    #[test]
    fn test_daily_luck_defaults_target_to_today() {
        let resp = handle_daily_luck(
            &ScoreEngine::new(),
            &Requirement::default(),
            today(),
            &ReferenceBirth::default(),
        )
        .unwrap();
        assert_eq!(resp.analysis_date, "2026-02-20");
        assert_eq!(resp.report.trading_luck_score, 0.71);
    }

    #[test]
    fn test_daily_luck_json_is_flat() {
        let req = Requirement::parse(r#"{"target_date":"2026-02-20"}"#);
        let outcome = run(ServiceKind::DailyLuck, &req);
        let json: serde_json::Value = serde_json::from_str(&outcome.to_json()).unwrap();
        assert_eq!(json["trading_luck_score"], 0.71);
        assert_eq!(json["keyword"], "BULLISH");
        assert_eq!(json["analysis_date"], "2026-02-20");
        assert!(json.get("report").is_none());
    }

    #[test]
    fn test_deep_luck_low_risk() {
        let req = Requirement::parse(
            r#"{"birth_date":"1990-05-15","birth_time":"14:30","target_date":"2026-02-20"}"#,
        );
        let resp = handle_deep_luck(&ScoreEngine::new(), &req, today()).unwrap();
        assert_eq!(resp.report.trading_luck_score, 0.75);
        assert_eq!(resp.risk_level, RiskLevel::Low);
        assert_eq!(resp.birth_time, "14:30");
        assert_eq!(resp.provider, DEEP_PROVIDER);

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["risk_level"], "LOW_RISK (Buy/Hold)");
    }

    #[test]
    fn test_deep_luck_high_risk() {
        let req = Requirement::parse(
            r#"{"birth_date":"1985-11-30","birth_time":"03:15","target_date":"2025-07-01","gender":"F"}"#,
        );
        let resp = handle_deep_luck(&ScoreEngine::new(), &req, today()).unwrap();
        assert_eq!(resp.report.trading_luck_score, 0.41);
        assert_eq!(resp.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_deep_luck_requires_birth_date() {
        let req = Requirement::parse(r#"{"target_date":"2026-02-20"}"#);
        let outcome = run(ServiceKind::DeepLuck, &req);
        assert_eq!(
            outcome,
            ServiceOutcome::Failed {
                error: "birth_date is required for deepLuck service".to_string()
            }
        );
        assert_eq!(
            outcome.to_json(),
            r#"{"error":"birth_date is required for deepLuck service"}"#
        );
    }

    #[test]
    fn test_invalid_input_becomes_error_payload() {
        let req = Requirement::parse(r#"{"birth_date":"1990-05-15","gender":"X"}"#);
        let outcome = run(ServiceKind::DeepLuck, &req);
        assert!(outcome.is_error());
        assert!(outcome.report().is_none());
    }

    #[test]
    fn test_risk_boundary() {
        assert_eq!(RiskLevel::from_score(0.6), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.61), RiskLevel::Low);
    }

    #[test]
    fn test_agent_match_payload() {
        let req = Requirement::parse(
            r#"{"agents":[{"name":"Alpha","birth_date":"1990-05-15"},{"name":"Beta","birth_date":"1985-11-30"},{"name":"Gamma","birth_date":"2024-03-15"}]}"#,
        );
        let outcome = run(ServiceKind::AgentMatch, &req);
        assert!(outcome.report().is_none());
        let json: serde_json::Value = serde_json::from_str(&outcome.to_json()).unwrap();
        assert_eq!(json["agents_analyzed"], 3);
        assert_eq!(json["pairs"][0]["verdict"], "CAUTION");
        assert_eq!(json["oracle_credit_charged"], 1.5);
    }

    #[test]
    fn test_agent_match_without_agents_is_error_payload() {
        let req = Requirement::parse(r#"{"target_date":"2026-02-20"}"#);
        assert_eq!(
            run(ServiceKind::AgentMatch, &req).to_json(),
            r#"{"error":"agents list required"}"#
        );
    }
}
