//! agentMatch: pairwise compatibility of up to five agents on a date.
//!
//! Each agent's daily score is read with its genesis date as the birth date
//! (at noon); every pair is then rated by how high and how close the two
//! scores are.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::requests::{AgentProfile, ReferenceBirth, Requirement, ServicePrices};
use crate::engine::report::score_text;
use crate::engine::{parse_date, InvalidInputError, ScoreEngine};

pub const MIN_AGENTS: usize = 2;
pub const MAX_AGENTS: usize = 5;

const AGENT_BIRTH_TIME: &str = "12:00";
const DEFAULT_AGENT_BIRTH: &str = "2024-01-01";
/// Used for an agent whose reading fails.
const NEUTRAL_SCORE: f64 = 0.5;
const DIFF_PENALTY: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Synergy,
    Compatible,
    Caution,
    Avoid,
}

impl Verdict {
    pub fn from_harmony(harmony: f64) -> Self {
        if harmony >= 0.7 {
            Verdict::Synergy
        } else if harmony >= 0.5 {
            Verdict::Compatible
        } else if harmony >= 0.35 {
            Verdict::Caution
        } else {
            Verdict::Avoid
        }
    }

    pub fn recommendation(self) -> &'static str {
        match self {
            Verdict::Synergy => "✅ Strong synergy — ideal collaboration pair.",
            Verdict::Compatible => "🟡 Compatible — proceed with caution.",
            Verdict::Caution => "⚠️ Risky — verify alignment before committing.",
            Verdict::Avoid => "❌ Avoid — incompatible energies, high loss risk.",
        }
    }
}

/// Harmony of two scores: their mean, less 0.3 of their gap, in [0, 1] to 3 decimals.
pub fn harmony(score_a: f64, score_b: f64) -> f64 {
    let raw = (score_a + score_b) / 2.0 - (score_a - score_b).abs() * DIFF_PENALTY;
    round_to_mills(raw).clamp(0.0, 1.0)
}

fn round_to_mills(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPair {
    pub agent_a: String,
    pub agent_b: String,
    pub score_a: f64,
    pub score_b: f64,
    pub harmony_score: f64,
    pub verdict: Verdict,
    pub recommendation: String,
}

impl MatchPair {
    fn label(&self) -> String {
        format!("{} ↔ {}", self.agent_a, self.agent_b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchHighlight {
    pub pair: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMatchResponse {
    pub timestamp: String,
    pub agents_analyzed: usize,
    pub pairs_checked: usize,
    pub pairs: Vec<MatchPair>,
    pub best_match: MatchHighlight,
    pub worst_match: MatchHighlight,
    pub survival_advisory: String,
    pub oracle_credit_charged: f64,
}

fn agent_score(
    engine: &ScoreEngine,
    birth_date: &str,
    target_date: &str,
    reference: &ReferenceBirth,
) -> f64 {
    match engine.calculate_daily_luck(
        birth_date,
        AGENT_BIRTH_TIME,
        target_date,
        &reference.gender.to_string(),
    ) {
        Ok(report) => report.trading_luck_score,
        Err(e) => {
            tracing::debug!(birth = birth_date, error = %e, "Agent reading failed, using neutral score");
            NEUTRAL_SCORE
        }
    }
}

fn rate_pair(
    a: &AgentProfile,
    b: &AgentProfile,
    score: impl Fn(&AgentProfile) -> f64,
) -> MatchPair {
    let score_a = score(a);
    let score_b = score(b);
    let harmony_score = harmony(score_a, score_b);
    let verdict = Verdict::from_harmony(harmony_score);
    MatchPair {
        agent_a: a.name.clone().unwrap_or_else(|| "AgentA".to_string()),
        agent_b: b.name.clone().unwrap_or_else(|| "AgentB".to_string()),
        score_a: round_to_mills(score_a),
        score_b: round_to_mills(score_b),
        harmony_score,
        verdict,
        recommendation: verdict.recommendation().to_string(),
    }
}

/// First pair whose harmony beats every earlier one under `better`.
fn first_by(pairs: &[MatchPair], better: impl Fn(f64, f64) -> bool) -> &MatchPair {
    let mut chosen = &pairs[0];
    for pair in &pairs[1..] {
        if better(pair.harmony_score, chosen.harmony_score) {
            chosen = pair;
        }
    }
    chosen
}

/// Rate every pair of the requested agents on the target date (today if absent).
pub fn handle_agent_match(
    engine: &ScoreEngine,
    requirement: &Requirement,
    target_date: &str,
    now: DateTime<Utc>,
    reference: &ReferenceBirth,
    prices: &ServicePrices,
) -> Result<AgentMatchResponse, InvalidInputError> {
    let agents = requirement
        .agents
        .as_deref()
        .filter(|agents| !agents.is_empty())
        .ok_or(InvalidInputError::Missing("agents list required"))?;
    if agents.len() < MIN_AGENTS {
        return Err(InvalidInputError::TooFewAgents(MIN_AGENTS));
    }
    if agents.len() > MAX_AGENTS {
        return Err(InvalidInputError::TooManyAgents(MAX_AGENTS));
    }
    parse_date("target_date", target_date)?;

    let score = |agent: &AgentProfile| {
        let birth = agent.birth_date.as_deref().unwrap_or(DEFAULT_AGENT_BIRTH);
        agent_score(engine, birth, target_date, reference)
    };

    let mut pairs = Vec::new();
    for (i, a) in agents.iter().enumerate() {
        for b in &agents[i + 1..] {
            pairs.push(rate_pair(a, b, &score));
        }
    }

    let best = first_by(&pairs, |candidate, current| candidate > current);
    let worst = first_by(&pairs, |candidate, current| candidate < current);
    let survival_advisory = format!(
        "Best collaboration: {} (harmony {}). Avoid: {} (harmony {}).",
        best.label(),
        score_text(best.harmony_score),
        worst.label(),
        score_text(worst.harmony_score)
    );
    let best_match = MatchHighlight {
        pair: best.label(),
        score: best.harmony_score,
    };
    let worst_match = MatchHighlight {
        pair: worst.label(),
        score: worst.harmony_score,
    };

    tracing::debug!(agents = agents.len(), pairs = pairs.len(), best = %best_match.pair, "agentMatch");
    Ok(AgentMatchResponse {
        timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        agents_analyzed: agents.len(),
        pairs_checked: pairs.len(),
        best_match,
        worst_match,
        survival_advisory,
        oracle_credit_charged: prices.agent_match_price(agents.len()),
        pairs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 20, 9, 0, 0).unwrap()
    }

    fn run(raw: &str) -> Result<AgentMatchResponse, InvalidInputError> {
        handle_agent_match(
            &ScoreEngine::new(),
            &Requirement::parse(raw),
            "2026-02-20",
            now(),
            &ReferenceBirth::default(),
            &ServicePrices::default(),
        )
    }

    #[test]
    fn test_harmony_formula() {
        assert_eq!(harmony(0.71, 0.36), 0.43);
        assert_eq!(harmony(0.71, 0.25), 0.342);
        assert_eq!(harmony(0.71, 0.71), 0.71);
        assert_eq!(harmony(0.0, 1.0), 0.2);
        assert_eq!(harmony(1.0, 1.0), 1.0);
    }

    #[test]
    fn test_verdict_thresholds() {
        assert_eq!(Verdict::from_harmony(0.7), Verdict::Synergy);
        assert_eq!(Verdict::from_harmony(0.699), Verdict::Compatible);
        assert_eq!(Verdict::from_harmony(0.5), Verdict::Compatible);
        assert_eq!(Verdict::from_harmony(0.35), Verdict::Caution);
        assert_eq!(Verdict::from_harmony(0.349), Verdict::Avoid);
    }

    #[test]
    fn test_two_agents() {
        let resp = run(
            r#"{"agents":[{"name":"Alpha","birth_date":"1990-05-15"},{"name":"Beta","birth_date":"1985-11-30"}]}"#,
        )
        .unwrap();
        assert_eq!(resp.agents_analyzed, 2);
        assert_eq!(resp.pairs_checked, 1);
        let pair = &resp.pairs[0];
        assert_eq!((pair.score_a, pair.score_b), (0.71, 0.36));
        assert_eq!(pair.harmony_score, 0.43);
        assert_eq!(pair.verdict, Verdict::Caution);
        assert_eq!(resp.oracle_credit_charged, 1.00);
        assert_eq!(resp.timestamp, "2026-02-20T09:00:00Z");
    }

    #[test]
    fn test_best_and_worst_pairs() {
        let resp = run(
            r#"{"agents":[
                {"name":"Alpha","birth_date":"1990-05-15"},
                {"name":"Beta","birth_date":"1985-11-30"},
                {"name":"Gamma","birth_date":"2024-03-15"},
                {"name":"Delta","birth_date":"not-a-date"}
            ]}"#,
        )
        .unwrap();
        let harmonies: Vec<f64> = resp.pairs.iter().map(|p| p.harmony_score).collect();
        assert_eq!(harmonies, vec![0.43, 0.342, 0.542, 0.272, 0.388, 0.3]);
        // An unreadable agent scores neutral
        assert_eq!(resp.pairs[2].score_b, 0.5);
        assert_eq!(resp.best_match.pair, "Alpha ↔ Delta");
        assert_eq!(resp.worst_match.pair, "Beta ↔ Gamma");
        assert_eq!(
            resp.survival_advisory,
            "Best collaboration: Alpha ↔ Delta (harmony 0.542). Avoid: Beta ↔ Gamma (harmony 0.272)."
        );
        assert_eq!(resp.oracle_credit_charged, 2.00);
    }

    #[test]
    fn test_ties_keep_first_pair() {
        let resp = run(
            r#"{"agents":[{"name":"A","birth_date":"1990-05-15"},{"name":"B","birth_date":"1990-05-15"},{"name":"C","birth_date":"1990-05-15"}]}"#,
        )
        .unwrap();
        assert!(resp.pairs.iter().all(|p| p.verdict == Verdict::Synergy));
        assert_eq!(resp.best_match.pair, "A ↔ B");
        assert_eq!(resp.worst_match.pair, "A ↔ B");
    }

    #[test]
    fn test_default_names_and_birth() {
        let resp = run(r#"{"agents":[{},{}]}"#).unwrap();
        assert_eq!(resp.pairs[0].agent_a, "AgentA");
        assert_eq!(resp.pairs[0].agent_b, "AgentB");
        assert_eq!(resp.pairs[0].score_a, resp.pairs[0].score_b);
    }

    #[test]
    fn test_agent_count_limits() {
        assert_eq!(
            run(r#"{"target_date":"2026-02-20"}"#).unwrap_err(),
            InvalidInputError::Missing("agents list required")
        );
        assert_eq!(
            run(r#"{"agents":[]}"#).unwrap_err(),
            InvalidInputError::Missing("agents list required")
        );
        let one = run(r#"{"agents":[{"name":"Solo"}]}"#).unwrap_err();
        assert_eq!(one.to_string(), "Minimum 2 agents required for match analysis");
        let six = run(r#"{"agents":[{},{},{},{},{},{}]}"#).unwrap_err();
        assert_eq!(six.to_string(), "Maximum 5 agents allowed for survival analysis");
        assert_eq!(run(r#"{"agents":[{},{},{},{},{}]}"#).unwrap().pairs_checked, 10);
    }

    #[test]
    fn test_invalid_target_date_rejected() {
        let err = handle_agent_match(
            &ScoreEngine::new(),
            &Requirement::parse(r#"{"agents":[{},{}]}"#),
            "20-02-2026",
            now(),
            &ReferenceBirth::default(),
            &ServicePrices::default(),
        )
        .unwrap_err();
        assert!(matches!(err, InvalidInputError::Date { field: "target_date", .. }));
    }
}
