//! 24-hour "deep luck" forecast.
//!
//! Runs the score engine once per hour of the day (as the birth hour) and
//! summarizes the resulting curve into a trading window recommendation.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::engine::report::{round_to_cents, score_text};
use crate::engine::{
    parse_date, Element, Gender, InvalidInputError, LuckInput, Reading, ScoreEngine,
    VolatilityIndex,
};

pub const ALGORITHM: &str = "Gridcore_Saju_Hourly_V1";

const HOURS_PER_DAY: u32 = 24;

/// Minimum peak score for the day to be considered tradable.
const TRADABLE_PEAK: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    StrongBuy,
    Buy,
    Neutral,
    Caution,
    Avoid,
}

impl Signal {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.80 {
            Signal::StrongBuy
        } else if score >= 0.65 {
            Signal::Buy
        } else if score >= 0.50 {
            Signal::Neutral
        } else if score >= 0.40 {
            Signal::Caution
        } else {
            Signal::Avoid
        }
    }
}

/// One-line explanation for an hour's score.
pub fn reason_text(element: Element, score: f64) -> &'static str {
    if score < 0.4 {
        return "Clash detected (충) — High volatility and reversal risk.";
    }
    match element {
        Element::Wood => "Growth energy aligns with market expansion.",
        Element::Fire => "Peak volatility expected — High momentum window.",
        Element::Earth => "Stable foundation — Good for accumulation.",
        Element::Metal => "Decisive movement — Strong trend direction.",
        Element::Water => "High liquidity flow — Fast circulation.",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub time: String,
    pub score: f64,
    pub element: Element,
    pub signal: Signal,
    pub reason: String,
    pub is_golden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyAnalysis {
    pub max_score: f64,
    pub min_score: f64,
    pub spread: f64,
    pub volatility_warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub action: String,
    pub best_window: String,
    pub max_score: f64,
    pub pro_tip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub target_date: String,
    pub algorithm: String,
    pub process_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyReport {
    pub meta: ReportMeta,
    pub strategy: Strategy,
    pub hourly_analysis: HourlyAnalysis,
    pub hourly_forecast: Vec<HourlyForecast>,
}

/// A window label starting at `hour` and spanning two hours, e.g. "13:00~15:00".
/// The end hour is not wrapped past midnight.
fn window(hour: u32) -> String {
    format!("{:02}:00~{:02}:00", hour, hour + 2)
}

/// First index holding the extreme score; `better` decides replacement.
fn first_extreme(scores: &[f64], better: impl Fn(f64, f64) -> bool) -> usize {
    let mut best = 0;
    for (i, score) in scores.iter().enumerate().skip(1) {
        if better(*score, scores[best]) {
            best = i;
        }
    }
    best
}

/// Score every hour of `target_date` for someone born on `birth_date`.
pub fn hourly_readings(
    engine: &ScoreEngine,
    birth_date: &str,
    target_date: &str,
    gender: &str,
) -> Result<Vec<Reading>, InvalidInputError> {
    (0..HOURS_PER_DAY)
        .map(|hour| {
            let input = LuckInput::parse(birth_date, &format!("{:02}:00", hour), target_date, gender)?;
            Ok(engine.read(&input))
        })
        .collect()
}

/// Build the full hourly report.
pub fn hourly_report(
    engine: &ScoreEngine,
    birth_date: &str,
    target_date: &str,
    gender: &str,
) -> Result<HourlyReport, InvalidInputError> {
    let started = Instant::now();

    // Validate up front so the error names the real field before the loop runs
    parse_date("birth_date", birth_date)?;
    let target = parse_date("target_date", target_date)?;
    gender.parse::<Gender>()?;

    let readings = hourly_readings(engine, birth_date, target_date, gender)?;
    let scores: Vec<f64> = readings
        .iter()
        .map(|r| r.report.trading_luck_score)
        .collect();

    let best = first_extreme(&scores, |a, b| a > b);
    let worst = first_extreme(&scores, |a, b| a < b);
    let max_score = scores[best];
    let min_score = scores[worst];

    // Golden hours: calm (LOW volatility) and within the top quarter of the day
    let mut ranked = scores.clone();
    ranked.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let golden_threshold = ranked[(ranked.len() / 4).saturating_sub(1)];

    let hourly_forecast: Vec<HourlyForecast> = readings
        .iter()
        .enumerate()
        .map(|(hour, reading)| {
            let score = reading.report.trading_luck_score;
            let element = reading.dominant_element();
            HourlyForecast {
                time: format!("{:02}:00", hour),
                score,
                element,
                signal: Signal::from_score(score),
                reason: reason_text(element, score).to_string(),
                is_golden: reading.report.volatility_index == VolatilityIndex::Low
                    && score >= golden_threshold,
            }
        })
        .collect();

    let strategy = if max_score < TRADABLE_PEAK {
        Strategy {
            action: "DO_NOT_TRADE".to_string(),
            best_window: "None".to_string(),
            max_score: round_to_cents(max_score),
            pro_tip: "No golden window today. Market is choppy everywhere. Rest is a strategy."
                .to_string(),
        }
    } else {
        Strategy {
            action: format!("WAIT_UNTIL_{:02}00", best),
            best_window: window(best as u32),
            max_score: round_to_cents(max_score),
            pro_tip: format!(
                "Golden Cross at {:02}:00. Low clash risk + peak luck. Ideal entry.",
                best
            ),
        }
    };

    let volatility_warning = hourly_forecast
        .iter()
        .any(|f| f.signal == Signal::Avoid)
        .then(|| {
            format!(
                "{} (Score {}, Clash detected ⚠️)",
                window(worst as u32),
                score_text(min_score)
            )
        });

    Ok(HourlyReport {
        meta: ReportMeta {
            target_date: target.format("%Y-%m-%d").to_string(),
            algorithm: ALGORITHM.to_string(),
            process_time_ms: started.elapsed().as_millis() as u64,
        },
        strategy,
        hourly_analysis: HourlyAnalysis {
            max_score: round_to_cents(max_score),
            min_score: round_to_cents(min_score),
            spread: round_to_cents(max_score - min_score),
            volatility_warning,
        },
        hourly_forecast,
    })
}
