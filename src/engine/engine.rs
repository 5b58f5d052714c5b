use chrono::Datelike;

use super::pillars::{year_pillar, Chart, DecadeCycle, FavorableElement, GanZhi};
use super::report::{
    normalize_score, Keyword, LuckReport, MarketSentiment, Sector, VolatilityIndex,
    WealthOpportunity, MAX_SCORE, MIN_SCORE,
};
use super::tables::Element;
use super::validation::{InvalidInputError, LuckInput};

const BASE_SCORE: f64 = 50.0;

const FAVORABLE_POINTS: f64 = 30.0;
const AUXILIARY_POINTS: f64 = 15.0;
const HOSTILE_POINTS: f64 = -20.0;

const STEM_WEIGHT: f64 = 0.3;
const BRANCH_WEIGHT: f64 = 0.7;

/// Year cycle carries two thirds of the decade cycle's influence.
const YEAR_CYCLE_WEIGHT: f64 = 0.67;

const INTERACTION_POINTS: i32 = 5;

/// Points contributed by each scoring stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub decade_cycle: f64,
    pub year_cycle: f64,
    pub interaction: i32,
}

impl ScoreBreakdown {
    /// Base plus contributions, rounded half-to-even and clamped to [10, 95].
    pub fn total(&self) -> i32 {
        let mut score = BASE_SCORE;
        score += self.decade_cycle;
        score += self.year_cycle;
        score += f64::from(self.interaction);
        (score.round_ties_even() as i32).clamp(MIN_SCORE, MAX_SCORE)
    }

    /// Human-readable lines; the interaction line is omitted when it is zero.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Decade cycle: {:+.1}", self.decade_cycle),
            format!("Year cycle: {:+.1}", self.year_cycle),
        ];
        if self.interaction != 0 {
            lines.push(format!("Interaction: {:+}", self.interaction));
        }
        lines
    }
}

/// Full derivation behind a single report.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub chart: Chart,
    pub decade: DecadeCycle,
    pub year: GanZhi,
    pub breakdown: ScoreBreakdown,
    pub report: LuckReport,
}

impl Reading {
    pub fn dominant_element(&self) -> Element {
        self.chart.elements.dominant()
    }
}

/// Score one element against the favorable pair.
pub fn evaluate_element(element: Element, favorable: &FavorableElement) -> f64 {
    if element == favorable.favorable {
        FAVORABLE_POINTS
    } else if element == favorable.auxiliary {
        AUXILIARY_POINTS
    } else if element.controls() == favorable.favorable {
        HOSTILE_POINTS
    } else {
        0.0
    }
}

/// Weighted score of a pillar: stem 30%, branch 70%.
pub fn pillar_score(pillar: &GanZhi, favorable: &FavorableElement) -> f64 {
    let stem = evaluate_element(pillar.stem.element(), favorable);
    let branch = evaluate_element(pillar.branch.element(), favorable);
    stem * STEM_WEIGHT + branch * BRANCH_WEIGHT
}

/// Deterministic trading-luck calculator.
///
/// Holds no state; one instance can be shared freely across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreEngine;

impl ScoreEngine {
    pub fn new() -> Self {
        Self
    }

    /// Validate raw inputs and compute the report.
    pub fn calculate_daily_luck(
        &self,
        birth_date: &str,
        birth_time: &str,
        target_date: &str,
        gender: &str,
    ) -> Result<LuckReport, InvalidInputError> {
        let input = LuckInput::parse(birth_date, birth_time, target_date, gender)?;
        Ok(self.read(&input).report)
    }

    /// Compute the full reading for already validated input.
    pub fn read(&self, input: &LuckInput) -> Reading {
        let chart = Chart::derive(input.birth_date, input.birth_hour);
        let target_year = input.target_date.year();

        let decade = DecadeCycle::for_year(&chart, target_year);
        let year = year_pillar(target_year);

        let breakdown = ScoreBreakdown {
            decade_cycle: pillar_score(&decade.pillar, &chart.favorable),
            year_cycle: pillar_score(&year, &chart.favorable) * YEAR_CYCLE_WEIGHT,
            interaction: i32::from(chart.interactions.harmony) * INTERACTION_POINTS
                - i32::from(chart.interactions.clash) * INTERACTION_POINTS,
        };

        let raw_score = breakdown.total();
        let report = LuckReport {
            trading_luck_score: normalize_score(raw_score),
            favorable_sectors: Sector::for_element(chart.elements.dominant()).to_vec(),
            volatility_index: VolatilityIndex::from_clashes(chart.interactions.clash),
            market_sentiment: MarketSentiment::from_harmonies(chart.interactions.harmony),
            wealth_opportunity: WealthOpportunity::from_score(raw_score),
            raw_score,
            breakdown: breakdown.lines(),
            keyword: Keyword::from_score(raw_score),
        };

        Reading {
            chart,
            decade,
            year,
            breakdown,
            report,
        }
    }
}
