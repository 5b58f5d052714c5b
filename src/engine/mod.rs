pub mod engine;
pub mod pillars;
pub mod report;
pub mod tables;
pub mod validation;

pub use engine::{evaluate_element, pillar_score, Reading, ScoreBreakdown, ScoreEngine};
pub use pillars::{
    year_pillar, Chart, DecadeCycle, ElementTally, FavorableElement, FourPillars, GanZhi,
    InteractionCounts,
};
pub use report::{
    normalize_score, Keyword, LuckReport, MarketSentiment, Sector, VolatilityIndex,
    WealthOpportunity, MAX_SCORE, MIN_SCORE,
};
pub use tables::{Branch, Element, Stem};
pub use validation::{parse_birth_hour, parse_date, Gender, InvalidInputError, LuckInput};
