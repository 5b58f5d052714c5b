use serde::{Deserialize, Serialize};
use std::fmt;

use super::tables::Element;

pub const MIN_SCORE: i32 = 10;
pub const MAX_SCORE: i32 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Keyword {
    StrongBearish,
    Bearish,
    Neutral,
    Bullish,
    StrongBullish,
}

impl Keyword {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 80 => Keyword::StrongBullish,
            s if s >= 65 => Keyword::Bullish,
            s if s >= 45 => Keyword::Neutral,
            s if s >= 30 => Keyword::Bearish,
            _ => Keyword::StrongBearish,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::StrongBearish => "STRONG_BEARISH",
            Keyword::Bearish => "BEARISH",
            Keyword::Neutral => "NEUTRAL",
            Keyword::Bullish => "BULLISH",
            Keyword::StrongBullish => "STRONG_BULLISH",
        }
    }

    /// Trading posture advertised alongside the keyword.
    pub fn strategy(self) -> &'static str {
        match self {
            Keyword::StrongBullish => "Aggressive Entry — Strong Buy Signal",
            Keyword::Bullish => "Moderate Entry — Buy on Dips",
            Keyword::Neutral => "Range Trade — Wait for Breakout",
            Keyword::Bearish => "Reduce Position — Defensive Mode",
            Keyword::StrongBearish => "Exit Position — Capital Preservation",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sector {
    Meme,
    Ai,
    Volatile,
    Infrastructure,
    Layer1,
    Btc,
    Defi,
    Exchange,
    Liquidity,
    Rwa,
    Stablecoin,
    NewListing,
    Gamefi,
    Nft,
}

impl Sector {
    /// Sectors favoured by a chart whose dominant element is `element`.
    pub fn for_element(element: Element) -> &'static [Sector] {
        match element {
            Element::Fire => &[Sector::Meme, Sector::Ai, Sector::Volatile],
            Element::Earth => &[Sector::Infrastructure, Sector::Layer1, Sector::Btc],
            Element::Water => &[Sector::Defi, Sector::Exchange, Sector::Liquidity],
            Element::Metal => &[Sector::Rwa, Sector::Stablecoin],
            Element::Wood => &[Sector::NewListing, Sector::Gamefi, Sector::Nft],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sector::Meme => "MEME",
            Sector::Ai => "AI",
            Sector::Volatile => "VOLATILE",
            Sector::Infrastructure => "INFRASTRUCTURE",
            Sector::Layer1 => "LAYER1",
            Sector::Btc => "BTC",
            Sector::Defi => "DEFI",
            Sector::Exchange => "EXCHANGE",
            Sector::Liquidity => "LIQUIDITY",
            Sector::Rwa => "RWA",
            Sector::Stablecoin => "STABLECOIN",
            Sector::NewListing => "NEW_LISTING",
            Sector::Gamefi => "GAMEFI",
            Sector::Nft => "NFT",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityIndex {
    High,
    Low,
}

impl VolatilityIndex {
    pub fn from_clashes(clash_count: u8) -> Self {
        if clash_count > 2 {
            VolatilityIndex::High
        } else {
            VolatilityIndex::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketSentiment {
    Stable,
    Volatile,
}

impl MarketSentiment {
    pub fn from_harmonies(harmony_count: u8) -> Self {
        if harmony_count > 1 {
            MarketSentiment::Stable
        } else {
            MarketSentiment::Volatile
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WealthOpportunity {
    High,
    Medium,
    Low,
}

impl WealthOpportunity {
    pub fn from_score(score: i32) -> Self {
        if score >= 70 {
            WealthOpportunity::High
        } else if score >= 50 {
            WealthOpportunity::Medium
        } else {
            WealthOpportunity::Low
        }
    }
}

/// Map a raw score in [10, 95] onto [0, 1], rounded to two decimals.
pub fn normalize_score(raw_score: i32) -> f64 {
    let normalized = f64::from(raw_score - MIN_SCORE) / f64::from(MAX_SCORE - MIN_SCORE);
    round_to_cents(normalized)
}

pub(crate) fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Render a score the way buyers have always seen it: whole numbers keep one decimal (`0.0`, `1.0`).
pub(crate) fn score_text(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// The result record delivered to buyers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuckReport {
    pub trading_luck_score: f64,
    pub favorable_sectors: Vec<Sector>,
    pub volatility_index: VolatilityIndex,
    pub market_sentiment: MarketSentiment,
    pub wealth_opportunity: WealthOpportunity,
    pub raw_score: i32,
    pub breakdown: Vec<String>,
    pub keyword: Keyword,
}
