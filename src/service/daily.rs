use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::requests::ReferenceBirth;
use crate::cache::{Clock, TtlCache};
use crate::engine::{
    InvalidInputError, LuckReport, MarketSentiment, ScoreEngine, Sector, VolatilityIndex,
    WealthOpportunity,
};

const DEFAULT_BIRTH_TIME: &str = "12:00";

/// The five buyer-facing fields of a daily reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLuckSummary {
    pub trading_luck_score: f64,
    pub favorable_sectors: Vec<Sector>,
    pub volatility_index: VolatilityIndex,
    pub market_sentiment: MarketSentiment,
    pub wealth_opportunity: WealthOpportunity,
}

impl From<LuckReport> for DailyLuckSummary {
    fn from(report: LuckReport) -> Self {
        Self {
            trading_luck_score: report.trading_luck_score,
            favorable_sectors: report.favorable_sectors,
            volatility_index: report.volatility_index,
            market_sentiment: report.market_sentiment,
            wealth_opportunity: report.wealth_opportunity,
        }
    }
}

type SummaryKey = (String, Option<String>);

/// Memoizing front for daily readings.
pub struct DailyLuckService {
    engine: ScoreEngine,
    reference: ReferenceBirth,
    cache: TtlCache<SummaryKey, DailyLuckSummary>,
}

impl DailyLuckService {
    pub fn new(
        engine: ScoreEngine,
        reference: ReferenceBirth,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            reference,
            cache: TtlCache::new(ttl, clock),
        }
    }

    /// Daily reading for `target_date`.
    ///
    /// `user_birth_data` is `"YYYY-MM-DD[ HH:MM]"`; the time defaults to noon.
    /// Without birth data the reference birth is used.
    pub fn daily_luck(
        &self,
        target_date: &str,
        user_birth_data: Option<&str>,
    ) -> Result<DailyLuckSummary, InvalidInputError> {
        let key = (
            target_date.to_string(),
            user_birth_data.map(str::to_string),
        );
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(target = target_date, "daily luck cache hit");
            return Ok(hit);
        }

        let report = match user_birth_data.filter(|s| !s.is_empty()) {
            Some(raw) => {
                let mut parts = raw.split_whitespace();
                let birth_date = parts
                    .next()
                    .ok_or(InvalidInputError::Missing("user_birth_data cannot be empty"))?;
                let birth_time = parts.next().unwrap_or(DEFAULT_BIRTH_TIME);
                self.engine.calculate_daily_luck(
                    birth_date,
                    birth_time,
                    target_date,
                    &self.reference.gender.to_string(),
                )?
            }
            None => self.engine.calculate_daily_luck(
                &self.reference.birth_date,
                &self.reference.birth_time,
                target_date,
                &self.reference.gender.to_string(),
            )?,
        };

        let summary = DailyLuckSummary::from(report);
        self.cache.insert(key, summary.clone());
        Ok(summary)
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use chrono::{TimeZone, Utc};

    fn service() -> (Arc<ManualClock>, DailyLuckService) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 2, 20, 0, 0, 0).unwrap(),
        ));
        let service = DailyLuckService::new(
            ScoreEngine::new(),
            ReferenceBirth::default(),
            Duration::from_secs(3600),
            clock.clone(),
        );
        (clock, service)
    }

    #[test]
    fn test_general_reading() {
        let (_clock, service) = service();
        let summary = service.daily_luck("2026-02-20", None).unwrap();
        assert_eq!(summary.trading_luck_score, 0.71);
        assert_eq!(summary.volatility_index, VolatilityIndex::High);
    }

    #[test]
    fn test_empty_birth_data_means_general() {
        let (_clock, service) = service();
        let general = service.daily_luck("2026-02-20", None).unwrap();
        assert_eq!(service.daily_luck("2026-02-20", Some("")).unwrap(), general);
    }

    #[test]
    fn test_personal_reading() {
        let (_clock, service) = service();
        let summary = service
            .daily_luck("2026-02-20", Some("1990-05-15 14:30"))
            .unwrap();
        assert_eq!(summary.trading_luck_score, 0.75);
        assert_eq!(
            summary.favorable_sectors,
            vec![Sector::Infrastructure, Sector::Layer1, Sector::Btc]
        );
    }

    #[test]
    fn test_birth_time_defaults_to_noon() {
        let (_clock, service) = service();
        let with_noon = service
            .daily_luck("2026-02-20", Some("1990-01-01 12:00"))
            .unwrap();
        let without = service.daily_luck("2026-02-20", Some("1990-01-01")).unwrap();
        assert_eq!(with_noon, without);
    }

    #[test]
    fn test_blank_birth_data_rejected() {
        let (_clock, service) = service();
        assert_eq!(
            service.daily_luck("2026-02-20", Some("   ")),
            Err(InvalidInputError::Missing("user_birth_data cannot be empty"))
        );
    }

    #[test]
    fn test_invalid_input_not_cached() {
        let (_clock, service) = service();
        assert!(service.daily_luck("2026-02-31", None).is_err());
        assert_eq!(service.cached_entries(), 0);
    }

    #[test]
    fn test_results_are_cached_until_ttl() {
        let (clock, service) = service();
        service.daily_luck("2026-02-20", None).unwrap();
        service.daily_luck("2026-02-20", None).unwrap();
        assert_eq!(service.cached_entries(), 1);

        clock.advance(chrono::Duration::hours(2));
        service.daily_luck("2026-02-21", None).unwrap();
        // The stale entry is only evicted when it is read again
        assert_eq!(service.cached_entries(), 2);
        service.daily_luck("2026-02-20", None).unwrap();
        assert_eq!(service.cached_entries(), 2);
    }
}
