use super::schema::Config;
use crate::engine::{parse_birth_hour, parse_date};

/// Validate configuration at startup.
/// Returns all validation errors at once (not just the first).
pub fn validate_config(config: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    let birth = &config.reference_birth;
    if let Err(e) = parse_date("birth_date", &birth.birth_date) {
        errors.push(format!("reference_birth.birth_date: {}", e));
    }
    if let Err(e) = parse_birth_hour(&birth.birth_time) {
        errors.push(format!("reference_birth.birth_time: {}", e));
    }

    if let Err(e) = humantime::parse_duration(&config.cache.ttl) {
        errors.push(format!(
            "cache.ttl: invalid duration '{}' - {}",
            config.cache.ttl, e
        ));
    }

    match humantime::parse_duration(&config.marketplace.poll_interval) {
        Ok(interval) if interval.is_zero() => {
            errors.push("marketplace.poll_interval: must be greater than zero".to_string());
        }
        Ok(_) => {}
        Err(e) => errors.push(format!(
            "marketplace.poll_interval: invalid duration '{}' - {}",
            config.marketplace.poll_interval, e
        )),
    }

    match humantime::parse_duration(&config.marketplace.pending_ttl) {
        Ok(ttl) if ttl.is_zero() => {
            errors.push("marketplace.pending_ttl: must be greater than zero".to_string());
        }
        Ok(_) => {}
        Err(e) => errors.push(format!(
            "marketplace.pending_ttl: invalid duration '{}' - {}",
            config.marketplace.pending_ttl, e
        )),
    }

    if config.marketplace.accept_attempts == 0 {
        errors.push("marketplace.accept_attempts: must be at least 1".to_string());
    }

    for (name, price) in [
        ("daily_luck", config.prices.daily_luck),
        ("deep_luck", config.prices.deep_luck),
        ("agent_match", config.prices.agent_match),
        ("agent_match_extra", config.prices.agent_match_extra),
    ] {
        if !price.is_finite() || price < 0.0 {
            errors.push(format!("prices.{}: must be a non-negative number", name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_invalid_reference_birth() {
        let mut config = Config::default();
        config.reference_birth.birth_date = "1990-02-30".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("reference_birth.birth_date"));
    }

    #[test]
    fn test_zero_poll_interval() {
        let mut config = Config::default();
        config.marketplace.poll_interval = "0s".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].contains("greater than zero"));
    }

    #[test]
    fn test_bad_pending_ttl() {
        let mut config = Config::default();
        config.marketplace.pending_ttl = "0s".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec!["marketplace.pending_ttl: must be greater than zero"]);

        config.marketplace.pending_ttl = "later".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].starts_with("marketplace.pending_ttl: invalid duration 'later'"));
    }

    #[test]
    fn test_negative_price() {
        let mut config = Config::default();
        config.prices.deep_luck = -0.5;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec!["prices.deep_luck: must be a non-negative number"]);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = Config::default();
        config.reference_birth.birth_time = "25:00".to_string(); // Error 1
        config.cache.ttl = "forever".to_string(); // Error 2
        config.marketplace.accept_attempts = 0; // Error 3
        config.prices.daily_luck = f64::NAN; // Error 4
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }
}
