use std::fmt;

/// Environment variable holding the signing key of the whitelisted wallet
pub const ENV_PRIVATE_KEY: &str = "TRINITY_WALLET_PRIVATE_KEY";
/// Environment variable holding our agent wallet address
pub const ENV_AGENT_WALLET: &str = "TRINITY_AGENT_WALLET";
/// Environment variable holding the marketplace entity id
pub const ENV_ENTITY_ID: &str = "TRINITY_ENTITY_ID";

const DEFAULT_ENTITY_ID: u32 = 2;

/// Secrets needed to talk to the marketplace.
#[derive(Clone, PartialEq, Eq)]
pub struct MarketplaceCredentials {
    pub private_key: String,
    pub agent_wallet: String,
    pub entity_id: u32,
}

impl fmt::Debug for MarketplaceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketplaceCredentials")
            .field("private_key", &"<redacted>")
            .field("agent_wallet", &self.agent_wallet)
            .field("entity_id", &self.entity_id)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl MarketplaceCredentials {
    /// Read credentials from the process environment.
    ///
    /// Returns None when the key or wallet is missing; the marketplace
    /// subsystem is then disabled rather than failing.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let private_key = non_empty(lookup(ENV_PRIVATE_KEY))?;
        let agent_wallet = non_empty(lookup(ENV_AGENT_WALLET))?;
        let entity_id = match non_empty(lookup(ENV_ENTITY_ID)) {
            Some(raw) => match raw.parse() {
                Ok(id) => id,
                Err(_) => {
                    tracing::warn!(value = %raw, "Invalid {}, using default", ENV_ENTITY_ID);
                    DEFAULT_ENTITY_ID
                }
            },
            None => DEFAULT_ENTITY_ID,
        };

        Some(Self {
            private_key,
            agent_wallet,
            entity_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_complete_credentials() {
        let creds = MarketplaceCredentials::from_lookup(lookup(&[
            (ENV_PRIVATE_KEY, "0xkey"),
            (ENV_AGENT_WALLET, " 0xWallet "),
            (ENV_ENTITY_ID, "7"),
        ]))
        .unwrap();
        assert_eq!(creds.agent_wallet, "0xWallet");
        assert_eq!(creds.entity_id, 7);
    }

    #[test]
    fn test_entity_id_defaults() {
        let creds = MarketplaceCredentials::from_lookup(lookup(&[
            (ENV_PRIVATE_KEY, "0xkey"),
            (ENV_AGENT_WALLET, "0xWallet"),
        ]))
        .unwrap();
        assert_eq!(creds.entity_id, 2);

        let creds = MarketplaceCredentials::from_lookup(lookup(&[
            (ENV_PRIVATE_KEY, "0xkey"),
            (ENV_AGENT_WALLET, "0xWallet"),
            (ENV_ENTITY_ID, "abc"),
        ]))
        .unwrap();
        assert_eq!(creds.entity_id, 2);
    }

    #[test]
    fn test_missing_secret_disables() {
        assert!(MarketplaceCredentials::from_lookup(lookup(&[(ENV_AGENT_WALLET, "0xWallet")])).is_none());
        assert!(MarketplaceCredentials::from_lookup(lookup(&[
            (ENV_PRIVATE_KEY, "   "),
            (ENV_AGENT_WALLET, "0xWallet"),
        ]))
        .is_none());
    }

    #[test]
    fn test_debug_redacts_key() {
        let creds = MarketplaceCredentials {
            private_key: "0xsecret".to_string(),
            agent_wallet: "0xWallet".to_string(),
            entity_id: 2,
        };
        assert!(!format!("{:?}", creds).contains("0xsecret"));
    }
}
