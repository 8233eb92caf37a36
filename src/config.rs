use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use log::warn;

use crate::blockchain::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD, DIFF_MAX};

/// Node settings, read from the environment (after `.env` is loaded).
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub chain_path: PathBuf,
    pub system_wallet_path: PathBuf,
    pub difficulty: u32,
    pub mining_reward: f64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            chain_path: PathBuf::from("chains/chain.json"),
            system_wallet_path: PathBuf::from("system_wallet.json"),
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
        }
    }
}

impl NodeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; missing or unparseable values keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let difficulty = parsed(&lookup, "DIFFICULTY", defaults.difficulty);
        let difficulty = if difficulty > DIFF_MAX {
            warn!("DIFFICULTY={difficulty} is above {DIFF_MAX}, clamping");
            DIFF_MAX
        } else {
            difficulty
        };

        let mining_reward: f64 = parsed(&lookup, "MINING_REWARD", defaults.mining_reward);
        let mining_reward = if mining_reward.is_finite() && mining_reward >= 0.0 {
            mining_reward
        } else {
            warn!("MINING_REWARD={mining_reward} is not usable, using {}", defaults.mining_reward);
            defaults.mining_reward
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parsed(&lookup, "PORT", defaults.port),
            chain_path: lookup("CHAIN_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.chain_path),
            system_wallet_path: lookup("SYSTEM_WALLET_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.system_wallet_path),
            difficulty,
            mining_reward,
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{key}={raw:?} is not valid, using the default");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> NodeConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NodeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(config(&[]), NodeConfig::default());
    }

    #[test]
    fn reads_every_key() {
        let cfg = config(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "5000"),
            ("CHAIN_PATH", "/tmp/c.json"),
            ("SYSTEM_WALLET_PATH", "/etc/sys.json"),
            ("DIFFICULTY", "2"),
            ("MINING_REWARD", "12.5"),
        ]);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.chain_path, PathBuf::from("/tmp/c.json"));
        assert_eq!(cfg.system_wallet_path, PathBuf::from("/etc/sys.json"));
        assert_eq!(cfg.difficulty, 2);
        assert_eq!(cfg.mining_reward, 12.5);
    }

    #[test]
    fn bad_numbers_fall_back() {
        let cfg = config(&[("PORT", "http"), ("DIFFICULTY", "-1"), ("MINING_REWARD", "NaN")]);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.difficulty, DEFAULT_DIFFICULTY);
        assert_eq!(cfg.mining_reward, DEFAULT_MINING_REWARD);
    }

    #[test]
    fn difficulty_is_clamped() {
        assert_eq!(config(&[("DIFFICULTY", "40")]).difficulty, DIFF_MAX);
    }
}
