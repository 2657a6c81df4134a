use crate::error::ConfigError;
use borsh::{BorshDeserialize, BorshSerialize};
use std::str::FromStr;

/// Key hash of the oracle gas lane used on development networks
pub const DEFAULT_GAS_LANE: [u8; 32] = [
    0x47, 0x4e, 0x34, 0xa0, 0x77, 0xdf, 0x58, 0x80, 0x7d, 0xbe, 0x9c, 0x96, 0xd3, 0xc0, 0x09, 0xb2,
    0x3b, 0x3c, 0x6d, 0x0c, 0xce, 0x43, 0x3e, 0x59, 0xbb, 0xf5, 0xb3, 0x4f, 0x82, 0x3b, 0xc5, 0x6c,
];

/// Randomness request parameters, forwarded verbatim to the oracle
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct VrfRequestConfig {
    /// Key hash selecting the oracle gas lane
    pub gas_lane: [u8; 32],
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

impl Default for VrfRequestConfig {
    fn default() -> Self {
        Self {
            gas_lane: DEFAULT_GAS_LANE,
            subscription_id: 11794,
            request_confirmations: 3,
            callback_gas_limit: 500_000,
            num_words: 1,
        }
    }
}

/// Raffle configuration, fixed for the lifetime of an engine
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RaffleConfig {
    /// Entrance fee; a contribution must meet or exceed it
    pub minimum_entry_amount: u64,
    /// Seconds that must pass between rounds
    pub minimum_round_interval: u64,
    pub vrf: VrfRequestConfig,
}

impl Default for RaffleConfig {
    fn default() -> Self {
        Self {
            // 0.01 in 18 decimal units
            minimum_entry_amount: 10_000_000_000_000_000,
            minimum_round_interval: 30,
            vrf: VrfRequestConfig::default(),
        }
    }
}

impl RaffleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.minimum_entry_amount == 0 {
            return Err(ConfigError::ZeroEntryAmount);
        }
        if self.vrf.num_words == 0 {
            return Err(ConfigError::ZeroNumWords);
        }
        Ok(())
    }

    /// Load from `RAFFLE_*` environment variables (and `.env` if present).
    /// Unset keys keep their default.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            minimum_entry_amount: parse_or(&lookup, "RAFFLE_ENTRANCE_FEE", defaults.minimum_entry_amount)?,
            minimum_round_interval: parse_or(&lookup, "RAFFLE_INTERVAL", defaults.minimum_round_interval)?,
            vrf: VrfRequestConfig {
                gas_lane: match lookup("RAFFLE_GAS_LANE") {
                    Some(value) => parse_gas_lane(&value)?,
                    None => defaults.vrf.gas_lane,
                },
                subscription_id: parse_or(&lookup, "RAFFLE_SUBSCRIPTION_ID", defaults.vrf.subscription_id)?,
                request_confirmations: parse_or(
                    &lookup,
                    "RAFFLE_REQUEST_CONFIRMATIONS",
                    defaults.vrf.request_confirmations,
                )?,
                callback_gas_limit: parse_or(&lookup, "RAFFLE_CALLBACK_GAS_LIMIT", defaults.vrf.callback_gas_limit)?,
                num_words: parse_or(&lookup, "RAFFLE_NUM_WORDS", defaults.vrf.num_words)?,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue { key }),
        None => Ok(default),
    }
}

fn parse_gas_lane(value: &str) -> Result<[u8; 32], ConfigError> {
    let value = value.trim();
    let value = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(value)
        .map_err(|_| ConfigError::InvalidGasLane)?
        .try_into()
        .map_err(|_| ConfigError::InvalidGasLane)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = RaffleConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.minimum_round_interval, 30);
        assert_eq!(config.vrf.callback_gas_limit, 500_000);
        assert_eq!(config.vrf.gas_lane[0], 0x47);
        assert_eq!(config.vrf.gas_lane[31], 0x6c);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = RaffleConfig::from_lookup(lookup_from(&[
            ("RAFFLE_ENTRANCE_FEE", "10"),
            ("RAFFLE_INTERVAL", " 60 "),
            ("RAFFLE_GAS_LANE", "0x0101010101010101010101010101010101010101010101010101010101010101"),
            ("RAFFLE_NUM_WORDS", "2"),
        ]))
        .unwrap();

        assert_eq!(config.minimum_entry_amount, 10);
        assert_eq!(config.minimum_round_interval, 60);
        assert_eq!(config.vrf.gas_lane, [1u8; 32]);
        assert_eq!(config.vrf.num_words, 2);
        assert_eq!(config.vrf.subscription_id, 11794);
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        assert_eq!(
            RaffleConfig::from_lookup(lookup_from(&[("RAFFLE_INTERVAL", "soon")])),
            Err(ConfigError::InvalidValue { key: "RAFFLE_INTERVAL" })
        );
        assert_eq!(
            RaffleConfig::from_lookup(lookup_from(&[("RAFFLE_ENTRANCE_FEE", "0")])),
            Err(ConfigError::ZeroEntryAmount)
        );
        assert_eq!(
            RaffleConfig::from_lookup(lookup_from(&[("RAFFLE_GAS_LANE", "0xabcd")])),
            Err(ConfigError::InvalidGasLane)
        );
    }
}
