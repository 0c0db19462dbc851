use crate::domain::{Address, SwapInterval};
use crate::engine::fees::{is_valid_fee, FEE_PRECISION, MAX_FEE};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Default swap fee: 0.6%.
pub const DEFAULT_SWAP_FEE: u32 = 6_000;
/// Default loan fee: 0.1%.
pub const DEFAULT_LOAN_FEE: u32 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Account holding the hub's tokens on the token ledger.
    pub hub_address: Address,
    /// Only account allowed to withdraw platform balances.
    pub fee_recipient: Address,
    /// Swap fee in parts per million.
    #[serde(default = "default_swap_fee")]
    pub swap_fee: u32,
    /// Loan fee in parts per million.
    #[serde(default = "default_loan_fee")]
    pub loan_fee: u32,
    #[serde(default = "default_allowed_intervals")]
    pub allowed_intervals: Vec<SwapInterval>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn default_swap_fee() -> u32 {
    DEFAULT_SWAP_FEE
}

fn default_loan_fee() -> u32 {
    DEFAULT_LOAN_FEE
}

fn default_allowed_intervals() -> Vec<SwapInterval> {
    vec![
        SwapInterval::FIVE_MINUTES,
        SwapInterval::FIFTEEN_MINUTES,
        SwapInterval::ONE_HOUR,
        SwapInterval::FOUR_HOURS,
        SwapInterval::ONE_DAY,
        SwapInterval::ONE_WEEK,
    ]
}

impl HubConfig {
    pub fn new(hub_address: Address, fee_recipient: Address) -> Self {
        Self {
            hub_address,
            fee_recipient,
            swap_fee: DEFAULT_SWAP_FEE,
            loan_fee: DEFAULT_LOAN_FEE,
            allowed_intervals: default_allowed_intervals(),
        }
    }

    pub fn with_swap_fee(mut self, swap_fee: u32) -> Self {
        self.swap_fee = swap_fee;
        self
    }

    pub fn with_loan_fee(mut self, loan_fee: u32) -> Self {
        self.loan_fee = loan_fee;
        self
    }

    pub fn with_allowed_intervals(mut self, intervals: Vec<SwapInterval>) -> Self {
        self.allowed_intervals = intervals;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let hub_address = required_address(&env_map, "DCA_HUB_ADDRESS")?;
        let fee_recipient = required_address(&env_map, "DCA_FEE_RECIPIENT")?;

        let swap_fee = match env_map.get("DCA_SWAP_FEE") {
            Some(raw) => parse_fee_percent("DCA_SWAP_FEE", raw)?,
            None => DEFAULT_SWAP_FEE,
        };
        let loan_fee = match env_map.get("DCA_LOAN_FEE") {
            Some(raw) => parse_fee_percent("DCA_LOAN_FEE", raw)?,
            None => DEFAULT_LOAN_FEE,
        };

        let allowed_intervals = parse_allowed_intervals_from_map(&env_map)?;

        Ok(HubConfig {
            hub_address,
            fee_recipient,
            swap_fee,
            loan_fee,
            allowed_intervals,
        })
    }

    /// Load a JSON document shaped like this struct. Fees are in parts per million.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| {
            ConfigError::InvalidValue(
                path.display().to_string(),
                "file not found or unreadable".to_string(),
            )
        })?;
        let config: HubConfig = serde_json::from_str(&content).map_err(|e| {
            ConfigError::InvalidValue(path.display().to_string(), e.to_string())
        })?;
        for (key, fee) in [("swap_fee", config.swap_fee), ("loan_fee", config.loan_fee)] {
            if !is_valid_fee(fee) {
                return Err(ConfigError::InvalidValue(
                    key.to_string(),
                    format!("must be at most {}, got {}", MAX_FEE, fee),
                ));
            }
        }
        Ok(config)
    }
}

fn required_address(env_map: &HashMap<String, String>, key: &str) -> Result<Address, ConfigError> {
    let raw = env_map
        .get(key)
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))?;
    let address: Address = raw
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), "must not be empty".to_string()))?;
    if address.is_zero() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must not be the zero address".to_string(),
        ));
    }
    Ok(address)
}

/// Parse a fee given in percent ("0.3") into parts per million (3000).
fn parse_fee_percent(key: &str, raw: &str) -> Result<u32, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue(key.to_string(), reason);
    let percent = Decimal::from_str(raw.trim())
        .map_err(|_| invalid(format!("must be a decimal percentage, got {}", raw)))?;
    let scale = Decimal::from(FEE_PRECISION / 100);
    let ppm = percent
        .checked_mul(scale)
        .filter(|ppm| ppm.fract().is_zero())
        .and_then(|ppm| ppm.to_u32())
        .ok_or_else(|| invalid(format!("unrepresentable fee {}", raw)))?;
    if !is_valid_fee(ppm) {
        return Err(invalid(format!("must be at most 10%, got {}%", raw)));
    }
    Ok(ppm)
}

fn parse_allowed_intervals_from_map(
    env_map: &HashMap<String, String>,
) -> Result<Vec<SwapInterval>, ConfigError> {
    let parse_all = |key: &str, items: Vec<&str>| -> Result<Vec<SwapInterval>, ConfigError> {
        items
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<SwapInterval>()
                    .map_err(|e| ConfigError::InvalidValue(key.to_string(), e))
            })
            .collect()
    };

    if let Some(list) = env_map.get("DCA_ALLOWED_INTERVALS") {
        parse_all("DCA_ALLOWED_INTERVALS", list.split(',').collect())
    } else if let Some(file_path) = env_map.get("DCA_ALLOWED_INTERVALS_FILE") {
        let content = std::fs::read_to_string(file_path).map_err(|_| {
            ConfigError::InvalidValue(
                "DCA_ALLOWED_INTERVALS_FILE".to_string(),
                "file not found or unreadable".to_string(),
            )
        })?;
        parse_all("DCA_ALLOWED_INTERVALS_FILE", content.lines().collect())
    } else {
        Ok(default_allowed_intervals())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DCA_HUB_ADDRESS".to_string(), "0xhub".to_string());
        map.insert("DCA_FEE_RECIPIENT".to_string(), "0xfees".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = HubConfig::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.hub_address, Address::new("0xhub"));
        assert_eq!(config.swap_fee, DEFAULT_SWAP_FEE);
        assert_eq!(config.loan_fee, DEFAULT_LOAN_FEE);
        assert_eq!(config.allowed_intervals.len(), 6);
    }

    #[test]
    fn test_missing_hub_address() {
        let mut env_map = setup_required_env();
        env_map.remove("DCA_HUB_ADDRESS");
        match HubConfig::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DCA_HUB_ADDRESS"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_zero_fee_recipient() {
        let mut env_map = setup_required_env();
        env_map.insert("DCA_FEE_RECIPIENT".to_string(), "0x0000".to_string());
        match HubConfig::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "DCA_FEE_RECIPIENT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_empty_hub_address() {
        let mut env_map = setup_required_env();
        env_map.insert("DCA_HUB_ADDRESS".to_string(), "  ".to_string());
        match HubConfig::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, reason)) => {
                assert_eq!(k, "DCA_HUB_ADDRESS");
                assert_eq!(reason, "must not be empty");
            }
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_fee_percent_parsing() {
        let mut env_map = setup_required_env();
        env_map.insert("DCA_SWAP_FEE".to_string(), "0.3".to_string());
        env_map.insert("DCA_LOAN_FEE".to_string(), "0.05".to_string());
        let config = HubConfig::from_env_map(env_map).unwrap();
        assert_eq!(config.swap_fee, 3_000);
        assert_eq!(config.loan_fee, 500);
    }

    #[test]
    fn test_fee_too_high() {
        let mut env_map = setup_required_env();
        env_map.insert("DCA_SWAP_FEE".to_string(), "10.5".to_string());
        match HubConfig::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "DCA_SWAP_FEE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_fee_too_precise() {
        let mut env_map = setup_required_env();
        env_map.insert("DCA_LOAN_FEE".to_string(), "0.00001".to_string());
        match HubConfig::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "DCA_LOAN_FEE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_allowed_intervals_list() {
        let mut env_map = setup_required_env();
        env_map.insert(
            "DCA_ALLOWED_INTERVALS".to_string(),
            "15m, 1h,86400".to_string(),
        );
        let config = HubConfig::from_env_map(env_map).unwrap();
        assert_eq!(
            config.allowed_intervals,
            vec![
                SwapInterval::FIFTEEN_MINUTES,
                SwapInterval::ONE_HOUR,
                SwapInterval::ONE_DAY
            ]
        );
    }

    #[test]
    fn test_allowed_intervals_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "5m").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "1w").unwrap();

        let mut env_map = setup_required_env();
        env_map.insert(
            "DCA_ALLOWED_INTERVALS_FILE".to_string(),
            file.path().display().to_string(),
        );
        let config = HubConfig::from_env_map(env_map).unwrap();
        assert_eq!(
            config.allowed_intervals,
            vec![SwapInterval::FIVE_MINUTES, SwapInterval::ONE_WEEK]
        );
    }

    #[test]
    fn test_invalid_interval() {
        let mut env_map = setup_required_env();
        env_map.insert("DCA_ALLOWED_INTERVALS".to_string(), "15x".to_string());
        match HubConfig::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "DCA_ALLOWED_INTERVALS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"hub_address":"0xhub","fee_recipient":"0xfees","swap_fee":3000,"allowed_intervals":[900,3600]}}"#
        )
        .unwrap();

        let config = HubConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.swap_fee, 3000);
        assert_eq!(config.loan_fee, DEFAULT_LOAN_FEE);
        assert_eq!(
            config.allowed_intervals,
            vec![SwapInterval::FIFTEEN_MINUTES, SwapInterval::ONE_HOUR]
        );
    }

    #[test]
    fn test_from_json_file_rejects_high_fee() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"hub_address":"0xhub","fee_recipient":"0xfees","loan_fee":200000}}"#
        )
        .unwrap();
        match HubConfig::from_json_file(file.path()) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "loan_fee"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_from_json_file_rejects_empty_address() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"hub_address":"0xhub","fee_recipient":""}}"#).unwrap();
        match HubConfig::from_json_file(file.path()) {
            Err(ConfigError::InvalidValue(_, reason)) => assert!(reason.contains("invalid address")),
            _ => panic!("Expected InvalidValue error"),
        }
    }
}
