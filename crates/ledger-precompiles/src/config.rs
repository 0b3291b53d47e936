//! Bridge configuration.
//!
//! Built once at process start and shared by `Arc` with every component that
//! needs chain parameters.

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::{env, str::FromStr};
use thiserror::Error;

/// Default address of the staking precompile.
pub const STAKING_PRECOMPILE_ADDR: Address =
    address!("0x0000000000000000000000000000000000000800");

/// One year, the default lifetime of an approval.
pub const DEFAULT_APPROVAL_EXPIRATION: u64 = 365 * 24 * 60 * 60;

/// Environment variable overriding [`BridgeConfig::native_denom`].
pub const NATIVE_DENOM_ENV: &str = "LEDGER_NATIVE_DENOM";
/// Environment variable overriding [`BridgeConfig::approval_expiration_secs`].
pub const APPROVAL_EXPIRATION_ENV: &str = "LEDGER_APPROVAL_EXPIRATION_SECS";
/// Environment variable overriding [`BridgeConfig::staking_address`].
pub const STAKING_ADDRESS_ENV: &str = "LEDGER_STAKING_PRECOMPILE_ADDR";

/// Gas schedule of ledger store access.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GasConfig {
    /// Flat cost of an existence check.
    pub has_cost: u64,
    /// Flat cost of a delete.
    pub delete_cost: u64,
    /// Flat cost of a read.
    pub read_cost_flat: u64,
    /// Per-byte cost of a read.
    pub read_cost_per_byte: u64,
    /// Flat cost of a write.
    pub write_cost_flat: u64,
    /// Per-byte cost of a write.
    pub write_cost_per_byte: u64,
    /// Cost of each step of an iteration.
    pub iter_next_cost_flat: u64,
    /// Fixed cost of `deposit` and the wrapped-native fallback.
    pub deposit: u64,
    /// Fixed cost of `withdraw`.
    pub withdraw: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            has_cost: 1_000,
            delete_cost: 1_000,
            read_cost_flat: 1_000,
            read_cost_per_byte: 3,
            write_cost_flat: 2_000,
            write_cost_per_byte: 30,
            iter_next_cost_flat: 30,
            deposit: 23_878,
            withdraw: 9_207,
        }
    }
}

impl GasConfig {
    /// Minimum gas of a method taking `args_len` bytes of arguments.
    pub const fn required_gas(&self, mutates: bool, args_len: usize) -> u64 {
        let len = args_len as u64;
        if mutates {
            self.write_cost_flat
                .saturating_add(self.write_cost_per_byte.saturating_mul(len))
        } else {
            self.read_cost_flat
                .saturating_add(self.read_cost_per_byte.saturating_mul(len))
        }
    }
}

/// Chain parameters consumed by the precompiles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Denomination of the native coin; its pair is served by the wrapped-native shim.
    pub native_denom: String,
    /// Lifetime of approvals created through the precompiles.
    pub approval_expiration_secs: u64,
    /// Address of the staking precompile.
    pub staking_address: Address,
    /// Gas schedule.
    pub gas: GasConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            native_denom: "aevmos".to_string(),
            approval_expiration_secs: DEFAULT_APPROVAL_EXPIRATION,
            staking_address: STAKING_PRECOMPILE_ADDR,
            gas: GasConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Parses a JSON document; absent fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::InvalidJson(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies the `LEDGER_*` environment overrides on top of the defaults.
    pub fn from_env() -> eyre::Result<Self> {
        let mut config = Self::default();

        if let Some(denom) = optional_env(NATIVE_DENOM_ENV)? {
            config.native_denom = denom;
        }
        if let Some(raw) = optional_env(APPROVAL_EXPIRATION_ENV)? {
            config.approval_expiration_secs =
                raw.parse().map_err(|_| ConfigError::InvalidNumber {
                    var: APPROVAL_EXPIRATION_ENV.into(),
                    value: raw.clone(),
                })?;
        }
        if let Some(raw) = optional_env(STAKING_ADDRESS_ENV)? {
            config.staking_address = Address::from_str(&raw)
                .map_err(|err| ConfigError::InvalidAddress(err.to_string()))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations no chain could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.native_denom.trim().is_empty() {
            return Err(ConfigError::EmptyNativeDenom);
        }
        if self.staking_address.is_zero() {
            return Err(ConfigError::InvalidAddress(
                "staking precompile address cannot be zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn optional_env(var: &str) -> Result<Option<String>, ConfigError> {
    match env::var(var) {
        Ok(raw) if raw.trim().is_empty() => Err(ConfigError::EmptyEnv { var: var.into() }),
        Ok(raw) => Ok(Some(raw.trim().to_string())),
        Err(_) => Ok(None),
    }
}

/// Errors that can occur while building a [`BridgeConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An override variable was set but empty.
    #[error("environment variable {var} is empty")]
    EmptyEnv {
        /// Name of the variable.
        var: String,
    },
    /// A numeric override could not be parsed.
    #[error("environment variable {var} is not a number: {value}")]
    InvalidNumber {
        /// Name of the variable.
        var: String,
        /// Raw value.
        value: String,
    },
    /// An address could not be parsed or is not usable.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// The native denomination is blank.
    #[error("native denomination cannot be empty")]
    EmptyNativeDenom,
    /// The JSON document is malformed.
    #[error("invalid bridge config: {0}")]
    InvalidJson(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_chain_parameters() {
        let config = BridgeConfig::default();
        assert_eq!(config.native_denom, "aevmos");
        assert_eq!(config.approval_expiration_secs, 31_536_000);
        assert_eq!(config.staking_address, STAKING_PRECOMPILE_ADDR);
        assert_eq!(config.gas.deposit, 23_878);
        assert_eq!(config.gas.withdraw, 9_207);
    }

    #[test]
    fn required_gas_scales_with_arguments() {
        let gas = GasConfig::default();
        assert_eq!(gas.required_gas(false, 0), 1_000);
        assert_eq!(gas.required_gas(false, 64), 1_000 + 3 * 64);
        assert_eq!(gas.required_gas(true, 64), 2_000 + 30 * 64);
    }

    #[test]
    fn json_overrides_selected_fields() {
        let config = BridgeConfig::from_json(
            r#"{"nativeDenom":"acanto","gas":{"writeCostFlat":5}}"#,
        )
        .expect("valid config");
        assert_eq!(config.native_denom, "acanto");
        assert_eq!(config.gas.write_cost_flat, 5);
        assert_eq!(config.gas.read_cost_flat, 1_000);
        assert_eq!(config.staking_address, STAKING_PRECOMPILE_ADDR);
    }

    #[test]
    fn json_rejects_blank_denom() {
        assert_eq!(
            BridgeConfig::from_json(r#"{"nativeDenom":"  "}"#),
            Err(ConfigError::EmptyNativeDenom)
        );
        assert!(matches!(
            BridgeConfig::from_json("{"),
            Err(ConfigError::InvalidJson(_))
        ));
    }

    #[test]
    fn env_overrides_and_rejects_bad_values() {
        let vars = [NATIVE_DENOM_ENV, APPROVAL_EXPIRATION_ENV, STAKING_ADDRESS_ENV];
        for var in vars {
            env::remove_var(var);
        }
        assert_eq!(BridgeConfig::from_env().unwrap(), BridgeConfig::default());

        env::set_var(NATIVE_DENOM_ENV, " acanto ");
        env::set_var(APPROVAL_EXPIRATION_ENV, "3600");
        env::set_var(STAKING_ADDRESS_ENV, "0x0000000000000000000000000000000000000900");
        let config = BridgeConfig::from_env().expect("valid overrides");
        assert_eq!(config.native_denom, "acanto");
        assert_eq!(config.approval_expiration_secs, 3_600);
        assert_eq!(config.staking_address, address!("0x0000000000000000000000000000000000000900"));

        env::set_var(APPROVAL_EXPIRATION_ENV, "soon");
        let err = BridgeConfig::from_env().unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::InvalidNumber {
                var: APPROVAL_EXPIRATION_ENV.into(),
                value: "soon".into(),
            })
        );

        env::set_var(APPROVAL_EXPIRATION_ENV, "3600");
        env::set_var(NATIVE_DENOM_ENV, "  ");
        let err = BridgeConfig::from_env().unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::EmptyEnv {
                var: NATIVE_DENOM_ENV.into()
            })
        );

        env::set_var(NATIVE_DENOM_ENV, "acanto");
        env::set_var(STAKING_ADDRESS_ENV, "0x0000000000000000000000000000000000000000");
        assert!(BridgeConfig::from_env().is_err());

        for var in vars {
            env::remove_var(var);
        }
    }
}
