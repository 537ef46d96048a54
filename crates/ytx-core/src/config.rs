// crates/ytx-core/src/config.rs
//
// Deployment configuration for the YTX token economy.
// Loaded from a TOML file or populated with the calibrated defaults.
//
// The configuration is owned by whoever constructs the protocol and is handed
// to each component constructor by reference; nothing here is global state.

use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::address::Address;
use crate::error::ConfigError;

/// Basis-point denominator: 10,000 bps = 100%.
pub const BPS_DENOMINATOR: u16 = 10_000;

/// Blocks produced per day at ~13.3s per block.
pub const BLOCKS_PER_DAY: u64 = 6_500;

/// Top-level protocol configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolConfig {
    /// Account granted the administrator role at construction.
    #[serde(default = "default_administrator")]
    pub administrator: Address,

    /// Fee policy for the YTX token. Fields left out of a `[ytx]` table keep
    /// their YTX defaults.
    #[serde(default = "default_ytx", deserialize_with = "deserialize_ytx")]
    pub ytx: TokenConfig,

    /// Fee policy for the YFS token. Fields left out of a `[yfs]` table keep
    /// their YFS defaults.
    #[serde(default = "default_yfs", deserialize_with = "deserialize_yfs")]
    pub yfs: TokenConfig,

    /// YFS emission to YTX stakers.
    #[serde(default)]
    pub emission: EmissionConfig,

    /// Liquidity lock parameters.
    #[serde(default)]
    pub lock: LockConfig,

    /// Blueprint crafting parameters.
    #[serde(default)]
    pub crafting: CraftingConfig,
}

/// Fee policy for a single fungible token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Ticker used in logs and error messages.
    pub symbol: String,

    /// Transfer fee in basis points (100 = 1%).
    pub fee_bps: u16,

    /// Account credited with transfer fees. When unset the protocol picks the
    /// token's natural sink (the liquidity pool for YTX, the administrator
    /// for YFS).
    #[serde(default)]
    pub fee_sink: Option<Address>,

    /// Optional secondary recipient of a slice of every fee.
    #[serde(default)]
    pub treasury: Option<Address>,

    /// Share of each fee routed to `treasury`, in basis points of the fee.
    #[serde(default)]
    pub treasury_share_bps: u16,

    /// Accounts exempt from the fee in addition to the protocol's own.
    #[serde(default)]
    pub exempt: Vec<Address>,
}

/// YFS emission schedule.
///
/// A staker with `s` YTX staked for `b` blocks accrues
/// `s * b * rate_numerator / (blocks_per_period * rate_denominator)` YFS.
#[derive(Debug, Clone, Deserialize)]
pub struct EmissionConfig {
    #[serde(default = "default_blocks_per_period")]
    pub blocks_per_period: u64,
    #[serde(default = "default_rate_numerator")]
    pub rate_numerator: u64,
    #[serde(default = "default_rate_denominator")]
    pub rate_denominator: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    /// Blocks that must elapse after the first lock before liquidity can be
    /// extracted.
    #[serde(default = "default_lock_duration_blocks")]
    pub duration_blocks: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CraftingConfig {
    /// Prefix prepended to a blueprint URI to form a token URI.
    #[serde(default = "default_base_uri")]
    pub base_uri: String,

    /// Fraction of the YTX paid at mint time returned when a card is broken.
    #[serde(default = "default_refund_bps")]
    pub refund_bps: u16,
}

fn default_administrator() -> Address {
    Address::derive("ytx.administrator")
}

fn default_ytx() -> TokenConfig {
    TokenConfig {
        symbol: "YTX".to_string(),
        fee_bps: 100,
        fee_sink: None,
        treasury: None,
        treasury_share_bps: 0,
        exempt: Vec::new(),
    }
}

fn default_yfs() -> TokenConfig {
    TokenConfig {
        symbol: "YFS".to_string(),
        fee_bps: 0,
        fee_sink: None,
        treasury: None,
        treasury_share_bps: 0,
        exempt: Vec::new(),
    }
}

/// A token table as written in TOML: any field may be omitted.
#[derive(Debug, Deserialize)]
struct TokenOverrides {
    symbol: Option<String>,
    fee_bps: Option<u16>,
    fee_sink: Option<Address>,
    treasury: Option<Address>,
    treasury_share_bps: Option<u16>,
    exempt: Option<Vec<Address>>,
}

impl TokenOverrides {
    fn apply(self, base: TokenConfig) -> TokenConfig {
        TokenConfig {
            symbol: self.symbol.unwrap_or(base.symbol),
            fee_bps: self.fee_bps.unwrap_or(base.fee_bps),
            fee_sink: self.fee_sink.or(base.fee_sink),
            treasury: self.treasury.or(base.treasury),
            treasury_share_bps: self.treasury_share_bps.unwrap_or(base.treasury_share_bps),
            exempt: self.exempt.unwrap_or(base.exempt),
        }
    }
}

fn deserialize_ytx<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TokenConfig, D::Error> {
    TokenOverrides::deserialize(deserializer).map(|o| o.apply(default_ytx()))
}

fn deserialize_yfs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TokenConfig, D::Error> {
    TokenOverrides::deserialize(deserializer).map(|o| o.apply(default_yfs()))
}

fn default_blocks_per_period() -> u64 {
    BLOCKS_PER_DAY
}

fn default_rate_numerator() -> u64 {
    1
}

fn default_rate_denominator() -> u64 {
    1
}

fn default_lock_duration_blocks() -> u64 {
    365 * BLOCKS_PER_DAY
}

fn default_base_uri() -> String {
    "https://example-base-uri.com/".to_string()
}

fn default_refund_bps() -> u16 {
    BPS_DENOMINATOR
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            blocks_per_period: default_blocks_per_period(),
            rate_numerator: default_rate_numerator(),
            rate_denominator: default_rate_denominator(),
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            duration_blocks: default_lock_duration_blocks(),
        }
    }
}

impl Default for CraftingConfig {
    fn default() -> Self {
        Self {
            base_uri: default_base_uri(),
            refund_bps: default_refund_bps(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            administrator: default_administrator(),
            ytx: default_ytx(),
            yfs: default_yfs(),
            emission: EmissionConfig::default(),
            lock: LockConfig::default(),
            crafting: CraftingConfig::default(),
        }
    }
}

impl ProtocolConfig {
    /// Load and validate configuration from a TOML file at the given path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        debug!(path = %path.display(), "loaded protocol configuration");
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ProtocolConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the protocol cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (token, field) in [
            (&self.ytx, "ytx.fee_bps"),
            (&self.yfs, "yfs.fee_bps"),
        ] {
            check_bps(field, token.fee_bps)?;
        }
        check_bps("ytx.treasury_share_bps", self.ytx.treasury_share_bps)?;
        check_bps("yfs.treasury_share_bps", self.yfs.treasury_share_bps)?;
        check_bps("crafting.refund_bps", self.crafting.refund_bps)?;

        for (token, field) in [
            (&self.ytx, "ytx.treasury"),
            (&self.yfs, "yfs.treasury"),
        ] {
            if token.treasury_share_bps > 0 && token.treasury.is_none() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "treasury_share_bps is set but no treasury account is configured"
                        .to_string(),
                });
            }
        }

        if self.emission.blocks_per_period == 0 {
            return Err(ConfigError::Invalid {
                field: "emission.blocks_per_period",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.emission.rate_denominator == 0 {
            return Err(ConfigError::Invalid {
                field: "emission.rate_denominator",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn check_bps(field: &'static str, value: u16) -> Result<(), ConfigError> {
    if value > BPS_DENOMINATOR {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("{} bps exceeds {}", value, BPS_DENOMINATOR),
        });
    }
    Ok(())
}
