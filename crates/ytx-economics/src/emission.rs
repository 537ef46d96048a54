// crates/ytx-economics/src/emission.rs
//
// YFS emission schedule for YTX stakers.
//
// Emission is linear in both stake and time:
//
//   generated = staked * elapsed_blocks * rate_numerator
//               / (blocks_per_period * rate_denominator)
//
// With the calibrated defaults (6,500 blocks per period, rate 1/1) a staker
// earns one YFS per staked YTX per day of blocks. The multiplication happens
// before the division so partial periods lose at most one base unit.

use ytx_core::config::EmissionConfig;
use ytx_core::{YtxError, YtxResult};

use crate::token::Amount;

/// Linear per-block emission schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmissionSchedule {
    blocks_per_period: u64,
    rate_numerator: u64,
    rate_denominator: u64,
}

impl EmissionSchedule {
    /// Build a schedule. Zero periods or denominators are clamped to one so
    /// that emission can never divide by zero.
    pub fn new(blocks_per_period: u64, rate_numerator: u64, rate_denominator: u64) -> Self {
        Self {
            blocks_per_period: blocks_per_period.max(1),
            rate_numerator,
            rate_denominator: rate_denominator.max(1),
        }
    }

    pub fn from_config(config: &EmissionConfig) -> Self {
        Self::new(
            config.blocks_per_period,
            config.rate_numerator,
            config.rate_denominator,
        )
    }

    pub fn blocks_per_period(&self) -> u64 {
        self.blocks_per_period
    }

    /// YFS generated by `staked` YTX over `elapsed_blocks` blocks.
    pub fn generated(&self, staked: Amount, elapsed_blocks: u64) -> YtxResult<Amount> {
        if staked == 0 || elapsed_blocks == 0 || self.rate_numerator == 0 {
            return Ok(0);
        }
        let numerator = staked
            .checked_mul(Amount::from(elapsed_blocks))
            .and_then(|v| v.checked_mul(Amount::from(self.rate_numerator)))
            .ok_or(YtxError::ArithmeticOverflow("emission"))?;
        let denominator =
            Amount::from(self.blocks_per_period) * Amount::from(self.rate_denominator);
        Ok(numerator / denominator)
    }

    /// YFS generated by `staked` YTX over one full period.
    pub fn per_period(&self, staked: Amount) -> YtxResult<Amount> {
        self.generated(staked, self.blocks_per_period)
    }
}

impl Default for EmissionSchedule {
    fn default() -> Self {
        Self::from_config(&EmissionConfig::default())
    }
}
