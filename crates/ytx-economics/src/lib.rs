// crates/ytx-economics/src/lib.rs
//
// ytx-economics: fee-on-transfer ledgers, YFS emission to YTX stakers,
// fee redistribution to locked liquidity, and capped-edition card crafting.
//
// All monetary values are tracked in base units (18 decimals).
// 1 YTX = 1,000,000,000,000,000,000 units (10^18).

pub mod accumulator;
pub mod crafting;
pub mod emission;
pub mod ledger;
pub mod liquidity;
pub mod protocol;
pub mod staking;
pub mod token;

// Re-export key types for ergonomic access from downstream crates.
pub use accumulator::{RewardAccumulator, SharePosition, ACC_SCALE};
pub use crafting::{Blueprint, BlueprintState, CraftingRegistry, MintedToken, FIRST_TOKEN_ID};
pub use emission::EmissionSchedule;
pub use ledger::{FeeLedger, FeePolicy, TransferReceipt};
pub use liquidity::{ExtractedLiquidity, LiquidityLock, LiquidityPosition};
pub use protocol::{
    CraftingSnapshot, LedgerSnapshot, LiquiditySnapshot, Protocol, ProtocolSnapshot,
    StakingSnapshot, CRAFTING_REGISTRY_TAG, LIQUIDITY_LOCK_TAG, STAKING_ENGINE_TAG,
};
pub use staking::{StakePosition, StakingEngine, UnstakeOutcome};
pub use token::{Amount, TokenAmount, TokenKind, UNITS_PER_TOKEN};
