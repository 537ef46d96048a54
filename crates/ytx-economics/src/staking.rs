// crates/ytx-economics/src/staking.rs
//
// YTX staking with time-weighted YFS emission.
//
// Staked YTX is pulled into the engine's own account through the YTX ledger.
// The engine is not fee-exempt, so a stake of `amount` records only the net
// amount received (99% at a 1% fee), and unstaking pays the fee again on the
// way out.
//
// YFS accrues per block according to the `EmissionSchedule`. Accrual is
// realized on every stake, unstake, and claim: the pending amount is minted
// to the engine and transferred to the staker, and the position's accrual
// marker moves to the current block. All position updates happen before any
// value leaves the engine.

use serde::{Deserialize, Serialize};
use tracing::info;

use ytx_core::{Address, JournaledCell, JournaledMap, Transactional, YtxError, YtxResult};

use crate::emission::EmissionSchedule;
use crate::ledger::FeeLedger;
use crate::token::Amount;

/// A staker's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePosition {
    /// Net YTX held by the engine on behalf of the staker.
    pub staked: Amount,
    /// Block at which YFS accrual was last realized.
    pub last_accrual_block: u64,
}

/// Result of `unstake_and_claim`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnstakeOutcome {
    /// YTX credited to the staker after the transfer fee.
    pub ytx_returned: Amount,
    /// YFS credited to the staker after the YFS transfer fee.
    pub yfs_received: Amount,
}

/// Manages all stake positions.
#[derive(Debug, Clone)]
pub struct StakingEngine {
    address: Address,
    schedule: EmissionSchedule,
    positions: JournaledMap<Address, StakePosition>,
    total_staked: JournaledCell<Amount>,
}

impl StakingEngine {
    /// Create an engine holding stakes in the account `address`.
    pub fn new(address: Address, schedule: EmissionSchedule) -> Self {
        Self {
            address,
            schedule,
            positions: JournaledMap::new(),
            total_staked: JournaledCell::new(0),
        }
    }

    /// The engine's own account on the YTX and YFS ledgers.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn schedule(&self) -> &EmissionSchedule {
        &self.schedule
    }

    pub fn position(&self, staker: &Address) -> Option<StakePosition> {
        self.positions.get(staker).copied()
    }

    pub fn staked_amount(&self, staker: &Address) -> Amount {
        self.positions.get(staker).map_or(0, |p| p.staked)
    }

    pub fn total_staked(&self) -> Amount {
        self.total_staked.value()
    }

    pub fn positions(&self) -> Vec<(Address, StakePosition)> {
        let mut rows: Vec<(Address, StakePosition)> =
            self.positions.iter().map(|(a, p)| (*a, *p)).collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    /// YFS the staker would generate if accrual were realized at `block`.
    pub fn pending_yfs(&self, staker: &Address, block: u64) -> YtxResult<Amount> {
        match self.positions.get(staker) {
            Some(position) => self.schedule.generated(
                position.staked,
                block.saturating_sub(position.last_accrual_block),
            ),
            None => Ok(0),
        }
    }

    /// Stake `amount` YTX from `staker`. The engine must have been approved
    /// on the YTX ledger. Returns the net amount added to the position.
    ///
    /// # Errors
    /// `ZeroAmount`, or any ledger error from pulling the YTX or paying the
    /// pending YFS.
    pub fn stake(
        &mut self,
        ytx: &mut FeeLedger,
        yfs: &mut FeeLedger,
        staker: Address,
        amount: Amount,
        block: u64,
    ) -> YtxResult<Amount> {
        if amount == 0 {
            return Err(YtxError::ZeroAmount("stake"));
        }
        let generated = self.pending_yfs(&staker, block)?;
        let receipt = ytx.transfer_from(self.address, staker, self.address, amount)?;

        let staked = self
            .staked_amount(&staker)
            .checked_add(receipt.net)
            .ok_or(YtxError::ArithmeticOverflow("stake position"))?;
        let total = self
            .total_staked
            .value()
            .checked_add(receipt.net)
            .ok_or(YtxError::ArithmeticOverflow("total staked"))?;
        self.positions.insert(
            staker,
            StakePosition {
                staked,
                last_accrual_block: block,
            },
        );
        self.total_staked.set(total);

        let yfs_received = self.pay_yfs(yfs, staker, generated)?;
        info!(%staker, gross = amount, net = receipt.net, staked, yfs_received, "stake");
        Ok(receipt.net)
    }

    /// Return `amount` staked YTX to `staker` and pay all pending YFS.
    ///
    /// # Errors
    /// `ZeroAmount`; `InsufficientStake` if `amount` exceeds the position.
    pub fn unstake_and_claim(
        &mut self,
        ytx: &mut FeeLedger,
        yfs: &mut FeeLedger,
        staker: Address,
        amount: Amount,
        block: u64,
    ) -> YtxResult<UnstakeOutcome> {
        if amount == 0 {
            return Err(YtxError::ZeroAmount("unstake"));
        }
        let staked = self.staked_amount(&staker);
        if amount > staked {
            return Err(YtxError::InsufficientStake {
                account: staker,
                requested: amount,
                staked,
            });
        }
        let generated = self.pending_yfs(&staker, block)?;

        let remaining = staked - amount;
        if remaining == 0 {
            self.positions.remove(&staker);
        } else {
            self.positions.insert(
                staker,
                StakePosition {
                    staked: remaining,
                    last_accrual_block: block,
                },
            );
        }
        let total = self
            .total_staked
            .value()
            .checked_sub(amount)
            .ok_or(YtxError::ArithmeticOverflow("total staked"))?;
        self.total_staked.set(total);

        let receipt = ytx.transfer(self.address, staker, amount)?;
        let yfs_received = self.pay_yfs(yfs, staker, generated)?;
        info!(%staker, amount, remaining, yfs_received, "unstake");
        Ok(UnstakeOutcome {
            ytx_returned: receipt.net,
            yfs_received,
        })
    }

    /// Realize pending YFS for `staker` without touching the stake.
    ///
    /// With zero elapsed blocks nothing is paid but the accrual marker still
    /// moves to `block`. Returns the YFS credited to the staker.
    pub fn receive_yfs(
        &mut self,
        yfs: &mut FeeLedger,
        staker: Address,
        block: u64,
    ) -> YtxResult<Amount> {
        let Some(mut position) = self.position(&staker) else {
            return Ok(0);
        };
        let generated = self.pending_yfs(&staker, block)?;
        position.last_accrual_block = block;
        self.positions.insert(staker, position);

        let received = self.pay_yfs(yfs, staker, generated)?;
        info!(%staker, generated, received, "receive yfs");
        Ok(received)
    }

    /// Mint `generated` YFS to the engine and forward it to `staker`.
    fn pay_yfs(&self, yfs: &mut FeeLedger, staker: Address, generated: Amount) -> YtxResult<Amount> {
        if generated == 0 {
            return Ok(0);
        }
        yfs.mint(self.address, generated)?;
        let receipt = yfs.transfer(self.address, staker, generated)?;
        Ok(receipt.net)
    }
}

impl Transactional for StakingEngine {
    fn begin(&mut self) {
        self.positions.begin();
        self.total_staked.begin();
    }

    fn commit(&mut self) {
        self.positions.commit();
        self.total_staked.commit();
    }

    fn rollback(&mut self) {
        self.positions.rollback();
        self.total_staked.rollback();
    }
}
