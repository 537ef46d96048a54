// crates/ytx-economics/src/accumulator.rs
//
// Pro-rata income distribution with a running reward-per-share accumulator.
//
// Every unit of income raises `acc_per_share` by `income * SCALE / total_shares`.
// A position owes `shares * (acc_per_share - reward_debt) / SCALE`, where
// `reward_debt` is the accumulator value at the position's last settlement.
// Each operation touches only the acting position, so cost is O(1)
// regardless of how many positions exist.
//
// Settlement always runs against the OLD share count before any share change;
// otherwise a new holder would collect income that arrived before it joined.
//
// Floor division leaves dust in the sink. The dust is never paid out and never
// lost; it is an accepted rounding bias.

use serde::{Deserialize, Serialize};
use tracing::debug;

use ytx_core::{Address, JournaledCell, JournaledMap, Transactional, YtxError, YtxResult};

use crate::token::Amount;

/// Fixed-point scale of `acc_per_share` (12 decimals).
pub const ACC_SCALE: u128 = 1_000_000_000_000;

/// One participant's stake in the accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePosition {
    /// Shares held.
    pub shares: Amount,
    /// `acc_per_share` at the last settlement.
    pub reward_debt: u128,
    /// Reward settled into the position but not yet claimed.
    pub settled: Amount,
}

#[derive(Debug, Clone, Default)]
pub struct RewardAccumulator {
    acc_per_share: JournaledCell<u128>,
    total_shares: JournaledCell<Amount>,
    /// Income that arrived while nobody held shares.
    undistributed: JournaledCell<Amount>,
    positions: JournaledMap<Address, SharePosition>,
}

impl RewardAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cumulative income per share, scaled by `ACC_SCALE`. Never decreases.
    pub fn acc_per_share(&self) -> u128 {
        self.acc_per_share.value()
    }

    pub fn total_shares(&self) -> Amount {
        self.total_shares.value()
    }

    /// Income held back because it arrived while `total_shares` was zero.
    pub fn undistributed(&self) -> Amount {
        self.undistributed.value()
    }

    pub fn position(&self, account: &Address) -> Option<SharePosition> {
        self.positions.get(account).copied()
    }

    pub fn positions(&self) -> Vec<(Address, SharePosition)> {
        let mut rows: Vec<(Address, SharePosition)> =
            self.positions.iter().map(|(a, p)| (*a, *p)).collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    /// Record new income.
    ///
    /// With no shares outstanding the income is held in `undistributed` and
    /// released to the next depositor: it is folded into the accumulator
    /// right after that deposit snapshots its debt.
    pub fn notify_income(&mut self, amount: Amount) -> YtxResult<()> {
        if amount == 0 {
            return Ok(());
        }
        if self.total_shares.value() == 0 {
            let held = self
                .undistributed
                .value()
                .checked_add(amount)
                .ok_or(YtxError::ArithmeticOverflow("undistributed income"))?;
            self.undistributed.set(held);
            debug!(amount, held, "income held, no shares outstanding");
            return Ok(());
        }
        self.distribute(amount)
    }

    /// Reward accrued since the last settlement, read-only.
    pub fn pending(&self, account: &Address) -> YtxResult<Amount> {
        match self.positions.get(account) {
            Some(position) => self.accrued(position),
            None => Ok(0),
        }
    }

    /// Everything the position could claim right now: settled plus pending.
    pub fn claimable(&self, account: &Address) -> YtxResult<Amount> {
        match self.positions.get(account) {
            Some(position) => position
                .settled
                .checked_add(self.accrued(position)?)
                .ok_or(YtxError::ArithmeticOverflow("claimable reward")),
            None => Ok(0),
        }
    }

    /// Add `share_delta` shares to `account`.
    pub fn deposit(&mut self, account: Address, share_delta: Amount) -> YtxResult<()> {
        let was_empty = self.total_shares.value() == 0;

        let mut position = self.settle(account)?;
        position.shares = position
            .shares
            .checked_add(share_delta)
            .ok_or(YtxError::ArithmeticOverflow("position shares"))?;
        let total = self
            .total_shares
            .value()
            .checked_add(share_delta)
            .ok_or(YtxError::ArithmeticOverflow("total shares"))?;
        self.total_shares.set(total);
        self.store(account, position);

        if was_empty && total > 0 {
            let held = self.undistributed.value();
            if held > 0 {
                self.undistributed.set(0);
                self.distribute(held)?;
            }
        }
        Ok(())
    }

    /// Remove `share_delta` shares from `account`.
    ///
    /// # Errors
    /// `InsufficientShares` if the position holds fewer than `share_delta`.
    pub fn withdraw(&mut self, account: Address, share_delta: Amount) -> YtxResult<()> {
        let held = self.positions.get(&account).map_or(0, |p| p.shares);
        if share_delta > held {
            return Err(YtxError::InsufficientShares {
                account,
                requested: share_delta,
                held,
            });
        }

        let mut position = self.settle(account)?;
        position.shares -= share_delta;
        let total = self
            .total_shares
            .value()
            .checked_sub(share_delta)
            .ok_or(YtxError::ArithmeticOverflow("total shares"))?;
        self.total_shares.set(total);
        self.store(account, position);
        Ok(())
    }

    /// Settle and hand out everything owed to `account`. The caller pays the
    /// returned amount out of the sink.
    pub fn claim(&mut self, account: Address) -> YtxResult<Amount> {
        if !self.positions.contains_key(&account) {
            return Ok(0);
        }
        let mut position = self.settle(account)?;
        let payout = position.settled;
        position.settled = 0;
        self.store(account, position);
        debug!(%account, payout, "reward claimed");
        Ok(payout)
    }

    fn distribute(&mut self, amount: Amount) -> YtxResult<()> {
        let total = self.total_shares.value();
        let increment = amount
            .checked_mul(ACC_SCALE)
            .ok_or(YtxError::ArithmeticOverflow("income per share"))?
            / total;
        let acc = self
            .acc_per_share
            .value()
            .checked_add(increment)
            .ok_or(YtxError::ArithmeticOverflow("accumulator"))?;
        self.acc_per_share.set(acc);
        debug!(amount, total_shares = total, acc_per_share = acc, "income distributed");
        Ok(())
    }

    fn accrued(&self, position: &SharePosition) -> YtxResult<Amount> {
        let delta = self.acc_per_share.value() - position.reward_debt;
        Ok(position
            .shares
            .checked_mul(delta)
            .ok_or(YtxError::ArithmeticOverflow("pending reward"))?
            / ACC_SCALE)
    }

    /// Move pending reward into `settled` and snapshot the accumulator.
    fn settle(&mut self, account: Address) -> YtxResult<SharePosition> {
        let mut position = self.positions.get(&account).copied().unwrap_or_default();
        let pending = self.accrued(&position)?;
        position.settled = position
            .settled
            .checked_add(pending)
            .ok_or(YtxError::ArithmeticOverflow("settled reward"))?;
        position.reward_debt = self.acc_per_share.value();
        Ok(position)
    }

    fn store(&mut self, account: Address, position: SharePosition) {
        if position.shares == 0 && position.settled == 0 {
            self.positions.remove(&account);
        } else {
            self.positions.insert(account, position);
        }
    }
}

impl Transactional for RewardAccumulator {
    fn begin(&mut self) {
        self.acc_per_share.begin();
        self.total_shares.begin();
        self.undistributed.begin();
        self.positions.begin();
    }

    fn commit(&mut self) {
        self.acc_per_share.commit();
        self.total_shares.commit();
        self.undistributed.commit();
        self.positions.commit();
    }

    fn rollback(&mut self) {
        self.acc_per_share.rollback();
        self.total_shares.rollback();
        self.undistributed.rollback();
        self.positions.rollback();
    }
}
