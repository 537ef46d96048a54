// crates/ytx-economics/src/liquidity.rs
//
// Liquidity lock: LP tokens locked here earn a pro-rata share of YTX
// transfer fees.
//
// The pool's own account is the YTX fee sink. Fees credited to it are picked
// up by `collect_income` and fed to the `RewardAccumulator`, which the lock
// owns exclusively. Income is collected before every share change so that
// fees always go to the shares outstanding when they arrived.
//
// Liquidity can only be extracted once `lock_block + lock_duration` has been
// reached, where `lock_block` is stamped on the position's first deposit.
// Top-ups do not move it.

use serde::{Deserialize, Serialize};
use tracing::info;

use ytx_core::{Address, JournaledCell, JournaledMap, Transactional, YtxError, YtxResult};

use crate::accumulator::RewardAccumulator;
use crate::ledger::FeeLedger;
use crate::token::Amount;

/// A liquidity provider's locked position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityPosition {
    /// LP tokens held by the pool for this provider.
    pub locked: Amount,
    /// Block of the first deposit; the unlock clock starts here.
    pub lock_block: u64,
}

/// Result of `extract_liquidity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedLiquidity {
    /// LP tokens returned to the provider.
    pub lp_returned: Amount,
    /// YTX earnings credited to the provider after the transfer fee.
    pub earnings: Amount,
}

#[derive(Debug, Clone)]
pub struct LiquidityLock {
    address: Address,
    lock_duration: JournaledCell<u64>,
    positions: JournaledMap<Address, LiquidityPosition>,
    accumulator: RewardAccumulator,
}

impl LiquidityLock {
    /// Create a lock holding LP tokens and fee income in `address`.
    pub fn new(address: Address, lock_duration: u64) -> Self {
        Self {
            address,
            lock_duration: JournaledCell::new(lock_duration),
            positions: JournaledMap::new(),
            accumulator: RewardAccumulator::new(),
        }
    }

    /// The pool's account on the LP and YTX ledgers.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn lock_duration(&self) -> u64 {
        self.lock_duration.value()
    }

    /// Override the lock duration. Applies to existing positions as well.
    pub fn set_lock_duration(&mut self, blocks: u64) {
        self.lock_duration.set(blocks);
        info!(blocks, "lock duration updated");
    }

    pub fn accumulator(&self) -> &RewardAccumulator {
        &self.accumulator
    }

    pub fn position(&self, provider: &Address) -> Option<LiquidityPosition> {
        self.positions.get(provider).copied()
    }

    pub fn positions(&self) -> Vec<(Address, LiquidityPosition)> {
        let mut rows: Vec<(Address, LiquidityPosition)> =
            self.positions.iter().map(|(a, p)| (*a, *p)).collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    pub fn total_locked(&self) -> Amount {
        self.accumulator.total_shares()
    }

    /// First block at which the provider may extract liquidity.
    pub fn unlock_block(&self, provider: &Address) -> Option<u64> {
        self.positions
            .get(provider)
            .map(|p| p.lock_block.saturating_add(self.lock_duration.value()))
    }

    /// YTX earnings the provider could extract, before the transfer fee.
    pub fn claimable(&self, provider: &Address) -> YtxResult<Amount> {
        self.accumulator.claimable(provider)
    }

    /// Forward fees credited to the pool since the last collection to the
    /// accumulator. Returns the amount collected.
    pub fn collect_income(&mut self, ytx: &mut FeeLedger) -> YtxResult<Amount> {
        let income = ytx.take_fee_income(&self.address);
        self.accumulator.notify_income(income)?;
        Ok(income)
    }

    /// Lock `amount` LP tokens from `provider`. The pool must have been
    /// approved on the LP ledger.
    pub fn lock(
        &mut self,
        lp: &mut FeeLedger,
        ytx: &mut FeeLedger,
        provider: Address,
        amount: Amount,
        block: u64,
    ) -> YtxResult<()> {
        if amount == 0 {
            return Err(YtxError::ZeroAmount("lock liquidity"));
        }
        self.collect_income(ytx)?;
        let receipt = lp.transfer_from(self.address, provider, self.address, amount)?;
        self.accumulator.deposit(provider, receipt.net)?;

        let position = match self.positions.get(&provider) {
            Some(existing) => LiquidityPosition {
                locked: existing
                    .locked
                    .checked_add(receipt.net)
                    .ok_or(YtxError::ArithmeticOverflow("locked liquidity"))?,
                lock_block: existing.lock_block,
            },
            None => LiquidityPosition {
                locked: receipt.net,
                lock_block: block,
            },
        };
        self.positions.insert(provider, position);
        info!(%provider, amount = receipt.net, locked = position.locked, lock_block = position.lock_block, "lock liquidity");
        Ok(())
    }

    /// Pay the provider's accumulated YTX earnings. Returns the YTX credited
    /// after the transfer fee.
    pub fn extract_earnings(&mut self, ytx: &mut FeeLedger, provider: Address) -> YtxResult<Amount> {
        self.collect_income(ytx)?;
        let payout = self.accumulator.claim(provider)?;
        let received = self.pay_earnings(ytx, provider, payout)?;
        info!(%provider, payout, received, "extract earnings");
        Ok(received)
    }

    /// Return `amount` LP tokens (the whole position when `None`) to the
    /// provider, paying out all earnings first.
    ///
    /// # Errors
    /// `LockNotExpired` before the unlock block, checked first;
    /// `InsufficientShares` if the position holds less than `amount`.
    pub fn extract_liquidity(
        &mut self,
        lp: &mut FeeLedger,
        ytx: &mut FeeLedger,
        provider: Address,
        amount: Option<Amount>,
        block: u64,
    ) -> YtxResult<ExtractedLiquidity> {
        let Some(position) = self.position(&provider) else {
            return Err(YtxError::InsufficientShares {
                account: provider,
                requested: amount.unwrap_or(0),
                held: 0,
            });
        };
        let unlock_block = position.lock_block.saturating_add(self.lock_duration.value());
        if block < unlock_block {
            return Err(YtxError::LockNotExpired {
                unlock_block,
                current_block: block,
            });
        }
        let amount = amount.unwrap_or(position.locked);
        if amount == 0 {
            return Err(YtxError::ZeroAmount("extract liquidity"));
        }
        if amount > position.locked {
            return Err(YtxError::InsufficientShares {
                account: provider,
                requested: amount,
                held: position.locked,
            });
        }

        self.collect_income(ytx)?;
        let payout = self.accumulator.claim(provider)?;
        self.accumulator.withdraw(provider, amount)?;
        let remaining = position.locked - amount;
        if remaining == 0 {
            self.positions.remove(&provider);
        } else {
            self.positions.insert(
                provider,
                LiquidityPosition {
                    locked: remaining,
                    lock_block: position.lock_block,
                },
            );
        }

        let earnings = self.pay_earnings(ytx, provider, payout)?;
        let receipt = lp.transfer(self.address, provider, amount)?;
        info!(%provider, amount, remaining, earnings, "extract liquidity");
        Ok(ExtractedLiquidity {
            lp_returned: receipt.net,
            earnings,
        })
    }

    fn pay_earnings(
        &mut self,
        ytx: &mut FeeLedger,
        provider: Address,
        payout: Amount,
    ) -> YtxResult<Amount> {
        if payout == 0 {
            return Ok(0);
        }
        let receipt = ytx.transfer(self.address, provider, payout)?;
        // The payout's own fee lands back in the pool as fresh income.
        self.collect_income(ytx)?;
        Ok(receipt.net)
    }
}

impl Transactional for LiquidityLock {
    fn begin(&mut self) {
        self.lock_duration.begin();
        self.positions.begin();
        self.accumulator.begin();
    }

    fn commit(&mut self) {
        self.lock_duration.commit();
        self.positions.commit();
        self.accumulator.commit();
    }

    fn rollback(&mut self) {
        self.lock_duration.rollback();
        self.positions.rollback();
        self.accumulator.rollback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FeePolicy;
    use crate::token::{TokenKind, UNITS_PER_TOKEN};

    const TEN: Amount = 10 * UNITS_PER_TOKEN;
    const DURATION: u64 = 1_000;

    struct Fixture {
        pool: LiquidityLock,
        lp: FeeLedger,
        ytx: FeeLedger,
        provider: Address,
        trader: Address,
    }

    fn fixture() -> Fixture {
        let pool = LiquidityLock::new(Address::derive("pool"), DURATION);
        let provider = Address::derive("provider");
        let trader = Address::derive("trader");
        let mut lp = FeeLedger::new(TokenKind::Lp, FeePolicy::none());
        lp.mint(provider, 100 * UNITS_PER_TOKEN).unwrap();
        lp.approve(provider, pool.address(), u128::MAX);
        let mut ytx = FeeLedger::new(
            TokenKind::Ytx,
            FeePolicy {
                fee_bps: 100,
                sink: Some(pool.address()),
                treasury: None,
            },
        );
        ytx.track_fee_income(pool.address());
        ytx.mint(trader, 1_000 * UNITS_PER_TOKEN).unwrap();
        Fixture {
            pool,
            lp,
            ytx,
            provider,
            trader,
        }
    }

    fn route_fee(f: &mut Fixture, amount: Amount) {
        f.ytx
            .transfer(f.trader, Address::derive("somebody"), amount)
            .unwrap();
    }

    #[test]
    fn test_lock_transfers_lp_and_stamps_block() {
        let mut f = fixture();
        f.pool
            .lock(&mut f.lp, &mut f.ytx, f.provider, TEN, 42)
            .unwrap();
        assert_eq!(f.lp.balance_of(&f.pool.address()), TEN);
        assert_eq!(f.lp.balance_of(&f.provider), 90 * UNITS_PER_TOKEN);
        assert_eq!(
            f.pool.position(&f.provider),
            Some(LiquidityPosition {
                locked: TEN,
                lock_block: 42
            })
        );
        assert_eq!(f.pool.unlock_block(&f.provider), Some(42 + DURATION));
    }

    #[test]
    fn test_top_up_keeps_lock_block() {
        let mut f = fixture();
        f.pool.lock(&mut f.lp, &mut f.ytx, f.provider, TEN, 1).unwrap();
        f.pool.lock(&mut f.lp, &mut f.ytx, f.provider, TEN, 500).unwrap();
        let position = f.pool.position(&f.provider).unwrap();
        assert_eq!(position.locked, 2 * TEN);
        assert_eq!(position.lock_block, 1);
    }

    #[test]
    fn test_single_provider_earns_whole_fee() {
        let mut f = fixture();
        f.pool.lock(&mut f.lp, &mut f.ytx, f.provider, TEN, 1).unwrap();
        route_fee(&mut f, TEN);
        assert_eq!(f.pool.collect_income(&mut f.ytx).unwrap(), TEN / 100);
        assert_eq!(f.pool.claimable(&f.provider).unwrap(), TEN / 100);

        let received = f.pool.extract_earnings(&mut f.ytx, f.provider).unwrap();
        assert_eq!(received, 99_000_000_000_000_000);
        assert_eq!(f.ytx.balance_of(&f.provider), received);
    }

    #[test]
    fn test_fee_before_first_lock_goes_to_first_provider() {
        let mut f = fixture();
        route_fee(&mut f, TEN);
        f.pool.collect_income(&mut f.ytx).unwrap();
        assert_eq!(f.pool.accumulator().acc_per_share(), 0);

        f.pool.lock(&mut f.lp, &mut f.ytx, f.provider, TEN, 1).unwrap();
        assert_eq!(f.pool.claimable(&f.provider).unwrap(), TEN / 100);
    }

    #[test]
    fn test_extract_before_unlock_fails() {
        let mut f = fixture();
        f.pool.lock(&mut f.lp, &mut f.ytx, f.provider, TEN, 10).unwrap();
        let err = f
            .pool
            .extract_liquidity(&mut f.lp, &mut f.ytx, f.provider, None, 10 + DURATION - 1)
            .unwrap_err();
        assert_eq!(
            err,
            YtxError::LockNotExpired {
                unlock_block: 10 + DURATION,
                current_block: 10 + DURATION - 1
            }
        );
    }

    #[test]
    fn test_extract_exactly_at_unlock_block() {
        let mut f = fixture();
        f.pool.lock(&mut f.lp, &mut f.ytx, f.provider, TEN, 10).unwrap();
        route_fee(&mut f, TEN);
        let out = f
            .pool
            .extract_liquidity(&mut f.lp, &mut f.ytx, f.provider, None, 10 + DURATION)
            .unwrap();
        assert_eq!(out.lp_returned, TEN);
        assert_eq!(out.earnings, 99_000_000_000_000_000);
        assert_eq!(f.lp.balance_of(&f.provider), 100 * UNITS_PER_TOKEN);
        assert!(f.pool.position(&f.provider).is_none());
        assert_eq!(f.pool.total_locked(), 0);
    }

    #[test]
    fn test_partial_extract() {
        let mut f = fixture();
        f.pool.set_lock_duration(0);
        f.pool.lock(&mut f.lp, &mut f.ytx, f.provider, TEN, 3).unwrap();
        f.pool
            .extract_liquidity(&mut f.lp, &mut f.ytx, f.provider, Some(TEN / 2), 3)
            .unwrap();
        let position = f.pool.position(&f.provider).unwrap();
        assert_eq!(position.locked, TEN / 2);
        assert_eq!(position.lock_block, 3);
        assert!(matches!(
            f.pool
                .extract_liquidity(&mut f.lp, &mut f.ytx, f.provider, Some(TEN), 3),
            Err(YtxError::InsufficientShares { .. })
        ));
    }

    #[test]
    fn test_lock_gate_checked_before_amount() {
        let mut f = fixture();
        f.pool.lock(&mut f.lp, &mut f.ytx, f.provider, TEN, 10).unwrap();
        assert_eq!(
            f.pool.extract_liquidity(
                &mut f.lp,
                &mut f.ytx,
                f.provider,
                Some(TEN + 1),
                10 + DURATION - 1
            ),
            Err(YtxError::LockNotExpired {
                unlock_block: 10 + DURATION,
                current_block: 10 + DURATION - 1
            })
        );
        assert!(matches!(
            f.pool.extract_liquidity(
                &mut f.lp,
                &mut f.ytx,
                f.provider,
                Some(TEN + 1),
                10 + DURATION
            ),
            Err(YtxError::InsufficientShares { .. })
        ));
    }

    #[test]
    fn test_extract_without_position() {
        let mut f = fixture();
        let err = f
            .pool
            .extract_liquidity(&mut f.lp, &mut f.ytx, f.provider, None, 0)
            .unwrap_err();
        assert!(matches!(err, YtxError::InsufficientShares { held: 0, .. }));
    }

    #[test]
    fn test_lock_zero_rejected() {
        let mut f = fixture();
        assert_eq!(
            f.pool.lock(&mut f.lp, &mut f.ytx, f.provider, 0, 1),
            Err(YtxError::ZeroAmount("lock liquidity"))
        );
    }
}
