// crates/ytx-economics/src/ledger.rs
//
// Fungible-balance ledger with an optional fee on transfer.
//
// A transfer between two non-exempt accounts deducts
// `floor(amount * fee_bps / 10_000)` and credits it to the fee sink (minus an
// optional treasury slice); the recipient receives the remainder. Transfers
// that touch an exempt account move the full amount.
//
// Invariant: the sum of all balances, sinks included, equals `total_supply`.
// Only `mint` and `burn` change the supply. Every operation is atomic: a
// failure anywhere leaves balances, allowances, and supply untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use ytx_core::config::{TokenConfig, BPS_DENOMINATOR};
use ytx_core::{
    atomically, Address, JournaledCell, JournaledMap, Role, RoleTable, Transactional, YtxError,
    YtxResult,
};

use crate::token::{Amount, TokenKind};

/// Where transfer fees go and how large they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeePolicy {
    /// Fee in basis points of the transferred amount.
    pub fee_bps: u16,
    /// Account credited with fees. No fee is charged when unset.
    pub sink: Option<Address>,
    /// Optional treasury account and its share of each fee, in bps of the fee.
    pub treasury: Option<(Address, u16)>,
}

impl FeePolicy {
    /// A plain token: transfers move the full amount.
    pub fn none() -> Self {
        Self {
            fee_bps: 0,
            sink: None,
            treasury: None,
        }
    }

    /// Build a policy from token configuration, using `default_sink` when the
    /// configuration does not name one.
    pub fn from_config(config: &TokenConfig, default_sink: Address) -> Self {
        Self {
            fee_bps: config.fee_bps,
            sink: Some(config.fee_sink.unwrap_or(default_sink)),
            treasury: config
                .treasury
                .filter(|_| config.treasury_share_bps > 0)
                .map(|treasury| (treasury, config.treasury_share_bps)),
        }
    }
}

/// What a completed transfer actually moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Amount debited from the sender.
    pub gross: Amount,
    /// Amount credited to the recipient.
    pub net: Amount,
    /// Total fee charged (`gross - net`).
    pub fee: Amount,
    /// Portion of `fee` credited to the treasury rather than the sink.
    pub treasury_fee: Amount,
}

impl TransferReceipt {
    /// Portion of the fee credited to the fee sink.
    pub fn sink_fee(&self) -> Amount {
        self.fee - self.treasury_fee
    }
}

/// Balance table for one fungible token.
#[derive(Debug, Clone)]
pub struct FeeLedger {
    kind: TokenKind,
    policy: FeePolicy,
    roles: RoleTable,
    balances: JournaledMap<Address, Amount>,
    allowances: JournaledMap<(Address, Address), Amount>,
    total_supply: JournaledCell<Amount>,
    /// Sinks whose fee income is counted for an income hook.
    income_collectors: BTreeSet<Address>,
    /// Fees credited to each counted sink and not yet collected.
    fee_income: JournaledMap<Address, Amount>,
}

impl FeeLedger {
    /// Create an empty ledger with the given fee policy.
    pub fn new(kind: TokenKind, policy: FeePolicy) -> Self {
        Self {
            kind,
            policy,
            roles: RoleTable::new(),
            balances: JournaledMap::new(),
            allowances: JournaledMap::new(),
            total_supply: JournaledCell::new(0),
            income_collectors: BTreeSet::new(),
            fee_income: JournaledMap::new(),
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn symbol(&self) -> &'static str {
        self.kind.symbol()
    }

    pub fn policy(&self) -> &FeePolicy {
        &self.policy
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply.value()
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    /// Add or remove `account` from the fee exemption list.
    pub fn set_exempt(&mut self, account: Address, exempt: bool) {
        if exempt {
            self.roles.grant(account, Role::FeeExempt);
        } else {
            self.roles.revoke(&account, Role::FeeExempt);
        }
    }

    pub fn is_exempt(&self, account: &Address) -> bool {
        self.roles.has(account, Role::FeeExempt)
    }

    /// All fee-exempt accounts, sorted.
    pub fn exempt_accounts(&self) -> Vec<Address> {
        self.roles.holders(Role::FeeExempt)
    }

    /// All non-zero balances, sorted by account.
    pub fn balances(&self) -> Vec<(Address, Amount)> {
        let mut rows: Vec<(Address, Amount)> =
            self.balances.iter().map(|(a, b)| (*a, *b)).collect();
        rows.sort();
        rows
    }

    /// Fee that a transfer of `amount` from `from` to `to` would be charged.
    pub fn fee_for(&self, from: &Address, to: &Address, amount: Amount) -> YtxResult<Amount> {
        if self.policy.sink.is_none()
            || self.policy.fee_bps == 0
            || self.is_exempt(from)
            || self.is_exempt(to)
        {
            return Ok(0);
        }
        Ok(amount
            .checked_mul(Amount::from(self.policy.fee_bps))
            .ok_or(YtxError::ArithmeticOverflow("transfer fee"))?
            / Amount::from(BPS_DENOMINATOR))
    }

    /// Create `amount` new tokens in `to`.
    pub fn mint(&mut self, to: Address, amount: Amount) -> YtxResult<()> {
        atomically(self, |ledger| {
            let supply = ledger
                .total_supply
                .value()
                .checked_add(amount)
                .ok_or(YtxError::ArithmeticOverflow("total supply"))?;
            ledger.total_supply.set(supply);
            ledger.credit(to, amount)?;
            debug!(token = ledger.symbol(), %to, amount, supply, "mint");
            Ok(())
        })
    }

    /// Destroy `amount` tokens held by `from`.
    pub fn burn(&mut self, from: Address, amount: Amount) -> YtxResult<()> {
        atomically(self, |ledger| {
            ledger.debit(from, amount)?;
            let supply = ledger
                .total_supply
                .value()
                .checked_sub(amount)
                .ok_or(YtxError::ArithmeticOverflow("total supply"))?;
            ledger.total_supply.set(supply);
            debug!(token = ledger.symbol(), %from, amount, supply, "burn");
            Ok(())
        })
    }

    /// Move `amount` from `from` to `to`, charging the transfer fee.
    ///
    /// # Errors
    /// `InsufficientBalance` if `from` holds less than `amount`;
    /// `ArithmeticOverflow` if any credit overflows.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> YtxResult<TransferReceipt> {
        atomically(self, |ledger| ledger.move_funds(from, to, amount))
    }

    /// Set the amount `spender` may move out of `owner`'s balance.
    pub fn approve(&mut self, owner: Address, spender: Address, amount: Amount) {
        if amount == 0 {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
        debug!(token = self.symbol(), %owner, %spender, amount, "approve");
    }

    /// Move `amount` from `from` to `to` on behalf of `spender`, consuming
    /// allowance.
    ///
    /// # Errors
    /// `InsufficientAllowance` if `spender` is not approved for `amount`,
    /// plus everything `transfer` can return.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> YtxResult<TransferReceipt> {
        atomically(self, |ledger| {
            let allowed = ledger.allowance(&from, &spender);
            if allowed < amount {
                return Err(YtxError::InsufficientAllowance {
                    token: ledger.symbol().to_string(),
                    owner: from,
                    spender,
                    needed: amount,
                    available: allowed,
                });
            }
            ledger.approve(from, spender, allowed - amount);
            ledger.move_funds(from, to, amount)
        })
    }

    /// Start counting fees credited to `sink` so an income hook can collect
    /// them with `take_fee_income`. Fees paid to sinks nobody collects from
    /// are credited to the balance only.
    pub fn track_fee_income(&mut self, sink: Address) {
        self.income_collectors.insert(sink);
    }

    /// Fees credited to `sink` since the last call, resetting the counter.
    pub fn take_fee_income(&mut self, sink: &Address) -> Amount {
        self.fee_income.remove(sink).unwrap_or(0)
    }

    /// Fees credited to `sink` and not yet collected.
    pub fn uncollected_fee_income(&self, sink: &Address) -> Amount {
        self.fee_income.get(sink).copied().unwrap_or(0)
    }

    fn move_funds(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> YtxResult<TransferReceipt> {
        let fee = self.fee_for(&from, &to, amount)?;
        let treasury_fee = match self.policy.treasury {
            Some((_, share_bps)) if fee > 0 => {
                fee.checked_mul(Amount::from(share_bps))
                    .ok_or(YtxError::ArithmeticOverflow("treasury fee"))?
                    / Amount::from(BPS_DENOMINATOR)
            }
            _ => 0,
        };
        let receipt = TransferReceipt {
            gross: amount,
            net: amount - fee,
            fee,
            treasury_fee,
        };

        self.debit(from, amount)?;
        self.credit(to, receipt.net)?;
        if let Some(sink) = self.policy.sink {
            let sink_fee = receipt.sink_fee();
            if sink_fee > 0 {
                self.credit(sink, sink_fee)?;
            }
            if sink_fee > 0 && self.income_collectors.contains(&sink) {
                let pending = self
                    .uncollected_fee_income(&sink)
                    .checked_add(sink_fee)
                    .ok_or(YtxError::ArithmeticOverflow("fee income"))?;
                self.fee_income.insert(sink, pending);
            }
        }
        if let Some((treasury, _)) = self.policy.treasury {
            if treasury_fee > 0 {
                self.credit(treasury, treasury_fee)?;
            }
        }

        debug!(
            token = self.symbol(),
            %from,
            %to,
            gross = receipt.gross,
            net = receipt.net,
            fee = receipt.fee,
            "transfer"
        );
        Ok(receipt)
    }

    fn debit(&mut self, account: Address, amount: Amount) -> YtxResult<()> {
        let available = self.balance_of(&account);
        if available < amount {
            return Err(YtxError::InsufficientBalance {
                token: self.symbol().to_string(),
                account,
                needed: amount,
                available,
            });
        }
        self.set_balance(account, available - amount);
        Ok(())
    }

    fn credit(&mut self, account: Address, amount: Amount) -> YtxResult<()> {
        let balance = self
            .balance_of(&account)
            .checked_add(amount)
            .ok_or(YtxError::ArithmeticOverflow("balance credit"))?;
        self.set_balance(account, balance);
        Ok(())
    }

    fn set_balance(&mut self, account: Address, balance: Amount) {
        if balance == 0 {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, balance);
        }
    }
}

impl Transactional for FeeLedger {
    fn begin(&mut self) {
        self.balances.begin();
        self.allowances.begin();
        self.total_supply.begin();
        self.fee_income.begin();
    }

    fn commit(&mut self) {
        self.balances.commit();
        self.allowances.commit();
        self.total_supply.commit();
        self.fee_income.commit();
    }

    fn rollback(&mut self) {
        self.balances.rollback();
        self.allowances.rollback();
        self.total_supply.rollback();
        self.fee_income.rollback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::UNITS_PER_TOKEN;
    use proptest::prelude::*;

    fn sink() -> Address {
        Address::derive("sink")
    }

    fn alice() -> Address {
        Address::derive("alice")
    }

    fn bob() -> Address {
        Address::derive("bob")
    }

    fn one_percent_ledger() -> FeeLedger {
        let mut ledger = FeeLedger::new(
            TokenKind::Ytx,
            FeePolicy {
                fee_bps: 100,
                sink: Some(sink()),
                treasury: None,
            },
        );
        ledger.track_fee_income(sink());
        ledger
    }

    fn sum_of_balances(ledger: &FeeLedger) -> Amount {
        ledger.balances().iter().map(|(_, b)| b).sum()
    }

    #[test]
    fn test_transfer_charges_one_percent() {
        let mut ledger = one_percent_ledger();
        ledger.mint(alice(), 10 * UNITS_PER_TOKEN).unwrap();
        let receipt = ledger.transfer(alice(), bob(), 10 * UNITS_PER_TOKEN).unwrap();

        assert_eq!(receipt.fee, UNITS_PER_TOKEN / 10);
        assert_eq!(ledger.balance_of(&bob()), 9_900_000_000_000_000_000);
        assert_eq!(ledger.balance_of(&sink()), 100_000_000_000_000_000);
        assert_eq!(ledger.balance_of(&alice()), 0);
        assert_eq!(ledger.uncollected_fee_income(&sink()), receipt.fee);
    }

    #[test]
    fn test_untracked_sink_accrues_balance_but_no_income() {
        let admin = Address::derive("admin");
        let mut ledger = FeeLedger::new(
            TokenKind::Yfs,
            FeePolicy {
                fee_bps: 100,
                sink: Some(admin),
                treasury: None,
            },
        );
        ledger.mint(alice(), 10_000).unwrap();
        ledger.transfer(alice(), bob(), 10_000).unwrap();
        assert_eq!(ledger.balance_of(&admin), 100);
        assert_eq!(ledger.uncollected_fee_income(&admin), 0);
        assert_eq!(ledger.take_fee_income(&admin), 0);
    }

    #[test]
    fn test_fee_rounds_down() {
        let mut ledger = one_percent_ledger();
        ledger.mint(alice(), 199).unwrap();
        let receipt = ledger.transfer(alice(), bob(), 199).unwrap();
        assert_eq!(receipt.fee, 1);
        assert_eq!(receipt.net, 198);
    }

    #[test]
    fn test_exempt_sender_pays_no_fee() {
        let mut ledger = one_percent_ledger();
        ledger.set_exempt(alice(), true);
        ledger.mint(alice(), 1_000).unwrap();
        let receipt = ledger.transfer(alice(), bob(), 1_000).unwrap();
        assert_eq!(receipt.fee, 0);
        assert_eq!(ledger.balance_of(&bob()), 1_000);

        ledger.set_exempt(alice(), false);
        assert!(!ledger.is_exempt(&alice()));
    }

    #[test]
    fn test_exempt_recipient_pays_no_fee() {
        let mut ledger = one_percent_ledger();
        ledger.set_exempt(bob(), true);
        ledger.mint(alice(), 1_000).unwrap();
        ledger.transfer(alice(), bob(), 1_000).unwrap();
        assert_eq!(ledger.balance_of(&bob()), 1_000);
        assert_eq!(ledger.exempt_accounts(), vec![bob()]);
    }

    #[test]
    fn test_treasury_split() {
        let treasury = Address::derive("treasury");
        let mut ledger = FeeLedger::new(
            TokenKind::Ytx,
            FeePolicy {
                fee_bps: 100,
                sink: Some(sink()),
                treasury: Some((treasury, 1_000)),
            },
        );
        ledger.track_fee_income(sink());
        ledger.mint(alice(), 10 * UNITS_PER_TOKEN).unwrap();
        let receipt = ledger.transfer(alice(), bob(), 10 * UNITS_PER_TOKEN).unwrap();

        assert_eq!(receipt.treasury_fee, 10_000_000_000_000_000);
        assert_eq!(ledger.balance_of(&treasury), 10_000_000_000_000_000);
        assert_eq!(ledger.balance_of(&sink()), 90_000_000_000_000_000);
        assert_eq!(ledger.take_fee_income(&sink()), 90_000_000_000_000_000);
        assert_eq!(ledger.take_fee_income(&sink()), 0);
    }

    #[test]
    fn test_insufficient_balance_leaves_state_untouched() {
        let mut ledger = one_percent_ledger();
        ledger.mint(alice(), 50).unwrap();
        let err = ledger.transfer(alice(), bob(), 51).unwrap_err();
        assert!(matches!(
            err,
            YtxError::InsufficientBalance {
                needed: 51,
                available: 50,
                ..
            }
        ));
        assert_eq!(ledger.balance_of(&alice()), 50);
        assert_eq!(ledger.balance_of(&bob()), 0);
    }

    #[test]
    fn test_burn() {
        let mut ledger = one_percent_ledger();
        ledger.mint(alice(), 100).unwrap();
        ledger.burn(alice(), 40).unwrap();
        assert_eq!(ledger.total_supply(), 60);
        assert!(ledger.burn(alice(), 61).is_err());
        assert_eq!(ledger.total_supply(), 60);
    }

    #[test]
    fn test_mint_overflow() {
        let mut ledger = one_percent_ledger();
        ledger.mint(alice(), u128::MAX).unwrap();
        let err = ledger.mint(bob(), 1).unwrap_err();
        assert_eq!(err, YtxError::ArithmeticOverflow("total supply"));
        assert_eq!(ledger.balance_of(&bob()), 0);
    }

    #[test]
    fn test_fee_computation_overflow_aborts() {
        let mut ledger = one_percent_ledger();
        ledger.mint(alice(), u128::MAX).unwrap();
        let err = ledger.transfer(alice(), bob(), u128::MAX).unwrap_err();
        assert_eq!(err, YtxError::ArithmeticOverflow("transfer fee"));
        assert_eq!(ledger.balance_of(&alice()), u128::MAX);
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let mut ledger = one_percent_ledger();
        let spender = Address::derive("engine");
        ledger.mint(alice(), 1_000).unwrap();
        ledger.approve(alice(), spender, 600);

        ledger.transfer_from(spender, alice(), bob(), 400).unwrap();
        assert_eq!(ledger.allowance(&alice(), &spender), 200);

        let err = ledger.transfer_from(spender, alice(), bob(), 300).unwrap_err();
        assert!(matches!(
            err,
            YtxError::InsufficientAllowance {
                needed: 300,
                available: 200,
                ..
            }
        ));
        assert_eq!(ledger.allowance(&alice(), &spender), 200);
    }

    #[test]
    fn test_transfer_from_failure_restores_allowance() {
        let mut ledger = one_percent_ledger();
        let spender = Address::derive("engine");
        ledger.mint(alice(), 10).unwrap();
        ledger.approve(alice(), spender, 100);
        assert!(ledger.transfer_from(spender, alice(), bob(), 50).is_err());
        assert_eq!(ledger.allowance(&alice(), &spender), 100);
    }

    #[test]
    fn test_plain_token_has_no_fee() {
        let mut ledger = FeeLedger::new(TokenKind::Lp, FeePolicy::none());
        ledger.mint(alice(), 500).unwrap();
        let receipt = ledger.transfer(alice(), bob(), 500).unwrap();
        assert_eq!(receipt.net, 500);
    }

    proptest! {
        #[test]
        fn transfers_conserve_supply(
            ops in proptest::collection::vec((0usize..4, 0usize..4, 0u128..2_000_000), 1..64)
        ) {
            let accounts = [alice(), bob(), Address::derive("carol"), sink()];
            let mut ledger = one_percent_ledger();
            for account in &accounts {
                ledger.mint(*account, 1_000_000).unwrap();
            }
            let supply = ledger.total_supply();
            for (from, to, amount) in ops {
                let before_from = ledger.balance_of(&accounts[from]);
                let result = ledger.transfer(accounts[from], accounts[to], amount);
                if amount > before_from {
                    prop_assert!(result.is_err());
                }
                prop_assert_eq!(sum_of_balances(&ledger), supply);
                prop_assert_eq!(ledger.total_supply(), supply);
            }
        }

        #[test]
        fn recipient_gets_amount_minus_floor_fee(amount in 0u128..10u128.pow(30)) {
            let mut ledger = one_percent_ledger();
            ledger.mint(alice(), amount).unwrap();
            let receipt = ledger.transfer(alice(), bob(), amount).unwrap();
            prop_assert_eq!(receipt.net, amount - amount * 100 / 10_000);
            prop_assert_eq!(ledger.balance_of(&bob()), receipt.net);
            prop_assert_eq!(ledger.balance_of(&sink()), receipt.fee);
        }
    }
}
