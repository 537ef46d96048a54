// crates/ytx-economics/src/protocol.rs
//
// Protocol orchestrator: owns the YTX, YFS, and LP ledgers together with the
// staking engine, liquidity lock, and crafting registry, and exposes the
// external operations.
//
// Every operation runs inside one savepoint spanning all components, so a
// failure in any leg of a multi-component call (the YFS leg of a mint, the
// LP return of an extraction) undoes the legs that already succeeded. Fee
// income routed to the liquidity pool during a call is forwarded to the pool's
// accumulator before the call commits.

use serde::Serialize;
use tracing::{info, warn};

use ytx_core::{
    atomically, Address, CallContext, ConfigError, ProtocolConfig, Role, RoleTable,
    Transactional, YtxResult,
};

use crate::accumulator::SharePosition;
use crate::crafting::{Blueprint, CraftingRegistry, MintedToken};
use crate::emission::EmissionSchedule;
use crate::ledger::{FeeLedger, FeePolicy, TransferReceipt};
use crate::liquidity::{ExtractedLiquidity, LiquidityLock, LiquidityPosition};
use crate::staking::{StakePosition, StakingEngine, UnstakeOutcome};
use crate::token::{Amount, TokenKind};

/// Domain tag of the liquidity pool account.
pub const LIQUIDITY_LOCK_TAG: &str = "ytx.liquidity-lock";
/// Domain tag of the staking engine account.
pub const STAKING_ENGINE_TAG: &str = "ytx.staking-engine";
/// Domain tag of the crafting registry account.
pub const CRAFTING_REGISTRY_TAG: &str = "ytx.crafting-registry";

#[derive(Debug, Clone)]
pub struct Protocol {
    config: ProtocolConfig,
    roles: RoleTable,
    ytx: FeeLedger,
    yfs: FeeLedger,
    lp: FeeLedger,
    staking: StakingEngine,
    lock: LiquidityLock,
    crafting: CraftingRegistry,
}

impl Protocol {
    /// Wire up a fresh deployment.
    ///
    /// The YTX fee sink defaults to the liquidity pool and the YFS fee sink to
    /// the administrator. The LP token never charges a fee.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if `config` fails validation.
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let pool = Address::derive(LIQUIDITY_LOCK_TAG);
        let engine = Address::derive(STAKING_ENGINE_TAG);
        let registry = Address::derive(CRAFTING_REGISTRY_TAG);

        let mut ytx = FeeLedger::new(TokenKind::Ytx, FeePolicy::from_config(&config.ytx, pool));
        ytx.track_fee_income(pool);
        for account in &config.ytx.exempt {
            ytx.set_exempt(*account, true);
        }
        let mut yfs = FeeLedger::new(
            TokenKind::Yfs,
            FeePolicy::from_config(&config.yfs, config.administrator),
        );
        for account in &config.yfs.exempt {
            yfs.set_exempt(*account, true);
        }
        let lp = FeeLedger::new(TokenKind::Lp, FeePolicy::none());

        let mut roles = RoleTable::new();
        roles.grant(config.administrator, Role::Administrator);

        info!(
            administrator = %config.administrator,
            ytx_fee_bps = config.ytx.fee_bps,
            yfs_fee_bps = config.yfs.fee_bps,
            blocks_per_period = config.emission.blocks_per_period,
            lock_duration = config.lock.duration_blocks,
            "protocol initialized"
        );

        Ok(Self {
            roles,
            ytx,
            yfs,
            lp,
            staking: StakingEngine::new(engine, EmissionSchedule::from_config(&config.emission)),
            lock: LiquidityLock::new(pool, config.lock.duration_blocks),
            crafting: CraftingRegistry::new(
                registry,
                config.crafting.base_uri.clone(),
                config.crafting.refund_bps,
            ),
            config,
        })
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn is_administrator(&self, account: &Address) -> bool {
        self.roles.has(account, Role::Administrator)
    }

    pub fn ledger(&self, kind: TokenKind) -> &FeeLedger {
        match kind {
            TokenKind::Ytx => &self.ytx,
            TokenKind::Yfs => &self.yfs,
            TokenKind::Lp => &self.lp,
        }
    }

    fn ledger_mut(&mut self, kind: TokenKind) -> &mut FeeLedger {
        match kind {
            TokenKind::Ytx => &mut self.ytx,
            TokenKind::Yfs => &mut self.yfs,
            TokenKind::Lp => &mut self.lp,
        }
    }

    pub fn balance_of(&self, kind: TokenKind, account: &Address) -> Amount {
        self.ledger(kind).balance_of(account)
    }

    pub fn total_supply(&self, kind: TokenKind) -> Amount {
        self.ledger(kind).total_supply()
    }

    pub fn allowance(&self, kind: TokenKind, owner: &Address, spender: &Address) -> Amount {
        self.ledger(kind).allowance(owner, spender)
    }

    pub fn staking(&self) -> &StakingEngine {
        &self.staking
    }

    pub fn liquidity_lock(&self) -> &LiquidityLock {
        &self.lock
    }

    pub fn crafting(&self) -> &CraftingRegistry {
        &self.crafting
    }

    /// YFS `staker` would receive if they claimed at `block`, before the YFS
    /// transfer fee.
    pub fn pending_yfs(&self, staker: &Address, block: u64) -> YtxResult<Amount> {
        self.staking.pending_yfs(staker, block)
    }

    /// YTX earnings `provider` could extract now, before the transfer fee.
    pub fn claimable_earnings(&self, provider: &Address) -> YtxResult<Amount> {
        self.lock.claimable(provider)
    }

    // ---------------------------------------------------------------
    // Token operations
    // ---------------------------------------------------------------

    pub fn transfer(
        &mut self,
        ctx: &CallContext,
        kind: TokenKind,
        to: Address,
        amount: Amount,
    ) -> YtxResult<TransferReceipt> {
        self.call("transfer", ctx, |p| p.ledger_mut(kind).transfer(ctx.caller, to, amount))
    }

    pub fn approve(
        &mut self,
        ctx: &CallContext,
        kind: TokenKind,
        spender: Address,
        amount: Amount,
    ) -> YtxResult<()> {
        self.call("approve", ctx, |p| {
            p.ledger_mut(kind).approve(ctx.caller, spender, amount);
            Ok(())
        })
    }

    pub fn transfer_from(
        &mut self,
        ctx: &CallContext,
        kind: TokenKind,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> YtxResult<TransferReceipt> {
        self.call("transfer_from", ctx, |p| {
            p.ledger_mut(kind).transfer_from(ctx.caller, from, to, amount)
        })
    }

    /// Create `amount` of `kind` in `to`. Administrator only.
    pub fn mint_genesis(
        &mut self,
        ctx: &CallContext,
        kind: TokenKind,
        to: Address,
        amount: Amount,
    ) -> YtxResult<()> {
        self.call("mint_genesis", ctx, |p| {
            p.roles.require(&ctx.caller, Role::Administrator, "mint genesis supply")?;
            p.ledger_mut(kind).mint(to, amount)?;
            info!(token = kind.symbol(), %to, amount, "genesis mint");
            Ok(())
        })
    }

    /// Add or remove a fee exemption on one ledger. Administrator only.
    pub fn set_fee_exempt(
        &mut self,
        ctx: &CallContext,
        kind: TokenKind,
        account: Address,
        exempt: bool,
    ) -> YtxResult<()> {
        self.roles
            .require(&ctx.caller, Role::Administrator, "set fee exemption")?;
        self.ledger_mut(kind).set_exempt(account, exempt);
        info!(token = kind.symbol(), %account, exempt, "fee exemption updated");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Staking
    // ---------------------------------------------------------------

    pub fn stake(&mut self, ctx: &CallContext, amount: Amount) -> YtxResult<Amount> {
        self.call("stake", ctx, |p| {
            p.staking
                .stake(&mut p.ytx, &mut p.yfs, ctx.caller, amount, ctx.block)
        })
    }

    pub fn unstake_and_claim(
        &mut self,
        ctx: &CallContext,
        amount: Amount,
    ) -> YtxResult<UnstakeOutcome> {
        self.call("unstake_and_claim", ctx, |p| {
            p.staking
                .unstake_and_claim(&mut p.ytx, &mut p.yfs, ctx.caller, amount, ctx.block)
        })
    }

    pub fn receive_yfs(&mut self, ctx: &CallContext) -> YtxResult<Amount> {
        self.call("receive_yfs", ctx, |p| {
            p.staking.receive_yfs(&mut p.yfs, ctx.caller, ctx.block)
        })
    }

    // ---------------------------------------------------------------
    // Liquidity lock
    // ---------------------------------------------------------------

    pub fn lock_liquidity(&mut self, ctx: &CallContext, amount: Amount) -> YtxResult<()> {
        self.call("lock_liquidity", ctx, |p| {
            p.lock
                .lock(&mut p.lp, &mut p.ytx, ctx.caller, amount, ctx.block)
        })
    }

    pub fn extract_earnings(&mut self, ctx: &CallContext) -> YtxResult<Amount> {
        self.call("extract_earnings", ctx, |p| {
            p.lock.extract_earnings(&mut p.ytx, ctx.caller)
        })
    }

    pub fn extract_liquidity(
        &mut self,
        ctx: &CallContext,
        amount: Option<Amount>,
    ) -> YtxResult<ExtractedLiquidity> {
        self.call("extract_liquidity", ctx, |p| {
            p.lock
                .extract_liquidity(&mut p.lp, &mut p.ytx, ctx.caller, amount, ctx.block)
        })
    }

    /// Change the lock duration for all positions. Administrator only.
    pub fn set_lock_duration(&mut self, ctx: &CallContext, blocks: u64) -> YtxResult<()> {
        self.call("set_lock_duration", ctx, |p| {
            p.roles
                .require(&ctx.caller, Role::Administrator, "set lock duration")?;
            p.lock.set_lock_duration(blocks);
            Ok(())
        })
    }

    // ---------------------------------------------------------------
    // Crafting
    // ---------------------------------------------------------------

    /// Register a blueprint. Administrator only.
    pub fn create_blueprint(
        &mut self,
        ctx: &CallContext,
        uri: &str,
        max_mint: u64,
        ytx_cost: Amount,
        yfs_cost: Amount,
    ) -> YtxResult<()> {
        self.call("create_blueprint", ctx, |p| {
            p.roles
                .require(&ctx.caller, Role::Administrator, "create blueprint")?;
            p.crafting
                .create_blueprint(uri, max_mint, ytx_cost, yfs_cost)
        })
    }

    pub fn mint(&mut self, ctx: &CallContext, uri: &str) -> YtxResult<u64> {
        self.call("mint", ctx, |p| {
            p.crafting.mint(&mut p.ytx, &mut p.yfs, ctx.caller, uri)
        })
    }

    pub fn break_card(&mut self, ctx: &CallContext, token_id: u64) -> YtxResult<Amount> {
        self.call("break_card", ctx, |p| {
            p.crafting.break_card(&mut p.ytx, ctx.caller, token_id)
        })
    }

    pub fn transfer_card(&mut self, ctx: &CallContext, to: Address, token_id: u64) -> YtxResult<()> {
        self.call("transfer_card", ctx, |p| {
            p.crafting.transfer_card(ctx.caller, to, token_id)
        })
    }

    /// Run `op` as one external call: all-or-nothing, with pool fee income
    /// forwarded to the accumulator before commit.
    fn call<T, F>(&mut self, action: &'static str, ctx: &CallContext, op: F) -> YtxResult<T>
    where
        F: FnOnce(&mut Self) -> YtxResult<T>,
    {
        let result = atomically(self, |protocol| {
            let value = op(protocol)?;
            protocol.lock.collect_income(&mut protocol.ytx)?;
            Ok(value)
        });
        if let Err(err) = &result {
            warn!(action, caller = %ctx.caller, block = ctx.block, error = %err, "call rolled back");
        }
        result
    }

    // ---------------------------------------------------------------
    // Persisted state
    // ---------------------------------------------------------------

    pub fn snapshot(&self) -> ProtocolSnapshot {
        ProtocolSnapshot {
            ytx: LedgerSnapshot::of(&self.ytx),
            yfs: LedgerSnapshot::of(&self.yfs),
            lp: LedgerSnapshot::of(&self.lp),
            staking: StakingSnapshot {
                address: self.staking.address(),
                total_staked: self.staking.total_staked(),
                positions: self.staking.positions(),
            },
            liquidity: LiquiditySnapshot {
                address: self.lock.address(),
                lock_duration: self.lock.lock_duration(),
                acc_per_share: self.lock.accumulator().acc_per_share(),
                total_shares: self.lock.accumulator().total_shares(),
                undistributed: self.lock.accumulator().undistributed(),
                positions: self.lock.positions(),
                shares: self.lock.accumulator().positions(),
            },
            crafting: CraftingSnapshot {
                address: self.crafting.address(),
                base_uri: self.crafting.base_uri().to_string(),
                next_token_id: self.crafting.next_token_id(),
                blueprints: self.crafting.blueprints(),
                tokens: self.crafting.tokens(),
            },
        }
    }
}

impl Transactional for Protocol {
    fn begin(&mut self) {
        self.ytx.begin();
        self.yfs.begin();
        self.lp.begin();
        self.staking.begin();
        self.lock.begin();
        self.crafting.begin();
    }

    fn commit(&mut self) {
        self.ytx.commit();
        self.yfs.commit();
        self.lp.commit();
        self.staking.commit();
        self.lock.commit();
        self.crafting.commit();
    }

    fn rollback(&mut self) {
        self.ytx.rollback();
        self.yfs.rollback();
        self.lp.rollback();
        self.staking.rollback();
        self.lock.rollback();
        self.crafting.rollback();
    }
}

/// Full protocol state with every table sorted by key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolSnapshot {
    pub ytx: LedgerSnapshot,
    pub yfs: LedgerSnapshot,
    pub lp: LedgerSnapshot,
    pub staking: StakingSnapshot,
    pub liquidity: LiquiditySnapshot,
    pub crafting: CraftingSnapshot,
}

impl ProtocolSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    pub symbol: String,
    pub total_supply: Amount,
    pub balances: Vec<(Address, Amount)>,
}

impl LedgerSnapshot {
    fn of(ledger: &FeeLedger) -> Self {
        Self {
            symbol: ledger.symbol().to_string(),
            total_supply: ledger.total_supply(),
            balances: ledger.balances(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StakingSnapshot {
    pub address: Address,
    pub total_staked: Amount,
    pub positions: Vec<(Address, StakePosition)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiquiditySnapshot {
    pub address: Address,
    pub lock_duration: u64,
    pub acc_per_share: u128,
    pub total_shares: Amount,
    pub undistributed: Amount,
    pub positions: Vec<(Address, LiquidityPosition)>,
    pub shares: Vec<(Address, SharePosition)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CraftingSnapshot {
    pub address: Address,
    pub base_uri: String,
    pub next_token_id: u64,
    pub blueprints: Vec<Blueprint>,
    pub tokens: Vec<MintedToken>,
}
