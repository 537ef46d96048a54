// crates/ytx-economics/src/crafting.rs
//
// Blueprint catalog and capped-edition card minting.
//
// A blueprint is keyed by its URI suffix and caps how many cards may ever be
// minted from it. Minting pulls the blueprint's YTX cost into the registry,
// where it is held to back refunds, and burns the YFS cost. Breaking a card
// retires its id for good and refunds a configured fraction of the YTX the
// registry received for it.
//
// Blueprint lifecycle, monotonic:
//   Uninitialized -> Open (current_mint < max_mint) -> Exhausted
// Breaking a card never reopens a blueprint: `max_mint` is an edition cap,
// not a live-supply cap.

use serde::{Deserialize, Serialize};
use tracing::info;

use ytx_core::config::BPS_DENOMINATOR;
use ytx_core::{Address, JournaledCell, JournaledMap, Transactional, YtxError, YtxResult};

use crate::ledger::FeeLedger;
use crate::token::Amount;

/// Token ids start here and only ever increase.
pub const FIRST_TOKEN_ID: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlueprintState {
    /// No blueprint registered under this URI.
    Uninitialized,
    /// Editions remain.
    Open,
    /// Every edition has been minted.
    Exhausted,
}

/// Template for a capped-edition card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blueprint {
    /// URI suffix identifying the blueprint.
    pub uri: String,
    pub max_mint: u64,
    pub current_mint: u64,
    pub ytx_cost: Amount,
    pub yfs_cost: Amount,
}

impl Blueprint {
    pub fn state(&self) -> BlueprintState {
        if self.current_mint < self.max_mint {
            BlueprintState::Open
        } else {
            BlueprintState::Exhausted
        }
    }

    pub fn remaining(&self) -> u64 {
        self.max_mint.saturating_sub(self.current_mint)
    }
}

/// A minted card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintedToken {
    pub id: u64,
    /// URI suffix of the blueprint this card was minted from.
    pub blueprint: String,
    pub owner: Address,
    /// YTX the registry received for this card, after the transfer fee.
    pub ytx_paid: Amount,
}

#[derive(Debug, Clone)]
pub struct CraftingRegistry {
    address: Address,
    base_uri: String,
    refund_bps: u16,
    blueprints: JournaledMap<String, Blueprint>,
    tokens: JournaledMap<u64, MintedToken>,
    next_id: JournaledCell<u64>,
}

impl CraftingRegistry {
    /// Create a registry holding card payments in `address`.
    ///
    /// `refund_bps` above 10,000 is clamped to a full refund.
    pub fn new(address: Address, base_uri: impl Into<String>, refund_bps: u16) -> Self {
        Self {
            address,
            base_uri: base_uri.into(),
            refund_bps: refund_bps.min(BPS_DENOMINATOR),
            blueprints: JournaledMap::new(),
            tokens: JournaledMap::new(),
            next_id: JournaledCell::new(FIRST_TOKEN_ID),
        }
    }

    /// The registry's account on the YTX and YFS ledgers.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn refund_bps(&self) -> u16 {
        self.refund_bps
    }

    pub fn blueprint(&self, uri: &str) -> Option<&Blueprint> {
        self.blueprints.get(&uri.to_string())
    }

    pub fn blueprint_state(&self, uri: &str) -> BlueprintState {
        self.blueprint(uri)
            .map_or(BlueprintState::Uninitialized, Blueprint::state)
    }

    pub fn blueprints(&self) -> Vec<Blueprint> {
        let mut rows: Vec<Blueprint> = self.blueprints.values().cloned().collect();
        rows.sort_by(|a, b| a.uri.cmp(&b.uri));
        rows
    }

    pub fn token(&self, id: u64) -> Option<&MintedToken> {
        self.tokens.get(&id)
    }

    pub fn owner_of(&self, id: u64) -> Option<Address> {
        self.tokens.get(&id).map(|t| t.owner)
    }

    /// Full metadata URI of a live card.
    pub fn token_uri(&self, id: u64) -> Option<String> {
        self.tokens
            .get(&id)
            .map(|t| format!("{}{}", self.base_uri, t.blueprint))
    }

    /// Ids of live cards owned by `owner`, ascending.
    pub fn tokens_of(&self, owner: &Address) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .tokens
            .values()
            .filter(|t| t.owner == *owner)
            .map(|t| t.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Every id ever minted, broken ones included, in mint order.
    pub fn minted_token_ids(&self) -> Vec<u64> {
        (FIRST_TOKEN_ID..self.next_id.value()).collect()
    }

    /// Live cards, ascending by id.
    pub fn tokens(&self) -> Vec<MintedToken> {
        let mut rows: Vec<MintedToken> = self.tokens.values().cloned().collect();
        rows.sort_by_key(|t| t.id);
        rows
    }

    /// Id the next successful mint will receive.
    pub fn next_token_id(&self) -> u64 {
        self.next_id.value()
    }

    /// Register a blueprint. Access control is the caller's responsibility.
    ///
    /// # Errors
    /// `DuplicateBlueprint` if `uri` is already registered.
    pub fn create_blueprint(
        &mut self,
        uri: &str,
        max_mint: u64,
        ytx_cost: Amount,
        yfs_cost: Amount,
    ) -> YtxResult<()> {
        if self.blueprint(uri).is_some() {
            return Err(YtxError::DuplicateBlueprint(uri.to_string()));
        }
        self.blueprints.insert(
            uri.to_string(),
            Blueprint {
                uri: uri.to_string(),
                max_mint,
                current_mint: 0,
                ytx_cost,
                yfs_cost,
            },
        );
        info!(uri, max_mint, ytx_cost, yfs_cost, "blueprint created");
        Ok(())
    }

    /// Mint a card from blueprint `uri` for `caller`, who must have approved
    /// the registry for both costs. Returns the new token id.
    ///
    /// # Errors
    /// `UnknownBlueprint`, `BlueprintExhausted`, or any ledger error raised
    /// while collecting the costs.
    pub fn mint(
        &mut self,
        ytx: &mut FeeLedger,
        yfs: &mut FeeLedger,
        caller: Address,
        uri: &str,
    ) -> YtxResult<u64> {
        let mut blueprint = self
            .blueprint(uri)
            .cloned()
            .ok_or_else(|| YtxError::UnknownBlueprint(uri.to_string()))?;
        if blueprint.current_mint >= blueprint.max_mint {
            return Err(YtxError::BlueprintExhausted {
                uri: uri.to_string(),
                max_mint: blueprint.max_mint,
            });
        }

        let ytx_paid = if blueprint.ytx_cost > 0 {
            ytx.transfer_from(self.address, caller, self.address, blueprint.ytx_cost)?
                .net
        } else {
            0
        };
        if blueprint.yfs_cost > 0 {
            let receipt =
                yfs.transfer_from(self.address, caller, self.address, blueprint.yfs_cost)?;
            yfs.burn(self.address, receipt.net)?;
        }

        let id = self.next_id.value();
        let next = id
            .checked_add(1)
            .ok_or(YtxError::ArithmeticOverflow("token id"))?;
        self.next_id.set(next);
        blueprint.current_mint += 1;
        self.tokens.insert(
            id,
            MintedToken {
                id,
                blueprint: blueprint.uri.clone(),
                owner: caller,
                ytx_paid,
            },
        );
        info!(
            %caller,
            uri,
            id,
            minted = blueprint.current_mint,
            max_mint = blueprint.max_mint,
            "card minted"
        );
        self.blueprints.insert(blueprint.uri.clone(), blueprint);
        Ok(id)
    }

    /// Burn card `id` and refund part of its YTX cost to `caller`. Returns the
    /// YTX credited after the transfer fee.
    ///
    /// # Errors
    /// `UnknownToken` if the id is not live; `NotTokenOwner` if `caller` does
    /// not own it.
    pub fn break_card(&mut self, ytx: &mut FeeLedger, caller: Address, id: u64) -> YtxResult<Amount> {
        let token = self.take_owned(caller, id)?;
        let refund = token
            .ytx_paid
            .checked_mul(Amount::from(self.refund_bps))
            .ok_or(YtxError::ArithmeticOverflow("refund"))?
            / Amount::from(BPS_DENOMINATOR);

        let received = if refund > 0 {
            ytx.transfer(self.address, caller, refund)?.net
        } else {
            0
        };
        info!(%caller, id, blueprint = token.blueprint.as_str(), refund, received, "card broken");
        Ok(received)
    }

    /// Move card `id` from `caller` to `to`.
    pub fn transfer_card(&mut self, caller: Address, to: Address, id: u64) -> YtxResult<()> {
        let mut token = self.take_owned(caller, id)?;
        token.owner = to;
        self.tokens.insert(id, token);
        info!(from = %caller, %to, id, "card transferred");
        Ok(())
    }

    /// Remove a live card after checking that `caller` owns it.
    fn take_owned(&mut self, caller: Address, id: u64) -> YtxResult<MintedToken> {
        let owner = self.owner_of(id).ok_or(YtxError::UnknownToken(id))?;
        if owner != caller {
            return Err(YtxError::NotTokenOwner {
                token_id: id,
                caller,
            });
        }
        self.tokens.remove(&id).ok_or(YtxError::UnknownToken(id))
    }
}

impl Transactional for CraftingRegistry {
    fn begin(&mut self) {
        self.blueprints.begin();
        self.tokens.begin();
        self.next_id.begin();
    }

    fn commit(&mut self) {
        self.blueprints.commit();
        self.tokens.commit();
        self.next_id.commit();
    }

    fn rollback(&mut self) {
        self.blueprints.rollback();
        self.tokens.rollback();
        self.next_id.rollback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FeePolicy;
    use crate::token::{TokenKind, UNITS_PER_TOKEN};

    const TEN: Amount = 10 * UNITS_PER_TOKEN;

    struct Fixture {
        registry: CraftingRegistry,
        ytx: FeeLedger,
        yfs: FeeLedger,
        player: Address,
    }

    fn fixture() -> Fixture {
        let registry = CraftingRegistry::new(
            Address::derive("registry"),
            "https://example-base-uri.com/",
            10_000,
        );
        let player = Address::derive("player");
        let mut ytx = FeeLedger::new(
            TokenKind::Ytx,
            FeePolicy {
                fee_bps: 100,
                sink: Some(Address::derive("pool")),
                treasury: None,
            },
        );
        let mut yfs = FeeLedger::new(TokenKind::Yfs, FeePolicy::none());
        ytx.mint(player, 1_000 * UNITS_PER_TOKEN).unwrap();
        yfs.mint(player, UNITS_PER_TOKEN).unwrap();
        ytx.approve(player, registry.address(), u128::MAX);
        yfs.approve(player, registry.address(), u128::MAX);
        Fixture {
            registry,
            ytx,
            yfs,
            player,
        }
    }

    #[test]
    fn test_create_blueprint() {
        let mut f = fixture();
        assert_eq!(
            f.registry.blueprint_state("example-1"),
            BlueprintState::Uninitialized
        );
        f.registry
            .create_blueprint("example-1", 1_000, TEN, TEN)
            .unwrap();
        let blueprint = f.registry.blueprint("example-1").unwrap();
        assert_eq!(blueprint.max_mint, 1_000);
        assert_eq!(blueprint.current_mint, 0);
        assert_eq!(blueprint.ytx_cost, TEN);
        assert_eq!(blueprint.yfs_cost, TEN);
        assert_eq!(f.registry.blueprint_state("example-1"), BlueprintState::Open);
    }

    #[test]
    fn test_duplicate_blueprint() {
        let mut f = fixture();
        f.registry.create_blueprint("dup", 1, 0, 0).unwrap();
        assert_eq!(
            f.registry.create_blueprint("dup", 5, 1, 1),
            Err(YtxError::DuplicateBlueprint("dup".to_string()))
        );
        assert_eq!(f.registry.blueprint("dup").unwrap().max_mint, 1);
    }

    #[test]
    fn test_mint_assigns_sequential_ids_and_uri() {
        let mut f = fixture();
        f.registry
            .create_blueprint("example-1", 10, TEN, 99_000_000_000_000_000)
            .unwrap();
        let first = f
            .registry
            .mint(&mut f.ytx, &mut f.yfs, f.player, "example-1")
            .unwrap();
        let second = f
            .registry
            .mint(&mut f.ytx, &mut f.yfs, f.player, "example-1")
            .unwrap();
        assert_eq!((first, second), (1, 2));
        assert_eq!(
            f.registry.token_uri(1).unwrap(),
            "https://example-base-uri.com/example-1"
        );
        assert_eq!(f.registry.tokens_of(&f.player), vec![1, 2]);
        assert_eq!(f.registry.blueprint("example-1").unwrap().current_mint, 2);
        assert_eq!(
            f.ytx.balance_of(&f.registry.address()),
            2 * 9_900_000_000_000_000_000
        );
        assert_eq!(
            f.yfs.total_supply(),
            UNITS_PER_TOKEN - 2 * 99_000_000_000_000_000
        );
    }

    #[test]
    fn test_mint_unknown_blueprint() {
        let mut f = fixture();
        assert_eq!(
            f.registry.mint(&mut f.ytx, &mut f.yfs, f.player, "missing"),
            Err(YtxError::UnknownBlueprint("missing".to_string()))
        );
    }

    #[test]
    fn test_mint_cap_enforced() {
        let mut f = fixture();
        f.registry.create_blueprint("capped", 3, 1, 1).unwrap();
        for _ in 0..3 {
            f.registry
                .mint(&mut f.ytx, &mut f.yfs, f.player, "capped")
                .unwrap();
        }
        assert_eq!(
            f.registry.blueprint_state("capped"),
            BlueprintState::Exhausted
        );
        assert_eq!(
            f.registry.mint(&mut f.ytx, &mut f.yfs, f.player, "capped"),
            Err(YtxError::BlueprintExhausted {
                uri: "capped".to_string(),
                max_mint: 3
            })
        );
        assert_eq!(f.registry.blueprint("capped").unwrap().current_mint, 3);
    }

    #[test]
    fn test_break_card_refunds_and_retires_id() {
        let mut f = fixture();
        f.registry
            .create_blueprint("example-1", 1_000, TEN, 0)
            .unwrap();
        let id = f
            .registry
            .mint(&mut f.ytx, &mut f.yfs, f.player, "example-1")
            .unwrap();
        let before = f.ytx.balance_of(&f.player);

        let received = f.registry.break_card(&mut f.ytx, f.player, id).unwrap();
        assert_eq!(received, 9_801_000_000_000_000_000);
        assert_eq!(f.ytx.balance_of(&f.player), before + received);
        assert_eq!(f.registry.owner_of(id), None);
        assert_eq!(f.registry.blueprint("example-1").unwrap().current_mint, 1);
        assert_eq!(
            f.registry.break_card(&mut f.ytx, f.player, id),
            Err(YtxError::UnknownToken(id))
        );
        assert_eq!(f.registry.minted_token_ids(), vec![1]);

        let next = f
            .registry
            .mint(&mut f.ytx, &mut f.yfs, f.player, "example-1")
            .unwrap();
        assert_eq!(next, 2);
    }

    #[test]
    fn test_partial_refund() {
        let mut f = fixture();
        f.registry = CraftingRegistry::new(Address::derive("registry"), "", 5_000);
        f.ytx.approve(f.player, f.registry.address(), u128::MAX);
        f.registry.create_blueprint("half", 10, 1_000, 0).unwrap();
        let id = f
            .registry
            .mint(&mut f.ytx, &mut f.yfs, f.player, "half")
            .unwrap();
        // 990 held after the inbound fee, half refunded, 1% fee on the way out
        let received = f.registry.break_card(&mut f.ytx, f.player, id).unwrap();
        assert_eq!(received, 495 - 4);
        assert_eq!(f.ytx.balance_of(&f.registry.address()), 495);
    }

    #[test]
    fn test_break_card_not_owner() {
        let mut f = fixture();
        f.registry.create_blueprint("x", 10, 0, 0).unwrap();
        let id = f
            .registry
            .mint(&mut f.ytx, &mut f.yfs, f.player, "x")
            .unwrap();
        let thief = Address::derive("thief");
        assert_eq!(
            f.registry.break_card(&mut f.ytx, thief, id),
            Err(YtxError::NotTokenOwner {
                token_id: id,
                caller: thief
            })
        );
        assert_eq!(f.registry.owner_of(id), Some(f.player));
    }

    #[test]
    fn test_break_unminted_card() {
        let mut f = fixture();
        assert_eq!(
            f.registry.break_card(&mut f.ytx, f.player, 1),
            Err(YtxError::UnknownToken(1))
        );
    }

    #[test]
    fn test_transfer_card() {
        let mut f = fixture();
        let friend = Address::derive("friend");
        f.registry.create_blueprint("gift", 1, 0, 0).unwrap();
        let id = f
            .registry
            .mint(&mut f.ytx, &mut f.yfs, f.player, "gift")
            .unwrap();
        f.registry.transfer_card(f.player, friend, id).unwrap();
        assert_eq!(f.registry.owner_of(id), Some(friend));
        assert!(f.registry.tokens_of(&f.player).is_empty());
        assert!(matches!(
            f.registry.transfer_card(f.player, friend, id),
            Err(YtxError::NotTokenOwner { .. })
        ));
    }

    #[test]
    fn test_mint_without_yfs_fails_before_allocating_id() {
        let mut f = fixture();
        f.registry
            .create_blueprint("pricey", 5, 0, 2 * UNITS_PER_TOKEN)
            .unwrap();
        let err = f
            .registry
            .mint(&mut f.ytx, &mut f.yfs, f.player, "pricey")
            .unwrap_err();
        assert!(matches!(err, YtxError::InsufficientBalance { .. }));
        assert_eq!(f.registry.next_token_id(), 1);
        assert_eq!(f.registry.blueprint("pricey").unwrap().current_mint, 0);
    }
}
