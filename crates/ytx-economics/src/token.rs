// crates/ytx-economics/src/token.rs
//
// Token identities, base-unit constants, and human-readable amounts.
//
// All three fungible tokens (YTX, YFS, and the LP token) use 18 decimals.
// Internal accounting is always in base units held in a `u128`, so balances
// in the 1e19-1e20 range used by real deployments never approach overflow.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Base units per whole token (18 decimals).
pub const UNITS_PER_TOKEN: u128 = 1_000_000_000_000_000_000;

/// Amount of a token in base units.
pub type Amount = u128;

/// The fungible tokens managed by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Fee-bearing protocol token.
    Ytx,
    /// Reward token minted to YTX stakers.
    Yfs,
    /// Liquidity-provider token locked in the liquidity pool.
    Lp,
}

impl TokenKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            TokenKind::Ytx => "YTX",
            TokenKind::Yfs => "YFS",
            TokenKind::Lp => "LP",
        }
    }
}

/// An amount tagged with its token, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAmount {
    pub kind: TokenKind,
    pub units: Amount,
}

impl TokenAmount {
    pub fn new(kind: TokenKind, units: Amount) -> Self {
        Self { kind, units }
    }

    /// Build an amount from a whole number of tokens, if it fits.
    pub fn from_whole(kind: TokenKind, whole: u128) -> Option<Self> {
        whole
            .checked_mul(UNITS_PER_TOKEN)
            .map(|units| Self { kind, units })
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.units / UNITS_PER_TOKEN;
        let frac = self.units % UNITS_PER_TOKEN;
        if frac == 0 {
            write!(f, "{} {}", whole, self.kind.symbol())
        } else {
            // Up to 18 decimal places, trailing zeros trimmed
            let frac_str = format!("{:018}", frac);
            let trimmed = frac_str.trim_end_matches('0');
            write!(f, "{}.{} {}", whole, trimmed, self.kind.symbol())
        }
    }
}
