// crates/ytx-core/src/address.rs
//
// Account identities and the per-call context supplied by the execution
// environment.
//
// Addresses are opaque 32-byte identifiers. User accounts come from the host
// environment; system accounts (liquidity pool, staking engine, crafting
// registry) are derived deterministically from a domain tag so that no
// participant address is hard-coded anywhere in the protocol.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Domain separator mixed into every derived address.
const DERIVATION_DOMAIN: &[u8] = b"ytx:address:v1:";

/// A 32-byte account identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Derive an address from a human-readable tag: `SHA-256(domain || tag)`.
    ///
    /// # Example
    /// ```
    /// use ytx_core::Address;
    /// assert_eq!(Address::derive("pool"), Address::derive("pool"));
    /// assert_ne!(Address::derive("pool"), Address::derive("engine"));
    /// ```
    pub fn derive(tag: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(DERIVATION_DOMAIN);
        hasher.update(tag.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Raw bytes of this address.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps log lines readable.
        write!(f, "Address(0x")?;
        for byte in &self.0[..4] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "..)")
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix("0x").unwrap_or(s);
        if !hex.is_ascii() || hex.len() != 64 {
            return Err(format!(
                "Address must be 64 hex characters, got {}",
                hex.len()
            ));
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|e| format!("Invalid hex in address: {}", e))?;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Identity and clock for a single external call.
///
/// The execution environment guarantees that `block` never decreases between
/// calls; the protocol only ever compares it against stored thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// The account invoking the operation.
    pub caller: Address,
    /// The current block number.
    pub block: u64,
}

impl CallContext {
    pub fn new(caller: Address, block: u64) -> Self {
        Self { caller, block }
    }
}
