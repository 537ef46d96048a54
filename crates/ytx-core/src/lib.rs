// crates/ytx-core/src/lib.rs
//
// ytx-core: Core types, roles, configuration, and journaled state primitives
// for the YTX/YFS token economy.
//
// This is the leaf crate that the economics crate depends on. It defines
// account identities, the call context supplied by the execution environment,
// the protocol-wide error taxonomy, the deployment configuration, and the
// undo journal that makes every external call all-or-nothing.

pub mod address;
pub mod config;
pub mod error;
pub mod journal;
pub mod roles;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use ytx_core::Address;`

// Identity types
pub use address::{Address, CallContext};

// Configuration
pub use config::{CraftingConfig, EmissionConfig, LockConfig, ProtocolConfig, TokenConfig};

// Error types
pub use error::{ConfigError, YtxError, YtxResult};

// Journaled state
pub use journal::{atomically, JournaledCell, JournaledMap, Transactional};

// Roles
pub use roles::{Role, RoleTable};
