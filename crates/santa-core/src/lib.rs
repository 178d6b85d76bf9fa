//! santa-core: secret santa assignment + join protocol
//!
//! the deterministic, verifiable half of an fhe secret santa:
//! - password hashing and entropy generation (inputs to encryption)
//! - pluggable entropy combination for the shared seed
//! - derangement generation from the combined seed
//! - join protocol and game lifecycle state machines
//!
//! ## lifecycle
//!
//! ```text
//! createGame ─► Registration ──finalizeGame (creator, >= 3)──► Active ──revealGame──► Revealed
//!                  │    ▲
//!     requestJoin ─┘    └─ completeJoin (after oracle decryption)
//! ```
//!
//! encryption, decryption and the ledger itself are collaborators; see
//! `santa-client` for the async facade

pub mod codec;
pub mod derange;
pub mod error;
pub mod join;
pub mod lifecycle;
pub mod seed;
pub mod types;

pub use codec::*;
pub use derange::*;
pub use error::*;
pub use join::*;
pub use lifecycle::*;
pub use seed::*;
pub use types::*;
