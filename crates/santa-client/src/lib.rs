//! santa-client: async client for fhe secret santa games
//!
//! ## architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              SantaClient                 │
//! │   session (account, permit) + cache      │
//! └──────┬──────────────────────┬────────────┘
//!        │                      │
//! ┌──────▼──────┐        ┌──────▼──────┐
//! │   Ledger    │        │  FheClient  │
//! │ reads/writes│        │ encrypt +   │
//! │ + receipts  │        │ unseal      │
//! └─────────────┘        └─────────────┘
//! ```
//!
//! both collaborators are traits. [`sim`] implements them in memory over the
//! `santa-core` lifecycle model
//!
//! ## usage
//!
//! ```ignore
//! use santa_client::{SantaClient, ClientConfig, SimLedger};
//!
//! let ledger = SimLedger::default();
//! let client = SantaClient::new(ClientConfig::local(), ledger.clone(), ledger.fhe());
//! client.init(account).await?;
//! let game_id = client.create_game("Office Party", "Alice", None).await?;
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod fhe;
pub mod ledger;
pub mod poll;
pub mod sim;

pub use cache::{GameCache, MemoryGameCache, StoredGame};
pub use client::{parse_game_id, JoinTicket, SantaClient};
pub use config::{ChainConfig, ClientConfig};
pub use error::{extract_reason, ClientError, ErrorKind, Result};
pub use fhe::{CtHash, EncryptedU32, FheClient, FheError, Permit, PermitRequest};
pub use ledger::{
    GameRecord, Ledger, LedgerCall, LedgerError, LedgerEvent, Receipt, TxHash, TxStatus,
};
pub use poll::{JoinPoller, PollCancel, PollOutcome};
pub use sim::{OraclePolicy, SimFhe, SimLedger, Submission};
