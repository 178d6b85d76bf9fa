//! ledger (contract) collaborator
//!
//! the contract is the single source of truth. responses come back as raw
//! records and are mapped into santa-core types here, at the boundary

use core::fmt;

use async_trait::async_trait;
use santa_core::{Address, GameId, GameInfo, GameState, JoinStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fhe::{CtHash, EncryptedU32};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// contract custom error (e.g. `NotCreator`)
    #[error("reverted: {name}")]
    Reverted { name: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unknown transaction {0}")]
    UnknownTransaction(TxHash),

    #[error("decoding error: {0}")]
    Decoding(String),
}

impl LedgerError {
    pub fn reverted(name: impl Into<String>) -> Self {
        Self::Reverted { name: name.into() }
    }
}

impl From<santa_core::SantaError> for LedgerError {
    fn from(e: santa_core::SantaError) -> Self {
        Self::reverted(e.revert_name())
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// transaction hash
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TxHash(pub [u8; 32]);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self)
    }
}

/// raw `getGame` tuple
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: u64,
    pub creator: Address,
    pub name: String,
    pub created_at: u64,
    pub state: u8,
    pub player_count: u64,
    pub has_password: bool,
}

impl TryFrom<GameRecord> for GameInfo {
    type Error = LedgerError;

    fn try_from(record: GameRecord) -> Result<Self, Self::Error> {
        let state = GameState::try_from(record.state)
            .map_err(|code| LedgerError::Decoding(format!("unknown game state {}", code)))?;
        Ok(GameInfo {
            game_id: GameId(record.game_id),
            creator: record.creator,
            name: record.name,
            created_at: record.created_at,
            state,
            player_count: record.player_count,
            has_password: record.has_password,
        })
    }
}

impl From<&GameInfo> for GameRecord {
    fn from(info: &GameInfo) -> Self {
        Self {
            game_id: info.game_id.0,
            creator: info.creator,
            name: info.name.clone(),
            created_at: info.created_at,
            state: info.state as u8,
            player_count: info.player_count,
            has_password: info.has_password,
        }
    }
}

/// raw `getJoinStatus` tuple: (hasPending, isDecrypted, isRegistered)
pub type RawJoinStatus = (bool, bool, bool);

/// map a raw status tuple at the boundary
pub fn join_status(raw: RawJoinStatus) -> JoinStatus {
    JoinStatus::from(raw)
}

/// contract write calls
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCall {
    CreateGame {
        name: String,
        creator_name: String,
        entropy: EncryptedU32,
        password: EncryptedU32,
        has_password: bool,
    },
    RequestJoin {
        game_id: GameId,
        name: String,
        password: EncryptedU32,
        entropy: EncryptedU32,
    },
    CompleteJoin {
        game_id: GameId,
    },
    Finalize {
        game_id: GameId,
    },
    Reveal {
        game_id: GameId,
    },
}

impl LedgerCall {
    /// contract function name
    pub fn function_name(&self) -> &'static str {
        match self {
            Self::CreateGame { .. } => "createGame",
            Self::RequestJoin { .. } => "requestJoinGame",
            Self::CompleteJoin { .. } => "completeJoinGame",
            Self::Finalize { .. } => "finalizeGame",
            Self::Reveal { .. } => "revealGame",
        }
    }
}

/// contract events
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    GameCreated {
        game_id: GameId,
        creator: Address,
        name: String,
        has_password: bool,
    },
    JoinRequested {
        game_id: GameId,
        player: Address,
    },
    PlayerJoined {
        game_id: GameId,
        player: Address,
        name: String,
    },
    /// password mismatch, pending join deleted
    JoinRejected {
        game_id: GameId,
        player: Address,
    },
    GameFinalized {
        game_id: GameId,
    },
    GameRevealed {
        game_id: GameId,
    },
}

/// receipt status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Success,
    Reverted,
}

/// mined transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub status: TxStatus,
    pub events: Vec<LedgerEvent>,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status == TxStatus::Success
    }

    /// id from the `GameCreated` event, if present
    pub fn created_game(&self) -> Option<GameId> {
        self.events.iter().find_map(|e| match e {
            LedgerEvent::GameCreated { game_id, .. } => Some(*game_id),
            _ => None,
        })
    }

    pub fn joined(&self, who: &Address) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, LedgerEvent::PlayerJoined { player, .. } if player == who))
    }

    pub fn rejected(&self, who: &Address) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, LedgerEvent::JoinRejected { player, .. } if player == who))
    }
}

/// read + write access to the secret santa contract
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn get_game(&self, game_id: GameId) -> LedgerResult<GameRecord>;

    async fn get_participants(&self, game_id: GameId) -> LedgerResult<Vec<Address>>;

    async fn get_participant_names(&self, game_id: GameId) -> LedgerResult<Vec<String>>;

    async fn get_participant_count(&self, game_id: GameId) -> LedgerResult<u64>;

    async fn get_player_name(&self, game_id: GameId, player: Address) -> LedgerResult<String>;

    async fn get_join_status(&self, game_id: GameId, player: Address)
        -> LedgerResult<RawJoinStatus>;

    async fn is_registered(&self, game_id: GameId, player: Address) -> LedgerResult<bool>;

    /// caller's encrypted target index
    async fn get_my_target(&self, game_id: GameId, caller: Address) -> LedgerResult<CtHash>;

    async fn get_games_by_player(&self, player: Address) -> LedgerResult<Vec<u64>>;

    async fn get_games_by_creator(&self, creator: Address) -> LedgerResult<Vec<u64>>;

    async fn game_count(&self) -> LedgerResult<u64>;

    /// dry-run a write, surfacing reverts without sending
    async fn simulate(&self, from: Address, call: &LedgerCall) -> LedgerResult<()>;

    async fn submit(&self, from: Address, call: LedgerCall) -> LedgerResult<TxHash>;

    async fn wait_for_receipt(&self, tx: TxHash) -> LedgerResult<Receipt>;
}
