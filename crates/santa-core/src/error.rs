//! protocol error taxonomy
//!
//! every guard violation has its own variant. the ledger reports the same
//! conditions as custom revert names, see [`SantaError::from_revert_name`]

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SantaError {
    #[error("invalid participant count: {n} (need at least 3)")]
    InvalidParticipantCount { n: usize },

    #[error("already registered in this game")]
    AlreadyRegistered,

    #[error("game not found")]
    GameNotFound,

    #[error("password did not match, pending join discarded")]
    PasswordMismatch,

    #[error("need at least 3 players to finalize")]
    NeedAtLeast3Players,

    #[error("no pending join request found")]
    NoPendingJoin,

    #[error("a join request is already pending")]
    PendingJoinExists,

    #[error("only the game creator may do this")]
    NotCreator,

    #[error("not registered in this game")]
    NotRegistered,

    #[error("game is no longer in registration phase")]
    NotRegistrationPhase,

    #[error("password verification not yet complete")]
    DecryptionNotReady,

    #[error("game is not active")]
    NotActive,

    #[error("game has not started yet")]
    GameNotStarted,
}

pub type Result<T> = std::result::Result<T, SantaError>;

impl SantaError {
    /// custom error name as emitted by the contract
    pub fn revert_name(&self) -> &'static str {
        match self {
            Self::InvalidParticipantCount { .. } => "InvalidParticipantCount",
            Self::AlreadyRegistered => "AlreadyRegistered",
            Self::GameNotFound => "GameNotFound",
            // the contract calls a mismatch an invalid password
            Self::PasswordMismatch => "InvalidPassword",
            Self::NeedAtLeast3Players => "NeedAtLeast3Players",
            Self::NoPendingJoin => "NoPendingJoin",
            Self::PendingJoinExists => "PendingJoinExists",
            Self::NotCreator => "NotCreator",
            Self::NotRegistered => "NotRegistered",
            Self::NotRegistrationPhase => "NotRegistrationPhase",
            Self::DecryptionNotReady => "DecryptionNotReady",
            Self::NotActive => "NotActive",
            Self::GameNotStarted => "GameNotStarted",
        }
    }

    /// map a contract revert name back to the protocol error
    pub fn from_revert_name(name: &str) -> Option<Self> {
        let err = match name.trim() {
            "AlreadyRegistered" => Self::AlreadyRegistered,
            "GameNotFound" => Self::GameNotFound,
            "InvalidPassword" | "PasswordMismatch" => Self::PasswordMismatch,
            "NeedAtLeast3Players" => Self::NeedAtLeast3Players,
            "NoPendingJoin" => Self::NoPendingJoin,
            "PendingJoinExists" => Self::PendingJoinExists,
            "NotCreator" => Self::NotCreator,
            "NotRegistered" => Self::NotRegistered,
            "NotRegistrationPhase" => Self::NotRegistrationPhase,
            "DecryptionNotReady" => Self::DecryptionNotReady,
            "NotActive" => Self::NotActive,
            "GameNotStarted" => Self::GameNotStarted,
            _ => return None,
        };
        Some(err)
    }

    /// every name the contract may revert with
    pub const REVERT_NAMES: [&'static str; 12] = [
        "AlreadyRegistered",
        "GameNotFound",
        "InvalidPassword",
        "NeedAtLeast3Players",
        "NoPendingJoin",
        "PendingJoinExists",
        "NotCreator",
        "NotRegistered",
        "NotRegistrationPhase",
        "DecryptionNotReady",
        "NotActive",
        "GameNotStarted",
    ];
}
