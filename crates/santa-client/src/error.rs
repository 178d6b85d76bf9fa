//! error types for the santa client

use santa_core::{MalformedGameId, SantaError};
use thiserror::Error;

use crate::ledger::LedgerError;

/// coarse error class, for deciding what the ui offers next
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// rejected locally before any network call
    Validation,
    /// ledger refused on protocol grounds
    Precondition,
    /// encryption, permit or unseal problem
    Crypto,
    /// network, receipt or decoding failure
    Transport,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    // === validation ===
    #[error("{0} must not be empty")]
    EmptyName(&'static str),

    #[error(transparent)]
    MalformedGameId(#[from] MalformedGameId),

    #[error("config error: {0}")]
    Config(String),

    // === protocol ===
    #[error(transparent)]
    Protocol(#[from] SantaError),

    #[error("contract reverted: {0}")]
    Reverted(String),

    // === crypto ===
    #[error("fhe client not initialized")]
    NotInitialized,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("no permit, create one before unsealing")]
    PermitMissing,

    #[error("permit expired at {expiration}")]
    PermitExpired { expiration: u64 },

    #[error("failed to unseal: {0}")]
    UnsealFailed(String),

    // === transport ===
    #[error("{0}")]
    Transport(String),

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyName(_)
            | Self::MalformedGameId(_)
            | Self::Config(_) => ErrorKind::Validation,
            Self::Protocol(SantaError::InvalidParticipantCount { .. }) => ErrorKind::Validation,
            Self::Protocol(_) | Self::Reverted(_) => ErrorKind::Precondition,
            Self::NotInitialized
            | Self::EncryptionFailed(_)
            | Self::PermitMissing
            | Self::PermitExpired { .. }
            | Self::UnsealFailed(_) => ErrorKind::Crypto,
            Self::Transport(_) | Self::TransactionFailed(_) | Self::Decoding(_) | Self::Timeout(_) => {
                ErrorKind::Transport
            }
        }
    }

    /// protocol error, if this is one
    pub fn protocol(&self) -> Option<&SantaError> {
        match self {
            Self::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LedgerError> for ClientError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Reverted { name } => match SantaError::from_revert_name(&name) {
                Some(err) => Self::Protocol(err),
                None => Self::Reverted(name),
            },
            LedgerError::Transport(msg) => from_transport_message(&msg),
            LedgerError::UnknownTransaction(hash) => {
                Self::Transport(format!("unknown transaction {}", hash))
            }
            LedgerError::Decoding(msg) => Self::Decoding(msg),
        }
    }
}

const GENERIC_FAILURE: &str = "Transaction failed. Please try again.";

/// normalize a raw transport error, recovering named protocol errors when the
/// message carries one
pub fn from_transport_message(message: &str) -> ClientError {
    let reason = extract_reason(message);
    if let Some(err) = SantaError::from_revert_name(&reason) {
        return ClientError::Protocol(err);
    }
    // custom error name buried in a longer revert message
    for name in SantaError::REVERT_NAMES {
        if message.contains(name) {
            if let Some(err) = SantaError::from_revert_name(name) {
                return ClientError::Protocol(err);
            }
        }
    }
    ClientError::Transport(reason)
}

/// best-effort human readable reason from a verbose rpc/wallet error
pub fn extract_reason(message: &str) -> String {
    let lower = message.to_ascii_lowercase();

    for needle in ["user rejected the request", "user rejected", "rejected by user"] {
        if let Some(pos) = lower.find(needle) {
            return capitalize(&message[pos..pos + needle.len()]);
        }
    }

    if let Some(reason) = quoted_after(message, "reverted with reason string ") {
        return capitalize(&reason);
    }
    for prefix in ["execution reverted: ", "reason: "] {
        if let Some(reason) = line_after(message, &lower, prefix) {
            return capitalize(&reason);
        }
    }

    for name in SantaError::REVERT_NAMES {
        if message.contains(name) {
            return name.to_string();
        }
    }

    for needle in ["insufficient funds", "network error", "could not connect"] {
        if let Some(pos) = lower.find(needle) {
            return capitalize(&message[pos..pos + needle.len()]);
        }
    }

    if let Some(details) = line_after(message, &lower, "details:") {
        return details.trim().to_string();
    }

    if message.chars().count() > 100 {
        return GENERIC_FAILURE.to_string();
    }
    message.to_string()
}

/// text from after `prefix` (matched case-insensitively) to end of line
fn line_after(message: &str, lower: &str, prefix: &str) -> Option<String> {
    let start = lower.find(prefix)? + prefix.len();
    let rest = &message[start..];
    let line = rest.lines().next().unwrap_or("").trim();
    (!line.is_empty()).then(|| line.to_string())
}

/// text inside the quotes that follow `prefix`
fn quoted_after(message: &str, prefix: &str) -> Option<String> {
    let lower = message.to_ascii_lowercase();
    let start = lower.find(prefix)? + prefix.len();
    let rest = &message[start..];
    let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let inner = &rest[quote.len_utf8()..];
    let end = inner.find(quote)?;
    Some(inner[..end].to_string())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
