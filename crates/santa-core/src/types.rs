//! shared types for secret santa games

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ledger-assigned game identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// game id that is not a plain decimal u64
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed game id {input:?}")]
pub struct MalformedGameId {
    pub input: String,
}

impl FromStr for GameId {
    type Err = MalformedGameId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        s.parse::<u64>().map(GameId).map_err(|_| MalformedGameId {
            input: s.to_string(),
        })
    }
}

impl From<u64> for GameId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// 20-byte account identity, serialized as `0x`-prefixed hex
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_raw(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_part = s.trim().trim_start_matches("0x").trim_start_matches("0X");
        let bytes = hex::decode(hex_part).map_err(|e| format!("invalid address: {}", e))?;
        let raw: [u8; 20] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| format!("invalid address length: {} bytes", b.len()))?;
        Ok(Self(raw))
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// game phase. only ever advances
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum GameState {
    /// players may join
    #[default]
    Registration = 0,
    /// assignments computed, participants frozen
    Active = 1,
    /// every participant may decrypt every assignment
    Revealed = 2,
}

impl GameState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Registration => "Registration",
            Self::Active => "Active",
            Self::Revealed => "Revealed",
        }
    }

    /// state that follows this one, if any
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Registration => Some(Self::Active),
            Self::Active => Some(Self::Revealed),
            Self::Revealed => None,
        }
    }
}

impl TryFrom<u8> for GameState {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Registration),
            1 => Ok(Self::Active),
            2 => Ok(Self::Revealed),
            other => Err(other),
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// registered player
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub address: Address,
    pub name: String,
}

/// participant address paired with its display name
pub type ParticipantWithName = Participant;

/// public summary of a game, as returned by `getGame`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInfo {
    pub game_id: GameId,
    pub creator: Address,
    pub name: String,
    pub created_at: u64,
    pub state: GameState,
    pub player_count: u64,
    pub has_password: bool,
}

/// snapshot of a candidate's join progress
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinStatus {
    pub has_pending: bool,
    pub is_decrypted: bool,
    pub is_registered: bool,
}

impl JoinStatus {
    pub const REGISTERED: JoinStatus = JoinStatus {
        has_pending: false,
        is_decrypted: false,
        is_registered: true,
    };

    /// completeJoin may be submitted
    pub fn ready_to_complete(&self) -> bool {
        self.has_pending && self.is_decrypted && !self.is_registered
    }
}

impl From<(bool, bool, bool)> for JoinStatus {
    fn from((has_pending, is_decrypted, is_registered): (bool, bool, bool)) -> Self {
        Self {
            has_pending,
            is_decrypted,
            is_registered,
        }
    }
}
