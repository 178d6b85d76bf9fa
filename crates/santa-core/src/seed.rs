//! entropy combination
//!
//! how the ledger folds join contributions into the assignment seed is
//! decided by the contract, so simulators and auditors pick it explicitly

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// fold function for entropy contributions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedCombiner {
    /// acc + x mod 2^32
    #[default]
    #[serde(alias = "wrapping-add")]
    Add,
    /// acc ^ x
    Xor,
    /// first 4 bytes (le) of blake3(acc_le || x_le)
    Blake3,
}

impl SeedCombiner {
    /// fold one contribution into the accumulated seed
    pub fn combine(&self, acc: u32, contribution: u32) -> u32 {
        match self {
            Self::Add => acc.wrapping_add(contribution),
            Self::Xor => acc ^ contribution,
            Self::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                hasher.update(&acc.to_le_bytes());
                hasher.update(&contribution.to_le_bytes());
                let digest = hasher.finalize();
                let bytes = digest.as_bytes();
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
            }
        }
    }

    /// fold contributions in join order, starting from the creator's
    pub fn combine_all(&self, first: u32, rest: &[u32]) -> u32 {
        rest.iter().fold(first, |acc, &x| self.combine(acc, x))
    }
}

impl fmt::Display for SeedCombiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Xor => "xor",
            Self::Blake3 => "blake3",
        };
        f.write_str(name)
    }
}

impl FromStr for SeedCombiner {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "add" | "wrapping-add" => Ok(Self::Add),
            "xor" => Ok(Self::Xor),
            "blake3" => Ok(Self::Blake3),
            other => Err(format!("unknown seed combiner: {}", other)),
        }
    }
}
