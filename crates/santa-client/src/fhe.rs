//! fhe coprocessor collaborator
//!
//! encryption of inputs, permits, and unsealing of ciphertexts the account
//! has been granted access to. the client never decrypts anything itself

use core::fmt;

use async_trait::async_trait;
use santa_core::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ClientError;

/// on-ledger handle for an encrypted u32
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct CtHash(pub [u8; 32]);

impl fmt::Display for CtHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for CtHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // short form is enough to tell handles apart in logs
        write!(f, "CtHash(0x{}..)", hex::encode(&self.0[..4]))
    }
}

/// encrypted input as passed to a contract call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedU32 {
    pub ct_hash: CtHash,
    pub security_zone: u8,
    /// coprocessor signature binding the input to the sender
    pub signature: Vec<u8>,
}

/// what to sign when issuing a self permit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitRequest {
    pub name: String,
    pub issuer: Address,
    /// unix seconds
    pub expiration: u64,
}

/// signed authorization to unseal ciphertexts shared with `issuer`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permit {
    pub name: String,
    pub issuer: Address,
    /// unix seconds
    pub expiration: u64,
    pub signature: Vec<u8>,
}

impl Permit {
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expiration
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FheError {
    #[error("fhe client not initialized")]
    NotInitialized,

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("permit rejected: {0}")]
    Permit(String),

    #[error("access denied to {0}")]
    AccessDenied(CtHash),

    #[error("unseal failed: {0}")]
    Unseal(String),
}

pub type FheResult<T> = std::result::Result<T, FheError>;

impl From<FheError> for ClientError {
    fn from(e: FheError) -> Self {
        match e {
            FheError::NotInitialized => Self::NotInitialized,
            FheError::Encrypt(msg) => Self::EncryptionFailed(msg),
            FheError::Permit(msg) | FheError::Unseal(msg) => Self::UnsealFailed(msg),
            FheError::AccessDenied(ct) => Self::UnsealFailed(format!("access denied to {}", ct)),
        }
    }
}

/// encryption + permit + unseal
#[async_trait]
pub trait FheClient: Send + Sync {
    /// bind the client to an account (fetches keys on a real coprocessor)
    async fn init(&self, account: Address) -> FheResult<()>;

    /// encrypt values as u32 inputs, one output per value, same order
    async fn encrypt(&self, values: &[u32]) -> FheResult<Vec<EncryptedU32>>;

    async fn create_permit(&self, request: PermitRequest) -> FheResult<Permit>;

    /// decrypt a ciphertext the permit's issuer has access to
    async fn unseal(&self, ct: CtHash, permit: &Permit) -> FheResult<u32>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permit_expiry() {
        let permit = Permit {
            name: "Secret Santa".into(),
            issuer: Address::ZERO,
            expiration: 100,
            signature: vec![],
        };
        assert!(!permit.is_expired(99));
        assert!(permit.is_expired(100));
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(ClientError::from(FheError::NotInitialized), ClientError::NotInitialized);
        assert!(matches!(
            ClientError::from(FheError::Encrypt("zone".into())),
            ClientError::EncryptionFailed(_)
        ));
        assert!(matches!(
            ClientError::from(FheError::AccessDenied(CtHash::default())),
            ClientError::UnsealFailed(_)
        ));
    }
}
