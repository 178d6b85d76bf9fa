//! join protocol state machine
//!
//! per (game, candidate):
//!
//! ```text
//! NotRequested ──requestJoin──► PendingDecryption ──completeJoin──► Registered
//!        ▲                              │
//!        └───────── retry ◄── Rejected ◄┘ (password mismatch)
//! ```
//!
//! the ledger owns the pending record ([`PendingJoin`]); the client only
//! ever sees [`JoinStatus`] snapshots and drives a [`JoinTracker`] from them

use serde::{Deserialize, Serialize};

use crate::error::{Result, SantaError};
use crate::types::{GameId, JoinStatus};

/// whether the oracle has resolved the password check
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecryptionState {
    Pending,
    Ready,
}

/// oracle verdict on a pending join
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinOutcome {
    /// guess matched the commitment (or the game has no password)
    Admit,
    /// guess did not match, record is discarded on completion
    Reject,
}

/// ledger-side record of a join request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingJoin<C> {
    /// display name the candidate asked for
    pub name: String,
    /// encrypted password hash guess (or encrypted sentinel)
    pub password_guess: C,
    /// encrypted entropy, folded into the seed only on admission
    pub entropy: C,
    /// unset until the decryption oracle resolves
    pub outcome: Option<JoinOutcome>,
}

impl<C> PendingJoin<C> {
    pub fn new(name: String, password_guess: C, entropy: C) -> Self {
        Self {
            name,
            password_guess,
            entropy,
            outcome: None,
        }
    }

    pub fn decryption_state(&self) -> DecryptionState {
        match self.outcome {
            None => DecryptionState::Pending,
            Some(_) => DecryptionState::Ready,
        }
    }

    pub fn is_decrypted(&self) -> bool {
        self.outcome.is_some()
    }
}

/// candidate-side join phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinPhase {
    #[default]
    NotRequested,
    PendingDecryption,
    Registered,
    Rejected,
}

/// what the candidate should do next
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinAction {
    /// submit requestJoin
    Submit,
    /// keep polling status
    Wait,
    /// submit completeJoin
    Complete,
    /// registered, nothing left to do
    Done,
    /// last attempt was rejected, a new requestJoin is needed
    Retry,
    /// unrecoverable protocol error for this game
    Abort,
}

/// resumable client-side view of one join attempt
///
/// a tracker rebuilt from scratch converges to the same action after one
/// [`observe`](Self::observe) because status reads are idempotent
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinTracker {
    game_id: GameId,
    phase: JoinPhase,
    attempts: u32,
}

impl JoinTracker {
    pub fn new(game_id: GameId) -> Self {
        Self {
            game_id,
            phase: JoinPhase::NotRequested,
            attempts: 0,
        }
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    pub fn phase(&self) -> JoinPhase {
        self.phase
    }

    /// number of accepted requestJoin submissions
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// next action implied by the current phase alone
    pub fn action(&self) -> JoinAction {
        match self.phase {
            JoinPhase::NotRequested => JoinAction::Submit,
            JoinPhase::PendingDecryption => JoinAction::Wait,
            JoinPhase::Registered => JoinAction::Done,
            JoinPhase::Rejected => JoinAction::Retry,
        }
    }

    /// ledger accepted a requestJoin
    pub fn on_requested(&mut self) -> Result<()> {
        match self.phase {
            JoinPhase::NotRequested | JoinPhase::Rejected => {
                self.phase = JoinPhase::PendingDecryption;
                self.attempts += 1;
                Ok(())
            }
            JoinPhase::PendingDecryption => Err(SantaError::PendingJoinExists),
            JoinPhase::Registered => Err(SantaError::AlreadyRegistered),
        }
    }

    /// fold in a status snapshot from the ledger
    pub fn observe(&mut self, status: JoinStatus) -> JoinAction {
        if status.is_registered {
            self.phase = JoinPhase::Registered;
            return JoinAction::Done;
        }

        if status.has_pending {
            self.phase = JoinPhase::PendingDecryption;
            return if status.is_decrypted {
                JoinAction::Complete
            } else {
                JoinAction::Wait
            };
        }

        // no record and not registered
        match self.phase {
            // record vanished without admission: completed as a rejection
            JoinPhase::PendingDecryption => {
                self.phase = JoinPhase::Rejected;
                JoinAction::Retry
            }
            // registration is permanent on the ledger, snapshot is stale
            JoinPhase::Registered => JoinAction::Done,
            JoinPhase::Rejected => JoinAction::Retry,
            JoinPhase::NotRequested => JoinAction::Submit,
        }
    }

    /// fold in the result of a completeJoin submission
    pub fn on_completed(&mut self, result: &Result<()>) -> JoinAction {
        match result {
            Ok(()) | Err(SantaError::AlreadyRegistered) => {
                self.phase = JoinPhase::Registered;
                JoinAction::Done
            }
            Err(SantaError::PasswordMismatch) => {
                self.phase = JoinPhase::Rejected;
                JoinAction::Retry
            }
            Err(SantaError::DecryptionNotReady) => JoinAction::Wait,
            Err(SantaError::NoPendingJoin) => {
                self.phase = JoinPhase::NotRequested;
                JoinAction::Submit
            }
            Err(_) => JoinAction::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PENDING: JoinStatus = JoinStatus {
        has_pending: true,
        is_decrypted: false,
        is_registered: false,
    };
    const READY: JoinStatus = JoinStatus {
        has_pending: true,
        is_decrypted: true,
        is_registered: false,
    };
    const NOTHING: JoinStatus = JoinStatus {
        has_pending: false,
        is_decrypted: false,
        is_registered: false,
    };

    #[test]
    fn test_pending_join_decryption_state() {
        let mut p = PendingJoin::new("bob".into(), 1u32, 2u32);
        assert_eq!(p.decryption_state(), DecryptionState::Pending);
        p.outcome = Some(JoinOutcome::Reject);
        assert_eq!(p.decryption_state(), DecryptionState::Ready);
        assert!(p.is_decrypted());
    }

    #[test]
    fn test_happy_path() {
        let mut t = JoinTracker::new(GameId(1));
        assert_eq!(t.action(), JoinAction::Submit);
        t.on_requested().unwrap();
        assert_eq!(t.observe(PENDING), JoinAction::Wait);
        assert_eq!(t.observe(READY), JoinAction::Complete);
        assert_eq!(t.on_completed(&Ok(())), JoinAction::Done);
        assert_eq!(t.phase(), JoinPhase::Registered);
        assert_eq!(t.attempts(), 1);
    }

    #[test]
    fn test_rejection_then_retry() {
        let mut t = JoinTracker::new(GameId(1));
        t.on_requested().unwrap();
        assert_eq!(t.observe(READY), JoinAction::Complete);
        assert_eq!(t.on_completed(&Err(SantaError::PasswordMismatch)), JoinAction::Retry);
        assert_eq!(t.observe(NOTHING), JoinAction::Retry);

        t.on_requested().unwrap();
        assert_eq!(t.phase(), JoinPhase::PendingDecryption);
        assert_eq!(t.attempts(), 2);
    }

    #[test]
    fn test_double_request_rejected() {
        let mut t = JoinTracker::new(GameId(1));
        t.on_requested().unwrap();
        assert_eq!(t.on_requested(), Err(SantaError::PendingJoinExists));
    }

    #[test]
    fn test_not_ready_keeps_waiting() {
        let mut t = JoinTracker::new(GameId(1));
        t.on_requested().unwrap();
        assert_eq!(t.on_completed(&Err(SantaError::DecryptionNotReady)), JoinAction::Wait);
        assert_eq!(t.phase(), JoinPhase::PendingDecryption);
    }

    #[test]
    fn test_second_completion_is_done() {
        let mut t = JoinTracker::new(GameId(1));
        t.on_requested().unwrap();
        t.on_completed(&Ok(()));
        assert_eq!(t.on_completed(&Err(SantaError::AlreadyRegistered)), JoinAction::Done);
        assert_eq!(t.on_requested(), Err(SantaError::AlreadyRegistered));
    }

    #[test]
    fn test_resume_from_scratch() {
        // fresh tracker after a restart with a decrypted record on-ledger
        let mut t = JoinTracker::new(GameId(3));
        assert_eq!(t.observe(READY), JoinAction::Complete);
        assert_eq!(t.phase(), JoinPhase::PendingDecryption);

        let mut t = JoinTracker::new(GameId(3));
        assert_eq!(t.observe(JoinStatus::REGISTERED), JoinAction::Done);
    }

    #[test]
    fn test_vanished_record_is_rejection() {
        let mut t = JoinTracker::new(GameId(1));
        t.on_requested().unwrap();
        assert_eq!(t.observe(NOTHING), JoinAction::Retry);
        assert_eq!(t.phase(), JoinPhase::Rejected);
    }

    #[test]
    fn test_phase_errors_abort() {
        let mut t = JoinTracker::new(GameId(1));
        t.on_requested().unwrap();
        assert_eq!(t.on_completed(&Err(SantaError::NotRegistrationPhase)), JoinAction::Abort);
    }
}
