//! game lifecycle state machine
//!
//! `Registration -> Active -> Revealed`. the ledger enforces these rules; the
//! same model backs the simulator and lets callers reason about guards
//! without a network round trip.
//!
//! `C` is the ledger's handle for an encrypted u32. the model never looks
//! inside it: homomorphic work (seed folding, assignment) is passed in as
//! closures by whoever holds the cryptosystem

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::derange::MIN_PLAYERS;
use crate::error::{Result, SantaError};
use crate::join::{JoinOutcome, PendingJoin};
use crate::types::{Address, GameId, GameInfo, GameState, JoinStatus, Participant};

/// full game record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game<C> {
    pub id: GameId,
    pub creator: Address,
    pub name: String,
    pub created_at: u64,
    state: GameState,
    participants: Vec<Participant>,
    password_commitment: Option<C>,
    assignment_seed: C,
    /// encrypted target index per participant, empty during registration
    assignments: Vec<C>,
    pending: BTreeMap<Address, PendingJoin<C>>,
}

impl<C> Game<C> {
    /// new game with the creator as first participant
    pub fn new(
        id: GameId,
        creator: Address,
        creator_name: String,
        name: String,
        created_at: u64,
        creator_entropy: C,
        password_commitment: Option<C>,
    ) -> Self {
        Self {
            id,
            creator,
            name,
            created_at,
            state: GameState::Registration,
            participants: vec![Participant {
                address: creator,
                name: creator_name,
            }],
            password_commitment,
            assignment_seed: creator_entropy,
            assignments: Vec::new(),
            pending: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn has_password(&self) -> bool {
        self.password_commitment.is_some()
    }

    pub fn password_commitment(&self) -> Option<&C> {
        self.password_commitment.as_ref()
    }

    pub fn assignment_seed(&self) -> &C {
        &self.assignment_seed
    }

    pub fn assignments(&self) -> &[C] {
        &self.assignments
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn player_count(&self) -> usize {
        self.participants.len()
    }

    pub fn participant_index(&self, who: &Address) -> Option<usize> {
        self.participants.iter().position(|p| &p.address == who)
    }

    pub fn is_registered(&self, who: &Address) -> bool {
        self.participant_index(who).is_some()
    }

    pub fn player_name(&self, who: &Address) -> Option<&str> {
        self.participants
            .iter()
            .find(|p| &p.address == who)
            .map(|p| p.name.as_str())
    }

    pub fn pending(&self, who: &Address) -> Option<&PendingJoin<C>> {
        self.pending.get(who)
    }

    /// candidates whose password check has not resolved yet
    pub fn undecided(&self) -> impl Iterator<Item = (&Address, &PendingJoin<C>)> {
        self.pending.iter().filter(|(_, p)| !p.is_decrypted())
    }

    pub fn info(&self) -> GameInfo {
        GameInfo {
            game_id: self.id,
            creator: self.creator,
            name: self.name.clone(),
            created_at: self.created_at,
            state: self.state,
            player_count: self.participants.len() as u64,
            has_password: self.has_password(),
        }
    }

    pub fn join_status(&self, who: &Address) -> JoinStatus {
        let pending = self.pending.get(who);
        JoinStatus {
            has_pending: pending.is_some(),
            is_decrypted: pending.is_some_and(|p| p.is_decrypted()),
            is_registered: self.is_registered(who),
        }
    }

    /// record a join request. the password check is resolved later through
    /// [`resolve_pending`](Self::resolve_pending)
    pub fn request_join(
        &mut self,
        who: Address,
        name: String,
        password_guess: C,
        entropy: C,
    ) -> Result<()> {
        if self.state != GameState::Registration {
            return Err(SantaError::NotRegistrationPhase);
        }
        if self.is_registered(&who) {
            return Err(SantaError::AlreadyRegistered);
        }
        if self.pending.contains_key(&who) {
            return Err(SantaError::PendingJoinExists);
        }

        self.pending
            .insert(who, PendingJoin::new(name, password_guess, entropy));
        Ok(())
    }

    /// decryption oracle callback. idempotent once resolved
    pub fn resolve_pending(&mut self, who: &Address, matches: bool) -> Result<()> {
        let pending = self.pending.get_mut(who).ok_or(SantaError::NoPendingJoin)?;
        if pending.outcome.is_none() {
            pending.outcome = Some(if matches {
                JoinOutcome::Admit
            } else {
                JoinOutcome::Reject
            });
        }
        Ok(())
    }

    /// finish a resolved join. on admission `fold(seed, entropy)` produces the
    /// new encrypted seed. a rejection still deletes the pending record and
    /// reports [`SantaError::PasswordMismatch`]
    pub fn complete_join<F>(&mut self, who: &Address, fold: F) -> Result<()>
    where
        F: FnOnce(&C, &C) -> C,
    {
        if self.state != GameState::Registration {
            return Err(SantaError::NotRegistrationPhase);
        }
        if self.is_registered(who) {
            return Err(SantaError::AlreadyRegistered);
        }

        let outcome = {
            let pending = self.pending.get(who).ok_or(SantaError::NoPendingJoin)?;
            pending.outcome.ok_or(SantaError::DecryptionNotReady)?
        };

        // ready either way, so the record goes
        let pending = self.pending.remove(who).ok_or(SantaError::NoPendingJoin)?;

        match outcome {
            JoinOutcome::Reject => Err(SantaError::PasswordMismatch),
            JoinOutcome::Admit => {
                self.assignment_seed = fold(&self.assignment_seed, &pending.entropy);
                self.participants.push(Participant {
                    address: *who,
                    name: pending.name,
                });
                Ok(())
            }
        }
    }

    /// freeze participants and seed, compute assignments with
    /// `assign(seed, player_count)`
    pub fn finalize<F>(&mut self, caller: &Address, assign: F) -> Result<()>
    where
        F: FnOnce(&C, usize) -> Result<Vec<C>>,
    {
        if caller != &self.creator {
            return Err(SantaError::NotCreator);
        }
        if self.state != GameState::Registration {
            return Err(SantaError::NotRegistrationPhase);
        }
        let n = self.participants.len();
        if n < MIN_PLAYERS {
            return Err(SantaError::NeedAtLeast3Players);
        }

        let assignments = assign(&self.assignment_seed, n)?;
        if assignments.len() != n {
            return Err(SantaError::InvalidParticipantCount {
                n: assignments.len(),
            });
        }

        self.assignments = assignments;
        self.advance();
        Ok(())
    }

    /// open every assignment to every participant
    pub fn reveal(&mut self, caller: &Address) -> Result<()> {
        if caller != &self.creator {
            return Err(SantaError::NotCreator);
        }
        if self.state != GameState::Active {
            return Err(SantaError::NotActive);
        }
        self.advance();
        Ok(())
    }

    /// one step along `Registration -> Active -> Revealed`
    fn advance(&mut self) {
        if let Some(next) = self.state.next() {
            self.state = next;
        }
    }

    /// caller's own encrypted target index
    pub fn target_of(&self, caller: &Address) -> Result<&C> {
        let idx = self
            .participant_index(caller)
            .ok_or(SantaError::NotRegistered)?;
        if self.state == GameState::Registration {
            return Err(SantaError::GameNotStarted);
        }
        self.assignments.get(idx).ok_or(SantaError::GameNotStarted)
    }

    /// may `viewer` decrypt the assignment of participant `giver`
    pub fn may_decrypt(&self, viewer: &Address, giver: usize) -> bool {
        if giver >= self.assignments.len() {
            return false;
        }
        match self.state {
            GameState::Registration => false,
            GameState::Active => self.participant_index(viewer) == Some(giver),
            GameState::Revealed => self.is_registered(viewer),
        }
    }
}
