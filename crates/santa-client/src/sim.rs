//! in-memory ledger + fhe coprocessor
//!
//! runs the real lifecycle model ([`Game`]) over simulated ciphertext
//! handles. every mutation happens under one mutex, so calls are linearizable
//! like transactions on a chain. the decryption oracle is driven by an
//! [`OraclePolicy`] instead of wall-clock latency
//!
//! a password mismatch is modelled as a mined `completeJoinGame` that emits
//! `JoinRejected` and deletes the pending record

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use santa_core::{derange, Address, Game, GameId, SantaError, SeedCombiner};
use tracing::{debug, info};

use crate::fhe::{CtHash, EncryptedU32, FheClient, FheError, FheResult, Permit, PermitRequest};
use crate::ledger::{
    GameRecord, Ledger, LedgerCall, LedgerError, LedgerEvent, LedgerResult, RawJoinStatus,
    Receipt, TxHash, TxStatus,
};

/// simulated block time in seconds
const BLOCK_TIME: u64 = 12;
const GENESIS_TIME: u64 = 1_700_000_000;

/// when pending password checks get decrypted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OraclePolicy {
    /// within the requestJoin transaction
    #[default]
    Immediate,
    /// once the candidate's status has been read this many times
    AfterReads(u32),
    /// only through [`SimLedger::resolve_decryptions`]
    Manual,
}

/// plaintexts behind a join or create call, as the coprocessor saw them
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub game_id: GameId,
    pub from: Address,
    pub function: &'static str,
    pub password: u32,
    pub entropy: u32,
}

#[derive(Clone, Debug)]
struct Ciphertext {
    value: u32,
    acl: BTreeSet<Address>,
}

#[derive(Clone, Debug)]
struct SimState {
    games: Vec<Game<CtHash>>,
    cts: HashMap<CtHash, Ciphertext>,
    next_ct: u64,
    receipts: HashMap<TxHash, Receipt>,
    next_tx: u64,
    block: u64,
    now: u64,
    combiner: SeedCombiner,
    oracle: OraclePolicy,
    status_reads: HashMap<(GameId, Address), u32>,
    join_status_reads: u64,
    submissions: Vec<Submission>,
    failing_submits: VecDeque<String>,
    failing_encrypts: VecDeque<String>,
}

fn mint(
    cts: &mut HashMap<CtHash, Ciphertext>,
    next_ct: &mut u64,
    value: u32,
    acl: BTreeSet<Address>,
) -> CtHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"santa-sim-ct");
    hasher.update(&next_ct.to_le_bytes());
    *next_ct += 1;
    let ct = CtHash(*hasher.finalize().as_bytes());
    cts.insert(ct, Ciphertext { value, acl });
    ct
}

fn plaintext(cts: &HashMap<CtHash, Ciphertext>, ct: &CtHash) -> LedgerResult<u32> {
    cts.get(ct)
        .map(|c| c.value)
        .ok_or_else(|| LedgerError::reverted("InvalidCiphertext"))
}

fn input_signature(owner: &Address, ct: &CtHash) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(owner.as_bytes());
    hasher.update(&ct.0);
    hasher.finalize().as_bytes().to_vec()
}

fn permit_signature(name: &str, issuer: &Address, expiration: u64) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(issuer.as_bytes());
    hasher.update(&expiration.to_le_bytes());
    hasher.finalize().as_bytes().to_vec()
}

impl SimState {
    fn new(combiner: SeedCombiner) -> Self {
        Self {
            games: Vec::new(),
            cts: HashMap::new(),
            next_ct: 0,
            receipts: HashMap::new(),
            next_tx: 0,
            block: 0,
            now: GENESIS_TIME,
            combiner,
            oracle: OraclePolicy::default(),
            status_reads: HashMap::new(),
            join_status_reads: 0,
            submissions: Vec::new(),
            failing_submits: VecDeque::new(),
            failing_encrypts: VecDeque::new(),
        }
    }

    fn game(&self, game_id: GameId) -> LedgerResult<&Game<CtHash>> {
        usize::try_from(game_id.0)
            .ok()
            .and_then(|idx| self.games.get(idx))
            .ok_or_else(|| SantaError::GameNotFound.into())
    }

    fn game_index(&self, game_id: GameId) -> LedgerResult<usize> {
        self.game(game_id)?;
        Ok(game_id.0 as usize)
    }

    /// input must exist and belong to the sender
    fn input(&self, input: &EncryptedU32, from: &Address) -> LedgerResult<u32> {
        match self.cts.get(&input.ct_hash) {
            Some(ct)
                if ct.acl.contains(from)
                    && input.signature == input_signature(from, &input.ct_hash) =>
            {
                Ok(ct.value)
            }
            _ => Err(LedgerError::reverted("InvalidEncryptedInput")),
        }
    }

    /// oracle callback: compare guess against commitment
    fn resolve(&mut self, idx: usize, who: &Address) -> LedgerResult<()> {
        let game = &self.games[idx];
        let pending = game.pending(who).ok_or(SantaError::NoPendingJoin)?;
        let matches = match game.password_commitment() {
            None => true,
            Some(commitment) => {
                plaintext(&self.cts, commitment)? == plaintext(&self.cts, &pending.password_guess)?
            }
        };
        self.games[idx].resolve_pending(who, matches)?;
        debug!(game_id = %self.games[idx].id, %who, matches, "password check decrypted");
        Ok(())
    }

    fn complete(&mut self, idx: usize, who: &Address) -> LedgerResult<LedgerEvent> {
        let SimState {
            games,
            cts,
            next_ct,
            combiner,
            status_reads,
            ..
        } = self;
        let game = &mut games[idx];

        let folded = match game.pending(who) {
            Some(p) => Some(combiner.combine(
                plaintext(cts, game.assignment_seed())?,
                plaintext(cts, &p.entropy)?,
            )),
            None => None,
        };

        // the seed stays contract-only
        let result = game.complete_join(who, |_, _| {
            mint(cts, next_ct, folded.unwrap_or_default(), BTreeSet::new())
        });
        if game.pending(who).is_none() {
            status_reads.remove(&(game.id, *who));
        }

        match result {
            Ok(()) => Ok(LedgerEvent::PlayerJoined {
                game_id: game.id,
                player: *who,
                name: game.player_name(who).unwrap_or_default().to_string(),
            }),
            Err(SantaError::PasswordMismatch) => Ok(LedgerEvent::JoinRejected {
                game_id: game.id,
                player: *who,
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn apply(&mut self, from: Address, call: LedgerCall) -> LedgerResult<Vec<LedgerEvent>> {
        match call {
            LedgerCall::CreateGame {
                name,
                creator_name,
                entropy,
                password,
                has_password,
            } => {
                let entropy_value = self.input(&entropy, &from)?;
                let password_value = self.input(&password, &from)?;
                let game_id = GameId(self.games.len() as u64);
                let commitment = has_password.then_some(password.ct_hash);
                self.games.push(Game::new(
                    game_id,
                    from,
                    creator_name,
                    name.clone(),
                    self.now,
                    entropy.ct_hash,
                    commitment,
                ));
                self.submissions.push(Submission {
                    game_id,
                    from,
                    function: "createGame",
                    password: password_value,
                    entropy: entropy_value,
                });
                info!(%game_id, creator = %from, has_password, "sim: game created");
                Ok(vec![LedgerEvent::GameCreated {
                    game_id,
                    creator: from,
                    name,
                    has_password,
                }])
            }

            LedgerCall::RequestJoin {
                game_id,
                name,
                password,
                entropy,
            } => {
                let idx = self.game_index(game_id)?;
                let password_value = self.input(&password, &from)?;
                let entropy_value = self.input(&entropy, &from)?;
                self.games[idx].request_join(from, name, password.ct_hash, entropy.ct_hash)?;
                self.status_reads.remove(&(game_id, from));
                self.submissions.push(Submission {
                    game_id,
                    from,
                    function: "requestJoinGame",
                    password: password_value,
                    entropy: entropy_value,
                });

                let mut events = vec![LedgerEvent::JoinRequested {
                    game_id,
                    player: from,
                }];
                if !self.games[idx].has_password() {
                    // nothing to decrypt, join lands in the same transaction
                    self.resolve(idx, &from)?;
                    events.push(self.complete(idx, &from)?);
                } else if self.oracle == OraclePolicy::Immediate {
                    self.resolve(idx, &from)?;
                }
                Ok(events)
            }

            LedgerCall::CompleteJoin { game_id } => {
                let idx = self.game_index(game_id)?;
                Ok(vec![self.complete(idx, &from)?])
            }

            LedgerCall::Finalize { game_id } => {
                let idx = self.game_index(game_id)?;
                let SimState {
                    games, cts, next_ct, ..
                } = self;
                let game = &mut games[idx];
                let givers: Vec<Address> = game.participants().iter().map(|p| p.address).collect();
                let seed = plaintext(cts, game.assignment_seed())?;

                game.finalize(&from, |_, n| {
                    let perm = derange(seed, n)?;
                    // giver i alone may read slot i until reveal
                    Ok(perm
                        .into_iter()
                        .zip(&givers)
                        .map(|(target, giver)| {
                            mint(cts, next_ct, target as u32, BTreeSet::from([*giver]))
                        })
                        .collect())
                })?;
                info!(%game_id, players = givers.len(), "sim: game finalized");
                Ok(vec![LedgerEvent::GameFinalized { game_id }])
            }

            LedgerCall::Reveal { game_id } => {
                let idx = self.game_index(game_id)?;
                self.games[idx].reveal(&from)?;
                let game = &self.games[idx];
                let everyone: Vec<Address> = game.participants().iter().map(|p| p.address).collect();
                for ct in game.assignments() {
                    if let Some(entry) = self.cts.get_mut(ct) {
                        entry.acl.extend(everyone.iter().copied());
                    }
                }
                info!(%game_id, "sim: game revealed");
                Ok(vec![LedgerEvent::GameRevealed { game_id }])
            }
        }
    }

    fn mine(&mut self, events: Vec<LedgerEvent>) -> TxHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"santa-sim-tx");
        hasher.update(&self.next_tx.to_le_bytes());
        self.next_tx += 1;
        let tx_hash = TxHash(*hasher.finalize().as_bytes());

        self.block += 1;
        self.now += BLOCK_TIME;
        self.receipts.insert(
            tx_hash,
            Receipt {
                tx_hash,
                block_number: self.block,
                status: TxStatus::Success,
                events,
            },
        );
        tx_hash
    }
}

/// shared simulated chain. clones see the same state
#[derive(Clone)]
pub struct SimLedger {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimLedger {
    fn default() -> Self {
        Self::new(SeedCombiner::default())
    }
}

impl SimLedger {
    pub fn new(combiner: SeedCombiner) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new(combiner))),
        }
    }

    pub fn with_oracle(self, oracle: OraclePolicy) -> Self {
        self.set_oracle(oracle);
        self
    }

    pub fn set_oracle(&self, oracle: OraclePolicy) {
        self.state.lock().oracle = oracle;
    }

    /// coprocessor handle for one account
    pub fn fhe(&self) -> SimFhe {
        SimFhe {
            state: self.state.clone(),
            account: Mutex::new(None),
        }
    }

    /// decrypt every outstanding password check, returns how many
    pub fn resolve_decryptions(&self) -> usize {
        let mut state = self.state.lock();
        let mut todo = Vec::new();
        for (idx, game) in state.games.iter().enumerate() {
            todo.extend(game.undecided().map(|(who, _)| (idx, *who)));
        }
        todo.into_iter()
            .filter(|(idx, who)| state.resolve(*idx, who).is_ok())
            .count()
    }

    /// next submit fails with a transport error and changes nothing
    pub fn fail_next_submit(&self, message: impl Into<String>) {
        self.state.lock().failing_submits.push_back(message.into());
    }

    pub fn fail_next_encrypt(&self, message: impl Into<String>) {
        self.state.lock().failing_encrypts.push_back(message.into());
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().submissions.clone()
    }

    /// full game record, including encrypted fields
    pub fn game(&self, game_id: GameId) -> Option<Game<CtHash>> {
        self.state.lock().game(game_id).ok().cloned()
    }

    /// coprocessor-side plaintext, ignores access control
    pub fn plaintext(&self, ct: &CtHash) -> Option<u32> {
        plaintext(&self.state.lock().cts, ct).ok()
    }

    pub fn seed(&self, game_id: GameId) -> Option<u32> {
        let state = self.state.lock();
        let game = state.game(game_id).ok()?;
        plaintext(&state.cts, game.assignment_seed()).ok()
    }

    /// plaintext target index per giver, once finalized
    pub fn assignment(&self, game_id: GameId) -> Option<Vec<usize>> {
        let state = self.state.lock();
        let game = state.game(game_id).ok()?;
        if game.assignments().is_empty() {
            return None;
        }
        game.assignments()
            .iter()
            .map(|ct| plaintext(&state.cts, ct).ok().map(|v| v as usize))
            .collect()
    }

    pub fn block_number(&self) -> u64 {
        self.state.lock().block
    }

    /// `getJoinStatus` calls served so far
    pub fn join_status_reads(&self) -> u64 {
        self.state.lock().join_status_reads
    }
}

#[async_trait]
impl Ledger for SimLedger {
    async fn get_game(&self, game_id: GameId) -> LedgerResult<GameRecord> {
        let state = self.state.lock();
        Ok(GameRecord::from(&state.game(game_id)?.info()))
    }

    async fn get_participants(&self, game_id: GameId) -> LedgerResult<Vec<Address>> {
        let state = self.state.lock();
        Ok(state
            .game(game_id)?
            .participants()
            .iter()
            .map(|p| p.address)
            .collect())
    }

    async fn get_participant_count(&self, game_id: GameId) -> LedgerResult<u64> {
        Ok(self.state.lock().game(game_id)?.player_count() as u64)
    }

    async fn get_participant_names(&self, game_id: GameId) -> LedgerResult<Vec<String>> {
        let state = self.state.lock();
        Ok(state
            .game(game_id)?
            .participants()
            .iter()
            .map(|p| p.name.clone())
            .collect())
    }

    async fn get_player_name(&self, game_id: GameId, player: Address) -> LedgerResult<String> {
        let state = self.state.lock();
        Ok(state
            .game(game_id)?
            .player_name(&player)
            .unwrap_or_default()
            .to_string())
    }

    async fn get_join_status(
        &self,
        game_id: GameId,
        player: Address,
    ) -> LedgerResult<RawJoinStatus> {
        let mut state = self.state.lock();
        state.join_status_reads += 1;
        let idx = state.game_index(game_id)?;

        let undecided = state.games[idx]
            .pending(&player)
            .is_some_and(|p| !p.is_decrypted());
        if let (OraclePolicy::AfterReads(reads), true) = (state.oracle, undecided) {
            // only reads of the live request count towards decryption
            let seen = state.status_reads.entry((game_id, player)).or_insert(0);
            *seen += 1;
            if *seen >= reads {
                state.resolve(idx, &player)?;
            }
        }

        let status = state.games[idx].join_status(&player);
        Ok((status.has_pending, status.is_decrypted, status.is_registered))
    }

    async fn is_registered(&self, game_id: GameId, player: Address) -> LedgerResult<bool> {
        Ok(self.state.lock().game(game_id)?.is_registered(&player))
    }

    async fn get_my_target(&self, game_id: GameId, caller: Address) -> LedgerResult<CtHash> {
        Ok(*self.state.lock().game(game_id)?.target_of(&caller)?)
    }

    async fn get_games_by_player(&self, player: Address) -> LedgerResult<Vec<u64>> {
        Ok(self
            .state
            .lock()
            .games
            .iter()
            .filter(|g| g.is_registered(&player))
            .map(|g| g.id.0)
            .collect())
    }

    async fn get_games_by_creator(&self, creator: Address) -> LedgerResult<Vec<u64>> {
        Ok(self
            .state
            .lock()
            .games
            .iter()
            .filter(|g| g.creator == creator)
            .map(|g| g.id.0)
            .collect())
    }

    async fn game_count(&self) -> LedgerResult<u64> {
        Ok(self.state.lock().games.len() as u64)
    }

    async fn simulate(&self, from: Address, call: &LedgerCall) -> LedgerResult<()> {
        let mut scratch = self.state.lock().clone();
        scratch.apply(from, call.clone()).map(|_| ())
    }

    async fn submit(&self, from: Address, call: LedgerCall) -> LedgerResult<TxHash> {
        let mut state = self.state.lock();
        if let Some(message) = state.failing_submits.pop_front() {
            return Err(LedgerError::Transport(message));
        }
        let function = call.function_name();
        // a reverting call never gets mined, state is untouched
        let mut next = state.clone();
        let events = next.apply(from, call)?;
        *state = next;
        let tx = state.mine(events);
        debug!(%tx, function, %from, block = state.block, "sim: mined");
        Ok(tx)
    }

    async fn wait_for_receipt(&self, tx: TxHash) -> LedgerResult<Receipt> {
        self.state
            .lock()
            .receipts
            .get(&tx)
            .cloned()
            .ok_or(LedgerError::UnknownTransaction(tx))
    }
}

/// per-account coprocessor view of a [`SimLedger`]
pub struct SimFhe {
    state: Arc<Mutex<SimState>>,
    account: Mutex<Option<Address>>,
}

impl SimFhe {
    fn account(&self) -> FheResult<Address> {
        (*self.account.lock()).ok_or(FheError::NotInitialized)
    }
}

#[async_trait]
impl FheClient for SimFhe {
    async fn init(&self, account: Address) -> FheResult<()> {
        *self.account.lock() = Some(account);
        Ok(())
    }

    async fn encrypt(&self, values: &[u32]) -> FheResult<Vec<EncryptedU32>> {
        let account = self.account()?;
        let mut state = self.state.lock();
        if let Some(message) = state.failing_encrypts.pop_front() {
            return Err(FheError::Encrypt(message));
        }
        let SimState { cts, next_ct, .. } = &mut *state;
        Ok(values
            .iter()
            .map(|&value| {
                let ct_hash = mint(cts, next_ct, value, BTreeSet::from([account]));
                EncryptedU32 {
                    ct_hash,
                    security_zone: 0,
                    signature: input_signature(&account, &ct_hash),
                }
            })
            .collect())
    }

    async fn create_permit(&self, request: PermitRequest) -> FheResult<Permit> {
        let account = self.account()?;
        if request.issuer != account {
            return Err(FheError::Permit(format!(
                "issuer {} is not the initialized account",
                request.issuer
            )));
        }
        Ok(Permit {
            signature: permit_signature(&request.name, &request.issuer, request.expiration),
            name: request.name,
            issuer: request.issuer,
            expiration: request.expiration,
        })
    }

    async fn unseal(&self, ct: CtHash, permit: &Permit) -> FheResult<u32> {
        let account = self.account()?;
        if permit.issuer != account
            || permit.signature != permit_signature(&permit.name, &permit.issuer, permit.expiration)
        {
            return Err(FheError::Permit("invalid permit signature".into()));
        }
        let state = self.state.lock();
        let entry = state
            .cts
            .get(&ct)
            .ok_or_else(|| FheError::Unseal(format!("unknown ciphertext {}", ct)))?;
        if !entry.acl.contains(&permit.issuer) {
            return Err(FheError::AccessDenied(ct));
        }
        Ok(entry.value)
    }
}
