//! secret santa client
//!
//! orchestrates ledger calls, encryption, join polling and unsealing for one
//! account. session state is explicit: [`SantaClient::init`] binds the
//! account, [`SantaClient::teardown`] forgets it along with its permit

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use santa_core::{
    generate_entropy, has_password, password_value, Address, GameId, GameInfo, GameState,
    JoinPhase, JoinStatus, Participant, SantaError,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{GameCache, MemoryGameCache, StoredGame};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::fhe::{CtHash, EncryptedU32, FheClient, Permit, PermitRequest};
use crate::ledger::{join_status, Ledger, LedgerCall, Receipt, TxHash};
use crate::poll::{JoinPoller, PollCancel, PollOutcome};

/// per-account session
#[derive(Clone, Debug, Default)]
struct Session {
    account: Option<Address>,
    permit: Option<Permit>,
}

/// accepted join request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinTicket {
    pub game_id: GameId,
    pub tx_hash: TxHash,
    pub has_password: bool,
    /// public games register within the request itself
    pub registered: bool,
}

impl JoinTicket {
    pub fn phase(&self) -> JoinPhase {
        if self.registered {
            JoinPhase::Registered
        } else {
            JoinPhase::PendingDecryption
        }
    }
}

/// client for one account against one ledger + coprocessor
pub struct SantaClient<L, F> {
    config: ClientConfig,
    ledger: L,
    fhe: F,
    cache: Arc<dyn GameCache>,
    session: Arc<RwLock<Session>>,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// game id as typed by a user, e.g. from a share link
pub fn parse_game_id(input: &str) -> Result<GameId> {
    Ok(input.parse::<GameId>()?)
}

/// zip the two participant lists, which the ledger returns separately
fn pair_participants(addresses: Vec<Address>, names: Vec<String>) -> Result<Vec<Participant>> {
    if addresses.len() != names.len() {
        return Err(ClientError::Decoding(format!(
            "{} participants but {} names",
            addresses.len(),
            names.len()
        )));
    }
    Ok(addresses
        .into_iter()
        .zip(names)
        .map(|(address, name)| Participant { address, name })
        .collect())
}

/// trimmed, non-empty
fn validate_name(field: &'static str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ClientError::EmptyName(field));
    }
    Ok(value.to_string())
}

impl<L: Ledger, F: FheClient> SantaClient<L, F> {
    pub fn new(config: ClientConfig, ledger: L, fhe: F) -> Self {
        Self {
            config,
            ledger,
            fhe,
            cache: Arc::new(MemoryGameCache::new()),
            session: Arc::new(RwLock::new(Session::default())),
        }
    }

    /// share a cache between clients
    pub fn with_cache(mut self, cache: Arc<dyn GameCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn fhe(&self) -> &F {
        &self.fhe
    }

    pub fn cache(&self) -> &Arc<dyn GameCache> {
        &self.cache
    }

    // === session ===

    /// bind the fhe client to `account`. switching accounts drops the permit
    pub async fn init(&self, account: Address) -> Result<()> {
        self.fhe.init(account).await?;

        let mut session = self.session.write().await;
        if session.account != Some(account) {
            session.permit = None;
        }
        session.account = Some(account);
        info!(%account, chain = %self.config.chain.name, "fhe client initialized");
        Ok(())
    }

    pub async fn teardown(&self) {
        let mut session = self.session.write().await;
        if let Some(account) = session.account.take() {
            debug!(%account, "session closed");
        }
        session.permit = None;
    }

    pub async fn is_initialized(&self) -> bool {
        self.session.read().await.account.is_some()
    }

    pub async fn account(&self) -> Result<Address> {
        self.session
            .read()
            .await
            .account
            .ok_or(ClientError::NotInitialized)
    }

    // === permits ===

    /// issue a self permit valid for `permit_validity_days`
    pub async fn create_permit(&self) -> Result<Permit> {
        let issuer = self.account().await?;
        let expiration = now_secs().saturating_add(self.config.permit_validity().as_secs());
        let permit = self
            .fhe
            .create_permit(PermitRequest {
                name: self.config.permit_name.clone(),
                issuer,
                expiration,
            })
            .await?;

        self.session.write().await.permit = Some(permit.clone());
        info!(%issuer, expiration, "permit created");
        Ok(permit)
    }

    pub async fn remove_permit(&self) -> bool {
        self.session.write().await.permit.take().is_some()
    }

    pub async fn has_valid_permit(&self) -> bool {
        self.active_permit().await.is_ok()
    }

    /// current permit, if present and unexpired
    pub async fn active_permit(&self) -> Result<Permit> {
        let permit = self
            .session
            .read()
            .await
            .permit
            .clone()
            .ok_or(ClientError::PermitMissing)?;
        if permit.is_expired(now_secs()) {
            return Err(ClientError::PermitExpired {
                expiration: permit.expiration,
            });
        }
        Ok(permit)
    }

    // === writes ===

    /// create a game with the caller as first participant
    pub async fn create_game(
        &self,
        name: &str,
        creator_name: &str,
        password: Option<&str>,
    ) -> Result<GameId> {
        let name = validate_name("game name", name)?;
        let creator_name = validate_name("your name", creator_name)?;
        let from = self.account().await?;

        let protected = has_password(password);
        let (entropy, password_ct) = self
            .encrypt_pair(generate_entropy(), password_value(password))
            .await?;

        let receipt = self
            .send(
                from,
                LedgerCall::CreateGame {
                    name,
                    creator_name,
                    entropy,
                    password: password_ct,
                    has_password: protected,
                },
            )
            .await?;

        let game_id = match receipt.created_game() {
            Some(id) => id,
            None => {
                // no event decoded, newest game is ours
                let count = self.ledger.game_count().await?;
                let last = count
                    .checked_sub(1)
                    .ok_or_else(|| ClientError::Decoding("no games after createGame".into()))?;
                GameId(last)
            }
        };

        info!(%game_id, creator = %from, protected, "game created");
        self.remember(game_id).await;
        Ok(game_id)
    }

    /// submit a join request. public games register immediately, password
    /// games wait on the decryption oracle
    pub async fn request_join(
        &self,
        game_id: GameId,
        name: &str,
        password: Option<&str>,
    ) -> Result<JoinTicket> {
        let name = validate_name("your name", name)?;
        let from = self.account().await?;

        let info = self.get_game(game_id).await?;
        if info.state != GameState::Registration {
            return Err(SantaError::NotRegistrationPhase.into());
        }
        let status = self.join_status_of(game_id, from).await?;
        if status.is_registered {
            return Err(SantaError::AlreadyRegistered.into());
        }
        if status.has_pending {
            return Err(SantaError::PendingJoinExists.into());
        }

        let (password_ct, entropy) = self
            .encrypt_pair(password_value(password), generate_entropy())
            .await?;

        let receipt = self
            .send(
                from,
                LedgerCall::RequestJoin {
                    game_id,
                    name,
                    password: password_ct,
                    entropy,
                },
            )
            .await?;

        let registered = receipt.joined(&from);
        info!(%game_id, player = %from, has_password = info.has_password, registered, "join requested");
        if registered {
            self.remember_info(&info);
        }

        Ok(JoinTicket {
            game_id,
            tx_hash: receipt.tx_hash,
            has_password: info.has_password,
            registered,
        })
    }

    /// finish a decrypted join request
    pub async fn complete_join(&self, game_id: GameId) -> Result<TxHash> {
        let from = self.account().await?;

        let status = self.join_status_of(game_id, from).await?;
        if status.is_registered {
            return Err(SantaError::AlreadyRegistered.into());
        }
        if !status.has_pending {
            return Err(SantaError::NoPendingJoin.into());
        }
        if !status.is_decrypted {
            return Err(SantaError::DecryptionNotReady.into());
        }

        let sent = self.send(from, LedgerCall::CompleteJoin { game_id }).await;
        // a mismatch shows up as a JoinRejected event or as an InvalidPassword revert
        let mismatch = match &sent {
            Ok(receipt) => receipt.rejected(&from),
            Err(e) => e.protocol() == Some(&SantaError::PasswordMismatch),
        };
        if mismatch {
            self.confirm_rejection(game_id, from).await;
            return Err(SantaError::PasswordMismatch.into());
        }
        let receipt = sent?;

        info!(%game_id, player = %from, "joined game");
        self.remember(game_id).await;
        Ok(receipt.tx_hash)
    }

    /// poll until the pending join resolves, then complete it
    ///
    /// returns `PendingDecryption` if cancelled; the ledger record stays and
    /// a later call picks up where this one left off
    pub async fn wait_for_join(&self, game_id: GameId, cancel: &PollCancel) -> Result<JoinPhase> {
        let from = self.account().await?;
        let poller = JoinPoller::from_config(&self.config);

        let outcome = poller
            .run(game_id, || self.join_status_of(game_id, from), cancel)
            .await;
        debug!(%game_id, ?outcome, "join polling finished");

        match outcome {
            PollOutcome::Registered => {
                self.remember(game_id).await;
                Ok(JoinPhase::Registered)
            }
            PollOutcome::Ready(_) => {
                self.complete_join(game_id).await?;
                Ok(JoinPhase::Registered)
            }
            PollOutcome::NoPending => Err(SantaError::NoPendingJoin.into()),
            PollOutcome::Cancelled => Ok(JoinPhase::PendingDecryption),
            PollOutcome::TimedOut => Err(ClientError::Timeout(format!(
                "password check of game {}",
                game_id
            ))),
        }
    }

    /// request + wait + complete
    pub async fn join_game(
        &self,
        game_id: GameId,
        name: &str,
        password: Option<&str>,
        cancel: &PollCancel,
    ) -> Result<JoinPhase> {
        let ticket = self.request_join(game_id, name, password).await?;
        if ticket.registered {
            return Ok(JoinPhase::Registered);
        }
        self.wait_for_join(game_id, cancel).await
    }

    /// freeze participants and compute assignments. creator only
    pub async fn finalize_game(&self, game_id: GameId) -> Result<TxHash> {
        let from = self.account().await?;
        let call = LedgerCall::Finalize { game_id };

        // surface guard violations without paying for a failed transaction
        self.ledger.simulate(from, &call).await?;
        let receipt = self.send(from, call).await?;

        info!(%game_id, "game finalized");
        Ok(receipt.tx_hash)
    }

    /// open every assignment to every participant. creator only
    pub async fn reveal_game(&self, game_id: GameId) -> Result<TxHash> {
        let from = self.account().await?;
        let receipt = self.send(from, LedgerCall::Reveal { game_id }).await?;
        info!(%game_id, "game revealed");
        Ok(receipt.tx_hash)
    }

    // === assignments ===

    pub async fn get_my_target(&self, game_id: GameId) -> Result<CtHash> {
        let from = self.account().await?;
        Ok(self.ledger.get_my_target(game_id, from).await?)
    }

    /// decrypt a ciphertext with the active permit
    pub async fn unseal_target(&self, ct: CtHash) -> Result<u32> {
        self.account().await?;
        let permit = self.active_permit().await?;
        Ok(self.fhe.unseal(ct, &permit).await?)
    }

    /// who the caller gives a gift to
    pub async fn my_assignment(&self, game_id: GameId) -> Result<Participant> {
        self.account().await?;
        let permit = self.active_permit().await?;

        let ct = self.get_my_target(game_id).await?;
        let index = self.fhe.unseal(ct, &permit).await? as usize;
        let participants = self.participants_with_names(game_id).await?;

        participants.into_iter().nth(index).ok_or_else(|| {
            ClientError::Decoding(format!("target index {} out of range", index))
        })
    }

    // === reads ===

    pub async fn get_game(&self, game_id: GameId) -> Result<GameInfo> {
        let record = self.ledger.get_game(game_id).await?;
        Ok(GameInfo::try_from(record)?)
    }

    pub async fn poll_join_status(&self, game_id: GameId) -> Result<JoinStatus> {
        let from = self.account().await?;
        self.join_status_of(game_id, from).await
    }

    pub async fn join_status_of(&self, game_id: GameId, player: Address) -> Result<JoinStatus> {
        let raw = self.ledger.get_join_status(game_id, player).await?;
        Ok(join_status(raw))
    }

    pub async fn participants_with_names(&self, game_id: GameId) -> Result<Vec<Participant>> {
        let (addresses, names) = futures::try_join!(
            self.ledger.get_participants(game_id),
            self.ledger.get_participant_names(game_id),
        )?;
        pair_participants(addresses, names)
    }

    pub async fn player_name(&self, game_id: GameId, player: Address) -> Result<String> {
        Ok(self.ledger.get_player_name(game_id, player).await?)
    }

    pub async fn is_registered(&self, game_id: GameId, player: Address) -> Result<bool> {
        Ok(self.ledger.is_registered(game_id, player).await?)
    }

    pub async fn participant_count(&self, game_id: GameId) -> Result<u64> {
        Ok(self.ledger.get_participant_count(game_id).await?)
    }

    pub async fn game_count(&self) -> Result<u64> {
        Ok(self.ledger.game_count().await?)
    }

    /// games the account participates in. unreadable games are skipped
    pub async fn my_games(&self) -> Result<Vec<GameInfo>> {
        let from = self.account().await?;
        let ids = self.ledger.get_games_by_player(from).await?;

        let results =
            futures::future::join_all(ids.iter().map(|&id| self.get_game(GameId(id)))).await;

        let mut games = Vec::with_capacity(ids.len());
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(info) => games.push(info),
                Err(e) => debug!(game_id = id, "skipping game: {}", e),
            }
        }
        Ok(games)
    }

    /// games created by the account
    pub async fn created_games(&self) -> Result<Vec<GameId>> {
        let from = self.account().await?;
        let ids = self.ledger.get_games_by_creator(from).await?;
        Ok(ids.into_iter().map(GameId).collect())
    }

    /// locally cached games on the configured chain
    pub fn cached_games(&self) -> Vec<StoredGame> {
        self.cache.games_by_chain(self.config.chain.chain_id)
    }

    pub fn tx_url(&self, tx: &TxHash) -> Option<String> {
        self.config.chain.tx_url(&tx.to_string())
    }

    // === internals ===

    async fn encrypt_pair(&self, first: u32, second: u32) -> Result<(EncryptedU32, EncryptedU32)> {
        let encrypted = self.fhe.encrypt(&[first, second]).await?;
        match <[EncryptedU32; 2]>::try_from(encrypted) {
            Ok([a, b]) => Ok((a, b)),
            Err(got) => Err(ClientError::EncryptionFailed(format!(
                "expected 2 ciphertexts, got {}",
                got.len()
            ))),
        }
    }

    /// submit and wait for the receipt. only a successful receipt is durable
    async fn send(&self, from: Address, call: LedgerCall) -> Result<Receipt> {
        let function = call.function_name();
        let tx = self.ledger.submit(from, call).await?;
        debug!(%tx, function, "transaction submitted");

        let receipt = self.ledger.wait_for_receipt(tx).await?;
        if !receipt.is_success() {
            return Err(ClientError::TransactionFailed(format!(
                "{} reverted in {}",
                function, tx
            )));
        }
        debug!(%tx, block = receipt.block_number, "transaction confirmed");
        Ok(receipt)
    }

    /// best-effort cache update, never fails the caller
    /// re-read the ledger instead of assuming the pending record is gone
    async fn confirm_rejection(&self, game_id: GameId, from: Address) {
        match self.join_status_of(game_id, from).await {
            Ok(after) => {
                warn!(%game_id, player = %from, cleared = !after.has_pending, "password mismatch")
            }
            Err(e) => warn!(%game_id, player = %from, "password mismatch, status unknown: {}", e),
        }
    }

    async fn remember(&self, game_id: GameId) {
        match self.get_game(game_id).await {
            Ok(info) => self.remember_info(&info),
            Err(e) => warn!(%game_id, "failed to cache game: {}", e),
        }
    }

    fn remember_info(&self, info: &GameInfo) {
        let stored = StoredGame::from_info(info, self.config.chain.chain_id, now_secs());
        if self.cache.add(stored) {
            debug!(game_id = %info.game_id, "game cached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("game name", "  Party "), Ok("Party".to_string()));
        assert_eq!(
            validate_name("game name", "   "),
            Err(ClientError::EmptyName("game name"))
        );
    }

    #[test]
    fn test_parse_game_id() {
        assert_eq!(parse_game_id(" 7 "), Ok(GameId(7)));
        let err = parse_game_id("seven").unwrap_err();
        assert!(matches!(err, ClientError::MalformedGameId(_)));
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[test]
    fn test_pair_participants() {
        let a = Address::from_raw([1; 20]);
        let b = Address::from_raw([2; 20]);
        let pairs = pair_participants(vec![a, b], vec!["Alice".into(), "Bob".into()]).unwrap();
        assert_eq!(pairs[1].address, b);
        assert_eq!(pairs[1].name, "Bob");

        let err = pair_participants(vec![a, b], vec!["Alice".into()]).unwrap_err();
        assert!(matches!(err, ClientError::Decoding(_)));
        assert!(pair_participants(vec![a], vec!["Alice".into(), "Bob".into()]).is_err());
    }

    #[test]
    fn test_ticket_phase() {
        let ticket = JoinTicket {
            game_id: GameId(1),
            tx_hash: TxHash::default(),
            has_password: true,
            registered: false,
        };
        assert_eq!(ticket.phase(), JoinPhase::PendingDecryption);
    }
}
