//! end-to-end game scenarios against the in-memory ledger

use std::collections::BTreeSet;

use santa_client::{
    parse_game_id, ClientConfig, ClientError, ErrorKind, GameCache, SantaClient, SimFhe,
    SimLedger,
};
use santa_core::{
    hash_password, is_derangement, verify_assignment, Address, GameId, GameState, SantaError,
    NO_PASSWORD,
};

type Client = SantaClient<SimLedger, SimFhe>;

fn addr(b: u8) -> Address {
    Address::from_raw([b; 20])
}

async fn player(sim: &SimLedger, b: u8) -> Client {
    let client = SantaClient::new(ClientConfig::local(), sim.clone(), sim.fhe());
    client.init(addr(b)).await.unwrap();
    client
}

/// alice creates, bob and carol join a public game
async fn public_game(sim: &SimLedger) -> (GameId, Vec<Client>) {
    let alice = player(sim, 1).await;
    let bob = player(sim, 2).await;
    let carol = player(sim, 3).await;

    let id = alice.create_game("Office Party", "Alice", None).await.unwrap();
    for (client, name) in [(&bob, "Bob"), (&carol, "Carol")] {
        let ticket = client.request_join(id, name, None).await.unwrap();
        assert!(ticket.registered);
    }
    (id, vec![alice, bob, carol])
}

#[tokio::test]
async fn test_public_game_happy_path() {
    let sim = SimLedger::default();
    let (id, players) = public_game(&sim).await;
    let alice = &players[0];

    let info = alice.get_game(id).await.unwrap();
    assert_eq!(info.state, GameState::Registration);
    assert_eq!(info.player_count, 3);
    assert!(!info.has_password);

    alice.finalize_game(id).await.unwrap();
    assert_eq!(alice.get_game(id).await.unwrap().state, GameState::Active);

    let mut targets = BTreeSet::new();
    for client in &players {
        client.create_permit().await.unwrap();
        let me = client.account().await.unwrap();
        let target = client.my_assignment(id).await.unwrap();
        assert_ne!(target.address, me, "nobody draws themselves");
        targets.insert(target.address);
    }
    assert_eq!(targets.len(), 3, "every participant receives exactly once");

    let perm = sim.assignment(id).unwrap();
    assert!(is_derangement(&perm));
    assert!(verify_assignment(sim.seed(id).unwrap(), &perm).unwrap());
}

#[tokio::test]
async fn test_assignment_names_match_participants() {
    let sim = SimLedger::default();
    let (id, players) = public_game(&sim).await;
    players[0].finalize_game(id).await.unwrap();

    let participants = players[0].participants_with_names(id).await.unwrap();
    let names: Vec<_> = participants.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Alice", "Bob", "Carol"]);

    let perm = sim.assignment(id).unwrap();
    let bob = &players[1];
    bob.create_permit().await.unwrap();
    assert_eq!(bob.my_assignment(id).await.unwrap(), participants[perm[1]]);
}

#[tokio::test]
async fn test_reveal_changes_visibility_not_assignment() {
    let sim = SimLedger::default();
    let (id, players) = public_game(&sim).await;
    let alice = &players[0];
    alice.finalize_game(id).await.unwrap();

    // each giver reads only their own slot before reveal
    let mut cts = Vec::new();
    let mut plain = Vec::new();
    for client in &players {
        client.create_permit().await.unwrap();
        let ct = client.get_my_target(id).await.unwrap();
        plain.push(client.unseal_target(ct).await.unwrap());
        cts.push(ct);
    }
    for (viewer, client) in players.iter().enumerate() {
        for (giver, ct) in cts.iter().enumerate() {
            if viewer == giver {
                continue;
            }
            let err = client.unseal_target(*ct).await.unwrap_err();
            assert!(matches!(err, ClientError::UnsealFailed(_)));
            assert_eq!(err.kind(), ErrorKind::Crypto);
        }
    }

    assert_eq!(
        players[1].reveal_game(id).await.unwrap_err(),
        ClientError::Protocol(SantaError::NotCreator)
    );
    alice.reveal_game(id).await.unwrap();
    assert_eq!(alice.get_game(id).await.unwrap().state, GameState::Revealed);

    let perm = sim.assignment(id).unwrap();
    for (giver, client) in players.iter().enumerate() {
        assert_eq!(client.get_my_target(id).await.unwrap(), cts[giver]);
        assert_eq!(plain[giver] as usize, perm[giver]);
    }
    for client in &players {
        for (giver, ct) in cts.iter().enumerate() {
            assert_eq!(client.unseal_target(*ct).await.unwrap(), plain[giver]);
        }
    }

    assert_eq!(
        alice.reveal_game(id).await.unwrap_err(),
        ClientError::Protocol(SantaError::NotActive)
    );
}

#[tokio::test]
async fn test_minimum_players() {
    let sim = SimLedger::default();
    let alice = player(&sim, 1).await;
    let bob = player(&sim, 2).await;

    let id = alice.create_game("Tiny", "Alice", None).await.unwrap();
    bob.request_join(id, "Bob", None).await.unwrap();

    let block = sim.block_number();
    assert_eq!(
        alice.finalize_game(id).await.unwrap_err(),
        ClientError::Protocol(SantaError::NeedAtLeast3Players)
    );
    // caught by simulation, nothing mined
    assert_eq!(sim.block_number(), block);
    assert_eq!(alice.get_game(id).await.unwrap().state, GameState::Registration);
}

#[tokio::test]
async fn test_finalize_guards() {
    let sim = SimLedger::default();
    let (id, players) = public_game(&sim).await;
    let dave = player(&sim, 4).await;

    assert_eq!(
        players[1].finalize_game(id).await.unwrap_err(),
        ClientError::Protocol(SantaError::NotCreator)
    );
    players[0].finalize_game(id).await.unwrap();
    assert_eq!(
        players[0].finalize_game(id).await.unwrap_err(),
        ClientError::Protocol(SantaError::NotRegistrationPhase)
    );
    assert_eq!(
        dave.request_join(id, "Dave", None).await.unwrap_err(),
        ClientError::Protocol(SantaError::NotRegistrationPhase)
    );
}

#[tokio::test]
async fn test_targets_before_start_and_for_outsiders() {
    let sim = SimLedger::default();
    let (id, players) = public_game(&sim).await;
    let outsider = player(&sim, 9).await;

    assert_eq!(
        players[1].get_my_target(id).await.unwrap_err(),
        ClientError::Protocol(SantaError::GameNotStarted)
    );
    players[0].finalize_game(id).await.unwrap();
    assert_eq!(
        outsider.get_my_target(id).await.unwrap_err(),
        ClientError::Protocol(SantaError::NotRegistered)
    );
}

#[tokio::test]
async fn test_no_password_sentinel() {
    let sim = SimLedger::default();
    let (public_id, _) = public_game(&sim).await;

    let alice = player(&sim, 1).await;
    let bob = player(&sim, 2).await;
    let protected = alice
        .create_game("Secret", "Alice", Some("hunter2"))
        .await
        .unwrap();
    assert!(alice.get_game(protected).await.unwrap().has_password);
    bob.request_join(protected, "Bob", Some("hunter2")).await.unwrap();

    let submissions = sim.submissions();
    for s in submissions.iter().filter(|s| s.game_id == public_id) {
        assert_eq!(s.password, NO_PASSWORD, "{} sent a password", s.function);
    }
    for s in submissions.iter().filter(|s| s.game_id == protected) {
        assert_eq!(s.password, hash_password("hunter2"));
    }
}

#[tokio::test]
async fn test_empty_password_is_public() {
    let sim = SimLedger::default();
    let alice = player(&sim, 1).await;
    let id = alice.create_game("Party", "Alice", Some("")).await.unwrap();
    assert!(!alice.get_game(id).await.unwrap().has_password);
    assert_eq!(sim.submissions()[0].password, NO_PASSWORD);
}

#[tokio::test]
async fn test_validation_happens_before_network() {
    let sim = SimLedger::default();
    let alice = player(&sim, 1).await;

    let err = alice.create_game("  ", "Alice", None).await.unwrap_err();
    assert_eq!(err, ClientError::EmptyName("game name"));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(
        alice.request_join(GameId(0), "", None).await.unwrap_err(),
        ClientError::EmptyName("your name")
    );
    let err = parse_game_id("0x10").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert!(sim.submissions().is_empty());
    assert_eq!(sim.block_number(), 0);
}

#[tokio::test]
async fn test_operations_need_init() {
    let sim = SimLedger::default();
    let client = SantaClient::new(ClientConfig::local(), sim.clone(), sim.fhe());

    assert!(!client.is_initialized().await);
    assert_eq!(
        client.create_game("Party", "Alice", None).await.unwrap_err(),
        ClientError::NotInitialized
    );
    assert_eq!(client.create_permit().await.unwrap_err(), ClientError::NotInitialized);

    client.init(addr(1)).await.unwrap();
    client.create_game("Party", "Alice", None).await.unwrap();
    client.teardown().await;
    assert_eq!(
        client.poll_join_status(GameId(0)).await.unwrap_err(),
        ClientError::NotInitialized
    );
}

#[tokio::test]
async fn test_permit_lifecycle() {
    let sim = SimLedger::default();
    let (id, players) = public_game(&sim).await;
    let bob = &players[1];
    players[0].finalize_game(id).await.unwrap();

    assert_eq!(bob.my_assignment(id).await.unwrap_err(), ClientError::PermitMissing);
    assert!(!bob.has_valid_permit().await);

    let permit = bob.create_permit().await.unwrap();
    assert_eq!(permit.name, "Secret Santa");
    assert!(bob.has_valid_permit().await);

    assert!(bob.remove_permit().await);
    assert_eq!(bob.my_assignment(id).await.unwrap_err(), ClientError::PermitMissing);
}

#[tokio::test]
async fn test_expired_permit() {
    let sim = SimLedger::default();
    let config = ClientConfig {
        permit_validity_days: 0,
        ..ClientConfig::local()
    };
    let client = SantaClient::new(config, sim.clone(), sim.fhe());
    client.init(addr(1)).await.unwrap();

    let permit = client.create_permit().await.unwrap();
    assert_eq!(
        client.unseal_target(Default::default()).await.unwrap_err(),
        ClientError::PermitExpired {
            expiration: permit.expiration
        }
    );
}

#[tokio::test]
async fn test_reads_and_cache() {
    let sim = SimLedger::default();
    let (id, players) = public_game(&sim).await;
    let alice = &players[0];
    let second = alice.create_game("Family", "Alice", None).await.unwrap();

    assert_eq!(second, GameId(1));
    assert_eq!(alice.game_count().await.unwrap(), 2);
    assert_eq!(alice.participant_count(id).await.unwrap(), 3);
    assert_eq!(alice.participant_count(second).await.unwrap(), 1);
    assert_eq!(alice.player_name(id, addr(2)).await.unwrap(), "Bob");
    assert_eq!(alice.player_name(id, addr(9)).await.unwrap(), "");
    assert!(alice.is_registered(id, addr(3)).await.unwrap());
    assert_eq!(alice.created_games().await.unwrap(), vec![id, second]);

    let mine: Vec<_> = players[1]
        .my_games()
        .await
        .unwrap()
        .into_iter()
        .map(|g| g.game_id)
        .collect();
    assert_eq!(mine, vec![id]);

    let cached: Vec<_> = alice.cached_games().into_iter().map(|g| g.game_id).collect();
    assert_eq!(cached, vec![second, id]);
    assert!(players[2].cache().has(id, ClientConfig::local().chain.chain_id));

    assert_eq!(
        alice.get_game(GameId(42)).await.unwrap_err(),
        ClientError::Protocol(SantaError::GameNotFound)
    );
}
