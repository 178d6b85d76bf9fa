//! local "my games" cache
//!
//! convenience only. the ledger stays authoritative and every entry here may
//! be stale or missing

use parking_lot::RwLock;
use santa_core::{Address, GameId, GameInfo};
use serde::{Deserialize, Serialize};

/// cached summary of a game the account created or joined
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredGame {
    pub game_id: GameId,
    pub chain_id: u64,
    pub creator: Address,
    pub name: String,
    pub created_at: u64,
    /// unix seconds when this account created or joined
    pub joined_at: u64,
}

impl StoredGame {
    pub fn from_info(info: &GameInfo, chain_id: u64, joined_at: u64) -> Self {
        Self {
            game_id: info.game_id,
            chain_id,
            creator: info.creator,
            name: info.name.clone(),
            created_at: info.created_at,
            joined_at,
        }
    }
}

/// keyed by (game id, chain id)
pub trait GameCache: Send + Sync {
    /// insert unless already present. returns false for duplicates
    fn add(&self, game: StoredGame) -> bool;

    fn remove(&self, game_id: GameId, chain_id: u64) -> bool;

    fn has(&self, game_id: GameId, chain_id: u64) -> bool;

    /// newest first
    fn games_by_chain(&self, chain_id: u64) -> Vec<StoredGame>;

    fn games_by_creator(&self, creator: &Address) -> Vec<StoredGame>;

    fn clear(&self);
}

#[derive(Default)]
pub struct MemoryGameCache {
    games: RwLock<Vec<StoredGame>>,
}

impl MemoryGameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.games.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.read().is_empty()
    }
}

impl GameCache for MemoryGameCache {
    fn add(&self, game: StoredGame) -> bool {
        let mut games = self.games.write();
        if games
            .iter()
            .any(|g| g.game_id == game.game_id && g.chain_id == game.chain_id)
        {
            return false;
        }
        games.insert(0, game);
        true
    }

    fn remove(&self, game_id: GameId, chain_id: u64) -> bool {
        let mut games = self.games.write();
        let before = games.len();
        games.retain(|g| !(g.game_id == game_id && g.chain_id == chain_id));
        games.len() != before
    }

    fn has(&self, game_id: GameId, chain_id: u64) -> bool {
        self.games
            .read()
            .iter()
            .any(|g| g.game_id == game_id && g.chain_id == chain_id)
    }

    fn games_by_chain(&self, chain_id: u64) -> Vec<StoredGame> {
        self.games
            .read()
            .iter()
            .filter(|g| g.chain_id == chain_id)
            .cloned()
            .collect()
    }

    fn games_by_creator(&self, creator: &Address) -> Vec<StoredGame> {
        self.games
            .read()
            .iter()
            .filter(|g| &g.creator == creator)
            .cloned()
            .collect()
    }

    fn clear(&self) {
        self.games.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(id: u64, chain_id: u64, creator: u8) -> StoredGame {
        StoredGame {
            game_id: GameId(id),
            chain_id,
            creator: Address::from_raw([creator; 20]),
            name: format!("game {}", id),
            created_at: 1_700_000_000,
            joined_at: 1_700_000_100,
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let cache = MemoryGameCache::new();
        assert!(cache.add(stored(1, 421614, 1)));
        assert!(!cache.add(stored(1, 421614, 1)));
        // same id on another chain is a different game
        assert!(cache.add(stored(1, 31337, 1)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_newest_first() {
        let cache = MemoryGameCache::new();
        cache.add(stored(1, 421614, 1));
        cache.add(stored(2, 421614, 1));
        let ids: Vec<_> = cache
            .games_by_chain(421614)
            .into_iter()
            .map(|g| g.game_id)
            .collect();
        assert_eq!(ids, vec![GameId(2), GameId(1)]);
    }

    #[test]
    fn test_filters_and_remove() {
        let cache = MemoryGameCache::new();
        cache.add(stored(1, 421614, 1));
        cache.add(stored(2, 421614, 2));
        cache.add(stored(3, 31337, 1));

        assert_eq!(cache.games_by_creator(&Address::from_raw([1; 20])).len(), 2);
        assert!(cache.has(GameId(2), 421614));
        assert!(cache.remove(GameId(2), 421614));
        assert!(!cache.remove(GameId(2), 421614));
        assert!(!cache.has(GameId(2), 421614));

        cache.clear();
        assert!(cache.is_empty());
    }
}
