use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio::sync::Mutex;

use jirai_core::{Game, GameConfig, GameMode, Player, PlayerId};

/// Every mutating engine call goes through this per-game mutex, closing the
/// lost-update race between simultaneous moves on one game.
pub type SharedGame = Arc<Mutex<Game>>;

/// A torn-down game, handed back so the caller can notify participants and
/// disconnect bots.
pub struct RemovedGame {
    pub game_id: String,
    pub game: SharedGame,
    pub players: Vec<PlayerId>,
}

const ID_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ID_LEN: usize = 6;

/// In-memory session directory: the only process-wide shared mutable state.
///
/// Two maps, as narrow as possible: game id to game (join-by-code) and
/// participant to game id (which game is this connection in). Constructed
/// per process instance, never ambient.
pub struct GameRegistry {
    games: HashMap<String, SharedGame>,
    by_player: HashMap<PlayerId, String>,
    rng: SmallRng,
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GameRegistry {
    pub fn new() -> Self {
        Self {
            games: HashMap::new(),
            by_player: HashMap::new(),
            rng: SmallRng::from_os_rng(),
        }
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    /// Allocates a game under a fresh id and registers the creator plus any
    /// invited participants.
    pub fn create_game(
        &mut self,
        creator: Player,
        config: GameConfig,
        mode: GameMode,
        invitees: Vec<Player>,
    ) -> SharedGame {
        let id = self.fresh_id();
        self.by_player.insert(creator.id.clone(), id.clone());

        let mut game = Game::new(id.clone(), config, mode, creator);
        for invitee in invitees {
            self.by_player.insert(invitee.id.clone(), id.clone());
            game.add_player(invitee);
        }

        let shared = Arc::new(Mutex::new(game));
        self.games.insert(id, shared.clone());
        shared
    }

    /// Registers `player` with an existing game. Idempotent; the caller adds
    /// the player to the game itself under its lock.
    pub fn join_game(&mut self, game_id: &str, player: &PlayerId) -> Option<SharedGame> {
        let shared = self.games.get(game_id)?.clone();
        self.by_player.insert(player.clone(), game_id.to_string());
        Some(shared)
    }

    pub fn get(&self, game_id: &str) -> Option<SharedGame> {
        self.games.get(game_id).cloned()
    }

    pub fn game_for(&self, player: &PlayerId) -> Option<SharedGame> {
        self.games.get(self.by_player.get(player)?).cloned()
    }

    /// Tears a game down fully, unregistering every participant.
    pub fn remove_game(&mut self, game_id: &str) -> Option<RemovedGame> {
        let game = self.games.remove(game_id)?;
        let mut players = Vec::new();
        self.by_player.retain(|player, registered| {
            if registered == game_id {
                players.push(player.clone());
                false
            } else {
                true
            }
        });
        Some(RemovedGame {
            game_id: game_id.to_string(),
            game,
            players,
        })
    }

    /// Same teardown, keyed by any of the game's participants.
    pub fn remove_game_for(&mut self, player: &PlayerId) -> Option<RemovedGame> {
        let game_id = self.by_player.get(player)?.clone();
        self.remove_game(&game_id)
    }

    /// Unregisters a single participant without destroying the game; used for
    /// bot eviction. The caller removes the player from the game itself.
    pub fn remove_player(&mut self, game_id: &str, player: &PlayerId) -> Option<SharedGame> {
        match self.by_player.get(player) {
            Some(registered) if registered == game_id => {}
            _ => return None,
        }
        self.by_player.remove(player);
        self.games.get(game_id).cloned()
    }

    /// Removes every game idle longer than `ttl`. Games whose mutex is held
    /// right now are mid-move and by definition not stale.
    pub fn sweep_stale(&mut self, ttl: Duration) -> Vec<RemovedGame> {
        let stale: Vec<String> = self
            .games
            .iter()
            .filter_map(|(id, shared)| match shared.try_lock() {
                Ok(game) if game.idle_for() >= ttl => Some(id.clone()),
                _ => None,
            })
            .collect();

        stale
            .iter()
            .filter_map(|id| self.remove_game(id))
            .collect()
    }

    fn fresh_id(&mut self) -> String {
        loop {
            let id: String = (0..ID_LEN)
                .map(|_| ID_CHARSET[self.rng.random_range(0..ID_CHARSET.len())] as char)
                .collect();
            if !self.games.contains_key(&id) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jirai_core::Difficulty;

    fn player(id: &str) -> Player {
        Player::new(id, id.to_uppercase())
    }

    fn easy_game(registry: &mut GameRegistry, creator: &str) -> SharedGame {
        registry.create_game(
            player(creator),
            Difficulty::Easy.config(),
            GameMode::Classic,
            Vec::new(),
        )
    }

    #[test]
    fn create_registers_creator_and_invitees_in_both_maps() {
        let mut registry = GameRegistry::new();

        let shared = registry.create_game(
            player("alice"),
            Difficulty::Easy.config(),
            GameMode::Flags,
            vec![player("bob")],
        );

        let game = shared.try_lock().unwrap();
        assert_eq!(game.players().len(), 2);
        assert!(registry.game_for(&"alice".to_string()).is_some());
        assert!(registry.game_for(&"bob".to_string()).is_some());
        assert!(registry.get(game.id()).is_some());
    }

    #[test]
    fn join_is_idempotent_and_updates_the_player_map() {
        let mut registry = GameRegistry::new();
        let shared = easy_game(&mut registry, "alice");
        let game_id = shared.try_lock().unwrap().id().to_string();

        assert!(registry.join_game(&game_id, &"bob".to_string()).is_some());
        assert!(registry.join_game(&game_id, &"bob".to_string()).is_some());
        assert!(registry.join_game("NOSUCH", &"carol".to_string()).is_none());
        assert!(registry.game_for(&"bob".to_string()).is_some());
    }

    #[test]
    fn remove_game_unregisters_every_participant() {
        let mut registry = GameRegistry::new();
        let shared = registry.create_game(
            player("alice"),
            Difficulty::Easy.config(),
            GameMode::Flags,
            vec![player("bob")],
        );
        let game_id = shared.try_lock().unwrap().id().to_string();

        let removed = registry.remove_game(&game_id).unwrap();

        assert_eq!(removed.players.len(), 2);
        assert_eq!(registry.game_count(), 0);
        assert!(registry.game_for(&"alice".to_string()).is_none());
        assert!(registry.game_for(&"bob".to_string()).is_none());
        assert!(registry.remove_game(&game_id).is_none());
    }

    #[test]
    fn remove_game_accepts_a_participant_as_key() {
        let mut registry = GameRegistry::new();
        easy_game(&mut registry, "alice");

        assert!(registry.remove_game_for(&"alice".to_string()).is_some());
        assert_eq!(registry.game_count(), 0);
    }

    #[test]
    fn remove_player_is_surgical() {
        let mut registry = GameRegistry::new();
        let shared = registry.create_game(
            player("alice"),
            Difficulty::Easy.config(),
            GameMode::Flags,
            vec![player("Bot 1")],
        );
        let game_id = shared.try_lock().unwrap().id().to_string();

        assert!(registry.remove_player(&game_id, &"Bot 1".to_string()).is_some());

        assert!(registry.game_for(&"Bot 1".to_string()).is_none());
        assert!(registry.game_for(&"alice".to_string()).is_some());
        assert_eq!(registry.game_count(), 1);
        assert!(registry.remove_player(&game_id, &"Bot 1".to_string()).is_none());
    }

    #[test]
    fn sweep_removes_idle_games_from_both_maps() {
        let mut registry = GameRegistry::new();
        easy_game(&mut registry, "alice");

        let removed = registry.sweep_stale(Duration::ZERO);

        assert_eq!(removed.len(), 1);
        assert_eq!(registry.game_count(), 0);
        assert!(registry.game_for(&"alice".to_string()).is_none());
    }

    #[test]
    fn sweep_spares_active_games() {
        let mut registry = GameRegistry::new();
        easy_game(&mut registry, "alice");

        let removed = registry.sweep_stale(Duration::from_secs(600));

        assert!(removed.is_empty());
        assert_eq!(registry.game_count(), 1);
    }

    #[test]
    fn sweep_skips_games_locked_by_an_in_flight_move() {
        let mut registry = GameRegistry::new();
        let shared = easy_game(&mut registry, "alice");
        let guard = shared.try_lock().unwrap();

        let removed = registry.sweep_stale(Duration::ZERO);

        assert!(removed.is_empty());
        drop(guard);
        assert_eq!(registry.sweep_stale(Duration::ZERO).len(), 1);
    }

    #[test]
    fn fresh_ids_use_the_unambiguous_charset() {
        let mut registry = GameRegistry::new();
        for _ in 0..50 {
            let id = registry.fresh_id();
            assert_eq!(id.len(), ID_LEN);
            assert!(id.bytes().all(|b| ID_CHARSET.contains(&b)));
        }
    }
}
