use std::collections::HashMap;
use std::time::{Duration, Instant};

use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

use crate::*;

pub type PlayerId = String;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Single objective: clear every non-mine cell.
    Classic,
    /// Competitive scoring: find mines for points, turn-based.
    Flags,
}

impl core::str::FromStr for GameMode {
    type Err = GameError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "classic" => Ok(Self::Classic),
            "flags" => Ok(Self::Flags),
            _ => Err(GameError::UnknownName),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    Pending,
    Playing,
    Won,
    Lost,
}

impl GameState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }

    pub const fn accepts_moves(self) -> bool {
        matches!(self, Self::Pending | Self::Playing)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

impl Player {
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Result of an accepted (or silently ignored) move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveOutcome {
    pub state: GameState,
    pub cell_updates: Vec<CellUpdate>,
}

impl MoveOutcome {
    fn no_change(state: GameState) -> Self {
        Self {
            state,
            cell_updates: Vec::new(),
        }
    }

    pub fn has_update(&self) -> bool {
        !self.cell_updates.is_empty()
    }
}

/// One shared game: board, visibility, participants, scores, and clock.
///
/// Pure computation; callers own serialization of concurrent access.
pub struct Game {
    id: String,
    config: GameConfig,
    mode: GameMode,
    state: GameState,
    minefield: Option<Minefield>,
    board: Array2<Cell>,
    revealed_count: CellCount,
    found_mines: CellCount,
    flag_count: CellCount,
    players: Vec<Player>,
    scores: HashMap<PlayerId, u32>,
    current_turn: usize,
    started_at: Option<Instant>,
    ended_at: Option<Instant>,
    last_activity: Instant,
    rng: SmallRng,
}

impl Game {
    pub fn new(id: impl Into<String>, config: GameConfig, mode: GameMode, creator: Player) -> Self {
        let mut scores = HashMap::new();
        scores.insert(creator.id.clone(), 0);
        Self {
            id: id.into(),
            config,
            mode,
            state: GameState::Pending,
            minefield: None,
            board: Array2::default(nd(config.size)),
            revealed_count: 0,
            found_mines: 0,
            flag_count: 0,
            players: vec![creator],
            scores,
            current_turn: 0,
            started_at: None,
            ended_at: None,
            last_activity: Instant::now(),
            rng: SmallRng::from_os_rng(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> GameConfig {
        self.config
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn score_of(&self, player: &PlayerId) -> u32 {
        self.scores.get(player).copied().unwrap_or(0)
    }

    pub fn current_player(&self) -> Option<&Player> {
        match self.mode {
            GameMode::Flags => self.players.get(self.current_turn),
            GameMode::Classic => None,
        }
    }

    pub fn cell_at(&self, coords: Coord2) -> Cell {
        self.board[nd(coords)]
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn mines_left(&self) -> CellCount {
        self.config
            .mines
            .saturating_sub(self.flag_count + self.found_mines)
    }

    /// Adds a participant; idempotent by id. Re-adding an existing id
    /// refreshes the display name, replacing the id placeholder an invitee is
    /// registered under before they actually join.
    pub fn add_player(&mut self, player: Player) {
        if let Some(existing) = self.players.iter_mut().find(|p| p.id == player.id) {
            existing.name = player.name;
            return;
        }
        self.scores.entry(player.id.clone()).or_insert(0);
        self.players.push(player);
        self.last_activity = Instant::now();
    }

    /// Removes one participant without touching the board, keeping the turn
    /// pointed at a valid player.
    pub fn remove_player(&mut self, player: &PlayerId) -> Option<Player> {
        let index = self.players.iter().position(|p| &p.id == player)?;
        let removed = self.players.remove(index);
        self.scores.remove(player);
        if index < self.current_turn {
            self.current_turn -= 1;
        }
        if !self.players.is_empty() {
            self.current_turn %= self.players.len();
        } else {
            self.current_turn = 0;
        }
        self.last_activity = Instant::now();
        Some(removed)
    }

    /// Installs a fixed mine layout instead of generating one on the first
    /// reveal. Used by tests and replay tooling; dimensions must match.
    pub fn plant_minefield(&mut self, field: Minefield) {
        debug_assert_eq!(field.size(), self.config.size);
        self.config.mines = field.mine_count();
        self.minefield = Some(field);
    }

    /// Attempts to reveal a cell on behalf of `actor`.
    ///
    /// Terminal games, flagged cells, and already-revealed cells are silent
    /// no-ops. Turn violations in flags mode are errors and mutate nothing.
    pub fn reveal(&mut self, coords: Coord2, actor: &PlayerId) -> Result<MoveOutcome> {
        let coords = self.config.validate_coords(coords)?;

        if self.state.is_terminal() || !self.board[nd(coords)].is_hidden() {
            return Ok(MoveOutcome::no_change(self.state));
        }

        if self.mode == GameMode::Flags {
            if self.players.len() < 2 {
                return Err(GameError::WaitingForOpponent);
            }
            match self.players.get(self.current_turn) {
                Some(current) if &current.id == actor => {}
                _ => return Err(GameError::NotYourTurn),
            }
        }

        if self.minefield.is_none() {
            self.minefield = Some(generate_minefield(self.config, coords, &mut self.rng));
        }
        if self.state == GameState::Pending {
            self.state = GameState::Playing;
            self.started_at = Some(Instant::now());
        }

        let field = self
            .minefield
            .as_ref()
            .expect("minefield exists past first reveal");

        let mut updates = Vec::new();
        if field.is_mine(coords) {
            self.board[nd(coords)] = Cell::Mine;
            self.found_mines += 1;
            updates.push(CellUpdate::new(coords, Cell::Mine));

            match self.mode {
                GameMode::Classic => {
                    // Terminal: disclose every remaining mine in the same batch.
                    for mine in field.iter_mines() {
                        if self.board[nd(mine)] != Cell::Mine {
                            self.board[nd(mine)] = Cell::Mine;
                            updates.push(CellUpdate::new(mine, Cell::Mine));
                        }
                    }
                    self.finish(GameState::Lost);
                }
                GameMode::Flags => {
                    // The finder scores and keeps the turn.
                    *self.scores.entry(actor.clone()).or_insert(0) += 1;
                    if self.found_mines == self.config.mines {
                        self.finish(GameState::Won);
                    }
                }
            }
        } else {
            // Iterative flood fill: the connected zero region plus its
            // numbered border. Flagged cells are never auto-revealed.
            let size = self.config.size;
            let mut stack = vec![coords];
            while let Some(cell) = stack.pop() {
                if !self.board[nd(cell)].is_hidden() {
                    continue;
                }
                let count = field.adjacent_count(cell);
                self.board[nd(cell)] = Cell::Revealed(count);
                self.revealed_count += 1;
                updates.push(CellUpdate::new(cell, Cell::Revealed(count)));
                if count == 0 {
                    stack.extend(
                        neighbors(cell, size).filter(|&pos| self.board[nd(pos)].is_hidden()),
                    );
                }
            }

            if self.mode == GameMode::Classic && self.revealed_count == field.safe_cell_count() {
                self.finish(GameState::Won);
            } else if self.mode == GameMode::Flags && self.state == GameState::Playing {
                self.current_turn = (self.current_turn + 1) % self.players.len();
            }
        }

        self.last_activity = Instant::now();
        Ok(MoveOutcome {
            state: self.state,
            cell_updates: updates,
        })
    }

    /// Toggles a flag. Placing past the mine total is rejected; removing is
    /// always allowed. Never consumes a turn and never starts the clock.
    pub fn toggle_flag(&mut self, coords: Coord2) -> Result<MoveOutcome> {
        let coords = self.config.validate_coords(coords)?;

        if !self.state.accepts_moves() {
            return Ok(MoveOutcome::no_change(self.state));
        }

        let update = match self.board[nd(coords)] {
            Cell::Revealed(_) | Cell::Mine => return Ok(MoveOutcome::no_change(self.state)),
            Cell::Hidden => {
                if self.flag_count + self.found_mines >= self.config.mines {
                    return Err(GameError::FlagLimitReached);
                }
                self.board[nd(coords)] = Cell::Flagged;
                self.flag_count += 1;
                CellUpdate::new(coords, Cell::Flagged)
            }
            Cell::Flagged => {
                self.board[nd(coords)] = Cell::Hidden;
                self.flag_count -= 1;
                CellUpdate::new(coords, Cell::Hidden)
            }
        };

        self.last_activity = Instant::now();
        Ok(MoveOutcome {
            state: self.state,
            cell_updates: vec![update],
        })
    }

    /// Clears the board back to `Pending`, keeping the participants. An
    /// override swaps in a new difficulty preset.
    pub fn reset(&mut self, config_override: Option<GameConfig>) {
        if let Some(config) = config_override {
            self.config = config;
        }
        self.state = GameState::Pending;
        self.minefield = None;
        self.board = Array2::default(nd(self.config.size));
        self.revealed_count = 0;
        self.found_mines = 0;
        self.flag_count = 0;
        self.current_turn = 0;
        self.started_at = None;
        self.ended_at = None;
        for score in self.scores.values_mut() {
            *score = 0;
        }
        self.last_activity = Instant::now();
    }

    /// Projects the game to what any viewer may see.
    pub fn snapshot(&self) -> GameView {
        let (width, height) = self.config.size;
        let grid = (0..height)
            .map(|y| (0..width).map(|x| self.board[nd((x, y))]).collect())
            .collect();

        GameView {
            game_id: self.id.clone(),
            mode: self.mode,
            state: self.state,
            width,
            height,
            total_mines: self.config.mines,
            mines_left: self.mines_left(),
            elapsed_secs: self.elapsed().as_secs(),
            players: self
                .players
                .iter()
                .map(|p| PlayerView {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    score: self.score_of(&p.id),
                })
                .collect(),
            current_turn: self.current_player().map(|p| p.id.clone()),
            grid,
        }
    }

    pub fn scores(&self) -> &HashMap<PlayerId, u32> {
        &self.scores
    }

    pub fn elapsed(&self) -> Duration {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => end - start,
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    fn finish(&mut self, state: GameState) {
        self.state = state;
        self.ended_at = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classic_game(mines: &[Coord2], size: Coord2) -> Game {
        let mut game = Game::new(
            "g1",
            GameConfig::new_unchecked(size, mines.len() as CellCount),
            GameMode::Classic,
            Player::new("alice", "Alice"),
        );
        game.plant_minefield(Minefield::from_mine_coords(size, mines).unwrap());
        game
    }

    fn flags_game(mines: &[Coord2], size: Coord2) -> Game {
        let mut game = Game::new(
            "g2",
            GameConfig::new_unchecked(size, mines.len() as CellCount),
            GameMode::Flags,
            Player::new("alice", "Alice"),
        );
        game.add_player(Player::new("bob", "Bob"));
        game.plant_minefield(Minefield::from_mine_coords(size, mines).unwrap());
        game
    }

    fn actor(id: &str) -> PlayerId {
        id.to_string()
    }

    #[test]
    fn classic_mine_hit_discloses_every_mine() {
        let mut game = classic_game(&[(0, 0), (2, 2)], (3, 3));

        let outcome = game.reveal((0, 0), &actor("alice")).unwrap();

        assert_eq!(outcome.state, GameState::Lost);
        let mines: Vec<_> = outcome
            .cell_updates
            .iter()
            .filter(|u| u.cell == Cell::Mine)
            .collect();
        assert_eq!(mines.len(), 2);
        assert_eq!(game.cell_at((2, 2)), Cell::Mine);
    }

    #[test]
    fn classic_win_when_all_safe_cells_revealed() {
        let mut game = classic_game(&[(0, 0)], (2, 2));

        game.reveal((1, 0), &actor("alice")).unwrap();
        game.reveal((0, 1), &actor("alice")).unwrap();
        let outcome = game.reveal((1, 1), &actor("alice")).unwrap();

        assert_eq!(outcome.state, GameState::Won);
        assert_eq!(game.state(), GameState::Won);
    }

    #[test]
    fn flood_fill_opens_zero_region_and_numbered_border() {
        let mut game = classic_game(&[(4, 4)], (5, 5));

        let outcome = game.reveal((0, 0), &actor("alice")).unwrap();

        // Everything except the mine opens from one corner click.
        assert_eq!(outcome.state, GameState::Won);
        assert_eq!(outcome.cell_updates.len(), 24);
        assert_eq!(game.cell_at((3, 3)), Cell::Revealed(1));
        assert_eq!(game.cell_at((4, 4)), Cell::Hidden);
    }

    #[test]
    fn flood_fill_never_reveals_flagged_cells() {
        let mut game = classic_game(&[(4, 4)], (5, 5));
        game.toggle_flag((0, 1)).unwrap();

        let outcome = game.reveal((0, 0), &actor("alice")).unwrap();

        assert_eq!(game.cell_at((0, 1)), Cell::Flagged);
        assert!(outcome.cell_updates.iter().all(|u| (u.x, u.y) != (0, 1)));
    }

    #[test]
    fn reveal_on_flagged_or_revealed_cell_is_silent_noop() {
        let mut game = classic_game(&[(0, 0)], (3, 3));
        game.toggle_flag((0, 0)).unwrap();
        game.reveal((2, 2), &actor("alice")).unwrap();

        let on_flag = game.reveal((0, 0), &actor("alice")).unwrap();
        let on_open = game.reveal((2, 2), &actor("alice")).unwrap();

        assert!(!on_flag.has_update());
        assert!(!on_open.has_update());
        assert_eq!(game.cell_at((0, 0)), Cell::Flagged);
    }

    #[test]
    fn terminal_game_ignores_further_moves() {
        let mut game = classic_game(&[(0, 0)], (2, 2));
        game.reveal((0, 0), &actor("alice")).unwrap();
        assert_eq!(game.state(), GameState::Lost);

        let reveal = game.reveal((1, 1), &actor("alice")).unwrap();
        let flag = game.toggle_flag((1, 1)).unwrap();

        assert!(!reveal.has_update());
        assert!(!flag.has_update());
    }

    #[test]
    fn flags_mine_scores_and_keeps_the_turn() {
        let mut game = flags_game(&[(0, 0), (2, 2)], (3, 3));

        let outcome = game.reveal((0, 0), &actor("alice")).unwrap();

        assert_eq!(outcome.state, GameState::Playing);
        assert_eq!(game.score_of(&actor("alice")), 1);
        assert_eq!(game.current_player().unwrap().id, "alice");
        assert_eq!(game.cell_at((0, 0)), Cell::Mine);
    }

    #[test]
    fn flags_safe_reveal_rotates_the_turn() {
        let mut game = flags_game(&[(0, 0), (2, 2)], (3, 3));

        game.reveal((2, 0), &actor("alice")).unwrap();

        assert_eq!(game.current_player().unwrap().id, "bob");
        assert_eq!(game.score_of(&actor("alice")), 0);
    }

    #[test]
    fn flags_rejects_out_of_turn_moves() {
        let mut game = flags_game(&[(0, 0)], (3, 3));

        assert_eq!(
            game.reveal((1, 1), &actor("bob")),
            Err(GameError::NotYourTurn)
        );
        assert_eq!(game.state(), GameState::Pending);
    }

    #[test]
    fn flags_needs_two_players() {
        let mut game = Game::new(
            "solo",
            Difficulty::Easy.config(),
            GameMode::Flags,
            Player::new("alice", "Alice"),
        );

        assert_eq!(
            game.reveal((0, 0), &actor("alice")),
            Err(GameError::WaitingForOpponent)
        );
        assert_eq!(game.state(), GameState::Pending);
    }

    #[test]
    fn flags_won_when_every_mine_is_found() {
        let mut game = flags_game(&[(0, 0), (2, 2)], (3, 3));

        game.reveal((0, 0), &actor("alice")).unwrap();
        let outcome = game.reveal((2, 2), &actor("alice")).unwrap();

        assert_eq!(outcome.state, GameState::Won);
        assert_eq!(game.score_of(&actor("alice")), 2);
    }

    #[test]
    fn flag_limit_blocks_the_eleventh_flag() {
        let mut game = Game::new(
            "limit",
            Difficulty::Easy.config(),
            GameMode::Classic,
            Player::new("alice", "Alice"),
        );

        for i in 0..10u8 {
            game.toggle_flag((i % 9, i / 9)).unwrap();
        }
        let before = game.snapshot();

        assert_eq!(game.toggle_flag((5, 5)), Err(GameError::FlagLimitReached));
        assert_eq!(game.snapshot().grid, before.grid);
        assert_eq!(game.mines_left(), 0);

        // Removal is always allowed, then one slot is free again.
        game.toggle_flag((0, 0)).unwrap();
        game.toggle_flag((5, 5)).unwrap();
    }

    #[test]
    fn out_of_bounds_moves_are_errors_not_panics() {
        let mut game = classic_game(&[(0, 0)], (3, 3));

        assert_eq!(
            game.reveal((3, 0), &actor("alice")),
            Err(GameError::InvalidCoords)
        );
        assert_eq!(game.toggle_flag((0, 9)), Err(GameError::InvalidCoords));
    }

    #[test]
    fn reset_returns_to_pending_and_clears_scores() {
        let mut game = flags_game(&[(0, 0), (2, 2)], (3, 3));
        game.reveal((0, 0), &actor("alice")).unwrap();

        game.reset(Some(Difficulty::Medium.config()));

        assert_eq!(game.state(), GameState::Pending);
        assert_eq!(game.score_of(&actor("alice")), 0);
        assert_eq!(game.config().size, (16, 16));
        assert_eq!(game.cell_at((15, 15)), Cell::Hidden);
        assert_eq!(game.players().len(), 2);
    }

    #[test]
    fn snapshot_hides_the_mine_layout() {
        let mut game = classic_game(&[(2, 2)], (3, 3));
        game.reveal((0, 0), &actor("alice")).unwrap();
        game.toggle_flag((2, 2)).unwrap();

        let view = game.snapshot();

        assert_eq!(view.cell((2, 2)), Some(Cell::Flagged));
        assert_eq!(view.cell((0, 0)), Some(Cell::Revealed(0)));
        assert_eq!(view.total_mines, 1);
        assert_eq!(view.mines_left, 0);
        assert_eq!(view.current_turn, None);
    }

    #[test]
    fn removing_a_player_keeps_the_turn_valid() {
        let mut game = flags_game(&[(0, 0)], (3, 3));
        game.add_player(Player::new("carol", "Carol"));
        game.reveal((2, 0), &actor("alice")).unwrap();
        assert_eq!(game.current_player().unwrap().id, "bob");

        game.remove_player(&actor("bob"));

        assert!(game.current_player().is_some());
        assert_eq!(game.players().len(), 2);
    }

    #[test]
    fn add_player_is_idempotent() {
        let mut game = flags_game(&[(0, 0)], (3, 3));
        game.add_player(Player::new("bob", "Bob"));
        assert_eq!(game.players().len(), 2);
    }

    #[test]
    fn joining_replaces_an_invitee_placeholder_name() {
        let mut game = flags_game(&[(0, 0)], (3, 3));
        game.add_player(Player::new("guest-00carol", "guest-00carol"));
        game.reveal((2, 0), &actor("alice")).unwrap();

        game.add_player(Player::new("guest-00carol", "Carol"));

        assert_eq!(game.players().len(), 3);
        let view = game.snapshot();
        assert_eq!(view.players[2].name, "Carol");
        // Refreshing the name never resets the participant's score slot.
        assert_eq!(view.players[2].score, 0);
        assert_eq!(game.score_of(&actor("guest-00carol")), 0);
    }
}
