//! The game state machine
//!
//! [`GameSession`] owns every piece of mutable game state: snake, food,
//! score, phase, pending direction, and the current tick interval. External
//! collaborators drive it through a handful of operations (`start`, `tick`,
//! `set_direction`, `toggle_pause`, `restart`); anything called in the wrong
//! phase is a defined no-op rather than an error. Collisions are not errors
//! either, they are the normal transition into [`Phase::Ended`].

use super::{
    config::GameConfig,
    direction::Direction,
    state::{CollisionType, GameState, Phase, Position, Snake},
};
use crate::storage::HighScoreStore;
use rand::Rng;
use std::time::Duration;

/// Direction a fresh snake heads in
const INITIAL_DIRECTION: Direction = Direction::Right;

/// Random placement attempts before falling back to enumerating free cells
const MAX_PLACEMENT_ATTEMPTS: usize = 64;

/// What a single tick did
///
/// For a running game the `Moved` / `Ate` / `GameOver` cases are exhaustive
/// and mutually exclusive; `Won` is the edge where the snake fills the board
/// and no food can be placed. `Ignored` covers ticks delivered outside
/// [`Phase::Running`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tick arrived while not running; nothing changed
    Ignored,
    /// Snake moved one cell, length unchanged
    Moved,
    /// Snake grew onto food; score and speed changed
    Ate,
    /// Snake covered the whole board
    Won,
    /// New head left the board or hit the body
    GameOver(CollisionType),
}

/// The game state machine
pub struct GameSession {
    config: GameConfig,
    state: GameState,
    phase: Phase,
    /// Direction requested since the last tick, applied on the next one
    pending_direction: Option<Direction>,
    tick_interval: Duration,
    high_score: u32,
    store: Box<dyn HighScoreStore>,
    rng: rand::rngs::ThreadRng,
}

impl GameSession {
    /// Create an idle session
    ///
    /// The high score is read from the store once, here; a store that cannot
    /// be read counts as 0. The board is populated so the idle screen has
    /// something to show, but nothing moves until [`start`](Self::start).
    pub fn new(config: GameConfig, store: Box<dyn HighScoreStore>) -> Self {
        let high_score = store.load().unwrap_or(0);
        let tick_interval = config.initial_tick_interval();

        let mut session = Self {
            state: GameState::new(
                Self::initial_snake(&config),
                Position::new(0, 0),
                config.grid_size,
            ),
            config,
            phase: Phase::Idle,
            pending_direction: None,
            tick_interval,
            high_score,
            store,
            rng: rand::thread_rng(),
        };

        if let Some(food) = session.place_food() {
            session.state.food = food;
        }

        session
    }

    /// Begin a game; only valid from [`Phase::Idle`], otherwise a no-op
    pub fn start(&mut self) {
        if self.phase != Phase::Idle {
            return;
        }
        self.begin();
    }

    /// Reset to a fresh game and run it, from any phase
    ///
    /// Equivalent to dropping back to idle and starting over. The high score
    /// survives; everything else is rebuilt.
    pub fn restart(&mut self) {
        self.phase = Phase::Idle;
        self.begin();
    }

    /// Advance the game by one step
    ///
    /// No-op unless running. Applies the pending direction, moves the head,
    /// and resolves exactly one of: collision (game over), food (grow, score,
    /// speed up, respawn food), or a plain move.
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != Phase::Running {
            return TickOutcome::Ignored;
        }

        if let Some(direction) = self.pending_direction.take() {
            if !self.state.snake.direction.is_opposite(direction) {
                self.state.snake.direction = direction;
            }
        }

        let new_head = self
            .state
            .snake
            .head()
            .moved_in_direction(self.state.snake.direction);

        if let Some(collision) = self.check_collision(new_head) {
            self.end();
            return TickOutcome::GameOver(collision);
        }

        let ate = new_head == self.state.food;
        self.state.snake.advance(ate);

        if !ate {
            return TickOutcome::Moved;
        }

        self.state.score += self.config.food_reward;
        self.update_high_score();
        self.speed_up();

        match self.place_food() {
            Some(food) => {
                self.state.food = food;
                TickOutcome::Ate
            }
            None => {
                // Snake fills the board: nowhere left to put food
                self.end();
                TickOutcome::Won
            }
        }
    }

    /// Request a direction change, applied on the next tick
    ///
    /// Ignored outside of a running game, and ignored when the request is the
    /// exact reverse of the current direction.
    pub fn set_direction(&mut self, direction: Direction) {
        if self.phase != Phase::Running {
            return;
        }
        if self.state.snake.direction.is_opposite(direction) {
            return;
        }
        self.pending_direction = Some(direction);
    }

    /// Flip between running and paused; no-op in any other phase
    pub fn toggle_pause(&mut self) {
        self.phase = match self.phase {
            Phase::Running => Phase::Paused,
            Phase::Paused => Phase::Running,
            other => other,
        };
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    /// Interval the driving timer should currently be armed at
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    fn initial_snake(config: &GameConfig) -> Snake {
        let center = (config.grid_size / 2) as i32;
        Snake::new(
            Position::new(center, center),
            INITIAL_DIRECTION,
            config.initial_snake_length,
        )
    }

    /// Fresh snake, food, score, and speed; phase becomes running
    fn begin(&mut self) {
        self.state = GameState::new(
            Self::initial_snake(&self.config),
            Position::new(0, 0),
            self.config.grid_size,
        );
        if let Some(food) = self.place_food() {
            self.state.food = food;
        }
        self.pending_direction = None;
        self.tick_interval = self.config.initial_tick_interval();
        self.phase = Phase::Running;
    }

    /// Terminal until a restart
    fn end(&mut self) {
        self.phase = Phase::Ended;
    }

    fn check_collision(&self, pos: Position) -> Option<CollisionType> {
        if !self.state.is_in_bounds(pos) {
            return Some(CollisionType::Wall);
        }
        if self.state.snake.collides_with_body(pos) {
            return Some(CollisionType::SelfCollision);
        }
        None
    }

    fn update_high_score(&mut self) {
        if self.state.score > self.high_score {
            self.high_score = self.state.score;
            // A store that cannot be written must not interrupt play
            let _ = self.store.save(self.high_score);
        }
    }

    fn speed_up(&mut self) {
        let floor = self.config.min_tick_interval();
        if self.tick_interval > floor {
            self.tick_interval = self
                .tick_interval
                .saturating_sub(self.config.tick_step())
                .max(floor);
        }
    }

    /// Pick a food cell not occupied by the snake
    ///
    /// Rejection-samples a bounded number of times, then enumerates the free
    /// cells so placement terminates even on a nearly full board. Returns
    /// `None` only when no free cell exists.
    fn place_food(&mut self) -> Option<Position> {
        let grid = self.state.grid_size as i32;
        let free_cells = self
            .config
            .cell_count()
            .saturating_sub(self.state.snake.len());
        if free_cells == 0 {
            return None;
        }

        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let pos = Position::new(self.rng.gen_range(0..grid), self.rng.gen_range(0..grid));
            if !self.state.snake.occupies(pos) {
                return Some(pos);
            }
        }

        let mut free = Vec::with_capacity(free_cells);
        for y in 0..grid {
            for x in 0..grid {
                let pos = Position::new(x, y);
                if !self.state.snake.occupies(pos) {
                    free.push(pos);
                }
            }
        }
        Some(free[self.rng.gen_range(0..free.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn session(config: GameConfig) -> GameSession {
        GameSession::new(config, Box::new(MemoryStore::default()))
    }

    fn running_session(config: GameConfig) -> GameSession {
        let mut session = session(config);
        session.start();
        session
    }

    /// Assert the board invariants that must hold in every reachable state
    fn assert_invariants(session: &GameSession) {
        let state = session.state();
        for (i, cell) in state.snake.body.iter().enumerate() {
            assert!(state.is_in_bounds(*cell), "snake cell off the board");
            for other in state.snake.body.iter().skip(i + 1) {
                assert_ne!(cell, other, "snake overlaps itself");
            }
        }
        assert!(state.is_in_bounds(state.food));
        if session.phase() == Phase::Running {
            assert!(!state.snake.occupies(state.food), "food on the snake");
        }
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = session(GameConfig::default());
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.state().score, 0);
        assert_eq!(session.state().snake.len(), 3);
        assert_invariants(&session);
    }

    #[test]
    fn test_start_only_from_idle() {
        let mut session = session(GameConfig::default());
        session.start();
        assert_eq!(session.phase(), Phase::Running);

        // A second start must not reset a game in progress
        session.state.score = 30;
        session.start();
        assert_eq!(session.state().score, 30);
        assert_eq!(session.phase(), Phase::Running);
    }

    #[test]
    fn test_tick_ignored_unless_running() {
        let mut session = session(GameConfig::default());
        let before = session.state().clone();
        assert_eq!(session.tick(), TickOutcome::Ignored);
        assert_eq!(*session.state(), before);

        session.start();
        session.toggle_pause();
        let before = session.state().clone();
        assert_eq!(session.tick(), TickOutcome::Ignored);
        assert_eq!(*session.state(), before);
    }

    #[test]
    fn test_tick_moves_without_growing() {
        let mut session = running_session(GameConfig::default());
        session.state.food = Position::new(0, 0);
        let head = session.state().snake.head();
        let len = session.state().snake.len();

        assert_eq!(session.tick(), TickOutcome::Moved);
        assert_eq!(session.state().snake.head(), head.moved_by(1, 0));
        assert_eq!(session.state().snake.len(), len);
        assert_eq!(session.state().score, 0);
        assert_invariants(&session);
    }

    #[test]
    fn test_eating_grows_scores_and_respawns_food() {
        let mut session = running_session(GameConfig::default());
        session.state.snake = Snake {
            body: vec![
                Position::new(10, 10),
                Position::new(9, 10),
                Position::new(8, 10),
            ],
            direction: Direction::Right,
        };
        session.state.food = Position::new(11, 10);

        assert_eq!(session.tick(), TickOutcome::Ate);
        assert_eq!(
            session.state().snake.body,
            vec![
                Position::new(11, 10),
                Position::new(10, 10),
                Position::new(9, 10),
            ]
        );
        assert_eq!(session.state().score, 10);
        assert!(!session.state().snake.occupies(session.state().food));
        assert_invariants(&session);
    }

    #[test]
    fn test_wall_collision_ends_game() {
        let mut session = running_session(GameConfig::default());
        session.state.snake = Snake::new(Position::new(0, 10), Direction::Left, 3);

        assert_eq!(
            session.tick(),
            TickOutcome::GameOver(CollisionType::Wall)
        );
        assert_eq!(session.phase(), Phase::Ended);
        assert_eq!(session.tick(), TickOutcome::Ignored);
    }

    #[test]
    fn test_self_collision_ends_game() {
        let mut session = running_session(GameConfig::default());
        // Length 4, then a tight right-down-left-up square turns the head
        // back onto the body
        session.state.snake = Snake::new(Position::new(5, 5), Direction::Right, 4);
        session.state.food = Position::new(0, 0);

        assert_eq!(session.tick(), TickOutcome::Moved);
        session.set_direction(Direction::Down);
        assert_eq!(session.tick(), TickOutcome::Moved);
        session.set_direction(Direction::Left);
        assert_eq!(session.tick(), TickOutcome::Moved);
        session.set_direction(Direction::Up);
        assert_eq!(
            session.tick(),
            TickOutcome::GameOver(CollisionType::SelfCollision)
        );
        assert_eq!(session.phase(), Phase::Ended);
    }

    #[test]
    fn test_reverse_direction_is_ignored() {
        let mut session = running_session(GameConfig::default());
        assert_eq!(session.state().snake.direction, Direction::Right);

        session.set_direction(Direction::Left);
        let head = session.state().snake.head();
        session.tick();

        // Still heading right
        assert_eq!(session.state().snake.direction, Direction::Right);
        assert_eq!(session.state().snake.head(), head.moved_by(1, 0));
    }

    #[test]
    fn test_direction_change_applies_on_next_tick() {
        let mut session = running_session(GameConfig::default());
        let head = session.state().snake.head();

        session.set_direction(Direction::Down);
        // Nothing moves until the tick
        assert_eq!(session.state().snake.head(), head);

        session.tick();
        assert_eq!(session.state().snake.head(), head.moved_by(0, 1));
        assert_eq!(session.state().snake.direction, Direction::Down);
    }

    #[test]
    fn test_direction_ignored_outside_running() {
        let mut session = session(GameConfig::default());
        session.set_direction(Direction::Down);
        session.start();
        let head = session.state().snake.head();
        session.tick();
        // The idle-phase request must not have stuck
        assert_eq!(session.state().snake.head(), head.moved_by(1, 0));
    }

    /// Walk the snake straight onto food placed in front of it
    fn feed_once(session: &mut GameSession) {
        let head = session.state().snake.head();
        let direction = session.state().snake.direction;
        session.state.food = head.moved_in_direction(direction);
        assert_eq!(session.tick(), TickOutcome::Ate);
    }

    #[test]
    fn test_speed_increases_per_food_until_floor() {
        let config = GameConfig {
            initial_tick_ms: 100,
            tick_step_ms: 30,
            min_tick_ms: 50,
            ..Default::default()
        };
        let mut session = running_session(config);
        assert_eq!(session.tick_interval(), Duration::from_millis(100));

        feed_once(&mut session);
        assert_eq!(session.tick_interval(), Duration::from_millis(70));

        feed_once(&mut session);
        assert_eq!(session.tick_interval(), Duration::from_millis(50));

        // Floored
        feed_once(&mut session);
        assert_eq!(session.tick_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_new_high_score_is_persisted() {
        let store = MemoryStore::default();
        let mut session =
            GameSession::new(GameConfig::default(), Box::new(store.clone()));
        session.start();

        feed_once(&mut session);
        assert_eq!(session.high_score(), 10);
        assert_eq!(store.value(), 10);
    }

    #[test]
    fn test_existing_high_score_not_lowered() {
        let store = MemoryStore::new(50);
        let mut session =
            GameSession::new(GameConfig::default(), Box::new(store.clone()));
        session.start();

        feed_once(&mut session);
        assert_eq!(session.state().score, 10);
        assert_eq!(session.high_score(), 50);
        assert_eq!(store.value(), 50);
    }

    #[test]
    fn test_restart_after_game_over() {
        let config = GameConfig::default();
        let initial_interval = config.initial_tick_interval();
        let mut session = running_session(config);

        feed_once(&mut session);
        session.state.snake = Snake::new(Position::new(0, 10), Direction::Left, 4);
        session.tick();
        assert_eq!(session.phase(), Phase::Ended);

        session.restart();
        assert_eq!(session.phase(), Phase::Running);
        assert_eq!(session.state().snake.len(), 3);
        assert_eq!(session.state().score, 0);
        assert_eq!(session.tick_interval(), initial_interval);
        // High score outlives the game
        assert_eq!(session.high_score(), 10);
        assert_invariants(&session);
    }

    #[test]
    fn test_toggle_pause_flips_running_and_paused() {
        let mut session = session(GameConfig::default());

        // No-op while idle
        session.toggle_pause();
        assert_eq!(session.phase(), Phase::Idle);

        session.start();
        session.state.food = Position::new(0, 0);
        session.toggle_pause();
        assert_eq!(session.phase(), Phase::Paused);
        session.toggle_pause();
        assert_eq!(session.phase(), Phase::Running);
        assert_eq!(session.tick(), TickOutcome::Moved);

        // No-op once ended
        session.state.snake = Snake::new(Position::new(0, 10), Direction::Left, 3);
        session.tick();
        session.toggle_pause();
        assert_eq!(session.phase(), Phase::Ended);
    }

    #[test]
    fn test_food_placement_avoids_a_crowded_snake() {
        let config = GameConfig {
            grid_size: 4,
            ..Default::default()
        };
        let mut session = running_session(config);
        // Snake occupying 12 of 16 cells
        session.state.snake = Snake {
            body: (0..3)
                .flat_map(|y| (0..4).map(move |x| Position::new(x, y)))
                .collect(),
            direction: Direction::Right,
        };

        for _ in 0..100 {
            let food = session.place_food().unwrap();
            assert!(!session.state().snake.occupies(food));
            assert!(session.state().is_in_bounds(food));
        }
    }

    #[test]
    fn test_food_placement_finds_the_last_free_cell() {
        let config = GameConfig {
            grid_size: 4,
            ..Default::default()
        };
        let mut session = running_session(config);
        // Every cell but (3, 3) occupied; sampling alone may never hit it
        let mut body: Vec<Position> = (0..4)
            .flat_map(|y| (0..4).map(move |x| Position::new(x, y)))
            .collect();
        body.retain(|pos| *pos != Position::new(3, 3));
        session.state.snake = Snake {
            body,
            direction: Direction::Right,
        };

        assert_eq!(session.place_food(), Some(Position::new(3, 3)));
    }

    #[test]
    fn test_filling_the_board_wins() {
        let config = GameConfig {
            grid_size: 2,
            ..Default::default()
        };
        let mut session = running_session(config);
        session.state.snake = Snake {
            body: vec![
                Position::new(1, 0),
                Position::new(1, 1),
                Position::new(0, 1),
            ],
            direction: Direction::Left,
        };
        session.state.food = Position::new(0, 0);

        assert_eq!(session.tick(), TickOutcome::Won);
        assert_eq!(session.phase(), Phase::Ended);
        assert_eq!(session.state().snake.len(), 4);
    }

    #[test]
    fn test_invariants_hold_across_random_play() {
        let mut rng = rand::thread_rng();
        let directions = [
            Direction::Up,
            Direction::Down,
            Direction::Left,
            Direction::Right,
        ];

        for _ in 0..20 {
            let mut session = running_session(GameConfig::small());
            for _ in 0..200 {
                session.set_direction(directions[rng.gen_range(0..4)]);
                match session.tick() {
                    TickOutcome::GameOver(_) | TickOutcome::Won => break,
                    TickOutcome::Moved | TickOutcome::Ate => assert_invariants(&session),
                    TickOutcome::Ignored => unreachable!("session was running"),
                }
            }
        }
    }
}
