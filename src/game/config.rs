use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Side length of the square grid, in cells
    pub grid_size: usize,
    /// Initial length of the snake
    pub initial_snake_length: usize,
    /// Points granted per food eaten
    pub food_reward: u32,

    // Acceleration curve
    /// Tick interval at the start of a game, in milliseconds
    pub initial_tick_ms: u64,
    /// How much the tick interval shrinks per food eaten, in milliseconds
    pub tick_step_ms: u64,
    /// Tick interval below which the game no longer accelerates
    pub min_tick_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid_size: 20,
            initial_snake_length: 3,
            food_reward: 10,
            initial_tick_ms: 200,
            tick_step_ms: 10,
            min_tick_ms: 80,
        }
    }
}

impl GameConfig {
    /// Create a small grid for testing
    pub fn small() -> Self {
        Self {
            grid_size: 10,
            ..Default::default()
        }
    }

    /// Tick interval at the start of a game
    pub fn initial_tick_interval(&self) -> Duration {
        Duration::from_millis(self.initial_tick_ms)
    }

    /// Per-food reduction of the tick interval
    pub fn tick_step(&self) -> Duration {
        Duration::from_millis(self.tick_step_ms)
    }

    /// The speed floor
    pub fn min_tick_interval(&self) -> Duration {
        Duration::from_millis(self.min_tick_ms)
    }

    /// Total number of cells on the board
    pub fn cell_count(&self) -> usize {
        self.grid_size * self.grid_size
    }
}
