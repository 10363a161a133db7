//! Terminal driver
//!
//! Owns the event loop that connects the terminal to the game session: a
//! crossterm event stream for input, one tick timer for simulation, and a
//! render timer for drawing. All arms run on a single task, so each handler
//! finishes before the next event is looked at.

use anyhow::{Context, Result};
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{Stderr, stderr};
use std::time::Duration;
use tokio::time::{Instant, Interval, interval, interval_at};

use crate::game::{GameConfig, GameSession, Phase, TickOutcome};
use crate::input::{InputHandler, KeyAction};
use crate::metrics::GameMetrics;
use crate::render::Renderer;
use crate::storage::HighScoreStore;

/// Frames per second for drawing, independent of game speed
const RENDER_INTERVAL: Duration = Duration::from_millis(33);

pub struct App {
    session: GameSession,
    metrics: GameMetrics,
    renderer: Renderer,
    input_handler: InputHandler,
    should_quit: bool,
}

impl App {
    pub fn new(config: GameConfig, store: Box<dyn HighScoreStore>) -> Self {
        Self {
            session: GameSession::new(config, store),
            metrics: GameMetrics::new(),
            renderer: Renderer::new(),
            input_handler: InputHandler::new(),
            should_quit: false,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        // Setup terminal
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stderr = stderr();
        execute!(stderr, EnterAlternateScreen).context("Failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stderr);
        let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;
        terminal.hide_cursor().context("Failed to hide cursor")?;
        terminal.clear().context("Failed to clear terminal")?;

        // Run event loop with cleanup
        let result = self.run_event_loop(&mut terminal).await;

        // Cleanup terminal
        self.cleanup_terminal(&mut terminal)?;

        result
    }

    async fn run_event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stderr>>,
    ) -> Result<()> {
        let mut event_stream = EventStream::new();

        let mut armed_interval = self.session.tick_interval();
        let mut tick_timer = arm_tick_timer(armed_interval);
        let mut render_timer = interval(RENDER_INTERVAL);

        loop {
            tokio::select! {
                // Handle terminal events
                maybe_event = event_stream.next() => {
                    if let Some(Ok(event)) = maybe_event {
                        self.handle_event(event);
                    }
                }

                // Game logic tick
                _ = tick_timer.tick() => {
                    self.advance_game();
                }

                // Render frame
                _ = render_timer.tick() => {
                    self.metrics.update();
                    terminal.draw(|frame| {
                        self.renderer.render(frame, &self.session, &self.metrics);
                    }).context("Failed to draw frame")?;
                }

                // Handle Ctrl+C
                _ = tokio::signal::ctrl_c() => {
                    self.should_quit = true;
                }
            }

            // The session changes its interval when food is eaten or a game
            // is (re)started; dropping the old timer before arming the new
            // one keeps a single tick driver alive
            if self.session.tick_interval() != armed_interval {
                armed_interval = self.session.tick_interval();
                tick_timer = arm_tick_timer(armed_interval);
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    fn handle_event(&mut self, event: Event) {
        if let Event::Key(key) = event {
            // Only process key press events, not release
            if key.kind != KeyEventKind::Press {
                return;
            }

            match self.input_handler.handle_key_event(key) {
                KeyAction::Turn(direction) => self.session.set_direction(direction),
                KeyAction::Start => {
                    if self.session.phase() == Phase::Idle {
                        self.session.start();
                        self.metrics.on_game_start();
                    }
                }
                KeyAction::TogglePause => self.session.toggle_pause(),
                KeyAction::Restart => {
                    self.session.restart();
                    self.metrics.on_game_start();
                }
                KeyAction::Quit => self.should_quit = true,
                KeyAction::None => {}
            }
        }
    }

    fn advance_game(&mut self) {
        match self.session.tick() {
            TickOutcome::GameOver(_) | TickOutcome::Won => self.metrics.on_game_over(),
            TickOutcome::Ignored | TickOutcome::Moved | TickOutcome::Ate => {}
        }
    }

    fn cleanup_terminal(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stderr>>,
    ) -> Result<()> {
        disable_raw_mode().context("Failed to disable raw mode")?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)
            .context("Failed to leave alternate screen")?;
        terminal.show_cursor().context("Failed to show cursor")?;
        Ok(())
    }
}

/// Arm the single tick timer; the first tick fires a full period from now
fn arm_tick_timer(period: Duration) -> Interval {
    interval_at(Instant::now() + period, period)
}
