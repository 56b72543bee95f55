//! A minimal platformer running in the terminal.

pub mod input;
pub mod physics;
pub mod render;

use std::io::stdout;
use std::time::{Duration, Instant};

use derive_setters::Setters;
use ratatui::DefaultTerminal;
use ratatui::crossterm::event::{
    self, Event, KeyCode, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use ratatui::crossterm::{execute, terminal::supports_keyboard_enhancement};
use tracing::{debug, info, warn};

use crate::domain::TVError;
use crate::queue::EventQueue;
use input::{HoldMode, KeyTracker};
use physics::{PhysicsConfig, World};
use render::FieldView;

const CONTROLS_HINT: &str = "←/a →/d move | ↑/space jump | q quit";

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct PlatformerConfig {
    pub physics: PhysicsConfig,
    pub fps: u32,
    /// How long a fresh press counts as held without release reporting.
    /// Must outlast the terminal's delay before auto repeat starts.
    pub key_hold_ms: u64,
    /// Hold time after each auto repeat.
    pub key_repeat_ms: u64,
    pub event_queue_size: usize,
}

impl Default for PlatformerConfig {
    fn default() -> Self {
        Self {
            physics: PhysicsConfig::default(),
            fps: 60,
            key_hold_ms: 600,
            key_repeat_ms: 150,
            event_queue_size: 64,
        }
    }
}

impl PlatformerConfig {
    pub fn frame_time(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }
}

/// Game state plus the input feeding it.
pub struct Game {
    pub world: World,
    keys: KeyTracker,
    queue: EventQueue<Event>,
    running: bool,
}

impl Game {
    pub fn new(config: &PlatformerConfig, mode: HoldMode) -> Self {
        Self {
            world: World::new(config.physics.clone()),
            keys: KeyTracker::new(mode),
            queue: EventQueue::new(config.event_queue_size),
            running: true,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn push_event(&mut self, event: Event) {
        self.queue.push(event);
    }

    /// Apply all queued events to the key state.
    pub fn drain_events(&mut self, now: Instant) {
        while let Some(event) = self.queue.pop() {
            let Event::Key(key) = event else {
                continue;
            };
            let quit = matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                || (key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL);
            if quit && key.kind == KeyEventKind::Press {
                info!(
                    "Quit requested at frame {}, {} events dropped",
                    self.world.frame(),
                    self.queue.dropped()
                );
                self.running = false;
                return;
            }
            self.keys.handle_key(key, now);
        }
    }

    /// Advance the world by one frame.
    pub fn step(&mut self, now: Instant) {
        let input = self.keys.frame_input(now);
        self.world.update(&input);
    }
}

pub fn run(config: PlatformerConfig) -> Result<(), TVError> {
    let mut terminal = ratatui::init();
    let enhanced = match supports_keyboard_enhancement() {
        Ok(true) => execute!(
            stdout(),
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )
        .is_ok(),
        Ok(false) => false,
        Err(e) => {
            warn!("Could not query keyboard enhancement support: {e}");
            false
        }
    };
    let mode = if enhanced {
        HoldMode::Reported
    } else {
        HoldMode::Timeout {
            first: Duration::from_millis(config.key_hold_ms),
            repeat: Duration::from_millis(config.key_repeat_ms),
        }
    };
    info!("Starting platformer at {} fps, key mode {mode:?}", config.fps);

    let result = game_loop(&mut terminal, &config, mode);

    if enhanced {
        if let Err(e) = execute!(stdout(), PopKeyboardEnhancementFlags) {
            warn!("Failed to restore keyboard flags: {e}");
        }
    }
    ratatui::restore();
    result
}

fn game_loop(
    terminal: &mut DefaultTerminal,
    config: &PlatformerConfig,
    mode: HoldMode,
) -> Result<(), TVError> {
    let frame_time = config.frame_time();
    let mut game = Game::new(config, mode);
    let mut next_frame = Instant::now();

    while game.running() {
        let timeout = next_frame.saturating_duration_since(Instant::now());
        if event::poll(timeout)? {
            loop {
                game.push_event(event::read()?);
                if !event::poll(Duration::ZERO)? {
                    break;
                }
            }
        }
        let now = Instant::now();
        game.drain_events(now);
        if !game.running() || now < next_frame {
            continue;
        }

        game.step(now);
        terminal.draw(|f| f.render_widget(FieldView::new(&game.world, CONTROLS_HINT), f.area()))?;

        next_frame += frame_time;
        // Drop frames instead of catching up after a stall
        if next_frame < now {
            debug!("Frame {} late, resyncing", game.world.frame());
            next_frame = now + frame_time;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn press(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn quit_keys_stop_the_game() {
        for code in [KeyCode::Char('q'), KeyCode::Esc] {
            let mut game = Game::new(&PlatformerConfig::default(), HoldMode::Reported);
            game.push_event(press(code));
            game.drain_events(Instant::now());
            assert!(!game.running());
        }
    }

    #[test]
    fn held_right_moves_player() {
        let mut game = Game::new(&PlatformerConfig::default(), HoldMode::Reported);
        let now = Instant::now();
        let start_x = game.world.player.body.x;

        game.push_event(press(KeyCode::Right));
        game.drain_events(now);
        for _ in 0..3 {
            game.step(now);
        }
        assert_eq!(game.world.player.body.x, start_x + 15.0);
        assert_eq!(game.world.frame(), 3);
    }

    #[test]
    fn frame_time_from_fps() {
        let config = PlatformerConfig::default().with_fps(50);
        assert_eq!(config.frame_time(), Duration::from_millis(20));
        // Zero fps is treated as one
        let config = PlatformerConfig::default().with_fps(0);
        assert_eq!(config.frame_time(), Duration::from_secs(1));
    }
}
