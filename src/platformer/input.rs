//! Keyboard state for the platformer.
//!
//! Terminals either report key releases (kitty keyboard protocol) or they
//! don't. Without releases a key counts as held while presses keep arriving.
//! The first auto repeat of a terminal comes late (250 to 660 ms), the
//! following ones fast, so the press gets a long timeout and every repeat
//! after it a short one.

use std::time::{Duration, Instant};

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use tracing::trace;

use super::physics::FrameInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Left,
    Right,
    Jump,
}

impl Control {
    /// Arrow keys or a/d to move, ArrowUp and Space both jump.
    pub fn from_key(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::Left | KeyCode::Char('a') => Some(Control::Left),
            KeyCode::Right | KeyCode::Char('d') => Some(Control::Right),
            KeyCode::Up | KeyCode::Char(' ') => Some(Control::Jump),
            _ => None,
        }
    }

    fn index(self) -> usize {
        match self {
            Control::Left => 0,
            Control::Right => 1,
            Control::Jump => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldMode {
    /// The terminal sends release events.
    Reported,
    /// No release events. A fresh press is held for `first`, each repeat
    /// after it for `repeat`.
    Timeout { first: Duration, repeat: Duration },
}

#[derive(Debug, Clone, Copy, Default)]
struct KeyState {
    held: bool,
    last_seen: Option<Instant>,
    repeating: bool,
}

#[derive(Debug)]
pub struct KeyTracker {
    mode: HoldMode,
    keys: [KeyState; 3],
    jump_edge: bool,
}

impl KeyTracker {
    pub fn new(mode: HoldMode) -> Self {
        Self {
            mode,
            keys: [KeyState::default(); 3],
            jump_edge: false,
        }
    }

    /// Feed one key event. Returns false for keys that are not controls.
    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> bool {
        let Some(control) = Control::from_key(key.code) else {
            return false;
        };
        let was_held = self.is_held(control, now);
        let state = &mut self.keys[control.index()];

        match key.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => {
                state.held = true;
                state.last_seen = Some(now);
                state.repeating = was_held;
                // Only a fresh press is an edge, repeats of a held key are not
                if control == Control::Jump && key.kind == KeyEventKind::Press && !was_held {
                    self.jump_edge = true;
                }
            }
            KeyEventKind::Release => {
                state.held = false;
                state.last_seen = None;
                state.repeating = false;
            }
        }
        trace!("{control:?} {:?} (held before: {was_held})", key.kind);
        true
    }

    pub fn is_held(&self, control: Control, now: Instant) -> bool {
        let state = &self.keys[control.index()];
        match self.mode {
            HoldMode::Reported => state.held,
            HoldMode::Timeout { first, repeat } => {
                let timeout = if state.repeating { repeat } else { first };
                state
                    .last_seen
                    .is_some_and(|seen| now.saturating_duration_since(seen) < timeout)
            }
        }
    }

    /// Sample the controls for the next frame. Consumes the jump edge.
    pub fn frame_input(&mut self, now: Instant) -> FrameInput {
        let input = FrameInput {
            left: self.is_held(Control::Left, now),
            right: self.is_held(Control::Right, now),
            jump: self.jump_edge,
        };
        self.jump_edge = false;
        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::{KeyEventState, KeyModifiers};

    fn event(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn maps_both_jump_keys() {
        assert_eq!(Control::from_key(KeyCode::Up), Some(Control::Jump));
        assert_eq!(Control::from_key(KeyCode::Char(' ')), Some(Control::Jump));
        assert_eq!(Control::from_key(KeyCode::Left), Some(Control::Left));
        assert_eq!(Control::from_key(KeyCode::Right), Some(Control::Right));
        assert_eq!(Control::from_key(KeyCode::Char('x')), None);
    }

    #[test]
    fn reported_mode_tracks_press_and_release() {
        let now = Instant::now();
        let mut keys = KeyTracker::new(HoldMode::Reported);

        keys.handle_key(event(KeyCode::Left, KeyEventKind::Press), now);
        let later = now + Duration::from_secs(10);
        assert!(keys.frame_input(later).left);

        keys.handle_key(event(KeyCode::Left, KeyEventKind::Release), later);
        assert!(!keys.frame_input(later).left);
    }

    #[test]
    fn jump_edge_is_consumed_once() {
        let now = Instant::now();
        let mut keys = KeyTracker::new(HoldMode::Reported);

        keys.handle_key(event(KeyCode::Up, KeyEventKind::Press), now);
        assert!(keys.frame_input(now).jump);
        assert!(!keys.frame_input(now).jump);

        // Held-repeat never produces another edge
        keys.handle_key(event(KeyCode::Up, KeyEventKind::Repeat), now);
        keys.handle_key(event(KeyCode::Char(' '), KeyEventKind::Repeat), now);
        assert!(!keys.frame_input(now).jump);

        keys.handle_key(event(KeyCode::Up, KeyEventKind::Release), now);
        keys.handle_key(event(KeyCode::Up, KeyEventKind::Press), now);
        assert!(keys.frame_input(now).jump);
    }

    fn timeout_mode() -> HoldMode {
        HoldMode::Timeout {
            first: Duration::from_millis(600),
            repeat: Duration::from_millis(150),
        }
    }

    fn ms(start: Instant, millis: u64) -> Instant {
        start + Duration::from_millis(millis)
    }

    #[test]
    fn timeout_mode_expires_keys() {
        let start = Instant::now();
        let mut keys = KeyTracker::new(timeout_mode());

        keys.handle_key(event(KeyCode::Right, KeyEventKind::Press), start);
        assert!(keys.frame_input(ms(start, 550)).right);
        assert!(!keys.frame_input(ms(start, 650)).right);
    }

    #[test]
    fn held_through_first_repeat_delay() {
        let start = Instant::now();
        let mut keys = KeyTracker::new(timeout_mode());

        // Without release reporting, auto repeat arrives as presses
        keys.handle_key(event(KeyCode::Right, KeyEventKind::Press), start);
        keys.handle_key(event(KeyCode::Up, KeyEventKind::Press), start);
        assert!(keys.frame_input(start).jump);
        for t in (0..500).step_by(50) {
            assert!(keys.frame_input(ms(start, t)).right, "released at {t} ms");
        }

        keys.handle_key(event(KeyCode::Right, KeyEventKind::Press), ms(start, 500));
        keys.handle_key(event(KeyCode::Up, KeyEventKind::Press), ms(start, 500));
        let input = keys.frame_input(ms(start, 510));
        assert!(input.right);
        assert!(!input.jump);

        // Once repeating, the short timeout applies
        assert!(keys.frame_input(ms(start, 640)).right);
        assert!(!keys.frame_input(ms(start, 660)).right);
    }

    #[test]
    fn press_after_expiry_is_a_new_jump() {
        let start = Instant::now();
        let mut keys = KeyTracker::new(timeout_mode());

        keys.handle_key(event(KeyCode::Char(' '), KeyEventKind::Press), start);
        assert!(keys.frame_input(start).jump);

        keys.handle_key(event(KeyCode::Char(' '), KeyEventKind::Press), ms(start, 1000));
        assert!(keys.frame_input(ms(start, 1000)).jump);
    }

    #[test]
    fn non_controls_are_ignored() {
        let mut keys = KeyTracker::new(HoldMode::Reported);
        assert!(!keys.handle_key(event(KeyCode::Char('z'), KeyEventKind::Press), Instant::now()));
    }
}
