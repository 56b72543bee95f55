use std::time::{Duration, Instant};
use tracing::trace;

use crate::domain::{Message, TVConfig, TVError};
use crate::model::Model;
use crate::queue::EventQueue;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Turns terminal events into messages for the model.
///
/// Events are first drained into a bounded queue and only mapped when they
/// are taken out, so a key that switches modes affects the keys behind it.
pub struct Controller {
    event_poll_time: u64,
    queue: EventQueue<Event>,
}

impl Controller {
    pub fn new(cfg: &TVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
            queue: EventQueue::new(cfg.event_queue_size),
        }
    }

    /// Wait for terminal events and queue everything that is available.
    /// The wait never outlasts a pending debounce deadline of the model.
    pub fn poll_events(&mut self, model: &Model) -> Result<(), TVError> {
        let mut timeout = Duration::from_millis(self.event_poll_time);
        if let Some(deadline) = model.next_deadline(Instant::now()) {
            timeout = timeout.min(deadline);
        }

        if event::poll(timeout)? {
            loop {
                self.queue.push(event::read()?);
                if !event::poll(Duration::ZERO)? {
                    break;
                }
            }
        }
        Ok(())
    }

    pub fn push_event(&mut self, event: Event) {
        self.queue.push(event);
    }

    /// Next message for the model, skipping events that map to nothing.
    pub fn next_message(&mut self, model: &Model) -> Option<Message> {
        while let Some(event) = self.queue.pop() {
            if let Some(message) = self.map_event(event, model) {
                return Some(message);
            }
        }
        None
    }

    fn map_event(&self, event: Event, model: &Model) -> Option<Message> {
        match event {
            Event::Resize(width, height) => Some(Message::Resize(width as usize, height as usize)),
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                // Ctrl-C quits from every mode, including the search box
                if key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL {
                    Some(Message::Quit)
                } else if model.raw_keyevents() {
                    Some(Message::RawKey(key))
                } else {
                    self.handle_key(key)
                }
            }
            _ => None,
        }
    }

    fn handle_key(&self, key: KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Char('s'), _) => Some(Message::ToggleSort),
            (KeyCode::Char('a'), _) => Some(Message::SortAscending),
            (KeyCode::Char('d'), _) => Some(Message::SortDescending),
            (KeyCode::Char('t'), _) => Some(Message::ToggleTheme),
            (KeyCode::Char('o'), _) | (KeyCode::Enter, _) => Some(Message::CopyLink),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(Message::MoveDown),
            (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(Message::MoveUp),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::Char('g'), _) | (KeyCode::Home, _) => Some(Message::MoveBeginning),
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => Some(Message::MoveEnd),
            (KeyCode::Esc, _) => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Dataset;
    use std::path::Path;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn setup(dir: &tempfile::TempDir) -> (Controller, Model) {
        let cfg = TVConfig::default().with_settings_path(dir.path().join("settings.json"));
        let mut model = Model::init(&cfg, Path::new("datos.csv"));
        model.finish_loading(Ok(Dataset::new(
            "datos.csv",
            vec!["Name".into()],
            vec![vec!["alpha".into()], vec!["beta".into()]],
        )));
        (Controller::new(&cfg), model)
    }

    #[test]
    fn table_keys_map_to_messages() {
        let dir = tempfile::tempdir().unwrap();
        let (mut controller, model) = setup(&dir);

        controller.push_event(key(KeyCode::Char('s')));
        controller.push_event(key(KeyCode::Char('x')));
        controller.push_event(Event::Resize(100, 40));

        assert!(matches!(
            controller.next_message(&model),
            Some(Message::ToggleSort)
        ));
        // 'x' maps to nothing and is skipped
        assert!(matches!(
            controller.next_message(&model),
            Some(Message::Resize(100, 40))
        ));
        assert!(controller.next_message(&model).is_none());
    }

    #[test]
    fn mode_switch_applies_to_following_keys() {
        let dir = tempfile::tempdir().unwrap();
        let (mut controller, mut model) = setup(&dir);

        controller.push_event(key(KeyCode::Char('/')));
        controller.push_event(key(KeyCode::Char('s')));

        let first = controller.next_message(&model);
        assert!(matches!(first, Some(Message::Search)));
        model.update(first).unwrap();

        // In search mode 's' is text, not a sort toggle
        match controller.next_message(&model) {
            Some(Message::RawKey(k)) => assert_eq!(k.code, KeyCode::Char('s')),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ctrl_c_quits_from_search() {
        let dir = tempfile::tempdir().unwrap();
        let (mut controller, mut model) = setup(&dir);

        controller.push_event(key(KeyCode::Char('/')));
        let search = controller.next_message(&model);
        model.update(search).unwrap();
        assert!(model.raw_keyevents());

        controller.push_event(Event::Key(KeyEvent::new(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL,
        )));
        let quit = controller.next_message(&model);
        assert!(matches!(quit, Some(Message::Quit)));
        model.update(quit).unwrap();
        assert_eq!(model.status, crate::model::Status::QUITTING);
    }

    #[test]
    fn release_events_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (mut controller, model) = setup(&dir);
        let mut release = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        controller.push_event(Event::Key(release));
        assert!(controller.next_message(&model).is_none());
    }
}
