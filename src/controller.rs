use std::time::Duration;
use tracing::trace;

use crate::domain::{Direction, GridConfig, GridError, Message};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &GridConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    /// Waits up to the poll time for an event. Returns None on timeout so the
    /// model still gets a chance to run timers and pick up finished imports.
    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, GridError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                if model.raw_keyevents() {
                    Ok(Some(Message::RawKey(key)))
                } else {
                    Ok(self.handle_key(key))
                }
            }
            Event::Resize(width, height) => {
                Ok(Some(Message::Resize(width as usize, height as usize)))
            }
            _ => Ok(None),
        }
    }

    pub fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Down | KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Up | KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Left | KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right | KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::PageDown | KeyCode::Char('n'), _) => Some(Message::NextPage),
            (KeyCode::PageUp | KeyCode::Char('p'), _) => Some(Message::PreviousPage),
            (KeyCode::Home | KeyCode::Char('g'), _) => Some(Message::FirstPage),
            (KeyCode::End | KeyCode::Char('G'), _) => Some(Message::LastPage),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Char('/'), _) => Some(Message::Filter),
            (KeyCode::Char('a'), _) => Some(Message::AddColumn),
            (KeyCode::Char('x'), _) => Some(Message::RemoveColumn),
            (KeyCode::Char('<'), _) => Some(Message::MoveColumn(Direction::Left)),
            (KeyCode::Char('>'), _) => Some(Message::MoveColumn(Direction::Right)),
            (KeyCode::Char('s'), _) => Some(Message::ToggleSort),
            (KeyCode::Char('i'), _) => Some(Message::Import),
            (KeyCode::Char('e'), _) => Some(Message::Export),
            (KeyCode::Char('r'), _) => Some(Message::Refresh),
            (KeyCode::Char('t'), _) => Some(Message::ToggleTheme),
            (KeyCode::Char('c'), _) => Some(Message::ToggleCompact),
            (KeyCode::Char('y'), _) => Some(Message::CopyRecord),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> Option<Message> {
        let controller = Controller::new(&GridConfig::default());
        controller.handle_key(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn maps_keys() {
        assert!(matches!(key(KeyCode::Char('q'), KeyModifiers::NONE), Some(Message::Quit)));
        assert!(matches!(
            key(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Some(Message::Quit)
        ));
        assert!(matches!(
            key(KeyCode::Char('c'), KeyModifiers::NONE),
            Some(Message::ToggleCompact)
        ));
        assert!(matches!(
            key(KeyCode::Char('<'), KeyModifiers::SHIFT),
            Some(Message::MoveColumn(Direction::Left))
        ));
        assert!(key(KeyCode::Char('z'), KeyModifiers::NONE).is_none());
    }
}
