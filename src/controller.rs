use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, RRConfig, RRError};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &RRConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    // Poll the terminal for one event and map it to a Message. Returns None
    // on the poll timeout; the model uses those empty ticks to advance an
    // in-flight render.
    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, RRError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    // While the command line is active, keys go to the line
                    // editor untranslated.
                    if model.raw_keyevents() {
                        return Ok(Some(Message::RawKey(key)));
                    }
                    return Ok(self.handle_key(key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Up => Some(Message::MoveUp),
            KeyCode::Down => Some(Message::MoveDown),
            KeyCode::Left => Some(Message::MoveLeft),
            KeyCode::Right => Some(Message::MoveRight),
            KeyCode::PageUp => Some(Message::MovePageUp),
            KeyCode::PageDown => Some(Message::MovePageDown),
            KeyCode::Home => Some(Message::MoveBeginning),
            KeyCode::End => Some(Message::MoveEnd),
            KeyCode::Char('/') => Some(Message::EnterFilter),
            KeyCode::Char('s') => Some(Message::SortColumn),
            KeyCode::Char('t') => Some(Message::SelectTopic),
            KeyCode::Char('i') => Some(Message::ToggleIndex),
            KeyCode::Char('c') => Some(Message::CopyLink),
            KeyCode::Char('C') => Some(Message::CopyRow),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Esc => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
