use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

// Single line editor for the filter input. The model routes raw key events
// here while the command line is active and reads back an InputResult per
// key; `finished` marks Enter, `canceled` marks Esc.
#[derive(Default)]
pub struct Inputter {
    current_input: String,
    curser_pos: usize, // in chars, 0..=char count
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub curser_pos: usize,
}

impl Inputter {
    pub fn read(&mut self, key: KeyEvent) -> InputResult {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, KeyModifiers::NONE) => self.finished = true,
            (KeyCode::Esc, KeyModifiers::NONE) => {
                self.current_input.clear();
                self.curser_pos = 0;
                self.canceled = true;
                self.finished = true;
            }
            (KeyCode::Backspace, KeyModifiers::NONE) => self.backspace(),
            (KeyCode::Left, KeyModifiers::NONE) => {
                self.curser_pos = self.curser_pos.saturating_sub(1)
            }
            (KeyCode::Right, KeyModifiers::NONE) => {
                if self.curser_pos < self.current_input.chars().count() {
                    self.curser_pos += 1;
                }
            }
            (code, _) => {
                if let Some(chr) = code.as_char() {
                    self.current_input.insert(self.byte_pos(), chr);
                    self.curser_pos += 1;
                }
            }
        }
        self.get()
    }

    // Preload the line, e.g. with the --filter startup value.
    pub fn set(&mut self, s: &str) {
        self.current_input = s.to_string();
        self.curser_pos = s.chars().count();
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            input: self.current_input.clone(),
            finished: self.finished,
            canceled: self.canceled,
            curser_pos: self.curser_pos,
        }
    }

    pub fn clear(&mut self) {
        self.current_input.clear();
        self.curser_pos = 0;
        self.finished = false;
        self.canceled = false;
    }

    fn backspace(&mut self) {
        if self.curser_pos > 0 {
            self.curser_pos -= 1;
            let pos = self.byte_pos();
            self.current_input.remove(pos);
        }
    }

    fn byte_pos(&self) -> usize {
        self.current_input
            .char_indices()
            .nth(self.curser_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}
