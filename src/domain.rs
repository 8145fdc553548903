use std::io::Error;

// Crate wide error type. Library errors get wrapped so that all fallible
// paths can return the same Result.
#[derive(Debug)]
pub enum RRError {
    IoError(Error),
    JsonError(serde_json::Error),
    LoadingFailed(String),
    FileNotFound(String),
    PermissionDenied(String),
    UnknownTopic(String),
}

impl From<Error> for RRError {
    fn from(err: Error) -> Self {
        RRError::IoError(err)
    }
}

impl From<serde_json::Error> for RRError {
    fn from(err: serde_json::Error) -> Self {
        RRError::JsonError(err)
    }
}

impl std::fmt::Display for RRError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RRError::IoError(e) => write!(f, "I/O error: {e}"),
            RRError::JsonError(e) => write!(f, "Invalid JSON: {e}"),
            RRError::LoadingFailed(msg) => write!(f, "Loading failed: {msg}"),
            RRError::FileNotFound(path) => write!(f, "File not found: {path}"),
            RRError::PermissionDenied(path) => write!(f, "Permission denied: {path}"),
            RRError::UnknownTopic(topic) => write!(f, "No topic matches {topic}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RRConfig {
    pub data_dir: String,
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub render_chunk_size: usize,
}

impl Default for RRConfig {
    fn default() -> Self {
        RRConfig {
            data_dir: "docs".to_string(),
            event_poll_time: 100,
            max_column_width: 60,
            render_chunk_size: 1000,
        }
    }
}

// Messages the controller emits from raw terminal events. The model decides
// what each one means in its current modus.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    EnterFilter,
    SortColumn,
    SelectTopic,
    ToggleIndex,
    CopyLink,
    CopyRow,
    Help,
    Enter,
    Exit,
    Resize(usize, usize),
    RawKey(ratatui::crossterm::event::KeyEvent),
}

// Command line input modes. Only the filter line exists today.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Filter,
}

pub const HELP_TEXT: &str = "reporecon - Github topic repository browser

  arrows / PgUp / PgDn   move selection
  Home / End             jump to first / last row
  t                      select a topic
  /                      filter rows (column:value value ...)
  Esc                    clear the active filter / close view
  s                      sort by the selected column (repeat to toggle)
  Enter                  show the selected repository record
  i                      toggle row numbers
  c                      copy the repository link
  C                      copy the whole row
  ?                      this help
  q                      quit
";
