use std::fmt;
use std::io::Error;
use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

pub const HELP_TEXT: &str = "\
Table viewer

  /            Focus the search box (Enter / Esc to leave, Esc clears)
  s            Toggle sort order
  a / d        Sort ascending / descending
  t            Toggle light / dark theme
  Up / Down    Move selection
  PgUp / PgDn  Move selection by a page
  Home / End   Jump to first / last row
  o / Enter    Copy the link of the selected row
  ?            Show this help
  q            Quit

Press Esc to close.";

pub const LOAD_ERROR_TITLE: &str = "Error Loading Data";
pub const LOAD_ERROR_TEXT: &str =
    "Unable to load the data. Please make sure the file exists and is in the correct format.";

/// Every failure the crate can surface.
///
/// The table viewer folds all loading variants into a single visible notice;
/// the variant itself only ends up in the log.
#[derive(Debug)]
pub enum TVError {
    IoError(Error),
    PolarsError(PolarsError),
    SpreadsheetError(calamine::Error),
    SettingsError(serde_json::Error),
    LoadingFailed(String),
    EmptyData,
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    InvalidArgument(String),
}

impl fmt::Display for TVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TVError::IoError(e) => write!(f, "i/o error: {e}"),
            TVError::PolarsError(e) => write!(f, "could not read table: {e}"),
            TVError::SpreadsheetError(e) => write!(f, "could not read spreadsheet: {e}"),
            TVError::SettingsError(e) => write!(f, "invalid settings file: {e}"),
            TVError::LoadingFailed(reason) => write!(f, "loading failed: {reason}"),
            TVError::EmptyData => write!(f, "no data found in file"),
            TVError::FileNotFound => write!(f, "file not found"),
            TVError::PermissionDenied => write!(f, "permission denied"),
            TVError::UnknownFileType => write!(f, "unknown file type"),
            TVError::InvalidArgument(reason) => write!(f, "invalid argument: {reason}"),
        }
    }
}

impl std::error::Error for TVError {}

impl From<Error> for TVError {
    fn from(err: Error) -> Self {
        TVError::IoError(err)
    }
}

impl From<PolarsError> for TVError {
    fn from(err: PolarsError) -> Self {
        TVError::PolarsError(err)
    }
}

impl From<calamine::Error> for TVError {
    fn from(err: calamine::Error) -> Self {
        TVError::SpreadsheetError(err)
    }
}

impl From<serde_json::Error> for TVError {
    fn from(err: serde_json::Error) -> Self {
        TVError::SettingsError(err)
    }
}

/// Theme preference location unless `--settings` names another one.
pub const DEFAULT_SETTINGS_PATH: &str = "~/.config/tview/settings.json";

/// Runtime settings of the table viewer.
#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct TVConfig {
    /// Upper bound in ms for a single wait on terminal events.
    pub event_poll_time: u64,
    /// Quiet period after the last keystroke before the search is applied.
    pub debounce_ms: u64,
    pub max_column_width: usize,
    /// Capacity of the pending terminal event queue.
    pub event_queue_size: usize,
    pub settings_path: PathBuf,
}

impl Default for TVConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            debounce_ms: 300,
            max_column_width: 40,
            event_queue_size: 64,
            settings_path: PathBuf::from(shellexpand::tilde(DEFAULT_SETTINGS_PATH).as_ref()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn toggle(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "A-Z",
            SortOrder::Descending => "Z-A",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Search,
    ToggleSort,
    SortAscending,
    SortDescending,
    ToggleTheme,
    CopyLink,
    Help,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}
