use std::fmt;
use std::io::Error;
use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

#[derive(Debug)]
pub enum GridError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    NoRows,
    FileNotFound,
    PermissionDenied,
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::IoError(e) => write!(f, "I/O error: {e}"),
            GridError::PolarsError(e) => write!(f, "Could not parse csv: {e}"),
            GridError::LoadingFailed(reason) => write!(f, "Loading failed: {reason}"),
            GridError::NoRows => write!(f, "File contains no rows"),
            GridError::FileNotFound => write!(f, "File not found"),
            GridError::PermissionDenied => write!(f, "Permission denied"),
        }
    }
}

impl std::error::Error for GridError {}

impl From<Error> for GridError {
    fn from(err: Error) -> Self {
        GridError::IoError(err)
    }
}

impl From<PolarsError> for GridError {
    fn from(err: PolarsError) -> Self {
        GridError::PolarsError(err)
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct GridConfig {
    pub event_poll_time: u64,
    pub initial_rows: usize,
    pub page_size: usize,
    pub highlight_millis: u64,
    pub max_column_width: usize,
    pub filter_ignore_case: bool,
    pub dark_mode: bool,
    pub compact_mode: bool,
    #[setters(strip_option)]
    pub import_path: Option<PathBuf>,
    pub export_path: PathBuf,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            initial_rows: 10_000,
            page_size: 10,
            highlight_millis: 5_000,
            max_column_width: 24,
            filter_ignore_case: false,
            dark_mode: false,
            compact_mode: false,
            import_path: None,
            export_path: PathBuf::from("table_data.csv"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Direction {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Filter,
    AddColumn,
    Import,
    Export,
}

impl CMDMode {
    pub fn prompt(&self) -> &'static str {
        match self {
            CMDMode::Filter => "Filter: ",
            CMDMode::AddColumn => "New column name: ",
            CMDMode::Import => "Import csv: ",
            CMDMode::Export => "Export csv: ",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    Enter,
    Exit,
    Help,
    Filter,
    AddColumn,
    RemoveColumn,
    MoveColumn(Direction),
    ToggleSort,
    Import,
    Export,
    Refresh,
    ToggleTheme,
    ToggleCompact,
    CopyRecord,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
gridview key bindings

  /        global filter
  a        add column
  x        remove selected column
  < >      move selected column left / right
  s        toggle sort on selected column
  i        import csv
  e        export csv
  r        refresh data
  t        toggle dark / light theme
  c        toggle compact rows
  n p      next / previous page
  g G      first / last page
  arrows   move selection (also h j k l)
  Enter    show record details
  y        copy record to clipboard
  Esc      close popup
  q        quit";
