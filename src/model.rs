use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, error, info, trace, warn};
use tracing_error::SpanTrace;

use crate::debounce::Debouncer;
use crate::domain::{LOAD_ERROR_TEXT, Message, SortOrder, TVConfig, TVError};
use crate::filter::{FilterOutcome, filter_and_sort};
use crate::inputter::{InputResult, Inputter};
use crate::links::row_link;
use crate::table::{Dataset, Row};
use crate::theme::{Theme, ThemeStore};
use crate::ui::UILayout;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Status {
    LOADING,
    READY,
    FAILED,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    SEARCH,
    POPUP,
}

/// Everything the ui needs for one frame, borrowed from the model.
pub struct UIData<'a> {
    pub name: &'a str,
    pub status: Status,
    pub headers: &'a [String],
    pub rows: Vec<&'a Row>, // Rows inside the visible window, in display order
    pub nrows: usize,       // Rows in the current view
    pub total_rows: usize,  // Rows in the source
    pub selected_row: usize,
    pub abs_selected_row: usize,
    pub no_results: Option<&'a str>,
    pub search: &'a InputResult,
    pub active_search: bool,
    pub sort_order: SortOrder,
    pub theme: Theme,
    pub tooltip: Option<String>,
    pub show_help: bool,
    pub status_message: &'a str,
    pub error: Option<&'a str>,
    pub max_column_width: usize,
}

/// State of the table viewer. Only `update`, `tick` and `finish_loading`
/// mutate it; the ui reads it through `get_uidata`.
pub struct Model {
    config: TVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    source: PathBuf,
    data: Dataset,
    view: FilterOutcome,
    cursor_row: usize,
    offset_row: usize,
    sort_order: SortOrder,
    input: Inputter,
    last_input: InputResult,
    applied_term: String,
    debounce: Debouncer,
    theme: Theme,
    theme_store: ThemeStore,
    clipboard: Option<Clipboard>,
    uilayout: UILayout,
    status_message: String,
    // Feedback of the last action, shown instead of the tooltip until the
    // selection moves or the view changes
    notice: bool,
    load_error: Option<String>,
}

impl Model {
    pub fn init(config: &TVConfig, source: &Path) -> Self {
        let theme_store = ThemeStore::new(config.settings_path.clone());
        let theme = theme_store.initial_theme();
        Self {
            config: config.clone(),
            status: Status::LOADING,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            source: source.to_path_buf(),
            data: Dataset::default(),
            view: FilterOutcome::Matches(Vec::new()),
            cursor_row: 0,
            offset_row: 0,
            sort_order: SortOrder::Ascending,
            input: Inputter::default(),
            last_input: InputResult::default(),
            applied_term: String::new(),
            debounce: Debouncer::new(Duration::from_millis(config.debounce_ms)),
            theme,
            theme_store,
            clipboard: None,
            uilayout: UILayout::default(),
            status_message: "Loading ...".to_string(),
            notice: false,
            load_error: None,
        }
    }

    /// Takes the result of the startup load. Any failure replaces the whole
    /// table with one notice; the cause only goes to the log.
    pub fn finish_loading(&mut self, result: Result<Dataset, TVError>) {
        match result {
            Ok(data) => {
                info!(
                    "Showing {} rows x {} columns of {:?}",
                    data.rows.len(),
                    data.ncolumns(),
                    self.source
                );
                self.data = data;
                self.status = Status::READY;
                self.refilter();
            }
            Err(e) => {
                error!(
                    "Error processing {:?}: {e:?}\n{}",
                    self.source,
                    SpanTrace::capture()
                );
                self.status = Status::FAILED;
                self.load_error = Some(LOAD_ERROR_TEXT.to_string());
                self.set_status_message(format!("Failed to load {}", self.source.display()));
            }
        }
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::SEARCH
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    /// How long the event loop may sleep before `tick` has work to do.
    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        self.debounce.remaining(now)
    }

    /// Applies a pending search once its debounce delay has passed.
    pub fn tick(&mut self, now: Instant) {
        if self.debounce.fire(now) {
            trace!("Debounce elapsed, applying search");
            self.apply_search();
        }
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), TVError> {
        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_selection_down(1),
                    Message::MoveUp => self.move_selection_up(1),
                    Message::MovePageUp => self.move_selection_up(self.page_size()),
                    Message::MovePageDown => self.move_selection_down(self.page_size()),
                    Message::MoveBeginning => self.move_to(0),
                    Message::MoveEnd => self.move_selection_end(),
                    Message::Search => self.enter_search(),
                    Message::ToggleSort => self.set_sort_order(self.sort_order.toggle()),
                    Message::SortAscending => self.set_sort_order(SortOrder::Ascending),
                    Message::SortDescending => self.set_sort_order(SortOrder::Descending),
                    Message::ToggleTheme => self.toggle_theme(),
                    Message::CopyLink => self.copy_link(),
                    Message::Help => self.show_help(),
                    Message::Exit => self.clear_search(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::RawKey(_) => (),
                },
                Modus::SEARCH => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Quit => self.quit(),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Help => self.close_popup(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }
        Ok(())
    }

    pub fn get_uidata(&self) -> UIData<'_> {
        let rows = self.view.rows();
        let rbegin = self.offset_row.min(rows.len());
        let rend = std::cmp::min(rbegin + self.uilayout.table_height, rows.len());
        let window = rows[rbegin..rend]
            .iter()
            .map(|&idx| &self.data.rows[idx])
            .collect::<Vec<&Row>>();

        let tooltip = if self.notice {
            None
        } else {
            self.selected_data_row()
                .and_then(|row| row_link(row))
                .map(|(_, tooltip)| tooltip)
        };

        let no_results = match &self.view {
            FilterOutcome::NoResults { term } => Some(term.as_str()),
            FilterOutcome::Matches(_) => None,
        };

        UIData {
            name: &self.data.name,
            status: self.status,
            headers: &self.data.headers,
            rows: window,
            nrows: rows.len(),
            total_rows: self.data.rows.len(),
            selected_row: self.cursor_row,
            abs_selected_row: self.offset_row + self.cursor_row,
            no_results,
            search: &self.last_input,
            active_search: self.modus == Modus::SEARCH,
            sort_order: self.sort_order,
            theme: self.theme,
            tooltip,
            show_help: self.modus == Modus::POPUP,
            status_message: &self.status_message,
            error: self.load_error.as_deref(),
            max_column_width: self.config.max_column_width,
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    // -------------------- View derivation ---------------------- //

    fn refilter(&mut self) {
        self.view = filter_and_sort(&self.data.rows, &self.applied_term, self.sort_order);
        self.cursor_row = 0;
        self.offset_row = 0;
        match &self.view {
            FilterOutcome::Matches(rows) => {
                let message = format!("Showing {} of {} rows", rows.len(), self.data.rows.len());
                self.set_status_message(message);
            }
            FilterOutcome::NoResults { term } => {
                let message = format!("No results found for \"{term}\"");
                self.set_status_message(message);
            }
        }
    }

    fn apply_search(&mut self) {
        self.applied_term = self.last_input.input.trim().to_string();
        debug!("Applying search {:?}", self.applied_term);
        if self.status == Status::READY {
            self.refilter();
        }
    }

    // Sort changes use the current input right away, no debounce
    fn set_sort_order(&mut self, order: SortOrder) {
        trace!("Sort order {:?} -> {:?}", self.sort_order, order);
        self.sort_order = order;
        self.debounce.cancel();
        self.apply_search();
    }

    fn clear_search(&mut self) {
        if self.last_input.input.is_empty() && self.applied_term.is_empty() {
            return;
        }
        self.input.clear();
        self.last_input = self.input.get();
        self.debounce.cancel();
        self.apply_search();
    }

    // -------------------- Control handling functions ---------------------- //

    fn enter_search(&mut self) {
        trace!("Entering search mode ...");
        self.previous_modus = self.modus;
        self.modus = Modus::SEARCH;
        self.input.resume();
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.changed {
            self.debounce.schedule(Instant::now());
        }
        if self.last_input.finished {
            self.modus = self.previous_modus;
            self.previous_modus = Modus::SEARCH;
            // Leaving the box applies whatever is still pending
            if self.debounce.is_pending() {
                self.debounce.cancel();
                self.apply_search();
            }
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
    }

    fn toggle_theme(&mut self) {
        self.theme = self.theme.toggle();
        match self.theme_store.save(self.theme) {
            Ok(_) => self.notify(format!("Theme: {}", self.theme.as_str())),
            Err(e) => {
                warn!("Could not save theme to {:?}: {e}", self.theme_store.path());
                self.notify(format!("Theme: {} (not saved)", self.theme.as_str()));
            }
        }
    }

    fn copy_link(&mut self) {
        let Some(url) = self
            .selected_data_row()
            .and_then(|row| row_link(row))
            .map(|(url, _)| url.to_string())
        else {
            self.notify("No link on this row");
            return;
        };

        if self.clipboard.is_none() {
            self.clipboard = Clipboard::new()
                .map_err(|e| warn!("Clipboard unavailable: {e:?}"))
                .ok();
        }
        let copied = match self.clipboard.as_mut() {
            Some(clipboard) => clipboard.set_text(url.clone()),
            None => {
                self.notify("Clipboard unavailable");
                return;
            }
        };
        match copied {
            Ok(_) => {
                trace!("Copied link to clipboard.");
                self.notify(format!("Copied {url}"));
            }
            Err(e) => {
                trace!("Error copying to clipboard: {:?}", e);
                self.notify("Copy failed");
            }
        }
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        let abs = self.offset_row + self.cursor_row;
        self.uilayout = UILayout::from_values(width, height);
        self.select_row(abs);
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.notice = false;
    }

    fn notify(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.notice = true;
    }

    // -------------------- Selection ---------------------- //

    fn selected_data_row(&self) -> Option<&Row> {
        self.view
            .rows()
            .get(self.offset_row + self.cursor_row)
            .map(|&idx| &self.data.rows[idx])
    }

    fn page_size(&self) -> usize {
        self.uilayout.table_height.max(1)
    }

    fn select_row(&mut self, abs: usize) {
        let nrows = self.view.rows().len();
        if nrows == 0 {
            self.cursor_row = 0;
            self.offset_row = 0;
            return;
        }
        let abs = abs.min(nrows - 1);
        let height = self.page_size();
        if abs < self.offset_row {
            self.offset_row = abs;
        } else if abs >= self.offset_row + height {
            self.offset_row = abs + 1 - height;
        }
        self.cursor_row = abs - self.offset_row;
    }

    // User driven selection change, hands the status line back to the tooltip
    fn move_to(&mut self, abs: usize) {
        self.notice = false;
        self.select_row(abs);
    }

    fn move_selection_up(&mut self, size: usize) {
        let abs = (self.offset_row + self.cursor_row).saturating_sub(size);
        self.move_to(abs);
    }

    fn move_selection_down(&mut self, size: usize) {
        let abs = self.offset_row + self.cursor_row + size;
        self.move_to(abs);
    }

    fn move_selection_end(&mut self) {
        self.move_to(self.view.rows().len().saturating_sub(1));
    }
}
