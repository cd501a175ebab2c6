use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Instant;
use tracing::{debug, error, info, trace};

use crate::columns::{ColumnDef, RenderHint};
use crate::csvio::{self, Imported};
use crate::domain::{CMDMode, Direction, GridConfig, GridError, HELP_TEXT, Message};
use crate::inputter::{InputResult, Inputter};
use crate::manager::TabularDataManager;
use crate::record::{ID_FIELD, Record};
use crate::view::SortDirection;
use crate::ui::{
    CMDLINE_HEIGH, COLUMN_WIDTH_MARGIN, PROGRESS_WIDTH, STATUSLINE_HEIGHT, TABLE_BORDER,
    TABLE_HEADER_HEIGHT, TOOLBAR_HEIGHT,
};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    LOADING,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    RECORD,
    POPUP,
    CMDINPUT,
}

#[derive(Clone, Debug, Default)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
    pub highlighted: bool,
}

#[derive(Clone, Debug)]
pub enum Popup {
    Help(String),
    Record {
        title: String,
        fields: Vec<(String, String)>,
        offset: usize,
    },
}

pub struct UIData {
    pub name: String,
    pub table: Vec<ColumnView>,
    pub index: ColumnView,
    pub selected_row: usize,
    pub selected_column: usize,
    pub page_index: usize,
    pub page_count: usize,
    pub filtered_rows: usize,
    pub total_rows: usize,
    pub filter: String,
    pub popup: Option<Popup>,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub dark_mode: bool,
    pub compact_mode: bool,
    pub loading: bool,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            table: Vec::new(),
            index: ColumnView::default(),
            selected_row: 0,
            selected_column: 0,
            page_index: 0,
            page_count: 1,
            filtered_rows: 0,
            total_rows: 0,
            filter: String::new(),
            popup: None,
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
            dark_mode: false,
            compact_mode: false,
            loading: false,
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
    pub index_width: usize,
}

impl UILayout {
    pub fn from_values(index_width: usize, ui_width: usize, ui_height: usize) -> Self {
        let chrome = TOOLBAR_HEIGHT + STATUSLINE_HEIGHT + CMDLINE_HEIGH;
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width.saturating_sub(2 * TABLE_BORDER + index_width + 1),
            table_height: ui_height.saturating_sub(chrome + 2 * TABLE_BORDER + TABLE_HEADER_HEIGHT),
            index_width,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: GridConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    manager: TabularDataManager,
    cursor_row: usize,     // within the current page
    offset_row: usize,     // first page row inside the visible window
    cursor_column: usize,  // index into the column set
    offset_column: usize,  // first visible column
    record_idx: usize,     // position in the filtered rows shown in the record view
    record_offset: usize,
    dark_mode: bool,
    compact_mode: bool,
    uilayout: UILayout,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    filter_before_input: String,
    active_cmdinput: bool,
    status_message: String,
    import_tx: Sender<(PathBuf, Result<Imported, GridError>)>,
    import_rx: Receiver<(PathBuf, Result<Imported, GridError>)>,
    pending_imports: usize,
}

impl Model {
    pub fn init(config: &GridConfig, ui_width: usize, ui_height: usize) -> Result<Self, GridError> {
        let start_time = Instant::now();
        let mut manager = TabularDataManager::new(config);
        info!(
            "Generated {} records in {}ms",
            manager.data().len(),
            start_time.elapsed().as_millis()
        );
        // A file given on the command line must load, otherwise there is nothing to show.
        if let Some(path) = config.import_path.as_ref() {
            manager.import(csvio::read_file(path)?)?;
            info!("Loaded {} records from {}", manager.data().len(), path.display());
        }
        let (import_tx, import_rx) = channel();
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            manager,
            cursor_row: 0,
            offset_row: 0,
            cursor_column: 0,
            offset_column: 0,
            record_idx: 0,
            record_offset: 0,
            dark_mode: config.dark_mode,
            compact_mode: config.compact_mode,
            uilayout: UILayout::from_values(0, ui_width, ui_height),
            uidata: UIData::empty(),
            clipboard: None,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            filter_before_input: String::new(),
            active_cmdinput: false,
            status_message: "Started gridview! Press ? for help".to_string(),
            import_tx,
            import_rx,
            pending_imports: 0,
        };
        model.update_table_data();
        Ok(model)
    }

    pub fn manager(&self) -> &TabularDataManager {
        &self.manager
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        debug!("Status: {}", self.status_message);
        self.uidata.status_message = self.status_message.clone();
    }

    fn selected_column(&self) -> Option<&ColumnDef> {
        self.manager.columns().get(self.cursor_column)
    }

    fn selected_column_id(&self) -> Option<String> {
        self.selected_column().map(|c| c.id.clone())
    }

    fn row_height(&self) -> usize {
        if self.compact_mode { 1 } else { 2 }
    }

    fn visible_rows(&self) -> usize {
        std::cmp::max(1, self.uilayout.table_height / self.row_height())
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), GridError> {
        self.poll_imports();
        if self.manager.expire_highlight(Instant::now()) {
            self.update_table_data();
        }

        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_table_selection_down(1),
                    Message::MoveUp => self.move_table_selection_up(1),
                    Message::MoveLeft => self.move_table_selection_left(),
                    Message::MoveRight => self.move_table_selection_right(),
                    Message::NextPage => self.change_page(TabularDataManager::next_page),
                    Message::PreviousPage => self.change_page(TabularDataManager::previous_page),
                    Message::FirstPage => self.change_page(TabularDataManager::first_page),
                    Message::LastPage => self.change_page(TabularDataManager::last_page),
                    Message::Enter => self.enter(),
                    Message::Help => self.show_help(),
                    Message::Filter => self.enter_cmd_mode(CMDMode::Filter),
                    Message::AddColumn => self.enter_cmd_mode(CMDMode::AddColumn),
                    Message::Import => self.enter_cmd_mode(CMDMode::Import),
                    Message::Export => self.enter_cmd_mode(CMDMode::Export),
                    Message::RemoveColumn => self.remove_selected_column(),
                    Message::MoveColumn(direction) => self.move_selected_column(direction),
                    Message::ToggleSort => self.toggle_sort(),
                    Message::Refresh => self.refresh_data(),
                    Message::ToggleTheme => self.toggle_theme(),
                    Message::ToggleCompact => self.toggle_compact(),
                    Message::CopyRecord => self.copy_selected_record(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit => self.clear_filter(),
                    _ => (),
                },
                Modus::RECORD => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.scroll_record(1),
                    Message::MoveUp => self.scroll_record(-1),
                    Message::MoveLeft => self.step_record(-1),
                    Message::MoveRight => self.step_record(1),
                    Message::CopyRecord => self.copy_selected_record(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Help => self.show_help(),
                    Message::Enter | Message::Exit => self.exit(),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Enter | Message::Exit => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }
        Ok(())
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(self.uilayout.index_width, width, height);
        self.update_table_data();
    }

    // -------------------- Data handling ---------------------- //

    fn start_import(&mut self, path: PathBuf) {
        info!("Importing {} ...", path.display());
        let tx = self.import_tx.clone();
        self.pending_imports += 1;
        self.status = Status::LOADING;
        self.set_status_message(format!("Loading {} ...", path.display()));
        rayon::spawn(move || {
            let result = csvio::read_file(&path).and_then(csvio::parse_csv);
            if tx.send((path, result)).is_err() {
                error!("Import finished after the model was dropped");
            }
        });
    }

    // Applies finished imports in completion order, the last one wins.
    fn poll_imports(&mut self) {
        let mut changed = false;
        while let Ok((path, result)) = self.import_rx.try_recv() {
            self.pending_imports = self.pending_imports.saturating_sub(1);
            match result {
                Ok(imported) => {
                    let rows = imported.records.len();
                    self.manager.apply_import(imported);
                    self.reset_cursor();
                    self.set_status_message(format!("Imported {rows} rows from {}", path.display()));
                    changed = true;
                }
                Err(e) => {
                    error!("Import of {} failed: {e:?}", path.display());
                    self.set_status_message(format!("Import of {} failed: {e}", path.display()));
                }
            }
        }
        if self.pending_imports == 0 && self.status == Status::LOADING {
            self.status = Status::READY;
        }
        if changed {
            if self.modus == Modus::RECORD {
                self.modus = Modus::TABLE;
            }
            self.update_table_data();
        }
    }

    fn export(&mut self, target: &str) {
        let path = csvio::expand_path(target);
        let result = self
            .manager
            .export()
            .and_then(|bytes| csvio::write_file(&path, &bytes));
        match result {
            Ok(()) => {
                self.config.export_path = path.clone();
                self.set_status_message(format!(
                    "Exported {} rows to {}",
                    self.manager.data().len(),
                    path.display()
                ))
            }
            Err(e) => {
                error!("Export to {} failed: {e:?}", path.display());
                self.set_status_message(format!("Export failed: {e}"));
            }
        }
    }

    fn refresh_data(&mut self) {
        let start_time = Instant::now();
        let count = self.config.initial_rows;
        self.manager.generate(count);
        self.reset_cursor();
        self.set_status_message(format!(
            "Generated {count} records in {}ms",
            start_time.elapsed().as_millis()
        ));
        self.update_table_data();
    }

    fn reset_cursor(&mut self) {
        self.cursor_row = 0;
        self.offset_row = 0;
        self.cursor_column = std::cmp::min(
            self.cursor_column,
            self.manager.columns().len().saturating_sub(1),
        );
    }

    fn add_column(&mut self, name: &str) {
        if self.manager.add_column(name) {
            self.cursor_column = self.manager.columns().len() - 1;
            self.set_status_message(format!("Added column \"{}\"", name.trim()));
        } else {
            self.set_status_message(format!("Cannot add column \"{}\"", name.trim()));
        }
        self.update_table_data();
    }

    fn remove_selected_column(&mut self) {
        if let Some(id) = self.selected_column_id()
            && self.manager.remove_column(&id)
        {
            self.reset_cursor_column();
            self.set_status_message(format!("Removed column \"{id}\""));
            self.update_table_data();
        }
    }

    fn reset_cursor_column(&mut self) {
        let ncols = self.manager.columns().len();
        self.cursor_column = std::cmp::min(self.cursor_column, ncols.saturating_sub(1));
        self.offset_column = std::cmp::min(self.offset_column, self.cursor_column);
    }

    fn move_selected_column(&mut self, direction: Direction) {
        if let Some(id) = self.selected_column_id()
            && self.manager.move_column(&id, direction)
        {
            if let Some(pos) = self.manager.columns().position(&id) {
                self.cursor_column = pos;
            }
            self.update_table_data();
        }
    }

    fn toggle_sort(&mut self) {
        if let Some(id) = self.selected_column_id() {
            self.manager.toggle_sort(&id);
            self.cursor_row = 0;
            self.offset_row = 0;
            let message = match self.manager.state().sort_direction(&id) {
                Some(SortDirection::Ascending) => format!("Sorted by {id} ascending"),
                Some(SortDirection::Descending) => format!("Sorted by {id} descending"),
                None => "Sorting cleared".to_string(),
            };
            self.set_status_message(message);
            self.update_table_data();
        }
    }

    fn apply_filter(&mut self, filter: &str) {
        self.manager.set_filter(filter);
        self.cursor_row = 0;
        self.offset_row = 0;
        let view = self.manager.view();
        let message = if filter.is_empty() {
            "Filter cleared".to_string()
        } else {
            format!("{} rows match \"{filter}\"", view.total_rows())
        };
        self.set_status_message(message);
        self.update_table_data();
    }

    fn clear_filter(&mut self) {
        if !self.manager.state().filter.is_empty() {
            self.apply_filter("");
        }
    }

    fn change_page(&mut self, step: fn(&mut TabularDataManager) -> bool) {
        if step(&mut self.manager) {
            self.cursor_row = 0;
            self.offset_row = 0;
            self.update_table_data();
        }
    }

    fn toggle_theme(&mut self) {
        self.dark_mode = !self.dark_mode;
        self.uidata.dark_mode = self.dark_mode;
    }

    fn toggle_compact(&mut self) {
        self.compact_mode = !self.compact_mode;
        self.offset_row = 0;
        self.update_table_data();
    }

    fn copy_selected_record(&mut self) {
        let Some(record) = self.current_record() else {
            return;
        };
        let line = std::iter::once(record.id().to_string())
            .chain(
                self.manager
                    .columns()
                    .iter()
                    .map(|c| wrap_cell_content(&record.get(&c.id).to_string())),
            )
            .collect::<Vec<String>>()
            .join(",");

        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    error!("Clipboard not available: {e:?}");
                    self.set_status_message("Clipboard not available");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            let result = clipboard.set_text(line);
            self.report_copy(result);
        }
    }

    fn report_copy(&mut self, result: Result<(), arboard::Error>) {
        match result {
            Ok(_) => self.set_status_message("Copied record to clipboard."),
            Err(e) => {
                error!("Error copying to clipboard: {e:?}");
                self.set_status_message(format!("Copy to clipboard failed: {e}"));
            }
        }
    }

    fn current_record(&self) -> Option<&Record> {
        match self.modus {
            Modus::RECORD => self
                .manager
                .view()
                .rows
                .get(self.record_idx)
                .map(|&idx| &self.manager.data()[idx]),
            _ => self.manager.page_record(self.cursor_row),
        }
    }

    // -------------------- View building ---------------------- //

    fn calculate_column_width(&self, column: &ColumnDef, cells: &[String]) -> usize {
        let label = column.label.chars().count() + 2; // sort marker
        let widest = match column.render {
            RenderHint::Progress => PROGRESS_WIDTH,
            _ => cells.iter().map(|c| c.chars().count()).max().unwrap_or(0),
        };
        std::cmp::min(
            std::cmp::max(label, widest) + COLUMN_WIDTH_MARGIN,
            self.config.max_column_width,
        )
    }

    fn get_visible_name(name: &str, width: usize) -> String {
        if width < 3 {
            return String::new();
        }
        if name.chars().count() > width {
            let mut reduced: String = name.chars().take(width - 3).collect();
            reduced.push_str("...");
            return reduced;
        }
        name.to_string()
    }

    fn header_name(&self, column: &ColumnDef) -> String {
        match self.manager.state().sort_direction(&column.id) {
            Some(SortDirection::Ascending) => format!("{} ▲", column.label),
            Some(SortDirection::Descending) => format!("{} ▼", column.label),
            None => column.label.clone(),
        }
    }

    fn update_table_data(&mut self) {
        let page_len = self.manager.view().page_rows().len();
        self.cursor_row = std::cmp::min(self.cursor_row, page_len.saturating_sub(1));

        // Keep the cursor inside the rendered window.
        let visible_rows = self.visible_rows();
        if self.cursor_row < self.offset_row {
            self.offset_row = self.cursor_row;
        } else if self.cursor_row >= self.offset_row + visible_rows {
            self.offset_row = self.cursor_row + 1 - visible_rows;
        }
        let rbegin = std::cmp::min(self.offset_row, page_len);
        let rend = std::cmp::min(rbegin + visible_rows, page_len);

        let window: Vec<&Record> = self
            .manager
            .view()
            .records(self.manager.data())
            .skip(rbegin)
            .take(rend - rbegin)
            .collect();

        let index_data: Vec<String> = window.iter().map(|r| r.id().to_string()).collect();
        let index_width = index_data
            .iter()
            .map(String::len)
            .max()
            .unwrap_or(0)
            .max(ID_FIELD.len());
        if index_width != self.uilayout.index_width {
            self.uilayout =
                UILayout::from_values(index_width, self.uilayout.width, self.uilayout.height);
        }

        // Widths of all columns, then the slice that fits from offset_column on.
        let columns: Vec<&ColumnDef> = self.manager.columns().iter().collect();
        let cells: Vec<Vec<String>> = columns
            .iter()
            .map(|c| {
                window
                    .iter()
                    .map(|r| c.format(r.get(&c.id), PROGRESS_WIDTH))
                    .collect()
            })
            .collect();
        let widths: Vec<usize> = columns
            .iter()
            .zip(cells.iter())
            .map(|(c, data)| self.calculate_column_width(c, data))
            .collect();

        self.cursor_column = std::cmp::min(self.cursor_column, columns.len().saturating_sub(1));
        if self.cursor_column < self.offset_column {
            self.offset_column = self.cursor_column;
        }
        let fits = |offset: usize| -> usize {
            let mut used = 0;
            let mut count = 0;
            for w in widths[offset..].iter() {
                if used + w + 1 > self.uilayout.table_width && count > 0 {
                    break;
                }
                used += w + 1;
                count += 1;
            }
            count
        };
        while self.offset_column < self.cursor_column
            && self.cursor_column >= self.offset_column + fits(self.offset_column)
        {
            self.offset_column += 1;
        }
        let visible = if self.manager.columns().is_empty() {
            0
        } else {
            fits(self.offset_column)
        };

        let highlighted = self.manager.highlighted(Instant::now()).map(str::to_string);
        let table: Vec<ColumnView> = (self.offset_column..self.offset_column + visible)
            .map(|cidx| {
                let column = columns[cidx];
                let width = widths[cidx];
                ColumnView {
                    name: Self::get_visible_name(&self.header_name(column), width),
                    width,
                    data: cells[cidx].clone(),
                    highlighted: highlighted.as_deref() == Some(column.id.as_str()),
                }
            })
            .collect();

        let view = self.manager.view();
        let name = if self.manager.state().filter.is_empty() {
            "Data".to_string()
        } else {
            format!("F[{}]", self.manager.state().filter)
        };

        self.uidata = UIData {
            name,
            table,
            index: ColumnView {
                name: ID_FIELD.to_string(),
                width: index_width,
                data: index_data,
                highlighted: false,
            },
            selected_row: self.cursor_row - rbegin.min(self.cursor_row),
            selected_column: self.cursor_column - self.offset_column,
            page_index: view.page_index,
            page_count: view.page_count,
            filtered_rows: view.total_rows(),
            total_rows: self.manager.data().len(),
            filter: self.manager.state().filter.clone(),
            popup: match self.modus {
                Modus::POPUP => Some(Popup::Help(HELP_TEXT.to_string())),
                _ => None,
            },
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
            dark_mode: self.dark_mode,
            compact_mode: self.compact_mode,
            loading: self.status == Status::LOADING,
        };
        if self.modus == Modus::RECORD {
            self.update_record_data();
        }
    }

    fn update_record_data(&mut self) {
        let details = self
            .current_record()
            .map(Record::id)
            .and_then(|id| Some((id, self.manager.record_details(id)?)));
        let Some((id, fields)) = details else {
            self.modus = Modus::TABLE;
            self.update_table_data();
            return;
        };
        let title = format!(
            "Record {}/{} (id {id})",
            self.record_idx + 1,
            self.manager.view().total_rows(),
        );
        self.record_offset = std::cmp::min(self.record_offset, fields.len().saturating_sub(1));
        self.uidata.popup = Some(Popup::Record {
            title,
            fields,
            offset: self.record_offset,
        });
        self.uidata.status_message = self.status_message.clone();
    }

    // -------------------- Control handling functions ---------------------- //

    fn enter(&mut self) {
        let page_rows = self.manager.view().page_rows().len();
        if self.cursor_row < page_rows {
            let view = self.manager.view();
            self.record_idx = view.page_index * view.page_size + self.cursor_row;
            self.record_offset = 0;
            self.previous_modus = Modus::TABLE;
            self.modus = Modus::RECORD;
            self.update_table_data();
        }
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::RECORD | Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = match self.previous_modus {
                    Modus::RECORD if self.modus == Modus::POPUP => Modus::RECORD,
                    _ => Modus::TABLE,
                };
                self.previous_modus = Modus::TABLE;
                self.update_table_data();
            }
            Modus::TABLE | Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.popup = Some(Popup::Help(HELP_TEXT.to_string()));
    }

    fn step_record(&mut self, step: isize) {
        let total = self.manager.view().total_rows();
        let next = self.record_idx as isize + step;
        if next >= 0 && (next as usize) < total {
            self.record_idx = next as usize;
            self.update_record_data();
        }
    }

    fn scroll_record(&mut self, step: isize) {
        self.record_offset = self.record_offset.saturating_add_signed(step);
        self.update_record_data();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                self.handle_cmd_input();
            } else if self.cmd_mode == Some(CMDMode::Filter) {
                // The filter follows every keystroke.
                let filter = self.last_input.input.clone();
                self.manager.set_filter(&filter);
                self.cursor_row = 0;
                self.offset_row = 0;
                self.update_table_data();
            }
            self.uidata.cmdinput = self.last_input.clone();
            self.uidata.cmd_mode = self.cmd_mode;
            self.uidata.active_cmdinput = self.active_cmdinput;
        }
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;
        self.input.clear();
        match mode {
            CMDMode::Filter => {
                let filter = self.manager.state().filter.clone();
                self.input.set(&filter);
                self.filter_before_input = filter;
            }
            CMDMode::Export => {
                let path = self.config.export_path.to_string_lossy().to_string();
                self.input.set(&path);
            }
            CMDMode::AddColumn | CMDMode::Import => {}
        }
        self.last_input = self.input.get();
        self.uidata.cmdinput = self.last_input.clone();
        self.uidata.active_cmdinput = self.active_cmdinput;
        self.uidata.cmd_mode = self.cmd_mode;
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {:?}", self.last_input);
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let cmd_input = self.last_input.input.clone();
        let canceled = self.last_input.canceled;
        match self.cmd_mode.take() {
            Some(CMDMode::Filter) => {
                // Escape brings back the filter from before the prompt.
                if canceled {
                    let previous = std::mem::take(&mut self.filter_before_input);
                    self.apply_filter(&previous);
                } else {
                    self.apply_filter(&cmd_input);
                }
            }
            Some(CMDMode::AddColumn) if !canceled => self.add_column(&cmd_input),
            Some(CMDMode::Import) if !canceled && !cmd_input.trim().is_empty() => {
                self.start_import(csvio::expand_path(cmd_input.trim()))
            }
            Some(CMDMode::Export) if !canceled && !cmd_input.trim().is_empty() => {
                self.export(cmd_input.trim())
            }
            _ => trace!("Command input canceled"),
        }
        self.last_input = InputResult::default();
        self.update_table_data();
    }

    fn move_table_selection_up(&mut self, size: usize) {
        self.cursor_row = self.cursor_row.saturating_sub(size);
        self.update_table_data();
    }

    fn move_table_selection_down(&mut self, size: usize) {
        let page_len = self.manager.view().page_rows().len();
        if self.cursor_row + size < page_len {
            self.cursor_row += size;
            self.update_table_data();
        }
    }

    fn move_table_selection_left(&mut self) {
        if self.cursor_column > 0 {
            self.cursor_column -= 1;
            self.update_table_data();
        }
    }

    fn move_table_selection_right(&mut self) {
        if self.cursor_column + 1 < self.manager.columns().len() {
            self.cursor_column += 1;
            self.update_table_data();
        }
    }
}

fn wrap_cell_content(c: &str) -> String {
    let needs_escaping = c.contains('"');
    let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',' || c == '"');
    let mut out = String::from(c);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping {
        out = format!("\"{out}\"");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    fn model(rows: usize) -> Model {
        let config = GridConfig::default().with_initial_rows(rows);
        Model::init(&config, 120, 40).unwrap()
    }

    fn type_text(model: &mut Model, text: &str) {
        for c in text.chars() {
            model
                .update(Some(Message::RawKey(KeyEvent::new(
                    KeyCode::Char(c),
                    KeyModifiers::NONE,
                ))))
                .unwrap();
        }
    }

    fn press(model: &mut Model, code: KeyCode) {
        model
            .update(Some(Message::RawKey(KeyEvent::new(code, KeyModifiers::NONE))))
            .unwrap();
    }

    #[test]
    fn filter_prompt_filters_while_typing() {
        let mut m = model(10);
        m.update(Some(Message::Filter)).unwrap();
        assert!(m.raw_keyevents());
        type_text(&mut m, "First3");
        assert_eq!(m.get_uidata().filtered_rows, 1);
        press(&mut m, KeyCode::Enter);
        assert!(!m.raw_keyevents());
        assert_eq!(m.get_uidata().index.data, vec!["3".to_string()]);
    }

    #[test]
    fn escape_restores_previous_filter() {
        let mut m = model(20);
        m.update(Some(Message::Filter)).unwrap();
        type_text(&mut m, "First1");
        press(&mut m, KeyCode::Enter);
        assert_eq!(m.get_uidata().filtered_rows, 11);

        m.update(Some(Message::Filter)).unwrap();
        type_text(&mut m, "9");
        assert_eq!(m.get_uidata().filtered_rows, 1);
        press(&mut m, KeyCode::Esc);
        assert_eq!(m.get_uidata().filter, "First1");
        assert_eq!(m.get_uidata().filtered_rows, 11);
    }

    #[test]
    fn failed_copy_is_reported() {
        let mut m = model(3);
        m.report_copy(Err(arboard::Error::ClipboardOccupied));
        assert!(m.get_uidata().status_message.contains("Copy to clipboard failed"));
        m.report_copy(Ok(()));
        assert_eq!(m.get_uidata().status_message, "Copied record to clipboard.");
    }

    #[test]
    fn add_column_prompt() {
        let mut m = model(10);
        m.update(Some(Message::AddColumn)).unwrap();
        type_text(&mut m, "note");
        press(&mut m, KeyCode::Enter);
        assert_eq!(m.manager().columns().len(), 7);
        // the new column is selected and highlighted
        let ui = m.get_uidata();
        let selected = &ui.table[ui.selected_column];
        assert!(selected.highlighted);
        assert_eq!(selected.data[0], "Value for note");
    }

    #[test]
    fn remove_and_move_selected_column() {
        let mut m = model(5);
        m.update(Some(Message::MoveRight)).unwrap();
        m.update(Some(Message::MoveColumn(Direction::Left))).unwrap();
        assert_eq!(m.manager().columns().position("lastName"), Some(0));
        m.update(Some(Message::RemoveColumn)).unwrap();
        assert!(!m.manager().columns().contains("lastName"));
        assert_eq!(m.manager().columns().len(), 5);
    }

    #[test]
    fn record_view_steps_through_rows() {
        let mut m = model(15);
        m.update(Some(Message::MoveDown)).unwrap();
        m.update(Some(Message::Enter)).unwrap();
        match m.get_uidata().popup.as_ref() {
            Some(Popup::Record { fields, .. }) => {
                assert_eq!(fields[0], ("id".to_string(), "2".to_string()))
            }
            other => panic!("expected record popup, got {other:?}"),
        }
        m.update(Some(Message::MoveRight)).unwrap();
        match m.get_uidata().popup.as_ref() {
            Some(Popup::Record { fields, .. }) => assert_eq!(fields[0].1, "3"),
            other => panic!("expected record popup, got {other:?}"),
        }
        m.update(Some(Message::Exit)).unwrap();
        assert!(m.get_uidata().popup.is_none());
    }

    #[test]
    fn paging_updates_window() {
        let mut m = model(25);
        m.update(Some(Message::NextPage)).unwrap();
        let ui = m.get_uidata();
        assert_eq!(ui.page_index, 1);
        assert_eq!(ui.page_count, 3);
        assert_eq!(ui.index.data.first().map(String::as_str), Some("11"));
    }

    #[test]
    fn compact_mode_shows_more_rows() {
        let config = GridConfig::default().with_initial_rows(50).with_page_size(50);
        let mut m = Model::init(&config, 120, 20).unwrap();
        let normal = m.get_uidata().index.data.len();
        m.update(Some(Message::ToggleCompact)).unwrap();
        let compact = m.get_uidata().index.data.len();
        assert!(compact > normal);
    }

    #[test]
    fn failed_import_reports_error() {
        let mut m = model(5);
        m.start_import(PathBuf::from("/definitely/not/here.csv"));
        // wait for the background task
        let start = Instant::now();
        while m.pending_imports > 0 && start.elapsed().as_secs() < 5 {
            m.update(None).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(m.status, Status::READY);
        assert!(m.get_uidata().status_message.contains("failed"));
        assert_eq!(m.manager().data().len(), 5);
    }

    #[test]
    fn import_on_start_replaces_generated_rows() {
        let path = std::env::temp_dir().join(format!("gridview-start-{}.csv", std::process::id()));
        std::fs::write(&path, "city,pop\nOslo,700000\n").unwrap();
        let config = GridConfig::default()
            .with_initial_rows(5)
            .with_import_path(path.clone());
        let m = Model::init(&config, 120, 40).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(m.manager().data().len(), 1);
        assert_eq!(m.get_uidata().table[0].name, "city");

        let missing = GridConfig::default()
            .with_initial_rows(5)
            .with_import_path(PathBuf::from("/definitely/not/here.csv"));
        assert!(matches!(
            Model::init(&missing, 120, 40),
            Err(GridError::FileNotFound)
        ));
    }

    #[test]
    fn csv_line_quoting() {
        assert_eq!(wrap_cell_content("plain"), "plain");
        assert_eq!(wrap_cell_content("a,b"), "\"a,b\"");
        assert_eq!(wrap_cell_content("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
