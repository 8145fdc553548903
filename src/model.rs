use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, info, trace};

use crate::catalog::Catalog;
use crate::dataset::{self, COLUMNS, Row};
use crate::domain::{CMDMode, HELP_TEXT, Message, RRConfig};
use crate::domain::RRError;
use crate::inputter::{InputResult, Inputter};
use crate::params::preprocess_param;
use crate::query::{Direction, Filter, SortSpec};
use crate::ui::{CMDLINE_HEIGHT, COLUMN_WIDTH_MARGIN, SCROLLBAR_WIDTH, TABLE_HEADER_HEIGHT, TITLE_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    EMPTY,
    READY,
    LOADING,
    PROCESSING,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    RECORD,
    TOPICS,
    POPUP,
    CMDINPUT,
}

// One column of the visible window, ready for rendering.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

impl ColumnView {
    fn empty() -> Self {
        ColumnView {
            name: String::new(),
            width: 0,
            data: Vec::new(),
        }
    }
}

// The active view over the dataset: the filtered/sorted row mapping plus
// cursor and scroll state. Replaced wholesale on every view changing action.
struct TableView {
    rows: Vec<usize>, // view position -> dataset index
    widths: [usize; COLUMNS.len()],
    render_widths: [usize; COLUMNS.len()],
    visible_columns: Vec<usize>,
    curser_row: usize,
    curser_column: usize,
    offset_row: usize,
    offset_column: usize,
    show_index: bool,
    index: ColumnView,
    data: Vec<ColumnView>,
}

impl TableView {
    fn empty() -> Self {
        TableView {
            rows: Vec::new(),
            widths: [0; COLUMNS.len()],
            render_widths: [0; COLUMNS.len()],
            visible_columns: Vec::new(),
            curser_row: 0,
            curser_column: 0,
            offset_row: 0,
            offset_column: 0,
            show_index: false,
            index: ColumnView::empty(),
            data: Vec::new(),
        }
    }

    fn build_index(&mut self, height: usize) {
        let rbegin = self.offset_row;
        let rend = std::cmp::min(rbegin + height, self.rows.len());
        let data = (rbegin..rend)
            .map(|idx| (idx + 1).to_string())
            .collect::<Vec<String>>();
        let width = data.last().map(|s| s.len()).unwrap_or(3);
        self.index = ColumnView {
            name: String::new(),
            width,
            data,
        }
    }
}

// Scroll state of the record detail view.
struct RecordView {
    record_idx: usize, // position in TableView.rows
    curser_row: usize,
    header_width: usize,
}

impl RecordView {
    fn empty() -> Self {
        RecordView {
            record_idx: 0,
            curser_row: 0,
            header_width: 0,
        }
    }
}

// Chunked scan over the active view that gathers per column maximum cell
// widths. One chunk runs per event loop tick so the UI keeps painting and
// the progress gauge moves; any view changing action replaces the job.
struct RenderJob {
    next_row: usize,
    widths: [usize; COLUMNS.len()],
}

impl RenderJob {
    fn new() -> Self {
        let mut widths = [0; COLUMNS.len()];
        for (idx, name) in COLUMNS.iter().enumerate() {
            widths[idx] = name.len();
        }
        RenderJob {
            next_row: 0,
            widths,
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
    pub statusline_height: usize,
}

impl UILayout {
    pub fn from_values(index_width: usize, ui_width: usize, ui_height: usize) -> Self {
        let table_width = ui_width.saturating_sub(SCROLLBAR_WIDTH + index_width);
        let table_height =
            ui_height.saturating_sub(TITLE_HEIGHT + TABLE_HEADER_HEIGHT + CMDLINE_HEIGHT);
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width,
            table_height,
            index_width,
            statusline_height: CMDLINE_HEIGHT,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

// Snapshot of everything the UI needs for one frame.
pub struct UIData {
    pub name: String,
    pub table: Vec<ColumnView>,
    pub index: ColumnView,
    pub nrows: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub show_popup: bool,
    pub popup_message: String,
    pub progress: Option<f64>,
    pub layout: UILayout,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            table: Vec::new(),
            index: ColumnView::empty(),
            nrows: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            show_popup: false,
            popup_message: String::new(),
            progress: None,
            layout: UILayout::default(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
        }
    }
}

pub struct Model {
    config: RRConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    catalog: Catalog,
    topic_idx: Option<usize>,
    topic_title: String,
    data: Vec<Row>,
    table: TableView,
    record_view: RecordView,
    topic_cursor: usize,
    filter: Filter,
    filter_text: String,
    sort: SortSpec,
    render_job: Option<RenderJob>,
    uilayout: UILayout,
    uidata: UIData,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    status_message: String,
    popup_message: String,
}

impl Model {
    pub fn init(config: &RRConfig, catalog: Catalog, ui_width: usize, ui_height: usize) -> Self {
        let mut model = Self {
            config: config.clone(),
            status: Status::EMPTY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            catalog,
            topic_idx: None,
            topic_title: String::new(),
            data: Vec::new(),
            table: TableView::empty(),
            record_view: RecordView::empty(),
            topic_cursor: 0,
            filter: Filter::default(),
            filter_text: String::new(),
            sort: SortSpec::default(),
            render_job: None,
            uilayout: UILayout::from_values(0, ui_width, ui_height),
            uidata: UIData::empty(),
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            status_message: "Select a topic".to_string(),
            popup_message: String::new(),
        };
        model.update_uidata_for_table();
        model
    }

    // Apply the startup options. Values arrive raw from the command line and
    // get the same normalization the original applied to its URL parameters.
    // A bad sort falls back to the default, a bad filter is dropped, an
    // unknown topic leaves the user in the topic selector; each is reported.
    pub fn startup(&mut self, topic: Option<&str>, filter: Option<&str>, sort: Option<&str>) {
        if let Some(sort) = sort {
            self.apply_sort_expression(&preprocess_param(sort));
        }
        if let Some(filter) = filter {
            let filter = preprocess_param(filter);
            self.input.set(&filter);
            self.apply_filter_expression(&filter);
        }
        match topic {
            Some(topic) => {
                let topic = preprocess_param(topic);
                match self.catalog.find(&topic) {
                    Some(idx) => self.load_topic(idx),
                    None => {
                        self.alert(RRError::UnknownTopic(topic).to_string());
                        self.open_topic_selector();
                    }
                }
            }
            None => self.open_topic_selector(),
        }
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

    pub fn update(&mut self, message: Option<Message>) -> Result<(), RRError> {
        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.move_table_selection(-1),
                    Message::MoveDown => self.move_table_selection(1),
                    Message::MovePageUp => {
                        self.move_table_selection(-(self.uilayout.table_height as isize))
                    }
                    Message::MovePageDown => {
                        self.move_table_selection(self.uilayout.table_height as isize)
                    }
                    Message::MoveBeginning => self.select_abs_row(0),
                    Message::MoveEnd => {
                        self.select_abs_row(self.table.rows.len().saturating_sub(1))
                    }
                    Message::MoveLeft => self.move_table_selection_left(),
                    Message::MoveRight => self.move_table_selection_right(),
                    Message::EnterFilter => self.enter_cmd_mode(CMDMode::Filter),
                    Message::SortColumn => self.sort_selected_column(),
                    Message::SelectTopic => self.open_topic_selector(),
                    Message::ToggleIndex => self.toggle_table_index(),
                    Message::CopyLink => self.copy_link(),
                    Message::CopyRow => self.copy_row(),
                    Message::Help => self.show_help(),
                    Message::Enter => self.open_record_view(),
                    Message::Exit => self.clear_filter(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::RECORD => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.move_record_selection(-1),
                    Message::MoveDown => self.move_record_selection(1),
                    Message::MoveLeft => self.step_record(-1),
                    Message::MoveRight => self.step_record(1),
                    Message::CopyLink => self.copy_link(),
                    Message::Help => self.show_help(),
                    Message::Exit | Message::Enter => self.close_record_view(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::TOPICS => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.move_topic_selection(-1),
                    Message::MoveDown => self.move_topic_selection(1),
                    Message::Enter => {
                        let idx = self.topic_cursor;
                        self.modus = Modus::TABLE;
                        // A new topic starts from a clean slate, like the
                        // original page: no filter, default sort.
                        self.filter = Filter::default();
                        self.filter_text.clear();
                        self.input.clear();
                        self.sort = SortSpec::default();
                        self.load_topic(idx);
                    }
                    Message::Exit => self.close_topic_selector(),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Enter => self.close_popup(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::CMDINPUT => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key)
                    }
                }
            }
        }

        self.advance_render();
        Ok(())
    }

    // ------------------------- Topic handling ------------------------- //

    fn open_topic_selector(&mut self) {
        if self.catalog.is_empty() {
            self.alert("The topic catalog is empty.".to_string());
            return;
        }
        self.previous_modus = self.modus;
        self.modus = Modus::TOPICS;
        self.topic_cursor = self.topic_idx.unwrap_or(0);
        self.update_uidata_for_topics();
    }

    fn close_topic_selector(&mut self) {
        self.previous_modus = Modus::TOPICS;
        self.modus = Modus::TABLE;
        self.update_table_data();
    }

    fn move_topic_selection(&mut self, step: isize) {
        let ntopics = self.catalog.topics().len();
        if ntopics == 0 {
            return;
        }
        let cursor = self.topic_cursor as isize + step;
        self.topic_cursor = cursor.clamp(0, ntopics as isize - 1) as usize;
        self.update_uidata_for_topics();
    }

    // Load one topic's rows and derive a fresh view. On failure the previous
    // dataset and view stay as they are; the failure is reported.
    fn load_topic(&mut self, idx: usize) {
        self.status = Status::LOADING;
        let path = self.catalog.resource_path(idx);
        info!("Loading topic data from {:?}", path);
        match dataset::load(&path) {
            Ok(rows) => {
                self.topic_idx = Some(idx);
                self.topic_title = self.catalog.topics()[idx].title.clone();
                self.data = rows;
                self.rebuild_view();
            }
            Err(e) => {
                self.status = if self.data.is_empty() {
                    Status::EMPTY
                } else {
                    Status::READY
                };
                self.alert(e.to_string());
            }
        }
    }

    // ------------------------- View derivation ------------------------ //

    // Derive the view from the dataset: filter, then stable sort, then kick
    // off the chunked width scan. Runs synchronously before the next draw,
    // so a new action always supersedes whatever render was in flight.
    fn rebuild_view(&mut self) {
        let mut rows = self.filter.apply(&self.data);
        self.sort.apply(&self.data, &mut rows);
        debug!(
            "View holds {} of {} rows (filter \"{}\")",
            rows.len(),
            self.data.len(),
            self.filter_text
        );
        let show_index = self.table.show_index;
        self.table = TableView::empty();
        self.table.show_index = show_index;
        self.table.rows = rows;
        self.start_render_job();
        self.update_table_data();
    }

    pub fn apply_filter_expression(&mut self, text: &str) {
        match Filter::parse(text) {
            Ok(filter) => {
                self.filter = filter;
                self.filter_text = text.trim().to_string();
                if !self.data.is_empty() {
                    self.rebuild_view();
                }
            }
            Err(e) => self.alert(e.to_string()),
        }
    }

    pub fn apply_sort_expression(&mut self, text: &str) {
        match SortSpec::parse(text) {
            Ok(spec) => {
                self.sort = spec;
                if !self.data.is_empty() {
                    self.resort_view();
                }
            }
            Err(e) => {
                self.alert(e.to_string());
            }
        }
    }

    fn clear_filter(&mut self) {
        if !self.filter.is_identity() {
            self.input.clear();
            self.apply_filter_expression("");
        }
    }

    // Sort activation on the selected column: a new column starts ascending,
    // the current sort column flips its direction.
    fn sort_selected_column(&mut self) {
        if self.table.visible_columns.is_empty() {
            return;
        }
        let column = self.table.visible_columns[self.table.curser_column];
        self.sort = if self.sort.column == column {
            SortSpec {
                column,
                direction: self.sort.direction.flipped(),
            }
        } else {
            SortSpec {
                column,
                direction: Direction::Ascending,
            }
        };
        self.resort_view();
    }

    // Reordering does not change the row set, so the width scan results stay
    // valid and only the mapping is rebuilt.
    fn resort_view(&mut self) {
        self.sort.apply(&self.data, &mut self.table.rows);
        self.table.curser_row = 0;
        self.table.offset_row = 0;
        self.update_table_data();
    }

    // --------------------- Chunked width scanning --------------------- //

    fn start_render_job(&mut self) {
        self.render_job = Some(RenderJob::new());
        self.status = Status::PROCESSING;
    }

    fn advance_render(&mut self) {
        let Some(mut job) = self.render_job.take() else {
            return;
        };
        let rows = &self.table.rows;
        let chunk_end = std::cmp::min(job.next_row + self.config.render_chunk_size, rows.len());
        for &ridx in &rows[job.next_row..chunk_end] {
            for (cidx, cell) in self.data[ridx].cells().iter().enumerate() {
                if cell.len() > job.widths[cidx] {
                    job.widths[cidx] = cell.len();
                }
            }
        }
        job.next_row = chunk_end;

        if job.next_row >= rows.len() {
            trace!("Width scan finished over {} rows", rows.len());
            self.table.widths = job.widths;
            self.render_job = None;
            self.status = Status::READY;
            self.set_status_message(format!("({} repositories)", self.table.rows.len()));
            self.refresh_uidata();
        } else {
            self.render_job = Some(job);
            self.uidata.progress = self.render_progress();
        }
    }

    fn render_progress(&self) -> Option<f64> {
        self.render_job.as_ref().map(|job| {
            let total = std::cmp::max(self.table.rows.len(), 1);
            job.next_row as f64 / total as f64
        })
    }

    // --------------------- Window materialization --------------------- //

    // Build the visible window from the view mapping: pick the columns that
    // fit the layout, slice the row window out of the dataset and snapshot
    // everything for the UI.
    fn update_table_data(&mut self) {
        if self.data.is_empty() {
            self.update_uidata_for_table();
            return;
        }

        let table = &mut self.table;
        let height = self.uilayout.table_height;
        let rbegin = table.offset_row;
        let rend = std::cmp::min(rbegin + height, table.rows.len());

        for cidx in 0..COLUMNS.len() {
            let width = std::cmp::max(COLUMNS[cidx].len(), table.widths[cidx]) + COLUMN_WIDTH_MARGIN;
            table.render_widths[cidx] = std::cmp::min(width, self.config.max_column_width);
        }

        // Walk columns from the current offset until the table width budget
        // is used up; the last column may render partially.
        table.visible_columns.clear();
        let mut visible_width = 0;
        for cidx in table.offset_column..COLUMNS.len() {
            let render_width = table.render_widths[cidx];
            if visible_width + render_width + 1 <= self.uilayout.table_width {
                table.visible_columns.push(cidx);
                visible_width += render_width + 1;
            } else {
                let remaining = self.uilayout.table_width.saturating_sub(visible_width);
                if remaining > COLUMN_WIDTH_MARGIN {
                    table.visible_columns.push(cidx);
                    table.render_widths[cidx] = remaining;
                }
                break;
            }
        }
        if table.visible_columns.is_empty() && table.offset_column < COLUMNS.len() {
            table.visible_columns.push(table.offset_column);
            table.render_widths[table.offset_column] = self.uilayout.table_width;
        }
        table.curser_column = std::cmp::min(
            table.curser_column,
            table.visible_columns.len().saturating_sub(1),
        );

        table.data = Vec::with_capacity(table.visible_columns.len());
        let sort = self.sort;
        for &cidx in table.visible_columns.iter() {
            let width = table.render_widths[cidx];
            let col_data = table.rows[rbegin..rend]
                .iter()
                .map(|&ridx| self.data[ridx].cell(cidx).to_string())
                .collect();
            table.data.push(ColumnView {
                name: Self::column_header(cidx, width, &sort),
                width,
                data: col_data,
            });
        }

        table.build_index(height);
        self.update_uidata_for_table();
    }

    // Header label: the column name truncated to the render width, with a
    // direction marker on the active sort column.
    fn column_header(cidx: usize, width: usize, sort: &SortSpec) -> String {
        let mut name = COLUMNS[cidx].to_string();
        if sort.column == cidx {
            name.push_str(match sort.direction {
                Direction::Ascending => " ^",
                Direction::Descending => " v",
            });
        }
        if width < 3 {
            return String::new();
        }
        if name.len() > width {
            name = format!("{}...", &name[0..width - 3]);
        }
        name
    }

    // ------------------------ UIData snapshots ------------------------ //

    fn update_uidata_for_table(&mut self) {
        let table = &self.table;
        self.uidata = UIData {
            name: self.topic_title.clone(),
            table: table.data.clone(),
            index: if table.show_index {
                table.index.clone()
            } else {
                ColumnView::empty()
            },
            nrows: table.rows.len(),
            selected_row: table.curser_row,
            selected_column: table.curser_column,
            abs_selected_row: table.offset_row + table.curser_row,
            show_popup: self.modus == Modus::POPUP,
            popup_message: self.popup_message.clone(),
            progress: self.render_progress(),
            layout: self.uilayout.clone(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
        }
    }

    fn update_uidata_for_record(&mut self) {
        let record = &self.record_view;
        let Some(&ridx) = self.table.rows.get(record.record_idx) else {
            return;
        };
        let row = &self.data[ridx];

        let mut headers: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
        headers.push("link".to_string());
        let mut values: Vec<String> = row.cells().to_vec();
        values.push(row.link().to_string());

        let header_width = record.header_width;
        let value_width = self.uilayout.table_width.saturating_sub(header_width);

        self.uidata = UIData {
            name: format!("R[{}]", self.topic_title),
            table: vec![
                ColumnView {
                    name: "Field".to_string(),
                    width: header_width,
                    data: headers,
                },
                ColumnView {
                    name: "Value".to_string(),
                    width: value_width,
                    data: values,
                },
            ],
            index: ColumnView::empty(),
            nrows: self.table.rows.len(),
            selected_row: record.curser_row,
            selected_column: 1,
            abs_selected_row: record.record_idx,
            show_popup: self.modus == Modus::POPUP,
            popup_message: self.popup_message.clone(),
            progress: None,
            layout: self.uilayout.clone(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
        }
    }

    fn update_uidata_for_topics(&mut self) {
        let titles: Vec<String> = self
            .catalog
            .topics()
            .iter()
            .map(|t| t.title.clone())
            .collect();
        let width = std::cmp::max(
            titles.iter().map(|t| t.len()).max().unwrap_or(0),
            "Topics".len(),
        ) + COLUMN_WIDTH_MARGIN;

        self.uidata = UIData {
            name: "Topics".to_string(),
            table: vec![ColumnView {
                name: "Topics".to_string(),
                width,
                data: titles,
            }],
            index: ColumnView::empty(),
            nrows: self.catalog.topics().len(),
            selected_row: self.topic_cursor,
            selected_column: 0,
            abs_selected_row: self.topic_cursor,
            show_popup: self.modus == Modus::POPUP,
            popup_message: self.popup_message.clone(),
            progress: None,
            layout: self.uilayout.clone(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
    }

    // Blocking notification. The previous modus resumes when it is closed;
    // whatever view was active stays untouched underneath.
    fn alert(&mut self, message: String) {
        info!("Alert: {message}");
        if self.modus != Modus::POPUP {
            self.previous_modus = self.modus;
            self.modus = Modus::POPUP;
        }
        self.popup_message = message.clone();
        self.set_status_message(message);
        self.uidata.popup_message = self.popup_message.clone();
        self.uidata.show_popup = true;
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.popup_message = HELP_TEXT.to_string();
        self.uidata.popup_message = self.popup_message.clone();
        self.uidata.show_popup = true;
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
        self.popup_message = String::new();
        self.refresh_uidata();
    }

    // --------------------------- Record view -------------------------- //

    fn open_record_view(&mut self) {
        if self.table.rows.is_empty() {
            return;
        }
        let record_idx = self.table.offset_row + self.table.curser_row;
        let header_width = COLUMNS
            .iter()
            .map(|c| c.len())
            .max()
            .unwrap_or(0)
            .max("link".len())
            + COLUMN_WIDTH_MARGIN;
        self.record_view = RecordView {
            record_idx,
            curser_row: 0,
            header_width,
        };
        self.previous_modus = Modus::TABLE;
        self.modus = Modus::RECORD;
        self.update_uidata_for_record();
    }

    fn close_record_view(&mut self) {
        self.previous_modus = Modus::RECORD;
        self.modus = Modus::TABLE;
        self.select_abs_row(self.record_view.record_idx);
    }

    fn move_record_selection(&mut self, step: isize) {
        let nrows = (COLUMNS.len() + 1) as isize;
        let cursor = self.record_view.curser_row as isize + step;
        self.record_view.curser_row = cursor.clamp(0, nrows - 1) as usize;
        self.update_uidata_for_record();
    }

    fn step_record(&mut self, step: isize) {
        let nrows = self.table.rows.len();
        if nrows == 0 {
            return;
        }
        let idx = self.record_view.record_idx as isize + step;
        self.record_view.record_idx = idx.clamp(0, nrows as isize - 1) as usize;
        self.update_uidata_for_record();
    }

    // ------------------------- Table movement ------------------------- //

    fn move_table_selection(&mut self, step: isize) {
        let nrows = self.table.rows.len();
        if nrows == 0 {
            return;
        }
        let abs = self.table.offset_row + self.table.curser_row;
        let target = (abs as isize + step).clamp(0, nrows as isize - 1) as usize;
        self.select_abs_row(target);
    }

    fn select_abs_row(&mut self, row: usize) {
        let table = &mut self.table;
        if table.rows.is_empty() {
            return;
        }
        let row = std::cmp::min(row, table.rows.len() - 1);
        let height = std::cmp::max(self.uilayout.table_height, 1);
        if row < table.offset_row {
            table.offset_row = row;
        } else if row >= table.offset_row + height {
            table.offset_row = row + 1 - height;
        }
        table.curser_row = row - table.offset_row;
        self.update_table_data();
    }

    fn move_table_selection_left(&mut self) {
        let table = &mut self.table;
        if table.curser_column > 0 {
            table.curser_column -= 1;
        } else if table.offset_column > 0 {
            table.offset_column -= 1;
        }
        self.update_table_data();
    }

    fn move_table_selection_right(&mut self) {
        let table = &mut self.table;
        if table.curser_column + 1 < table.visible_columns.len() {
            table.curser_column += 1;
        } else if table.offset_column + table.visible_columns.len() < COLUMNS.len() {
            table.offset_column += 1;
        }
        self.update_table_data();
    }

    fn toggle_table_index(&mut self) {
        self.table.show_index = !self.table.show_index;
        let index_width = if self.table.show_index {
            self.table.index.width
        } else {
            0
        };
        self.uilayout = UILayout::from_values(index_width, self.uilayout.width, self.uilayout.height);
        self.update_table_data();
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        let index_width = if self.table.show_index {
            self.table.index.width
        } else {
            0
        };
        self.uilayout = UILayout::from_values(index_width, width, height);
        self.refresh_uidata();
    }

    // Rebuild the UIData snapshot for whatever view is on screen. A popup
    // rebuilds the view beneath it; the popup fields follow the modus.
    fn refresh_uidata(&mut self) {
        match self.modus {
            Modus::TABLE | Modus::CMDINPUT => self.update_table_data(),
            Modus::RECORD => self.update_uidata_for_record(),
            Modus::TOPICS => self.update_uidata_for_topics(),
            Modus::POPUP => match self.previous_modus {
                Modus::RECORD => self.update_uidata_for_record(),
                Modus::TOPICS => self.update_uidata_for_topics(),
                _ => self.update_table_data(),
            },
        }
    }

    // -------------------------- Clipboard ----------------------------- //

    fn copy_to_clipboard(&mut self, content: String) {
        match Clipboard::new().and_then(|mut cb| cb.set_text(content)) {
            Ok(_) => self.set_status_message("Copied to clipboard"),
            Err(e) => self.set_status_message(format!("Clipboard error: {e:?}")),
        }
    }

    fn selected_row(&self) -> Option<&Row> {
        let view_idx = match self.modus {
            Modus::RECORD => self.record_view.record_idx,
            _ => self.table.offset_row + self.table.curser_row,
        };
        self.table.rows.get(view_idx).map(|&ridx| &self.data[ridx])
    }

    fn copy_link(&mut self) {
        if let Some(row) = self.selected_row() {
            let link = row.link().to_string();
            trace!("Copy link {link}");
            self.copy_to_clipboard(link);
        }
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.contains('"');
        let needs_wrapping = c.contains([' ', '\t', ',']);
        let mut out = String::from(c);
        if needs_escaping {
            out = out.replace("\"", "\"\"");
        }
        if needs_wrapping || needs_escaping {
            out = format!("\"{out}\"");
        }
        out
    }

    fn copy_row(&mut self) {
        if let Some(row) = self.selected_row() {
            let content = row
                .cells()
                .iter()
                .map(|c| Self::wrap_cell_content(c))
                .collect::<Vec<String>>()
                .join(",");
            self.copy_to_clipboard(content);
        }
    }

    // ------------------------- Command input -------------------------- //

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;
        // Keep the committed filter text editable instead of starting blank.
        self.input.clear();
        self.input.set(&self.filter_text.clone());
        self.last_input = self.input.get();
        self.uidata.cmdinput = self.last_input.clone();
        self.uidata.cmd_mode = self.cmd_mode;
        self.uidata.active_cmdinput = true;
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if !self.active_cmdinput {
            return;
        }
        self.last_input = self.input.read(key);
        if self.last_input.finished {
            self.handle_cmd_input();
        }
        self.uidata.cmdinput = self.last_input.clone();
        self.uidata.cmd_mode = self.cmd_mode;
        self.uidata.active_cmdinput = self.active_cmdinput;
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        self.uidata.active_cmdinput = false;

        let cmd_input = self.last_input.input.clone();
        match self.cmd_mode {
            Some(CMDMode::Filter) => {
                if self.last_input.canceled {
                    self.update_table_data();
                } else {
                    self.apply_filter_expression(&cmd_input);
                }
            }
            None => {
                debug!("Cmd input without a mode!")
            }
        }
        self.cmd_mode = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};
    use std::fs;
    use std::io::Write;

    const WIDTH: usize = 120;
    const HEIGHT: usize = 24;

    fn fixture() -> (tempfile::TempDir, Model) {
        let dir = tempfile::tempdir().unwrap();
        let mut topics = fs::File::create(dir.path().join("topics.json")).unwrap();
        write!(
            topics,
            r#"[{{"JSON_file": "kicad", "title": "KiCad EDA"}},
                {{"JSON_file": "skidl", "title": "SKiDL"}}]"#
        )
        .unwrap();
        let mut data = fs::File::create(dir.path().join("kicad.json")).unwrap();
        write!(
            data,
            r#"[
              {{"repo": "kicad", "description": "EDA suite", "owner": "kicad",
                "stars": 900, "forks": 300, "size": 10,
                "pushed": "2023-01-01T10:00:00", "url": "https://github.com/kicad/kicad", "id": 1}},
              {{"repo": "kicad-footprints", "description": null, "owner": "foobar",
                "stars": 80, "forks": 10, "size": 20,
                "pushed": "2024-06-01T10:00:00", "url": "https://github.com/kicad/footprints", "id": 2}},
              {{"repo": "pcb-tools", "description": "Gerber tools", "owner": "foo",
                "stars": 120, "forks": 30, "size": 30,
                "pushed": "2023-06-15T10:00:00", "url": "https://github.com/curtacircuitos/pcb-tools", "id": 3}}
            ]"#
        )
        .unwrap();
        let mut skidl = fs::File::create(dir.path().join("skidl.json")).unwrap();
        write!(
            skidl,
            r#"[{{"repo": "skidl", "owner": "devbisme", "stars": 1,
                 "pushed": "2020-01-01T00:00:00"}}]"#
        )
        .unwrap();

        let catalog = Catalog::load(dir.path()).unwrap();
        let model = Model::init(&RRConfig::default(), catalog, WIDTH, HEIGHT);
        (dir, model)
    }

    fn settle(model: &mut Model) {
        // Drive the event loop without events until the width scan is done.
        let mut guard = 0;
        while model.status == Status::PROCESSING {
            model.update(None).unwrap();
            guard += 1;
            assert!(guard < 1000, "width scan never finished");
        }
    }

    fn first_column(model: &Model) -> Vec<String> {
        model.get_uidata().table[0].data.clone()
    }

    #[test]
    fn startup_without_topic_opens_the_selector() {
        let (_dir, mut model) = fixture();
        model.startup(None, None, None);
        assert_eq!(model.get_uidata().name, "Topics");
        assert_eq!(model.get_uidata().nrows, 2);
    }

    #[test]
    fn startup_loads_topic_by_title_substring() {
        let (_dir, mut model) = fixture();
        model.startup(Some("eda"), None, None);
        settle(&mut model);
        assert_eq!(model.get_uidata().name, "KiCad EDA");
        assert_eq!(model.get_uidata().nrows, 3);
        assert_eq!(
            model.get_uidata().status_message,
            "(3 repositories)"
        );
    }

    #[test]
    fn default_sort_is_pushed_descending() {
        let (_dir, mut model) = fixture();
        model.startup(Some("kicad"), None, None);
        settle(&mut model);
        assert_eq!(
            first_column(&model),
            vec!["kicad-footprints", "pcb-tools", "kicad"]
        );
    }

    #[test]
    fn startup_filter_narrows_the_view() {
        let (_dir, mut model) = fixture();
        model.startup(Some("kicad"), Some("owner:foo%20bar"), None);
        settle(&mut model);
        assert_eq!(model.get_uidata().nrows, 1);
        assert_eq!(first_column(&model), vec!["kicad-footprints"]);
    }

    #[test]
    fn malformed_startup_sort_reports_and_keeps_default() {
        let (_dir, mut model) = fixture();
        model.startup(Some("kicad"), None, Some("pushed desc"));
        assert!(model.get_uidata().show_popup);
        assert!(
            model
                .get_uidata()
                .popup_message
                .starts_with("Malformed sort")
        );
        model.update(Some(Message::Exit)).unwrap();
        settle(&mut model);
        assert_eq!(
            first_column(&model),
            vec!["kicad-footprints", "pcb-tools", "kicad"]
        );
    }

    #[test]
    fn unknown_filter_column_leaves_view_unchanged() {
        let (_dir, mut model) = fixture();
        model.startup(Some("kicad"), None, None);
        settle(&mut model);
        let before = first_column(&model);

        model.apply_filter_expression("zzz:foo");
        assert!(model.get_uidata().show_popup);
        assert_eq!(model.get_uidata().popup_message, "No column matches zzz.");
        model.update(Some(Message::Exit)).unwrap();
        assert_eq!(first_column(&model), before);
        assert_eq!(model.get_uidata().nrows, 3);
    }

    #[test]
    fn filter_typed_through_the_command_line() {
        let (_dir, mut model) = fixture();
        model.startup(Some("kicad"), None, None);
        settle(&mut model);

        model.update(Some(Message::EnterFilter)).unwrap();
        assert!(model.raw_keyevents());
        for chr in "owner:foo".chars() {
            model
                .update(Some(Message::RawKey(KeyEvent::new(
                    KeyCode::Char(chr),
                    KeyModifiers::NONE,
                ))))
                .unwrap();
        }
        model
            .update(Some(Message::RawKey(KeyEvent::new(
                KeyCode::Enter,
                KeyModifiers::NONE,
            ))))
            .unwrap();
        settle(&mut model);
        assert_eq!(model.get_uidata().nrows, 2);
        assert!(!model.raw_keyevents());

        // Esc clears the committed filter and restores the full view.
        model.update(Some(Message::Exit)).unwrap();
        settle(&mut model);
        assert_eq!(model.get_uidata().nrows, 3);
    }

    #[test]
    fn sort_key_toggles_direction_on_repeat() {
        let (_dir, mut model) = fixture();
        model.startup(Some("kicad"), None, None);
        settle(&mut model);

        // Selected column starts at "repo"; first activation sorts ascending.
        model.update(Some(Message::SortColumn)).unwrap();
        assert_eq!(
            first_column(&model),
            vec!["kicad", "kicad-footprints", "pcb-tools"]
        );
        model.update(Some(Message::SortColumn)).unwrap();
        assert_eq!(
            first_column(&model),
            vec!["pcb-tools", "kicad-footprints", "kicad"]
        );
    }

    #[test]
    fn switching_topics_replaces_the_dataset() {
        let (_dir, mut model) = fixture();
        model.startup(Some("kicad"), None, None);
        settle(&mut model);

        model.update(Some(Message::SelectTopic)).unwrap();
        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::Enter)).unwrap();
        settle(&mut model);
        assert_eq!(model.get_uidata().name, "SKiDL");
        assert_eq!(model.get_uidata().nrows, 1);
        assert_eq!(first_column(&model), vec!["skidl"]);
    }

    #[test]
    fn missing_topic_resource_keeps_previous_view() {
        let (dir, mut model) = fixture();
        model.startup(Some("kicad"), None, None);
        settle(&mut model);
        fs::remove_file(dir.path().join("skidl.json")).unwrap();

        model.update(Some(Message::SelectTopic)).unwrap();
        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::Enter)).unwrap();
        assert!(model.get_uidata().show_popup);
        assert!(model.get_uidata().popup_message.starts_with("File not found"));
        model.update(Some(Message::Exit)).unwrap();
        assert_eq!(model.get_uidata().name, "KiCad EDA");
        assert_eq!(model.get_uidata().nrows, 3);
    }

    #[test]
    fn record_view_shows_all_fields_and_the_link() {
        let (_dir, mut model) = fixture();
        model.startup(Some("kicad"), None, None);
        settle(&mut model);

        model.update(Some(Message::Enter)).unwrap();
        let uidata = model.get_uidata();
        assert!(uidata.name.starts_with("R["));
        assert_eq!(uidata.table.len(), 2);
        let fields = &uidata.table[0].data;
        let values = &uidata.table[1].data;
        assert_eq!(fields.last().unwrap(), "link");
        // Default sort puts kicad-footprints first.
        assert_eq!(values[0], "kicad-footprints");
        assert_eq!(values.last().unwrap(), "https://github.com/kicad/footprints");
    }

    #[test]
    fn chunked_scan_reports_progress_on_large_views() {
        let (_dir, mut model) = fixture();
        // Shrink the chunk so the fixture needs several ticks.
        model.config.render_chunk_size = 1;
        model.startup(Some("kicad"), None, None);
        assert_eq!(model.status, Status::PROCESSING);
        model.update(None).unwrap();
        let progress = model.get_uidata().progress.unwrap();
        assert!(progress > 0.0 && progress < 1.0);
        settle(&mut model);
        assert!(model.get_uidata().progress.is_none());
    }

    #[test]
    fn wrap_cell_content_quotes_like_csv() {
        assert_eq!(Model::wrap_cell_content("plain"), "plain");
        assert_eq!(Model::wrap_cell_content("a b"), "\"a b\"");
        assert_eq!(Model::wrap_cell_content("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
