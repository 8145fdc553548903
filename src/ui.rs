use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Style, Stylize},
    text::{Line, Span},
    widgets::{
        Block, Cell, Clear, Gauge, Paragraph, Row, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Table, TableState, Wrap,
    },
};

use crate::domain::CMDMode;
use crate::model::UIData;

pub const TITLE_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const CMDLINE_HEIGHT: usize = 1;
pub const SCROLLBAR_WIDTH: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

// Stateless renderer: everything it paints comes out of the UIData snapshot
// the model maintains.
pub struct TableUI;

impl TableUI {
    pub fn new() -> Self {
        TableUI
    }

    pub fn draw(&self, uidata: &UIData, frame: &mut Frame) {
        let [title_area, main_area, status_area] = Layout::vertical([
            Constraint::Length(TITLE_HEIGHT as u16),
            Constraint::Min(0),
            Constraint::Length(uidata.layout.statusline_height.max(CMDLINE_HEIGHT) as u16),
        ])
        .areas(frame.area());

        self.draw_title(uidata, frame, title_area);
        if uidata.table.is_empty() {
            let hint = Paragraph::new("No topic loaded. Press t to select one.").centered();
            frame.render_widget(hint, main_area);
        } else {
            self.draw_table(uidata, frame, main_area);
        }
        self.draw_statusline(uidata, frame, status_area);
        if uidata.show_popup {
            self.draw_popup(uidata, frame, main_area);
        }
    }

    fn draw_title(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let title = Line::from(vec![
            Span::from(" reporecon ").bold(),
            Span::from(format!(" {} ", uidata.name)),
            Span::from(format!("({} repositories) ", uidata.nrows)).dim(),
        ]);
        frame.render_widget(Paragraph::new(title).reversed(), area);
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let show_index = uidata.layout.index_width > 0 && !uidata.index.data.is_empty();
        let window_len = uidata.table.first().map(|c| c.data.len()).unwrap_or(0);

        let mut widths: Vec<Constraint> = Vec::with_capacity(uidata.table.len() + 1);
        if show_index {
            widths.push(Constraint::Length(uidata.index.width as u16));
        }
        widths.extend(
            uidata
                .table
                .iter()
                .map(|c| Constraint::Length(c.width as u16)),
        );

        let mut header: Vec<Cell> = Vec::with_capacity(uidata.table.len() + 1);
        if show_index {
            header.push(Cell::from(""));
        }
        header.extend(uidata.table.iter().enumerate().map(|(cidx, c)| {
            let name = Span::from(c.name.clone());
            if cidx == uidata.selected_column {
                Cell::from(name.yellow().bold())
            } else {
                Cell::from(name.bold())
            }
        }));

        let rows = (0..window_len).map(|r| {
            let mut cells: Vec<Cell> = Vec::with_capacity(uidata.table.len() + 1);
            if show_index {
                cells.push(Cell::from(
                    uidata.index.data.get(r).cloned().unwrap_or_default().dim(),
                ));
            }
            cells.extend(
                uidata
                    .table
                    .iter()
                    .map(|c| Cell::from(c.data.get(r).cloned().unwrap_or_default())),
            );
            Row::new(cells)
        });

        let table = Table::new(rows, widths)
            .header(Row::new(header))
            .column_spacing(1)
            .row_highlight_style(Style::new().reversed());
        let mut state = TableState::default().with_selected(Some(uidata.selected_row));
        frame.render_stateful_widget(table, area, &mut state);

        // Scrollbar over the whole view, not just the visible window.
        if uidata.nrows > window_len {
            let mut scrollbar_state =
                ScrollbarState::new(uidata.nrows).position(uidata.abs_selected_row);
            frame.render_stateful_widget(
                Scrollbar::new(ScrollbarOrientation::VerticalRight),
                area,
                &mut scrollbar_state,
            );
        }
    }

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.active_cmdinput {
            let prompt_char = match uidata.cmd_mode {
                Some(CMDMode::Filter) => "/",
                None => ":",
            };
            let prompt = Line::from(vec![
                Span::from(prompt_char).bold(),
                Span::from(uidata.cmdinput.input.clone()),
            ]);
            frame.render_widget(Paragraph::new(prompt), area);
            frame.set_cursor_position((
                area.x + 1 + uidata.cmdinput.curser_pos as u16,
                area.y,
            ));
            return;
        }
        if let Some(progress) = uidata.progress {
            let gauge = Gauge::default()
                .ratio(progress.clamp(0.0, 1.0))
                .label(format!("Rendering {:3.0}%", progress * 100.0));
            frame.render_widget(gauge, area);
            return;
        }
        let status = Line::from(vec![
            Span::from(uidata.status_message.clone()),
            Span::from("  |  ? help, q quit").dim(),
        ]);
        frame.render_widget(Paragraph::new(status), area);
    }

    fn draw_popup(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let lines = uidata.popup_message.lines().count() as u16 + 2;
        let popup_area = Self::centered(area, 60, lines);
        frame.render_widget(Clear, popup_area);
        let popup = Paragraph::new(uidata.popup_message.clone())
            .wrap(Wrap { trim: false })
            .block(Block::bordered().title(" Notice (Esc to close) "));
        frame.render_widget(popup, popup_area);
    }

    // A rect centered in `area`, `percent_x` wide and at most `height` tall.
    fn centered(area: Rect, percent_x: u16, height: u16) -> Rect {
        let width = area.width * percent_x / 100;
        let height = std::cmp::min(height, area.height);
        let x = area.x + (area.width.saturating_sub(width)) / 2;
        let y = area.y + (area.height.saturating_sub(height)) / 2;
        Rect::new(x, y, width, height)
    }
}
