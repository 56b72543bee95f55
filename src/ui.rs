use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Position, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};
use tracing::trace;

use crate::domain::{HELP_TEXT, LOAD_ERROR_TITLE};
use crate::links::{CellContent, LINK_COLUMN, cell_content};
use crate::model::{Model, Status, UIData};
use crate::theme::Palette;

pub const SEARCH_HEIGHT: usize = 3;
pub const STATUSLINE_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const TABLE_BORDER: usize = 2;
pub const COLUMN_SPACING: u16 = 1;

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let table_height = ui_height
            .saturating_sub(SEARCH_HEIGHT + STATUSLINE_HEIGHT + TABLE_HEADER_HEIGHT + TABLE_BORDER);
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_height,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

#[derive(Debug, Default)]
pub struct TableUI {}

impl TableUI {
    pub fn new() -> Self {
        Self {}
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let data = model.get_uidata();
        let palette = data.theme.palette();
        let area = frame.area();

        frame.render_widget(
            Block::new().style(Style::new().bg(palette.background).fg(palette.foreground)),
            area,
        );

        // A failed load replaces the whole content area
        if let Some(message) = data.error {
            self.draw_error(frame, area, message, &palette);
            return;
        }

        let [search_area, table_area, status_area] = Layout::vertical([
            Constraint::Length(SEARCH_HEIGHT as u16),
            Constraint::Min(0),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(area);

        self.draw_search(frame, search_area, &data, &palette);
        match data.status {
            Status::LOADING => {
                let loading = Paragraph::new("Loading ...")
                    .style(Style::new().fg(palette.muted))
                    .centered()
                    .block(Block::bordered());
                frame.render_widget(loading, table_area);
            }
            _ => self.draw_table(frame, table_area, &data, &palette),
        }
        self.draw_statusline(frame, status_area, &data, &palette);

        if data.show_help {
            let popup = popup_area(area, 70, 70);
            frame.render_widget(Clear, popup);
            frame.render_widget(
                Paragraph::new(HELP_TEXT)
                    .style(Style::new().bg(palette.background).fg(palette.foreground))
                    .block(Block::bordered().title(" Help ")),
                popup,
            );
        }
    }

    fn draw_search(&self, frame: &mut Frame, area: Rect, data: &UIData, palette: &Palette) {
        let settings = Line::from(format!(
            " Sort: {} | Theme: {} ",
            data.sort_order.as_str(),
            data.theme.as_str()
        ))
        .right_aligned();
        let border_style = if data.active_search {
            Style::new().fg(palette.header)
        } else {
            Style::new().fg(palette.muted)
        };
        let block = Block::bordered()
            .title(" Search ")
            .title_top(settings)
            .border_style(border_style);

        let text = if data.search.input.is_empty() && !data.active_search {
            Line::from(Span::styled(
                "Press / to search by name",
                Style::new().fg(palette.muted),
            ))
        } else {
            Line::from(data.search.input.as_str())
        };
        frame.render_widget(Paragraph::new(text).block(block), area);

        if data.active_search {
            let x = area.x + 1 + data.search.cursor_pos as u16;
            frame.set_cursor_position(Position::new(
                x.min(area.right().saturating_sub(2)),
                area.y + 1,
            ));
        }
    }

    fn draw_table(&self, frame: &mut Frame, area: Rect, data: &UIData, palette: &Palette) {
        let title = Line::from(format!(" {} ", data.name)).centered();
        let position = if data.nrows > 0 {
            format!(" {}/{} ", data.abs_selected_row + 1, data.nrows)
        } else {
            format!(" 0/{} ", data.total_rows)
        };
        let block = Block::bordered()
            .title(title)
            .title_bottom(Line::from(position).right_aligned())
            .border_style(Style::new().fg(palette.muted));

        if let Some(term) = data.no_results {
            let text = Text::from(vec![
                Line::from(""),
                Line::from(format!("No results found for \"{term}\"")),
            ]);
            frame.render_widget(
                Paragraph::new(text)
                    .style(Style::new().fg(palette.muted))
                    .centered()
                    .wrap(Wrap { trim: true })
                    .block(block),
                area,
            );
            return;
        }

        let widths = column_widths(data);
        let header = Row::new(data.headers.iter().enumerate().map(|(idx, name)| {
            let cell = Cell::from(name.as_str());
            if idx == LINK_COLUMN {
                cell.style(Style::new().add_modifier(Modifier::HIDDEN))
            } else {
                cell
            }
        }))
        .style(
            Style::new()
                .fg(palette.header)
                .add_modifier(Modifier::BOLD),
        )
        .height(TABLE_HEADER_HEIGHT as u16);

        let link_style = Style::new()
            .fg(palette.link)
            .add_modifier(Modifier::UNDERLINED);
        let ncols = widths.len();
        let rows = data.rows.iter().copied().map(move |row| {
            Row::new((0..ncols).map(move |column| match cell_content(row, column) {
                CellContent::Link { text, .. } => Cell::from(Span::styled(text, link_style)),
                CellContent::Suppressed(text) => {
                    Cell::from(text).style(Style::new().add_modifier(Modifier::HIDDEN))
                }
                CellContent::Plain(text) => Cell::from(text),
            }))
        });

        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(COLUMN_SPACING)
            .row_highlight_style(Style::new().bg(palette.selection))
            .block(block);

        let mut state = TableState::default().with_selected(Some(data.selected_row));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_statusline(&self, frame: &mut Frame, area: Rect, data: &UIData, palette: &Palette) {
        let [left, right] =
            Layout::horizontal([Constraint::Min(0), Constraint::Length(10)]).areas(area);
        let message = match &data.tooltip {
            Some(tooltip) => Span::styled(tooltip.clone(), Style::new().fg(palette.link)),
            None => Span::styled(data.status_message, Style::new().fg(palette.muted)),
        };
        frame.render_widget(Paragraph::new(Line::from(message)), left);
        frame.render_widget(
            Paragraph::new(Line::from("? help").right_aligned())
                .style(Style::new().fg(palette.muted)),
            right,
        );
    }

    fn draw_error(&self, frame: &mut Frame, area: Rect, message: &str, palette: &Palette) {
        let popup = popup_area(area, 80, 40);
        let block = Block::bordered()
            .title(Line::from(format!(" {LOAD_ERROR_TITLE} ")).centered())
            .border_style(Style::new().fg(palette.error));
        let text = Text::from(vec![
            Line::from(""),
            Line::from(message),
            Line::from(""),
            Line::from(Span::styled("Press q to quit", Style::new().fg(palette.muted))),
        ]);
        frame.render_widget(
            Paragraph::new(text)
                .style(Style::new().fg(palette.error))
                .centered()
                .wrap(Wrap { trim: true })
                .block(block),
            popup,
        );
    }
}

// Width of each column from the rows that are currently visible. The url
// column gets no space at all.
fn column_widths(data: &UIData) -> Vec<Constraint> {
    let ncols = data
        .rows
        .iter()
        .map(|r| r.len())
        .chain(std::iter::once(data.headers.len()))
        .max()
        .unwrap_or(0);

    (0..ncols)
        .map(|column| {
            if column == LINK_COLUMN {
                return Constraint::Length(0);
            }
            let header = data.headers.get(column).map(|h| h.chars().count()).unwrap_or(0);
            let widest = data
                .rows
                .iter()
                .filter_map(|r| r.get(column))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0);
            let width = std::cmp::max(header, widest).clamp(1, data.max_column_width.max(1));
            Constraint::Length(width as u16)
        })
        .collect()
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = vertical.areas(area);
    let [area] = horizontal.areas(area);
    area
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Message, TVConfig, TVError};
    use crate::table::Dataset;
    use ratatui::{Terminal, backend::TestBackend, buffer::Buffer};
    use std::path::Path;

    fn buffer_text(buffer: &Buffer) -> String {
        let width = buffer.area.width as usize;
        buffer
            .content
            .chunks(width)
            .map(|line| line.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<String>>()
            .join("\n")
    }

    fn render(model: &Model) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        let ui = TableUI::new();
        terminal.draw(|f| ui.draw(model, f)).unwrap();
        buffer_text(terminal.backend().buffer())
    }

    fn model(dir: &tempfile::TempDir) -> Model {
        let config = TVConfig::default().with_settings_path(dir.path().join("settings.json"));
        let mut model = Model::init(&config, Path::new("datos.csv"));
        model.update(Some(Message::Resize(80, 20))).unwrap();
        model
    }

    #[test]
    fn url_column_is_not_shown() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = model(&dir);
        model.finish_loading(Ok(Dataset::new(
            "datos.csv",
            vec!["Name".into(), "Website".into(), "City".into()],
            vec![vec![
                "Example".into(),
                "https://www.example.com/x".into(),
                "Lima".into(),
            ]],
        )));

        let screen = render(&model);
        assert!(screen.contains("Example"));
        assert!(screen.contains("Lima"));
        assert!(!screen.contains("https://www.example.com/x"));
        assert!(!screen.contains("Website"));
        // Tooltip of the selected row in the status line
        assert!(screen.contains("Visit example.com"));
    }

    #[test]
    fn action_feedback_is_shown_on_linked_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = model(&dir);
        model.finish_loading(Ok(Dataset::new(
            "datos.csv",
            vec!["Name".into(), "Website".into()],
            vec![vec!["Example".into(), "https://www.example.com/x".into()]],
        )));
        model.update(Some(Message::ToggleTheme)).unwrap();

        // The status line is the last row
        let screen = render(&model);
        let status = screen.lines().last().unwrap_or_default();
        let theme = model.get_uidata().theme.as_str();
        assert!(status.starts_with(&format!("Theme: {theme}")));
        assert!(!screen.contains("Visit example.com"));

        model.update(Some(Message::MoveBeginning)).unwrap();
        let screen = render(&model);
        assert!(screen.lines().last().unwrap_or_default().starts_with("Visit example.com"));
    }

    #[test]
    fn failure_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = model(&dir);
        model.finish_loading(Err(TVError::EmptyData));

        let screen = render(&model);
        assert!(screen.contains(LOAD_ERROR_TITLE));
        assert!(!screen.contains("Search"));
    }

    #[test]
    fn layout_reserves_chrome() {
        let layout = UILayout::from_values(80, 20);
        assert_eq!(layout.table_height, 13);
        assert_eq!(UILayout::from_values(10, 3).table_height, 0);
    }
}
