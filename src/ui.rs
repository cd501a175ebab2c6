use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::GridConfig;
use crate::model::{Model, Popup, UIData};

pub const TOOLBAR_HEIGHT: usize = 1;
pub const STATUSLINE_HEIGHT: usize = 1;
pub const CMDLINE_HEIGH: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const TABLE_BORDER: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;
pub const PROGRESS_WIDTH: usize = 10;

/// Colors of one theme.
struct Palette {
    text: Color,
    background: Color,
    header: Color,
    header_text: Color,
    border: Color,
    selected_row: Color,
    selected_column: Color,
    new_column: Color,
    accent: Color,
    muted: Color,
}

impl Palette {
    fn light() -> Self {
        Palette {
            text: Color::Rgb(30, 41, 59),
            background: Color::Rgb(241, 245, 249),
            header: Color::Rgb(226, 232, 240),
            header_text: Color::Rgb(51, 65, 85),
            border: Color::Rgb(148, 163, 184),
            selected_row: Color::Rgb(203, 213, 225),
            selected_column: Color::Rgb(37, 99, 235),
            new_column: Color::Rgb(191, 219, 254),
            accent: Color::Rgb(37, 99, 235),
            muted: Color::Rgb(100, 116, 139),
        }
    }

    fn dark() -> Self {
        Palette {
            text: Color::Rgb(226, 232, 240),
            background: Color::Rgb(15, 23, 42),
            header: Color::Rgb(51, 65, 85),
            header_text: Color::Rgb(226, 232, 240),
            border: Color::Rgb(71, 85, 105),
            selected_row: Color::Rgb(51, 65, 85),
            selected_column: Color::Rgb(96, 165, 250),
            new_column: Color::Rgb(30, 58, 138),
            accent: Color::Rgb(96, 165, 250),
            muted: Color::Rgb(148, 163, 184),
        }
    }

    fn for_mode(dark_mode: bool) -> Self {
        if dark_mode { Self::dark() } else { Self::light() }
    }
}

#[derive(Debug)]
pub struct TableUI {
    max_column_width: usize,
}

impl TableUI {
    pub fn new(config: &GridConfig) -> Self {
        Self {
            max_column_width: config.max_column_width,
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let palette = Palette::for_mode(uidata.dark_mode);

        let base = Style::default().fg(palette.text).bg(palette.background);
        frame.render_widget(Block::default().style(base), frame.area());

        let [toolbar, table, statusline, cmdline] = Layout::vertical([
            Constraint::Length(TOOLBAR_HEIGHT as u16),
            Constraint::Min(1),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
            Constraint::Length(CMDLINE_HEIGH as u16),
        ])
        .areas(frame.area());

        self.render_toolbar(uidata, &palette, frame, toolbar);
        self.render_table(uidata, &palette, frame, table);
        self.render_statusline(uidata, &palette, frame, statusline);
        self.render_cmdline(uidata, &palette, frame, cmdline);

        if let Some(popup) = uidata.popup.as_ref() {
            self.render_popup(popup, &palette, frame);
        }
    }

    fn render_toolbar(&self, uidata: &UIData, palette: &Palette, frame: &mut Frame, area: Rect) {
        let mut spans = vec![
            Span::styled(" gridview ", Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)),
            Span::raw(" Filter: "),
        ];
        if uidata.filter.is_empty() {
            spans.push(Span::styled("(none)", Style::default().fg(palette.muted)));
        } else {
            spans.push(Span::styled(
                uidata.filter.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        }
        spans.push(Span::raw(format!(
            "  Rows: {}/{}",
            uidata.filtered_rows, uidata.total_rows
        )));
        spans.push(Span::styled(
            format!(
                "  {} {}",
                if uidata.dark_mode { "☾ dark" } else { "☀ light" },
                if uidata.compact_mode { "compact" } else { "" }
            ),
            Style::default().fg(palette.muted),
        ));
        if uidata.loading {
            spans.push(Span::styled("  loading ...", Style::default().fg(palette.accent)));
        }
        spans.push(Span::styled("  ? help", Style::default().fg(palette.muted)));
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_table(&self, uidata: &UIData, palette: &Palette, frame: &mut Frame, area: Rect) {
        let block = Block::bordered()
            .title(format!(" {} ", uidata.name))
            .border_style(Style::default().fg(palette.border));

        if uidata.table.is_empty() {
            let message = if uidata.total_rows == 0 { "No data" } else { "No columns" };
            frame.render_widget(
                Paragraph::new(message).style(Style::default().fg(palette.muted)).block(block),
                area,
            );
            return;
        }
        if uidata.index.data.is_empty() {
            frame.render_widget(
                Paragraph::new("No results found")
                    .style(Style::default().fg(palette.muted))
                    .block(block),
                area,
            );
            return;
        }

        let row_height = if uidata.compact_mode { 1 } else { 2 };
        let header_style = Style::default()
            .fg(palette.header_text)
            .bg(palette.header)
            .add_modifier(Modifier::BOLD);

        let mut header_cells = vec![Cell::from(uidata.index.name.clone()).style(header_style)];
        for (cidx, column) in uidata.table.iter().enumerate() {
            let mut style = header_style;
            if column.highlighted {
                style = style.bg(palette.new_column);
            }
            if cidx == uidata.selected_column {
                style = style.fg(palette.selected_column).add_modifier(Modifier::UNDERLINED);
            }
            header_cells.push(Cell::from(column.name.clone()).style(style));
        }
        let header = Row::new(header_cells).height(TABLE_HEADER_HEIGHT as u16);

        let rows = (0..uidata.index.data.len()).map(|ridx| {
            let mut cells = vec![
                Cell::from(uidata.index.data[ridx].clone()).style(Style::default().fg(palette.muted)),
            ];
            cells.extend(uidata.table.iter().map(|column| {
                let text = column.data.get(ridx).cloned().unwrap_or_default();
                let text: String = text.chars().take(self.max_column_width).collect();
                let style = if column.highlighted {
                    Style::default().bg(palette.new_column)
                } else {
                    Style::default()
                };
                Cell::from(text).style(style)
            }));
            Row::new(cells).height(row_height)
        });

        let widths = std::iter::once(Constraint::Length(uidata.index.width as u16)).chain(
            uidata
                .table
                .iter()
                .map(|c| Constraint::Length(c.width as u16)),
        );

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .column_spacing(1)
            .row_highlight_style(
                Style::default()
                    .bg(palette.selected_row)
                    .add_modifier(Modifier::BOLD),
            );

        let mut state = TableState::default().with_selected(Some(uidata.selected_row));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn render_statusline(&self, uidata: &UIData, palette: &Palette, frame: &mut Frame, area: Rect) {
        let [message, pages] =
            Layout::horizontal([Constraint::Min(1), Constraint::Length(24)]).areas(area);
        frame.render_widget(
            Paragraph::new(uidata.status_message.clone()).style(Style::default().fg(palette.muted)),
            message,
        );
        let page_info = Line::from(vec![
            Span::raw("Page "),
            Span::styled(
                (uidata.page_index + 1).to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(" of "),
            Span::styled(
                uidata.page_count.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
        ]);
        frame.render_widget(Paragraph::new(page_info).right_aligned(), pages);
    }

    fn render_cmdline(&self, uidata: &UIData, palette: &Palette, frame: &mut Frame, area: Rect) {
        if !uidata.active_cmdinput {
            return;
        }
        let prompt = uidata.cmd_mode.map(|m| m.prompt()).unwrap_or("> ");
        let line = Line::from(vec![
            Span::styled(prompt, Style::default().fg(palette.accent)),
            Span::raw(uidata.cmdinput.input.clone()),
        ]);
        frame.render_widget(Paragraph::new(line), area);

        let x = area.x + (prompt.chars().count() + uidata.cmdinput.cursor_pos) as u16;
        frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
    }

    fn render_popup(&self, popup: &Popup, palette: &Palette, frame: &mut Frame) {
        let area = popup_area(frame.area(), 60, 70);
        frame.render_widget(Clear, area);

        let (title, lines) = match popup {
            Popup::Help(text) => (
                " Help ".to_string(),
                text.lines().map(|l| Line::from(l.to_string())).collect::<Vec<Line>>(),
            ),
            Popup::Record {
                title,
                fields,
                offset,
            } => {
                let key_width = fields.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
                let lines = fields
                    .iter()
                    .skip(*offset)
                    .map(|(key, value)| {
                        Line::from(vec![
                            Span::styled(
                                format!("{key:>key_width$}: "),
                                Style::default().add_modifier(Modifier::BOLD),
                            ),
                            Span::raw(value.clone()),
                        ])
                    })
                    .collect();
                (format!(" {title} "), lines)
            }
        };

        let block = Block::bordered()
            .title(title)
            .title_bottom(Line::from(" <Esc> close ").centered())
            .border_style(Style::default().fg(palette.accent))
            .style(Style::default().fg(palette.text).bg(palette.background));
        frame.render_widget(
            Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
            area,
        );
    }
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
    use crate::domain::Message;
    use ratatui::{Terminal, backend::TestBackend};

    fn render(model: &Model, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        let mut ui = TableUI::new(&GridConfig::default());
        terminal.draw(|f| ui.draw(model, f)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(width as usize)
            .map(|line| line.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<String>>()
            .join("\n")
    }

    #[test]
    fn renders_headers_and_pages() {
        let config = GridConfig::default().with_initial_rows(25);
        let model = Model::init(&config, 120, 30).unwrap();
        let screen = render(&model, 120, 30);
        assert!(screen.contains("First Name"));
        assert!(screen.contains("Profile Progress"));
        assert!(screen.contains("First1"));
        assert!(screen.contains("Page 1 of 3"));
    }

    #[test]
    fn renders_help_popup() {
        let config = GridConfig::default().with_initial_rows(5);
        let mut model = Model::init(&config, 100, 40).unwrap();
        model.update(Some(Message::Help)).unwrap();
        let screen = render(&model, 100, 40);
        assert!(screen.contains("key bindings"));
    }
}
