use crate::app::{App, InputMode};
use crate::input::TextInput;
use highlight_filters::constants::{
    CONFIRM_POPUP_HEIGHT, CONFIRM_POPUP_WIDTH, GROUPS_PANEL_HEIGHT, INPUT_FIELD_HEIGHT,
    LINE_NUMBER_WIDTH, STATUS_BAR_HEIGHT,
};
use highlight_filters::controller::Renderer;
use highlight_filters::highlight::DecorationPlan;
use highlight_filters::style::{resolve_filter, FontStyle, FontWeight, Rgba, StyleDescriptor};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Frame,
};
use std::collections::HashMap;

/// Byte span on one line with the style it is drawn in.
#[derive(Debug, Clone, Copy, PartialEq)]
struct StyledSpan {
    start: usize,
    end: usize,
    style: Style,
}

/// Decorations installed by the controller, indexed by line for drawing.
#[derive(Debug, Default)]
pub struct TuiRenderer {
    lines: HashMap<usize, Vec<StyledSpan>>,
}

impl Renderer for TuiRenderer {
    fn release_all(&mut self) {
        self.lines.clear();
    }

    fn install(&mut self, plan: &DecorationPlan) {
        for group in &plan.groups {
            let style = to_style(&group.descriptor);
            for span in &group.spans {
                self.lines.entry(span.line).or_default().push(StyledSpan {
                    start: span.start,
                    end: span.end,
                    style,
                });
            }
        }
    }
}

impl TuiRenderer {
    pub fn styled_line(&self, line: usize, text: &str) -> Vec<(String, Style)> {
        let spans = self.lines.get(&line).map_or(&[][..], Vec::as_slice);
        apply_spans(text, spans)
    }
}

fn to_color(rgba: Option<Rgba>) -> Option<Color> {
    // Terminals have no alpha channel; fully transparent means no override.
    rgba.filter(|c| c.a > 0.0).map(|c| Color::Rgb(c.r, c.g, c.b))
}

fn to_style(descriptor: &StyleDescriptor) -> Style {
    let mut style = Style::default();
    if let Some(fg) = to_color(descriptor.color) {
        style = style.fg(fg);
    }
    if let Some(bg) = to_color(descriptor.background_color) {
        style = style.bg(bg);
    }
    if descriptor.font_weight == FontWeight::Bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    if descriptor.font_style == FontStyle::Italic {
        style = style.add_modifier(Modifier::ITALIC);
    }
    style
}

/// Split `text` into styled runs. Spans are layered in order, so a later span
/// wins where two overlap. Offsets past the end or inside a character (stale
/// spans after an edit) are tolerated.
fn apply_spans(text: &str, spans: &[StyledSpan]) -> Vec<(String, Style)> {
    if spans.is_empty() {
        return vec![(text.to_string(), Style::default())];
    }

    let mut style_at = vec![Style::default(); text.len()];
    for span in spans {
        let end = span.end.min(text.len());
        for slot in style_at.iter_mut().take(end).skip(span.start) {
            *slot = slot.patch(span.style);
        }
    }

    let mut result: Vec<(String, Style)> = Vec::new();
    for (i, c) in text.char_indices() {
        let style = style_at[i];
        match result.last_mut() {
            Some((run, run_style)) if *run_style == style => run.push(c),
            _ => result.push((c.to_string(), style)),
        }
    }
    result
}

pub fn draw(frame: &mut Frame, app: &mut App) {
    let prompting = matches!(app.input_mode, InputMode::Prompt(_));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(GROUPS_PANEL_HEIGHT),
            Constraint::Min(1),
            Constraint::Length(if prompting { INPUT_FIELD_HEIGHT } else { 0 }),
            Constraint::Length(STATUS_BAR_HEIGHT),
        ])
        .split(frame.area());

    draw_groups_panel(frame, app, chunks[0]);
    draw_document(frame, app, chunks[1]);
    if prompting {
        draw_prompt(frame, &app.prompt, chunks[2]);
    }
    draw_status_bar(frame, app, chunks[3]);

    if matches!(app.input_mode, InputMode::Confirm(_)) {
        draw_confirm(frame, &app.confirm_message);
    }
}

/// Height of the document viewport for a terminal of `height` rows.
pub fn document_height(height: u16) -> usize {
    height
        .saturating_sub(GROUPS_PANEL_HEIGHT + STATUS_BAR_HEIGHT + 2)
        .into()
}

fn draw_groups_panel(frame: &mut Frame, app: &App, area: Rect) {
    let inner_height = area.height.saturating_sub(2) as usize;
    let skip = (app.selected_group + 1).saturating_sub(inner_height);
    let dim = Style::default().fg(Color::DarkGray);

    let items: Vec<ListItem> = app
        .panel
        .groups
        .iter()
        .enumerate()
        .skip(skip)
        .map(|(idx, group)| {
            let marker = if idx == app.selected_group { "▶ " } else { "  " };
            let check = if group.enabled { "[x] " } else { "[ ] " };
            let mut spans = vec![
                Span::styled(marker, Style::default().fg(Color::Yellow)),
                Span::raw(check),
                Span::styled(format!("{:<12}", group.name), Style::default().fg(Color::Cyan)),
            ];
            for filter in &group.filters {
                let style = if group.enabled && filter.enabled {
                    to_style(&resolve_filter(filter))
                } else {
                    dim
                };
                let count = app.panel.match_counts.get(&filter.id).copied().unwrap_or(0);
                spans.push(Span::raw(" "));
                spans.push(Span::styled(filter.pattern.clone(), style));
                spans.push(Span::styled(format!("({})", count), dim));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let title = format!(
        " Filter groups [{}] | ranges: {} | active: {} ",
        app.panel.groups.len(),
        app.panel.ranges.len() + 1,
        app.panel.active_range_id
    );
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(list, area);
}

fn draw_document(frame: &mut Frame, app: &mut App, area: Rect) {
    let inner_height = area.height.saturating_sub(2) as usize;
    app.scroll_into_view(inner_height);

    let Some(doc) = app.controller.document() else {
        let empty = Paragraph::new("No document").block(Block::default().borders(Borders::ALL));
        frame.render_widget(empty, area);
        return;
    };

    let cursor = app.controller.cursor_line();
    let renderer = app.controller.renderer();
    let number_width = LINE_NUMBER_WIDTH - 3;
    let items: Vec<ListItem> = (app.scroll..doc.line_count())
        .take(inner_height)
        .filter_map(|idx| doc.line(idx).map(|text| (idx, text)))
        .map(|(idx, text)| {
            let number_style = if idx == cursor {
                Style::default().fg(Color::Black).bg(Color::Yellow)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let mut spans = vec![
                Span::styled(format!("{:>width$}", idx + 1, width = number_width), number_style),
                Span::styled(" │ ", Style::default().fg(Color::DarkGray)),
            ];
            for (run, style) in renderer.styled_line(idx, text) {
                spans.push(Span::styled(run, style));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let title = format!(
        " {} [{} lines] {}",
        doc.uri(),
        doc.line_count(),
        if app.controller.is_projected() {
            "[MATCHED] "
        } else {
            ""
        }
    );
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(list, area);
}

fn draw_prompt(frame: &mut Frame, input: &TextInput, area: Rect) {
    let style = Style::default().fg(Color::Yellow);
    let widget = Paragraph::new(input.text.as_str())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{}(Enter: apply, Esc: cancel) ", input.title))
                .border_style(style),
        )
        .style(style);
    frame.render_widget(widget, area);
    frame.set_cursor_position((area.x + input.cursor_column() + 1, area.y + 1));
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let status = if let Some(msg) = &app.status_message {
        msg.clone()
    } else {
        let group = app
            .selected_group()
            .map_or_else(|| "-".to_string(), |g| g.name.clone());
        format!(
            "Range: {} | Group: {} | q:Quit m:Matched Tab:Group space:Toggle r:Range a/n:Add p:Pattern D:Delete R/X:Range e/i:Export/Import",
            app.active_range_name(),
            group
        )
    };

    let paragraph = Paragraph::new(status).style(Style::default().fg(Color::White).bg(Color::Blue));
    frame.render_widget(paragraph, area);
}

fn draw_confirm(frame: &mut Frame, message: &str) {
    let area = frame.area();
    let popup_width = CONFIRM_POPUP_WIDTH.min(area.width.saturating_sub(4));
    let popup_height = CONFIRM_POPUP_HEIGHT.min(area.height.saturating_sub(4));

    let popup_area = Rect {
        x: area.width.saturating_sub(popup_width) / 2,
        y: area.height.saturating_sub(popup_height) / 2,
        width: popup_width,
        height: popup_height,
    };

    let text = vec![
        Line::from(Span::styled(
            format!("  {}", message),
            Style::default().fg(Color::White),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "  Press 'y' to confirm, any other key to cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let popup = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Confirm ")
                .border_style(Style::default().fg(Color::Red)),
        )
        .style(Style::default().bg(Color::Black));

    frame.render_widget(Clear, popup_area);
    frame.render_widget(popup, popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use highlight_filters::highlight::{DecorationSpan, StyleGroup};
    use highlight_filters::style::{resolve, StyleFingerprint};

    fn group(fg: &str, spans: &[(usize, usize, usize)]) -> StyleGroup {
        let fingerprint = StyleFingerprint {
            foreground: fg.to_string(),
            background: String::new(),
            bold: false,
            italic: false,
            whole_line: false,
        };
        StyleGroup {
            descriptor: resolve(&fingerprint),
            fingerprint,
            spans: spans
                .iter()
                .map(|&(line, start, end)| DecorationSpan { line, start, end })
                .collect(),
        }
    }

    #[test]
    fn test_later_group_wins_on_overlap() {
        let mut renderer = TuiRenderer::default();
        renderer.install(&DecorationPlan {
            groups: vec![group("ff0000ff", &[(0, 0, 5)]), group("00ff00ff", &[(0, 3, 8)])],
        });
        let runs = renderer.styled_line(0, "abcdefghij");
        let red = Style::default().fg(Color::Rgb(255, 0, 0));
        let green = Style::default().fg(Color::Rgb(0, 255, 0));
        assert_eq!(
            runs,
            vec![
                ("abc".to_string(), red),
                ("defgh".to_string(), green),
                ("ij".to_string(), Style::default()),
            ]
        );
    }

    #[test]
    fn test_release_clears_decorations() {
        let mut renderer = TuiRenderer::default();
        renderer.install(&DecorationPlan {
            groups: vec![group("ff0000ff", &[(1, 0, 1)])],
        });
        renderer.release_all();
        assert_eq!(
            renderer.styled_line(1, "x"),
            vec![("x".to_string(), Style::default())]
        );
    }

    #[test]
    fn test_stale_spans_do_not_split_characters() {
        let spans = [StyledSpan {
            start: 1,
            end: 40,
            style: Style::default().fg(Color::Red),
        }];
        let runs = apply_spans("éa", &spans);
        let text: String = runs.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(text, "éa");
    }

    #[test]
    fn test_transparent_colour_is_ignored() {
        assert_eq!(to_color(Rgba::parse_hex("ff000000")), None);
        assert_eq!(
            to_color(Rgba::parse_hex("#102030")),
            Some(Color::Rgb(0x10, 0x20, 0x30))
        );
    }
}
