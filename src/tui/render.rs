//! View rendering
//!
//! Pure drawing over a `ViewState` snapshot; nothing here mutates flow
//! state.

use super::input::RendererRegistry;
use crate::flow::{FlowResult, Node, StepKey};
use crate::state_machine::ViewState;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

pub fn draw(frame: &mut Frame, view: &ViewState, selection: Option<usize>, registry: &RendererRegistry) {
    let error_height = if view.last_error().is_some() { 3 } else { 0 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),            // header
            Constraint::Length(3),            // progress
            Constraint::Length(error_height), // error banner
            Constraint::Min(0),               // body
            Constraint::Length(1),            // key hints
        ])
        .split(frame.area());

    render_header(frame, chunks[0]);
    render_progress(frame, chunks[1], view.active_step());

    if let Some(message) = view.last_error() {
        let needs_restart = view
            .error_kind()
            .is_some_and(crate::client::FlowErrorKind::needs_restart);
        render_error(frame, chunks[2], message, needs_restart);
    }

    if let Some(result) = view.result() {
        render_result(frame, chunks[3], result);
    } else if let Some(node) = view.current_node() {
        render_question(frame, chunks[3], node, selection, view.busy(), registry);
    } else {
        render_waiting(frame, chunks[3], view);
    }

    render_hints(frame, chunks[4], view);
}

fn render_header(frame: &mut Frame, area: Rect) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "Compass Career Guide",
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "  Let's plan your future in a few quick steps",
            Style::default().fg(Color::DarkGray),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, area);
}

/// Fixed horizontal progression of named steps. A step is highlighted iff
/// its position is at or before the active one; the highlight never moves
/// backward visually even if the server emits steps out of order.
fn render_progress(frame: &mut Frame, area: Rect, active: StepKey) {
    let active_pos = active.position();
    let mut spans = Vec::new();

    for (i, step) in StepKey::ORDER.iter().enumerate() {
        let style = if step.position() <= active_pos {
            Style::default()
                .fg(Color::Black)
                .bg(Color::White)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!(" {} {} ", i + 1, step.label()), style));
        if i + 1 < StepKey::ORDER.len() {
            spans.push(Span::raw("─"));
        }
    }

    let progress =
        Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(progress, area);
}

fn render_error(frame: &mut Frame, area: Rect, message: &str, needs_restart: bool) {
    let text = if needs_restart {
        format!("{message}  (press r)")
    } else {
        message.to_string()
    };
    let banner = Paragraph::new(text)
        .style(Style::default().fg(Color::Red))
        .block(Block::default().borders(Borders::ALL).title("Error"))
        .wrap(Wrap { trim: true });
    frame.render_widget(banner, area);
}

fn render_question(
    frame: &mut Frame,
    area: Rect,
    node: &Node,
    selection: Option<usize>,
    busy: bool,
    registry: &RendererRegistry,
) {
    let title = node
        .meta
        .label
        .clone()
        .unwrap_or_else(|| node.meta.step_key().label().to_string());

    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let desc_height = if node.ui.description.is_some() { 2 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),           // question text
            Constraint::Length(desc_height), // description
            Constraint::Min(0),              // input area
            Constraint::Length(1),           // advance hint
        ])
        .split(inner);

    let question = Paragraph::new(node.ui.question_text.as_str())
        .style(Style::default().add_modifier(Modifier::BOLD))
        .wrap(Wrap { trim: true });
    frame.render_widget(question, chunks[0]);

    if let Some(desc) = &node.ui.description {
        let description = Paragraph::new(desc.as_str())
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true });
        frame.render_widget(description, chunks[1]);
    }

    let renderer = registry.for_node(node);
    renderer.render(frame, chunks[2], node, selection);

    let hint = advance_hint(busy, renderer.answer(node, selection).is_some());
    let advance = Paragraph::new(hint.0).style(hint.1);
    frame.render_widget(advance, chunks[3]);
}

/// Advance affordance: disabled until an answer exists, disabled while a
/// request is saving.
fn advance_hint(busy: bool, has_answer: bool) -> (&'static str, Style) {
    if busy {
        ("Saving...", Style::default().fg(Color::Yellow))
    } else if has_answer {
        ("[Enter] Next", Style::default().add_modifier(Modifier::BOLD))
    } else {
        (
            "Select an option to continue",
            Style::default().fg(Color::DarkGray),
        )
    }
}

fn render_result(frame: &mut Frame, area: Rect, result: &FlowResult) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Your Starter Plan");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = vec![
        Line::from(Span::styled(
            "Top traits",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        trait_line(&result.summary.top_traits),
        Line::from(""),
        Line::from(Span::styled(
            "Your answers (derived)",
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ];
    lines.extend(json_lines(&serde_json::Value::Object(
        result.summary.variables.clone(),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "All raw answers",
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.extend(json_lines(&serde_json::Value::Object(
        result.summary.answers.clone(),
    )));

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Press r to restart",
        Style::default().fg(Color::DarkGray),
    )));

    let card = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(card, inner);
}

/// Trait chips, or an explicit affordance when there are none, never a
/// blank region.
fn trait_line(traits: &[String]) -> Line<'static> {
    if traits.is_empty() {
        return Line::from(Span::styled(
            "No traits detected yet.",
            Style::default().fg(Color::DarkGray),
        ));
    }

    let mut spans = Vec::new();
    for (i, t) in traits.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled(
            format!("[{t}]"),
            Style::default()
                .fg(Color::Black)
                .bg(Color::White)
                .add_modifier(Modifier::BOLD),
        ));
    }
    Line::from(spans)
}

fn json_lines(value: &serde_json::Value) -> Vec<Line<'static>> {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    pretty
        .lines()
        .map(|l| Line::from(l.to_string()))
        .collect()
}

fn render_waiting(frame: &mut Frame, area: Rect, view: &ViewState) {
    let text = if view.busy() {
        "Contacting the flow service..."
    } else if view.last_error().is_some() {
        "Press r to restart."
    } else {
        "Waiting to start."
    };
    let paragraph = Paragraph::new(text)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn render_hints(frame: &mut Frame, area: Rect, view: &ViewState) {
    let hints = if view.done() {
        "r restart · q quit"
    } else {
        "↑/↓ select · Enter next · r restart · q quit"
    };
    let paragraph = Paragraph::new(hints).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}
