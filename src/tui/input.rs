//! Input-type renderer strategies
//!
//! The backend declares how a node wants to be answered via an open-ended
//! `input_type` tag. Rendering is a capability lookup: tag → strategy,
//! with an explicit fallback for unrecognized tags that draws no options
//! and produces no answer, so the advance action simply stays disabled
//! instead of the whole view failing.

use crate::flow::Node;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use serde_json::Value;
use std::collections::HashMap;

/// Strategy for one input type.
pub trait InputRenderer: Send + Sync {
    /// Number of selectable entries this node offers.
    fn option_count(&self, node: &Node) -> usize;

    /// The answer the current selection produces, if the selection is
    /// complete. `None` keeps the advance action disabled.
    fn answer(&self, node: &Node, selected: Option<usize>) -> Option<Value>;

    /// Draw the interactive input area.
    fn render(&self, frame: &mut Frame, area: Rect, node: &Node, selected: Option<usize>);
}

/// `single_choice`: one option selectable at a time; selecting a new
/// option replaces the prior selection.
pub struct SingleChoice;

impl InputRenderer for SingleChoice {
    fn option_count(&self, node: &Node) -> usize {
        node.ui.options.len()
    }

    fn answer(&self, node: &Node, selected: Option<usize>) -> Option<Value> {
        selected
            .and_then(|i| node.ui.options.get(i))
            .map(|opt| Value::String(opt.id.clone()))
    }

    fn render(&self, frame: &mut Frame, area: Rect, node: &Node, selected: Option<usize>) {
        let items: Vec<ListItem> = node
            .ui
            .options
            .iter()
            .enumerate()
            .map(|(i, opt)| {
                let marker = if selected == Some(i) { "(x)" } else { "( )" };
                let mut line = vec![Span::raw(format!("{marker} {}", opt.label))];
                if let Some(desc) = &opt.description {
                    line.push(Span::styled(
                        format!("  {desc}"),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                ListItem::new(Line::from(line))
            })
            .collect();

        let mut state = ListState::default();
        state.select(selected);

        let list = List::new(items).highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::White)
                .add_modifier(Modifier::BOLD),
        );

        frame.render_stateful_widget(list, area, &mut state);
    }
}

/// Fallback for input types this client does not know how to render.
pub struct Unsupported;

impl InputRenderer for Unsupported {
    fn option_count(&self, _node: &Node) -> usize {
        0
    }

    fn answer(&self, _node: &Node, _selected: Option<usize>) -> Option<Value> {
        None
    }

    fn render(&self, frame: &mut Frame, area: Rect, node: &Node, _selected: Option<usize>) {
        let text = format!(
            "This question type ({}) isn't supported by this client yet.",
            node.ui.input_type
        );
        let paragraph = Paragraph::new(text)
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }
}

/// Capability lookup from input-type tag to renderer strategy.
pub struct RendererRegistry {
    renderers: HashMap<&'static str, Box<dyn InputRenderer>>,
    fallback: Box<dyn InputRenderer>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        let mut renderers: HashMap<&'static str, Box<dyn InputRenderer>> = HashMap::new();
        renderers.insert("single_choice", Box::new(SingleChoice));

        Self {
            renderers,
            fallback: Box::new(Unsupported),
        }
    }

    pub fn for_node(&self, node: &Node) -> &dyn InputRenderer {
        self.renderers
            .get(node.ui.input_type.as_str())
            .map_or(self.fallback.as_ref(), |r| r.as_ref())
    }
}

impl Default for RendererRegistry {
    fn default() -> Self {
        Self::new()
    }
}
