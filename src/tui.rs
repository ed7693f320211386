//! Terminal renderer and input loop
//!
//! The renderer only reads `ViewState` snapshots and emits user intents;
//! it never mutates flow state directly. Answer selection lives here, not
//! in the state machine: a selection is transient UI state that only
//! becomes an answer at submission time.

mod input;
mod render;

pub use input::{InputRenderer, RendererRegistry, SingleChoice, Unsupported};

use crate::runtime::FlowHandle;
use crate::state_machine::ViewState;
use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::Terminal;
use std::io;
use std::time::Duration;
use tokio::sync::watch;

/// Transient option selection for the node on screen. Resets whenever the
/// node changes so a stale index can never be submitted against a new
/// question.
#[derive(Debug, Default)]
struct Selection {
    index: Option<usize>,
    node_id: Option<String>,
}

impl Selection {
    fn sync(&mut self, node_id: Option<&str>) {
        if self.node_id.as_deref() != node_id {
            self.index = None;
            self.node_id = node_id.map(String::from);
        }
    }

    /// Move the selection, wrapping. Selecting replaces the prior
    /// selection; there is never more than one.
    fn move_by(&mut self, delta: isize, count: usize) {
        if count == 0 {
            return;
        }
        self.index = Some(match self.index {
            None => {
                if delta >= 0 {
                    0
                } else {
                    count - 1
                }
            }
            #[allow(clippy::cast_possible_wrap)]
            Some(i) => (i as isize + delta).rem_euclid(count as isize) as usize,
        });
    }

    fn clear(&mut self) {
        self.index = None;
        self.node_id = None;
    }
}

pub struct App {
    handle: FlowHandle,
    view_rx: watch::Receiver<ViewState>,
    registry: RendererRegistry,
    selection: Selection,
}

impl App {
    pub fn new(handle: FlowHandle) -> Self {
        let view_rx = handle.subscribe();
        Self {
            handle,
            view_rx,
            registry: RendererRegistry::new(),
            selection: Selection::default(),
        }
    }

    pub async fn run<B: Backend>(mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            let view = self.view_rx.borrow().clone();
            self.selection
                .sync(view.current_node().map(|n| n.id.as_str()));

            terminal.draw(|frame| {
                render::draw(frame, &view, self.selection.index, &self.registry);
            })?;

            if !event::poll(Duration::from_millis(100))? {
                continue;
            }
            let CtEvent::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('r') => {
                    self.selection.clear();
                    self.handle.restart().await;
                }
                KeyCode::Up | KeyCode::Char('k') => self.move_selection(&view, -1),
                KeyCode::Down | KeyCode::Char('j') => self.move_selection(&view, 1),
                KeyCode::Enter => self.submit(&view).await,
                _ => {}
            }
        }
    }

    fn move_selection(&mut self, view: &ViewState, delta: isize) {
        let Some(node) = view.current_node() else {
            return;
        };
        let count = self.registry.for_node(node).option_count(node);
        self.selection.move_by(delta, count);
    }

    /// Advance is a no-op while busy or until the renderer can produce an
    /// answer from the current selection.
    async fn submit(&mut self, view: &ViewState) {
        if view.busy() {
            return;
        }
        let Some(node) = view.current_node() else {
            return;
        };
        let Some(answer) = self.registry.for_node(node).answer(node, self.selection.index) else {
            return;
        };
        self.handle.submit_answer(answer).await;
    }
}

pub fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

pub fn restore_terminal(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()
}
