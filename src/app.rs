use anyhow::Result;
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState,
    },
    Frame,
};

use crate::actions::Action;
use crate::domain::{AgentStatus, Liveness, PaneType};
use crate::snapshot::{DashboardSnapshot, PaneView, SessionView};

/// Theme colors inspired by Claude Code
pub struct Theme {
    pub fg: Color,
    pub accent: Color,
    pub dim: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: Color::Rgb(220, 220, 220),
            accent: Color::Rgb(217, 119, 87), // Claude orange
            dim: Color::Rgb(100, 100, 100),
            success: Color::Rgb(80, 200, 120),
            warning: Color::Rgb(255, 193, 7),
            error: Color::Rgb(220, 53, 69),
        }
    }
}

/// Input mode for the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Renaming,
    AddingPane,
    ConfirmKillSession,
    ConfirmClosePane,
}

/// Main application state
pub struct App {
    /// Latest refresh result
    pub snapshot: DashboardSnapshot,
    /// Currently selected session
    pub session_state: ListState,
    /// Currently selected pane within the session
    pub pane_state: TableState,
    /// Current message to display (info or error)
    pub message: Option<String>,
    /// Theme
    pub theme: Theme,
    /// Current input mode
    pub input_mode: InputMode,
    /// Text input buffer
    pub input_buffer: String,
    /// Pending action queue
    pub pending_actions: Vec<Action>,
}

impl App {
    pub fn new() -> Self {
        let mut session_state = ListState::default();
        session_state.select(Some(0));
        let mut pane_state = TableState::default();
        pane_state.select(Some(0));

        Self {
            snapshot: DashboardSnapshot::default(),
            session_state,
            pane_state,
            message: None,
            theme: Theme::default(),
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            pending_actions: Vec::new(),
        }
    }

    /// Get the currently selected session
    pub fn selected_session(&self) -> Option<&SessionView> {
        self.session_state
            .selected()
            .and_then(|i| self.snapshot.sessions.get(i))
    }

    /// Get the currently selected pane
    pub fn selected_pane(&self) -> Option<&PaneView> {
        let session = self.selected_session()?;
        self.pane_state.selected().and_then(|i| session.panes.get(i))
    }

    /// Take pending actions (drains the queue)
    pub fn take_pending_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.pending_actions)
    }

    /// Handle an action and return whether to quit
    pub fn handle_action(&mut self, action: Action) -> Result<bool> {
        match action {
            Action::KeyPress(key) => self.handle_key(key),
            Action::SnapshotUpdated(snapshot) => {
                self.snapshot = snapshot;
                self.clamp_selection();
                Ok(false)
            }
            Action::Error(msg) => {
                self.message = Some(msg);
                Ok(false)
            }
            Action::Quit => Ok(true),
            _ => Ok(false),
        }
    }

    fn clamp_selection(&mut self) {
        let sessions = self.snapshot.sessions.len();
        if let Some(selected) = self.session_state.selected() {
            if selected >= sessions && sessions > 0 {
                self.session_state.select(Some(sessions - 1));
            }
        }
        let panes = self.selected_session().map(|s| s.panes.len()).unwrap_or(0);
        match self.pane_state.selected() {
            Some(selected) if selected >= panes && panes > 0 => {
                self.pane_state.select(Some(panes - 1))
            }
            None => self.pane_state.select(Some(0)),
            _ => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        // Clear message on any key press
        if self.message.is_some() && self.input_mode == InputMode::Normal {
            self.message = None;
        }

        match self.input_mode {
            InputMode::Normal => self.handle_normal_key(key),
            InputMode::Renaming => self.handle_renaming_key(key),
            InputMode::AddingPane => self.handle_adding_key(key),
            InputMode::ConfirmKillSession | InputMode::ConfirmClosePane => {
                self.handle_confirming_key(key)
            }
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(true);
            }
            KeyCode::Char('j') | KeyCode::Down => self.next_session(),
            KeyCode::Char('k') | KeyCode::Up => self.previous_session(),
            KeyCode::Char('J') => self.next_pane(),
            KeyCode::Char('K') => self.previous_pane(),
            KeyCode::Char('R') => self.pending_actions.push(Action::Refresh),
            KeyCode::Enter => {
                if let Some(session) = self.selected_session() {
                    self.pending_actions
                        .push(Action::AttachSession(session.name.clone()));
                }
            }
            KeyCode::Char('r') => {
                if let Some(pane) = self.selected_pane() {
                    self.input_buffer = pane.title.clone();
                    self.input_mode = InputMode::Renaming;
                }
            }
            KeyCode::Char('t') => {
                if let (Some(session), Some(pane)) =
                    (self.selected_session(), self.selected_pane())
                {
                    let action = Action::RetypePane {
                        session: session.name.clone(),
                        pane_id: pane.id.clone(),
                        pane_type: pane.pane_type.next(),
                    };
                    self.pending_actions.push(action);
                }
            }
            KeyCode::Char('a') => {
                if self.selected_session().is_some() {
                    self.input_mode = InputMode::AddingPane;
                }
            }
            KeyCode::Char('c') => self.add_pane(PaneType::Claude),
            KeyCode::Char('x') => self.add_pane(PaneType::Codex),
            KeyCode::Char('s') => self.add_pane(PaneType::Shell),
            KeyCode::Char('d') => {
                if self.selected_pane().is_some() {
                    self.input_mode = InputMode::ConfirmClosePane;
                }
            }
            KeyCode::Char('D') => {
                if self.selected_session().is_some() {
                    self.input_mode = InputMode::ConfirmKillSession;
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_renaming_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Enter => {
                let title = self.input_buffer.trim().to_string();
                if !title.is_empty() {
                    if let (Some(session), Some(pane)) =
                        (self.selected_session(), self.selected_pane())
                    {
                        let action = Action::RenamePane {
                            session: session.name.clone(),
                            session_path: session.path.clone(),
                            pane_id: pane.id.clone(),
                            title,
                        };
                        self.pending_actions.push(action);
                    }
                }
                self.input_buffer.clear();
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Esc => {
                self.input_buffer.clear();
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Char(c) => {
                if !c.is_control() {
                    self.input_buffer.push(c);
                }
            }
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }
            _ => {}
        }
        Ok(false)
    }

    fn add_pane(&mut self, pane_type: PaneType) {
        if let Some(session) = self.selected_session() {
            let action = Action::AddPane {
                session: session.name.clone(),
                pane_type,
            };
            self.pending_actions.push(action);
        }
    }

    fn handle_adding_key(&mut self, key: KeyEvent) -> Result<bool> {
        let pane_type = match key.code {
            KeyCode::Char('c') => Some(PaneType::Claude),
            KeyCode::Char('x') => Some(PaneType::Codex),
            KeyCode::Char('s') => Some(PaneType::Shell),
            KeyCode::Esc => None,
            _ => return Ok(false),
        };
        self.input_mode = InputMode::Normal;
        if let Some(pane_type) = pane_type {
            self.add_pane(pane_type);
        }
        Ok(false)
    }

    fn handle_confirming_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                let action = match self.input_mode {
                    InputMode::ConfirmKillSession => self
                        .selected_session()
                        .map(|s| Action::KillSession(s.name.clone())),
                    InputMode::ConfirmClosePane => self
                        .selected_pane()
                        .map(|p| Action::ClosePane(p.id.clone())),
                    _ => None,
                };
                self.pending_actions.extend(action);
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
            }
            _ => {}
        }
        Ok(false)
    }

    fn next_session(&mut self) {
        let len = self.snapshot.sessions.len();
        if len == 0 {
            return;
        }
        let i = match self.session_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.session_state.select(Some(i));
        self.pane_state.select(Some(0));
    }

    fn previous_session(&mut self) {
        let len = self.snapshot.sessions.len();
        if len == 0 {
            return;
        }
        let i = match self.session_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.session_state.select(Some(i));
        self.pane_state.select(Some(0));
    }

    fn next_pane(&mut self) {
        let len = self.selected_session().map(|s| s.panes.len()).unwrap_or(0);
        if len == 0 {
            return;
        }
        let i = match self.pane_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.pane_state.select(Some(i));
    }

    fn previous_pane(&mut self) {
        let len = self.selected_session().map(|s| s.panes.len()).unwrap_or(0);
        if len == 0 {
            return;
        }
        let i = match self.pane_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.pane_state.select(Some(i));
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Main content
                Constraint::Length(3), // Footer/status
            ])
            .split(frame.area());

        self.render_header(frame, chunks[0]);
        self.render_main(frame, chunks[1]);
        self.render_footer(frame, chunks[2]);

        // Render modal dialogs on top
        match self.input_mode {
            InputMode::Renaming => self.render_rename_dialog(frame),
            InputMode::AddingPane => self.render_add_dialog(frame),
            InputMode::ConfirmKillSession | InputMode::ConfirmClosePane => {
                self.render_confirm_dialog(frame)
            }
            InputMode::Normal => {}
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let running = self
            .snapshot
            .sessions
            .iter()
            .flat_map(|s| &s.panes)
            .filter(|p| p.agent_status == AgentStatus::Running)
            .count();

        let title = Paragraph::new(Line::from(vec![
            Span::styled(
                " AgentDeck ",
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("│ {} agent(s) working", running),
                Style::default().fg(self.theme.dim),
            ),
        ]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.dim)),
        );
        frame.render_widget(title, area);
    }

    fn render_main(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(30), // Session list
                Constraint::Percentage(70), // Pane table
            ])
            .split(area);

        self.render_session_list(frame, chunks[0]);
        self.render_pane_table(frame, chunks[1]);
    }

    fn status_span(&self, status: AgentStatus) -> Span<'static> {
        match status {
            AgentStatus::Running => Span::styled("● ", Style::default().fg(self.theme.warning)),
            AgentStatus::Idle => Span::styled("● ", Style::default().fg(self.theme.success)),
        }
    }

    fn render_session_list(&mut self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = if self.snapshot.sessions.is_empty() {
            vec![ListItem::new(Line::from(Span::styled(
                "  No tmux sessions found.",
                Style::default().fg(self.theme.dim),
            )))]
        } else {
            self.snapshot
                .sessions
                .iter()
                .map(|session| {
                    let busy = session
                        .panes
                        .iter()
                        .any(|p| p.agent_status == AgentStatus::Running);
                    let icon = if busy {
                        self.status_span(AgentStatus::Running)
                    } else {
                        self.status_span(AgentStatus::Idle)
                    };
                    let name =
                        Span::styled(session.name.clone(), Style::default().fg(self.theme.fg));
                    let attached = if session.attached {
                        Span::styled(" (attached)", Style::default().fg(self.theme.dim))
                    } else {
                        Span::raw("")
                    };
                    ListItem::new(Line::from(vec![icon, name, attached]))
                })
                .collect()
        };

        let list = List::new(items)
            .block(
                Block::default()
                    .title(" Sessions ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(self.theme.dim)),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::Rgb(50, 50, 50))
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");

        frame.render_stateful_widget(list, area, &mut self.session_state);
    }

    fn render_pane_table(&mut self, frame: &mut Frame, area: Rect) {
        let now = Utc::now();
        let rows: Vec<Row> = self
            .selected_session()
            .map(|session| {
                session
                    .panes
                    .iter()
                    .map(|pane| {
                        let (liveness, liveness_color) = match pane.liveness {
                            Liveness::Active => ("active", self.theme.success),
                            Liveness::Exited => ("exited", self.theme.error),
                            Liveness::Unknown => ("?", self.theme.dim),
                        };
                        let (status, status_color) = match pane.agent_status {
                            AgentStatus::Running => ("running", self.theme.warning),
                            AgentStatus::Idle => ("idle", self.theme.success),
                        };
                        let quiet = pane
                            .last_active
                            .map(|t| format!("{}s", (now - t).num_seconds().max(0)))
                            .unwrap_or_else(|| "-".to_string());

                        Row::new(vec![
                            Cell::from(pane.index.to_string()),
                            Cell::from(pane.title.clone()),
                            Cell::from(pane.pane_type.to_string()),
                            Cell::from(pane.current_command.clone()),
                            Cell::from(liveness).style(Style::default().fg(liveness_color)),
                            Cell::from(status).style(Style::default().fg(status_color)),
                            Cell::from(quiet),
                        ])
                        .style(Style::default().fg(self.theme.fg))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let title = self
            .selected_session()
            .map(|s| format!(" {} │ {} ", s.name, s.path))
            .unwrap_or_else(|| " Panes ".to_string());

        let table = Table::new(
            rows,
            [
                Constraint::Length(3),
                Constraint::Min(12),
                Constraint::Length(8),
                Constraint::Length(10),
                Constraint::Length(8),
                Constraint::Length(9),
                Constraint::Length(6),
            ],
        )
        .header(
            Row::new(vec!["#", "Title", "Type", "Command", "Process", "Status", "Quiet"])
                .style(Style::default().fg(self.theme.dim)),
        )
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.dim)),
        )
        .row_highlight_style(
            Style::default()
                .bg(Color::Rgb(50, 50, 50))
                .add_modifier(Modifier::BOLD),
        );

        frame.render_stateful_widget(table, area, &mut self.pane_state);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let help_text = " q: Quit │ j/k/J/K: Move │ Enter: Attach │ a/c/x/s: Add pane │ r: Rename │ t: Type │ d: Close pane │ D: Kill session │ R: Refresh ";

        let content = if let Some(ref msg) = self.message {
            let style = if msg.starts_with("Failed") || msg.contains("error") {
                Style::default().fg(self.theme.error)
            } else {
                Style::default().fg(self.theme.success)
            };
            Line::from(Span::styled(format!(" {} ", msg), style))
        } else {
            Line::from(Span::styled(help_text, Style::default().fg(self.theme.dim)))
        };

        let footer = Paragraph::new(content).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.dim)),
        );
        frame.render_widget(footer, area);
    }

    fn render_rename_dialog(&self, frame: &mut Frame) {
        let area = centered_rect(50, 20, frame.area());

        frame.render_widget(Clear, area);

        let block = Block::default()
            .title(" Rename Pane ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.accent));

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let text = vec![
            Line::from(""),
            Line::from(Span::styled("New title:", Style::default().fg(self.theme.fg))),
            Line::from(""),
            Line::from(Span::styled(
                format!("▶ {}_", self.input_buffer),
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Press Enter to save, Esc to cancel",
                Style::default().fg(self.theme.dim),
            )),
        ];

        frame.render_widget(Paragraph::new(text), inner);
    }

    fn render_add_dialog(&self, frame: &mut Frame) {
        let area = centered_rect(50, 20, frame.area());

        frame.render_widget(Clear, area);

        let block = Block::default()
            .title(" Add Pane ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.accent));

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let key = |k: &'static str| {
            Span::styled(
                k,
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            )
        };
        let label = |l: &'static str| Span::styled(l, Style::default().fg(self.theme.fg));

        let text = vec![
            Line::from(""),
            Line::from(vec![key("  c "), label("Claude")]),
            Line::from(vec![key("  x "), label("Codex")]),
            Line::from(vec![key("  s "), label("Shell")]),
            Line::from(""),
            Line::from(Span::styled(
                "Missing agents open a shell instead. Esc to cancel",
                Style::default().fg(self.theme.dim),
            )),
        ];

        frame.render_widget(Paragraph::new(text), inner);
    }

    fn render_confirm_dialog(&self, frame: &mut Frame) {
        let area = centered_rect(50, 20, frame.area());

        frame.render_widget(Clear, area);

        let (title, question) = match self.input_mode {
            InputMode::ConfirmClosePane => (
                " Confirm Close ",
                format!(
                    "Close pane '{}'?",
                    self.selected_pane().map(|p| p.title.as_str()).unwrap_or("unknown")
                ),
            ),
            _ => (
                " Confirm Kill ",
                format!(
                    "Kill session '{}'?",
                    self.selected_session()
                        .map(|s| s.name.as_str())
                        .unwrap_or("unknown")
                ),
            ),
        };

        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.error));

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let text = vec![
            Line::from(""),
            Line::from(Span::styled(question, Style::default().fg(self.theme.fg))),
            Line::from(""),
            Line::from(Span::styled(
                "Running agents in it will be terminated.",
                Style::default().fg(self.theme.warning),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Press 'y' to confirm, 'n' or Esc to cancel",
                Style::default().fg(self.theme.dim),
            )),
        ];

        frame.render_widget(Paragraph::new(text), inner);
    }
}

/// Helper function to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PaneType;

    fn key(code: KeyCode) -> Action {
        Action::KeyPress(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn pane(id: &str, title: &str) -> PaneView {
        PaneView {
            id: id.to_string(),
            index: 0,
            title: title.to_string(),
            pane_type: PaneType::Codex,
            current_command: "node".to_string(),
            liveness: Liveness::Active,
            agent_status: AgentStatus::Idle,
            last_active: None,
        }
    }

    fn app() -> App {
        let mut app = App::new();
        let snapshot = DashboardSnapshot {
            sessions: vec![
                SessionView {
                    name: "api".to_string(),
                    path: "/src/api".to_string(),
                    attached: false,
                    panes: vec![pane("%0", "codex-1"), pane("%1", "claude-1")],
                },
                SessionView {
                    name: "web".to_string(),
                    path: "/src/web".to_string(),
                    attached: true,
                    panes: vec![pane("%2", "shell-1")],
                },
            ],
        };
        app.handle_action(Action::SnapshotUpdated(snapshot)).unwrap();
        app
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = app();
        app.handle_action(key(KeyCode::Char('J'))).unwrap();
        assert_eq!(app.selected_pane().unwrap().id, "%1");
        app.handle_action(key(KeyCode::Char('J'))).unwrap();
        assert_eq!(app.selected_pane().unwrap().id, "%0");

        app.handle_action(key(KeyCode::Char('k'))).unwrap();
        assert_eq!(app.selected_session().unwrap().name, "web");
        assert_eq!(app.selected_pane().unwrap().id, "%2");
    }

    #[test]
    fn test_rename_flow() {
        let mut app = app();
        app.handle_action(key(KeyCode::Char('r'))).unwrap();
        assert_eq!(app.input_mode, InputMode::Renaming);
        assert_eq!(app.input_buffer, "codex-1");

        for _ in 0..7 {
            app.handle_action(key(KeyCode::Backspace)).unwrap();
        }
        for c in "planner".chars() {
            app.handle_action(key(KeyCode::Char(c))).unwrap();
        }
        app.handle_action(key(KeyCode::Enter)).unwrap();

        let actions = app.take_pending_actions();
        assert!(matches!(
            actions.as_slice(),
            [Action::RenamePane { pane_id, title, .. }] if pane_id == "%0" && title == "planner"
        ));
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn test_close_pane_requires_confirmation() {
        let mut app = app();
        app.handle_action(key(KeyCode::Char('d'))).unwrap();
        app.handle_action(key(KeyCode::Char('n'))).unwrap();
        assert!(app.take_pending_actions().is_empty());

        app.handle_action(key(KeyCode::Char('d'))).unwrap();
        app.handle_action(key(KeyCode::Char('y'))).unwrap();
        let actions = app.take_pending_actions();
        assert!(matches!(actions.as_slice(), [Action::ClosePane(id)] if id == "%0"));
    }

    #[test]
    fn test_add_pane_keys() {
        let mut app = app();
        app.handle_action(key(KeyCode::Char('x'))).unwrap();
        app.handle_action(key(KeyCode::Char('a'))).unwrap();
        assert_eq!(app.input_mode, InputMode::AddingPane);
        app.handle_action(key(KeyCode::Char('q'))).unwrap();
        assert_eq!(app.input_mode, InputMode::AddingPane);
        app.handle_action(key(KeyCode::Char('c'))).unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);

        let actions = app.take_pending_actions();
        assert!(matches!(
            actions.as_slice(),
            [
                Action::AddPane { session: a, pane_type: PaneType::Codex },
                Action::AddPane { session: b, pane_type: PaneType::Claude },
            ] if a == "api" && b == "api"
        ));
    }

    #[test]
    fn test_kill_session_requires_confirmation() {
        let mut app = app();
        app.handle_action(key(KeyCode::Char('D'))).unwrap();
        assert_eq!(app.input_mode, InputMode::ConfirmKillSession);
        app.handle_action(key(KeyCode::Char('y'))).unwrap();
        let actions = app.take_pending_actions();
        assert!(matches!(actions.as_slice(), [Action::KillSession(name)] if name == "api"));
    }

    #[test]
    fn test_retype_cycles_type() {
        let mut app = app();
        app.handle_action(key(KeyCode::Char('t'))).unwrap();
        let actions = app.take_pending_actions();
        assert!(matches!(
            actions.as_slice(),
            [Action::RetypePane { pane_type: PaneType::Claude, .. }]
        ));
    }

    #[test]
    fn test_selection_clamped_when_sessions_shrink() {
        let mut app = app();
        app.handle_action(key(KeyCode::Char('j'))).unwrap();
        app.handle_action(Action::SnapshotUpdated(DashboardSnapshot {
            sessions: vec![SessionView {
                name: "api".to_string(),
                path: "/src/api".to_string(),
                attached: false,
                panes: vec![pane("%0", "codex-1")],
            }],
        }))
        .unwrap();
        assert_eq!(app.selected_session().unwrap().name, "api");
    }

    #[test]
    fn test_quit_keys() {
        let mut app = app();
        assert!(app.handle_action(key(KeyCode::Char('q'))).unwrap());
        let ctrl_c = Action::KeyPress(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.handle_action(ctrl_c).unwrap());
    }
}
