use crate::input::{Edit, TextInput};
use crate::source::{DocumentSource, SourceEvent};
use crate::ui::TuiRenderer;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use highlight_filters::controller::{Controller, Host, Notice};
use highlight_filters::core::model::{FilterGroup, Range, DEFAULT_RANGE_ID};
use highlight_filters::core::projection::split_prefix;
use highlight_filters::highlight::MatchCounts;
use highlight_filters::message::{InboundMessage, OutboundMessage};
use highlight_filters::state::JsonFileStore;
use serde_json::json;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

pub type TuiController = Controller<TuiRenderer, JsonFileStore>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptAction {
    AddRange { start: i64 },
    EditPattern { filter_id: String },
    Import,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    DeleteGroup(String),
    DeleteRange(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Prompt(PromptAction),
    Confirm(ConfirmAction),
}

/// What the settings panel last received: the batched `update` message.
#[derive(Debug, Clone, Default)]
pub struct PanelState {
    pub groups: Vec<FilterGroup>,
    pub ranges: Vec<Range>,
    pub active_range_id: String,
    pub match_counts: MatchCounts,
}

/// Answers gathered by the terminal before a message is handed to the
/// controller, which asks for them synchronously.
#[derive(Default)]
struct TuiHost {
    confirmed: bool,
    answer: Option<String>,
    export_path: Option<PathBuf>,
    import_path: Option<PathBuf>,
    notices: Vec<Notice>,
}

impl Host for TuiHost {
    fn confirm(&mut self, _message: &str) -> bool {
        self.confirmed
    }

    fn prompt(&mut self, _message: &str) -> Option<String> {
        self.answer.take()
    }

    fn pick_export_path(&mut self) -> Option<PathBuf> {
        self.export_path.take()
    }

    fn pick_import_path(&mut self) -> Option<PathBuf> {
        self.import_path.take()
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}

pub struct App {
    pub controller: TuiController,
    pub source: DocumentSource,
    pub input_mode: InputMode,
    pub prompt: TextInput,
    pub confirm_message: String,
    pub selected_group: usize,
    pub scroll: usize,
    pub panel: PanelState,
    pub status_message: Option<String>,
    export_path: PathBuf,
}

impl App {
    pub fn new(controller: TuiController, source: DocumentSource, export_path: PathBuf) -> Self {
        let mut app = Self {
            controller,
            source,
            input_mode: InputMode::Normal,
            prompt: TextInput::default(),
            confirm_message: String::new(),
            selected_group: 0,
            scroll: 0,
            panel: PanelState::default(),
            status_message: None,
            export_path,
        };
        app.send(InboundMessage::WebviewReady, TuiHost::default(), Instant::now());
        app
    }

    pub fn poll_source(&mut self, now: Instant) {
        while let Some(event) = self.source.try_recv() {
            match event {
                SourceEvent::Text(text) => {
                    if self.controller.is_projected() {
                        // The projection replaced the buffer; reload over the restored text.
                        if let Err(e) = self.controller.exit_matched_view(now) {
                            debug!(target: "app", error = %e, "matched view already closed");
                        }
                        self.status_message = Some("File changed; matched view closed".to_string());
                    }
                    self.controller.edit_document(text, now);
                }
                SourceEvent::Error(e) => {
                    self.status_message = Some(format!("Source error: {}", e));
                }
            }
        }
    }

    pub fn tick(&mut self, now: Instant) {
        let source = &self.source;
        self.controller.tick_with(now, &mut || source.has_pending());
        self.drain_outbound();
    }

    fn drain_outbound(&mut self) {
        for message in self.controller.take_outbound() {
            if let Ok(json) = message.to_json() {
                debug!(target: "app", bytes = json.len(), "panel update");
            }
            let OutboundMessage::Update {
                groups,
                ranges,
                active_range_id,
                match_counts,
            } = message;
            self.panel = PanelState {
                groups,
                ranges,
                active_range_id,
                match_counts,
            };
        }
        let last = self.controller.config().groups.len().saturating_sub(1);
        self.selected_group = self.selected_group.min(last);
    }

    fn send(&mut self, message: InboundMessage, mut host: TuiHost, now: Instant) {
        self.controller.handle_message(message, &mut host, now);
        self.show_notices(host.notices);
        self.drain_outbound();
    }

    fn show_notices(&mut self, notices: Vec<Notice>) {
        if let Some(notice) = notices.into_iter().last() {
            self.status_message = Some(match notice {
                Notice::Info(msg) => msg,
                Notice::Error(msg) => format!("Error: {}", msg),
            });
        }
    }

    pub fn selected_group(&self) -> Option<&FilterGroup> {
        self.controller.config().groups.get(self.selected_group)
    }

    pub fn active_range_name(&self) -> String {
        let config = self.controller.config();
        config
            .find_range(&config.active_range_id)
            .map_or_else(|| "Whole document".to_string(), |r| r.name.clone())
    }

    /// Original line number under the cursor, reading the prefix in the
    /// matched-lines view.
    fn original_cursor_line(&self) -> usize {
        let cursor = self.controller.cursor_line();
        if !self.controller.is_projected() {
            return cursor;
        }
        self.controller
            .document()
            .and_then(|doc| doc.line(cursor))
            .and_then(split_prefix)
            .map_or(0, |(original, _)| original)
    }

    fn line_count(&self) -> usize {
        self.controller.document().map_or(1, |d| d.line_count())
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let cursor = self.controller.cursor_line().saturating_add_signed(delta);
        self.controller.set_cursor_line(cursor);
    }

    /// Keep the cursor inside a viewport of `height` lines.
    pub fn scroll_into_view(&mut self, height: usize) {
        let cursor = self.controller.cursor_line();
        if cursor < self.scroll {
            self.scroll = cursor;
        } else if height > 0 && cursor >= self.scroll + height {
            self.scroll = cursor + 1 - height;
        }
    }

    fn open_prompt(&mut self, title: &str, text: &str, action: PromptAction) {
        self.prompt = TextInput::new(title, text);
        self.input_mode = InputMode::Prompt(action);
    }

    fn open_confirm(&mut self, message: String, action: ConfirmAction) {
        self.confirm_message = message;
        self.input_mode = InputMode::Confirm(action);
    }

    /// Returns true when the app should quit.
    pub fn handle_key(&mut self, key: KeyEvent, visible_height: usize, now: Instant) -> bool {
        match self.input_mode.clone() {
            InputMode::Normal => return self.handle_normal_key(key, visible_height, now),
            InputMode::Prompt(action) => match self.prompt.handle_key(key.code) {
                Edit::Submit(text) => {
                    self.input_mode = InputMode::Normal;
                    self.submit_prompt(action, text, now);
                }
                Edit::Cancel => self.input_mode = InputMode::Normal,
                Edit::Editing => {}
            },
            InputMode::Confirm(action) => {
                self.input_mode = InputMode::Normal;
                let host = TuiHost {
                    confirmed: key.code == KeyCode::Char('y'),
                    ..Default::default()
                };
                let message = match action {
                    ConfirmAction::DeleteGroup(group_name) => {
                        InboundMessage::DeleteGroup { group_name }
                    }
                    ConfirmAction::DeleteRange(range_id) => InboundMessage::DeleteRange { range_id },
                };
                self.send(message, host, now);
            }
        }
        false
    }

    fn submit_prompt(&mut self, action: PromptAction, text: String, now: Instant) {
        match action {
            PromptAction::AddRange { start } => {
                let host = TuiHost {
                    answer: Some(text),
                    ..Default::default()
                };
                self.send(InboundMessage::AddRange { start, end: -1 }, host, now);
            }
            PromptAction::EditPattern { filter_id } => {
                let message = InboundMessage::UpdateFilter {
                    id: filter_id,
                    field: "pattern".to_string(),
                    value: json!(text),
                };
                self.send(message, TuiHost::default(), now);
            }
            PromptAction::Import => {
                let host = TuiHost {
                    import_path: Some(PathBuf::from(text.trim())),
                    ..Default::default()
                };
                self.send(InboundMessage::ImportConfig, host, now);
            }
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent, visible_height: usize, now: Instant) -> bool {
        self.status_message = None;
        let page = visible_height.max(1) as isize;
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::PageUp => self.move_cursor(-page),
            KeyCode::PageDown => self.move_cursor(page),
            KeyCode::Home | KeyCode::Char('g') => self.controller.set_cursor_line(0),
            KeyCode::End | KeyCode::Char('G') => {
                let last = self.line_count() - 1;
                self.controller.set_cursor_line(last);
            }
            KeyCode::Char('m') => {
                let mut host = TuiHost::default();
                self.controller.toggle_matched_view(&mut host, now);
                self.show_notices(host.notices);
            }
            KeyCode::Tab => {
                let count = self.controller.config().groups.len();
                if count > 0 {
                    self.selected_group = (self.selected_group + 1) % count;
                }
            }
            KeyCode::Char(' ') => {
                if let Some(group) = self.selected_group() {
                    let message = InboundMessage::UpdateGroup {
                        name: group.name.clone(),
                        enabled: !group.enabled,
                    };
                    self.send(message, TuiHost::default(), now);
                }
            }
            KeyCode::Char('r') => self.cycle_range(now),
            KeyCode::Char('a') => {
                self.send(InboundMessage::AddGroup, TuiHost::default(), now);
                self.selected_group = self.controller.config().groups.len().saturating_sub(1);
            }
            KeyCode::Char('n') => {
                if let Some(group) = self.selected_group() {
                    let message = InboundMessage::AddFilter {
                        group_name: group.name.clone(),
                    };
                    self.send(message, TuiHost::default(), now);
                }
            }
            KeyCode::Char('p') => {
                let target = self
                    .selected_group()
                    .and_then(|g| g.filters.last())
                    .map(|f| (f.id.clone(), f.pattern.clone()));
                match target {
                    Some((filter_id, pattern)) => {
                        self.open_prompt(" Pattern ", &pattern, PromptAction::EditPattern { filter_id })
                    }
                    None => self.status_message = Some("Group has no filters".to_string()),
                }
            }
            KeyCode::Char('D') => {
                if let Some(group) = self.selected_group() {
                    let name = group.name.clone();
                    let question = format!("Delete group \"{}\" and all its filters?", name);
                    self.open_confirm(question, ConfirmAction::DeleteGroup(name));
                }
            }
            KeyCode::Char('R') => {
                let start = i64::try_from(self.original_cursor_line()).unwrap_or(i64::MAX);
                self.open_prompt(" Range name ", "", PromptAction::AddRange { start });
            }
            KeyCode::Char('X') => {
                let id = self.controller.config().active_range_id.clone();
                if id == DEFAULT_RANGE_ID {
                    self.send(InboundMessage::DeleteRange { range_id: id }, TuiHost::default(), now);
                } else {
                    let question = format!("Delete the active range \"{}\"?", self.active_range_name());
                    self.open_confirm(question, ConfirmAction::DeleteRange(id));
                }
            }
            KeyCode::Char('e') => {
                let host = TuiHost {
                    export_path: Some(self.export_path.clone()),
                    ..Default::default()
                };
                self.send(InboundMessage::ExportConfig, host, now);
                info!(target: "app", path = %self.export_path.display(), "export requested");
            }
            KeyCode::Char('i') => {
                let path = self.export_path.display().to_string();
                self.open_prompt(" Import from ", &path, PromptAction::Import);
            }
            KeyCode::F(5) => self.controller.refresh_webview(now),
            _ => {}
        }
        false
    }

    fn cycle_range(&mut self, now: Instant) {
        let config = self.controller.config();
        let ids: Vec<String> = std::iter::once(DEFAULT_RANGE_ID.to_string())
            .chain(config.ranges.iter().map(|r| r.id.clone()))
            .collect();
        let current = ids
            .iter()
            .position(|id| *id == config.active_range_id)
            .unwrap_or(0);
        let active_range_id = ids[(current + 1) % ids.len()].clone();
        self.send(
            InboundMessage::UpdateActiveRange { active_range_id },
            TuiHost::default(),
            now,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::watch_document;
    use highlight_filters::controller::EngineSettings;
    use highlight_filters::core::model::Configuration;
    use highlight_filters::document::Document;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app(dir: &tempfile::TempDir, text: &str) -> App {
        let doc_path = dir.path().join("doc.log");
        std::fs::write(&doc_path, text).unwrap();
        let store = JsonFileStore::new(dir.path().join("settings.json"));
        let mut controller = Controller::new(
            Configuration::seeded(),
            TuiRenderer::default(),
            store,
            EngineSettings::default(),
        );
        let now = Instant::now();
        controller.open_document(Document::new("doc.log", text), now);
        controller.recompute_now(now);
        let source = watch_document(doc_path, text.to_string());
        App::new(controller, source, dir.path().join("export.json"))
    }

    #[test]
    fn test_panel_receives_initial_update() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir, "ERROR one\nok\nERROR two");
        assert_eq!(app.panel.groups[0].name, "Example Group");
        let id = &app.panel.groups[0].filters[0].id;
        assert_eq!(app.panel.match_counts[id], 2);
    }

    #[test]
    fn test_delete_group_waits_for_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir, "x");
        let now = Instant::now();
        app.handle_key(key(KeyCode::Char('D')), 10, now);
        assert!(matches!(app.input_mode, InputMode::Confirm(_)));
        app.handle_key(key(KeyCode::Char('n')), 10, now);
        assert_eq!(app.controller.config().groups.len(), 1);

        app.handle_key(key(KeyCode::Char('D')), 10, now);
        app.handle_key(key(KeyCode::Char('y')), 10, now);
        assert!(app.controller.config().groups.is_empty());
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn test_range_from_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir, "a\nb\nc\nd");
        let now = Instant::now();
        app.handle_key(key(KeyCode::Char('j')), 10, now);
        app.handle_key(key(KeyCode::Char('j')), 10, now);
        app.handle_key(key(KeyCode::Char('R')), 10, now);
        for c in "tail".chars() {
            app.handle_key(key(KeyCode::Char(c)), 10, now);
        }
        app.handle_key(key(KeyCode::Enter), 10, now);
        let range = &app.controller.config().ranges[0];
        assert_eq!((range.start, range.end), (2, -1));
        assert_eq!(app.active_range_name(), "tail");

        app.handle_key(key(KeyCode::Char('r')), 10, now);
        assert_eq!(app.controller.config().active_range_id, DEFAULT_RANGE_ID);
    }

    #[test]
    fn test_edit_pattern_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir, "x");
        let now = Instant::now();
        app.handle_key(key(KeyCode::Char('p')), 10, now);
        assert_eq!(app.prompt.text, "ERROR");
        app.handle_key(key(KeyCode::Backspace), 10, now);
        app.handle_key(key(KeyCode::Enter), 10, now);
        assert_eq!(app.controller.config().groups[0].filters[0].pattern, "ERRO");
    }

    #[test]
    fn test_matched_view_toggle_reports_no_matches() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir, "nothing here");
        app.handle_key(key(KeyCode::Char('m')), 10, Instant::now());
        assert!(app.controller.is_projected());
        assert_eq!(
            app.status_message.as_deref(),
            Some("No lines matched the active filters.")
        );
    }

    #[test]
    fn test_file_change_closes_matched_view() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir, "ERROR a\nok");
        app.handle_key(key(KeyCode::Char('m')), 10, Instant::now());
        assert!(app.controller.is_projected());

        std::fs::write(dir.path().join("doc.log"), "ERROR b\nok\nERROR c").unwrap();
        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        while app.controller.document().unwrap().text() != "ERROR b\nok\nERROR c" {
            assert!(Instant::now() < deadline, "no change event");
            std::thread::sleep(std::time::Duration::from_millis(20));
            app.poll_source(Instant::now());
        }
        assert!(!app.controller.is_projected());
        assert_eq!(
            app.status_message.as_deref(),
            Some("File changed; matched view closed")
        );
    }

    #[test]
    fn test_scroll_follows_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let text = (0..50).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let mut app = app(&dir, &text);
        app.handle_key(key(KeyCode::Char('G')), 10, Instant::now());
        app.scroll_into_view(10);
        assert_eq!(app.scroll, 40);
        app.handle_key(key(KeyCode::Char('g')), 10, Instant::now());
        app.scroll_into_view(10);
        assert_eq!(app.scroll, 0);
    }
}
