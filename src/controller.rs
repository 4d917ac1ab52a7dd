//! Single owner of the configuration, the active document and the live
//! decorations.
//!
//! Every trigger (document edit, editor switch, configuration change, UI
//! command) goes through here. Recomputation is debounced and settings-panel
//! refreshes are batched; both are driven by [`Controller::tick`] with an
//! explicit `now`.

use crate::constants::{RECOMPUTE_DEBOUNCE_MS, WEBVIEW_REFRESH_MS};
use crate::core::intent::{FilterUpdate, Intent};
use crate::core::model::{Configuration, Filter, Range, DEFAULT_RANGE_ID};
use crate::core::projection::Projector;
use crate::core::range::{self, LineBounds};
use crate::document::{count_lines, Document};
use crate::error::{ConfigError, ViewError};
use crate::filter::PatternCache;
use crate::highlight::{self, DecorationPlan, MatchCounts, ViewKind};
use crate::message::{InboundMessage, OutboundMessage};
use crate::scheduler::Debouncer;
use crate::state::{self, SettingsStore};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Applies decoration plans to a concrete surface.
pub trait Renderer {
    /// Drop every decoration object created by earlier plans.
    fn release_all(&mut self);
    fn install(&mut self, plan: &DecorationPlan);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

/// User-facing collaborators: dialogs, prompts and messages.
pub trait Host {
    fn confirm(&mut self, message: &str) -> bool;
    fn prompt(&mut self, message: &str) -> Option<String>;
    fn pick_export_path(&mut self) -> Option<PathBuf>;
    fn pick_import_path(&mut self) -> Option<PathBuf>;
    fn notify(&mut self, notice: Notice);
}

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub recompute_window: Duration,
    pub refresh_window: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            recompute_window: Duration::from_millis(RECOMPUTE_DEBOUNCE_MS),
            refresh_window: Duration::from_millis(WEBVIEW_REFRESH_MS),
        }
    }
}

pub struct Controller<R: Renderer, S: SettingsStore> {
    config: Configuration,
    document: Option<Document>,
    cursor_line: usize,
    cache: PatternCache,
    projector: Projector,
    recompute: Debouncer,
    refresh: Debouncer,
    counts: MatchCounts,
    renderer: R,
    store: S,
    outbound: Vec<OutboundMessage>,
}

impl<R: Renderer, S: SettingsStore> Controller<R, S> {
    pub fn new(config: Configuration, renderer: R, store: S, settings: EngineSettings) -> Self {
        Self {
            config,
            document: None,
            cursor_line: 0,
            cache: PatternCache::new(),
            projector: Projector::new(),
            recompute: Debouncer::new("recompute", settings.recompute_window),
            refresh: Debouncer::new("webview", settings.refresh_window),
            counts: MatchCounts::new(),
            renderer,
            store,
            outbound: Vec::new(),
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn counts(&self) -> &MatchCounts {
        &self.counts
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cursor_line(&self) -> usize {
        self.cursor_line
    }

    pub fn set_cursor_line(&mut self, line: usize) {
        let last = self.document.as_ref().map_or(0, |d| d.line_count() - 1);
        self.cursor_line = line.min(last);
    }

    pub fn is_projected(&self) -> bool {
        self.document
            .as_ref()
            .is_some_and(|d| self.projector.is_projected(d.uri()))
    }

    /// Bounds of the active range, resolved against the original document
    /// even while the matched-lines view is showing.
    pub fn active_bounds(&self) -> Option<LineBounds> {
        let doc = self.document.as_ref()?;
        let line_count = match self.projector.session(doc.uri()) {
            Some(session) => count_lines(&session.saved_text),
            None => doc.line_count(),
        };
        Some(range::resolve(
            &self.config.active_range_id,
            &self.config.ranges,
            line_count,
        ))
    }

    /// Earliest pending timer, for sizing an event-loop poll timeout.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.recompute.deadline(), self.refresh.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn take_outbound(&mut self) -> Vec<OutboundMessage> {
        std::mem::take(&mut self.outbound)
    }

    /// Make `document` the active buffer (editor switch or open).
    pub fn open_document(&mut self, document: Document, now: Instant) {
        debug!(target: "controller", uri = document.uri(), "document activated");
        self.document = Some(document);
        self.cursor_line = 0;
        self.recompute.request(now);
    }

    pub fn close_document(&mut self) -> Option<Document> {
        let doc = self.document.take()?;
        self.projector.forget(doc.uri());
        self.recompute.cancel();
        self.renderer.release_all();
        Some(doc)
    }

    /// Replace the active document's text. Returns false without a document.
    pub fn edit_document(&mut self, text: impl Into<String>, now: Instant) -> bool {
        let Some(doc) = self.document.as_mut() else {
            return false;
        };
        doc.set_text(text);
        let last = doc.line_count() - 1;
        self.cursor_line = self.cursor_line.min(last);
        self.recompute.request(now);
        true
    }

    /// Apply a configuration intent, persist the result and schedule the
    /// follow-up recompute and panel refresh.
    pub fn dispatch(&mut self, intent: Intent, now: Instant) -> Result<(), ConfigError> {
        debug!(target: "controller", ?intent, "dispatch");
        let next = self.config.apply(intent)?;
        self.replace_config(next, now);
        Ok(())
    }

    fn replace_config(&mut self, next: Configuration, now: Instant) {
        self.config = next;
        if let Err(e) = self.store.save(&self.config) {
            warn!(target: "controller", error = %e, "failed to persist settings");
        }
        self.recompute.request(now);
        self.refresh.request(now);
    }

    fn dispatch_or_notify(&mut self, intent: Intent, host: &mut dyn Host, now: Instant) -> bool {
        match self.dispatch(intent, now) {
            Ok(()) => true,
            Err(e) => {
                warn!(target: "controller", error = %e, "update rejected");
                host.notify(Notice::Info(e.to_string()));
                false
            }
        }
    }

    pub fn handle_message(&mut self, message: InboundMessage, host: &mut dyn Host, now: Instant) {
        debug!(target: "controller", ?message, "inbound message");
        match message {
            InboundMessage::WebviewReady | InboundMessage::RefreshView => self.post_update(),
            InboundMessage::UpdateFilter { id, field, value } => {
                match FilterUpdate::from_field(&field, &value) {
                    Ok(update) => {
                        self.dispatch_or_notify(Intent::UpdateFilterField { id, update }, host, now);
                    }
                    Err(e) => {
                        warn!(target: "controller", filter = %id, error = %e, "bad field update");
                        host.notify(Notice::Info(e.to_string()));
                    }
                }
            }
            InboundMessage::UpdateGroup { name, enabled } => {
                self.dispatch_or_notify(Intent::SetGroupEnabled { name, enabled }, host, now);
            }
            InboundMessage::UpdateGroupName { old_name, new_name } => {
                self.dispatch_or_notify(Intent::RenameGroup { old_name, new_name }, host, now);
            }
            InboundMessage::AddFilter { group_name } => {
                let filter = Filter::new(self.config.new_filter_id());
                self.dispatch_or_notify(
                    Intent::AddFilter {
                        group: group_name,
                        filter,
                    },
                    host,
                    now,
                );
            }
            InboundMessage::AddGroup => {
                let name = self.config.next_group_name();
                self.dispatch_or_notify(Intent::AddGroup { name }, host, now);
            }
            InboundMessage::DeleteGroup { group_name } => {
                let question = format!("Delete group \"{}\" and all its filters?", group_name);
                if host.confirm(&question) {
                    self.dispatch_or_notify(Intent::DeleteGroup { name: group_name }, host, now);
                }
            }
            InboundMessage::ToggleFilterField { filter_id, field } => {
                self.dispatch_or_notify(
                    Intent::ToggleFilterField {
                        id: filter_id,
                        field,
                    },
                    host,
                    now,
                );
            }
            InboundMessage::DeleteFilter { filter_id } => {
                self.dispatch_or_notify(Intent::DeleteFilter { id: filter_id }, host, now);
            }
            InboundMessage::MoveFilter {
                filter_id,
                target_group_name,
            } => {
                self.dispatch_or_notify(
                    Intent::MoveFilter {
                        id: filter_id,
                        target_group: target_group_name,
                    },
                    host,
                    now,
                );
            }
            InboundMessage::UpdateActiveRange { active_range_id } => {
                self.dispatch_or_notify(Intent::SetActiveRange { id: active_range_id }, host, now);
            }
            InboundMessage::AddRange { start, end } => self.add_range(start, end, host, now),
            InboundMessage::DeleteRange { range_id } => self.delete_range(range_id, host, now),
            InboundMessage::ExportConfig => self.export_config(host),
            InboundMessage::ImportConfig => self.import_config(host, now),
        }
    }

    fn add_range(&mut self, start: i64, end: i64, host: &mut dyn Host, now: Instant) {
        if !Range::is_valid_bounds(start, end) {
            host.notify(Notice::Info(ConfigError::InvalidRange { start, end }.to_string()));
            return;
        }
        let Some(name) = host.prompt("Enter a name for this range") else {
            return;
        };
        let name = name.trim().to_string();
        if name.is_empty() {
            host.notify(Notice::Info(ConfigError::EmptyRangeName.to_string()));
            return;
        }
        let range = Range {
            id: self.config.new_range_id(),
            name,
            start,
            end,
        };
        let id = range.id.clone();
        let next = self
            .config
            .apply(Intent::AddRange { range })
            .and_then(|c| c.apply(Intent::SetActiveRange { id }));
        match next {
            Ok(next) => self.replace_config(next, now),
            Err(e) => host.notify(Notice::Info(e.to_string())),
        }
    }

    fn delete_range(&mut self, range_id: String, host: &mut dyn Host, now: Instant) {
        if range_id == DEFAULT_RANGE_ID {
            host.notify(Notice::Info(ConfigError::DefaultRange.to_string()));
            return;
        }
        if range_id == self.config.active_range_id {
            let name = self
                .config
                .find_range(&range_id)
                .map_or(range_id.as_str(), |r| r.name.as_str());
            let question = format!("Delete the active range \"{}\"?", name);
            if !host.confirm(&question) {
                return;
            }
        }
        self.dispatch_or_notify(Intent::DeleteRange { id: range_id }, host, now);
    }

    fn export_config(&mut self, host: &mut dyn Host) {
        let Some(path) = host.pick_export_path() else {
            return;
        };
        match state::export_groups(&self.config.groups, &path) {
            Ok(()) => {
                info!(target: "controller", path = %path.display(), "configuration exported");
                host.notify(Notice::Info("Configuration exported successfully!".to_string()));
            }
            Err(e) => {
                warn!(target: "controller", error = %e, "export failed");
                host.notify(Notice::Error(format!("Failed to export configuration: {:#}", e)));
            }
        }
    }

    fn import_config(&mut self, host: &mut dyn Host, now: Instant) {
        let Some(path) = host.pick_import_path() else {
            return;
        };
        let result = state::import_groups(&path).and_then(|groups| {
            self.dispatch(Intent::ReplaceGroups { groups }, now)
                .map_err(anyhow::Error::from)
        });
        match result {
            Ok(()) => {
                info!(target: "controller", path = %path.display(), "configuration imported");
                host.notify(Notice::Info("Configuration imported successfully!".to_string()));
            }
            Err(e) => {
                warn!(target: "controller", error = %e, "import failed");
                host.notify(Notice::Error(format!("Failed to import configuration: {:#}", e)));
            }
        }
    }

    pub fn enter_matched_view(&mut self, now: Instant) -> Result<usize, ViewError> {
        let bounds = self.active_bounds().ok_or(ViewError::NoActiveDocument)?;
        let doc = self.document.as_mut().ok_or(ViewError::NoActiveDocument)?;
        let entered = self.projector.enter(
            doc,
            &self.config.groups,
            bounds,
            self.cursor_line,
            &mut self.cache,
        )?;
        self.cursor_line = entered.cursor.unwrap_or(0);
        self.recompute_now(now);
        Ok(entered.matched_lines)
    }

    pub fn exit_matched_view(&mut self, now: Instant) -> Result<(), ViewError> {
        let doc = self.document.as_mut().ok_or(ViewError::NoActiveDocument)?;
        let cursor = self.projector.exit(doc)?;
        self.set_cursor_line(cursor);
        self.recompute_now(now);
        Ok(())
    }

    /// The toggle-matched-view command.
    pub fn toggle_matched_view(&mut self, host: &mut dyn Host, now: Instant) {
        let result = if self.is_projected() {
            self.exit_matched_view(now)
        } else {
            self.enter_matched_view(now).map(|matched| {
                if matched == 0 {
                    host.notify(Notice::Info("No lines matched the active filters.".to_string()));
                }
            })
        };
        if let Err(e) = result {
            info!(target: "controller", reason = %e, "matched view unchanged");
            host.notify(Notice::Info(e.to_string()));
        }
    }

    /// The refresh-webview command.
    pub fn refresh_webview(&mut self, now: Instant) {
        self.refresh.request(now);
    }

    pub fn tick(&mut self, now: Instant) {
        self.tick_with(now, &mut || false);
    }

    /// Run whatever timers are due. A recompute that `should_abort` cuts
    /// short is rescheduled rather than applied.
    pub fn tick_with(&mut self, now: Instant, should_abort: &mut dyn FnMut() -> bool) {
        if self.recompute.poll(now) && !self.recompute_cancellable(now, should_abort) {
            self.recompute.request(now);
        }
        if self.refresh.poll(now) {
            self.post_update();
        }
    }

    pub fn recompute_now(&mut self, now: Instant) {
        self.recompute.cancel();
        self.recompute_cancellable(now, &mut || false);
    }

    /// Returns false when the sweep was abandoned.
    fn recompute_cancellable(
        &mut self,
        now: Instant,
        should_abort: &mut dyn FnMut() -> bool,
    ) -> bool {
        let Some(bounds) = self.active_bounds() else {
            self.renderer.release_all();
            return true;
        };
        let Some(doc) = self.document.as_ref() else {
            return true;
        };
        let view = if self.projector.is_projected(doc.uri()) {
            ViewKind::Projected
        } else {
            ViewKind::Source
        };
        let Some(result) = highlight::compute_cancellable(
            doc,
            &self.config.groups,
            bounds,
            view,
            &mut self.cache,
            should_abort,
        ) else {
            return false;
        };
        self.renderer.release_all();
        self.renderer.install(&result.plan);
        debug!(
            target: "controller",
            styles = result.plan.groups.len(),
            spans = result.plan.span_count(),
            "decorations installed"
        );
        if result.counts != self.counts {
            self.counts = result.counts;
            self.refresh.request(now);
        }
        true
    }

    fn post_update(&mut self) {
        self.refresh.cancel();
        self.outbound.push(OutboundMessage::Update {
            groups: self.config.groups.clone(),
            ranges: self.config.ranges.clone(),
            active_range_id: self.config.active_range_id.clone(),
            match_counts: self.counts.clone(),
        });
    }
}
