use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

use crate::config::EditorConfig;
use crate::content::ContentProvider;

/// Stores serialized content somewhere. Errors are reported as messages.
pub trait Persist {
    fn persist(&mut self, content: &str) -> Result<(), String>;
}

impl<F> Persist for F
where
    F: FnMut(&str) -> Result<(), String>,
{
    fn persist(&mut self, content: &str) -> Result<(), String> {
        self(content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved,
    Error(String),
}

/// State management for auto-save functionality.
///
/// The host reports every change with [`AutoSaveState::mark_changed`] and drives
/// the timer with [`AutoSaveState::poll`]. Each change is saved at most once;
/// a failed save stays failed until [`AutoSaveState::retry`] or the next change.
#[derive(Debug, Clone)]
pub struct AutoSaveState {
    delay: Duration,
    status: SaveStatus,
    /// Latest content reported by the editor
    content: Option<String>,
    /// Content of the last successful save
    saved_content: Option<String>,
    /// When the pending save becomes due
    due_at: Option<Instant>,
    last_save_time: Option<DateTime<Local>>,
}

impl AutoSaveState {
    pub fn new(delay: Duration) -> Self {
        AutoSaveState {
            delay,
            status: SaveStatus::Idle,
            content: None,
            saved_content: None,
            due_at: None,
            last_save_time: None,
        }
    }

    /// Use the configured autosave delay
    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(config.autosave_delay())
    }

    /// Start from content that is already stored
    pub fn with_saved_content(delay: Duration, content: &str) -> Self {
        AutoSaveState {
            content: Some(content.to_string()),
            saved_content: Some(content.to_string()),
            ..Self::new(delay)
        }
    }

    pub fn status(&self) -> &SaveStatus {
        &self.status
    }

    pub fn is_pending(&self) -> bool {
        self.due_at.is_some()
    }

    pub fn last_save_time(&self) -> Option<DateTime<Local>> {
        self.last_save_time
    }

    /// Mark that content has changed, restarting the delay
    pub fn mark_changed(&mut self, content: &str, now: Instant) {
        self.content = Some(content.to_string());
        if self.saved_content.as_deref() == Some(content) {
            self.due_at = None;
            return;
        }
        self.due_at = Some(now + self.delay);
    }

    /// Read the content from any surface and mark it changed
    pub fn mark_changed_from<P: ContentProvider + ?Sized>(&mut self, source: &P, now: Instant) {
        self.mark_changed(&source.get_content(), now);
    }

    /// Save if the delay has passed. Returns the outcome when a save ran.
    ///
    /// While an asynchronous save is in flight the pending change stays due
    /// and is saved by the first poll after [`AutoSaveState::finish_save`].
    pub fn poll<P: Persist + ?Sized>(
        &mut self,
        now: Instant,
        persist: &mut P,
    ) -> Option<Result<(), String>> {
        match self.due_at {
            Some(due) if now >= due && self.status != SaveStatus::Saving => {
                self.save(persist)
            }
            _ => None,
        }
    }

    /// Save the last known content again, typically after an error
    pub fn retry<P: Persist + ?Sized>(&mut self, persist: &mut P) -> Result<(), String> {
        self.save(persist).unwrap_or(Ok(()))
    }

    /// Hand out the content to save and enter [`SaveStatus::Saving`].
    ///
    /// For hosts that persist asynchronously; report the result with
    /// [`AutoSaveState::finish_save`].
    pub fn begin_save(&mut self) -> Option<String> {
        if self.status == SaveStatus::Saving {
            return None;
        }
        let content = self.content.clone()?;
        self.due_at = None;
        self.status = SaveStatus::Saving;
        Some(content)
    }

    /// Record the outcome of a save started with [`AutoSaveState::begin_save`].
    ///
    /// Content that changed while the save was running stays pending.
    pub fn finish_save(&mut self, content: &str, result: Result<(), String>) {
        match result {
            Ok(()) => {
                self.status = SaveStatus::Saved;
                self.saved_content = Some(content.to_string());
                self.last_save_time = Some(Local::now());
                if self.content.as_deref() != Some(content) && self.due_at.is_none() {
                    tracing::debug!("content changed during save, saving again");
                    self.due_at = Some(Instant::now());
                }
            }
            Err(message) => {
                tracing::warn!(%message, "autosave failed");
                self.status = SaveStatus::Error(message);
            }
        }
    }

    /// Persist synchronously. `None` when there was nothing to save.
    fn save<P: Persist + ?Sized>(&mut self, persist: &mut P) -> Option<Result<(), String>> {
        let content = self.begin_save()?;
        let result = persist.persist(&content);
        self.finish_save(&content, result.clone());
        Some(result)
    }

    /// Get the status text for display
    pub fn status_text(&self) -> String {
        match &self.status {
            SaveStatus::Saving => "Saving...".to_string(),
            SaveStatus::Error(message) => format!("not saved: {}", message),
            SaveStatus::Saved | SaveStatus::Idle => match self.last_save_time {
                Some(time) if !self.is_pending() => format_time_since(time, Local::now()),
                _ if self.is_pending() => "not saved".to_string(),
                _ => String::new(),
            },
        }
    }
}

/// Format the time since a save as a human-readable string
pub fn format_time_since(time: DateTime<Local>, now: DateTime<Local>) -> String {
    let secs = (now - time).num_seconds();

    if secs < 0 {
        "saved (time error)".to_string()
    } else if secs < 60 {
        "saved just now".to_string()
    } else if secs < 3600 {
        plural("min", secs / 60)
    } else if secs < 86400 {
        plural("hour", secs / 3600)
    } else if secs < 604800 {
        plural("day", secs / 86400)
    } else {
        // A week or more - show date
        time.format("saved %Y-%m-%d").to_string()
    }
}

fn plural(unit: &str, count: i64) -> String {
    if count == 1 || unit == "min" {
        format!("saved {} {} ago", count, unit)
    } else {
        format!("saved {} {}s ago", count, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const DELAY: Duration = Duration::from_millis(3000);

    #[test]
    fn test_autosave_state_new() {
        let state = AutoSaveState::new(DELAY);
        assert_eq!(state.status(), &SaveStatus::Idle);
        assert!(!state.is_pending());
        assert!(state.last_save_time().is_none());
        assert_eq!(state.status_text(), "");
    }

    #[test]
    fn test_saves_once_after_quiet_period() {
        let start = Instant::now();
        let mut state = AutoSaveState::new(DELAY);
        let mut saved: Vec<String> = Vec::new();
        let mut persist = |content: &str| -> Result<(), String> {
            saved.push(content.to_string());
            Ok(())
        };

        state.mark_changed("<p>a</p>", start);
        assert_eq!(state.status_text(), "not saved");
        state.mark_changed("<p>ab</p>", start + Duration::from_millis(2000));
        assert!(state.poll(start + Duration::from_millis(4000), &mut persist).is_none());
        assert_eq!(
            state.poll(start + Duration::from_millis(5000), &mut persist),
            Some(Ok(()))
        );
        assert!(state.poll(start + Duration::from_millis(9000), &mut persist).is_none());

        assert_eq!(saved, vec!["<p>ab</p>".to_string()]);
        assert_eq!(state.status(), &SaveStatus::Saved);
        assert_eq!(state.status_text(), "saved just now");
    }

    #[test]
    fn test_error_then_retry() {
        let start = Instant::now();
        let mut state = AutoSaveState::new(DELAY);
        let mut failing = |_: &str| -> Result<(), String> { Err("disk full".to_string()) };

        state.mark_changed("<p>x</p>", start);
        let result = state.poll(start + DELAY, &mut failing);
        assert_eq!(result, Some(Err("disk full".to_string())));
        assert_eq!(state.status(), &SaveStatus::Error("disk full".to_string()));
        assert_eq!(state.status_text(), "not saved: disk full");
        // no automatic retry
        assert!(state.poll(start + DELAY * 2, &mut failing).is_none());

        let mut attempts = Vec::new();
        let mut working = |content: &str| -> Result<(), String> {
            attempts.push(content.to_string());
            Ok(())
        };
        state.retry(&mut working).unwrap();
        assert_eq!(attempts, vec!["<p>x</p>".to_string()]);
        assert_eq!(state.status(), &SaveStatus::Saved);
    }

    #[test]
    fn test_unchanged_content_is_not_saved() {
        let start = Instant::now();
        let mut state = AutoSaveState::with_saved_content(DELAY, "<p>same</p>");
        state.mark_changed("<p>same</p>", start);
        assert!(!state.is_pending());
    }

    #[test]
    fn test_async_save_shows_saving() {
        let mut state = AutoSaveState::new(DELAY);
        state.mark_changed("<p>x</p>", Instant::now());
        let content = state.begin_save().unwrap();
        assert_eq!(state.status_text(), "Saving...");
        assert!(state.begin_save().is_none());
        state.finish_save(&content, Ok(()));
        assert_eq!(state.status(), &SaveStatus::Saved);
    }

    #[test]
    fn test_change_during_async_save_is_saved_afterwards() {
        let start = Instant::now();
        let mut state = AutoSaveState::new(DELAY);
        let mut stored: Vec<String> = Vec::new();
        let mut persist = |content: &str| -> Result<(), String> {
            stored.push(content.to_string());
            Ok(())
        };

        state.mark_changed("<p>v1</p>", start);
        let first = state.begin_save().unwrap();
        state.mark_changed("<p>v2</p>", start + Duration::from_millis(100));

        // the first save is still running
        assert!(state.poll(start + Duration::from_millis(3100), &mut persist).is_none());
        assert!(state.is_pending());

        state.finish_save(&first, Ok(()));
        assert!(state.is_pending());
        assert_eq!(state.status_text(), "not saved");

        assert_eq!(
            state.poll(start + Duration::from_secs(60), &mut persist),
            Some(Ok(()))
        );
        assert_eq!(stored, vec!["<p>v2</p>".to_string()]);
        assert!(!state.is_pending());
        assert_eq!(state.status_text(), "saved just now");
    }

    #[test]
    fn test_delay_comes_from_config() {
        let start = Instant::now();
        let config = EditorConfig {
            autosave_delay_ms: 500,
            ..EditorConfig::default()
        };
        let mut state = AutoSaveState::from_config(&config);
        let mut persist = |_: &str| -> Result<(), String> { Ok(()) };

        state.mark_changed("<p>x</p>", start);
        assert!(state.poll(start + Duration::from_millis(400), &mut persist).is_none());
        assert_eq!(
            state.poll(start + Duration::from_millis(500), &mut persist),
            Some(Ok(()))
        );
    }

    #[test]
    fn test_format_time_since() {
        let saved = Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let after = |secs: i64| saved + chrono::Duration::seconds(secs);
        assert_eq!(format_time_since(saved, after(10)), "saved just now");
        assert_eq!(format_time_since(saved, after(150)), "saved 2 min ago");
        assert_eq!(format_time_since(saved, after(7200)), "saved 2 hours ago");
        assert_eq!(format_time_since(saved, after(3600)), "saved 1 hour ago");
        assert_eq!(format_time_since(saved, after(86400 * 3)), "saved 3 days ago");
        assert_eq!(format_time_since(saved, after(86400 * 10)), "saved 2024-03-01");
    }
}
