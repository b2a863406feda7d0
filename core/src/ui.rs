//! Display collaborators the controller pushes state into.
//!
//! # Design
//! Each widget the controller talks to is its own trait, addressed by the
//! handle names found in `EntityConfig`. `Ui` is the union of all of them and
//! is implemented automatically. `MemoryUi` keeps every widget's state in
//! memory and records every call, which is enough to run the controller
//! headless and to assert on what a real page would have shown.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::multipart::FilePart;
use crate::types::{Record, SelectOption};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Info,
}

/// A transient, auto-dismissing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
    pub duration: Duration,
}

pub trait TableWidget {
    fn load_rows(&mut self, table: &str, rows: Vec<Record>);
    fn selected_ids(&self, table: &str) -> Vec<i64>;
}

pub trait ModalWidget {
    fn show_modal(&mut self, modal: &str);
    fn hide_modal(&mut self, modal: &str);
}

pub trait Notifier {
    fn notify(&mut self, severity: Severity, message: &str, duration: Duration);
}

pub trait ConfirmDialog {
    /// Ask the user to confirm; `true` when the action button was pressed.
    fn confirm(&mut self, title: &str, button: &str) -> bool;
}

pub trait SelectWidget {
    fn load_select(&mut self, select: &str, options: Vec<SelectOption>, selected: Option<i64>);
}

pub trait ImagePreview {
    fn clear_preview(&mut self, input: &str);
    fn set_preview(&mut self, input: &str, url: &str);
}

/// Form inputs addressed by id.
pub trait FormInputs {
    fn value(&self, input: &str) -> Option<String>;
    fn is_checkbox(&self, input: &str) -> bool;
    fn checked(&self, input: &str) -> bool;
    fn file(&self, input: &str) -> Option<FilePart>;
    fn set_value(&mut self, input: &str, value: &str);
    fn mark_invalid(&mut self, input: &str, invalid: bool);
}

/// Spinner shown while a request is in flight.
pub trait Loader {
    fn set_loading(&mut self, loading: bool);
}

pub trait Navigator {
    fn navigate(&mut self, url: &str, delay: Duration);
}

pub trait Ui:
    TableWidget + ModalWidget + Notifier + ConfirmDialog + SelectWidget + ImagePreview + FormInputs + Loader + Navigator
{
}

impl<T> Ui for T where
    T: TableWidget
        + ModalWidget
        + Notifier
        + ConfirmDialog
        + SelectWidget
        + ImagePreview
        + FormInputs
        + Loader
        + Navigator
{
}

/// In-memory widgets. Every field is public so callers can seed input and
/// inspect output directly.
#[derive(Debug, Clone)]
pub struct MemoryUi {
    pub tables: HashMap<String, Vec<Record>>,
    pub selections: HashMap<String, Vec<i64>>,
    pub open_modals: HashSet<String>,
    pub notifications: Vec<Notification>,
    /// Answer given to every confirmation dialog.
    pub confirm_answer: bool,
    pub confirmations: Vec<String>,
    pub selects: HashMap<String, (Vec<SelectOption>, Option<i64>)>,
    pub previews: HashMap<String, String>,
    pub inputs: HashMap<String, String>,
    pub checkboxes: HashMap<String, bool>,
    pub files: HashMap<String, FilePart>,
    pub invalid: HashSet<String>,
    pub loading: bool,
    pub navigations: Vec<(String, Duration)>,
}

impl Default for MemoryUi {
    fn default() -> Self {
        Self {
            tables: HashMap::new(),
            selections: HashMap::new(),
            open_modals: HashSet::new(),
            notifications: Vec::new(),
            confirm_answer: true,
            confirmations: Vec::new(),
            selects: HashMap::new(),
            previews: HashMap::new(),
            inputs: HashMap::new(),
            checkboxes: HashMap::new(),
            files: HashMap::new(),
            invalid: HashSet::new(),
            loading: false,
            navigations: Vec::new(),
        }
    }
}

impl MemoryUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, input: &str, value: &str) -> Self {
        self.inputs.insert(input.to_string(), value.to_string());
        self
    }

    pub fn set_input(&mut self, input: &str, value: &str) {
        self.inputs.insert(input.to_string(), value.to_string());
    }

    pub fn set_checkbox(&mut self, input: &str, checked: bool) {
        self.checkboxes.insert(input.to_string(), checked);
    }

    pub fn select_rows(&mut self, table: &str, ids: &[i64]) {
        self.selections.insert(table.to_string(), ids.to_vec());
    }

    /// Ids shown in `table`, in display order.
    pub fn table_ids(&self, table: &str) -> Vec<i64> {
        self.tables
            .get(table)
            .map(|rows| rows.iter().filter_map(Record::id).collect())
            .unwrap_or_default()
    }

    pub fn last_notification(&self) -> Option<&Notification> {
        self.notifications.last()
    }
}

impl TableWidget for MemoryUi {
    fn load_rows(&mut self, table: &str, rows: Vec<Record>) {
        self.tables.insert(table.to_string(), rows);
    }

    fn selected_ids(&self, table: &str) -> Vec<i64> {
        self.selections.get(table).cloned().unwrap_or_default()
    }
}

impl ModalWidget for MemoryUi {
    fn show_modal(&mut self, modal: &str) {
        self.open_modals.insert(modal.to_string());
    }

    fn hide_modal(&mut self, modal: &str) {
        self.open_modals.remove(modal);
    }
}

impl Notifier for MemoryUi {
    fn notify(&mut self, severity: Severity, message: &str, duration: Duration) {
        self.notifications.push(Notification {
            severity,
            message: message.to_string(),
            duration,
        });
    }
}

impl ConfirmDialog for MemoryUi {
    fn confirm(&mut self, title: &str, _button: &str) -> bool {
        self.confirmations.push(title.to_string());
        self.confirm_answer
    }
}

impl SelectWidget for MemoryUi {
    fn load_select(&mut self, select: &str, options: Vec<SelectOption>, selected: Option<i64>) {
        self.selects.insert(select.to_string(), (options, selected));
    }
}

impl ImagePreview for MemoryUi {
    fn clear_preview(&mut self, input: &str) {
        self.previews.remove(input);
        self.files.remove(input);
    }

    fn set_preview(&mut self, input: &str, url: &str) {
        self.previews.insert(input.to_string(), url.to_string());
    }
}

impl FormInputs for MemoryUi {
    fn value(&self, input: &str) -> Option<String> {
        self.inputs.get(input).cloned()
    }

    fn is_checkbox(&self, input: &str) -> bool {
        self.checkboxes.contains_key(input)
    }

    fn checked(&self, input: &str) -> bool {
        self.checkboxes.get(input).copied().unwrap_or(false)
    }

    fn file(&self, input: &str) -> Option<FilePart> {
        self.files.get(input).cloned()
    }

    fn set_value(&mut self, input: &str, value: &str) {
        self.inputs.insert(input.to_string(), value.to_string());
    }

    fn mark_invalid(&mut self, input: &str, invalid: bool) {
        if invalid {
            self.invalid.insert(input.to_string());
        } else {
            self.invalid.remove(input);
        }
    }
}

impl Loader for MemoryUi {
    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }
}

impl Navigator for MemoryUi {
    fn navigate(&mut self, url: &str, delay: Duration) {
        self.navigations.push((url.to_string(), delay));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_ui<U: Ui>(_: &U) {}

    #[test]
    fn memory_ui_is_a_ui() {
        assert_ui(&MemoryUi::new());
    }

    #[test]
    fn invalid_marks_toggle() {
        let mut ui = MemoryUi::new();
        ui.mark_invalid("name", true);
        assert!(ui.invalid.contains("name"));
        ui.mark_invalid("name", false);
        assert!(ui.invalid.is_empty());
    }

    #[test]
    fn checkbox_inputs_are_distinct_from_text() {
        let mut ui = MemoryUi::new().with_input("name", "Ann");
        ui.set_checkbox("active", true);
        assert!(ui.is_checkbox("active"));
        assert!(!ui.is_checkbox("name"));
        assert!(ui.checked("active"));
    }

    #[test]
    fn table_ids_follow_loaded_rows() {
        let mut ui = MemoryUi::new();
        ui.load_rows("main", vec![Record::new().with_id(2), Record::new().with_id(1)]);
        assert_eq!(ui.table_ids("main"), vec![2, 1]);
        assert!(ui.table_ids("other").is_empty());
    }
}
