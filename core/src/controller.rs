//! Entity controller: owns an entity's record sets and runs the CRUD flows.
//!
//! # Design
//! `CrudHandler` is an explicit instance built from an `ApiClient`, a `Ui`
//! and an `EntityConfig`; nothing is global. Every flow takes `&mut self`,
//! so one instance cannot run two flows at once.
//!
//! Each public flow is a thin wrapper around a `try_*` method: the wrapper
//! reports any error (log, notification, spinner off) and returns it, so a
//! caller sees a `FlowError` only after the user has been told. State is
//! touched only after the server has confirmed the change.
//!
//! Record states per id:
//!
//! ```text
//!         insert            delete
//!  (none) ──────► ACTIVE ──────────► DELETED
//!                   ▲                   │
//!                   └───── restore ─────┘
//! ```

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde_json::{json, Value};

use crate::cart::{Cart, CartLine};
use crate::client::{ApiClient, Payload};
use crate::config::{EntityConfig, StatusPolicy, TableKind};
use crate::error::{ConfigError, FlowError, TransportError, ValidationError};
use crate::flatten::{decorate_rows, flatten_rows, ActionSet, RowDecorator};
use crate::http::HttpExecutor;
use crate::multipart::MultipartForm;
use crate::records::RecordSet;
use crate::types::{value_as_id, Envelope, Record, SelectOption};
use crate::ui::{Severity, Ui};

const NOTICE: Duration = Duration::from_millis(1500);
const NOTICE_SHORT: Duration = Duration::from_millis(1000);
const NOTICE_ERROR: Duration = Duration::from_millis(2000);
const NOTICE_TOAST: Duration = Duration::from_millis(400);
const EDIT_REDIRECT_DELAY: Duration = Duration::from_millis(1000);
const CART_REDIRECT_DELAY: Duration = Duration::from_millis(1100);

/// Destructive actions that go through a confirmation dialog first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    DeleteOne(i64),
    RestoreOne(i64),
    DeleteSelected,
    RestoreSelected,
}

impl ConfirmAction {
    /// Dialog title and confirm button label.
    pub fn prompt(self) -> (&'static str, &'static str) {
        match self {
            ConfirmAction::DeleteOne(_) => ("Delete this record?", "Delete"),
            ConfirmAction::RestoreOne(_) => ("Restore this record?", "Restore"),
            ConfirmAction::DeleteSelected => ("Delete the selected records?", "Delete"),
            ConfirmAction::RestoreSelected => ("Restore the selected records?", "Restore"),
        }
    }
}

/// User interactions the page binds to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Save,
    Update,
    Edit(i64),
    Delete(i64),
    Restore(i64),
    DeleteSelected,
    RestoreSelected,
    ShowCart,
    /// Add an item to the cart; `None` reads the cart relation's select.
    AddToCart(Option<i64>),
    RemoveFromCart(i64),
    SetAmount { id: i64, raw: String },
    SaveCart,
    UpdateCart,
}

/// Row detail rendered from `DetailConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailView {
    pub title: String,
    pub headers: Vec<String>,
    pub cells: Vec<String>,
    pub images: Vec<String>,
}

/// Controller for one entity.
pub struct CrudHandler<E, U> {
    api: ApiClient<E>,
    ui: U,
    config: EntityConfig,
    active: RecordSet,
    deleted: RecordSet,
    secondary: HashMap<String, Vec<Record>>,
    cart: Cart,
    editing: Option<Record>,
}

impl<E: HttpExecutor, U: Ui> CrudHandler<E, U> {
    pub fn new(api: ApiClient<E>, ui: U, config: EntityConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            api,
            ui,
            config,
            active: RecordSet::default(),
            deleted: RecordSet::default(),
            secondary: HashMap::new(),
            cart: Cart::new(),
            editing: None,
        })
    }

    pub fn config(&self) -> &EntityConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient<E> {
        &self.api
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut U {
        &mut self.ui
    }

    pub fn active(&self) -> &RecordSet {
        &self.active
    }

    pub fn deleted(&self) -> &RecordSet {
        &self.deleted
    }

    pub fn secondary(&self, relation: &str) -> Option<&[Record]> {
        self.secondary.get(relation).map(Vec::as_slice)
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    /// Record loaded by a dedicated edit page.
    pub fn editing(&self) -> Option<&Record> {
        self.editing.as_ref()
    }

    // -----------------------------------------------------------------------
    // Initial load
    // -----------------------------------------------------------------------

    /// Load the active list, related lists and the deleted list, then prepare
    /// a dedicated edit page when configured.
    pub fn init(&mut self) -> Result<(), FlowError> {
        let result = self.try_load_active();
        self.finish(result)?;
        self.load_secondaries();
        if self.config.deleted_table.is_some() {
            let result = self.try_load_deleted();
            self.finish(result)?;
        }
        if self.config.new_page_edit {
            self.prepare_edit_page();
        }
        Ok(())
    }

    fn try_load_active(&mut self) -> Result<(), FlowError> {
        let entity = self.config.entity.clone();
        let envelope = self.get_envelope(&entity)?;
        match &envelope.data {
            Value::Object(_) => {
                let record = envelope.data_record().unwrap_or_default();
                self.editing = Some(record.clone());
                self.active = RecordSet::new(vec![record]);
            }
            _ => self.active = RecordSet::new(envelope.data_records()),
        }
        tracing::debug!(entity = %entity, count = self.active.len(), "loaded active records");
        self.refresh_active()
    }

    fn try_load_deleted(&mut self) -> Result<(), FlowError> {
        let endpoint = format!("{}/deletes", self.config.entity);
        let envelope = self.get_envelope(&endpoint)?;
        self.deleted = RecordSet::new(envelope.data_records());

        let overlap: HashSet<i64> = self.deleted.ids().into_iter().filter(|id| self.active.contains(*id)).collect();
        if !overlap.is_empty() {
            tracing::warn!(entity = %self.config.entity, ids = ?overlap, "records listed as both active and deleted");
            self.active.drain_ids(&overlap);
            self.refresh_active()?;
        }
        tracing::debug!(entity = %self.config.entity, count = self.deleted.len(), "loaded deleted records");
        self.refresh_deleted()
    }

    /// Fetch every related list. A failing relation is logged and skipped.
    pub fn load_secondaries(&mut self) {
        if self.config.table_kind == TableKind::Independent {
            return;
        }
        let relations = self.config.relations.clone();
        for (pos, relation) in relations.iter().enumerate() {
            let records = match self.get_envelope(relation.endpoint()) {
                Ok(envelope) => envelope.data_records(),
                Err(err) => {
                    self.ui.set_loading(false);
                    tracing::warn!(relation = %relation.name, error = %err, "failed to load related list");
                    continue;
                }
            };
            tracing::debug!(relation = %relation.name, count = records.len(), "loaded related list");
            self.secondary.insert(relation.name.clone(), records);

            if let Some(select) = &relation.select {
                let selected = self.editing.as_ref().and_then(|record| foreign_id(record, relation.foreign_key.as_deref()));
                self.load_select(select, &relation.name, selected);
            }
            if pos == 0 {
                self.refresh_catalog();
            }
        }
        self.refresh_cart();
    }

    fn prepare_edit_page(&mut self) {
        let Some(record) = self.editing.clone() else {
            return;
        };
        self.fill_inputs(&record, "");
        self.preview_images(&record, "");

        if !self.config.has_many {
            return;
        }
        let (Some(relation), Some(cart)) = (self.config.cart_relation(), self.config.cart.as_ref()) else {
            return;
        };
        let many_name = cart.many_name.clone().unwrap_or_else(|| relation.name.clone());
        let lines = match record.get(&relation.name) {
            Some(Value::Array(rows)) => rows.iter().filter_map(|row| pivot_line(row, &many_name)).collect(),
            _ => Vec::new(),
        };
        self.cart.seed(lines);
        tracing::debug!(entity = %self.config.entity, lines = self.cart.len(), "seeded cart from edit record");
        self.refresh_cart();
    }

    // -----------------------------------------------------------------------
    // Display
    // -----------------------------------------------------------------------

    /// Sort the active set and push it to the main table.
    pub fn refresh_active(&mut self) -> Result<(), FlowError> {
        self.active.sort_desc();
        let Some(table) = self.config.table.clone() else {
            return Ok(());
        };
        let rows = self.display_rows(self.active.rows(), ActionSet::Active)?;
        self.ui.load_rows(&table, rows);
        Ok(())
    }

    /// Sort the deleted set and push it to the deleted table.
    pub fn refresh_deleted(&mut self) -> Result<(), FlowError> {
        self.deleted.sort_desc();
        let Some(table) = self.config.deleted_table.clone() else {
            return Ok(());
        };
        let rows = self.display_rows(self.deleted.rows(), ActionSet::Deleted)?;
        self.ui.load_rows(&table, rows);
        Ok(())
    }

    fn display_rows(&self, rows: &[Record], actions: ActionSet) -> Result<Vec<Record>, FlowError> {
        let decorator = RowDecorator::for_config(&self.config, actions);
        match self.config.table_kind {
            TableKind::Secondary => Ok(flatten_rows(rows, &self.config.relations, &decorator)?),
            TableKind::Independent | TableKind::Default => Ok(decorate_rows(rows, &decorator)),
        }
    }

    fn refresh_catalog(&mut self) {
        let (Some(cart), Some(relation)) = (self.config.cart.as_ref(), self.config.cart_relation()) else {
            return;
        };
        let Some(table) = cart.catalog_table.clone() else {
            return;
        };
        let items = self.secondary.get(&relation.name).cloned().unwrap_or_default();
        let rows = decorate_rows(&items, &RowDecorator::new(ActionSet::CartCatalog));
        self.ui.load_rows(&table, rows);
    }

    fn refresh_cart(&mut self) {
        let Some(table) = self.config.cart.as_ref().and_then(|cart| cart.staging_table.clone()) else {
            return;
        };
        let decorator = RowDecorator::new(ActionSet::CartStaging);
        let rows = self
            .cart
            .rows()
            .into_iter()
            .map(|mut row| {
                decorator.decorate(&mut row);
                row
            })
            .collect();
        self.ui.load_rows(&table, rows);
    }

    fn load_select(&mut self, select: &str, relation: &str, selected: Option<i64>) {
        if self.config.table_kind != TableKind::Secondary {
            return;
        }
        let options = SelectOption::from_records(self.secondary.get(relation).map(Vec::as_slice).unwrap_or(&[]));
        self.ui.load_select(select, options, selected);
    }

    fn reload_selects(&mut self) {
        let relations = self.config.relations.clone();
        for relation in &relations {
            if let Some(select) = &relation.select {
                self.load_select(select, &relation.name, None);
            }
        }
    }

    /// Detail panel for a row, when configured.
    pub fn detail_view(&self, record: &Record) -> Option<DetailView> {
        let detail = self.config.detail.as_ref()?;
        let nested = record
            .get(&detail.attribute)
            .cloned()
            .and_then(Record::from_value)
            .unwrap_or_default();
        Some(DetailView {
            title: detail.title.clone(),
            headers: detail.headers.clone(),
            cells: detail
                .attributes
                .iter()
                .map(|field| nested.get_text(field).unwrap_or_default())
                .collect(),
            images: detail
                .images
                .iter()
                .map(|field| self.config.image_url(&nested.get_text(field).unwrap_or_default()))
                .collect(),
        })
    }

    // -----------------------------------------------------------------------
    // Insert / update
    // -----------------------------------------------------------------------

    pub fn insert(&mut self) -> Result<(), FlowError> {
        let result = self.try_insert();
        self.finish(result)
    }

    fn try_insert(&mut self) -> Result<(), FlowError> {
        self.validate_required("")?;
        let provisional = (!self.config.new_page_edit).then(|| self.active.next_id());
        let payload = self.build_payload("", provisional);
        let endpoint = format!("{}/store", self.config.write_endpoint());
        let (status, envelope) = self.post_envelope(&endpoint, &payload)?;
        self.check_insert_status(status, &envelope)?;

        let record = inserted_record(&envelope, &payload, provisional);
        if let Some(id) = record.id() {
            self.active.take(id);
            self.deleted.take(id);
        }
        tracing::info!(entity = %self.config.entity, id = ?record.id(), "record inserted");
        self.active.prepend(record);
        self.clear_inputs("");
        self.clear_image_inputs("");
        if self.config.table_kind == TableKind::Secondary {
            self.reload_selects();
        }
        self.success("Record inserted successfully.", NOTICE);
        self.refresh_active()
    }

    fn check_insert_status(&self, status: i64, envelope: &Envelope) -> Result<(), FlowError> {
        let message = |fallback: &str| envelope.message.clone().unwrap_or_else(|| fallback.to_string());
        match status {
            201 => Ok(()),
            400 => Err(FlowError::Rejected {
                status,
                message: message("The record already exists."),
            }),
            500 => Err(FlowError::Rejected {
                status,
                message: message("Error inserting the record."),
            }),
            other => match self.config.status_policy {
                StatusPolicy::Strict => Err(FlowError::Rejected {
                    status: other,
                    message: message("Error inserting the record."),
                }),
                StatusPolicy::Permissive => {
                    tracing::warn!(status = other, "unexpected insert status treated as success");
                    Ok(())
                }
            },
        }
    }

    pub fn update(&mut self) -> Result<(), FlowError> {
        let result = self.try_update();
        self.finish(result)
    }

    fn try_update(&mut self) -> Result<(), FlowError> {
        let suffix = self.edit_suffix();
        self.validate_required(&suffix)?;
        let payload = self.build_payload(&suffix, None);
        let endpoint = format!("{}/update", self.config.write_endpoint());
        let (status, envelope) = self.post_envelope(&endpoint, &payload)?;
        if status != 200 {
            return Err(FlowError::Rejected {
                status,
                message: "Error updating the record.".to_string(),
            });
        }

        if self.config.new_page_edit {
            self.success("Record updated successfully.", NOTICE);
            let url = format!("{}/{}", self.config.app_url, self.config.write_endpoint());
            self.ui.navigate(&url, EDIT_REDIRECT_DELAY);
            return Ok(());
        }

        if let Some(patch) = envelope.data_record() {
            match patch.id() {
                Some(id) if self.active.contains(id) => {
                    self.active.merge(id, &patch);
                    tracing::info!(entity = %self.config.entity, id, "record updated");
                }
                id => tracing::warn!(entity = %self.config.entity, id = ?id, "updated record is not in the active set"),
            }
        }
        if let Some(modal) = self.config.modal.clone() {
            self.ui.hide_modal(&modal);
        }
        self.clear_inputs("");
        self.success("Record updated successfully.", NOTICE);
        self.refresh_active()
    }

    /// Fill the edit form with record `id` and open the edit modal.
    pub fn load_edit(&mut self, id: i64) -> Result<(), FlowError> {
        let Some(record) = self.active.find(id).cloned() else {
            tracing::debug!(entity = %self.config.entity, id, "edit requested for unknown record");
            return Ok(());
        };
        let suffix = self.edit_suffix();
        self.fill_inputs(&record, &suffix);
        let relations = self.config.relations.clone();
        for relation in &relations {
            if let Some(select) = &relation.select {
                let selected = foreign_id(&record, relation.foreign_key.as_deref());
                self.load_select(&format!("{select}{suffix}"), &relation.name, selected);
            }
        }
        self.preview_images(&record, &suffix);
        if let Some(modal) = self.config.modal.clone() {
            self.ui.show_modal(&modal);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Delete / restore
    // -----------------------------------------------------------------------

    pub fn delete_one(&mut self, id: i64) -> Result<(), FlowError> {
        let result = self.try_move_one(id, Transition::Delete);
        self.finish(result)
    }

    pub fn restore_one(&mut self, id: i64) -> Result<(), FlowError> {
        let result = self.try_move_one(id, Transition::Restore);
        self.finish(result)
    }

    fn try_move_one(&mut self, id: i64, transition: Transition) -> Result<(), FlowError> {
        let endpoint = format!("{}/{}/{id}", self.config.entity, transition.path());
        let envelope = self.get_envelope(&endpoint)?;
        let status = envelope.status_or(200);
        if status != 200 {
            return Err(FlowError::Rejected {
                status,
                message: transition.failure_one().to_string(),
            });
        }

        let confirmed = envelope.data_record().and_then(|record| record.id()).unwrap_or(id);
        let (from, to) = match transition {
            Transition::Delete => (&mut self.active, &mut self.deleted),
            Transition::Restore => (&mut self.deleted, &mut self.active),
        };
        match from.take(confirmed).or_else(|| envelope.data_record()) {
            Some(record) => {
                to.take(confirmed);
                to.prepend(record);
                tracing::info!(entity = %self.config.entity, id = confirmed, transition = transition.path(), "record moved");
            }
            None => tracing::warn!(entity = %self.config.entity, id = confirmed, "confirmed record not found locally"),
        }

        self.success(transition.success_one(), NOTICE_SHORT);
        self.refresh_active()?;
        self.refresh_deleted()
    }

    pub fn delete_selected(&mut self) -> Result<(), FlowError> {
        let result = self.try_move_selected(Transition::Delete);
        self.finish(result)
    }

    pub fn restore_selected(&mut self) -> Result<(), FlowError> {
        let result = self.try_move_selected(Transition::Restore);
        self.finish(result)
    }

    fn try_move_selected(&mut self, transition: Transition) -> Result<(), FlowError> {
        let table = match transition {
            Transition::Delete => self.config.table.clone(),
            Transition::Restore => self.config.deleted_table.clone(),
        };
        let ids = table.map(|table| self.ui.selected_ids(&table)).unwrap_or_default();
        if ids.is_empty() {
            return Err(ValidationError::NoSelection.into());
        }

        let endpoint = format!("{}/{}/ids", self.config.entity, transition.path());
        let payload = Payload::Json(json!({ "data": &ids }));
        let (status, envelope) = self.post_envelope(&endpoint, &payload)?;
        if status != 200 {
            return Err(FlowError::Rejected {
                status,
                message: transition.failure_many().to_string(),
            });
        }

        let confirmed = confirmed_ids(&envelope, &ids);
        let (from, to) = match transition {
            Transition::Delete => (&mut self.active, &mut self.deleted),
            Transition::Restore => (&mut self.deleted, &mut self.active),
        };
        let moved = from.drain_ids(&confirmed);
        let moved_ids: HashSet<i64> = moved.iter().filter_map(Record::id).collect();
        to.drain_ids(&moved_ids);
        to.extend(moved);
        tracing::info!(entity = %self.config.entity, count = moved_ids.len(), transition = transition.path(), "records moved");

        self.refresh_active()?;
        self.refresh_deleted()?;
        self.success(transition.success_many(), NOTICE);
        Ok(())
    }

    /// Ask for confirmation, then run the action. Returns whether it ran.
    pub fn request(&mut self, action: ConfirmAction) -> Result<bool, FlowError> {
        let (title, button) = action.prompt();
        if !self.ui.confirm(title, button) {
            tracing::debug!(action = ?action, "action declined");
            return Ok(false);
        }
        match action {
            ConfirmAction::DeleteOne(id) => self.delete_one(id)?,
            ConfirmAction::RestoreOne(id) => self.restore_one(id)?,
            ConfirmAction::DeleteSelected => self.delete_selected()?,
            ConfirmAction::RestoreSelected => self.restore_selected()?,
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Cart
    // -----------------------------------------------------------------------

    pub fn show_cart(&mut self) {
        if let Some(modal) = self.config.cart.as_ref().and_then(|cart| cart.modal.clone()) {
            self.ui.show_modal(&modal);
        }
    }

    pub fn add_to_cart(&mut self, selected: Option<i64>) -> Result<(), FlowError> {
        let result = self.try_add_to_cart(selected);
        self.finish(result)
    }

    fn try_add_to_cart(&mut self, selected: Option<i64>) -> Result<(), FlowError> {
        let relation = self
            .config
            .cart_relation()
            .cloned()
            .ok_or_else(|| FlowError::Unclassified("no cart relation configured".to_string()))?;
        let id = match selected {
            Some(id) => id,
            None => relation
                .select
                .as_deref()
                .and_then(|select| self.ui.value(select))
                .and_then(|raw| raw.trim().parse().ok())
                .unwrap_or(0),
        };
        let catalog = self.secondary.get(&relation.name).map(Vec::as_slice).unwrap_or(&[]);
        let amount = self.cart.add(id, catalog)?;
        tracing::debug!(id, amount, "cart line added");

        if let Some(modal) = self.config.cart.as_ref().and_then(|cart| cart.modal.clone()) {
            self.ui.hide_modal(&modal);
        }
        self.refresh_cart();
        self.success("Added successfully.", NOTICE_TOAST);
        Ok(())
    }

    pub fn remove_from_cart(&mut self, id: i64) {
        if self.cart.remove(id) {
            tracing::debug!(id, "cart line removed");
        }
        self.refresh_cart();
    }

    /// Set the amount of a cart line from the quantity input's raw text.
    pub fn set_cart_amount(&mut self, id: i64, raw: &str) -> Result<(), FlowError> {
        let result = self.cart.set_amount(id, raw).map(|_| ()).map_err(FlowError::from);
        // Re-render either way so a rejected input shows the reset amount.
        self.refresh_cart();
        self.finish(result)
    }

    pub fn save_cart(&mut self) -> Result<(), FlowError> {
        let result = self.try_submit_cart(CartSubmit::Save);
        self.finish(result)
    }

    pub fn update_cart(&mut self) -> Result<(), FlowError> {
        let result = self.try_submit_cart(CartSubmit::Update);
        self.finish(result)
    }

    fn try_submit_cart(&mut self, submit: CartSubmit) -> Result<(), FlowError> {
        self.validate_required("")?;
        let payload = Payload::Json(self.cart_payload()?);
        let endpoint = format!("{}/{}", self.config.write_endpoint(), submit.path());
        let (status, _) = self.post_envelope(&endpoint, &payload)?;
        if status != submit.expected_status() {
            return Err(FlowError::Rejected {
                status,
                message: submit.failure().to_string(),
            });
        }
        tracing::info!(entity = %self.config.entity, lines = self.cart.len(), "cart submitted");
        self.cart.clear();
        self.success(submit.success(), NOTICE_SHORT);
        let url = format!("{}/{}", self.config.app_url, self.config.write_endpoint());
        self.ui.navigate(&url, CART_REDIRECT_DELAY);
        Ok(())
    }

    /// Form fields, the cart lines under the configured key, and checkbox
    /// fields as 1/0.
    pub fn cart_payload(&self) -> Result<Value, FlowError> {
        let cart = self
            .config
            .cart
            .as_ref()
            .ok_or_else(|| FlowError::Unclassified("no cart configured".to_string()))?;
        let provisional = (!self.config.new_page_edit).then(|| self.active.next_id());
        let mut payload = self.assemble_record("", provisional);
        let lines = serde_json::to_value(self.cart.lines()).map_err(|e| TransportError::Encode(e.to_string()))?;
        payload.insert(cart.key.clone(), lines);
        for check in &cart.checks {
            payload.insert(check.clone(), i64::from(self.ui.checked(check)));
        }
        Ok(payload.into_value())
    }

    // -----------------------------------------------------------------------
    // Event dispatch
    // -----------------------------------------------------------------------

    /// Route a bound UI event to its flow.
    pub fn handle(&mut self, event: UiEvent) -> Result<(), FlowError> {
        match event {
            UiEvent::Save => self.insert(),
            UiEvent::Update => self.update(),
            UiEvent::Edit(id) => self.load_edit(id),
            UiEvent::Delete(id) => self.request(ConfirmAction::DeleteOne(id)).map(drop),
            UiEvent::Restore(id) => self.request(ConfirmAction::RestoreOne(id)).map(drop),
            UiEvent::DeleteSelected => self.request(ConfirmAction::DeleteSelected).map(drop),
            UiEvent::RestoreSelected => self.request(ConfirmAction::RestoreSelected).map(drop),
            UiEvent::ShowCart => {
                self.show_cart();
                Ok(())
            }
            UiEvent::AddToCart(id) => self.add_to_cart(id),
            UiEvent::RemoveFromCart(id) => {
                self.remove_from_cart(id);
                Ok(())
            }
            UiEvent::SetAmount { id, raw } => self.set_cart_amount(id, &raw),
            UiEvent::SaveCart => self.save_cart(),
            UiEvent::UpdateCart => self.update_cart(),
        }
    }

    // -----------------------------------------------------------------------
    // Forms
    // -----------------------------------------------------------------------

    fn edit_suffix(&self) -> String {
        if self.config.new_page_edit {
            String::new()
        } else {
            self.config.edit_suffix.clone()
        }
    }

    /// Stop at the first empty required input and flag it.
    fn validate_required(&mut self, suffix: &str) -> Result<(), ValidationError> {
        for field in &self.config.required {
            let input = format!("{field}{suffix}");
            let empty = self.ui.value(&input).map_or(true, |value| value.trim().is_empty());
            self.ui.mark_invalid(&input, empty);
            if empty {
                return Err(ValidationError::MissingField(input));
            }
        }
        Ok(())
    }

    fn assemble_record(&self, suffix: &str, provisional: Option<i64>) -> Record {
        let mut record = Record::new();
        for field in &self.config.selectors {
            let input = format!("{field}{suffix}");
            if self.ui.is_checkbox(&input) {
                record.insert(field.clone(), i64::from(self.ui.checked(&input)));
            } else {
                record.insert(field.clone(), self.ui.value(&input).unwrap_or_default());
            }
        }
        if let Some(id) = provisional {
            if record.id().is_none() {
                record = record.with_id(id);
            }
        }
        record
    }

    fn assemble_form(&self, suffix: &str) -> MultipartForm {
        let mut form = MultipartForm::new();
        for field in &self.config.image_fields {
            if let Some(file) = self.ui.file(&format!("{field}{suffix}")) {
                form.file(field.clone(), file);
            }
        }
        for field in &self.config.selectors {
            form.text(field.clone(), self.ui.value(&format!("{field}{suffix}")).unwrap_or_default());
        }
        form
    }

    fn build_payload(&self, suffix: &str, provisional: Option<i64>) -> Payload {
        if self.config.content_image {
            Payload::Form(self.assemble_form(suffix))
        } else {
            Payload::Json(self.assemble_record(suffix, provisional).into_value())
        }
    }

    fn fill_inputs(&mut self, record: &Record, suffix: &str) {
        for field in &self.config.selectors {
            let value = record.get_text(field).unwrap_or_default();
            self.ui.set_value(&format!("{field}{suffix}"), &value);
        }
    }

    fn clear_inputs(&mut self, suffix: &str) {
        for field in &self.config.selectors {
            self.ui.set_value(&format!("{field}{suffix}"), "");
        }
    }

    fn clear_image_inputs(&mut self, suffix: &str) {
        if !self.config.content_image {
            return;
        }
        for field in &self.config.image_fields {
            self.ui.clear_preview(&format!("{field}{suffix}"));
        }
    }

    fn preview_images(&mut self, record: &Record, suffix: &str) {
        if !self.config.content_image {
            return;
        }
        self.clear_image_inputs(suffix);
        for field in &self.config.image_fields {
            let url = self.config.image_url(&record.get_text(field).unwrap_or_default());
            self.ui.set_preview(&format!("{field}{suffix}"), &url);
        }
    }

    // -----------------------------------------------------------------------
    // Transport and reporting
    // -----------------------------------------------------------------------

    fn get_envelope(&mut self, endpoint: &str) -> Result<Envelope, FlowError> {
        self.ui.set_loading(true);
        let value = self.api.get(endpoint)?;
        self.ui.set_loading(false);
        let envelope: Envelope = serde_json::from_value(value).map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(envelope)
    }

    /// POST and read the envelope; returns the business status with it.
    fn post_envelope(&mut self, endpoint: &str, payload: &Payload) -> Result<(i64, Envelope), FlowError> {
        self.ui.set_loading(true);
        let response = self.api.post(endpoint, payload)?;
        self.ui.set_loading(false);
        let envelope: Envelope = response.json()?;
        Ok((envelope.status_or(response.status), envelope))
    }

    fn success(&mut self, message: &str, duration: Duration) {
        self.ui.notify(Severity::Success, message, duration);
    }

    fn finish<T>(&mut self, result: Result<T, FlowError>) -> Result<T, FlowError> {
        if let Err(err) = &result {
            self.report(err);
        }
        result
    }

    fn report(&mut self, err: &FlowError) {
        let entity = self.config.entity.as_str();
        let (severity, duration) = match err {
            FlowError::Validation(ValidationError::NoSelection) => {
                tracing::warn!(entity, error = %err, "validation failed");
                (Severity::Info, NOTICE_SHORT)
            }
            FlowError::Validation(_) => {
                tracing::warn!(entity, error = %err, "validation failed");
                (Severity::Error, NOTICE)
            }
            FlowError::Rejected { .. } => {
                tracing::warn!(entity, error = %err, "request rejected");
                (Severity::Error, NOTICE)
            }
            FlowError::Flatten(_) => {
                tracing::error!(entity, error = %err, "relation configuration error");
                (Severity::Error, NOTICE_ERROR)
            }
            FlowError::Transport(_) | FlowError::Unclassified(_) => {
                tracing::error!(entity, error = %err, "request failed");
                (Severity::Error, NOTICE_ERROR)
            }
        };
        self.ui.set_loading(false);
        self.ui.notify(severity, &err.user_message(), duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Delete,
    Restore,
}

impl Transition {
    fn path(self) -> &'static str {
        match self {
            Transition::Delete => "destroy",
            Transition::Restore => "restore",
        }
    }

    fn success_one(self) -> &'static str {
        match self {
            Transition::Delete => "Record deleted successfully.",
            Transition::Restore => "Record restored successfully.",
        }
    }

    fn failure_one(self) -> &'static str {
        match self {
            Transition::Delete => "Error deleting the record.",
            Transition::Restore => "Error restoring the record.",
        }
    }

    fn success_many(self) -> &'static str {
        match self {
            Transition::Delete => "Records deleted successfully.",
            Transition::Restore => "Records restored successfully.",
        }
    }

    fn failure_many(self) -> &'static str {
        match self {
            Transition::Delete => "Error deleting the records.",
            Transition::Restore => "Error restoring the records.",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum CartSubmit {
    Save,
    Update,
}

impl CartSubmit {
    fn path(self) -> &'static str {
        match self {
            CartSubmit::Save => "store",
            CartSubmit::Update => "update",
        }
    }

    fn expected_status(self) -> i64 {
        match self {
            CartSubmit::Save => 201,
            CartSubmit::Update => 200,
        }
    }

    fn success(self) -> &'static str {
        match self {
            CartSubmit::Save => "Record inserted successfully.",
            CartSubmit::Update => "Record updated successfully.",
        }
    }

    fn failure(self) -> &'static str {
        match self {
            CartSubmit::Save => "Error inserting the record.",
            CartSubmit::Update => "Error updating the record.",
        }
    }
}

fn foreign_id(record: &Record, foreign_key: Option<&str>) -> Option<i64> {
    record.get(foreign_key?).and_then(value_as_id)
}

/// The record to add after a confirmed insert: the server's copy when it
/// sent one, else what was submitted. A provisional id fills in a missing id.
fn inserted_record(envelope: &Envelope, payload: &Payload, provisional: Option<i64>) -> Record {
    let from_server = envelope
        .data
        .get("inserted_data")
        .cloned()
        .and_then(Record::from_value)
        .or_else(|| envelope.data_record());
    let mut record = match (from_server, payload) {
        (Some(record), _) => record,
        (None, Payload::Json(value)) => Record::from_value(value.clone()).unwrap_or_default(),
        (None, Payload::Form(_)) => Record::new(),
    };
    if record.id().is_none() {
        if let Some(id) = provisional {
            record = record.with_id(id);
        }
    }
    record
}

/// Ids the server confirmed: the ids in `data` when it is a list (records
/// or bare ids), else the ids that were requested.
fn confirmed_ids(envelope: &Envelope, requested: &[i64]) -> HashSet<i64> {
    match &envelope.data {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(map) => map.get("id").and_then(value_as_id),
                other => value_as_id(other),
            })
            .collect(),
        _ => requested.iter().copied().collect(),
    }
}

/// Cart line from a has-many pivot row: the nested item plus the pivot's
/// amount (else the item's, else 1).
fn pivot_line(row: &Value, many_name: &str) -> Option<CartLine> {
    let item = Record::from_value(row.get(many_name)?.clone())?;
    let amount = row
        .get("amount")
        .or_else(|| item.get("amount"))
        .and_then(value_as_id)
        .and_then(|amount| u32::try_from(amount).ok())
        .filter(|amount| *amount > 0)
        .unwrap_or(1);
    Some(CartLine::new(item, amount))
}
