//! Relation flattening: copy fields of related sub-objects onto the primary
//! record so a table widget can show them as plain columns.
//!
//! # Design
//! `flatten_record` never mutates its input. For each relation, in order, it
//! writes the relation's own fields, flattens the sub-object through the
//! nested relations, runs the row decorator, then lifts the nested results up
//! onto the primary record. The decorator runs between the writes and the
//! lift because it reads columns (image fields in particular) written by the
//! step just before it.

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::{EntityConfig, RelationSpec};
use crate::error::FlattenError;
use crate::types::Record;

/// Maximum number of preview images attached to a row.
const MAX_PREVIEWS: usize = 3;

/// Controls rendered in a row's `actions` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowAction {
    Edit,
    Delete,
    Restore,
    Add,
    Remove,
}

/// Which controls a table offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSet {
    /// Live records: edit and delete.
    Active,
    /// Soft-deleted records: restore.
    Deleted,
    /// Related items that can be staged in the cart.
    CartCatalog,
    /// Staged cart lines: remove, plus an amount input.
    CartStaging,
}

impl ActionSet {
    pub fn actions(self) -> &'static [RowAction] {
        match self {
            ActionSet::Active => &[RowAction::Edit, RowAction::Delete],
            ActionSet::Deleted => &[RowAction::Restore],
            ActionSet::CartCatalog => &[RowAction::Add],
            ActionSet::CartStaging => &[RowAction::Remove],
        }
    }
}

/// Computes the display-only columns of a row: `actions` and, when images
/// are enabled, `image_index`.
#[derive(Debug, Clone)]
pub struct RowDecorator {
    actions: ActionSet,
    image_fields: Vec<String>,
    image_base: String,
    fallback: String,
}

impl RowDecorator {
    pub fn new(actions: ActionSet) -> Self {
        Self {
            actions,
            image_fields: Vec::new(),
            image_base: String::new(),
            fallback: String::new(),
        }
    }

    /// Attach previews built from `fields`; `base` is the directory URL.
    pub fn with_images(mut self, fields: &[String], base: impl Into<String>, fallback: impl Into<String>) -> Self {
        self.image_fields = fields.to_vec();
        self.image_base = base.into();
        self.fallback = fallback.into();
        self
    }

    pub fn for_config(config: &EntityConfig, actions: ActionSet) -> Self {
        let decorator = Self::new(actions);
        if config.content_image {
            decorator.with_images(&config.image_fields, config.image_url(""), config.missing_image_url())
        } else {
            decorator
        }
    }

    pub fn decorate(&self, record: &mut Record) {
        let id = record.id();
        let actions: Vec<Value> = self
            .actions
            .actions()
            .iter()
            .map(|action| json!({ "action": action, "id": id }))
            .collect();
        record.insert("actions", actions);

        if self.actions == ActionSet::CartStaging {
            let amount = record.get("amount").cloned().unwrap_or(Value::from(1));
            record.insert("amount_input", json!({ "id": id, "value": amount }));
        }

        if !self.image_fields.is_empty() {
            let previews: Vec<Value> = self
                .image_fields
                .iter()
                .take(MAX_PREVIEWS)
                .map(|field| {
                    let file = record.get_text(field).unwrap_or_default();
                    json!({ "src": format!("{}{}", self.image_base, file), "fallback": self.fallback })
                })
                .collect();
            record.insert("image_index", previews);
        }
    }
}

/// Flatten one record through `relations`, decorating it for display.
pub fn flatten_record(
    record: &Record,
    relations: &[RelationSpec],
    decorator: &RowDecorator,
) -> Result<Record, FlattenError> {
    flatten_with(record, relations, Some(decorator))
}

/// Flatten every row and order the result descending by id.
pub fn flatten_rows(
    rows: &[Record],
    relations: &[RelationSpec],
    decorator: &RowDecorator,
) -> Result<Vec<Record>, FlattenError> {
    let mut flat = rows
        .iter()
        .map(|row| flatten_record(row, relations, decorator))
        .collect::<Result<Vec<_>, _>>()?;
    sort_desc(&mut flat);
    Ok(flat)
}

/// Decorate rows without relation handling, ordered descending by id.
pub fn decorate_rows(rows: &[Record], decorator: &RowDecorator) -> Vec<Record> {
    let mut out: Vec<Record> = rows
        .iter()
        .map(|row| {
            let mut row = row.clone();
            decorator.decorate(&mut row);
            row
        })
        .collect();
    sort_desc(&mut out);
    out
}

fn sort_desc(rows: &mut [Record]) {
    rows.sort_by(|a, b| b.id().cmp(&a.id()));
}

fn flatten_with(
    record: &Record,
    relations: &[RelationSpec],
    decorator: Option<&RowDecorator>,
) -> Result<Record, FlattenError> {
    let mut out = record.clone();
    if relations.is_empty() {
        if let Some(decorator) = decorator {
            decorator.decorate(&mut out);
        }
        return Ok(out);
    }

    for relation in relations {
        let sub = sub_object(&out, relation)?;
        let prefix = relation.field_prefix();

        if let Some(sub) = &sub {
            for field in &relation.fields {
                if let Some(value) = sub.get(field) {
                    out.insert(destination(relation, &prefix, field), value.clone());
                }
            }
        }

        let flat_sub = match &sub {
            Some(sub) if !relation.with.is_empty() => Some(flatten_with(sub, &relation.with, None)?),
            _ => None,
        };

        if let Some(decorator) = decorator {
            decorator.decorate(&mut out);
        }

        if let Some(flat_sub) = flat_sub {
            lift_nested(&mut out, relation, &flat_sub);
        }
    }
    Ok(out)
}

/// The relation's sub-object; `None` when absent, an error when it is not an object.
fn sub_object(record: &Record, relation: &RelationSpec) -> Result<Option<Record>, FlattenError> {
    match record.get(&relation.name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(Record::from(map.clone()))),
        Some(_) => {
            tracing::error!(relation = %relation.name, "relation value is not an object");
            Err(FlattenError::NotAnObject {
                relation: relation.name.clone(),
            })
        }
    }
}

fn destination(relation: &RelationSpec, prefix: &str, field: &str) -> String {
    let mut name = prefix.to_string();
    if field.contains("image") {
        if let Some(tag) = &relation.image_tag {
            name.push_str(tag);
            name.push('_');
        }
    }
    name.push_str(field);
    name
}

/// Copy nested relation objects and their flattened columns from the
/// flattened sub-object onto the primary record.
fn lift_nested(out: &mut Record, relation: &RelationSpec, flat_sub: &Record) {
    for nested in &relation.with {
        if let Some(value) = flat_sub.get(&nested.name) {
            out.insert(nested.name.clone(), value.clone());
        }
        let source_prefix = nested.field_prefix();
        let target_prefix = match relation.prefix.as_deref() {
            Some("") => String::new(),
            Some(prefix) => format!("{prefix}_"),
            None => format!("{}_", nested.name),
        };
        for field in &nested.fields {
            let source = destination(nested, &source_prefix, field);
            if let Some(value) = flat_sub.get(&source) {
                out.insert(destination(nested, &target_prefix, field), value.clone());
            }
        }
    }
}
