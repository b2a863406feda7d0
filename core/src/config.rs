//! Typed per-entity configuration.
//!
//! Every optional field has an explicit default so a minimal JSON document
//! such as `{"entity": "products"}` is a complete configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How rows are prepared before they reach the table widget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    /// Plain rows with an actions column.
    Independent,
    /// Rows flattened through the relation specs; related lists are loaded.
    Secondary,
    #[default]
    Default,
}

/// Handling of insert responses whose business status is neither 201 nor a
/// known failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPolicy {
    /// Only 201 is a successful insert.
    #[default]
    Strict,
    /// Anything but 400 and 500 is a successful insert.
    Permissive,
}

/// How fields of a related sub-object are copied onto a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationSpec {
    /// Key of the sub-object on the primary record, and the related entity name.
    pub name: String,
    /// Fields of the sub-object to copy.
    pub fields: Vec<String>,
    /// Destination prefix; `None` uses `name`, `Some("")` copies unprefixed.
    pub prefix: Option<String>,
    /// Extra segment inserted for fields containing `image`.
    pub image_tag: Option<String>,
    /// Relations nested inside the sub-object.
    pub with: Vec<RelationSpec>,
    /// Field of the primary record holding the related id.
    pub foreign_key: Option<String>,
    /// Select widget listing the related entity.
    pub select: Option<String>,
    /// Endpoint of the related list when it differs from `name`.
    pub rest_entity: Option<String>,
}

impl RelationSpec {
    pub fn new(name: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            name: name.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn endpoint(&self) -> &str {
        self.rest_entity.as_deref().unwrap_or(&self.name)
    }

    /// Prefix written in front of copied field names, including the `_`.
    pub fn field_prefix(&self) -> String {
        match self.prefix.as_deref() {
            Some("") => String::new(),
            Some(prefix) => format!("{prefix}_"),
            None => format!("{}_", self.name),
        }
    }
}

/// Staging list of related items assembled into a nested payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartConfig {
    /// Payload key the cart lines are placed under.
    pub key: String,
    /// Table listing the related items that can be added.
    pub catalog_table: Option<String>,
    /// Table listing the staged lines.
    pub staging_table: Option<String>,
    /// Modal hosting the catalog.
    pub modal: Option<String>,
    /// Checkbox inputs sent as 1/0.
    pub checks: Vec<String>,
    /// On a has-many edit page, the key of the item inside each pivot row.
    pub many_name: Option<String>,
}

/// Expandable detail shown under a row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailConfig {
    /// Key of the nested object the detail is read from.
    pub attribute: String,
    pub title: String,
    pub headers: Vec<String>,
    pub attributes: Vec<String>,
    pub images: Vec<String>,
}

fn default_edit_suffix() -> String {
    "-edit".to_string()
}

fn default_missing_image() -> String {
    "does_not_exist.avif".to_string()
}

/// Configuration of one `CrudHandler`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub entity: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub deleted_table: Option<String>,
    #[serde(default)]
    pub modal: Option<String>,
    #[serde(default)]
    pub selectors: Vec<String>,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default = "default_edit_suffix")]
    pub edit_suffix: String,
    #[serde(default)]
    pub relations: Vec<RelationSpec>,
    #[serde(default)]
    pub image_fields: Vec<String>,
    #[serde(default)]
    pub content_image: bool,
    #[serde(default)]
    pub new_page_edit: bool,
    #[serde(default)]
    pub has_many: bool,
    #[serde(default)]
    pub table_kind: TableKind,
    #[serde(default)]
    pub cart: Option<CartConfig>,
    #[serde(default)]
    pub detail: Option<DetailConfig>,
    #[serde(default)]
    pub app_url: String,
    #[serde(default = "default_missing_image")]
    pub missing_image: String,
    #[serde(default)]
    pub status_policy: StatusPolicy,
}

impl EntityConfig {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            endpoint: None,
            table: None,
            deleted_table: None,
            modal: None,
            selectors: Vec::new(),
            required: Vec::new(),
            edit_suffix: default_edit_suffix(),
            relations: Vec::new(),
            image_fields: Vec::new(),
            content_image: false,
            new_page_edit: false,
            has_many: false,
            table_kind: TableKind::Default,
            cart: None,
            detail: None,
            app_url: String::new(),
            missing_image: default_missing_image(),
            status_policy: StatusPolicy::Strict,
        }
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: EntityConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entity.trim().is_empty() {
            return Err(ConfigError::EmptyEntity);
        }
        if let Some(field) = self.required.iter().find(|f| !self.selectors.contains(*f)) {
            return Err(ConfigError::UnknownRequired(field.clone()));
        }
        if self.cart.is_some() && self.relations.is_empty() {
            return Err(ConfigError::CartWithoutRelation);
        }
        if let Some(pos) = self.relations.iter().position(|r| r.name.is_empty()) {
            return Err(ConfigError::EmptyRelationName(pos));
        }
        Ok(())
    }

    /// Endpoint used for store and update.
    pub fn write_endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(&self.entity)
    }

    pub fn image_url(&self, file: &str) -> String {
        format!("{}/assets/images/{}", self.app_url, file)
    }

    pub fn missing_image_url(&self) -> String {
        self.image_url(&self.missing_image)
    }

    /// Relation the cart draws its items from.
    pub fn cart_relation(&self) -> Option<&RelationSpec> {
        self.relations.first()
    }
}
