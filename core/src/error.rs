//! Error taxonomy for the transport and the entity controller.
//!
//! # Design
//! Transport failures (network or non-2xx) and business rejections (a 2xx
//! response whose envelope carries a failure status) are distinct variants
//! because the user sees different messages for them. Validation errors are
//! raised before any request is issued. Every flow converts its error into a
//! notification at the flow boundary, so `FlowError` is what a caller sees
//! after the user has already been told.

use thiserror::Error;

/// Failures raised by `ApiClient` and `HttpExecutor` implementations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The round trip itself failed (DNS, connection refused, reset, ...).
    #[error("network failure: {0}")]
    Network(String),

    /// The server answered outside the 2xx range.
    #[error("HTTP error! status: {status}")]
    Status { status: u16, body: String },

    /// The request was aborted before a response arrived.
    #[error("request cancelled")]
    Cancelled,

    /// The request payload could not be serialized.
    #[error("serialization failed: {0}")]
    Encode(String),

    /// The response body could not be parsed as the expected JSON.
    #[error("deserialization failed: {0}")]
    Decode(String),
}

/// Input problems detected locally, before anything goes over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("required field `{0}` is empty")]
    MissingField(String),

    #[error("amount must be a positive integer, got `{0}`")]
    NonPositiveAmount(String),

    #[error("no item selected")]
    NoSelection,

    #[error("item {0} is not in the related list")]
    UnknownItem(i64),

    #[error("item {0} is not in the cart")]
    UnknownCartLine(i64),
}

/// Malformed relation configuration met while flattening a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlattenError {
    #[error("relation `{relation}` does not hold an object")]
    NotAnObject { relation: String },
}

/// Problems in an `EntityConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config load: {0}")]
    Load(#[from] serde_json::Error),

    #[error("entity name is empty")]
    EmptyEntity,

    #[error("required field `{0}` is not one of the selectors")]
    UnknownRequired(String),

    #[error("cart configured without a relation to draw items from")]
    CartWithoutRelation,

    #[error("relation at position {0} has an empty name")]
    EmptyRelationName(usize),
}

/// Outcome of a failed controller flow.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The transport succeeded but the envelope reported a failure status.
    #[error("server rejected the request with status {status}")]
    Rejected { status: i64, message: String },

    #[error(transparent)]
    Flatten(#[from] FlattenError),

    #[error("{0}")]
    Unclassified(String),
}

impl FlowError {
    /// Text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            FlowError::Transport(TransportError::Network(_)) => {
                "Network error. Please check your internet connection.".to_string()
            }
            FlowError::Transport(TransportError::Cancelled) => {
                "The request was cancelled.".to_string()
            }
            FlowError::Validation(ValidationError::NonPositiveAmount(_)) => {
                "Values less than or equal to 0 are not allowed.".to_string()
            }
            FlowError::Validation(ValidationError::NoSelection) => {
                "You must select an item.".to_string()
            }
            FlowError::Validation(ValidationError::MissingField(field)) => {
                format!("The field `{field}` is required.")
            }
            FlowError::Rejected { message, .. } => message.clone(),
            FlowError::Flatten(_) => "Error while loading related data into the table.".to_string(),
            _ => "Request error, please check the data.".to_string(),
        }
    }
}
