//! Headless CRUD controller for REST-backed entity tables.
//!
//! # Overview
//! A `CrudHandler` owns one entity's active and deleted records, the lists
//! of its related entities and a staging cart. It talks to the backend
//! through an `ApiClient` and pushes everything it wants shown into a `Ui`.
//!
//! # Design
//! - The core never touches the network (host-does-IO pattern). `ApiClient`
//!   builds `HttpRequest` values and an `HttpExecutor` supplied by the caller
//!   performs the round trip, which keeps the controller deterministic.
//! - Widgets are traits (`TableWidget`, `Notifier`, `FormInputs`, ...), so
//!   the controller can run against `MemoryUi` in tests and against a real
//!   page elsewhere.
//! - Local state changes only after the server confirms an operation.
//! - Wire types are defined independently from the mock-server crate;
//!   integration tests catch schema drift.

pub mod cart;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod flatten;
pub mod http;
pub mod multipart;
pub mod records;
pub mod types;
pub mod ui;

pub use cart::{Cart, CartLine};
pub use client::{ApiClient, Payload};
pub use config::{CartConfig, DetailConfig, EntityConfig, RelationSpec, StatusPolicy, TableKind};
pub use controller::{ConfirmAction, CrudHandler, DetailView, UiEvent};
pub use error::{ConfigError, FlattenError, FlowError, TransportError, ValidationError};
pub use http::{HttpExecutor, HttpMethod, HttpRequest, HttpResponse};
pub use multipart::{FilePart, MultipartForm};
pub use records::RecordSet;
pub use types::{Envelope, Record, SelectOption};
pub use ui::{MemoryUi, Notification, Severity, Ui};
