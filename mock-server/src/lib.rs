//! In-memory soft-delete REST backend speaking the `{status, data}` envelope.
//!
//! Every entity name gets the same routes. Records are plain JSON objects;
//! ids are assigned here and never taken from the client.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub type Row = Map<String, Value>;

/// Active and soft-deleted rows of one entity.
#[derive(Clone, Debug, Default)]
pub struct EntityTable {
    pub active: Vec<Row>,
    pub deleted: Vec<Row>,
    next_id: i64,
}

impl EntityTable {
    /// Table holding `rows` as active records. Rows without an id get one.
    pub fn with_rows(rows: Vec<Value>) -> Self {
        let mut table = Self::default();
        for row in rows {
            let Value::Object(mut row) = row else {
                continue;
            };
            let id = match row_id(&row) {
                Some(id) => id,
                None => table.next_id + 1,
            };
            row.insert("id".to_string(), Value::from(id));
            table.next_id = table.next_id.max(id);
            table.active.push(row);
        }
        table
    }

    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn find_active_mut(&mut self, id: i64) -> Option<&mut Row> {
        self.active.iter_mut().find(|row| row_id(row) == Some(id))
    }

    fn has_name(&self, name: &Value) -> bool {
        self.active.iter().any(|row| row.get("name") == Some(name))
    }
}

pub type Db = Arc<RwLock<HashMap<String, EntityTable>>>;

/// Database pre-filled with `(entity, rows)` pairs.
pub fn seeded_db(seed: Vec<(&str, Vec<Value>)>) -> Db {
    let tables = seed
        .into_iter()
        .map(|(entity, rows)| (entity.to_string(), EntityTable::with_rows(rows)))
        .collect();
    Arc::new(RwLock::new(tables))
}

pub fn app() -> Router {
    app_with(Db::default())
}

pub fn app_with(db: Db) -> Router {
    Router::new()
        .route("/{entity}", get(list_active))
        .route("/{entity}/deletes", get(list_deleted))
        .route("/{entity}/edit/{id}", get(show_one))
        .route("/{entity}/store", post(store))
        .route("/{entity}/update", post(update))
        .route("/{entity}/destroy/ids", post(destroy_many))
        .route("/{entity}/restore/ids", post(restore_many))
        .route("/{entity}/destroy/{id}", get(destroy_one))
        .route("/{entity}/restore/{id}", get(restore_one))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, Db::default()).await
}

pub async fn run_with(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(db)).await
}

fn envelope(http: StatusCode, status: u16, data: Value) -> (StatusCode, Json<Value>) {
    (http, Json(json!({ "status": status, "data": data })))
}

fn rejection(status: u16, message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": status, "data": null, "message": message })),
    )
}

fn row_id(row: &Row) -> Option<i64> {
    match row.get("id")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Body of store/update: a JSON object or a multipart form. File parts are
/// recorded by file name.
pub struct Submission(pub Row);

impl<S> FromRequest<S> for Submission
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if !is_multipart {
            let Json(row) = Json::<Row>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return Ok(Submission(row));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let mut row = Row::new();
        while let Some(field) = multipart.next_field().await.map_err(IntoResponse::into_response)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let value = match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await.map_err(IntoResponse::into_response)?;
                    tracing::debug!(field = %name, file = %file_name, size = bytes.len(), "received upload");
                    file_name
                }
                None => field.text().await.map_err(IntoResponse::into_response)?,
            };
            row.insert(name, Value::String(value));
        }
        Ok(Submission(row))
    }
}

#[derive(Deserialize)]
pub struct IdList {
    pub data: Vec<Value>,
}

impl IdList {
    fn ids(&self) -> Vec<i64> {
        self.data
            .iter()
            .filter_map(|value| match value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .collect()
    }
}

async fn list_active(State(db): State<Db>, Path(entity): Path<String>) -> (StatusCode, Json<Value>) {
    let tables = db.read().await;
    let rows = tables.get(&entity).map(|t| t.active.clone()).unwrap_or_default();
    envelope(StatusCode::OK, 200, Value::from(rows))
}

async fn list_deleted(State(db): State<Db>, Path(entity): Path<String>) -> (StatusCode, Json<Value>) {
    let tables = db.read().await;
    let rows = tables.get(&entity).map(|t| t.deleted.clone()).unwrap_or_default();
    envelope(StatusCode::OK, 200, Value::from(rows))
}

async fn show_one(State(db): State<Db>, Path((entity, id)): Path<(String, i64)>) -> (StatusCode, Json<Value>) {
    let tables = db.read().await;
    let row = tables
        .get(&entity)
        .and_then(|t| t.active.iter().find(|row| row_id(row) == Some(id)).cloned());
    match row {
        Some(row) => envelope(StatusCode::OK, 200, Value::Object(row)),
        None => rejection(404, "Record not found."),
    }
}

async fn store(
    State(db): State<Db>,
    Path(entity): Path<String>,
    Submission(mut row): Submission,
) -> (StatusCode, Json<Value>) {
    let mut tables = db.write().await;
    let table = tables.entry(entity.clone()).or_default();
    if let Some(name) = row.get("name") {
        if table.has_name(name) {
            tracing::info!(entity = %entity, "duplicate record rejected");
            return rejection(400, "The record already exists.");
        }
    }
    let id = table.allocate_id();
    row.insert("id".to_string(), Value::from(id));
    table.active.push(row.clone());
    tracing::info!(entity = %entity, id, "record stored");
    (
        StatusCode::CREATED,
        Json(json!({ "status": 201, "data": { "inserted_data": row } })),
    )
}

async fn update(
    State(db): State<Db>,
    Path(entity): Path<String>,
    Submission(patch): Submission,
) -> (StatusCode, Json<Value>) {
    let Some(id) = row_id(&patch) else {
        return rejection(400, "Missing record id.");
    };
    let mut tables = db.write().await;
    let Some(row) = tables.get_mut(&entity).and_then(|t| t.find_active_mut(id)) else {
        return rejection(404, "Record not found.");
    };
    for (field, value) in patch {
        if field != "id" {
            row.insert(field, value);
        }
    }
    tracing::info!(entity = %entity, id, "record updated");
    envelope(StatusCode::OK, 200, Value::Object(row.clone()))
}

#[derive(Clone, Copy)]
enum Direction {
    Delete,
    Restore,
}

/// Move the rows with `ids` between the active and deleted lists, returning
/// the moved rows in request order.
fn move_rows(table: &mut EntityTable, ids: &[i64], direction: Direction) -> Vec<Row> {
    let (from, to) = match direction {
        Direction::Delete => (&mut table.active, &mut table.deleted),
        Direction::Restore => (&mut table.deleted, &mut table.active),
    };
    let mut moved = Vec::new();
    for id in ids {
        if let Some(pos) = from.iter().position(|row| row_id(row) == Some(*id)) {
            let row = from.remove(pos);
            to.push(row.clone());
            moved.push(row);
        }
    }
    moved
}

async fn move_one(db: Db, entity: String, id: i64, direction: Direction) -> (StatusCode, Json<Value>) {
    let mut tables = db.write().await;
    let table = tables.entry(entity.clone()).or_default();
    match move_rows(table, &[id], direction).pop() {
        Some(row) => {
            tracing::info!(entity = %entity, id, "record moved");
            envelope(StatusCode::OK, 200, Value::Object(row))
        }
        None => rejection(404, "Record not found."),
    }
}

async fn move_many(db: Db, entity: String, ids: Vec<i64>, direction: Direction) -> (StatusCode, Json<Value>) {
    let mut tables = db.write().await;
    let table = tables.entry(entity.clone()).or_default();
    let moved = move_rows(table, &ids, direction);
    tracing::info!(entity = %entity, requested = ids.len(), moved = moved.len(), "records moved");
    envelope(StatusCode::OK, 200, Value::from(moved))
}

async fn destroy_one(State(db): State<Db>, Path((entity, id)): Path<(String, i64)>) -> (StatusCode, Json<Value>) {
    move_one(db, entity, id, Direction::Delete).await
}

async fn restore_one(State(db): State<Db>, Path((entity, id)): Path<(String, i64)>) -> (StatusCode, Json<Value>) {
    move_one(db, entity, id, Direction::Restore).await
}

async fn destroy_many(
    State(db): State<Db>,
    Path(entity): Path<String>,
    Json(body): Json<IdList>,
) -> (StatusCode, Json<Value>) {
    move_many(db, entity, body.ids(), Direction::Delete).await
}

async fn restore_many(
    State(db): State<Db>,
    Path(entity): Path<String>,
    Json(body): Json<IdList>,
) -> (StatusCode, Json<Value>) {
    move_many(db, entity, body.ids(), Direction::Restore).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_rows_keep_their_ids() {
        let table = EntityTable::with_rows(vec![json!({"id": 4, "name": "a"}), json!({"name": "b"})]);
        assert_eq!(table.active.iter().filter_map(row_id).collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(table.next_id, 5);
    }

    #[test]
    fn allocated_ids_follow_the_seed() {
        let mut table = EntityTable::with_rows(vec![json!({"id": 7})]);
        assert_eq!(table.allocate_id(), 8);
        assert_eq!(table.allocate_id(), 9);
    }

    #[test]
    fn non_object_seed_rows_are_skipped() {
        let table = EntityTable::with_rows(vec![json!(3), json!({"id": 1})]);
        assert_eq!(table.active.len(), 1);
    }

    #[test]
    fn moving_keeps_request_order_and_skips_unknown_ids() {
        let mut table = EntityTable::with_rows(vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]);
        let moved = move_rows(&mut table, &[3, 9, 1], Direction::Delete);
        assert_eq!(moved.iter().filter_map(row_id).collect::<Vec<_>>(), vec![3, 1]);
        assert_eq!(table.active.iter().filter_map(row_id).collect::<Vec<_>>(), vec![2]);
        assert_eq!(table.deleted.len(), 2);

        let back = move_rows(&mut table, &[1], Direction::Restore);
        assert_eq!(back.len(), 1);
        assert_eq!(table.active.iter().filter_map(row_id).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn id_list_accepts_numbers_and_numeric_strings() {
        let body: IdList = serde_json::from_str(r#"{"data":[1,"2"," 3 ",null,"x"]}"#).unwrap();
        assert_eq!(body.ids(), vec![1, 2, 3]);
    }

    #[test]
    fn string_ids_are_read() {
        let row: Row = serde_json::from_str(r#"{"id":"12"}"#).unwrap();
        assert_eq!(row_id(&row), Some(12));
    }
}
