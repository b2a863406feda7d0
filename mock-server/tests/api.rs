use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with, seeded_db};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn get_request(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn ids(value: &Value) -> Vec<i64> {
    value.as_array().unwrap().iter().filter_map(|row| row["id"].as_i64()).collect()
}

// --- list ---

#[tokio::test]
async fn list_unknown_entity_is_empty() {
    let resp = app().oneshot(get_request("/products")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], 200);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn list_returns_seeded_rows() {
    let db = seeded_db(vec![("products", vec![json!({"id": 1, "name": "Chair"}), json!({"id": 2, "name": "Desk"})])]);
    let resp = app_with(db).oneshot(get_request("/products")).await.unwrap();

    let body = body_json(resp).await;
    assert_eq!(ids(&body["data"]), vec![1, 2]);
}

// --- store ---

#[tokio::test]
async fn store_assigns_server_id() {
    let db = seeded_db(vec![("products", vec![json!({"id": 3, "name": "Chair"})])]);
    let resp = app_with(db)
        .oneshot(json_request("/products/store", r#"{"id":99,"name":"Desk"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["status"], 201);
    assert_eq!(body["data"]["inserted_data"], json!({"id": 4, "name": "Desk"}));
}

#[tokio::test]
async fn store_duplicate_name_is_rejected_in_envelope() {
    let db = seeded_db(vec![("products", vec![json!({"id": 1, "name": "Chair"})])]);
    let resp = app_with(db.clone())
        .oneshot(json_request("/products/store", r#"{"name":"Chair"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], 400);
    assert_eq!(db.read().await["products"].active.len(), 1);
}

#[tokio::test]
async fn store_accepts_multipart_and_keeps_file_names() {
    let boundary = "XBOUNDARY";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"image\"; filename=\"lamp.png\"\r\n\
         Content-Type: image/png\r\n\r\n\
         PNGDATA\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"name\"\r\n\r\n\
         Lamp\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/products/store")
        .header(http::header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(body)
        .unwrap();
    let resp = app().oneshot(request).await.unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["inserted_data"], json!({"id": 1, "name": "Lamp", "image": "lamp.png"}));
}

#[tokio::test]
async fn store_malformed_json_is_rejected() {
    let resp = app().oneshot(json_request("/products/store", "[1,2]")).await.unwrap();
    assert!(resp.status().is_client_error());
}

// --- update ---

#[tokio::test]
async fn update_unknown_id_reports_404() {
    let resp = app()
        .oneshot(json_request("/products/update", r#"{"id":8,"name":"x"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], 404);
}

#[tokio::test]
async fn update_merges_fields() {
    let db = seeded_db(vec![("products", vec![json!({"id": 1, "name": "Chair", "price": 10})])]);
    let resp = app_with(db)
        .oneshot(json_request("/products/update", r#"{"id":"1","price":12}"#))
        .await
        .unwrap();

    let body = body_json(resp).await;
    assert_eq!(body["status"], 200);
    assert_eq!(body["data"], json!({"id": 1, "name": "Chair", "price": 12}));
}

// --- delete / restore ---

#[tokio::test]
async fn destroy_unknown_id_reports_404() {
    let resp = app().oneshot(get_request("/products/destroy/5")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], 404);
}

#[tokio::test]
async fn destroy_bad_id_returns_400() {
    let resp = app().oneshot(get_request("/products/destroy/abc")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bulk_destroy_returns_moved_rows() {
    let db = seeded_db(vec![("products", vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})])]);
    let resp = app_with(db.clone())
        .oneshot(json_request("/products/destroy/ids", r#"{"data":[3,1,42]}"#))
        .await
        .unwrap();

    let body = body_json(resp).await;
    assert_eq!(body["status"], 200);
    assert_eq!(ids(&body["data"]), vec![3, 1]);

    let resp = app_with(db).oneshot(get_request("/products/deletes")).await.unwrap();
    assert_eq!(ids(&body_json(resp).await["data"]), vec![3, 1]);
}

#[tokio::test]
async fn bulk_without_data_field_is_rejected() {
    let resp = app()
        .oneshot(json_request("/products/restore/ids", r#"{"ids":[1]}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- full lifecycle ---

#[tokio::test]
async fn crud_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // store
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("/clients/store", r#"{"name":"Ann"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = body_json(resp).await["data"]["inserted_data"]["id"].as_i64().unwrap();

    // edit page lookup
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request(&format!("/clients/edit/{id}")))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["data"]["name"], "Ann");

    // delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request(&format!("/clients/destroy/{id}")))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["status"], 200);
    assert_eq!(body["data"]["id"], id);

    // active list is now empty
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request("/clients"))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["data"], json!([]));

    // restore
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request(&format!("/clients/restore/{id}")))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["status"], 200);

    // deleted list is empty again
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request("/clients/deletes"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_bytes(resp).await;
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["data"], json!([]));
}
