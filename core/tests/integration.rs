//! Controller flows against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `CrudHandler` over
//! real HTTP using a ureq-backed `HttpExecutor` and `MemoryUi`. Validates that
//! request building, envelope parsing and state bookkeeping agree with the
//! actual server.

use crud_core::ui::FormInputs;
use crud_core::{
    ApiClient, CartConfig, ConfirmAction, CrudHandler, EntityConfig, FilePart, FlowError, HttpExecutor,
    HttpMethod, HttpRequest, HttpResponse, MemoryUi, RelationSpec, Severity, TableKind, TransportError,
};
use mock_server::{seeded_db, Db};
use serde_json::{json, Value};

/// Executes requests with ureq.
///
/// Disables ureq's automatic status-code-as-error behavior so 4xx/5xx
/// responses are returned as data and the core decides what they mean.
struct UreqExecutor {
    agent: ureq::Agent,
}

impl UreqExecutor {
    fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl HttpExecutor for UreqExecutor {
    fn execute(&mut self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let result = match request.method {
            HttpMethod::Get => {
                let mut builder = self.agent.get(&request.url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()
            }
            HttpMethod::Post => {
                let mut builder = self.agent.post(&request.url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.send(request.body.as_deref().unwrap_or_default())
            }
        };
        let mut response = result.map_err(|err| TransportError::Network(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(|err| TransportError::Network(err.to_string()))?;
        Ok(HttpResponse::new(status, body))
    }
}

/// Start the mock server on a random port and return its base URL.
fn start_server(db: Db) -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run_with(listener, db).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn handler(base_url: &str, config: EntityConfig) -> CrudHandler<UreqExecutor, MemoryUi> {
    let api = ApiClient::new(base_url, UreqExecutor::new());
    CrudHandler::new(api, MemoryUi::new(), config).unwrap()
}

fn products_config() -> EntityConfig {
    let mut config = EntityConfig::new("products");
    config.table = Some("products-table".into());
    config.deleted_table = Some("products-deleted".into());
    config.modal = Some("products-modal".into());
    config.selectors = vec!["id".into(), "name".into(), "price".into()];
    config.required = vec!["name".into()];
    config
}

#[test]
fn product_lifecycle() {
    let base = start_server(seeded_db(vec![(
        "products",
        vec![json!({"id": 1, "name": "Chair", "price": 10}), json!({"id": 2, "name": "Desk", "price": 20})],
    )]));
    let mut h = handler(&base, products_config());

    // Step 1: initial load, newest first.
    h.init().unwrap();
    assert_eq!(h.ui().table_ids("products-table"), vec![2, 1]);
    assert!(h.deleted().is_empty());

    // Step 2: insert; the server assigns the id.
    h.ui_mut().set_input("name", "Lamp");
    h.ui_mut().set_input("price", "5");
    h.insert().unwrap();
    assert_eq!(h.active().ids(), vec![3, 2, 1]);
    assert_eq!(h.ui().value("name").as_deref(), Some(""));

    // Step 3: a duplicate name is rejected by the backend.
    h.ui_mut().set_input("name", "Lamp");
    let err = h.insert().unwrap_err();
    assert!(matches!(err, FlowError::Rejected { status: 400, .. }));
    assert_eq!(h.active().len(), 3);
    assert_eq!(h.ui().last_notification().unwrap().severity, Severity::Error);

    // Step 4: edit and update.
    h.load_edit(2).unwrap();
    assert_eq!(h.ui().value("id-edit").as_deref(), Some("2"));
    h.ui_mut().set_input("name-edit", "Desk XL");
    h.update().unwrap();
    assert_eq!(h.active().find(2).unwrap().get_text("name").as_deref(), Some("Desk XL"));
    assert!(!h.ui().open_modals.contains("products-modal"));

    // Step 5: delete one after confirming.
    assert!(h.request(ConfirmAction::DeleteOne(1)).unwrap());
    assert_eq!(h.active().ids(), vec![3, 2]);
    assert_eq!(h.deleted().ids(), vec![1]);

    // Step 6: bulk delete, then bulk restore part of it.
    h.ui_mut().select_rows("products-table", &[3, 2]);
    h.delete_selected().unwrap();
    assert!(h.active().is_empty());
    assert_eq!(h.deleted().ids(), vec![3, 2, 1]);

    h.ui_mut().select_rows("products-deleted", &[2]);
    h.restore_selected().unwrap();
    assert_eq!(h.active().ids(), vec![2]);
    assert_eq!(h.deleted().ids(), vec![3, 1]);

    // Step 7: restore one.
    h.restore_one(1).unwrap();
    assert_eq!(h.active().ids(), vec![2, 1]);

    // Step 8: a fresh controller sees the same server state.
    let mut fresh = handler(&base, products_config());
    fresh.init().unwrap();
    assert_eq!(fresh.active().ids(), vec![2, 1]);
    assert_eq!(fresh.deleted().ids(), vec![3]);
    assert_eq!(fresh.active().find(2).unwrap().get_text("name").as_deref(), Some("Desk XL"));
}

#[test]
fn image_upload_goes_through_multipart() {
    let base = start_server(Db::default());
    let mut config = products_config();
    config.content_image = true;
    config.image_fields = vec!["image".into()];
    config.app_url = "http://app.test".into();
    let mut h = handler(&base, config);
    h.init().unwrap();

    h.ui_mut().set_input("name", "Lamp");
    h.ui_mut()
        .files
        .insert("image".into(), FilePart::new("lamp.png", "image/png", b"\x89PNG".to_vec()));
    h.insert().unwrap();

    let record = h.active().find(1).unwrap();
    assert_eq!(record.get_text("image").as_deref(), Some("lamp.png"));
    assert_eq!(record.get_text("name").as_deref(), Some("Lamp"));
}

#[test]
fn secondary_table_flattens_related_fields() {
    let base = start_server(seeded_db(vec![
        ("clients", vec![json!({"id": 1, "name": "Ann"}), json!({"id": 2, "name": "Bob"})]),
        (
            "orders",
            vec![
                json!({"id": 1, "client_id": 2, "client": {"name": "Bob", "city": {"name": "Lima"}}}),
                json!({"id": 2, "client_id": 1}),
            ],
        ),
    ]));
    let mut config = EntityConfig::new("orders");
    config.table = Some("orders-table".into());
    config.selectors = vec!["id".into(), "client_id".into()];
    config.table_kind = TableKind::Secondary;
    let mut client = RelationSpec::new("client", &["name"]);
    client.rest_entity = Some("clients".into());
    client.select = Some("client-select".into());
    client.foreign_key = Some("client_id".into());
    client.with = vec![RelationSpec::new("city", &["name"])];
    config.relations = vec![client];

    let mut h = handler(&base, config);
    h.init().unwrap();

    let rows = &h.ui().tables["orders-table"];
    assert_eq!(rows.iter().filter_map(|r| r.id()).collect::<Vec<_>>(), vec![2, 1]);
    assert!(!rows[0].contains("client_name"));
    assert_eq!(rows[1].get_text("client_name").as_deref(), Some("Bob"));
    assert_eq!(rows[1].get_text("city_name").as_deref(), Some("Lima"));
    assert_eq!(h.secondary("client").map(<[_]>::len), Some(2));

    h.load_edit(1).unwrap();
    let (options, selected) = &h.ui().selects["client-select-edit"];
    assert_eq!(options.len(), 3);
    assert_eq!(*selected, Some(2));
}

fn cart_config(entity: &str) -> EntityConfig {
    let mut config = EntityConfig::new(entity);
    config.endpoint = Some("orders".into());
    config.selectors = vec!["id".into(), "client".into()];
    config.required = vec!["client".into()];
    config.app_url = "http://app.test".into();
    config.relations = vec![RelationSpec::new("products", &["name"])];
    config.cart = Some(CartConfig {
        key: "items".into(),
        staging_table: Some("staging".into()),
        checks: vec!["paid".into()],
        many_name: Some("product".into()),
        ..CartConfig::default()
    });
    config
}

fn catalog() -> Vec<Value> {
    vec![json!({"id": 10, "name": "Chair"}), json!({"id": 11, "name": "Desk"})]
}

#[test]
fn cart_is_saved_as_nested_payload() {
    let base = start_server(seeded_db(vec![("products", catalog()), ("orders", Vec::new())]));
    let mut h = handler(&base, cart_config("orders"));
    h.init().unwrap();

    h.add_to_cart(Some(10)).unwrap();
    h.add_to_cart(Some(10)).unwrap();
    h.add_to_cart(Some(11)).unwrap();
    assert!(h.set_cart_amount(11, "0").is_err());
    assert_eq!(h.cart().get(11).unwrap().amount, 1);

    h.ui_mut().set_input("client", "Ann");
    h.ui_mut().set_checkbox("paid", true);
    h.save_cart().unwrap();
    assert!(h.cart().is_empty());
    assert_eq!(h.ui().navigations.len(), 1);

    let mut fresh = handler(&base, cart_config("orders"));
    fresh.init().unwrap();
    let order = &fresh.active().rows()[0];
    assert_eq!(order.get("paid"), Some(&json!(1)));
    assert_eq!(
        order.get("items"),
        Some(&json!([
            {"id": 10, "name": "Chair", "amount": 2},
            {"id": 11, "name": "Desk", "amount": 1}
        ]))
    );
}

#[test]
fn edit_page_reloads_and_updates_cart() {
    let base = start_server(seeded_db(vec![
        ("products", catalog()),
        (
            "orders",
            vec![json!({
                "id": 1,
                "client": "Ann",
                "products": [{"amount": 4, "product": {"id": 11, "name": "Desk"}}]
            })],
        ),
    ]));
    let mut config = cart_config("orders/edit/1");
    config.new_page_edit = true;
    config.has_many = true;
    let mut h = handler(&base, config);
    h.init().unwrap();

    assert_eq!(h.ui().value("id").as_deref(), Some("1"));
    assert_eq!(h.cart().get(11).unwrap().amount, 4);

    h.add_to_cart(Some(10)).unwrap();
    h.update_cart().unwrap();
    assert_eq!(
        h.ui().navigations,
        vec![("http://app.test/orders".to_string(), std::time::Duration::from_millis(1100))]
    );

    let mut list = handler(&base, cart_config("orders"));
    list.init().unwrap();
    let items = list.active().find(1).unwrap().get("items").cloned().unwrap();
    assert_eq!(items.as_array().map(Vec::len), Some(2));
}

#[test]
fn unreachable_server_is_a_network_error() {
    let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let mut h = handler(&format!("http://127.0.0.1:{port}"), products_config());

    let err = h.init().unwrap_err();
    assert!(matches!(err, FlowError::Transport(TransportError::Network(_))));
    assert!(h.ui().last_notification().unwrap().message.starts_with("Network error"));
}
