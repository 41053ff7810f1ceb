use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rust_decimal::Decimal;
use serde_json::{Value, json};

use storefront_cart::{CartLedger, FileCartStore, LinePatch};
use storefront_checkout::{
    CheckoutError, CheckoutOptions, CheckoutOrchestrator, CheckoutPhase, OperatorResolver,
    PaymentMethod, filter_customers,
};
use storefront_client::{ApiClient, ApiError, ClientConfig, LoginRequest, Session};
use storefront_core::EmployeeId;

#[derive(Debug, Clone)]
struct Seen {
    path: &'static str,
    authorization: Option<String>,
    body: Option<Value>,
}

/// Scripted stand-in for the storefront backend.
#[derive(Clone)]
struct Backend {
    seen: Arc<Mutex<Vec<Seen>>>,
    invoice_reply: Arc<Mutex<(StatusCode, Value)>>,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            seen: Arc::default(),
            invoice_reply: Arc::new(Mutex::new((
                StatusCode::CREATED,
                json!({ "numeroFactura": "FAC-0001" }),
            ))),
        }
    }
}

impl Backend {
    fn record(&self, path: &'static str, headers: &HeaderMap, body: Option<Value>) {
        let authorization = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.seen.lock().unwrap().push(Seen {
            path,
            authorization,
            body,
        });
    }

    fn reply_to_invoices(&self, status: StatusCode, body: Value) {
        *self.invoice_reply.lock().unwrap() = (status, body);
    }

    fn last(&self, path: &str) -> Option<Seen> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.path == path)
            .cloned()
    }

    fn count(&self, path: &str) -> usize {
        self.seen.lock().unwrap().iter().filter(|s| s.path == path).count()
    }
}

async fn productos(State(backend): State<Backend>, headers: HeaderMap) -> Json<Value> {
    backend.record("/productos", &headers, None);
    Json(json!({
        "success": true,
        "productos": [
            { "id": 1, "codigo": "ARZ-01", "nombre": "Arroz 500g", "precioVenta": 4200, "stock": 30 },
            { "id": 2, "codigo": "LCH-01", "nombre": "Leche 1L", "precioVenta": 3900, "stock": 12 }
        ],
        "total": 2,
        "schemaName": "empresa_1"
    }))
}

async fn clientes(State(backend): State<Backend>, headers: HeaderMap) -> Json<Value> {
    backend.record("/clientes", &headers, None);
    Json(json!({
        "data": [
            { "id": 10, "nombre": "Ana", "apellido": "Gómez", "cedula": "1020304050", "telefono": "3001112233" },
            { "id": 11, "nombre": "Luis", "apellido": "Pérez", "documento": "79888777" }
        ]
    }))
}

async fn facturas(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    backend.record("/facturas", &headers, Some(body));
    let (status, reply) = backend.invoice_reply.lock().unwrap().clone();
    (status, Json(reply))
}

async fn login(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    backend.record("/auth/login", &headers, Some(body));
    Json(json!({
        "token": mint_jwt(json!({ "sub": "caja1", "empleadoId": 17 })),
        "empleadoId": 17,
        "usuario": "caja1",
        "rol": "CAJERO",
        "nombre": "Laura",
        "apellido": "Mejía",
        "cargo": "Cajera"
    }))
}

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(backend: Backend) -> Self {
        storefront_observability::init();

        let app = Router::new()
            .route("/api/productos", get(productos))
            .route("/api/clientes", get(clientes))
            .route("/api/facturas", post(facturas))
            .route("/api/auth/login", post(login))
            .with_state(backend);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}/api", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn config(&self, data_dir: &Path) -> ClientConfig {
        ClientConfig {
            api_url: self.base_url.clone(),
            timeout: Duration::from_secs(5),
            data_dir: data_dir.to_path_buf(),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(claims: Value) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(b"backend-secret"),
    )
    .expect("failed to encode jwt")
}

fn live_token(employee_id: i64) -> String {
    let exp = (Utc::now() + ChronoDuration::minutes(10)).timestamp();
    mint_jwt(json!({ "sub": "caja1", "empleadoId": employee_id, "exp": exp }))
}

#[tokio::test]
async fn listings_are_normalised_and_authenticated() {
    let backend = Backend::default();
    let server = TestServer::spawn(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let token = live_token(17);
    let client = ApiClient::new(&server.config(dir.path()), Session::with_token(token.clone())).unwrap();

    let products = client.list_products().await.unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0].code, "ARZ-01");
    assert_eq!(products[1].stock, Some(12));

    let customers = client.list_customers().await.unwrap();
    assert_eq!(customers[0].document_id, "1020304050");
    assert_eq!(customers[1].document_id, "79888777");

    let expected = format!("Bearer {token}");
    assert_eq!(
        backend.last("/productos").unwrap().authorization.as_deref(),
        Some(expected.as_str())
    );
    assert_eq!(
        backend.last("/clientes").unwrap().authorization.as_deref(),
        Some(expected.as_str())
    );
}

#[tokio::test]
async fn login_never_sends_a_bearer_and_starts_the_session() {
    let backend = Backend::default();
    let server = TestServer::spawn(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let session = Session::with_token(live_token(1));
    let client = ApiClient::new(&server.config(dir.path()), session.clone()).unwrap();

    let response = client
        .login(&LoginRequest {
            usuario: "caja1".to_string(),
            password: "secreto".to_string(),
            tenant_key: "empresa-1".to_string(),
        })
        .await
        .unwrap();

    let seen = backend.last("/auth/login").unwrap();
    assert_eq!(seen.authorization, None);
    assert_eq!(seen.body.unwrap()["tenantKey"], "empresa-1");
    assert_eq!(session.token(), Some(response.token));
    assert_eq!(session.employee_id(), Some(EmployeeId::new(17)));
    assert_eq!(session.employee_name(), "Laura Mejía");
}

#[tokio::test]
async fn expired_token_is_not_sent() {
    let backend = Backend::default();
    let server = TestServer::spawn(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let exp = (Utc::now() - ChronoDuration::minutes(1)).timestamp();
    let session = Session::with_token(mint_jwt(json!({ "exp": exp })));
    let client = ApiClient::new(&server.config(dir.path()), session.clone()).unwrap();

    client.list_products().await.unwrap();

    assert_eq!(backend.last("/productos").unwrap().authorization, None);
    assert_eq!(session.token(), None);
}

#[tokio::test]
async fn checkout_posts_invoice_and_clears_persisted_cart() {
    let backend = Backend::default();
    backend.reply_to_invoices(
        StatusCode::CREATED,
        json!({ "factura": { "numeroFactura": "FAC-2024-0007" } }),
    );
    let server = TestServer::spawn(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let token = live_token(17);
    let session = Session::with_token(token.clone());
    let client = Arc::new(ApiClient::new(&server.config(dir.path()), session.clone()).unwrap());

    let products = client.list_products().await.unwrap();
    let customers = client.list_customers().await.unwrap();

    let store = Arc::new(FileCartStore::new(dir.path()));
    let mut cart = CartLedger::new(store.clone());
    cart.add_or_increment(&products[0]);
    cart.add_or_increment(&products[0]);
    cart.add_or_increment(&products[1]);
    cart.update_line(products[1].id, LinePatch::discount(Decimal::new(10, 0)));
    assert!(store.path().exists());
    let cart = Arc::new(tokio::sync::Mutex::new(cart));

    let checkout = CheckoutOrchestrator::new(cart.clone(), client.clone(), Arc::new(session.clone()));
    checkout.set_options(
        CheckoutOptions::default()
            .with_payment_method(PaymentMethod::Card)
            .with_notes("venta mostrador"),
    );
    checkout.begin_checkout().await.unwrap();
    let customer = filter_customers(&customers, "gómez")[0].clone();
    checkout.select_counterparty(customer).unwrap();

    let confirmation = checkout.confirm().await.unwrap();

    assert_eq!(confirmation.invoice_number, "FAC-2024-0007");
    assert_eq!(checkout.phase(), CheckoutPhase::Completed);
    assert!(cart.lock().await.is_empty());
    assert!(!store.path().exists());

    let invoice = backend.last("/facturas").unwrap();
    assert_eq!(
        invoice.authorization.as_deref(),
        Some(format!("Bearer {token}").as_str())
    );
    let body = invoice.body.unwrap();
    assert_eq!(body["clienteId"], 10);
    assert_eq!(body["empleadoId"], 17);
    assert_eq!(body["metodoPago"], "TARJETA");
    assert_eq!(body["notas"], "venta mostrador");
    assert_eq!(body["descuento"].as_f64(), Some(0.0));
    // (4200 * 2 + 3900 * 0.9) * 0.19
    let tax = body["impuesto"].as_f64().unwrap();
    assert!((tax - 2262.9).abs() < 1e-6, "unexpected tax {tax}");
    assert_eq!(
        body["detalles"],
        json!([
            { "productoId": 1, "cantidad": 2, "descuento": 0.0 },
            { "productoId": 2, "cantidad": 1, "descuento": 10.0 }
        ])
    );
}

#[tokio::test]
async fn rejected_invoice_surfaces_server_message_and_keeps_cart() {
    let backend = Backend::default();
    backend.reply_to_invoices(
        StatusCode::CONFLICT,
        json!({ "mensaje": "Stock insuficiente para Leche 1L" }),
    );
    let server = TestServer::spawn(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let session = Session::with_token(live_token(17));
    let client = Arc::new(ApiClient::new(&server.config(dir.path()), session.clone()).unwrap());

    let products = client.list_products().await.unwrap();
    let customers = client.list_customers().await.unwrap();
    let store = Arc::new(FileCartStore::new(dir.path()));
    let mut cart = CartLedger::new(store.clone());
    cart.add_or_increment(&products[1]);
    let cart = Arc::new(tokio::sync::Mutex::new(cart));

    let checkout = CheckoutOrchestrator::new(cart.clone(), client.clone(), Arc::new(session));
    checkout.begin_checkout().await.unwrap();
    checkout.select_counterparty(customers[1].clone()).unwrap();

    let err = checkout.confirm().await.unwrap_err();
    assert!(matches!(err, CheckoutError::Submission(ref e) if e.status == Some(409)));
    assert_eq!(err.to_string(), "Stock insuficiente para Leche 1L");
    assert_eq!(checkout.phase(), CheckoutPhase::Failed);
    assert_eq!(cart.lock().await.len(), 1);
    assert!(store.path().exists());

    backend.reply_to_invoices(StatusCode::OK, json!({ "numeroFactura": "FAC-0002" }));
    let confirmation = checkout.confirm().await.unwrap();
    assert_eq!(confirmation.invoice_number, "FAC-0002");
    assert_eq!(backend.count("/facturas"), 2);
}

#[tokio::test]
async fn unauthorized_response_clears_token() {
    let backend = Backend::default();
    backend.reply_to_invoices(StatusCode::UNAUTHORIZED, json!({}));
    let server = TestServer::spawn(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let session = Session::with_token(live_token(17));
    let client = ApiClient::new(&server.config(dir.path()), session.clone()).unwrap();
    assert_eq!(session.resolve_operator(), Some(EmployeeId::new(17)));

    let mut cart = CartLedger::in_memory();
    let products = client.list_products().await.unwrap();
    cart.add_or_increment(&products[0]);
    let request = storefront_checkout::CheckoutRequest::snapshot(&cart);
    let customers = client.list_customers().await.unwrap();
    let submission = storefront_checkout::InvoiceSubmission::build(
        &request,
        customers[0].id,
        EmployeeId::new(17),
        &CheckoutOptions::default(),
    );

    let err = client.submit_invoice(&submission).await.unwrap_err();
    assert!(matches!(err, ApiError::Api { status: 401, message: None }));
    assert_eq!(session.token(), None);
    // Operator identity survives a rejected token.
    assert_eq!(session.employee_id(), Some(EmployeeId::new(17)));
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClientConfig {
        api_url: "http://127.0.0.1:9/api".to_string(),
        timeout: Duration::from_secs(2),
        data_dir: dir.path().to_path_buf(),
    };
    let client = ApiClient::new(&config, Session::new()).unwrap();

    let err = client.list_products().await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)));
}
