//! Integration test support for FreshCart.
//!
//! [`FakeApi`] is an in-process `axum` server speaking the FreshCart REST
//! contract (`/api/user/*`, `/api/cart/update`, `/api/product/list`). Tests
//! point a real [`freshcart_storefront::Storefront`] at it and observe what
//! reaches the server.
//!
//! The fake can hold requests open until the test releases them, and can fail
//! cart updates on demand, which makes in-flight races reproducible.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p freshcart-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::State;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;
use url::Url;
use uuid::Uuid;

use freshcart_core::{Cart, CurrencyCode, ProductId, UserId};
use freshcart_storefront::api::types::{
    CartUpdateRequest, IsAuthResponse, MessageResponse, ProductDto, ProductListResponse, UserDto,
};
use freshcart_storefront::config::{ApiConfig, StorefrontConfig};

const SESSION_COOKIE: &str = "token";

/// How long `wait_for_*` helpers poll before giving up.
const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// A cart update as received by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRecord {
    pub user: UserId,
    pub cart: Cart,
}

#[derive(Debug, Clone)]
struct Account {
    id: UserId,
    name: String,
    email: String,
    password: String,
    cart: Cart,
}

#[derive(Default)]
struct FakeState {
    accounts: Mutex<Vec<Account>>,
    sessions: Mutex<HashMap<String, UserId>>,
    products: Mutex<Vec<ProductDto>>,
    pushes: Mutex<Vec<PushRecord>>,
    pull_requests: AtomicUsize,
    push_requests: AtomicUsize,
    fail_pushes: AtomicBool,
    fail_pulls: AtomicBool,
    pull_gate: Mutex<Option<Arc<Semaphore>>>,
    push_gate: Mutex<Option<Arc<Semaphore>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().expect("fake api state poisoned")
}

impl FakeState {
    fn session_user(&self, headers: &HeaderMap) -> Option<Account> {
        let token = session_token(headers)?;
        let user = lock(&self.sessions).get(&token).cloned()?;
        lock(&self.accounts).iter().find(|a| a.id == user).cloned()
    }

    async fn pass_gate(gate: &Mutex<Option<Arc<Semaphore>>>) {
        let gate = lock(gate).clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }
    }
}

/// In-process fake of the FreshCart API server.
pub struct FakeApi {
    addr: SocketAddr,
    state: Arc<FakeState>,
    server: tokio::task::JoinHandle<()>,
}

impl FakeApi {
    /// Start a server on an ephemeral port with the default product list.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        init_tracing();

        let state = Arc::new(FakeState::default());
        *lock(&state.products) = default_products();

        let app = Router::new()
            .route("/api/user/login", post(login))
            .route("/api/user/logout", get(logout))
            .route("/api/user/is-auth", get(is_auth))
            .route("/api/cart/update", post(update_cart))
            .route("/api/product/list", get(list_products))
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake api");
        let addr = listener.local_addr().expect("Failed to read local address");

        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Fake api server error");
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL of the server, with trailing slash.
    ///
    /// # Panics
    ///
    /// Never in practice; the address is always a valid URL.
    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).expect("valid fake api url")
    }

    /// Client configuration pointing at this server, with short timeouts.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        let mut api = ApiConfig::new(self.base_url());
        api.request_timeout = Duration::from_secs(5);
        StorefrontConfig {
            api,
            currency: CurrencyCode::USD,
            credentials: None,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    // =========================================================================
    // Fixtures
    // =========================================================================

    /// Register an account whose stored cart is `cart`.
    pub fn add_user(&self, email: &str, password: &str, cart: Cart) -> UserId {
        let id = UserId::new(Uuid::new_v4().simple().to_string());
        let name = email.split('@').next().unwrap_or(email).to_string();
        lock(&self.state.accounts).push(Account {
            id: id.clone(),
            name,
            email: email.to_string(),
            password: password.to_string(),
            cart,
        });
        id
    }

    /// The cart the server holds for `user`.
    #[must_use]
    pub fn stored_cart(&self, user: &UserId) -> Cart {
        lock(&self.state.accounts)
            .iter()
            .find(|a| &a.id == user)
            .map(|a| a.cart.clone())
            .unwrap_or_default()
    }

    /// Overwrite the cart the server holds for `user`.
    pub fn set_stored_cart(&self, user: &UserId, cart: Cart) {
        if let Some(account) = lock(&self.state.accounts).iter_mut().find(|a| &a.id == user) {
            account.cart = cart;
        }
    }

    /// Cart updates applied so far, oldest first.
    #[must_use]
    pub fn pushes(&self) -> Vec<PushRecord> {
        lock(&self.state.pushes).clone()
    }

    /// Number of `is-auth` requests received, including held ones.
    #[must_use]
    pub fn pull_requests(&self) -> usize {
        self.state.pull_requests.load(Ordering::SeqCst)
    }

    /// Number of cart update requests received, including held ones.
    #[must_use]
    pub fn push_requests(&self) -> usize {
        self.state.push_requests.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Fault injection
    // =========================================================================

    /// Answer cart updates with `success: false` while `fail` is set.
    pub fn fail_pushes(&self, fail: bool) {
        self.state.fail_pushes.store(fail, Ordering::SeqCst);
    }

    /// Answer `is-auth` with HTTP 503 while `fail` is set.
    pub fn fail_pulls(&self, fail: bool) {
        self.state.fail_pulls.store(fail, Ordering::SeqCst);
    }

    /// Hold cart updates until released.
    pub fn hold_pushes(&self) {
        *lock(&self.state.push_gate) = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `n` held (or future) cart updates through.
    pub fn release_pushes(&self, n: usize) {
        if let Some(gate) = lock(&self.state.push_gate).as_ref() {
            gate.add_permits(n);
        }
    }

    /// Hold `is-auth` requests until released.
    pub fn hold_pulls(&self) {
        *lock(&self.state.pull_gate) = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `n` held (or future) `is-auth` requests through.
    pub fn release_pulls(&self, n: usize) {
        if let Some(gate) = lock(&self.state.pull_gate).as_ref() {
            gate.add_permits(n);
        }
    }

    // =========================================================================
    // Waiting
    // =========================================================================

    /// Wait until at least `n` cart updates have been applied.
    ///
    /// # Panics
    ///
    /// Panics if that does not happen within a few seconds.
    pub async fn wait_for_pushes(&self, n: usize) -> Vec<PushRecord> {
        wait_until(|| self.pushes().len() >= n, "cart updates").await;
        self.pushes()
    }

    /// Wait until at least `n` cart update requests have arrived.
    ///
    /// # Panics
    ///
    /// Panics if that does not happen within a few seconds.
    pub async fn wait_for_push_requests(&self, n: usize) {
        wait_until(|| self.push_requests() >= n, "cart update requests").await;
    }

    /// Wait until at least `n` `is-auth` requests have arrived.
    ///
    /// # Panics
    ///
    /// Panics if that does not happen within a few seconds.
    pub async fn wait_for_pull_requests(&self, n: usize) {
        wait_until(|| self.pull_requests() >= n, "is-auth requests").await;
    }
}

impl Drop for FakeApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn wait_until(mut done: impl FnMut() -> bool, what: &str) {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while !done() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn init_tracing() {
    // Several tests in one binary each start a server; only the first install wins.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "freshcart_storefront=debug,tower_http=info".into()),
        )
        .with_test_writer()
        .try_init();
}

fn default_products() -> Vec<ProductDto> {
    vec![
        product("apple", "Organic Apples", "Fruits", Decimal::new(500, 2), Decimal::new(450, 2)),
        product("milk", "Whole Milk", "Dairy", Decimal::new(300, 2), Decimal::new(2999, 3)),
        product("bread", "Sourdough Loaf", "Bakery", Decimal::new(650, 2), Decimal::new(10_555, 3)),
    ]
}

fn product(
    id: &str,
    name: &str,
    category: &str,
    price: Decimal,
    offer_price: Decimal,
) -> ProductDto {
    ProductDto {
        id: ProductId::from(id),
        name: name.to_string(),
        category: category.to_string(),
        price,
        offer_price,
        in_stock: true,
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

fn not_authorized() -> MessageResponse {
    MessageResponse {
        success: false,
        message: Some("Not Authorized".to_string()),
    }
}

#[derive(serde::Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(State(state): State<Arc<FakeState>>, Json(body): Json<LoginBody>) -> Response {
    let account = lock(&state.accounts)
        .iter()
        .find(|a| a.email == body.email && a.password == body.password)
        .cloned();

    let Some(account) = account else {
        return Json(MessageResponse {
            success: false,
            message: Some("Invalid email or password".to_string()),
        })
        .into_response();
    };

    let token = Uuid::new_v4().to_string();
    lock(&state.sessions).insert(token.clone(), account.id);

    let cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly");
    let mut response = Json(MessageResponse {
        success: true,
        message: Some("Logged In".to_string()),
    })
    .into_response();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(SET_COOKIE, value);
    }
    response
}

async fn logout(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        lock(&state.sessions).remove(&token);
    }
    let mut response = Json(MessageResponse {
        success: true,
        message: Some("Logged Out".to_string()),
    })
    .into_response();
    response.headers_mut().insert(
        SET_COOKIE,
        HeaderValue::from_static("token=; Path=/; HttpOnly; Max-Age=0"),
    );
    response
}

async fn is_auth(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    state.pull_requests.fetch_add(1, Ordering::SeqCst);
    // Resolve the session before holding, like a server reading the request first.
    let account = state.session_user(&headers);
    FakeState::pass_gate(&state.pull_gate).await;

    if state.fail_pulls.load(Ordering::SeqCst) {
        let body = MessageResponse {
            success: false,
            message: Some("User service unavailable".to_string()),
        };
        return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
    }

    // Serve the cart as stored when the response is written.
    let account = account.and_then(|a| {
        lock(&state.accounts)
            .iter()
            .find(|stored| stored.id == a.id)
            .cloned()
    });

    match account {
        Some(account) => Json(IsAuthResponse {
            success: true,
            message: None,
            user: Some(UserDto {
                id: account.id,
                name: account.name,
                email: account.email,
                cart_items: account.cart,
            }),
        })
        .into_response(),
        None => {
            let MessageResponse { success, message } = not_authorized();
            Json(IsAuthResponse {
                success,
                message,
                user: None,
            })
            .into_response()
        }
    }
}

async fn update_cart(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<CartUpdateRequest>,
) -> Json<MessageResponse> {
    state.push_requests.fetch_add(1, Ordering::SeqCst);
    let Some(account) = state.session_user(&headers) else {
        return Json(not_authorized());
    };
    FakeState::pass_gate(&state.push_gate).await;

    if state.fail_pushes.load(Ordering::SeqCst) {
        return Json(MessageResponse {
            success: false,
            message: Some("Cart service unavailable".to_string()),
        });
    }

    if let Some(stored) = lock(&state.accounts).iter_mut().find(|a| a.id == account.id) {
        stored.cart = body.cart_items.clone();
    }
    lock(&state.pushes).push(PushRecord {
        user: account.id,
        cart: body.cart_items,
    });

    Json(MessageResponse {
        success: true,
        message: Some("Cart Updated".to_string()),
    })
}

async fn list_products(State(state): State<Arc<FakeState>>) -> Json<ProductListResponse> {
    Json(ProductListResponse {
        success: true,
        message: None,
        products: lock(&state.products).clone(),
    })
}
