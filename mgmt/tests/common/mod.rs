#![allow(dead_code)]

use axum::{
    extract::{
        Query,
        State,
    },
    http::{
        header::AUTHORIZATION,
        HeaderMap,
        StatusCode,
    },
    response::{
        IntoResponse,
        Response,
    },
    routing::get,
    Json,
    Router,
};
use ecsbeat_mgmt::{
    ClientSettings,
    Ecs,
    MgmtClient,
    Vdc,
    AUTH_TOKEN_HEADER,
};
use parking_lot::Mutex;
use serde_json::json;
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{
            AtomicBool,
            AtomicUsize,
            Ordering,
        },
        Arc,
    },
    time::Duration,
};
use tokio::net::TcpListener;

/// `Basic base64("root:secret")`
pub const BASIC_AUTH: &str = "Basic cm9vdDpzZWNyZXQ=";

pub const OWNERSHIP_DUMP: &str = "\
[id: urn:storageos:OwnershipInfo:0a1b_128_CT_1_128_0:, owner: 127.0.0.1:9101, creationCompleted: true]
[id: urn:storageos:OwnershipInfo:0a1b_128_PR_7_128_2:, owner: 127.0.0.1:9101, creationCompleted: true]
";

pub const INIT_STAT: &str = "<dtinit><entry>\
<ERROR_DT_NOT_READY>[urn:storageos:OwnershipInfo:0a1b_128_PR_7_128_2:]</ERROR_DT_NOT_READY>\
</entry></dtinit>";

/// Fake management API. Counts logins and logouts and accepts only the most recently issued token.
#[derive(Default)]
pub struct FakeEcs {
    pub logins: AtomicUsize,
    pub logouts: AtomicUsize,
    pub data_requests: AtomicUsize,
    /// Number of upcoming data requests answered with 401 regardless of the token.
    pub reject_next: AtomicUsize,
    /// Answer logins without the token header.
    pub omit_token: AtomicBool,
    pub current_token: Mutex<String>,
}

impl FakeEcs {
    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        self.data_requests.fetch_add(1, Ordering::SeqCst);
        let rejected = self
            .reject_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let token = headers
            .get(AUTH_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        !rejected && !token.is_empty() && token == *self.current_token.lock()
    }
}

type Shared = State<Arc<FakeEcs>>;

async fn login(State(fake): Shared, headers: HeaderMap) -> Response {
    let basic = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
    if basic != Some(BASIC_AUTH) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let n = fake.logins.fetch_add(1, Ordering::SeqCst) + 1;
    if fake.omit_token.load(Ordering::SeqCst) {
        return StatusCode::OK.into_response();
    }
    let token = format!("token-{n}");
    *fake.current_token.lock() = token.clone();
    ([(AUTH_TOKEN_HEADER, token)], "").into_response()
}

async fn logout(State(fake): Shared) -> StatusCode {
    fake.logouts.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

async fn local_vdc(State(fake): Shared, headers: HeaderMap) -> Response {
    if !fake.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({ "id": "urn:storageos:VirtualDataCenterData:1", "name": "vdc1" })).into_response()
}

async fn namespaces(
    State(fake): Shared,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !fake.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let page = match query.get("marker").map(String::as_str) {
        None => json!({ "namespace": [{ "id": "ns1" }, { "id": "ns2" }], "NextMarker": "page 2" }),
        Some("page 2") => json!({ "namespace": [{ "id": "ns3" }], "NextMarker": "" }),
        Some(_) => return StatusCode::BAD_REQUEST.into_response(),
    };
    Json(page).into_response()
}

async fn not_found(State(fake): Shared, headers: HeaderMap) -> StatusCode {
    if !fake.authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    StatusCode::NOT_FOUND
}

pub fn router(fake: Arc<FakeEcs>) -> Router {
    Router::new()
        .route("/login", get(login))
        .route("/logout", get(logout))
        .route("/object/vdcs/vdc/local.json", get(local_vdc))
        .route("/object/namespaces.json", get(namespaces))
        .route("/missing.json", get(not_found))
        .route("/diagnostic/DumpOwnershipInfo/", get(|| async { OWNERSHIP_DUMP }))
        .route("/stats/dt/DTInitStat/", get(|| async { INIT_STAT }))
        .with_state(fake)
}

pub async fn spawn(fake: Arc<FakeEcs>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(fake);
    tokio::spawn(async move { axum::serve(listener, app).await });
    addr
}

/// An address nothing listens on.
pub async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

/// An address that accepts connections but never answers.
pub async fn silent_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            open.push(stream);
        }
    });
    addr.to_string()
}

pub fn settings(auxiliary_port: u16) -> ClientSettings {
    ClientSettings {
        scheme: "http".to_string(),
        request_timeout: Duration::from_secs(2),
        auxiliary_port,
        ..ClientSettings::new("acme", "root", "secret")
    }
}

pub fn client(nodes: Vec<String>, auxiliary_port: u16) -> MgmtClient {
    MgmtClient::new(settings(auxiliary_port), Ecs::new([Vdc::new("vdc1", nodes)])).unwrap()
}
