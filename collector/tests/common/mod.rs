#![allow(dead_code)]

use axum::{
    extract::{
        Path,
        Query,
        State,
    },
    http::{
        HeaderMap,
        StatusCode,
        Uri,
    },
    response::{
        IntoResponse,
        Response,
    },
    routing::{
        get,
        post,
    },
    Json,
    Router,
};
use ecsbeat_collector::Cluster;
use ecsbeat_config::Config;
use ecsbeat_mgmt::AUTH_TOKEN_HEADER;
use parking_lot::Mutex;
use serde_json::{
    json,
    Value,
};
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
};
use tokio::net::TcpListener;

pub const TOKEN: &str = "token-1";
pub const NAMESPACE_PAGE: usize = 40;

/// Fake management API shared by every listener of a test cluster.
#[derive(Default)]
pub struct FakeEcs {
    pub logins: AtomicUsize,
    pub logouts: AtomicUsize,
    /// Path and query of every authenticated request.
    pub requests: Mutex<Vec<String>>,
    pub billing_batches: Mutex<Vec<Vec<String>>>,
    /// Served by the namespace listing, `NAMESPACE_PAGE` ids per page.
    pub namespaces: Mutex<Vec<String>>,
    pub roster: Mutex<Vec<Value>>,
    /// Answer partition identity requests with 500.
    pub fail_identity: AtomicBool,
}

impl FakeEcs {
    pub fn requests_matching(&self, fragment: &str) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter(|uri| uri.contains(fragment))
            .cloned()
            .collect()
    }

    pub fn set_namespaces(&self, count: usize) {
        *self.namespaces.lock() = (1..=count).map(|n| format!("ns{n}")).collect();
    }

    fn record(&self, headers: &HeaderMap, uri: &Uri) -> Result<(), StatusCode> {
        let token = headers.get(AUTH_TOKEN_HEADER).and_then(|value| value.to_str().ok());
        if token != Some(TOKEN) {
            return Err(StatusCode::UNAUTHORIZED);
        }
        self.requests.lock().push(uri.to_string());
        Ok(())
    }
}

type Shared = State<Arc<FakeEcs>>;

macro_rules! authorized {
    ($fake:expr, $headers:expr, $uri:expr) => {
        if let Err(status) = $fake.record(&$headers, &$uri) {
            return status.into_response();
        }
    };
}

async fn login(State(fake): Shared) -> Response {
    fake.logins.fetch_add(1, Ordering::SeqCst);
    ([(AUTH_TOKEN_HEADER, TOKEN)], "").into_response()
}

async fn logout(State(fake): Shared) -> StatusCode {
    fake.logouts.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

async fn local_vdc(State(fake): Shared, headers: HeaderMap, uri: Uri) -> Response {
    authorized!(fake, headers, uri);
    if fake.fail_identity.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(json!({ "id": "urn:storageos:VirtualDataCenterData:1", "name": "dc-east" })).into_response()
}

async fn nodes(State(fake): Shared, headers: HeaderMap, uri: Uri) -> Response {
    authorized!(fake, headers, uri);
    let roster = fake.roster.lock().clone();
    Json(json!({ "node": roster })).into_response()
}

async fn storage_pools(State(fake): Shared, headers: HeaderMap, uri: Uri) -> Response {
    authorized!(fake, headers, uri);
    Json(json!({ "varray": [{ "id": "urn:sp:1", "name": "sp1" }, { "id": "urn:sp:2", "name": "sp2" }] }))
        .into_response()
}

async fn namespaces(
    State(fake): Shared,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    authorized!(fake, headers, uri);
    let all = fake.namespaces.lock().clone();
    let start = match query.get("marker") {
        None => 0,
        Some(marker) => match all.iter().position(|id| id == marker) {
            Some(start) => start,
            None => return StatusCode::BAD_REQUEST.into_response(),
        },
    };
    let end = (start + NAMESPACE_PAGE).min(all.len());
    let ids: Vec<_> = all[start..end].iter().map(|id| json!({ "id": id })).collect();
    let mut page = json!({ "namespace": ids });
    if let Some(next) = all.get(end) {
        page["NextMarker"] = json!(next);
    }
    Json(page).into_response()
}

async fn billing(State(fake): Shared, headers: HeaderMap, uri: Uri, Json(body): Json<Value>) -> Response {
    authorized!(fake, headers, uri);
    let ids: Vec<String> = body["id"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|id| id.as_str().map(str::to_string))
        .collect();
    let infos: Vec<_> = ids
        .iter()
        .map(|id| json!({ "namespace": id, "total_size": "10", "_links": { "self": "/x" } }))
        .collect();
    fake.billing_batches.lock().push(ids);
    Json(json!({ "namespace_billing_infos": infos, "date_time": "now" })).into_response()
}

async fn localzone(State(fake): Shared, headers: HeaderMap, uri: Uri) -> Response {
    authorized!(fake, headers, uri);
    Json(json!({
        "name": "localzone",
        "_links": { "self": { "href": "/dashboard/zones/localzone" } },
        "diskSpaceFreeCurrent": [{ "Space": 5, "t": "1700000000" }],
        "numNodes": 2
    }))
    .into_response()
}

async fn zone_nodes(State(fake): Shared, headers: HeaderMap, uri: Uri) -> Response {
    authorized!(fake, headers, uri);
    Json(json!({
        "_embedded": { "_instances": [
            { "id": "node-1", "cpuUtilizationCurrent": { "Percent": 10, "t": "1" } },
            { "id": "node-2", "cpuUtilizationCurrent": { "Percent": 20, "t": "1" } },
            { "id": "node-9" }
        ] }
    }))
    .into_response()
}

async fn node_stats(State(fake): Shared, headers: HeaderMap, uri: Uri, Path(node): Path<String>) -> Response {
    authorized!(fake, headers, uri);
    Json(json!({ "node": node, "memoryCurrentL1": { "Percent": 42, "t": "1" } })).into_response()
}

async fn alerts(State(fake): Shared, headers: HeaderMap, uri: Uri) -> Response {
    authorized!(fake, headers, uri);
    Json(json!({ "alert": [{ "severity": "WARNING", "description": "disk" }, "noise"] })).into_response()
}

async fn many(State(fake): Shared, headers: HeaderMap, uri: Uri) -> Response {
    authorized!(fake, headers, uri);
    let instances: Vec<_> = (0..5).map(|n| json!({ "n": n })).collect();
    Json(json!({ "_embedded": { "_instances": instances } })).into_response()
}

const OWNERSHIP_DUMP: &str = "\
[id: urn:storageos:OwnershipInfo:0a1b_128_CT_1_128_0:, owner: 127.0.0.1:9101, creationCompleted: true]
[id: urn:storageos:OwnershipInfo:0a1b_128_PR_7_128_2:, owner: 127.0.0.1:9101, creationCompleted: true]
";

const INIT_STAT: &str = "<dtinit><entry>\
<ERROR_RPC_CLIENT_NO_RESPONSE>[urn:storageos:OwnershipInfo:0a1b_128_PR_7_128_2:]</ERROR_RPC_CLIENT_NO_RESPONSE>\
</entry></dtinit>";

pub fn router(fake: Arc<FakeEcs>) -> Router {
    Router::new()
        .route("/login", get(login))
        .route("/logout", get(logout))
        .route("/object/vdcs/vdc/local.json", get(local_vdc))
        .route("/vdc/nodes.json", get(nodes))
        .route("/vdc/data-services/varrays.json", get(storage_pools))
        .route("/object/namespaces.json", get(namespaces))
        .route("/object/billing/namespace/info.json", post(billing))
        .route("/dashboard/zones/localzone.json", get(localzone))
        .route("/dashboard/zones/localzone/nodes.json", get(zone_nodes))
        .route("/dashboard/nodes/{node}/stats.json", get(node_stats))
        .route("/vdc/alerts.json", get(alerts))
        .route("/dashboard/many.json", get(many))
        .route("/diagnostic/DumpOwnershipInfo/", get(|| async { OWNERSHIP_DUMP }))
        .route("/stats/dt/DTInitStat/", get(|| async { INIT_STAT }))
        .with_state(fake)
}

async fn listen(fake: Arc<FakeEcs>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(fake);
    tokio::spawn(async move { axum::serve(listener, app).await });
    addr
}

/// One customer with one partition of two nodes, each node served by its own listener.
pub struct TestCluster {
    pub fake: Arc<FakeEcs>,
    pub nodes: [SocketAddr; 2],
    pub config: Config,
}

impl TestCluster {
    pub async fn start(commands: &str) -> Self {
        let fake = Arc::new(FakeEcs::default());
        let mut nodes = [listen(fake.clone()).await, listen(fake.clone()).await];
        // Partitions keep their nodes ordered by address.
        nodes.sort_by_key(|addr| addr.to_string());
        fake.set_namespaces(3);

        *fake.roster.lock() = nodes
            .iter()
            .enumerate()
            .map(|(i, addr)| {
                json!({
                    "ip": addr.to_string(),
                    "nodeid": format!("node-{}", i + 1),
                    "nodename": format!("ecs-{}", i + 1),
                    "version": "3.8.0"
                })
            })
            .chain([json!({ "ip": "10.9.9.9", "nodeid": "node-9", "nodename": "stranger", "version": "3.8.0" })])
            .collect();

        let yaml = format!(
            r#"
once: true
commands: {commands}
customers:
  - customer_name: acme
    username: root
    password: secret
    scheme: http
    request_timeout: 2s
    auxiliary_port: {aux}
    vdcs:
      - vdc_name: vdc1
        nodes: ["{n1}", "{n2}"]
"#,
            aux = nodes[0].port(),
            n1 = nodes[0],
            n2 = nodes[1],
        );
        let config = Config::from_yaml(&yaml).unwrap();
        config.validate().unwrap();

        Self { fake, nodes, config }
    }

    pub fn cluster(&self) -> Cluster {
        Cluster::from_customer(&self.config.customers[0]).unwrap()
    }
}
