//! Turns one command into records for one cluster, fanning the query out over partitions and nodes according to its
//! level.

use crate::{
    cluster::{
        Cluster,
        NodeMetadata,
        VdcMetadata,
    },
    decode,
    enrich,
    transform,
    CollectError,
    Command,
    Origin,
    QueryKind,
    Record,
};
use chrono::Utc;
use ecsbeat_config::Level;
use ecsbeat_mgmt::diagnostic;
use serde_json::json;

/// Namespace ids sent per billing request.
pub const BILLING_BATCH_SIZE: usize = 100;

pub async fn generate_events(command: &Command, cluster: &Cluster) -> Result<Vec<Record>, CollectError> {
    match command.level {
        Level::System if command.kind.is_billing() => billing_events(command, cluster).await,
        Level::System => system_events(command, cluster).await,
        Level::Vdc => vdc_events(command, cluster).await,
        Level::Node => node_events(command, cluster).await,
        Level::Diagnostic => diagnostic_events(command, cluster).await,
    }
}

async fn fetch(cluster: &Cluster, uri: &str, vdc: &str) -> Result<Vec<Record>, CollectError> {
    let response = cluster.client().get(uri, vdc).await?;
    let body = response.bytes().await.map_err(CollectError::Body)?;
    decode(&body)
}

fn finish(cluster: &Cluster, kind: &QueryKind, origin: Origin<'_>, records: &mut [Record]) {
    let now = Utc::now();
    for record in records {
        transform(record);
        enrich(record, cluster.config(), kind, origin, now);
    }
}

/// Partial results are kept when some requests of a fan-out fail. The error is only surfaced when nothing succeeded.
fn collected(records: Vec<Record>, succeeded: bool, last_error: Option<CollectError>) -> Result<Vec<Record>, CollectError> {
    match last_error {
        Some(err) if !succeeded => Err(err),
        _ => Ok(records),
    }
}

/// Asks the partitions in order and stops at the first one that answers.
async fn system_events(command: &Command, cluster: &Cluster) -> Result<Vec<Record>, CollectError> {
    let uri = command.filled_uri(None, Utc::now());
    let mut last_error = None;
    for vdc in cluster.config().vdcs() {
        match fetch(cluster, &uri, vdc.config_name()).await {
            Ok(mut records) => {
                finish(cluster, &command.kind, Origin::Cluster, &mut records);
                return Ok(records);
            }
            Err(err) => {
                warn!(cluster = cluster.name(), vdc = vdc.config_name(), command = %command.kind, "query failed: {err}");
                last_error = Some(err);
            }
        }
    }
    collected(Vec::new(), false, last_error)
}

/// Billing is collected from every partition: all namespace ids are listed, then POSTed in batches.
async fn billing_events(command: &Command, cluster: &Cluster) -> Result<Vec<Record>, CollectError> {
    let mut records = Vec::new();
    for vdc in cluster.config().vdcs() {
        let name = vdc.config_name();
        let ids = cluster.client().namespace_ids(name).await?;
        debug!(cluster = cluster.name(), vdc = name, namespaces = ids.len(), command = %command.kind, "fetching billing");

        for batch in ids.chunks(BILLING_BATCH_SIZE) {
            let uri = command.filled_uri(None, Utc::now());
            let response = cluster.client().post_json(&uri, &json!({ "id": batch }), name).await?;
            let body = response.bytes().await.map_err(CollectError::Body)?;
            let mut batch_records = decode(&body)?;
            finish(cluster, &command.kind, Origin::Cluster, &mut batch_records);
            records.append(&mut batch_records);
        }
    }
    Ok(records)
}

async fn vdc_events(command: &Command, cluster: &Cluster) -> Result<Vec<Record>, CollectError> {
    let uri = command.filled_uri(None, Utc::now());
    let mut records = Vec::new();
    let (mut succeeded, mut last_error) = (false, None);

    for vdc in cluster.config().vdcs() {
        let mut vdc_records = match fetch(cluster, &uri, vdc.config_name()).await {
            Ok(vdc_records) => vdc_records,
            Err(err) => {
                warn!(cluster = cluster.name(), vdc = vdc.config_name(), command = %command.kind, "query failed: {err}");
                last_error = Some(err);
                continue;
            }
        };
        succeeded = true;

        if command.kind == QueryKind::Nodes {
            for record in &mut vdc_records {
                let origin = node_of(vdc, record).map_or(Origin::Vdc(vdc), |node| Origin::Node(vdc, node));
                finish(cluster, &command.kind, origin, std::slice::from_mut(record));
            }
        } else {
            finish(cluster, &command.kind, Origin::Vdc(vdc), &mut vdc_records);
        }
        records.append(&mut vdc_records);
    }
    collected(records, succeeded, last_error)
}

/// The node a `nodes` record describes, found by the node id it reports.
fn node_of<'a>(vdc: &'a VdcMetadata, record: &Record) -> Option<&'a NodeMetadata> {
    record.get("id").and_then(|id| id.as_str()).and_then(|id| vdc.node_by_id(id))
}

async fn node_events(command: &Command, cluster: &Cluster) -> Result<Vec<Record>, CollectError> {
    let mut records = Vec::new();
    let (mut succeeded, mut last_error) = (false, None);

    for vdc in cluster.config().vdcs() {
        for node in vdc.nodes() {
            let uri = command.filled_uri(Some(node.address()), Utc::now());
            match fetch(cluster, &uri, vdc.config_name()).await {
                Ok(mut node_records) => {
                    succeeded = true;
                    finish(cluster, &command.kind, Origin::Node(vdc, node), &mut node_records);
                    records.append(&mut node_records);
                }
                Err(err) => {
                    warn!(
                        cluster = cluster.name(),
                        vdc = vdc.config_name(),
                        node = node.address(),
                        command = %command.kind,
                        "query failed: {err}"
                    );
                    last_error = Some(err);
                }
            }
        }
    }
    collected(records, succeeded, last_error)
}

/// Probes nodes until one serves both diagnostic documents, then reports the tables it knows about.
async fn diagnostic_events(command: &Command, cluster: &Cluster) -> Result<Vec<Record>, CollectError> {
    let client = cluster.client();
    let mut last_error = None;

    for vdc in cluster.config().vdcs() {
        for node in vdc.nodes() {
            let probe = async {
                let infos = client.dt_infos(node.address()).await?;
                let inits = client.dt_inits(node.address()).await?;
                Ok::<_, CollectError>(diagnostic::reconcile(infos, &inits))
            };
            match probe.await {
                Ok(entries) => {
                    let mut records: Vec<Record> = entries.into_iter().map(|entry| entry.into_record()).collect();
                    finish(cluster, &command.kind, Origin::Node(vdc, node), &mut records);
                    return Ok(records);
                }
                Err(err) => {
                    debug!(cluster = cluster.name(), node = node.address(), "diagnostic probe failed: {err}");
                    last_error = Some(err);
                }
            }
        }
    }
    collected(Vec::new(), false, last_error)
}
