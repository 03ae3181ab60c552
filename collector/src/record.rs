use crate::{
    cluster::{
        ClusterConfig,
        NodeMetadata,
        VdcMetadata,
    },
    QueryKind,
};
use chrono::{
    DateTime,
    SecondsFormat,
    Utc,
};
use serde_json::Value;

/// One flat output event.
pub type Record = serde_json::Map<String, Value>;

pub const RECORD_VERSION: &str = "1.0";
pub const RECORD_TYPE: &str = "ecsbeat";

/// Where a record came from, which decides the identity fields it carries.
#[derive(Debug, Clone, Copy)]
pub enum Origin<'a> {
    Cluster,
    Vdc(&'a VdcMetadata),
    Node(&'a VdcMetadata, &'a NodeMetadata),
}

/// Adds the fixed identity fields. Metadata locks are held only while copying the values.
pub fn enrich(record: &mut Record, cluster: &ClusterConfig, kind: &QueryKind, origin: Origin<'_>, now: DateTime<Utc>) {
    record.insert("@version".into(), RECORD_VERSION.into());
    record.insert(
        "@timestamp".into(),
        now.to_rfc3339_opts(SecondsFormat::Millis, true).into(),
    );
    record.insert("type".into(), RECORD_TYPE.into());
    record.insert("ecs-customer".into(), cluster.customer_name.clone().into());
    record.insert("ecs-event-type".into(), kind.as_str().into());

    let (vdc, node) = match origin {
        Origin::Cluster => return,
        Origin::Vdc(vdc) => (vdc, None),
        Origin::Node(vdc, node) => (vdc, Some(node)),
    };

    let identity = vdc.identity();
    record.insert("ecs-vdc-cfgname".into(), vdc.config_name().into());
    record.insert("ecs-vdc-id".into(), identity.id.into());
    record.insert("ecs-vdc-name".into(), identity.name.into());

    if let Some(node) = node {
        let identity = node.identity();
        record.insert("ecs-node-id".into(), identity.id.into());
        record.insert("ecs-node-ip".into(), node.ip().into());
        record.insert("ecs-node-name".into(), identity.name.into());
        record.insert("ecs-version".into(), identity.version.into());
    }
}
