//! Typed wrappers for the management endpoints used to discover cluster metadata.

use crate::{
    read_json,
    MgmtClient,
    MgmtError,
};
use serde::Deserialize;

pub const LOCAL_VDC_PATH: &str = "/object/vdcs/vdc/local.json";
pub const NODES_PATH: &str = "/vdc/nodes.json";
pub const STORAGE_POOLS_PATH: &str = "/vdc/data-services/varrays.json";
pub const NAMESPACES_PATH: &str = "/object/namespaces.json";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalVdc {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeInfo {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub nodeid: String,
    #[serde(default)]
    pub nodename: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoragePool {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct NodeList {
    #[serde(default)]
    node: Vec<NodeInfo>,
}

#[derive(Debug, Deserialize)]
struct StoragePoolList {
    #[serde(default)]
    varray: Vec<StoragePool>,
}

#[derive(Debug, Deserialize)]
struct NamespaceRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct NamespacePage {
    #[serde(default)]
    namespace: Vec<NamespaceRef>,
    #[serde(default, rename = "NextMarker")]
    next_marker: Option<String>,
}

impl MgmtClient {
    pub async fn local_vdc(&self, vdc: &str) -> Result<LocalVdc, MgmtError> {
        read_json(self.get(LOCAL_VDC_PATH, vdc).await?).await
    }

    pub async fn nodes(&self, vdc: &str) -> Result<Vec<NodeInfo>, MgmtError> {
        let list: NodeList = read_json(self.get(NODES_PATH, vdc).await?).await?;
        Ok(list.node)
    }

    pub async fn storage_pools(&self, vdc: &str) -> Result<Vec<StoragePool>, MgmtError> {
        let list: StoragePoolList = read_json(self.get(STORAGE_POOLS_PATH, vdc).await?).await?;
        Ok(list.varray)
    }

    /// Ids of all namespaces visible through `vdc`, following `NextMarker` until the listing is exhausted.
    pub async fn namespace_ids(&self, vdc: &str) -> Result<Vec<String>, MgmtError> {
        let mut ids = Vec::new();
        let mut marker = String::new();
        loop {
            let path = if marker.is_empty() {
                NAMESPACES_PATH.to_string()
            } else {
                let encoded: String = url::form_urlencoded::byte_serialize(marker.as_bytes()).collect();
                format!("{NAMESPACES_PATH}?marker={encoded}")
            };

            let page: NamespacePage = read_json(self.get(&path, vdc).await?).await?;
            ids.extend(page.namespace.into_iter().map(|namespace| namespace.id));

            match page.next_marker {
                Some(next) if !next.is_empty() && next != marker => marker = next,
                Some(next) if next == marker && !next.is_empty() => {
                    warn!(client = self.name(), marker, "namespace listing repeated its marker");
                    break;
                }
                _ => break,
            }
        }
        debug!(client = self.name(), vdc, count = ids.len(), "listed namespaces");
        Ok(ids)
    }
}
