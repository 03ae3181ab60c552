use ecsbeat_config::Customer;
use ecsbeat_mgmt::{
    split_host_port,
    ClientSettings,
    Ecs,
    MgmtClient,
    MgmtError,
    Vdc,
};
use parking_lot::RwLock;
use std::{
    collections::BTreeMap,
    time::Duration,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VdcIdentity {
    pub id: String,
    pub name: String,
    pub storagepool_id: String,
    pub storagepool_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeIdentity {
    pub id: String,
    pub name: String,
    pub version: String,
}

/// A configured node address and the identity last reported for it by the node roster.
#[derive(Debug)]
pub struct NodeMetadata {
    address: String,
    identity: RwLock<NodeIdentity>,
}

impl NodeMetadata {
    fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            identity: Default::default(),
        }
    }

    /// The address as configured, possibly with a port.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn ip(&self) -> &str {
        split_host_port(&self.address).0
    }

    pub fn identity(&self) -> NodeIdentity {
        self.identity.read().clone()
    }

    pub fn update(&self, identity: NodeIdentity) {
        *self.identity.write() = identity;
    }

    fn matches(&self, ip: &str) -> bool {
        self.address == ip || self.ip() == ip
    }
}

#[derive(Debug)]
pub struct VdcMetadata {
    config_name: String,
    identity: RwLock<VdcIdentity>,
    nodes: BTreeMap<String, NodeMetadata>,
}

impl VdcMetadata {
    pub fn new<I, S>(config_name: impl Into<String>, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let nodes = addresses
            .into_iter()
            .map(|address| {
                let node = NodeMetadata::new(address);
                (node.address.clone(), node)
            })
            .collect();
        Self {
            config_name: config_name.into(),
            identity: Default::default(),
            nodes,
        }
    }

    /// The partition name used in the configuration and for node selection.
    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    pub fn identity(&self) -> VdcIdentity {
        self.identity.read().clone()
    }

    pub fn update_identity(&self, update: impl FnOnce(&mut VdcIdentity)) {
        update(&mut self.identity.write());
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeMetadata> {
        self.nodes.values()
    }

    pub fn node(&self, address: &str) -> Option<&NodeMetadata> {
        self.nodes.get(address)
    }

    /// Looks a roster ip up by exact address first, then by the host part of the configured addresses.
    pub fn node_by_ip(&self, ip: &str) -> Option<&NodeMetadata> {
        self.nodes
            .get(ip)
            .or_else(|| self.nodes.values().find(|node| node.matches(ip)))
    }

    /// Nodes without a refreshed identity have an empty id and never match.
    pub fn node_by_id(&self, id: &str) -> Option<&NodeMetadata> {
        if id.is_empty() {
            return None;
        }
        self.nodes.values().find(|node| node.identity.read().id == id)
    }
}

/// Identity metadata of one customer's cluster. The set of partitions and node addresses is fixed at construction,
/// refreshes only change the identity values.
#[derive(Debug)]
pub struct ClusterConfig {
    pub customer_name: String,
    pub refresh_interval: Duration,
    vdcs: BTreeMap<String, VdcMetadata>,
}

impl ClusterConfig {
    pub fn new(
        customer_name: impl Into<String>,
        refresh_interval: Duration,
        vdcs: impl IntoIterator<Item = VdcMetadata>,
    ) -> Self {
        Self {
            customer_name: customer_name.into(),
            refresh_interval,
            vdcs: vdcs.into_iter().map(|vdc| (vdc.config_name.clone(), vdc)).collect(),
        }
    }

    pub fn from_customer(customer: &Customer) -> Self {
        Self::new(
            customer.customer_name.clone(),
            customer.refresh_interval,
            customer
                .vdcs
                .iter()
                .map(|vdc| VdcMetadata::new(vdc.vdc_name.clone(), vdc.nodes.iter().cloned())),
        )
    }

    pub fn vdcs(&self) -> impl Iterator<Item = &VdcMetadata> {
        self.vdcs.values()
    }

    pub fn vdc(&self, config_name: &str) -> Option<&VdcMetadata> {
        self.vdcs.get(config_name)
    }
}

/// One customer: its metadata and the management client talking to its cluster.
#[derive(Debug)]
pub struct Cluster {
    config: ClusterConfig,
    client: MgmtClient,
}

impl Cluster {
    pub fn new(config: ClusterConfig, client: MgmtClient) -> Self {
        Self { config, client }
    }

    pub fn from_customer(customer: &Customer) -> Result<Self, MgmtError> {
        let settings = ClientSettings {
            name: customer.customer_name.clone(),
            username: customer.username.clone(),
            password: customer.password.clone(),
            token_validity: customer.token_expiry,
            request_timeout: customer.request_timeout,
            block_duration: customer.block_duration,
            scheme: customer.scheme.clone(),
            port: customer.port,
            auxiliary_port: customer.auxiliary_port,
            accept_invalid_certs: customer.accept_invalid_certs,
        };
        let upstream = Ecs::new(
            customer
                .vdcs
                .iter()
                .map(|vdc| Vdc::new(vdc.vdc_name.clone(), vdc.nodes.iter().cloned())),
        );
        let client = MgmtClient::new(settings, upstream)?;
        Ok(Self::new(ClusterConfig::from_customer(customer), client))
    }

    pub fn name(&self) -> &str {
        &self.config.customer_name
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn client(&self) -> &MgmtClient {
        &self.client
    }

    /// Re-reads partition, storage pool and node identities. Failures are logged per partition and leave the
    /// previously known values in place.
    pub async fn refresh(&self) {
        for vdc in self.config.vdcs() {
            let name = vdc.config_name();

            match self.client.local_vdc(name).await {
                Ok(local) => vdc.update_identity(|identity| {
                    identity.id = local.id;
                    identity.name = local.name;
                }),
                Err(err) => warn!(cluster = self.name(), vdc = name, "failed to refresh partition identity: {err}"),
            }

            match self.client.storage_pools(name).await {
                Ok(pools) => {
                    let ids: Vec<_> = pools.iter().map(|pool| pool.id.as_str()).collect();
                    let names: Vec<_> = pools.iter().map(|pool| pool.name.as_str()).collect();
                    vdc.update_identity(|identity| {
                        identity.storagepool_id = ids.join(",");
                        identity.storagepool_name = names.join(",");
                    });
                }
                Err(err) => warn!(cluster = self.name(), vdc = name, "failed to refresh storage pools: {err}"),
            }

            match self.client.nodes(name).await {
                Ok(roster) => {
                    for info in roster {
                        // Nodes missing from the configuration are ignored.
                        let Some(node) = vdc.node_by_ip(&info.ip) else {
                            trace!(cluster = self.name(), vdc = name, ip = info.ip, "unknown node in roster");
                            continue;
                        };
                        node.update(NodeIdentity {
                            id: info.nodeid,
                            name: info.nodename,
                            version: info.version,
                        });
                    }
                }
                Err(err) => warn!(cluster = self.name(), vdc = name, "failed to refresh nodes: {err}"),
            }
        }
        debug!(cluster = self.name(), "refreshed cluster metadata");
    }
}
