//! Management node selection with temporary blocklisting.
//!
//! Each [`Vdc`] keeps a round-robin cursor over its configured node addresses. A node that failed at the transport
//! level is skipped until its block expires. [`Ecs`] groups the partitions of one cluster and routes a request to the
//! named partition, falling back to any partition that still has a usable node.

use crate::{
    token::deadline,
    MgmtError,
};
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    time::{
        Duration,
        Instant,
    },
};

#[derive(Debug, Clone)]
struct Node {
    address: String,
    blocked_until: Option<Instant>,
}

impl Node {
    fn is_blocked(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }
}

#[derive(Debug, Default)]
struct Cursor {
    nodes: Vec<Node>,
    next: usize,
}

/// One partition of a cluster and its management node addresses (`host` or `host:port`).
#[derive(Debug)]
pub struct Vdc {
    name: String,
    cursor: Mutex<Cursor>,
}

impl Vdc {
    pub fn new<I, S>(name: impl Into<String>, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let nodes = addresses
            .into_iter()
            .map(|address| Node {
                address: address.into(),
                blocked_until: None,
            })
            .collect();
        Self {
            name: name.into(),
            cursor: Mutex::new(Cursor { nodes, next: 0 }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addresses(&self) -> Vec<String> {
        self.cursor.lock().nodes.iter().map(|node| node.address.clone()).collect()
    }

    /// Advances the round-robin cursor and returns the first node that is not blocked.
    pub fn next_available_node(&self) -> Result<String, MgmtError> {
        let now = Instant::now();
        let mut cursor = self.cursor.lock();
        let len = cursor.nodes.len();
        for _ in 0..len {
            let index = cursor.next % len;
            cursor.next = (index + 1) % len;
            let node = &cursor.nodes[index];
            if !node.is_blocked(now) {
                return Ok(node.address.clone());
            }
        }
        Err(MgmtError::NoNodeAvailable)
    }

    /// Blocks the node with exactly this address. Returns false if the address is unknown.
    pub fn block_node(&self, address: &str, duration: Duration) -> bool {
        let mut cursor = self.cursor.lock();
        match cursor.nodes.iter_mut().find(|node| node.address == address) {
            Some(node) => {
                node.blocked_until = Some(deadline(duration));
                true
            }
            None => false,
        }
    }

    pub fn is_blocked(&self, address: &str) -> bool {
        let now = Instant::now();
        self.cursor
            .lock()
            .nodes
            .iter()
            .any(|node| node.address == address && node.is_blocked(now))
    }
}

/// All partitions of one cluster, ordered by name.
#[derive(Debug, Default)]
pub struct Ecs {
    vdcs: BTreeMap<String, Vdc>,
}

impl Ecs {
    pub fn new(vdcs: impl IntoIterator<Item = Vdc>) -> Self {
        Self {
            vdcs: vdcs.into_iter().map(|vdc| (vdc.name.clone(), vdc)).collect(),
        }
    }

    pub fn vdc(&self, name: &str) -> Option<&Vdc> {
        self.vdcs.get(name)
    }

    pub fn vdcs(&self) -> impl Iterator<Item = &Vdc> {
        self.vdcs.values()
    }

    /// Picks a node of the named partition. An unknown or empty name falls back to the first partition, in name
    /// order, that has an available node.
    pub fn next_available_node(&self, vdc: &str) -> Result<String, MgmtError> {
        if let Some(vdc) = self.vdcs.get(vdc) {
            return vdc.next_available_node();
        }
        self.vdcs
            .values()
            .find_map(|vdc| vdc.next_available_node().ok())
            .ok_or(MgmtError::NoNodeAvailable)
    }

    pub fn block_node(&self, address: &str, duration: Duration) {
        let blocked = self
            .vdcs
            .values()
            .fold(false, |blocked, vdc| vdc.block_node(address, duration) || blocked);
        if !blocked {
            debug!(address, "cannot block unknown node");
        }
    }

    pub fn is_blocked(&self, address: &str) -> bool {
        self.vdcs.values().any(|vdc| vdc.is_blocked(address))
    }
}

/// Splits `host:port` into its parts. Addresses without a numeric port, including bare IPv6 literals, are
/// returned whole.
pub fn split_host_port(address: &str) -> (&str, Option<&str>) {
    match address.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            (host, Some(port))
        }
        _ => (address, None),
    }
}
