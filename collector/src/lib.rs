//! # Collector
//!
//! Polls the management API of every configured cluster and turns the responses into flat records.
//!
//! - [`Worker`]: one per command, fetches on its own timer and emits records onto its own stream
//! - [`generate_events`]: fans a command out over the partitions and nodes of one cluster
//! - [`decode`] / [`transform`] / [`enrich`]: response envelope dispatch, time-series flattening, identity fields
//! - [`publish_all`]: merges all worker streams into a [`Sink`]
//! - [`Ecsbeat`]: wires clusters, metadata refresh, workers and the publisher together

#[macro_use]
extern crate tracing;

mod beat;
pub mod cluster;
mod command;
mod decode;
mod error;
pub mod events;
mod publish;
mod record;
mod transform;
mod worker;

pub use beat::Ecsbeat;
pub use cluster::{
    Cluster,
    ClusterConfig,
};
pub use command::{
    Command,
    QueryKind,
};
pub use decode::{
    decode,
    Envelope,
};
pub use error::CollectError;
pub use events::generate_events;
pub use publish::{
    publish_all,
    ChannelSink,
    JsonLinesSink,
    Sink,
};
pub use record::{
    enrich,
    Origin,
    Record,
};
pub use transform::transform;
pub use worker::{
    emit,
    Worker,
};
