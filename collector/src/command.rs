use chrono::{
    DateTime,
    DurationRound,
    TimeDelta,
    Utc,
};
use ecsbeat_config::{
    CommandConfig,
    Level,
};
use std::{
    fmt,
    time::Duration,
};

pub const NODE_PLACEHOLDER: &str = "{node}";
const WINDOW_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// The `type` tag of a query. Only a few kinds change how a query is issued, everything else is carried through
/// to the records as is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKind {
    NsBilling,
    NsBillingSample,
    Alert,
    AuditEvent,
    Nodes,
    DtInfo,
    Other(String),
}

impl QueryKind {
    pub fn as_str(&self) -> &str {
        match self {
            QueryKind::NsBilling => "nsbilling",
            QueryKind::NsBillingSample => "nsbillingsample",
            QueryKind::Alert => "alert",
            QueryKind::AuditEvent => "auditevent",
            QueryKind::Nodes => "nodes",
            QueryKind::DtInfo => "dtinfo",
            QueryKind::Other(kind) => kind,
        }
    }

    /// Billing queries POST batches of namespace ids instead of issuing a single GET.
    pub fn is_billing(&self) -> bool {
        matches!(self, QueryKind::NsBilling | QueryKind::NsBillingSample)
    }

    /// Rounding granularity of the `start_time`/`end_time` window for kinds that take one.
    pub fn window_granularity(&self) -> Option<TimeDelta> {
        match self {
            QueryKind::NsBillingSample => Some(TimeDelta::minutes(5)),
            QueryKind::Alert | QueryKind::AuditEvent => Some(TimeDelta::minutes(1)),
            _ => None,
        }
    }
}

impl From<&str> for QueryKind {
    fn from(kind: &str) -> Self {
        match kind {
            "nsbilling" => QueryKind::NsBilling,
            "nsbillingsample" => QueryKind::NsBillingSample,
            "alert" => QueryKind::Alert,
            "auditevent" => QueryKind::AuditEvent,
            "nodes" => QueryKind::Nodes,
            "dtinfo" => QueryKind::DtInfo,
            other => QueryKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One polled query. Immutable once built.
#[derive(Debug, Clone)]
pub struct Command {
    pub uri: String,
    pub kind: QueryKind,
    pub level: Level,
    pub interval: Duration,
}

impl Command {
    pub fn new(uri: impl Into<String>, kind: impl AsRef<str>, level: Level, interval: Duration) -> Self {
        Self {
            uri: uri.into(),
            kind: QueryKind::from(kind.as_ref()),
            level,
            interval,
        }
    }

    pub fn from_config(config: &CommandConfig, interval: Duration) -> Self {
        Self::new(config.uri.clone(), &config.kind, config.level, interval)
    }

    /// The request path for this query at `now`: `{node}` replaced by the node address and, for windowed kinds,
    /// the time window appended.
    pub fn filled_uri(&self, node: Option<&str>, now: DateTime<Utc>) -> String {
        let mut uri = match node {
            Some(node) => self.uri.replace(NODE_PLACEHOLDER, node),
            None => self.uri.clone(),
        };

        if let Some(granularity) = self.kind.window_granularity() {
            let (start, end) = self.window(now, granularity);
            let separator = if uri.contains('?') { '&' } else { '?' };
            uri.push_str(&format!(
                "{separator}start_time={}&end_time={}",
                start.format(WINDOW_FORMAT),
                end.format(WINDOW_FORMAT)
            ));
        }
        uri
    }

    /// The window ends one granularity before `now`, rounded down, so it never reaches into the future.
    fn window(&self, now: DateTime<Utc>, granularity: TimeDelta) -> (DateTime<Utc>, DateTime<Utc>) {
        let shifted = now - granularity;
        let end = shifted.duration_trunc(granularity).unwrap_or(shifted);
        let span = TimeDelta::from_std(self.interval).unwrap_or(TimeDelta::zero());
        (end - span, end)
    }
}
