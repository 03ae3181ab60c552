//! Directory table (DT) health from the node-local diagnostic endpoints.
//!
//! `DumpOwnershipInfo` is a line oriented text dump with one bracketed record per table. `DTInitStat` is an XML
//! document that lists the tables which are not ready, grouped by error name. Overlaying the latter onto the former
//! yields one entry per table with its readiness.

use crate::{
    MgmtClient,
    MgmtError,
};
use quick_xml::{
    events::Event,
    Reader,
};
use serde_json::{
    Map,
    Value,
};
use std::collections::HashMap;

pub const OWNERSHIP_INFO_PATH: &str = "/diagnostic/DumpOwnershipInfo/";
pub const INIT_STAT_PATH: &str = "/stats/dt/DTInitStat/";

const NO_RESPONSE_ERROR: &str = "ERROR_RPC_CLIENT_NO_RESPONSE";
const SUMMARY_ELEMENTS: [&str; 5] = ["type", "level", "total_dt_num", "unready_dt_num", "unknown_dt_num"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DtEntry {
    pub id: String,
    pub created: String,
    pub error: String,
    pub down: u8,
    pub ready: u8,
    pub level: String,
    pub owner_ip: String,
    pub partition: String,
    pub status: String,
    pub dt_type: String,
    pub type_level: String,
}

impl DtEntry {
    fn from_id(id: impl Into<String>) -> Self {
        let mut entry = Self {
            id: id.into(),
            created: "false".to_string(),
            ready: 1,
            status: "ready".to_string(),
            ..Default::default()
        };
        entry.apply_id_segments();
        entry
    }

    /// `<prefix>_<n>_<type>_<partition>_<n>_<level>`
    fn apply_id_segments(&mut self) {
        let segments: Vec<&str> = self.id.split('_').collect();
        if let Some(dt_type) = segments.get(2) {
            self.dt_type = dt_type.to_string();
        }
        if let Some(partition) = segments.get(3) {
            self.partition = partition.to_string();
        }
        if let Some(level) = segments.get(5) {
            self.level = level.to_string();
        }
        self.type_level = format!("{}_{}", self.dt_type, self.level);
    }

    fn overlay(&mut self, failing: &DtEntry) {
        self.error = failing.error.clone();
        self.status = failing.status.clone();
        self.ready = failing.ready;
        self.down = failing.down;
    }

    pub fn into_record(self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("dt-id".into(), self.id.into());
        record.insert("dt-created".into(), self.created.into());
        record.insert("dt-error".into(), self.error.into());
        record.insert("dt-down".into(), self.down.into());
        record.insert("dt-level".into(), self.level.into());
        record.insert("dt-owner-ip".into(), self.owner_ip.into());
        record.insert("dt-ready".into(), self.ready.into());
        record.insert("dt-partition".into(), self.partition.into());
        record.insert("dt-status".into(), self.status.into());
        record.insert("dt-type".into(), self.dt_type.into());
        record.insert("dt-type-level".into(), self.type_level.into());
        record
    }
}

/// Last non-empty `:` segment of a table urn.
fn short_id(urn: &str) -> &str {
    urn.trim().trim_end_matches(':').rsplit(':').next().unwrap_or_default()
}

/// Parses one `[id: <urn>, owner: <ip:port>, creationCompleted: <bool>]` record. Lines without a record or
/// without an id are skipped.
pub fn parse_ownership_line(line: &str) -> Option<DtEntry> {
    let start = line.find("[id:")?;
    let mut id = None;
    let mut owner = "";
    let mut created = None;

    for part in line[start..].split(',') {
        let part = part.trim().trim_start_matches('[').trim_end_matches(']');
        let Some((key, value)) = part.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "id" => id = Some(short_id(value)).filter(|id| !id.is_empty()),
            "owner" => owner = value.rsplit_once(':').map_or(value, |(host, _)| host),
            "creationCompleted" => created = Some(value),
            _ => {}
        }
    }

    let mut entry = DtEntry::from_id(id?);
    entry.owner_ip = owner.to_string();
    if let Some(created) = created {
        entry.created = created.to_string();
    }
    Some(entry)
}

pub fn parse_ownership_dump(text: &str) -> Vec<DtEntry> {
    text.lines().filter_map(parse_ownership_line).collect()
}

/// Parses the `DTInitStat` document into the tables it reports as failing. Each child of an `entry` element that
/// holds urns names the error those tables are in.
pub fn parse_init_stats(xml: &str) -> Result<Vec<DtEntry>, MgmtError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut item: Option<(String, usize)> = None;
    let mut content = String::new();
    let mut failing = Vec::new();

    loop {
        match reader.read_event() {
            Err(err) => return Err(MgmtError::Diagnostic(err.to_string())),
            Ok(Event::Eof) => break,
            Ok(Event::Start(start)) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                let in_entry = path.last().is_some_and(|parent| parent == "entry");
                path.push(name.clone());
                if in_entry && item.is_none() {
                    item = Some((name, path.len()));
                    content.clear();
                }
            }
            Ok(Event::Text(text)) if item.is_some() => {
                let text = text.unescape().map_err(|err| MgmtError::Diagnostic(err.to_string()))?;
                content.push_str(&text);
            }
            Ok(Event::CData(data)) if item.is_some() => {
                content.push_str(&String::from_utf8_lossy(&data));
            }
            Ok(Event::End(_)) => {
                if let Some((name, depth)) = &item {
                    if *depth == path.len() {
                        failing.extend(failing_tables(name, &content));
                        item = None;
                    }
                }
                path.pop();
            }
            Ok(_) => {}
        }
    }

    Ok(failing)
}

fn failing_tables(error: &str, content: &str) -> Vec<DtEntry> {
    if SUMMARY_ELEMENTS.contains(&error) || !content.contains("urn:") {
        return Vec::new();
    }

    let (status, ready, down) = if error.contains(NO_RESPONSE_ERROR) {
        ("unknown", 0, 0)
    } else {
        ("unready", 0, 1)
    };

    content
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(short_id)
        .filter(|id| !id.is_empty())
        .map(|id| DtEntry {
            id: id.to_string(),
            error: error.to_string(),
            status: status.to_string(),
            ready,
            down,
            ..Default::default()
        })
        .collect()
}

/// Copies error, status and readiness of failing tables onto the matching ownership entries.
pub fn reconcile(mut entries: Vec<DtEntry>, failing: &[DtEntry]) -> Vec<DtEntry> {
    let mut by_id: HashMap<&str, &DtEntry> = HashMap::new();
    for entry in failing {
        by_id.entry(entry.id.as_str()).or_insert(entry);
    }
    for entry in &mut entries {
        if let Some(failing) = by_id.get(entry.id.as_str()) {
            entry.overlay(failing);
        }
    }
    entries
}

impl MgmtClient {
    pub async fn dt_infos(&self, address: &str) -> Result<Vec<DtEntry>, MgmtError> {
        let text = self.get_auxiliary(address, OWNERSHIP_INFO_PATH).await?;
        Ok(parse_ownership_dump(&text))
    }

    pub async fn dt_inits(&self, address: &str) -> Result<Vec<DtEntry>, MgmtError> {
        let xml = self.get_auxiliary(address, INIT_STAT_PATH).await?;
        parse_init_stats(&xml)
    }
}
