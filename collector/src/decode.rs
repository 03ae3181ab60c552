use crate::{
    CollectError,
    Record,
};
use serde_json::Value;

/// The response shapes the management API wraps record lists in, checked in this order.
#[derive(Debug)]
pub enum Envelope {
    /// `{"_embedded": {"_instances": [...]}}`
    Embedded(Value),
    Alerts(Value),
    AuditEvents(Value),
    NsBilling(Value),
    NsBillingSample(Value),
    /// Any other object is a record by itself.
    Single(Record),
}

impl Envelope {
    pub fn classify(body: Value) -> Result<Self, CollectError> {
        let Value::Object(mut object) = body else {
            return Err(CollectError::invalid("response body is not a JSON object"));
        };

        let envelope = if let Some(embedded) = object.remove("_embedded") {
            Envelope::Embedded(embedded)
        } else if let Some(alerts) = object.remove("alert") {
            Envelope::Alerts(alerts)
        } else if let Some(events) = object.remove("auditevent") {
            Envelope::AuditEvents(events)
        } else if let Some(billing) = object.remove("namespace_billing_infos") {
            Envelope::NsBilling(billing)
        } else if let Some(samples) = object.remove("namespace_billing_sample_infos") {
            Envelope::NsBillingSample(samples)
        } else {
            Envelope::Single(object)
        };
        Ok(envelope)
    }

    pub fn into_records(self) -> Result<Vec<Record>, CollectError> {
        match self {
            Envelope::Embedded(Value::Object(mut embedded)) => match embedded.remove("_instances") {
                Some(instances) => objects(instances, "_instances"),
                None => Ok(Vec::new()),
            },
            Envelope::Embedded(_) => Err(CollectError::invalid("_embedded is not an object")),
            Envelope::Alerts(list) => objects_skipping_others(list, "alert"),
            Envelope::AuditEvents(list) => objects_skipping_others(list, "auditevent"),
            Envelope::NsBilling(list) => objects(list, "namespace_billing_infos"),
            Envelope::NsBillingSample(list) => objects(list, "namespace_billing_sample_infos"),
            Envelope::Single(record) => Ok(vec![record]),
        }
    }
}

pub fn decode(body: &[u8]) -> Result<Vec<Record>, CollectError> {
    let value: Value = serde_json::from_slice(body)?;
    Envelope::classify(value)?.into_records()
}

fn array(value: Value, field: &str) -> Result<Vec<Value>, CollectError> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(CollectError::invalid(format!("{field} is not a list"))),
    }
}

fn objects(value: Value, field: &str) -> Result<Vec<Record>, CollectError> {
    array(value, field)?
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => Ok(record),
            _ => Err(CollectError::invalid(format!("{field} contains a non-object item"))),
        })
        .collect()
}

fn objects_skipping_others(value: Value, field: &str) -> Result<Vec<Record>, CollectError> {
    Ok(array(value, field)?
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(record) => Some(record),
            _ => None,
        })
        .collect())
}
