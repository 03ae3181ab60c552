use crate::Record;
use serde_json::Value;

const TIME_SERIES_SUFFIXES: [&str; 3] = ["Current", "CurrentL1", "CurrentL2"];
const TIMESTAMP_KEY: &str = "t";

fn is_time_series(key: &str) -> bool {
    TIME_SERIES_SUFFIXES.iter().any(|suffix| key.ends_with(suffix))
}

/// Flattens the time-series fields of a record in place and drops `_links`.
///
/// `xCurrent: {"a": 1, "t": 0}` becomes `xCurrent_a: 1`, a list keeps only its first sample. The `t` timestamp of a
/// sample is dropped, and so is a time-series field holding a plain scalar.
pub fn transform(record: &mut Record) {
    record.remove("_links");

    let keys: Vec<String> = record.keys().filter(|key| is_time_series(key)).cloned().collect();
    for key in keys {
        let Some(value) = record.remove(&key) else {
            continue;
        };
        match value {
            Value::Object(fields) => {
                for (sub_key, sub_value) in fields {
                    if sub_key == TIMESTAMP_KEY {
                        continue;
                    }
                    let sub_key = format!("{key}_{sub_key}");
                    match sub_value {
                        Value::Array(samples) => insert_first_sample(record, &sub_key, samples),
                        other => {
                            record.insert(sub_key, other);
                        }
                    }
                }
            }
            Value::Array(samples) => insert_first_sample(record, &key, samples),
            _ => {}
        }
    }
}

fn insert_first_sample(record: &mut Record, prefix: &str, samples: Vec<Value>) {
    let Some(Value::Object(sample)) = samples.into_iter().next() else {
        return;
    };
    for (key, value) in sample {
        if key != TIMESTAMP_KEY {
            record.insert(format!("{prefix}_{key}"), value);
        }
    }
}
