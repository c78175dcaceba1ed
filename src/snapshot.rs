use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

use crate::error::StoreError;
use crate::ids::IdGenerator;
use crate::models::{AppKind, Priority, Record, Status};
use crate::utils::{normalize_tags, parse_date, parse_timestamp};

/// Version tag written into export documents
pub const SNAPSHOT_VERSION: &str = "1.0";

/// Versioned export document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub records: Vec<Record>,
    pub exported_at: DateTime<Utc>,
    pub version: String,
}

impl ExportDocument {
    /// File name for this export, dated by its UTC export time
    pub fn file_name(&self, kind: AppKind) -> String {
        export_file_name(kind, self.exported_at.date_naive())
    }
}

/// File name for an export taken on `date`: `<app>-export-<YYYY-MM-DD>.json`
pub fn export_file_name(kind: AppKind, date: NaiveDate) -> String {
    format!("{}-export-{}.json", kind.export_prefix(), date.format("%Y-%m-%d"))
}

/// Keep "field absent" (`None`) apart from "field is null" (`Some(None)`)
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TagsField {
    List(Vec<String>),
    Text(String),
}

/// A record as it appears in an import document or a stored slot, including
/// the legacy book (`title`/`author`/`isbn`/`category`/`addedAt`) and memo
/// (`text`/`completed`) shapes.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomingRecord {
    #[serde(default, deserialize_with = "present")]
    id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present", alias = "title", alias = "text")]
    primary_text: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", alias = "author")]
    secondary_text: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", alias = "isbn")]
    reference: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", alias = "category", alias = "priority")]
    classifier: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    status: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    completed: Option<Option<bool>>,
    #[serde(default, deserialize_with = "present", alias = "addedAt")]
    created_at: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    due_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    tags: Option<Option<TagsField>>,
}

/// A normalized record whose id has not been checked against the store yet
#[derive(Debug, Clone)]
pub struct PendingRecord {
    pub requested_id: Option<i64>,
    pub record: Record,
}

/// Decode either a bare record array or a `{ "records": [...] }` document
pub fn decode_records(
    kind: AppKind,
    input: &str,
    now: DateTime<Utc>,
) -> Result<Vec<PendingRecord>, StoreError> {
    let document: Value = serde_json::from_str(input)
        .map_err(|e| StoreError::FormatError(format!("Invalid JSON: {}", e)))?;

    let items = match document {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("records") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(StoreError::FormatError(
                    "`records` must be an array".to_string(),
                ))
            }
            None => {
                return Err(StoreError::FormatError(
                    "Expected a record array or an object with `records`".to_string(),
                ))
            }
        },
        _ => {
            return Err(StoreError::FormatError(
                "Expected a record array or an object with `records`".to_string(),
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let incoming: IncomingRecord = serde_json::from_value(item).map_err(|e| {
                StoreError::FormatError(format!("Record {}: {}", index, e))
            })?;
            normalize(kind, incoming, now)
                .map_err(|msg| StoreError::FormatError(format!("Record {}: {}", index, msg)))
        })
        .collect()
}

/// Text value or the kind default when absent, null or blank
fn text_or(value: Option<Option<String>>, default: &str) -> String {
    match value.flatten() {
        Some(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => default.to_string(),
    }
}

fn normalize(
    kind: AppKind,
    incoming: IncomingRecord,
    now: DateTime<Utc>,
) -> Result<PendingRecord, String> {
    let primary_text = match incoming.primary_text.flatten() {
        Some(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => return Err("missing primary text".to_string()),
    };

    let classifier = match kind {
        AppKind::Library => text_or(incoming.classifier, kind.default_classifier()),
        AppKind::Memos => match incoming.classifier.flatten() {
            Some(text) if !text.trim().is_empty() => {
                text.parse::<Priority>()?.as_str().to_string()
            }
            _ => kind.default_classifier().to_string(),
        },
    };

    let status = match (incoming.status.flatten(), incoming.completed.flatten()) {
        (Some(status), _) => kind.normalize_status(status.parse::<Status>()?),
        (None, Some(true)) => kind.closed_status(),
        (None, Some(false)) | (None, None) => kind.open_status(),
    };

    let created_at = match incoming.created_at.flatten() {
        Some(ts) => parse_timestamp(ts.trim())
            .map_err(|e| format!("invalid createdAt '{}': {}", ts, e))?,
        None => now,
    };

    let due_date = match incoming.due_date {
        None | Some(None) => None,
        Some(Some(text)) if text.trim().is_empty() => None,
        Some(Some(text)) => Some(parse_due_date(text.trim())?),
    };

    let tags = match incoming.tags.flatten() {
        None => Vec::new(),
        Some(TagsField::List(list)) => normalize_tags(list),
        Some(TagsField::Text(text)) => normalize_tags(text.split(',')),
    };

    Ok(PendingRecord {
        requested_id: incoming.id.flatten(),
        record: Record {
            id: 0,
            primary_text,
            secondary_text: text_or(incoming.secondary_text, kind.default_secondary()),
            reference: text_or(incoming.reference, kind.default_reference()),
            classifier,
            status,
            created_at,
            due_date,
            tags,
        },
    })
}

fn parse_due_date(text: &str) -> Result<NaiveDate, String> {
    parse_date(text)
        .or_else(|_| parse_timestamp(text).map(|ts| ts.date_naive()))
        .map_err(|e| format!("invalid dueDate '{}': {}", text, e))
}

/// Give every pending record a final id.
///
/// Requested ids are kept unless they collide with `existing`, with an
/// earlier record of the same batch, or sit at the top of the id range;
/// those records get fresh ids from `ids`.
pub fn assign_ids(
    pending: Vec<PendingRecord>,
    existing: &HashSet<i64>,
    ids: &mut IdGenerator,
    now: DateTime<Utc>,
) -> Result<Vec<Record>, StoreError> {
    let mut taken = existing.clone();
    let mut keep = Vec::with_capacity(pending.len());

    // Claim requested ids first so fresh ids land above all of them
    for item in &pending {
        let kept = match item.requested_id {
            Some(id) if IdGenerator::can_adopt(id) && taken.insert(id) => {
                ids.observe(id);
                true
            }
            _ => false,
        };
        keep.push(kept);
    }

    pending
        .into_iter()
        .zip(keep)
        .map(|(item, kept)| {
            let mut record = item.record;
            match item.requested_id {
                Some(id) if kept => record.id = id,
                requested => {
                    record.id = ids.next_id(now).ok_or(StoreError::IdExhausted)?;
                    if let Some(requested) = requested {
                        warn!(requested_id = requested, record_id = record.id, "Reassigned record id");
                    }
                }
            }
            Ok(record)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    fn decode(kind: AppKind, input: &str) -> Result<Vec<Record>, StoreError> {
        let pending = decode_records(kind, input, now())?;
        assign_ids(pending, &HashSet::new(), &mut IdGenerator::default(), now())
    }

    #[test]
    fn minimal_record_gets_defaults() {
        let records = decode(AppKind::Memos, r#"{"records":[{"id":1,"primaryText":"X"}]}"#).unwrap();
        assert_eq!(records.len(), 1);

        let r = &records[0];
        assert_eq!(r.id, 1);
        assert_eq!(r.primary_text, "X");
        assert_eq!(r.classifier, "medium");
        assert_eq!(r.status, Status::Active);
        assert!(r.tags.is_empty());
        assert!(r.due_date.is_none());
        assert_eq!(r.created_at, now());
    }

    #[test]
    fn legacy_book_shape_is_understood() {
        let input = r#"[{
            "id": 1700000000001,
            "title": "Dune",
            "author": "Frank Herbert",
            "isbn": "978-0441013593",
            "category": "",
            "status": "borrowed",
            "addedAt": "2024-01-02T03:04:05.000Z"
        }]"#;
        let records = decode(AppKind::Library, input).unwrap();

        let r = &records[0];
        assert_eq!(r.primary_text, "Dune");
        assert_eq!(r.secondary_text, "Frank Herbert");
        assert_eq!(r.reference, "978-0441013593");
        assert_eq!(r.classifier, "other");
        assert_eq!(r.status, Status::Borrowed);
        assert_eq!(r.created_at.to_rfc3339(), "2024-01-02T03:04:05+00:00");
    }

    #[test]
    fn legacy_memo_completed_flag_maps_to_status() {
        let input = r#"[{"id": 3, "text": "buy milk", "completed": true, "createdAt": "2024-01-02T03:04:05Z"}]"#;
        let records = decode(AppKind::Memos, input).unwrap();
        assert_eq!(records[0].status, Status::Completed);
        assert_eq!(records[0].primary_text, "buy milk");
    }

    #[test]
    fn due_date_null_and_absent_both_mean_none() {
        let input = r#"[{"text": "a", "dueDate": null}, {"text": "b"}, {"text": "c", "dueDate": ""}, {"text": "d", "dueDate": "2025-05-01"}]"#;
        let records = decode(AppKind::Memos, input).unwrap();
        assert!(records[0].due_date.is_none());
        assert!(records[1].due_date.is_none());
        assert!(records[2].due_date.is_none());
        assert_eq!(records[3].due_date, NaiveDate::from_ymd_opt(2025, 5, 1));
    }

    #[test]
    fn tags_accept_list_or_comma_string() {
        let input = r#"[{"text": "a", "tags": ["x", " y ", "x"]}, {"text": "b", "tags": "home, work"}]"#;
        let records = decode(AppKind::Memos, input).unwrap();
        assert_eq!(records[0].tags, vec!["x", "y"]);
        assert_eq!(records[1].tags, vec!["home", "work"]);
    }

    #[test]
    fn status_from_other_vocabulary_maps_by_openness() {
        let records = decode(AppKind::Memos, r#"[{"text": "a", "status": "borrowed"}]"#).unwrap();
        assert_eq!(records[0].status, Status::Completed);
    }

    #[test]
    fn rejects_unrecognized_shapes() {
        for input in [
            r#"{"memos": []}"#,
            r#"{"records": {"id": 1}}"#,
            r#""records""#,
            r#"42"#,
            r#"not json"#,
        ] {
            let err = decode(AppKind::Memos, input).unwrap_err();
            assert!(matches!(err, StoreError::FormatError(_)), "{input}");
        }
    }

    #[test]
    fn rejects_invalid_records() {
        for input in [
            r#"[{"id": 1}]"#,
            r#"[{"text": "   "}]"#,
            r#"[{"text": "a", "status": "lost"}]"#,
            r#"[{"text": "a", "priority": "urgent"}]"#,
            r#"[{"text": "a", "dueDate": "soon"}]"#,
            r#"[{"text": "a", "createdAt": "yesterday"}]"#,
        ] {
            assert!(decode(AppKind::Memos, input).is_err(), "{input}");
        }
    }

    #[test]
    fn colliding_ids_are_reassigned() {
        let pending = decode_records(
            AppKind::Memos,
            r#"[{"id": 7, "text": "a"}, {"id": 7, "text": "b"}, {"id": 9, "text": "c"}]"#,
            now(),
        )
        .unwrap();
        let existing: HashSet<i64> = [9].into_iter().collect();
        let mut ids = IdGenerator::default();

        let records = assign_ids(pending, &existing, &mut ids, now()).unwrap();
        assert_eq!(records[0].id, 7);
        assert_ne!(records[1].id, 7);
        assert_ne!(records[2].id, 9);
        assert_ne!(records[1].id, records[2].id);
    }

    #[test]
    fn top_of_id_range_is_not_kept() {
        let pending = decode_records(
            AppKind::Memos,
            r#"[{"id": 9223372036854775807, "text": "a"}]"#,
            now(),
        )
        .unwrap();
        let mut ids = IdGenerator::default();

        let records = assign_ids(pending, &HashSet::new(), &mut ids, now()).unwrap();
        assert_ne!(records[0].id, i64::MAX);
        assert!(ids.next_id(now()).is_some());
    }

    #[test]
    fn export_file_name_uses_app_prefix() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 9).unwrap();
        assert_eq!(export_file_name(AppKind::Library, date), "library-export-2024-06-09.json");
        assert_eq!(export_file_name(AppKind::Memos, date), "memos-export-2024-06-09.json");
    }
}
