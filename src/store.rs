use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::ids::{Clock, IdGenerator, SystemClock};
use crate::models::{
    AppKind, NewRecord, Priority, Query, Record, RecordEdit, RecordOptions, Stats, Status,
};
use crate::snapshot::{self, ExportDocument, SNAPSHOT_VERSION};
use crate::storage::Storage;
use crate::utils::normalize_tags;

/// The ordered record list of one application, written through to a storage slot.
///
/// Every mutation is applied to a copy of the list, persisted, and only then
/// committed, so a failed write leaves the store exactly as it was.
pub struct RecordStore<S: Storage> {
    storage: S,
    kind: AppKind,
    records: Vec<Record>,
    ids: IdGenerator,
    clock: Box<dyn Clock>,
}

impl<S: Storage> RecordStore<S> {
    /// Load the records of `kind` from `storage`
    pub fn open(storage: S, kind: AppKind) -> Result<Self, StoreError> {
        Self::with_clock(storage, kind, Box::new(SystemClock))
    }

    /// Like `open`, with a custom time source
    pub fn with_clock(storage: S, kind: AppKind, clock: Box<dyn Clock>) -> Result<Self, StoreError> {
        let key = kind.storage_key();
        let raw = storage.get_item(key)?;
        let now = clock.now();

        // Unreadable slot content is treated as an empty list
        let records = match raw {
            None => Vec::new(),
            Some(text) => match snapshot::decode_records(kind, &text, now).and_then(|pending| {
                snapshot::assign_ids(pending, &HashSet::new(), &mut IdGenerator::default(), now)
            }) {
                Ok(records) => records,
                Err(e) => {
                    warn!(key = key, error = %e, "Discarding unreadable stored records");
                    Vec::new()
                }
            },
        };
        let ids = IdGenerator::seeded(records.iter().map(|r| r.id));

        debug!(key = key, count = records.len(), "Opened record store");

        Ok(Self {
            storage,
            kind,
            records,
            ids,
            clock,
        })
    }

    pub fn kind(&self) -> AppKind {
        self.kind
    }

    /// All records, most recent first
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, id: i64) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Write `next` to the slot and make it the current list
    fn commit(&mut self, next: Vec<Record>) -> Result<(), StoreError> {
        let json = serde_json::to_string(&next)?;
        self.storage.set_item(self.kind.storage_key(), &json)?;
        self.records = next;
        Ok(())
    }

    /// Apply `update` to the record with `id`; `Ok(false)` if there is none
    fn update_record<F>(&mut self, id: i64, update: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Record),
    {
        let Some(index) = self.records.iter().position(|r| r.id == id) else {
            return Ok(false);
        };

        let mut next = self.records.clone();
        update(&mut next[index]);
        self.commit(next)?;
        Ok(true)
    }

    /// Classifier text for this kind; memos only take a priority name
    fn resolve_classifier(&self, value: &str) -> Result<String, StoreError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(self.kind.default_classifier().to_string());
        }
        match self.kind {
            AppKind::Library => Ok(value.to_string()),
            AppKind::Memos => value
                .parse::<Priority>()
                .map(|p| p.as_str().to_string())
                .map_err(StoreError::ValidationError),
        }
    }

    /// Add a record at the head of the list
    pub fn add(&mut self, new: NewRecord) -> Result<Record, StoreError> {
        let primary_text = required_text(&new.primary_text)?;
        let classifier = match new.classifier.as_deref() {
            Some(value) => self.resolve_classifier(value)?,
            None => self.kind.default_classifier().to_string(),
        };

        let now = self.clock.now();
        let mut ids = self.ids.clone();
        let id = ids.next_id(now).ok_or(StoreError::IdExhausted)?;

        let mut record = Record::new(self.kind, id, primary_text, now);
        record.secondary_text = text_or(new.secondary_text.as_deref(), self.kind.default_secondary());
        record.reference = text_or(new.reference.as_deref(), self.kind.default_reference());
        record.classifier = classifier;

        let mut next = Vec::with_capacity(self.records.len() + 1);
        next.push(record.clone());
        next.extend(self.records.iter().cloned());
        self.commit(next)?;
        self.ids = ids;

        debug!(record_id = id, kind = %self.kind, "Added record");
        Ok(record)
    }

    /// Set the status of a record (borrow/return a book, complete/reopen a memo)
    pub fn set_status(&mut self, id: i64, status: Status) -> Result<bool, StoreError> {
        if !self.kind.accepts(status) {
            return Err(StoreError::ValidationError(format!(
                "Status '{}' does not apply to {}",
                status, self.kind
            )));
        }

        let changed = self.update_record(id, |r| r.status = status)?;
        if changed {
            debug!(record_id = id, status = %status, "Updated record status");
        }
        Ok(changed)
    }

    /// Flip a record between its open and closed status
    pub fn toggle_status(&mut self, id: i64) -> Result<bool, StoreError> {
        let kind = self.kind;
        let changed = self.update_record(id, |r| r.status = kind.toggle(r.status))?;
        if changed {
            debug!(record_id = id, "Toggled record status");
        }
        Ok(changed)
    }

    /// Overwrite the text fields of a record
    pub fn edit(&mut self, id: i64, edit: RecordEdit) -> Result<bool, StoreError> {
        let primary_text = required_text(&edit.primary_text)?;
        let classifier = match edit.classifier.as_deref() {
            Some(value) => Some(self.resolve_classifier(value)?),
            None => None,
        };

        let kind = self.kind;
        let changed = self.update_record(id, |r| {
            r.primary_text = primary_text;
            if let Some(text) = edit.secondary_text.as_deref() {
                r.secondary_text = text_or(Some(text), kind.default_secondary());
            }
            if let Some(text) = edit.reference.as_deref() {
                r.reference = text_or(Some(text), kind.default_reference());
            }
            if let Some(classifier) = classifier {
                r.classifier = classifier;
            }
        })?;
        if changed {
            debug!(record_id = id, "Edited record");
        }
        Ok(changed)
    }

    /// Partially update memo priority, due date and tags
    pub fn update_options(&mut self, id: i64, options: RecordOptions) -> Result<bool, StoreError> {
        if self.kind != AppKind::Memos {
            return Err(StoreError::ValidationError(format!(
                "Priority, due date and tags are not available for {}",
                self.kind
            )));
        }

        let changed = self.update_record(id, |r| {
            if let Some(priority) = options.priority {
                r.classifier = priority.as_str().to_string();
            }
            if let Some(due_date) = options.due_date {
                r.due_date = due_date;
            }
            if let Some(tags) = options.tags {
                r.tags = normalize_tags(tags);
            }
        })?;
        if changed {
            debug!(record_id = id, "Updated record options");
        }
        Ok(changed)
    }

    /// Remove a record; `Ok(false)` if it was not there
    pub fn delete(&mut self, id: i64) -> Result<bool, StoreError> {
        if !self.records.iter().any(|r| r.id == id) {
            return Ok(false);
        }

        let next: Vec<Record> = self.records.iter().filter(|r| r.id != id).cloned().collect();
        self.commit(next)?;
        debug!(record_id = id, "Deleted record");
        Ok(true)
    }

    /// Remove every record, returning how many were removed
    pub fn clear_all(&mut self) -> Result<usize, StoreError> {
        let removed = self.records.len();
        self.commit(Vec::new())?;
        info!(removed = removed, kind = %self.kind, "Cleared all records");
        Ok(removed)
    }

    /// Remove borrowed books / completed memos
    pub fn clear_completed(&mut self) -> Result<usize, StoreError> {
        let next: Vec<Record> = self.records.iter().filter(|r| !r.is_closed()).cloned().collect();
        let removed = self.records.len() - next.len();
        self.commit(next)?;
        info!(removed = removed, kind = %self.kind, "Cleared completed records");
        Ok(removed)
    }

    /// Records passing the status filter and search term, in store order
    pub fn query(&self, query: &Query) -> Vec<&Record> {
        let needle = query.search.trim().to_lowercase();
        self.records
            .iter()
            .filter(|r| query.filter.matches(r.status))
            .filter(|r| needle.is_empty() || r.matches_search(&needle))
            .collect()
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn count_by_status(&self, status: Status) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn stats(&self) -> Stats {
        let closed = self.records.iter().filter(|r| r.is_closed()).count();
        Stats {
            total: self.records.len(),
            open: self.records.len() - closed,
            closed,
        }
    }

    pub fn export_document(&self) -> ExportDocument {
        ExportDocument {
            records: self.records.clone(),
            exported_at: self.clock.now(),
            version: SNAPSHOT_VERSION.to_string(),
        }
    }

    /// Pretty-printed JSON export of every record
    pub fn export_snapshot(&self) -> Result<String, StoreError> {
        let document = self.export_document();
        let json = serde_json::to_string_pretty(&document)?;
        info!(count = document.records.len(), kind = %self.kind, "Exported snapshot");
        Ok(json)
    }

    /// Prepend the records of an export document (or a bare record array).
    ///
    /// Nothing changes unless the whole document is valid.
    pub fn import_snapshot(&mut self, input: &str) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let pending = snapshot::decode_records(self.kind, input, now)?;

        let existing: HashSet<i64> = self.records.iter().map(|r| r.id).collect();
        let mut ids = self.ids.clone();
        let mut next = snapshot::assign_ids(pending, &existing, &mut ids, now)?;
        let imported = next.len();

        next.extend(self.records.iter().cloned());
        self.commit(next)?;
        self.ids = ids;

        info!(imported = imported, kind = %self.kind, "Imported snapshot");
        Ok(imported)
    }

    /// Fill an empty store with a few example records
    pub fn seed_samples(&mut self) -> Result<usize, StoreError> {
        if !self.records.is_empty() {
            return Ok(0);
        }

        let now = self.clock.now();
        let mut ids = self.ids.clone();
        let samples = sample_records(self.kind)
            .into_iter()
            .map(|(new, status, tags)| {
                let id = ids.next_id(now).ok_or(StoreError::IdExhausted)?;
                let mut record = Record::new(self.kind, id, new.primary_text, now);
                record.secondary_text = text_or(new.secondary_text.as_deref(), self.kind.default_secondary());
                record.reference = text_or(new.reference.as_deref(), self.kind.default_reference());
                record.classifier = text_or(new.classifier.as_deref(), self.kind.default_classifier());
                record.status = status;
                record.tags = normalize_tags(tags);
                Ok(record)
            })
            .collect::<Result<Vec<Record>, StoreError>>()?;

        let seeded = samples.len();
        self.commit(samples)?;
        self.ids = ids;
        info!(seeded = seeded, kind = %self.kind, "Seeded sample records");
        Ok(seeded)
    }
}

fn required_text(text: &str) -> Result<String, StoreError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(StoreError::ValidationError("Text must not be empty".to_string()));
    }
    Ok(text.to_string())
}

fn text_or(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => default.to_string(),
    }
}

fn sample_records(kind: AppKind) -> Vec<(NewRecord, Status, Vec<&'static str>)> {
    match kind {
        AppKind::Library => vec![
            (
                NewRecord::new("Professional JavaScript for Web Developers")
                    .secondary("Nicholas C. Zakas")
                    .reference("978-7-115-23955-1")
                    .classifier("technology"),
                Status::Available,
                Vec::new(),
            ),
            (
                NewRecord::new("Dream of the Red Chamber")
                    .secondary("Cao Xueqin")
                    .reference("978-7-01-000195-0")
                    .classifier("literature"),
                Status::Borrowed,
                Vec::new(),
            ),
        ],
        AppKind::Memos => vec![
            (
                NewRecord::new("Return the library books").classifier("high"),
                Status::Active,
                vec!["errands"],
            ),
            (
                NewRecord::new("Export a backup of the memo list").classifier("low"),
                Status::Active,
                Vec::new(),
            ),
        ],
    }
}
