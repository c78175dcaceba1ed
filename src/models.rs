use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which application a store belongs to (book catalog or memo list)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppKind {
    Library,
    Memos,
}

impl AppKind {
    /// Key of the storage slot holding this application's records
    pub fn storage_key(self) -> &'static str {
        match self {
            AppKind::Library => "library-books",
            AppKind::Memos => "memos",
        }
    }

    /// Prefix used for export file names
    pub fn export_prefix(self) -> &'static str {
        match self {
            AppKind::Library => "library",
            AppKind::Memos => "memos",
        }
    }

    /// Status given to newly created records
    pub fn open_status(self) -> Status {
        match self {
            AppKind::Library => Status::Available,
            AppKind::Memos => Status::Active,
        }
    }

    pub fn closed_status(self) -> Status {
        match self {
            AppKind::Library => Status::Borrowed,
            AppKind::Memos => Status::Completed,
        }
    }

    /// Whether `status` belongs to this application's vocabulary
    pub fn accepts(self, status: Status) -> bool {
        status == self.open_status() || status == self.closed_status()
    }

    /// Map a status from either vocabulary onto this one, keeping its openness
    pub fn normalize_status(self, status: Status) -> Status {
        if status.is_closed() {
            self.closed_status()
        } else {
            self.open_status()
        }
    }

    /// Flip between the open and closed status (borrow/return, complete/reopen)
    pub fn toggle(self, status: Status) -> Status {
        if status.is_closed() {
            self.open_status()
        } else {
            self.closed_status()
        }
    }

    pub fn default_secondary(self) -> &'static str {
        match self {
            AppKind::Library => "unknown",
            AppKind::Memos => "",
        }
    }

    pub fn default_reference(self) -> &'static str {
        match self {
            AppKind::Library => "unknown",
            AppKind::Memos => "",
        }
    }

    pub fn default_classifier(self) -> &'static str {
        match self {
            AppKind::Library => "other",
            AppKind::Memos => Priority::Medium.as_str(),
        }
    }
}

impl fmt::Display for AppKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.export_prefix())
    }
}

impl FromStr for AppKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "library" | "books" | "catalog" => Ok(AppKind::Library),
            "memos" | "memo" => Ok(AppKind::Memos),
            other => Err(format!("Unknown application: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Available,
    Borrowed,
    Active,
    Completed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Available => "available",
            Status::Borrowed => "borrowed",
            Status::Active => "active",
            Status::Completed => "completed",
        }
    }

    /// Borrowed books and completed memos are "closed"
    pub fn is_closed(self) -> bool {
        matches!(self, Status::Borrowed | Status::Completed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "available" => Ok(Status::Available),
            "borrowed" => Ok(Status::Borrowed),
            "active" => Ok(Status::Active),
            "completed" => Ok(Status::Completed),
            other => Err(format!("Unknown status: {}", other)),
        }
    }
}

/// Memo priority, stored in the record's classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("Unknown priority: {}", other)),
        }
    }
}

/// Status subset selected by a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    /// available books / active memos
    Open,
    /// borrowed books / completed memos
    Closed,
}

impl StatusFilter {
    pub fn matches(self, status: Status) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Open => !status.is_closed(),
            StatusFilter::Closed => status.is_closed(),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "open" | "available" | "active" => Ok(StatusFilter::Open),
            "closed" | "borrowed" | "completed" | "done" => Ok(StatusFilter::Closed),
            other => Err(format!("Unknown filter: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: i64,
    pub primary_text: String,   // book title / memo text
    pub secondary_text: String, // book author
    pub reference: String,      // book ISBN
    pub classifier: String,     // book category / memo priority
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub tags: Vec<String>,
}

impl Record {
    /// Create a record carrying the defaults of `kind`
    pub fn new(kind: AppKind, id: i64, primary_text: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            primary_text,
            secondary_text: kind.default_secondary().to_string(),
            reference: kind.default_reference().to_string(),
            classifier: kind.default_classifier().to_string(),
            status: kind.open_status(),
            created_at,
            due_date: None,
            tags: Vec::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    /// Case-insensitive substring match; `needle` must already be lowercase
    pub fn matches_search(&self, needle: &str) -> bool {
        self.primary_text.to_lowercase().contains(needle)
            || self.secondary_text.to_lowercase().contains(needle)
            || self.reference.to_lowercase().contains(needle)
            || self.classifier.to_lowercase().contains(needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(needle))
    }
}

/// Input for creating a record
#[derive(Debug, Clone, Default)]
pub struct NewRecord {
    pub primary_text: String,
    pub secondary_text: Option<String>,
    pub reference: Option<String>,
    pub classifier: Option<String>,
}

impl NewRecord {
    pub fn new(primary_text: impl Into<String>) -> Self {
        Self {
            primary_text: primary_text.into(),
            ..Self::default()
        }
    }

    pub fn secondary(mut self, text: impl Into<String>) -> Self {
        self.secondary_text = Some(text.into());
        self
    }

    pub fn reference(mut self, text: impl Into<String>) -> Self {
        self.reference = Some(text.into());
        self
    }

    pub fn classifier(mut self, text: impl Into<String>) -> Self {
        self.classifier = Some(text.into());
        self
    }
}

/// Replacement text for an existing record.
///
/// `None` leaves a field untouched, an empty string resets it to the default.
#[derive(Debug, Clone, Default)]
pub struct RecordEdit {
    pub primary_text: String,
    pub secondary_text: Option<String>,
    pub reference: Option<String>,
    pub classifier: Option<String>,
}

impl RecordEdit {
    pub fn new(primary_text: impl Into<String>) -> Self {
        Self {
            primary_text: primary_text.into(),
            ..Self::default()
        }
    }
}

/// Partial update of memo options.
///
/// `due_date`: `None` = not provided, `Some(None)` = cleared, `Some(Some(d))` = set.
/// `tags`: `Some(vec![])` clears the tags.
#[derive(Debug, Clone, Default)]
pub struct RecordOptions {
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: StatusFilter,
    pub search: String,
}

impl Query {
    pub fn new(filter: StatusFilter, search: impl Into<String>) -> Self {
        Self {
            filter,
            search: search.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub total: usize,
    pub open: usize,
    pub closed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(title: &str) -> Record {
        Record::new(AppKind::Library, 1, title.to_string(), Utc::now())
    }

    #[test]
    fn new_record_uses_kind_defaults() {
        let b = book("Dune");
        assert_eq!(b.secondary_text, "unknown");
        assert_eq!(b.classifier, "other");
        assert_eq!(b.status, Status::Available);

        let m = Record::new(AppKind::Memos, 2, "call mom".to_string(), Utc::now());
        assert_eq!(m.secondary_text, "");
        assert_eq!(m.classifier, "medium");
        assert_eq!(m.status, Status::Active);
        assert!(m.tags.is_empty());
        assert!(m.due_date.is_none());
    }

    #[test]
    fn toggle_flips_within_vocabulary() {
        assert_eq!(AppKind::Library.toggle(Status::Available), Status::Borrowed);
        assert_eq!(AppKind::Library.toggle(Status::Borrowed), Status::Available);
        assert_eq!(AppKind::Memos.toggle(Status::Active), Status::Completed);
        assert_eq!(AppKind::Memos.toggle(Status::Completed), Status::Active);
    }

    #[test]
    fn normalize_status_maps_by_openness() {
        assert_eq!(AppKind::Memos.normalize_status(Status::Borrowed), Status::Completed);
        assert_eq!(AppKind::Library.normalize_status(Status::Active), Status::Available);
        assert!(!AppKind::Memos.accepts(Status::Borrowed));
    }

    #[test]
    fn filter_parses_aliases() {
        assert_eq!("available".parse::<StatusFilter>().unwrap(), StatusFilter::Open);
        assert_eq!("Completed".parse::<StatusFilter>().unwrap(), StatusFilter::Closed);
        assert_eq!("all".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert!("archived".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn search_covers_tags_and_classifier() {
        let mut b = book("Dune");
        b.secondary_text = "Frank Herbert".to_string();
        b.classifier = "Science Fiction".to_string();
        b.tags = vec!["Desert".to_string()];

        assert!(b.matches_search("herbert"));
        assert!(b.matches_search("fiction"));
        assert!(b.matches_search("desert"));
        assert!(!b.matches_search("tolkien"));
    }

    #[test]
    fn record_serializes_camel_case() {
        let json = serde_json::to_value(book("Dune")).unwrap();
        assert_eq!(json["primaryText"], "Dune");
        assert_eq!(json["status"], "available");
        assert!(json["dueDate"].is_null());
    }
}
