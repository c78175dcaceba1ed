use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::StoreError;
use crate::models::{
    AppKind, NewRecord, Priority, Query, Record, RecordEdit, RecordOptions, Stats, Status,
    StatusFilter,
};
use crate::storage::Storage;
use crate::store::RecordStore;
use crate::utils::{parse_date, parse_tags};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Library catalog and memo list kept in a local database")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    /// Application to work on: library or memos (defaults to config)
    #[arg(short, long)]
    pub app: Option<AppKind>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a book or memo
    Add {
        /// Book title / memo text
        text: String,
        /// Book author
        #[arg(long)]
        secondary: Option<String>,
        /// Book ISBN
        #[arg(long)]
        reference: Option<String>,
        /// Book category / memo priority (low, medium, high)
        #[arg(long)]
        classifier: Option<String>,
    },
    /// List records (default if no subcommand)
    List {
        /// all, open/available/active, closed/borrowed/completed
        #[arg(long, default_value = "all")]
        filter: StatusFilter,
        /// Case-insensitive text to look for
        #[arg(long)]
        search: Option<String>,
    },
    /// Borrow/return a book, complete/reopen a memo
    Toggle {
        id: i64,
    },
    /// Set the status of a record explicitly
    SetStatus {
        id: i64,
        /// available, borrowed, active or completed
        status: Status,
    },
    /// Replace the text of a record
    Edit {
        id: i64,
        /// New book title / memo text
        text: String,
        /// New author (empty resets to the default)
        #[arg(long)]
        secondary: Option<String>,
        /// New ISBN (empty resets to the default)
        #[arg(long)]
        reference: Option<String>,
        /// New category / priority (empty resets to the default)
        #[arg(long)]
        classifier: Option<String>,
    },
    /// Change memo priority, due date or tags
    Options {
        id: i64,
        #[arg(long)]
        priority: Option<Priority>,
        /// Due date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        /// Remove the due date
        #[arg(long)]
        clear_due: bool,
        /// Comma-separated tags, replacing the current ones
        #[arg(long, conflicts_with = "clear_tags")]
        tags: Option<String>,
        /// Remove all tags
        #[arg(long)]
        clear_tags: bool,
    },
    /// Delete a record
    Delete {
        id: i64,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Delete every record
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Delete borrowed books / completed memos
    ClearCompleted {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Write all records to <app>-export-<date>.json
    Export {
        /// Output directory (defaults to the configured export_dir)
        #[arg(long)]
        out: Option<String>,
    },
    /// Import records from an export file or a bare JSON array
    Import {
        file: String,
    },
    /// Show record counts
    Stats,
    /// Add sample records to an empty store
    Seed,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("File error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Refusing to {0} without --yes")]
    ConfirmationRequired(String),
}

fn require_confirmation(yes: bool, action: &str) -> Result<(), CliError> {
    if yes {
        Ok(())
    } else {
        Err(CliError::ConfirmationRequired(action.to_string()))
    }
}

fn report_missing(id: i64) {
    println!("No record with ID {}", id);
}

/// Handle the add command
pub fn handle_add<S: Storage>(
    store: &mut RecordStore<S>,
    text: String,
    secondary: Option<String>,
    reference: Option<String>,
    classifier: Option<String>,
) -> Result<(), CliError> {
    let record = store.add(NewRecord {
        primary_text: text,
        secondary_text: secondary,
        reference,
        classifier,
    })?;
    println!("Record created successfully (ID: {})", record.id);
    Ok(())
}

/// Handle the list command: the filtered projection followed by stats
pub fn handle_list<S: Storage>(
    store: &RecordStore<S>,
    filter: StatusFilter,
    search: Option<String>,
) -> Result<(), CliError> {
    let query = Query::new(filter, search.unwrap_or_default());
    let records = store.query(&query);
    if records.is_empty() {
        println!("{}", empty_state_text(store.kind(), filter));
    } else {
        for record in records {
            println!("{}", format_record(store.kind(), record));
        }
    }
    println!();
    println!("{}", format_stats(store.kind(), store.stats()));
    Ok(())
}

/// Handle the toggle command
pub fn handle_toggle<S: Storage>(store: &mut RecordStore<S>, id: i64) -> Result<(), CliError> {
    if store.toggle_status(id)? {
        if let Some(record) = store.get(id) {
            println!("Record {} is now {}", id, record.status);
        }
    } else {
        report_missing(id);
    }
    Ok(())
}

/// Handle the set-status command
pub fn handle_set_status<S: Storage>(
    store: &mut RecordStore<S>,
    id: i64,
    status: Status,
) -> Result<(), CliError> {
    if store.set_status(id, status)? {
        println!("Record {} is now {}", id, status);
    } else {
        report_missing(id);
    }
    Ok(())
}

/// Handle the edit command
pub fn handle_edit<S: Storage>(
    store: &mut RecordStore<S>,
    id: i64,
    edit: RecordEdit,
) -> Result<(), CliError> {
    if store.edit(id, edit)? {
        println!("Record {} updated", id);
    } else {
        report_missing(id);
    }
    Ok(())
}

/// Handle the options command
pub fn handle_options<S: Storage>(
    store: &mut RecordStore<S>,
    id: i64,
    priority: Option<Priority>,
    due: Option<String>,
    clear_due: bool,
    tags: Option<String>,
    clear_tags: bool,
) -> Result<(), CliError> {
    let options = build_options(priority, due, clear_due, tags, clear_tags)?;
    if store.update_options(id, options)? {
        println!("Record {} updated", id);
    } else {
        report_missing(id);
    }
    Ok(())
}

/// Translate option flags into a partial update
pub fn build_options(
    priority: Option<Priority>,
    due: Option<String>,
    clear_due: bool,
    tags: Option<String>,
    clear_tags: bool,
) -> Result<RecordOptions, CliError> {
    let due_date = match (due, clear_due) {
        (_, true) => Some(None),
        (Some(due_str), false) => {
            let date = parse_date(&due_str).map_err(|e| {
                CliError::DateParseError(format!("Invalid date format '{}': {}", due_str, e))
            })?;
            Some(Some(date))
        }
        (None, false) => None,
    };

    let tags = match (tags, clear_tags) {
        (_, true) => Some(Vec::new()),
        (Some(tags_str), false) => Some(parse_tags(&tags_str)),
        (None, false) => None,
    };

    Ok(RecordOptions {
        priority,
        due_date,
        tags,
    })
}

/// Handle the delete command
pub fn handle_delete<S: Storage>(
    store: &mut RecordStore<S>,
    id: i64,
    yes: bool,
) -> Result<(), CliError> {
    require_confirmation(yes, "delete a record")?;
    if store.delete(id)? {
        println!("Record {} deleted", id);
    } else {
        report_missing(id);
    }
    Ok(())
}

/// Handle the clear command
pub fn handle_clear<S: Storage>(store: &mut RecordStore<S>, yes: bool) -> Result<(), CliError> {
    require_confirmation(yes, "delete every record")?;
    let removed = store.clear_all()?;
    println!("Removed {} records", removed);
    Ok(())
}

/// Handle the clear-completed command
pub fn handle_clear_completed<S: Storage>(
    store: &mut RecordStore<S>,
    yes: bool,
) -> Result<(), CliError> {
    require_confirmation(yes, "delete completed records")?;
    let removed = store.clear_completed()?;
    println!("Removed {} records", removed);
    Ok(())
}

/// Handle the export command, returning the written file path
pub fn handle_export<S: Storage>(
    store: &RecordStore<S>,
    out_dir: &Path,
) -> Result<PathBuf, CliError> {
    let document = store.export_document();
    let json = serde_json::to_string_pretty(&document).map_err(StoreError::from)?;
    let path = out_dir.join(document.file_name(store.kind()));

    fs::create_dir_all(out_dir)?;
    fs::write(&path, json)?;
    println!("Exported {} records to {}", store.total(), path.display());
    Ok(path)
}

/// Handle the import command
pub fn handle_import<S: Storage>(store: &mut RecordStore<S>, file: &str) -> Result<(), CliError> {
    let contents = fs::read_to_string(file)?;
    let imported = store.import_snapshot(&contents)?;
    println!("Imported {} records", imported);
    Ok(())
}

/// Handle the stats command
pub fn handle_stats<S: Storage>(store: &RecordStore<S>) -> Result<(), CliError> {
    println!("{}", format_stats(store.kind(), store.stats()));
    Ok(())
}

/// Handle the seed command
pub fn handle_seed<S: Storage>(store: &mut RecordStore<S>) -> Result<(), CliError> {
    let seeded = store.seed_samples()?;
    if seeded == 0 {
        println!("Store already has records, nothing seeded");
    } else {
        println!("Added {} sample records", seeded);
    }
    Ok(())
}

/// One display line per record
pub fn format_record(kind: AppKind, record: &Record) -> String {
    match kind {
        AppKind::Library => format!(
            "{:>14}  {:<10} {} by {} (ISBN {}, {})",
            record.id,
            record.status,
            record.primary_text,
            record.secondary_text,
            record.reference,
            record.classifier
        ),
        AppKind::Memos => {
            let mut line = format!(
                "{:>14}  [{}] {} !{}",
                record.id,
                if record.is_closed() { "x" } else { " " },
                record.primary_text,
                record.classifier
            );
            if let Some(due) = record.due_date {
                line.push_str(&format!(" due {}", due.format("%Y-%m-%d")));
            }
            for tag in &record.tags {
                line.push_str(&format!(" #{}", tag));
            }
            line
        }
    }
}

pub fn format_stats(kind: AppKind, stats: Stats) -> String {
    let (open, closed) = match kind {
        AppKind::Library => ("Available", "Borrowed"),
        AppKind::Memos => ("Active", "Completed"),
    };
    format!(
        "Total: {} | {}: {} | {}: {}",
        stats.total, open, stats.open, closed, stats.closed
    )
}

/// Message shown when a query returns nothing
pub fn empty_state_text(kind: AppKind, filter: StatusFilter) -> &'static str {
    match (kind, filter) {
        (AppKind::Library, StatusFilter::All) => "No books yet, add one!",
        (AppKind::Library, StatusFilter::Open) => "No available books",
        (AppKind::Library, StatusFilter::Closed) => "No borrowed books",
        (AppKind::Memos, StatusFilter::All) => "No memos yet, add one!",
        (AppKind::Memos, StatusFilter::Open) => "No active memos",
        (AppKind::Memos, StatusFilter::Closed) => "No completed memos",
    }
}
