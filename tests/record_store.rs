use tallybook::{
    AppKind, MemoryStorage, NewRecord, Query, RecordStore, Status, StatusFilter, Storage,
    StoreError,
};

fn library() -> RecordStore<MemoryStorage> {
    RecordStore::open(MemoryStorage::new(), AppKind::Library).unwrap()
}

fn memos() -> RecordStore<MemoryStorage> {
    RecordStore::open(MemoryStorage::new(), AppKind::Memos).unwrap()
}

#[test]
fn borrow_scenario_moves_book_between_filters() {
    let mut store = library();
    let book = store.add(NewRecord::new("Dune").secondary("Herbert")).unwrap();
    assert_eq!(book.status, Status::Available);

    assert!(store.toggle_status(book.id).unwrap());
    assert_eq!(store.get(book.id).unwrap().status, Status::Borrowed);

    assert!(store.query(&Query::new(StatusFilter::Open, "")).is_empty());
    let borrowed = store.query(&Query::new(StatusFilter::Closed, ""));
    assert_eq!(borrowed.len(), 1);
    assert_eq!(borrowed[0].id, book.id);
}

#[test]
fn ids_stay_unique_across_rapid_adds() {
    let mut store = memos();
    let mut ids = std::collections::HashSet::new();
    for i in 0..200 {
        let memo = store.add(NewRecord::new(format!("memo {i}"))).unwrap();
        assert!(ids.insert(memo.id), "duplicate id {}", memo.id);
    }
}

#[test]
fn unfiltered_query_returns_everything_in_order() {
    let mut store = library();
    for title in ["A", "B", "C"] {
        store.add(NewRecord::new(title)).unwrap();
    }

    let all = store.query(&Query::default());
    assert_eq!(all.len(), store.total());
    let titles: Vec<&str> = all.iter().map(|r| r.primary_text.as_str()).collect();
    assert_eq!(titles, vec!["C", "B", "A"]);
}

#[test]
fn query_has_no_side_effects() {
    let mut store = memos();
    store.add(NewRecord::new("one")).unwrap();
    let before = store.storage().get_item("memos").unwrap();

    for _ in 0..3 {
        store.query(&Query::new(StatusFilter::Closed, "one"));
        store.query(&Query::default());
    }

    assert_eq!(store.total(), 1);
    assert_eq!(store.storage().get_item("memos").unwrap(), before);
}

#[test]
fn export_import_round_trip_into_empty_store() {
    let mut source = memos();
    let a = source.add(NewRecord::new("first").classifier("high")).unwrap();
    source.add(NewRecord::new("second")).unwrap();
    source.toggle_status(a.id).unwrap();
    source
        .update_options(
            a.id,
            tallybook::RecordOptions {
                due_date: Some(chrono::NaiveDate::from_ymd_opt(2025, 3, 14)),
                tags: Some(vec!["pi".to_string(), "math".to_string()]),
                ..Default::default()
            },
        )
        .unwrap();

    let exported = source.export_snapshot().unwrap();

    let mut target = memos();
    assert_eq!(target.import_snapshot(&exported).unwrap(), 2);
    assert_eq!(target.records(), source.records());
}

#[test]
fn clear_completed_empties_closed_projection() {
    let mut store = memos();
    let a = store.add(NewRecord::new("a")).unwrap();
    let b = store.add(NewRecord::new("b")).unwrap();
    store.add(NewRecord::new("c")).unwrap();
    store.toggle_status(a.id).unwrap();
    store.toggle_status(b.id).unwrap();

    assert_eq!(store.clear_completed().unwrap(), 2);
    assert!(store.query(&Query::new(StatusFilter::Closed, "")).is_empty());
    assert_eq!(store.count_by_status(Status::Active), 1);
}

#[test]
fn import_minimal_record_applies_defaults() {
    let mut store = memos();
    let count = store
        .import_snapshot(r#"{"records":[{"id":1,"primaryText":"X"}]}"#)
        .unwrap();
    assert_eq!(count, 1);

    let record = store.get(1).unwrap();
    assert_eq!(record.classifier, "medium");
    assert!(record.tags.is_empty());
    assert!(record.due_date.is_none());
    assert_eq!(record.status, Status::Active);
}

#[test]
fn import_unrecognized_object_is_format_error() {
    let mut store = library();
    store.add(NewRecord::new("Dune")).unwrap();

    let err = store.import_snapshot(r#"{"books": [{"title": "Emma"}]}"#).unwrap_err();
    assert!(matches!(err, StoreError::FormatError(_)));
    assert_eq!(store.total(), 1);
}

#[test]
fn legacy_book_slot_is_loaded() {
    let legacy = r#"[
        {"id": 1700000000000, "title": "Professional JavaScript", "author": "Nicholas C. Zakas",
         "isbn": "978-7-115-23955-1", "category": "technology", "status": "available",
         "addedAt": "2024-01-01T00:00:00.000Z"},
        {"id": 1700000000001, "title": "Dream of the Red Chamber", "author": "Cao Xueqin",
         "isbn": "978-7-01-000195-0", "category": "literature", "status": "borrowed",
         "addedAt": "2024-01-01T00:00:00.000Z"}
    ]"#;
    let storage = MemoryStorage::new().with_item("library-books", legacy);
    let store = RecordStore::open(storage, AppKind::Library).unwrap();

    let stats = store.stats();
    assert_eq!((stats.total, stats.open, stats.closed), (2, 1, 1));
    assert_eq!(store.query(&Query::new(StatusFilter::All, "zakas")).len(), 1);
    assert_eq!(store.query(&Query::new(StatusFilter::All, "978-7-01")).len(), 1);
}
