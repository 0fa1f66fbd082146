use rowdb::{
    executor::{
        scan::{ScanIterator, Scanner},
        sequential_scan::SequentialScanner,
    },
    storage::page_store::PageStore,
    types::{MAX_ROWS, error::DatabaseError, row::Row},
    utils::mock::TempDatabase,
};

fn create_store(count: usize) -> PageStore {
    let mut store = PageStore::new();
    for i in 0..count {
        let mut page_index = store.page_count() - 1;
        if store.page(page_index).unwrap().is_full() {
            page_index = store.allocate_page().unwrap();
        }
        store
            .append_row(page_index, &Row::new(i as i32 + 1, format!("name{}", i + 1)))
            .unwrap();
    }
    store
}

#[test]
fn test_empty_store_scans_nothing() -> Result<(), DatabaseError> {
    let store = PageStore::new();
    let mut scanner = SequentialScanner::new(&store);
    assert!(scanner.scan()?.is_none());
    assert!(scanner.scan()?.is_none());
    Ok(())
}

#[test]
fn test_scan_crosses_page_boundaries_in_order() -> Result<(), DatabaseError> {
    let store = create_store(MAX_ROWS * 2 + 5);
    let rows: Vec<Row> = ScanIterator::new(SequentialScanner::new(&store)).collect::<Result<_, _>>()?;
    assert_eq!(rows.len(), MAX_ROWS * 2 + 5);
    assert!(rows.windows(2).all(|pair| pair[0].id + 1 == pair[1].id));
    assert_eq!(rows[MAX_ROWS].name_str(), format!("name{}", MAX_ROWS + 1));
    Ok(())
}

#[test]
fn test_scan_batch() -> Result<(), DatabaseError> {
    let store = create_store(25);
    let mut scanner = SequentialScanner::new(&store);

    let mut total = 0;
    loop {
        let batch = scanner.scan_batch(10)?;
        if batch.is_empty() {
            break;
        }
        assert!(batch.len() <= 10);
        total += batch.len();
    }
    assert_eq!(total, 25);
    Ok(())
}

#[test]
fn test_reset_restarts_scan() -> Result<(), DatabaseError> {
    let store = create_store(3);
    let mut scanner = SequentialScanner::new(&store);
    while scanner.scan()?.is_some() {}
    scanner.reset()?;
    assert_eq!(scanner.scan()?.map(|row| row.id), Some(1));
    Ok(())
}

#[test]
fn test_select_all_reflects_compaction() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("scan_compaction");
    let storage = temp_db.create_storage_manager()?;
    for id in [5, 3, 9, 1] {
        storage.insert(id, format!("n{}", id))?;
    }
    storage.delete(3)?;

    // Insertion order, not key order.
    let ids: Vec<i32> = storage.select_all()?.iter().map(|row| row.id).collect();
    assert_eq!(ids, vec![5, 9, 1]);
    Ok(())
}
