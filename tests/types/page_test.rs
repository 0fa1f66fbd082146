use rowdb::types::{
    MAX_ROWS, PAGE_HEADER_SIZE, PAGE_SIZE, ROW_SIZE, error::DatabaseError, page::Page, row::Row,
};

fn fill_page(page: &mut Page, count: usize) {
    for i in 0..count {
        page.push_row(&Row::new(i as i32 + 1, format!("row_{:03}", i + 1)))
            .unwrap();
    }
}

#[test]
fn test_page_creation_and_basic_properties() {
    let page = Page::new();
    assert_eq!(page.row_count, 0);
    assert!(!page.is_dirty);
    assert!(page.is_empty());
    assert!(!page.is_full());
    assert_eq!(page.data.len(), PAGE_SIZE);
    assert!(page.to_bytes().iter().all(|&b| b == 0));
}

#[test]
fn test_max_rows_constant() {
    assert_eq!(MAX_ROWS, 63);
    assert!(PAGE_HEADER_SIZE + MAX_ROWS * ROW_SIZE <= PAGE_SIZE);
}

#[test]
fn test_push_and_get_rows() -> Result<(), DatabaseError> {
    let mut page = Page::new();
    assert_eq!(page.push_row(&Row::new(1, "Alice"))?, 0);
    assert_eq!(page.push_row(&Row::new(2, "Bob"))?, 1);
    assert!(page.is_dirty);
    assert_eq!(page.row_count, 2);
    assert_eq!(page.get_row(0)?, Row::new(1, "Alice"));
    assert_eq!(page.get_row(1)?, Row::new(2, "Bob"));
    Ok(())
}

#[test]
fn test_get_row_past_count_is_rejected() {
    let mut page = Page::new();
    fill_page(&mut page, 3);
    match page.get_row(3) {
        Err(DatabaseError::InvalidSlotIndex { index: 3, max: 3 }) => {}
        other => panic!("Expected InvalidSlotIndex, got {:?}", other),
    }
}

#[test]
fn test_full_page_rejects_push() {
    let mut page = Page::new();
    fill_page(&mut page, MAX_ROWS);
    assert!(page.is_full());
    assert!(matches!(
        page.push_row(&Row::new(999, "overflow")),
        Err(DatabaseError::CapacityExceeded { .. })
    ));
    assert_eq!(page.row_count, MAX_ROWS);
}

#[test]
fn test_delete_shifts_rows_left_and_zeroes_tail() -> Result<(), DatabaseError> {
    let mut page = Page::new();
    fill_page(&mut page, 4);
    page.is_dirty = false;

    page.delete_row(1)?;
    assert!(page.is_dirty);
    assert_eq!(page.row_count, 3);
    assert_eq!(page.get_row(0)?.id, 1);
    assert_eq!(page.get_row(1)?.id, 3);
    assert_eq!(page.get_row(2)?.id, 4);

    let tail = PAGE_HEADER_SIZE + 3 * ROW_SIZE;
    assert!(page.data[tail..tail + ROW_SIZE].iter().all(|&b| b == 0));
    Ok(())
}

#[test]
fn test_delete_last_row_empties_page() -> Result<(), DatabaseError> {
    let mut page = Page::new();
    fill_page(&mut page, 1);
    page.delete_row(0)?;
    assert!(page.is_empty());
    assert!(page.to_bytes().iter().all(|&b| b == 0));
    Ok(())
}

#[test]
fn test_set_row_overwrites_in_place() -> Result<(), DatabaseError> {
    let mut page = Page::new();
    fill_page(&mut page, 2);
    page.set_row(1, &Row::new(2, "renamed"))?;
    assert_eq!(page.get_row(1)?.name_str(), "renamed");
    assert_eq!(page.row_count, 2);
    assert!(page.set_row(2, &Row::new(3, "x")).is_err());
    Ok(())
}

#[test]
fn test_serialization_roundtrip() -> Result<(), DatabaseError> {
    let mut page = Page::new();
    fill_page(&mut page, 10);
    let restored = Page::from_bytes(0, &page.to_bytes())?;
    assert_eq!(restored.row_count, 10);
    assert!(!restored.is_dirty);
    for slot in 0..10 {
        assert_eq!(restored.get_row(slot)?, page.get_row(slot)?);
    }
    Ok(())
}

#[test]
fn test_wrong_size_buffer_is_rejected() {
    match Page::from_bytes(0, &[0u8; 100]) {
        Err(DatabaseError::InvalidPageSize {
            expected: PAGE_SIZE,
            actual: 100,
        }) => {}
        other => panic!("Expected InvalidPageSize, got {:?}", other),
    }
}

#[test]
fn test_oversized_row_count_is_corruption() {
    let mut bytes = vec![0u8; PAGE_SIZE];
    bytes[0..4].copy_from_slice(&64i32.to_le_bytes());
    assert!(matches!(
        Page::from_bytes(4, &bytes),
        Err(DatabaseError::CorruptedPage { page_index: 4, .. })
    ));
}

#[test]
fn test_counted_placeholder_slot_is_corruption() {
    let mut page = Page::new();
    fill_page(&mut page, 2);
    let mut bytes = page.to_bytes();
    bytes[0..4].copy_from_slice(&3i32.to_le_bytes());
    assert!(matches!(
        Page::from_bytes(0, &bytes),
        Err(DatabaseError::CorruptedPage { .. })
    ));
}
