use super::*;

fn vitals(id: &str, heart_rate: f64, timestamp: i64) -> Arc<PatientVitals> {
    Arc::new(PatientVitals {
        id: id.to_string(),
        heart_rate,
        systolic: 120.0,
        diastolic: 80.0,
        oxygen_saturation: 98.0,
        temperature: 36.8,
        respiratory_rate: 16.0,
        timestamp,
    })
}

fn ids(collection: &Collection) -> Vec<&str> {
    collection.iter().map(|p| p.id.as_str()).collect()
}

#[test]
fn test_empty_batch_returns_same_collection() {
    let previous = from_snapshot(&[vitals("a", 70.0, 1), vitals("b", 71.0, 1)]);
    let result = merge(&previous, &[]);

    assert!(!result.changed);
    assert!(Arc::ptr_eq(&previous, &result.collection));
}

#[test]
fn test_equal_values_keep_original_handles() {
    let a = vitals("a", 70.0, 1);
    let b = vitals("b", 71.0, 1);
    let previous = from_snapshot(&[Arc::clone(&a), Arc::clone(&b)]);

    // Equal values in fresh allocations
    let result = merge(&previous, &[vitals("a", 70.0, 1), vitals("b", 71.0, 1)]);

    assert!(!result.changed);
    assert!(Arc::ptr_eq(&previous, &result.collection));
    assert!(Arc::ptr_eq(&result.collection[0], &a));
    assert!(Arc::ptr_eq(&result.collection[1], &b));
}

#[test]
fn test_unchanged_records_keep_identity_when_others_change() {
    let a = vitals("a", 70.0, 1);
    let b = vitals("b", 71.0, 1);
    let previous = from_snapshot(&[Arc::clone(&a), Arc::clone(&b)]);

    let b2 = vitals("b", 75.0, 2);
    let result = merge(&previous, &[vitals("a", 70.0, 1), Arc::clone(&b2)]);

    assert!(result.changed);
    assert_eq!(result.replaced, 1);
    assert_eq!(result.added, 0);
    assert!(!Arc::ptr_eq(&previous, &result.collection));
    assert!(Arc::ptr_eq(&result.collection[0], &a));
    assert!(Arc::ptr_eq(&result.collection[1], &b2));
}

#[test]
fn test_timestamp_alone_counts_as_change() {
    let previous = from_snapshot(&[vitals("a", 70.0, 1)]);
    let result = merge(&previous, &[vitals("a", 70.0, 2)]);

    assert!(result.changed);
    assert_eq!(result.collection[0].timestamp, 2);
}

#[test]
fn test_older_timestamp_still_applied_in_arrival_order() {
    let previous = from_snapshot(&[vitals("a", 70.0, 500)]);
    let result = merge(&previous, &[vitals("a", 65.0, 100)]);

    assert!(result.changed);
    assert_eq!(result.collection[0].heart_rate, 65.0);
    assert_eq!(result.collection[0].timestamp, 100);
}

#[test]
fn test_new_entities_appended_in_batch_order() {
    let previous = from_snapshot(&[vitals("A", 70.0, 1), vitals("B", 71.0, 1)]);
    let result = merge(&previous, &[vitals("C", 72.0, 2), vitals("B", 90.0, 2)]);

    assert!(result.changed);
    assert_eq!(ids(&result.collection), vec!["A", "B", "C"]);
    assert_eq!(result.collection[1].heart_rate, 90.0);
    assert_eq!(result.replaced, 1);
    assert_eq!(result.added, 1);
}

#[test]
fn test_last_write_wins_within_batch() {
    let result = merge(&empty(), &[vitals("x", 70.0, 1), vitals("x", 80.0, 1)]);

    assert!(result.changed);
    assert_eq!(result.collection.len(), 1);
    assert_eq!(result.collection[0].id, "x");
    assert_eq!(result.collection[0].heart_rate, 80.0);
}

#[test]
fn test_duplicate_new_ids_keep_first_position() {
    let result = merge(
        &empty(),
        &[
            vitals("x", 70.0, 1),
            vitals("y", 60.0, 1),
            vitals("x", 80.0, 2),
        ],
    );

    assert_eq!(ids(&result.collection), vec!["x", "y"]);
    assert_eq!(result.collection[0].heart_rate, 80.0);
    assert_eq!(result.added, 2);
}

#[test]
fn test_last_write_wins_for_existing_entity() {
    let previous = from_snapshot(&[vitals("x", 70.0, 1)]);
    // Last record equals the current value: nothing changes
    let result = merge(&previous, &[vitals("x", 99.0, 2), vitals("x", 70.0, 1)]);

    assert!(!result.changed);
    assert!(Arc::ptr_eq(&previous, &result.collection));
}

#[test]
fn test_entities_never_removed() {
    let previous = from_snapshot(&[vitals("a", 70.0, 1), vitals("b", 71.0, 1)]);
    let result = merge(&previous, &[vitals("c", 72.0, 1)]);

    assert_eq!(ids(&result.collection), vec!["a", "b", "c"]);
}

#[test]
fn test_from_snapshot_dedupes_ids() {
    let collection = from_snapshot(&[
        vitals("a", 70.0, 1),
        vitals("b", 71.0, 1),
        vitals("a", 72.0, 2),
    ]);

    assert_eq!(ids(&collection), vec!["a", "b"]);
    assert_eq!(collection[0].heart_rate, 72.0);
}
