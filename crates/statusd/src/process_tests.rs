use super::*;

#[test]
fn split_stat_handles_plain_comm() {
    let (comm, rest) = split_stat("123 (pi) S 1 123 123 0 -1 4194304").unwrap();
    assert_eq!(comm, "pi");
    assert_eq!(rest, "S 1 123 123 0 -1 4194304");
}

#[test]
fn split_stat_handles_parens_and_spaces_in_comm() {
    let (comm, rest) = split_stat("123 (my (weird) proc) S 1 123").unwrap();
    assert_eq!(comm, "my (weird) proc");
    assert_eq!(rest, "S 1 123");
}

#[test]
fn split_stat_rejects_malformed_input() {
    assert!(split_stat("no parens here").is_none());
}

#[test]
fn read_process_table_on_live_system_is_non_empty() {
    // /proc always has at least this test's own process.
    let rows = read_process_table();
    assert!(!rows.is_empty());
    assert!(rows.iter().any(|r| r.pid == std::process::id()));
}

#[test]
fn malformed_numeric_fields_are_dropped_not_errored() {
    // A pid that almost certainly doesn't exist; read_one must return None,
    // not panic, and the caller treats that as "skip this row".
    assert!(read_one(u32::MAX).is_none());
}
