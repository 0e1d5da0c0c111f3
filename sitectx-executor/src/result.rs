//! Scoped ownership of a temp table's rows.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::temp_table::{TempTable, TempTableRef};

/// Final output of an executor list, together with the obligation to release
/// its rows.
///
/// Dropping the guard deletes the table's rows on every exit path (normal
/// return, early return, `?` propagation). The table object itself belongs to
/// the operator tree and is never destroyed here. The guard moves but never
/// clones, so exactly one owner holds the cleanup obligation at a time.
pub struct TempTableResult {
    table: TempTableRef,
    armed: bool,
}

impl TempTableResult {
    pub fn new(table: TempTableRef) -> Self {
        Self { table, armed: true }
    }

    /// The guarded table.
    pub fn table(&self) -> &TempTableRef {
        &self.table
    }

    /// Give up the cleanup obligation and hand the table back.
    ///
    /// The caller becomes responsible for releasing the rows, usually by
    /// letting the statement-level cleanup reach the producing executor.
    pub fn release(mut self) -> TempTableRef {
        self.armed = false;
        Arc::clone(&self.table)
    }
}

impl Deref for TempTableResult {
    type Target = dyn TempTable;

    fn deref(&self) -> &Self::Target {
        self.table.as_ref()
    }
}

impl Drop for TempTableResult {
    fn drop(&mut self) {
        if self.armed {
            self.table.delete_all_tuples();
        }
    }
}

impl fmt::Debug for TempTableResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TempTableResult")
            .field("table", &self.table)
            .field("armed", &self.armed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingTable {
        rows: AtomicUsize,
        clears: AtomicUsize,
    }

    impl TempTable for CountingTable {
        fn name(&self) -> &str {
            "counting"
        }

        fn active_tuple_count(&self) -> usize {
            self.rows.load(Ordering::SeqCst)
        }

        fn delete_all_tuples(&self) {
            self.rows.store(0, Ordering::SeqCst);
            self.clears.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn filled(rows: usize) -> Arc<CountingTable> {
        let table = Arc::new(CountingTable::default());
        table.rows.store(rows, Ordering::SeqCst);
        table
    }

    #[test]
    fn drop_clears_rows_but_keeps_table() {
        let table = filled(5);
        {
            let guard = TempTableResult::new(table.clone());
            assert_eq!(guard.active_tuple_count(), 5);
        }
        assert_eq!(table.active_tuple_count(), 0);
        assert_eq!(table.clears.load(Ordering::SeqCst), 1);
        // The Arc in this test is the only owner left; the table object survived.
        assert_eq!(Arc::strong_count(&table), 1);
    }

    #[test]
    fn moving_the_guard_moves_the_obligation() {
        let table = filled(2);
        let guard = TempTableResult::new(table.clone());

        fn take(guard: TempTableResult) -> usize {
            guard.active_tuple_count()
        }

        assert_eq!(take(guard), 2);
        assert_eq!(table.clears.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_disarms_cleanup() {
        let table = filled(3);
        let guard = TempTableResult::new(table.clone());
        let handed_back = guard.release();

        assert_eq!(handed_back.active_tuple_count(), 3);
        assert_eq!(table.clears.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cleanup_runs_on_early_error_return() {
        let table = filled(4);

        fn inspect(guard: TempTableResult) -> Result<usize, String> {
            if guard.active_tuple_count() > 1 {
                return Err("too many rows".into());
            }
            Ok(guard.active_tuple_count())
        }

        assert!(inspect(TempTableResult::new(table.clone())).is_err());
        assert!(table.is_empty());
    }
}
