use tracing::{error, info};

use crate::storage::{Store, TableKind};

/// Growth control for append-mostly tables. Applied once at manager load,
/// not on every write, so the cost stays bounded.
#[derive(Debug, Clone, Copy)]
pub struct TrimPolicy {
    /// Trim only when the row count strictly exceeds this.
    pub trigger: u64,
    /// How many of the oldest rows to delete when triggered. Fixed, not
    /// proportional to the overage.
    pub trim: u64,
}

impl TrimPolicy {
    pub const fn new(trigger: u64, trim: u64) -> Self {
        Self { trigger, trim }
    }

    /// Trim `table` if it grew past the trigger. A failed trim is logged and
    /// skipped; the caller's load sequence continues either way.
    pub fn apply(&self, store: &Store, table: TableKind) {
        let count = match store.row_count(table) {
            Ok(count) => count,
            Err(e) => {
                error!(table = table.name(), "trim skipped, row count failed: {e}");
                return;
            }
        };

        if count <= self.trigger {
            return;
        }

        match store.delete_oldest(table, self.trim) {
            Ok(removed) => {
                info!(
                    table = table.name(),
                    "trimmed from {count} to {} rows",
                    count - removed
                );
            }
            Err(e) => {
                error!(table = table.name(), "error trimming table: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PostHide;

    fn store_with_hides(n: u64) -> Store {
        let store = Store::new();
        for no in 0..n {
            store
                .insert_post_hide(PostHide::thread(0, "g", no as i64))
                .unwrap();
        }
        store
    }

    #[test]
    fn at_trigger_no_trim() {
        let store = store_with_hides(250);
        TrimPolicy::new(250, 50).apply(&store, TableKind::PostHide);
        assert_eq!(store.row_count(TableKind::PostHide).unwrap(), 250);
    }

    #[test]
    fn one_past_trigger_trims_fixed_count() {
        let store = store_with_hides(251);
        TrimPolicy::new(250, 50).apply(&store, TableKind::PostHide);
        assert_eq!(store.row_count(TableKind::PostHide).unwrap(), 201);
    }

    #[test]
    fn trim_removes_the_oldest_rows() {
        let store = store_with_hides(251);
        TrimPolicy::new(250, 50).apply(&store, TableKind::PostHide);

        let nos: Vec<i64> = store
            .all_post_hides()
            .unwrap()
            .iter()
            .map(|h| h.no)
            .collect();
        assert_eq!(nos.first(), Some(&50));
        assert_eq!(nos.last(), Some(&250));
    }

    #[test]
    fn far_past_trigger_still_trims_fixed_count() {
        let store = store_with_hides(1000);
        TrimPolicy::new(250, 50).apply(&store, TableKind::PostHide);
        assert_eq!(store.row_count(TableKind::PostHide).unwrap(), 950);
    }
}
