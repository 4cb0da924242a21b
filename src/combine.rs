//! Merging of overlapping strategy results.

use std::collections::HashSet;

use crate::models::CatalogRecord;

/// Flatten record lists in argument order and drop repeated codes.
///
/// The first occurrence of a code wins, so records from higher-priority
/// strategies survive. Order is otherwise preserved; nothing is re-sorted.
pub fn combine<'a, I>(lists: I) -> Vec<CatalogRecord>
where
    I: IntoIterator<Item = &'a [CatalogRecord]>,
{
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out: Vec<CatalogRecord> = Vec::new();
    for list in lists {
        for record in list {
            if seen.insert(record.code.as_str()) {
                out.push(record.clone());
            }
        }
    }
    out
}
