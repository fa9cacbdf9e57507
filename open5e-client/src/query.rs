use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use getset::Getters;

use crate::collection::{CollectionType, FilterCategory, SortColumn, SortKey};
use crate::record::Record;

/// Sort direction for the active column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

impl Order {
    pub fn toggled(self) -> Self {
        match self {
            Order::Ascending => Order::Descending,
            Order::Descending => Order::Ascending,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Order::Ascending => ordering,
            Order::Descending => ordering.reverse(),
        }
    }
}

/// Per-session view state: active filters, sort, and page position.
///
/// Created fresh (defaults: no filters, no sort, page 1) whenever the
/// viewed collection changes.
#[derive(Debug, Clone)]
pub struct QueryState {
    collection: CollectionType,
    filters: HashMap<FilterCategory, HashSet<String>>,
    sort: Option<(SortColumn, Order)>,
    page_number: usize,
    page_size: usize,
}

impl QueryState {
    pub fn new(collection: CollectionType, page_size: usize) -> Self {
        Self {
            collection,
            filters: HashMap::new(),
            sort: None,
            page_number: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn collection(&self) -> CollectionType {
        self.collection
    }

    pub fn sort(&self) -> Option<(SortColumn, Order)> {
        self.sort
    }

    pub fn page_number(&self) -> usize {
        self.page_number
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Select the accepted values for a facet; matching is
    /// case-insensitive. An empty selection removes the facet, like the
    /// select-all state of a checkbox group. Narrowing or widening the
    /// match set moves the view back to page one.
    pub fn set_filter(
        &mut self,
        category: FilterCategory,
        values: impl IntoIterator<Item = String>,
    ) {
        let selected: HashSet<String> = values
            .into_iter()
            .map(|value| value.to_lowercase())
            .collect();
        if selected.is_empty() {
            self.filters.remove(&category);
        } else {
            self.filters.insert(category, selected);
        }
        self.page_number = 1;
    }

    pub fn clear_filter(&mut self, category: FilterCategory) {
        self.filters.remove(&category);
        self.page_number = 1;
    }

    /// Select the sort column. Re-selecting the active column flips the
    /// direction; a new column starts ascending.
    pub fn set_sort(&mut self, column: SortColumn) {
        self.sort = match self.sort {
            Some((current, order)) if current == column => Some((column, order.toggled())),
            _ => Some((column, Order::Ascending)),
        };
    }

    /// Callers validate the range first; see `page_count`.
    pub(crate) fn set_page(&mut self, page_number: usize) {
        self.page_number = page_number;
    }
}

/// A bounded window into the filtered, sorted collection. Holds shared
/// references into the cache, never record copies.
#[derive(Debug, Clone, Getters)]
#[get = "pub"]
pub struct Page {
    /// Records visible on this page, in display order.
    records: Vec<Arc<Record>>,
    /// Records matching the active filters, across all pages.
    total_matches: usize,
    total_pages: usize,
    page_number: usize,
    page_size: usize,
}

/// Apply the fixed filter -> sort -> paginate pipeline.
///
/// The order is load-bearing: a page must be the Nth window of the
/// *matching* records, so the filter always runs before the page window is
/// cut. Pure and synchronous; never fails.
pub fn run(records: &[Arc<Record>], state: &QueryState) -> Page {
    let mut matches: Vec<Arc<Record>> = records
        .iter()
        .filter(|record| passes_filters(record, &state.filters))
        .cloned()
        .collect();

    if let Some((column, order)) = state.sort {
        // sort_by is stable: records equal under the active key keep
        // their arrival order
        matches.sort_by(|a, b| compare_records(a, b, column, order));
    }

    let total_matches = matches.len();
    let total_pages = total_matches.div_ceil(state.page_size).max(1);
    let start = (state.page_number - 1) * state.page_size;
    let records = if start >= total_matches {
        Vec::new()
    } else {
        matches[start..(start + state.page_size).min(total_matches)].to_vec()
    };

    Page {
        records,
        total_matches,
        total_pages,
        page_number: state.page_number,
        page_size: state.page_size,
    }
}

/// Total pages under the active filters, never less than one.
pub fn page_count(records: &[Arc<Record>], state: &QueryState) -> usize {
    let matches = records
        .iter()
        .filter(|record| passes_filters(record, &state.filters))
        .count();
    matches.div_ceil(state.page_size).max(1)
}

/// Logical AND across facets: the record must carry a selected value for
/// every active facet.
fn passes_filters(
    record: &Record,
    filters: &HashMap<FilterCategory, HashSet<String>>,
) -> bool {
    filters.iter().all(|(category, selected)| {
        category
            .values(record)
            .iter()
            .any(|value| selected.contains(&value.to_lowercase()))
    })
}

fn compare_records(a: &Record, b: &Record, column: SortColumn, order: Order) -> Ordering {
    match (column.key(a), column.key(b)) {
        // missing values sort last whatever the direction
        (SortKey::Missing, SortKey::Missing) => Ordering::Equal,
        (SortKey::Missing, _) => Ordering::Greater,
        (_, SortKey::Missing) => Ordering::Less,
        (key_a, key_b) => order.apply(key_a.cmp(&key_b)),
    }
}
