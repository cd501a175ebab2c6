use std::cmp::Ordering;

use rayon::prelude::*;

use crate::columns::ColumnSet;
use crate::record::{Dataset, Record, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

/// Filter, sort and page position. Holds no data of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub filter: String,
    pub ignore_case: bool,
    pub sort: Option<SortSpec>,
    pub page_index: usize,
    pub page_size: usize,
}

impl ViewState {
    pub fn new(page_size: usize) -> Self {
        Self {
            filter: String::new(),
            ignore_case: false,
            sort: None,
            page_index: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn sort_direction(&self, column: &str) -> Option<SortDirection> {
        self.sort
            .as_ref()
            .filter(|s| s.column == column)
            .map(|s| s.direction)
    }
}

/// One page of the filtered and sorted dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    /// Dataset indices of every row passing the filter, in sorted order.
    pub rows: Vec<usize>,
    pub page_index: usize,
    pub page_count: usize,
    pub page_size: usize,
}

impl PageView {
    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    /// Dataset indices of the rows on the current page.
    pub fn page_rows(&self) -> &[usize] {
        let begin = std::cmp::min(self.page_index * self.page_size, self.rows.len());
        let end = std::cmp::min(begin + self.page_size, self.rows.len());
        &self.rows[begin..end]
    }

    pub fn records<'a>(&'a self, data: &'a Dataset) -> impl Iterator<Item = &'a Record> + 'a {
        self.page_rows().iter().map(move |&idx| &data[idx])
    }
}

pub fn page_count(rows: usize, page_size: usize) -> usize {
    rows.div_ceil(page_size.max(1)).max(1)
}

fn matches_filter(record: &Record, columns: &ColumnSet, term: &str, ignore_case: bool) -> bool {
    columns.ids().any(|id| {
        let value = record.get(id).to_string();
        if ignore_case {
            value.to_lowercase().contains(term)
        } else {
            value.contains(term)
        }
    })
}

// Absent values go last regardless of direction.
fn compare_rows(a: &Value, b: &Value, direction: SortDirection) -> Ordering {
    match (a.is_absent(), b.is_absent()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => match direction {
            SortDirection::Ascending => a.compare(b),
            SortDirection::Descending => b.compare(a),
        },
    }
}

pub fn compute_view(data: &Dataset, columns: &ColumnSet, state: &ViewState) -> PageView {
    let mut rows: Vec<usize> = if state.filter.is_empty() {
        (0..data.len()).collect()
    } else {
        let term = if state.ignore_case {
            state.filter.to_lowercase()
        } else {
            state.filter.clone()
        };
        data.par_iter()
            .enumerate()
            .filter(|(_, record)| matches_filter(record, columns, &term, state.ignore_case))
            .map(|(idx, _)| idx)
            .collect()
    };

    if let Some(sort) = state.sort.as_ref().filter(|s| columns.contains(&s.column)) {
        // sort_by is stable, equal rows keep dataset order
        rows.sort_by(|&a, &b| {
            compare_rows(data[a].get(&sort.column), data[b].get(&sort.column), sort.direction)
        });
    }

    let page_count = page_count(rows.len(), state.page_size);
    PageView {
        rows,
        page_index: std::cmp::min(state.page_index, page_count - 1),
        page_count,
        page_size: state.page_size.max(1),
    }
}
