use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::columns::{ColumnDef, ColumnSet, RenderHint, placeholder_value};
use crate::csvio::{self, Imported};
use crate::domain::{Direction, GridConfig, GridError};
use crate::generator;
use crate::highlight::Highlight;
use crate::record::{Dataset, ID_FIELD, Record, Value};
use crate::view::{self, PageView, SortDirection, SortSpec, ViewState};

/// Owns the dataset and the column schema and keeps the derived page view in
/// sync with both.
pub struct TabularDataManager {
    data: Dataset,
    columns: ColumnSet,
    state: ViewState,
    view: PageView,
    highlight: Highlight,
}

impl TabularDataManager {
    pub fn new(config: &GridConfig) -> Self {
        let mut state = ViewState::new(config.page_size);
        state.ignore_case = config.filter_ignore_case;
        let mut manager = Self {
            data: Vec::new(),
            columns: ColumnSet::base(),
            view: PageView {
                rows: Vec::new(),
                page_index: 0,
                page_count: 1,
                page_size: state.page_size,
            },
            state,
            highlight: Highlight::new(Duration::from_millis(config.highlight_millis)),
        };
        manager.generate(config.initial_rows);
        manager
    }

    pub fn data(&self) -> &Dataset {
        &self.data
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn view(&self) -> &PageView {
        &self.view
    }

    pub fn record(&self, id: u64) -> Option<&Record> {
        self.data.iter().find(|r| r.id() == id)
    }

    /// Record at a position of the current page.
    pub fn page_record(&self, row: usize) -> Option<&Record> {
        self.view.page_rows().get(row).map(|&idx| &self.data[idx])
    }

    /// Key/value pairs of a record, `id` first, then the columns in display order.
    pub fn record_details(&self, id: u64) -> Option<Vec<(String, String)>> {
        let record = self.record(id)?;
        let mut details = vec![(ID_FIELD.to_string(), record.id().to_string())];
        details.extend(
            self.columns
                .iter()
                .map(|c| (c.id.clone(), record.get(&c.id).to_string())),
        );
        Some(details)
    }

    fn refresh_view(&mut self) {
        self.view = view::compute_view(&self.data, &self.columns, &self.state);
        self.state.page_index = self.view.page_index;
        trace!(
            "View: {} rows, page {}/{}",
            self.view.total_rows(),
            self.view.page_index + 1,
            self.view.page_count
        );
    }

    // Makes every record carry exactly the active columns.
    fn project_records(&mut self) {
        for record in self.data.iter_mut() {
            let stale: Vec<String> = record
                .field_names()
                .filter(|f| !self.columns.contains(f))
                .map(str::to_string)
                .collect();
            for field in stale {
                record.remove(&field);
            }
            for column in self.columns.iter() {
                if !record.has(&column.id) {
                    let value = match column.render {
                        RenderHint::Placeholder => placeholder_value(&column.id),
                        _ => Value::Absent,
                    };
                    record.set(column.id.clone(), value);
                }
            }
        }
    }

    /// Replaces the dataset with `count` fresh records. The column set is kept.
    pub fn generate(&mut self, count: usize) {
        self.data = generator::generate(count);
        self.project_records();
        self.state.page_index = 0;
        info!("Generated {count} records");
        self.refresh_view();
    }

    pub fn add_column(&mut self, name: &str) -> bool {
        self.add_column_at(name, Instant::now())
    }

    pub fn add_column_at(&mut self, name: &str, now: Instant) -> bool {
        let name = name.trim();
        if !self
            .columns
            .push(ColumnDef::new(name, name, RenderHint::Placeholder))
        {
            debug!("Rejected column name \"{name}\"");
            return false;
        }
        let value = placeholder_value(name);
        for record in self.data.iter_mut() {
            record.set(name, value.clone());
        }
        self.highlight.schedule(name, now);
        info!("Added column \"{name}\"");
        self.refresh_view();
        true
    }

    pub fn remove_column(&mut self, id: &str) -> bool {
        if self.columns.remove(id).is_none() {
            return false;
        }
        for record in self.data.iter_mut() {
            record.remove(id);
        }
        if self.state.sort.as_ref().is_some_and(|s| s.column == id) {
            self.state.sort = None;
        }
        if self.highlight.column() == Some(id) {
            self.highlight.cancel();
        }
        info!("Removed column \"{id}\"");
        self.refresh_view();
        true
    }

    pub fn move_column(&mut self, id: &str, direction: Direction) -> bool {
        let moved = self.columns.shift(id, direction);
        trace!("Move column \"{id}\" {direction:?}: {moved}");
        moved
    }

    /// Parses csv bytes and replaces dataset and schema. On error nothing changes.
    pub fn import(&mut self, bytes: Vec<u8>) -> Result<(), GridError> {
        let imported = csvio::parse_csv(bytes)?;
        self.apply_import(imported);
        Ok(())
    }

    pub fn apply_import(&mut self, imported: Imported) {
        if imported.records.is_empty() {
            return;
        }
        // Known columns keep their label and render hint.
        let base = ColumnSet::base();
        self.columns = imported
            .columns
            .iter()
            .map(|c| {
                self.columns
                    .find(&c.id)
                    .or_else(|| base.find(&c.id))
                    .unwrap_or(c)
                    .clone()
            })
            .collect();
        self.data = imported.records;
        if self
            .state
            .sort
            .as_ref()
            .is_some_and(|s| !self.columns.contains(&s.column))
        {
            self.state.sort = None;
        }
        self.highlight.cancel();
        self.state.page_index = 0;
        info!(
            "Imported {} records with {} columns",
            self.data.len(),
            self.columns.len()
        );
        self.refresh_view();
    }

    pub fn export(&self) -> Result<Vec<u8>, GridError> {
        csvio::write_csv(&self.data, &self.columns)
    }

    pub fn set_filter(&mut self, filter: &str) {
        if self.state.filter != filter {
            self.state.filter = filter.to_string();
            self.state.page_index = 0;
            self.refresh_view();
        }
    }

    pub fn set_sort(&mut self, sort: Option<SortSpec>) {
        self.state.sort = sort.filter(|s| self.columns.contains(&s.column));
        self.state.page_index = 0;
        self.refresh_view();
    }

    /// Cycles a column through first direction, other direction, unsorted.
    /// Text columns start ascending, numeric columns descending.
    pub fn toggle_sort(&mut self, id: &str) {
        if !self.columns.contains(id) {
            return;
        }
        let first = match self.data.first().map(|r| r.get(id)) {
            Some(Value::Text(_)) => SortDirection::Ascending,
            _ => SortDirection::Descending,
        };
        let next = match self.state.sort_direction(id) {
            None => Some(first),
            Some(current) if current == first => Some(match first {
                SortDirection::Ascending => SortDirection::Descending,
                SortDirection::Descending => SortDirection::Ascending,
            }),
            Some(_) => None,
        };
        self.set_sort(next.map(|direction| SortSpec {
            column: id.to_string(),
            direction,
        }));
    }

    fn goto_page(&mut self, page_index: usize) -> bool {
        if page_index >= self.view.page_count || page_index == self.view.page_index {
            return false;
        }
        self.state.page_index = page_index;
        self.view.page_index = page_index;
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.goto_page(self.view.page_index + 1)
    }

    pub fn previous_page(&mut self) -> bool {
        match self.view.page_index.checked_sub(1) {
            Some(page) => self.goto_page(page),
            None => false,
        }
    }

    pub fn first_page(&mut self) -> bool {
        self.goto_page(0)
    }

    pub fn last_page(&mut self) -> bool {
        self.goto_page(self.view.page_count - 1)
    }

    pub fn highlighted(&self, now: Instant) -> Option<&str> {
        self.highlight.active(now)
    }

    pub fn expire_highlight(&mut self, now: Instant) -> bool {
        self.highlight.expire(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(rows: usize) -> TabularDataManager {
        TabularDataManager::new(&GridConfig::default().with_initial_rows(rows))
    }

    fn snapshot(m: &TabularDataManager) -> (Dataset, ColumnSet) {
        (m.data().clone(), m.columns().clone())
    }

    #[test]
    fn scenario_filter_add_remove_sort() {
        let mut m = manager(10);
        assert_eq!(m.data().len(), 10);

        m.set_filter("First3");
        let hits: Vec<&Record> = m.view().records(m.data()).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].get("firstName"), &Value::from("First3"));
        m.set_filter("");

        assert_eq!(m.columns().len(), 6);
        assert!(m.add_column("note"));
        assert_eq!(m.columns().len(), 7);
        assert!(
            m.data()
                .iter()
                .all(|r| r.get("note") == &Value::from("Value for note"))
        );

        assert!(m.remove_column("age"));
        assert_eq!(m.columns().len(), 6);
        assert!(m.data().iter().all(|r| !r.has("age")));

        m.set_sort(Some(SortSpec {
            column: "visits".into(),
            direction: SortDirection::Descending,
        }));
        let max = m
            .data()
            .iter()
            .filter_map(|r| r.get("visits").as_number())
            .fold(f64::MIN, f64::max);
        let first = m.page_record(0).unwrap();
        assert_eq!(first.get("visits").as_number(), Some(max));
    }

    #[test]
    fn invalid_column_names_change_nothing() {
        let mut m = manager(5);
        let before = snapshot(&m);
        assert!(!m.add_column(""));
        assert!(!m.add_column("   "));
        assert!(!m.add_column("age"));
        assert!(!m.add_column(ID_FIELD));
        assert_eq!(snapshot(&m), before);
    }

    #[test]
    fn removing_unknown_column_is_noop() {
        let mut m = manager(5);
        let before = snapshot(&m);
        assert!(!m.remove_column("missing"));
        assert!(!m.remove_column(ID_FIELD));
        assert_eq!(snapshot(&m), before);
    }

    #[test]
    fn removing_sorted_column_clears_sort() {
        let mut m = manager(5);
        m.toggle_sort("age");
        assert!(m.state().sort.is_some());
        m.remove_column("age");
        assert!(m.state().sort.is_none());
    }

    #[test]
    fn move_column_round_trip() {
        let mut m = manager(1);
        let before = m.columns().clone();
        assert!(!m.move_column("firstName", Direction::Left));
        assert!(!m.move_column("progress", Direction::Right));
        assert!(m.move_column("visits", Direction::Left));
        assert!(m.move_column("visits", Direction::Right));
        assert_eq!(m.columns(), &before);
    }

    #[test]
    fn toggle_sort_cycles() {
        let mut m = manager(5);
        m.toggle_sort("firstName");
        assert_eq!(m.state().sort_direction("firstName"), Some(SortDirection::Ascending));
        m.toggle_sort("firstName");
        assert_eq!(m.state().sort_direction("firstName"), Some(SortDirection::Descending));
        m.toggle_sort("firstName");
        assert_eq!(m.state().sort, None);

        m.toggle_sort("visits");
        assert_eq!(m.state().sort_direction("visits"), Some(SortDirection::Descending));
    }

    #[test]
    fn pagination_stays_in_bounds() {
        let mut m = manager(25);
        assert_eq!(m.view().page_count, 3);
        assert!(!m.previous_page());
        assert!(m.next_page());
        assert!(m.next_page());
        assert!(!m.next_page());
        assert_eq!(m.view().page_rows().len(), 5);
        assert!(m.first_page());
        assert!(m.last_page());

        m.set_filter("First1");
        assert_eq!(m.view().page_index, 0);
    }

    #[test]
    fn generate_resets_page_and_keeps_added_columns() {
        let mut m = manager(30);
        m.add_column("note");
        m.remove_column("age");
        m.last_page();
        m.generate(12);
        assert_eq!(m.view().page_index, 0);
        assert_eq!(m.data().len(), 12);
        assert!(m.data().iter().all(|r| !r.has("age")));
        assert!(
            m.data()
                .iter()
                .all(|r| r.get("note") == &Value::from("Value for note"))
        );
    }

    #[test]
    fn failed_import_keeps_state() {
        let mut m = manager(5);
        let before = snapshot(&m);
        assert!(m.import(Vec::new()).is_err());
        assert!(m.import(b"a,b\n".to_vec()).is_err());
        assert_eq!(snapshot(&m), before);
    }

    #[test]
    fn export_import_reproduces_dataset() {
        let mut m = manager(20);
        m.add_column("note");
        m.move_column("note", Direction::Left);
        let before = snapshot(&m);

        let bytes = m.export().unwrap();
        m.generate(3);
        m.import(bytes).unwrap();
        assert_eq!(snapshot(&m), before);
    }

    #[test]
    fn import_replaces_schema() {
        let mut m = manager(5);
        m.import(b"city,pop\nOslo,700000\nBergen,290000\n".to_vec())
            .unwrap();
        assert_eq!(m.columns().ids().collect::<Vec<_>>(), vec!["city", "pop"]);
        assert_eq!(m.data().len(), 2);
        assert_eq!(m.record(2).unwrap().get("city"), &Value::from("Bergen"));
    }

    #[test]
    fn imported_records_carry_exactly_the_columns() {
        let mut m = manager(5);
        m.import(b",b,id\n1,2,abc\n3,4,def\n".to_vec()).unwrap();
        let columns: Vec<&str> = m.columns().ids().collect();
        assert_eq!(columns, vec!["column_1", "b", "id_original"]);
        for record in m.data() {
            let mut fields: Vec<&str> = record.field_names().collect();
            fields.sort();
            let mut expected = columns.clone();
            expected.sort();
            assert_eq!(fields, expected);
        }
        let text = String::from_utf8(m.export().unwrap()).unwrap();
        assert!(text.starts_with("id,column_1,b,id_original\n1,1,2,abc\n"));
    }

    #[test]
    fn highlight_follows_latest_add() {
        let start = Instant::now();
        let mut m = manager(1);
        m.add_column_at("a", start);
        m.add_column_at("b", start + Duration::from_secs(3));
        assert!(!m.expire_highlight(start + Duration::from_secs(6)));
        assert_eq!(m.highlighted(start + Duration::from_secs(6)), Some("b"));
        assert!(m.expire_highlight(start + Duration::from_secs(9)));
        assert_eq!(m.highlighted(start + Duration::from_secs(9)), None);
    }

    #[test]
    fn details_list_id_first() {
        let m = manager(2);
        let details = m.record_details(2).unwrap();
        assert_eq!(details[0], ("id".to_string(), "2".to_string()));
        assert_eq!(details.len(), 7);
        assert!(m.record_details(99).is_none());
    }
}
