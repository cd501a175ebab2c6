use crate::domain::Direction;
use crate::record::{ID_FIELD, Value};

/// How a column's cells are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderHint {
    Plain,
    /// Numeric 0-100 field drawn as a bar.
    Progress,
    /// User added column, empty values are shown as `N/A`.
    Placeholder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub id: String,
    pub label: String,
    pub render: RenderHint,
}

impl ColumnDef {
    pub fn new(id: impl Into<String>, label: impl Into<String>, render: RenderHint) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            render,
        }
    }

    pub fn plain(id: &str) -> Self {
        Self::new(id, id, RenderHint::Plain)
    }

    /// Text of a single cell, `width` is only used by the progress bar.
    pub fn format(&self, value: &Value, width: usize) -> String {
        match self.render {
            RenderHint::Plain => value.to_string(),
            RenderHint::Placeholder => {
                let s = value.to_string();
                if s.is_empty() { "N/A".to_string() } else { s }
            }
            RenderHint::Progress => match value.as_number() {
                Some(n) => progress_bar(n, width),
                None => value.to_string(),
            },
        }
    }
}

fn progress_bar(percent: f64, width: usize) -> String {
    let width = width.max(1);
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    let mut bar = "█".repeat(filled);
    bar.push_str(&"░".repeat(width - filled));
    bar
}

/// The value every record receives when a column is added.
pub fn placeholder_value(name: &str) -> Value {
    Value::Text(format!("Value for {name}"))
}

/// Ordered set of column definitions with unique ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSet {
    columns: Vec<ColumnDef>,
}

impl ColumnSet {
    pub fn base() -> Self {
        Self {
            columns: vec![
                ColumnDef::new("firstName", "First Name", RenderHint::Plain),
                ColumnDef::new("lastName", "Last Name", RenderHint::Plain),
                ColumnDef::new("age", "Age", RenderHint::Plain),
                ColumnDef::new("visits", "Visits", RenderHint::Plain),
                ColumnDef::new("status", "Status", RenderHint::Plain),
                ColumnDef::new("progress", "Profile Progress", RenderHint::Progress),
            ],
        }
    }

    /// Builds a column set from header names, dropping duplicates and the
    /// identity field.
    pub fn from_header<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut set = ColumnSet::default();
        for name in names {
            set.push(ColumnDef::plain(name));
        }
        set
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnDef> {
        self.columns.iter()
    }

    pub fn get(&self, idx: usize) -> Option<&ColumnDef> {
        self.columns.get(idx)
    }

    pub fn find(&self, id: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.id.as_str())
    }

    /// Appends a column. Returns false if the id is taken or reserved.
    pub fn push(&mut self, column: ColumnDef) -> bool {
        if column.id.is_empty() || column.id == ID_FIELD || self.contains(&column.id) {
            return false;
        }
        self.columns.push(column);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<ColumnDef> {
        let idx = self.position(id)?;
        Some(self.columns.remove(idx))
    }

    /// Moves a column one slot. Returns false when nothing moved.
    pub fn shift(&mut self, id: &str, direction: Direction) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        match direction {
            Direction::Left if idx > 0 => self.columns.swap(idx, idx - 1),
            Direction::Right if idx + 1 < self.columns.len() => self.columns.swap(idx, idx + 1),
            _ => return false,
        }
        true
    }
}

impl FromIterator<ColumnDef> for ColumnSet {
    fn from_iter<I: IntoIterator<Item = ColumnDef>>(iter: I) -> Self {
        let mut set = ColumnSet::default();
        for column in iter {
            set.push(column);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_schema_has_six_columns() {
        let set = ColumnSet::base();
        assert_eq!(set.len(), 6);
        assert_eq!(set.find("progress").map(|c| c.render), Some(RenderHint::Progress));
        assert!(!set.contains(ID_FIELD));
    }

    #[test]
    fn push_rejects_duplicates_and_reserved() {
        let mut set = ColumnSet::base();
        assert!(!set.push(ColumnDef::plain("age")));
        assert!(!set.push(ColumnDef::plain(ID_FIELD)));
        assert!(!set.push(ColumnDef::plain("")));
        assert!(set.push(ColumnDef::plain("note")));
        assert_eq!(set.len(), 7);
    }

    #[test]
    fn shift_stops_at_boundaries() {
        let mut set = ColumnSet::base();
        let before = set.clone();
        assert!(!set.shift("firstName", Direction::Left));
        assert!(!set.shift("progress", Direction::Right));
        assert!(!set.shift("missing", Direction::Left));
        assert_eq!(set, before);

        assert!(set.shift("age", Direction::Left));
        assert_eq!(set.position("age"), Some(1));
        assert!(set.shift("age", Direction::Right));
        assert_eq!(set, before);
    }

    #[test]
    fn header_skips_identity_and_duplicates() {
        let set = ColumnSet::from_header(["id", "a", "", "b", "a"]);
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn cell_formatting() {
        let note = ColumnDef::new("note", "note", RenderHint::Placeholder);
        assert_eq!(note.format(&Value::Absent, 10), "N/A");
        assert_eq!(note.format(&Value::from("x"), 10), "x");

        let progress = ColumnDef::new("progress", "Profile Progress", RenderHint::Progress);
        assert_eq!(progress.format(&Value::Number(50.0), 4), "██░░");
        assert_eq!(progress.format(&Value::from("n/a"), 4), "n/a");
    }
}
