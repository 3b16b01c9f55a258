use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::error::HarvestError;

/// Column-named grid of string cells, the shape OpenML content is exported in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Removes a column and returns its cells in row order.
    pub fn take_column(&mut self, name: &str) -> Option<Vec<String>> {
        let index = self.column_index(name)?;
        self.columns.remove(index);
        Some(self.rows.iter_mut().map(|row| row.remove(index)).collect())
    }

    pub fn push_column(&mut self, name: &str, values: Vec<String>) -> Result<(), HarvestError> {
        if values.len() != self.rows.len() {
            return Err(HarvestError::TableShape(format!(
                "column {name} has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    pub fn write_csv_to<W: Write>(&self, mut out: W) -> io::Result<()> {
        write_row(&mut out, &self.columns)?;
        for row in &self.rows {
            write_row(&mut out, row)?;
        }
        out.flush()
    }

    /// Writes the table as CSV with a header row, replacing `path` atomically.
    pub fn write_csv(&self, path: &Path) -> Result<(), HarvestError> {
        let parent = path
            .parent()
            .ok_or_else(|| HarvestError::Filesystem("invalid export path".to_string()))?;
        fs::create_dir_all(parent).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix(".export")
            .tempfile_in(parent)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        self.write_csv_to(io::BufWriter::new(temp.as_file_mut()))
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        temp.persist(path)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row<W: Write>(out: &mut W, row: &[String]) -> io::Result<()> {
    for (index, cell) in row.iter().enumerate() {
        if index > 0 {
            out.write_all(b",")?;
        }
        if needs_quotes(cell) {
            write!(out, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            out.write_all(cell.as_bytes())?;
        }
    }
    out.write_all(b"\n")
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn sample() -> Table {
        Table {
            columns: vec!["a".to_string(), "b".to_string(), "target".to_string()],
            rows: vec![
                vec!["1".to_string(), "x, y".to_string(), "yes".to_string()],
                vec!["2".to_string(), "say \"hi\"".to_string(), "no".to_string()],
            ],
        }
    }

    #[test]
    fn take_and_push_column() {
        let mut table = sample();
        let target = table.take_column("target").unwrap();
        assert_eq!(target, vec!["yes", "no"]);
        assert_eq!(table.columns, vec!["a", "b"]);
        assert!(table.take_column("missing").is_none());

        table.push_column("class", target).unwrap();
        assert_eq!(table.columns, vec!["a", "b", "class"]);
        assert_eq!(table.rows[1][2], "no");
        assert_matches!(
            table.push_column("short", vec![]),
            Err(HarvestError::TableShape(msg)) if msg.contains("short")
        );
        assert_eq!(table.columns, vec!["a", "b", "class"]);
    }

    #[test]
    fn csv_quotes_special_cells() {
        let mut out = Vec::new();
        sample().write_csv_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "a,b,target\n1,\"x, y\",yes\n2,\"say \"\"hi\"\"\",no\n"
        );
    }
}
