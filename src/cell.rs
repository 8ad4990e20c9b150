// src/cell.rs
//! Untyped spreadsheet cells.
//!
//! Every uploaded export is first materialized as a rectangular grid of
//! `CellValue`s before any column logic runs. Downstream code decides per
//! context whether a `Text` cell holds a locale-formatted number.

use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    /// Types a raw cell string. Plain machine-readable numbers (e.g. "2.5")
    /// become `Number`; everything else stays `Text` so the locale heuristic
    /// in `numparse` can have a look later.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        if let Ok(n) = trimmed.parse::<f64>() {
            return CellValue::Number(n);
        }
        CellValue::Text(trimmed.to_string())
    }

    /// Trimmed text content, if this is a text cell.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Display form used when a cell is consumed as a label (employee names,
    /// sub-project labels). Numbers render in their shortest form.
    pub fn to_label(&self) -> String {
        match self {
            CellValue::Number(n) => format!("{}", n),
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Empty => String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

/// A rectangular grid of heterogeneous cell values. Rows may have different
/// lengths; consumers index defensively.
pub type Grid = Vec<Vec<CellValue>>;

/// Picks ';' over ',' when the first non-empty line contains more of them.
/// German spreadsheet exports commonly use the semicolon.
pub fn sniff_delimiter(content: &str) -> u8 {
    let first_line = content.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let semicolons = first_line.matches(';').count();
    let commas = first_line.matches(',').count();
    let tabs = first_line.matches('\t').count();
    if tabs > semicolons && tabs > commas {
        b'\t'
    } else if semicolons >= commas {
        b';'
    } else {
        b','
    }
}

/// Loads a delimited export into an untyped grid. No header handling here;
/// header detection is the caller's problem.
pub fn grid_from_delimited(content: &str) -> Result<Grid, csv::Error> {
    let delimiter = sniff_delimiter(content);
    debug!("Loading grid with delimiter {:?}", delimiter as char);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(content.as_bytes());

    let mut grid = Grid::new();
    for record in reader.records() {
        let record = record?;
        grid.push(record.iter().map(CellValue::from_raw).collect());
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_cell_typing() {
        assert_eq!(CellValue::from_raw("  "), CellValue::Empty);
        assert_eq!(CellValue::from_raw("2.5"), CellValue::Number(2.5));
        assert_eq!(CellValue::from_raw("-3"), CellValue::Number(-3.0));
        assert_eq!(
            CellValue::from_raw(" PL "),
            CellValue::Text("PL".to_string())
        );
        // Locale-formatted numbers are NOT numbers at this stage.
        assert_eq!(
            CellValue::from_raw("1.234,56"),
            CellValue::Text("1.234,56".to_string())
        );
    }

    #[test]
    fn delimiter_sniffing() {
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3"), b';');
        assert_eq!(sniff_delimiter("a,b,c"), b',');
        assert_eq!(sniff_delimiter("a\tb\tc"), b'\t');
        // Semicolon wins the tie, matching the German export default.
        assert_eq!(sniff_delimiter(""), b';');
    }

    #[test]
    fn grid_loading_keeps_ragged_rows() {
        let grid = grid_from_delimited("a;b;c\n1;2\n").unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0].len(), 3);
        assert_eq!(grid[1].len(), 2);
        assert_eq!(grid[1][0], CellValue::Number(1.0));
    }
}
