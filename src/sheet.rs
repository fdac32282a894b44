use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, DataType, Reader, Sheets};
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::{LinklyticsError, Result};

/// Rows above the header in the TOP POSTS sheet (title + blank line).
pub const TOP_POSTS_HEADER_OFFSET: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Engagement,
    TopPosts,
    Discovery,
    Followers,
    Demographics,
}

impl SheetKind {
    pub const ALL: [SheetKind; 5] = [
        SheetKind::Engagement,
        SheetKind::TopPosts,
        SheetKind::Discovery,
        SheetKind::Followers,
        SheetKind::Demographics,
    ];

    /// Sheets the pipeline reads; the rest only have to be recognised.
    pub const REQUIRED: [SheetKind; 2] = [SheetKind::Engagement, SheetKind::TopPosts];

    pub fn name(self) -> &'static str {
        match self {
            SheetKind::Engagement => "ENGAGEMENT",
            SheetKind::TopPosts => "TOP POSTS",
            SheetKind::Discovery => "DISCOVERY",
            SheetKind::Followers => "FOLLOWERS",
            SheetKind::Demographics => "DEMOGRAPHICS",
        }
    }

    pub fn from_name(name: &str) -> Option<SheetKind> {
        SheetKind::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for SheetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every sheet must be a known kind, and the ones the pipeline reads must exist.
pub fn validate_sheet_names(names: &[String]) -> Result<()> {
    for name in names {
        if SheetKind::from_name(name).is_none() {
            let expected = SheetKind::ALL.map(SheetKind::name).join(", ");
            return Err(LinklyticsError::UnknownSheet {
                sheet: name.clone(),
                expected,
            });
        }
    }
    for kind in SheetKind::REQUIRED {
        if !names.iter().any(|n| n == kind.name()) {
            return Err(LinklyticsError::MissingSheet(kind.name().to_string()));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Date(d) => write!(f, "{}", d.format("%m/%d/%Y")),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) if s.trim().is_empty() => Cell::Empty,
            Data::String(s) | Data::DurationIso(s) => Cell::Text(s.trim().to_string()),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Text(b.to_string()),
            Data::DateTime(_) | Data::DateTimeIso(_) => {
                data.as_date().map(Cell::Date).unwrap_or(Cell::Empty)
            }
            Data::Error(e) => Cell::Text(e.to_string()),
        }
    }
}

/// A sheet as a header row plus data rows.
#[derive(Debug, Clone)]
pub struct Table {
    pub sheet: String,
    headers: Vec<String>,
    columns: HashMap<String, usize>,
    rows: Vec<Vec<Cell>>,
    first_data_row: usize,
}

static EMPTY: Cell = Cell::Empty;

impl Table {
    /// Build a table from physical rows: skip `skip_rows`, take the next row
    /// as the header and the rest as data. Trailing blank rows are dropped.
    pub fn from_rows(sheet: &str, mut rows: Vec<Vec<Cell>>, skip_rows: usize) -> Self {
        while rows.last().is_some_and(|r| r.iter().all(Cell::is_empty)) {
            rows.pop();
        }

        let mut rest = rows.into_iter().skip(skip_rows);
        let header_cells = rest.next().unwrap_or_default();
        let headers = mangle_headers(
            header_cells
                .iter()
                .enumerate()
                .map(|(i, c)| match c {
                    Cell::Empty => format!("Unnamed: {}", i),
                    other => other.to_string(),
                })
                .collect(),
        );
        let columns = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), i))
            .collect();

        Table {
            sheet: sheet.to_string(),
            headers,
            columns,
            rows: rest.collect(),
            first_data_row: skip_rows + 1,
        }
    }

    /// Like [`Table::from_rows`] for rows that begin at sheet row `first_row`
    /// (0-based). `skip_rows` still counts from the top of the sheet.
    pub fn from_range(sheet: &str, rows: Vec<Vec<Cell>>, first_row: usize, skip_rows: usize) -> Self {
        let skip = skip_rows.saturating_sub(first_row);
        let mut table = Table::from_rows(sheet, rows, skip);
        table.first_data_row += first_row;
        table
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column(&self, name: &str) -> Result<usize> {
        self.columns
            .get(name)
            .copied()
            .ok_or_else(|| LinklyticsError::MissingColumn {
                sheet: self.sheet.clone(),
                column: name.to_string(),
            })
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&EMPTY)
    }

    /// 1-based row number as shown in a spreadsheet application.
    pub fn row_number(&self, row: usize) -> usize {
        self.first_data_row + row + 1
    }
}

/// Disambiguate repeated labels in order of appearance: `X`, `X.1`, `X.2`.
pub fn mangle_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .into_iter()
        .map(|h| {
            let count = seen.entry(h.clone()).or_insert(0);
            let label = if *count == 0 {
                h
            } else {
                format!("{}.{}", h, count)
            };
            *count += 1;
            label
        })
        .collect()
}

pub struct Workbook {
    path: PathBuf,
    sheets: Sheets<BufReader<File>>,
}

impl Workbook {
    pub fn open(path: &Path) -> Result<Self> {
        info!("Opening workbook: {}", path.display());
        let sheets = open_workbook_auto(path).map_err(|e| LinklyticsError::Workbook {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Workbook {
            path: path.to_path_buf(),
            sheets,
        })
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names()
    }

    pub fn validate(&self) -> Result<()> {
        validate_sheet_names(&self.sheet_names())
    }

    pub fn table(&mut self, kind: SheetKind, skip_rows: usize) -> Result<Table> {
        let range = self
            .sheets
            .worksheet_range(kind.name())
            .map_err(|e| LinklyticsError::Workbook {
                path: self.path.clone(),
                message: format!("sheet {}: {}", kind, e),
            })?;

        // A range starts at its first used cell, not at A1.
        let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
        let rows: Vec<Vec<Cell>> = range
            .rows()
            .map(|r| r.iter().map(Cell::from).collect())
            .collect();

        let table = Table::from_range(kind.name(), rows, first_row, skip_rows);
        debug!(sheet = %kind, rows = table.len(), headers = ?table.headers(), "Loaded sheet");
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn duplicate_headers_get_suffixes() {
        let headers = mangle_headers(
            ["Post URL", "Post publish date", "Engagements", "Post URL", "Post publish date", "Impressions", "Post URL"]
                .map(String::from)
                .to_vec(),
        );
        assert_eq!(
            headers,
            [
                "Post URL",
                "Post publish date",
                "Engagements",
                "Post URL.1",
                "Post publish date.1",
                "Impressions",
                "Post URL.2",
            ]
        );
    }

    #[test]
    fn table_skips_rows_before_header() {
        let rows = vec![
            vec![text("Maximum of 50 posts available to include in this list")],
            vec![],
            vec![text("Post URL"), text("Engagements"), text("Post URL")],
            vec![text("https://a"), Cell::Number(4.0), text("https://b")],
            vec![Cell::Empty, Cell::Empty],
        ];
        let table = Table::from_rows("TOP POSTS", rows, TOP_POSTS_HEADER_OFFSET);

        assert_eq!(table.len(), 1);
        assert_eq!(table.headers(), ["Post URL", "Engagements", "Post URL.1"]);
        let col = table.column("Post URL.1").unwrap();
        assert_eq!(table.cell(0, col), &text("https://b"));
        assert_eq!(table.row_number(0), 4);
    }

    #[test]
    fn row_numbers_follow_range_start() {
        // Title and blank line are outside the used range: the header is sheet row 3.
        let rows = vec![
            vec![text("Post URL"), text("Engagements")],
            vec![text("https://a"), Cell::Number(4.0)],
            vec![text("https://b"), Cell::Number(2.0)],
        ];
        let table = Table::from_range("TOP POSTS", rows, 2, TOP_POSTS_HEADER_OFFSET);

        assert_eq!(table.headers(), ["Post URL", "Engagements"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.row_number(0), 4);
        assert_eq!(table.row_number(1), 5);
    }

    #[test]
    fn range_starting_inside_skipped_rows() {
        // Only the blank line above the header is missing from the range.
        let rows = vec![
            vec![Cell::Empty],
            vec![text("Post URL")],
            vec![text("https://a")],
        ];
        let table = Table::from_range("TOP POSTS", rows, 1, TOP_POSTS_HEADER_OFFSET);
        assert_eq!(table.headers(), ["Post URL"]);
        assert_eq!(table.row_number(0), 4);
    }

    #[test]
    fn short_rows_read_as_empty() {
        let rows = vec![
            vec![text("A"), text("B")],
            vec![text("only a")],
        ];
        let table = Table::from_rows("ENGAGEMENT", rows, 0);
        assert_eq!(table.cell(0, 1), &Cell::Empty);
        assert_eq!(table.cell(5, 0), &Cell::Empty);
    }

    #[test]
    fn missing_column_is_reported() {
        let table = Table::from_rows("TOP POSTS", vec![vec![text("Post URL")]], 0);
        let err = table.column("Impressions").unwrap_err();
        assert!(matches!(err, LinklyticsError::MissingColumn { ref column, .. } if column == "Impressions"));
    }

    #[test]
    fn blank_header_cells_are_named() {
        let table = Table::from_rows("X", vec![vec![text("A"), Cell::Empty]], 0);
        assert_eq!(table.headers(), ["A", "Unnamed: 1"]);
    }

    #[test]
    fn known_sheets_validate() {
        let names: Vec<String> = SheetKind::ALL.iter().map(|k| k.name().to_string()).collect();
        assert!(validate_sheet_names(&names).is_ok());
    }

    #[test]
    fn unknown_sheet_is_rejected() {
        let names = vec!["ENGAGEMENT".to_string(), "TOP POSTS".into(), "Sheet1".into()];
        let err = validate_sheet_names(&names).unwrap_err();
        assert!(matches!(err, LinklyticsError::UnknownSheet { ref sheet, .. } if sheet == "Sheet1"));
    }

    #[test]
    fn required_sheet_must_exist() {
        let names = vec!["ENGAGEMENT".to_string(), "FOLLOWERS".into()];
        let err = validate_sheet_names(&names).unwrap_err();
        assert!(matches!(err, LinklyticsError::MissingSheet(ref s) if s == "TOP POSTS"));
    }

    #[test]
    fn cells_from_workbook_data() {
        assert_eq!(Cell::from(&Data::String("  x ".into())), text("x"));
        assert_eq!(Cell::from(&Data::String("   ".into())), Cell::Empty);
        assert_eq!(Cell::from(&Data::Int(3)), Cell::Number(3.0));
        assert_eq!(Cell::from(&Data::Float(2.5)), Cell::Number(2.5));
        assert_eq!(Cell::from(&Data::Empty), Cell::Empty);
    }
}
