use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{LinklyticsError, Result};
use crate::posts::{RawPost, RawPostStore};
use crate::sheet::{Cell, Table};

pub const DATE_FORMAT: &str = "%m/%d/%Y";

// TOP POSTS holds two lists side by side: top posts by engagements, then top
// posts by impressions. Their repeated labels come back suffixed with ".1".
const ENGAGEMENTS_SIDE: SubRecord = SubRecord {
    url: "Post URL",
    date: "Post publish date",
    count: "Engagements",
};
const IMPRESSIONS_SIDE: SubRecord = SubRecord {
    url: "Post URL.1",
    date: "Post publish date.1",
    count: "Impressions",
};

struct SubRecord {
    url: &'static str,
    date: &'static str,
    count: &'static str,
}

struct Columns {
    url: usize,
    date: usize,
    count: usize,
}

impl SubRecord {
    fn columns(&self, table: &Table) -> Result<Columns> {
        Ok(Columns {
            url: table.column(self.url)?,
            date: table.column(self.date)?,
            count: table.column(self.count)?,
        })
    }

    /// `None` when all three cells are blank (one list ran shorter than the other).
    fn read(&self, table: &Table, cols: &Columns, row: usize) -> Result<Option<(String, NaiveDate, u64)>> {
        let url = table.cell(row, cols.url);
        let date = table.cell(row, cols.date);
        let count = table.cell(row, cols.count);
        if url.is_empty() && date.is_empty() && count.is_empty() {
            return Ok(None);
        }

        let row_no = table.row_number(row);
        let url = match url {
            Cell::Empty => return Err(parse_error(row_no, self.url, url, "missing post URL")),
            other => other.to_string(),
        };
        let date = parse_date(date).map_err(|e| parse_error(row_no, self.date, date, &e))?;
        let count = parse_count(count).map_err(|e| parse_error(row_no, self.count, count, &e))?;
        Ok(Some((url, date, count)))
    }
}

fn parse_error(row: usize, column: &str, cell: &Cell, reason: &str) -> LinklyticsError {
    LinklyticsError::Parse {
        row,
        column: column.to_string(),
        value: cell.to_string(),
        reason: reason.to_string(),
    }
}

pub fn parse_date(cell: &Cell) -> std::result::Result<NaiveDate, String> {
    match cell {
        Cell::Date(d) => Ok(*d),
        Cell::Text(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|e| e.to_string()),
        Cell::Number(_) => Err("expected a MM/DD/YYYY date, got a number".into()),
        Cell::Empty => Err("missing date".into()),
    }
}

pub fn parse_count(cell: &Cell) -> std::result::Result<u64, String> {
    match cell {
        Cell::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Ok(*n as u64),
        Cell::Number(n) => Err(format!("{} is not a non-negative integer", n)),
        Cell::Text(s) => s
            .trim()
            .replace(',', "")
            .parse::<u64>()
            .map_err(|e| e.to_string()),
        Cell::Date(_) => Err("expected a count, got a date".into()),
        Cell::Empty => Err("missing count".into()),
    }
}

/// Merge both lists of a TOP POSTS table into one store, ranked by engagements.
///
/// Any malformed cell fails the whole table.
pub fn reconcile_top_posts(table: &Table) -> Result<RawPostStore> {
    let eng_cols = ENGAGEMENTS_SIDE.columns(table)?;
    let imp_cols = IMPRESSIONS_SIDE.columns(table)?;
    let mut store = RawPostStore::new();

    for row in 0..table.len() {
        if let Some((url, date, impressions)) = IMPRESSIONS_SIDE.read(table, &imp_cols, row)? {
            store.add_post(RawPost::with_impressions(&url, date, impressions));
        }
        if let Some((url, date, engagements)) = ENGAGEMENTS_SIDE.read(table, &eng_cols, row)? {
            store.add_post(RawPost::with_engagements(&url, date, engagements));
        }
    }

    store.sort_by_engagements();
    info!(rows = table.len(), posts = store.len(), "Reconciled top posts");
    debug!("Ranked posts:\n{}", store);
    Ok(store)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagementDay {
    pub date: NaiveDate,
    pub impressions: u64,
    pub engagements: u64,
}

/// Daily rows of the ENGAGEMENT sheet.
pub fn parse_engagement_days(table: &Table) -> Result<Vec<EngagementDay>> {
    let date_col = table.column("Date")?;
    let imp_col = table.column("Impressions")?;
    let eng_col = table.column("Engagements")?;

    let mut days = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let (date, imp, eng) = (
            table.cell(row, date_col),
            table.cell(row, imp_col),
            table.cell(row, eng_col),
        );
        if date.is_empty() && imp.is_empty() && eng.is_empty() {
            continue;
        }
        let row_no = table.row_number(row);
        days.push(EngagementDay {
            date: parse_date(date).map_err(|e| parse_error(row_no, "Date", date, &e))?,
            impressions: parse_count(imp).map_err(|e| parse_error(row_no, "Impressions", imp, &e))?,
            engagements: parse_count(eng).map_err(|e| parse_error(row_no, "Engagements", eng, &e))?,
        });
    }
    debug!(days = days.len(), "Parsed engagement days");
    Ok(days)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountTotals {
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub days: usize,
    pub impressions: u64,
    pub engagements: u64,
}

impl AccountTotals {
    pub fn from_days(days: &[EngagementDay]) -> Option<Self> {
        let first_day = days.iter().map(|d| d.date).min()?;
        let last_day = days.iter().map(|d| d.date).max()?;
        Some(AccountTotals {
            first_day,
            last_day,
            days: days.len(),
            impressions: days.iter().map(|d| d.impressions).sum(),
            engagements: days.iter().map(|d| d.engagements).sum(),
        })
    }
}
