// Row preprocessing: raw text table -> canonical typed rows.
//
// Never fails. Absent columns are skipped and their fields take defaults;
// malformed cells degrade to `None` (dates, booleans) or 0.0 (counters).

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::model::{player_key, Counters, Dataset, Row, Schema};
use crate::table::{normalize_header, RawTable};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m/%d/%y", "%d.%m.%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

/// Normalise a raw table into the canonical row schema.
pub fn preprocess(table: &RawTable) -> Dataset {
    let headers: Vec<String> = table.headers.iter().map(|h| normalize_header(h)).collect();
    let col = |name: &str| headers.iter().position(|h| h == name);

    let date_idx = col("date");
    let match_idx = col("match_num");
    let week_idx = col("week_num");
    let set_idx = col("set_num");
    let name_idx = col("player_name");
    let position_idx = col("position");
    let format_idx = col("format");
    let season_idx = col("season");
    let win_idx = col("win");
    let lose_idx = col("lose");
    let counter_idx: Vec<(&str, usize)> = Counters::COLUMNS
        .iter()
        .filter_map(|c| col(*c).map(|i| (*c, i)))
        .collect();

    let mut rows = Vec::with_capacity(table.records.len());
    let mut bad_dates = 0usize;

    for record in &table.records {
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(|s| s.trim())
                .unwrap_or("")
        };

        let date_text = cell(date_idx);
        let date = parse_date(date_text);
        if date.is_none() && !date_text.is_empty() {
            bad_dates += 1;
        }

        let player_name = cell(name_idx).to_string();
        let win = win_idx.and_then(|i| parse_bool(cell(Some(i))));
        let lose = match lose_idx {
            Some(i) => parse_bool(cell(Some(i))),
            None => win.map(|w| !w),
        };

        let mut counters = Counters::default();
        for (name, idx) in &counter_idx {
            if let Some(slot) = counters.get_mut(name) {
                *slot = parse_counter(cell(Some(*idx)));
            }
        }

        rows.push(Row {
            date,
            year: date.map(|d| d.year()),
            match_num: cell(match_idx).to_string(),
            week_num: cell(week_idx).to_string(),
            set_num: cell(set_idx).to_string(),
            player_key: player_key(&player_name),
            player_name,
            position: cell(position_idx).to_string(),
            format: cell(format_idx).to_string(),
            season: cell(season_idx).to_string(),
            win,
            lose,
            counters,
        });
    }

    if bad_dates > 0 {
        debug!("{} date cells could not be parsed and were left empty", bad_dates);
    }

    let mut present: Vec<&str> = headers.iter().map(String::as_str).collect();
    if name_idx.is_some() {
        present.push("player_key");
    }
    if date_idx.is_some() {
        present.push("year");
    }
    if win_idx.is_some() {
        present.push("lose");
    }

    Dataset {
        rows,
        schema: Schema::from_columns(present),
    }
}

/// Render a dataset back into a raw table using the canonical text form of
/// every present column. `preprocess(&to_raw_table(&d)) == d`.
pub fn to_raw_table(dataset: &Dataset) -> RawTable {
    let headers = dataset.schema.columns().to_vec();
    let records = dataset
        .rows
        .iter()
        .map(|row| headers.iter().map(|h| render_cell(row, h)).collect())
        .collect();
    RawTable::new(headers, records)
}

fn render_cell(row: &Row, column: &str) -> String {
    let opt_bool = |b: Option<bool>| b.map(|b| b.to_string()).unwrap_or_default();
    match column {
        "date" => row
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        "year" => row.year.map(|y| y.to_string()).unwrap_or_default(),
        "match_num" => row.match_num.clone(),
        "week_num" => row.week_num.clone(),
        "set_num" => row.set_num.clone(),
        "player_name" => row.player_name.clone(),
        "player_key" => row.player_key.clone(),
        "position" => row.position.clone(),
        "format" => row.format.clone(),
        "season" => row.season.clone(),
        "win" => opt_bool(row.win),
        "lose" => opt_bool(row.lose),
        other => row
            .counters
            .get(other)
            .map(|v| v.to_string())
            .unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Cell coercion
// ---------------------------------------------------------------------------

pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Some(d) = DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
    {
        return Some(d);
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
    {
        return Some(dt.date());
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.date_naive())
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "" => None,
        "true" | "t" | "yes" | "y" | "w" | "win" => Some(true),
        "false" | "f" | "no" | "n" | "l" | "loss" | "lose" => Some(false),
        other => other.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v != 0.0),
    }
}

/// Numeric counter coercion: unparseable, non-finite, or negative values
/// become 0.0.
fn parse_counter(text: &str) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}
