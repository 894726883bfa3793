// Raw tabular input and CSV ingestion.
//
// The loader is deliberately loose: header names are trimmed and lower-cased,
// records may be ragged, and unreadable records are skipped with a warning.
// Column semantics are applied later by the preprocessor.

use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// An untyped table: column names plus text cells. Cells beyond a record's
/// length are treated as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, records: Vec<Vec<String>>) -> Self {
        RawTable { headers, records }
    }

    /// Index of `column` after header normalisation.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| normalize_header(h) == column)
    }
}

/// Dataset metadata handed to the commentary collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetMeta {
    pub rows: usize,
    pub cols: usize,
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
}

impl DatasetMeta {
    pub fn from_table(table: &RawTable, source_name: Option<String>) -> Self {
        DatasetMeta {
            rows: table.records.len(),
            cols: table.headers.len(),
            columns: table.headers.clone(),
            source_name,
        }
    }
}

pub(crate) fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

/// Read a CSV stream into a `RawTable`. Headers are normalised here so the
/// metadata reports the names the engine will match on.
pub fn load_csv_from_reader<R: Read>(rdr: R) -> Result<RawTable, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(rdr);

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        match result {
            Ok(record) => records.push(record.iter().map(str::to_string).collect()),
            Err(e) => {
                warn!("skipping unreadable record {}: {}", idx + 1, e);
            }
        }
    }

    Ok(RawTable { headers, records })
}

/// Load a CSV file and describe it.
pub fn load_csv(path: &Path) -> Result<(RawTable, DatasetMeta), LoadError> {
    let file = std::fs::File::open(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let table = load_csv_from_reader(file).map_err(|e| LoadError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;

    if table.headers.iter().all(|h| h.is_empty()) {
        return Err(LoadError::Validation(format!(
            "{} has no header row",
            path.display()
        )));
    }

    let source_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    let meta = DatasetMeta::from_table(&table, source_name);
    Ok((table, meta))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_lowercased_and_trimmed() {
        let csv_data = "\
 Player_Name ,DATE,Srv_Ace
Ann,2024-01-01,2";

        let table = load_csv_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["player_name", "date", "srv_ace"]);
        assert_eq!(table.records, vec![vec!["Ann", "2024-01-01", "2"]]);
        assert_eq!(table.column_index("srv_ace"), Some(2));
    }

    #[test]
    fn ragged_records_are_kept() {
        let csv_data = "\
player_name,srv_ace,srv_good
Ann,1
Bob,2,3,extra";

        let table = load_csv_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0], vec!["Ann", "1"]);
        assert_eq!(table.records[1].len(), 4);
    }

    #[test]
    fn header_only_csv_has_no_records() {
        let table = load_csv_from_reader("player_name,srv_ace".as_bytes()).unwrap();
        assert!(table.records.is_empty());
        assert_eq!(table.headers.len(), 2);
    }

    #[test]
    fn meta_describes_table() {
        let table = load_csv_from_reader("a,b,c\n1,2,3\n4,5,6".as_bytes()).unwrap();
        let meta = DatasetMeta::from_table(&table, Some("stats.csv".into()));
        assert_eq!(meta.rows, 2);
        assert_eq!(meta.cols, 3);
        assert_eq!(meta.columns, vec!["a", "b", "c"]);
        assert_eq!(meta.source_name.as_deref(), Some("stats.csv"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_csv(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
