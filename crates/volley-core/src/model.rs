// Canonical row schema produced by the preprocessor.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Numeric counters
// ---------------------------------------------------------------------------

macro_rules! counters {
    ($($field:ident),+ $(,)?) => {
        /// The fixed set of per-event numeric counters. Always non-negative;
        /// absent or unparseable cells are stored as 0.0.
        #[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
        pub struct Counters {
            $(pub $field: f64,)+
        }

        impl Counters {
            /// Column names, in canonical order.
            pub const COLUMNS: &'static [&'static str] = &[$(stringify!($field)),+];

            pub fn get(&self, column: &str) -> Option<f64> {
                match column {
                    $(stringify!($field) => Some(self.$field),)+
                    _ => None,
                }
            }

            pub fn get_mut(&mut self, column: &str) -> Option<&mut f64> {
                match column {
                    $(stringify!($field) => Some(&mut self.$field),)+
                    _ => None,
                }
            }
        }

        impl std::ops::AddAssign for Counters {
            fn add_assign(&mut self, other: Self) {
                $(self.$field += other.$field;)+
            }
        }
    };
}

counters!(
    srv_error,
    srv_good,
    srv_ace,
    rcv_error,
    rcv_bad,
    rcv_good,
    rcv_perfect,
    atk_error,
    atk_bad,
    atk_good,
    atk_kill,
    assists,
    blk_error,
    blk_solo,
    blk_assist_2,
    blk_assist_3,
    dig_miss,
    dig_touch,
    dig_up,
    defensive_error,
    fouls,
);

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// One event record: a single player in a single set or match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub date: Option<NaiveDate>,
    /// Derived from `date`; `None` when the date is absent or unparseable.
    pub year: Option<i32>,
    pub match_num: String,
    pub week_num: String,
    pub set_num: String,
    /// Original text, trimmed. Casing is preserved for display.
    pub player_name: String,
    pub player_key: String,
    pub position: String,
    pub format: String,
    pub season: String,
    pub win: Option<bool>,
    pub lose: Option<bool>,
    pub counters: Counters,
}

impl Row {
    /// 1.0 for a recorded win, else 0.0.
    pub fn wins(&self) -> f64 {
        if self.win == Some(true) {
            1.0
        } else {
            0.0
        }
    }

    pub fn losses(&self) -> f64 {
        if self.lose == Some(true) {
            1.0
        } else {
            0.0
        }
    }
}

/// Canonical identity for a player name: trimmed and case-folded.
pub fn player_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Most frequent original spelling per player key; ties go to the spelling
/// seen first.
pub fn display_names<'a>(rows: impl IntoIterator<Item = &'a Row>) -> HashMap<String, String> {
    // key -> spelling -> (count, first index)
    let mut seen: HashMap<&str, HashMap<&str, (usize, usize)>> = HashMap::new();
    for (idx, row) in rows.into_iter().enumerate() {
        let entry = seen
            .entry(row.player_key.as_str())
            .or_default()
            .entry(row.player_name.as_str())
            .or_insert((0, idx));
        entry.0 += 1;
    }

    seen.into_iter()
        .filter_map(|(key, spellings)| {
            spellings
                .into_iter()
                .max_by(|(_, (ca, ia)), (_, (cb, ib))| ca.cmp(cb).then(ib.cmp(ia)))
                .map(|(name, _)| (key.to_string(), name.to_string()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Known columns in canonical order. Counter columns follow.
pub const TEXT_COLUMNS: &[&str] = &[
    "date",
    "year",
    "match_num",
    "week_num",
    "set_num",
    "player_name",
    "player_key",
    "position",
    "format",
    "season",
    "win",
    "lose",
];

/// Which canonical columns are present after preprocessing, including the
/// derived ones (`year`, `player_key`, `lose`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    /// Build a schema from any set of column names, keeping only the known
    /// ones and ordering them canonically.
    pub fn from_columns<'a>(present: impl IntoIterator<Item = &'a str>) -> Self {
        let present: Vec<&str> = present.into_iter().collect();
        let columns = TEXT_COLUMNS
            .iter()
            .chain(Counters::COLUMNS.iter())
            .filter(|c| present.contains(*c))
            .map(|c| c.to_string())
            .collect();
        Schema { columns }
    }

    pub fn has(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// A preprocessed table: canonical rows plus the record of which columns
/// were actually supplied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub rows: Vec<Row>,
    pub schema: Schema,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_refs(&self) -> Vec<&Row> {
        self.rows.iter().collect()
    }

    /// Earliest and latest parsed dates, if any row has one.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self.rows.iter().filter_map(|r| r.date);
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }
}
