// Cumulative and temporal rollups.
//
// Both modes share the first stage: rows are grouped by
// (date, format, season, week, player, year, position) with set and match
// identifiers dropped, and every numeric column is summed. Cumulative mode
// then collapses time away entirely; temporal mode keeps the date axis and
// produces team, player-with-position, and player-without-position tables.
// Summation is the only reducer.

use std::collections::{BTreeMap, HashMap};
use std::ops::AddAssign;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::metrics::{self, AccuracyMetrics, DerivedTotals, PerGameAverages};
use crate::model::{display_names, Counters, Row};

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Cumulative,
    Temporal,
}

impl AnalysisMode {
    /// Anything other than "temporal" (case-insensitive) is cumulative.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s.trim().eq_ignore_ascii_case("temporal") => AnalysisMode::Temporal,
            _ => AnalysisMode::Cumulative,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisMode::Cumulative => "cumulative",
            AnalysisMode::Temporal => "temporal",
        }
    }
}

// ---------------------------------------------------------------------------
// Tally: the summed numeric columns of a group
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Tally {
    pub counters: Counters,
    pub wins: f64,
    pub losses: f64,
    /// `wins + losses` at the first grouping stage, summed on later stages.
    pub games_count: f64,
}

impl Tally {
    fn from_row(row: &Row) -> Self {
        Tally {
            counters: row.counters,
            wins: row.wins(),
            losses: row.losses(),
            games_count: 0.0,
        }
    }
}

impl AddAssign for Tally {
    fn add_assign(&mut self, other: Self) {
        self.counters += other.counters;
        self.wins += other.wins;
        self.losses += other.losses;
        self.games_count += other.games_count;
    }
}

// ---------------------------------------------------------------------------
// Output tables
// ---------------------------------------------------------------------------

/// One row of the cumulative table: all time collapsed for one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerTotals {
    pub player_key: String,
    pub display_name: String,
    pub tally: Tally,
    pub totals: DerivedTotals,
    pub accuracy: AccuracyMetrics,
}

/// One row of a temporal table. `player_key`, `position`, and `season` are
/// `None` where that dimension has been collapsed away.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRow {
    pub date: Option<NaiveDate>,
    pub year: Option<i32>,
    pub week_num: String,
    pub season: Option<String>,
    pub position: Option<String>,
    pub player_key: Option<String>,
    pub display_name: Option<String>,
    pub tally: Tally,
    pub totals: DerivedTotals,
    pub accuracy: AccuracyMetrics,
    pub per_game: PerGameAverages,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CumulativeFrame {
    /// Sorted by player key.
    pub overall: Vec<PlayerTotals>,
}

/// Temporal tables, each sorted ascending by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemporalFrame {
    pub team_by_date: Vec<DateRow>,
    pub player_by_date: Vec<DateRow>,
    pub player_by_date_no_pos: Vec<DateRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AggregateFrame {
    Cumulative(CumulativeFrame),
    Temporal(TemporalFrame),
}

impl AggregateFrame {
    pub fn mode(&self) -> AnalysisMode {
        match self {
            AggregateFrame::Cumulative(_) => AnalysisMode::Cumulative,
            AggregateFrame::Temporal(_) => AnalysisMode::Temporal,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Aggregate preprocessed rows in the requested mode.
pub fn aggregate(rows: &[&Row], mode: AnalysisMode) -> AggregateFrame {
    match mode {
        AnalysisMode::Cumulative => AggregateFrame::Cumulative(build_cumulative(rows)),
        AnalysisMode::Temporal => AggregateFrame::Temporal(build_temporal(rows)),
    }
}

/// First-stage group identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct EventKey {
    date: Option<NaiveDate>,
    format: String,
    season: String,
    week_num: String,
    player_key: String,
    year: Option<i32>,
    position: String,
}

fn group_events(rows: &[&Row]) -> BTreeMap<EventKey, Tally> {
    let mut groups: BTreeMap<EventKey, Tally> = BTreeMap::new();
    for row in rows {
        let key = EventKey {
            date: row.date,
            format: row.format.clone(),
            season: row.season.clone(),
            week_num: row.week_num.clone(),
            player_key: row.player_key.clone(),
            year: row.year,
            position: row.position.clone(),
        };
        *groups.entry(key).or_default() += Tally::from_row(row);
    }
    for tally in groups.values_mut() {
        tally.games_count = tally.wins + tally.losses;
    }
    groups
}

pub fn build_cumulative(rows: &[&Row]) -> CumulativeFrame {
    let names = display_names(rows.iter().copied());
    let mut by_player: BTreeMap<String, Tally> = BTreeMap::new();
    for (key, tally) in group_events(rows) {
        *by_player.entry(key.player_key).or_default() += tally;
    }

    let overall = by_player
        .into_iter()
        .map(|(player_key, tally)| PlayerTotals {
            display_name: names.get(&player_key).cloned().unwrap_or_default(),
            totals: metrics::totals(&tally.counters),
            accuracy: metrics::accuracy(&tally.counters),
            player_key,
            tally,
        })
        .collect();

    CumulativeFrame { overall }
}

pub fn build_temporal(rows: &[&Row]) -> TemporalFrame {
    let names = display_names(rows.iter().copied());
    let events = group_events(rows);

    // Team by date: collapse position/format/season per player, then collapse
    // players. The team games count is the largest per-player count.
    let mut per_player_date: BTreeMap<(Option<NaiveDate>, Option<i32>, String, String), Tally> =
        BTreeMap::new();
    for (key, tally) in &events {
        let k = (key.date, key.year, key.player_key.clone(), key.week_num.clone());
        *per_player_date.entry(k).or_default() += *tally;
    }
    let mut team: BTreeMap<(Option<NaiveDate>, Option<i32>, String), Tally> = BTreeMap::new();
    for ((date, year, _player, week), tally) in per_player_date {
        let entry = team.entry((date, year, week)).or_default();
        let games = entry.games_count.max(tally.games_count);
        *entry += tally;
        entry.games_count = games;
    }
    let team_by_date = team
        .into_iter()
        .map(|((date, year, week_num), tally)| {
            date_row(date, year, week_num, None, None, None, None, tally)
        })
        .collect();

    // Player by date with position: format collapsed.
    type PosKey = (Option<NaiveDate>, Option<i32>, String, String, String, String);
    let mut with_pos: BTreeMap<PosKey, Tally> = BTreeMap::new();
    for (key, tally) in &events {
        let k = (
            key.date,
            key.year,
            key.season.clone(),
            key.week_num.clone(),
            key.position.clone(),
            key.player_key.clone(),
        );
        *with_pos.entry(k).or_default() += *tally;
    }

    // Position-dropped variant, built from the table above.
    type NoPosKey = (Option<NaiveDate>, Option<i32>, String, String, String);
    let mut no_pos: BTreeMap<NoPosKey, Tally> = BTreeMap::new();
    for ((date, year, season, week, _position, player), tally) in &with_pos {
        let k = (*date, *year, season.clone(), week.clone(), player.clone());
        *no_pos.entry(k).or_default() += *tally;
    }

    let display = |key: &str| names.get(key).cloned();
    let player_by_date = with_pos
        .into_iter()
        .map(|((date, year, season, week_num, position, player), tally)| {
            let name = display(&player);
            date_row(date, year, week_num, Some(season), Some(position), Some(player), name, tally)
        })
        .collect();
    let player_by_date_no_pos = no_pos
        .into_iter()
        .map(|((date, year, season, week_num, player), tally)| {
            let name = display(&player);
            date_row(date, year, week_num, Some(season), None, Some(player), name, tally)
        })
        .collect();

    TemporalFrame {
        team_by_date,
        player_by_date,
        player_by_date_no_pos,
    }
}

#[allow(clippy::too_many_arguments)]
fn date_row(
    date: Option<NaiveDate>,
    year: Option<i32>,
    week_num: String,
    season: Option<String>,
    position: Option<String>,
    player_key: Option<String>,
    display_name: Option<String>,
    tally: Tally,
) -> DateRow {
    DateRow {
        date,
        year,
        week_num,
        season,
        position,
        player_key,
        display_name,
        totals: metrics::totals(&tally.counters),
        accuracy: metrics::accuracy(&tally.counters),
        per_game: metrics::per_game(&tally.counters, tally.games_count),
        tally,
    }
}

/// Sum the tallies of any table's rows.
pub fn sum_tallies<'a>(tallies: impl IntoIterator<Item = &'a Tally>) -> Tally {
    tallies.into_iter().fold(Tally::default(), |mut acc, t| {
        acc += *t;
        acc
    })
}

/// Per-player totals across every date of a temporal table.
pub fn totals_by_player(rows: &[DateRow]) -> HashMap<String, Tally> {
    let mut out: HashMap<String, Tally> = HashMap::new();
    for row in rows {
        if let Some(key) = &row.player_key {
            *out.entry(key.clone()).or_default() += row.tally;
        }
    }
    out
}
