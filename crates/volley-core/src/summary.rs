// Summary construction: the header fields, headline accuracies, and the
// mode-specific statistics block.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::aggregate::{aggregate, sum_tallies, AggregateFrame, AnalysisMode, Tally};
use crate::config::EngineConfig;
use crate::metrics::{self, round_to, safe_div};
use crate::model::{display_names, Dataset};
use crate::resolver::Resolution;
use crate::trend::{TemporalStats, TrendAnalyzer};

/// The summary returned to collaborators. Field names are the wire contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub rows: usize,
    pub players: Vec<String>,
    /// ISO date, or empty when no date parsed.
    pub date_min: String,
    pub date_max: String,
    pub srv_accuracy: f64,
    pub rcv_accuracy: f64,
    pub atk_accuracy: f64,
    pub avg_errors_per_set: f64,
    pub analysis_mode: AnalysisMode,
    pub mode_specific_stats: Option<ModeStats>,
}

impl Summary {
    /// The default summary paired with an error message.
    pub fn empty(mode: AnalysisMode) -> Self {
        Summary {
            rows: 0,
            players: Vec::new(),
            date_min: String::new(),
            date_max: String::new(),
            srv_accuracy: 0.0,
            rcv_accuracy: 0.0,
            atk_accuracy: 0.0,
            avg_errors_per_set: 0.0,
            analysis_mode: mode,
            mode_specific_stats: None,
        }
    }

    pub fn cumulative_stats(&self) -> Option<&CumulativeStats> {
        match &self.mode_specific_stats {
            Some(ModeStats::Cumulative(s)) => Some(s),
            _ => None,
        }
    }

    pub fn temporal_stats(&self) -> Option<&TemporalStats> {
        match &self.mode_specific_stats {
            Some(ModeStats::Temporal(s)) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ModeStats {
    Cumulative(CumulativeStats),
    Temporal(TemporalStats),
}

/// Totals over the cumulative table. Counts are truncated to integers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CumulativeStats {
    pub total_games: i64,
    pub total_wins: i64,
    pub total_losses: i64,
    pub total_serves: i64,
    pub total_aces: i64,
    pub total_srv_errors: i64,
    pub ace_percentage: f64,
    pub total_receives: i64,
    pub total_perfect_passes: i64,
    pub total_rcv_errors: i64,
    pub perfect_pass_percentage: f64,
    pub total_attacks: i64,
    pub total_kills: i64,
    pub total_atk_errors: i64,
    pub kill_percentage: f64,
    pub total_blocks: f64,
    pub total_digs: i64,
    pub total_assists: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_serves_per_game: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_aces_per_game: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_attacks_per_game: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_kills_per_game: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_assists_per_game: Option<f64>,
}

impl CumulativeStats {
    pub fn from_tally(tally: &Tally) -> Self {
        let c = &tally.counters;
        let t = metrics::totals(c);
        let int = |v: f64| v.trunc() as i64;

        let total_games = int(tally.games_count);
        let total_serves = int(t.serve_total);
        let total_aces = int(c.srv_ace);
        let total_receives = int(t.receive_total);
        let total_perfect_passes = int(c.rcv_perfect);
        let total_attacks = int(t.attack_total);
        let total_kills = int(c.atk_kill);
        let total_assists = int(c.assists);

        let ratio = |n: i64, d: i64| safe_div(n as f64, d as f64);
        let per_game = |v: i64| (total_games > 0).then(|| round_to(ratio(v, total_games), 2));

        CumulativeStats {
            total_games,
            total_wins: int(tally.wins),
            total_losses: int(tally.losses),
            total_serves,
            total_aces,
            total_srv_errors: int(c.srv_error),
            ace_percentage: ratio(total_aces, total_serves),
            total_receives,
            total_perfect_passes,
            total_rcv_errors: int(c.rcv_error),
            perfect_pass_percentage: ratio(total_perfect_passes, total_receives),
            total_attacks,
            total_kills,
            total_atk_errors: int(c.atk_error),
            kill_percentage: ratio(total_kills, total_attacks),
            total_blocks: t.block_total,
            total_digs: int(t.dig_total),
            total_assists,
            avg_serves_per_game: per_game(total_serves),
            avg_aces_per_game: per_game(total_aces),
            avg_attacks_per_game: per_game(total_attacks),
            avg_kills_per_game: per_game(total_kills),
            avg_assists_per_game: per_game(total_assists),
        }
    }
}

/// Build the summary for an already resolved row view.
///
/// The header (rows, players, date range) always describes the whole
/// dataset; the accuracies and mode statistics describe the resolved rows.
pub fn compute_summary(
    dataset: &Dataset,
    resolution: &Resolution<'_>,
    mode: AnalysisMode,
    config: &EngineConfig,
) -> Summary {
    let players: BTreeSet<String> = display_names(dataset.rows.iter())
        .into_iter()
        .filter(|(key, _)| !key.is_empty())
        .map(|(_, name)| name)
        .collect();
    let (date_min, date_max) = match dataset.date_range() {
        Some((lo, hi)) => (lo.to_string(), hi.to_string()),
        None => (String::new(), String::new()),
    };

    let (working, mode_specific_stats) = match aggregate(&resolution.rows, mode) {
        AggregateFrame::Cumulative(frame) => {
            let total = sum_tallies(frame.overall.iter().map(|p| &p.tally));
            let stats = (!frame.overall.is_empty())
                .then(|| ModeStats::Cumulative(CumulativeStats::from_tally(&total)));
            (total, stats)
        }
        AggregateFrame::Temporal(frame) => {
            let total = sum_tallies(frame.player_by_date_no_pos.iter().map(|r| &r.tally));
            let table = if resolution.is_filtered() {
                &frame.player_by_date_no_pos
            } else {
                &frame.team_by_date
            };
            // Undated groups have no place on the time axis.
            let series: Vec<_> = table.iter().filter(|r| r.date.is_some()).cloned().collect();
            let stats = (!series.is_empty()).then(|| {
                let analyzer = TrendAnalyzer::new(config.recent_window);
                ModeStats::Temporal(analyzer.analyze(&series, dataset.schema.has("win")))
            });
            (total, stats)
        }
    };

    let acc = metrics::accuracy(&working.counters);
    let errors = metrics::total_errors_with_faults(&working.counters);

    Summary {
        rows: dataset.len(),
        players: players.into_iter().collect(),
        date_min,
        date_max,
        srv_accuracy: acc.srv_accuracy,
        rcv_accuracy: acc.rcv_accuracy,
        atk_accuracy: acc.atk_accuracy,
        avg_errors_per_set: round_to(safe_div(errors, working.games_count), 3),
        analysis_mode: mode,
        mode_specific_stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::preprocess;
    use crate::resolver::PlayerResolver;
    use crate::table::load_csv_from_reader;

    const CSV: &str = "\
date,season,week_num,player_name,position,win,srv_good,srv_error,srv_ace,atk_kill,atk_error,atk_good,rcv_perfect,rcv_good,fouls
2024-01-01,fall,1,Ann,OH,1,8,2,0,3,1,2,1,1,1
2024-01-01,fall,1,Bob,MB,0,3,1,1,1,1,1,0,1,0
2024-01-08,fall,2,ann,OH,1,9,1,0,2,0,2,2,0,0
2024-01-15,fall,3,Ann,OH,0,5,0,2,1,2,1,0,2,0";

    fn dataset() -> Dataset {
        preprocess(&load_csv_from_reader(CSV.as_bytes()).unwrap())
    }

    fn summary_for(query: Option<&str>, mode: AnalysisMode) -> Summary {
        let ds = dataset();
        let res = PlayerResolver::default().resolve(&ds, query).unwrap();
        compute_summary(&ds, &res, mode, &EngineConfig::default())
    }

    #[test]
    fn header_describes_whole_dataset() {
        let s = summary_for(Some("bob"), AnalysisMode::Cumulative);
        assert_eq!(s.rows, 4);
        assert_eq!(s.players, vec!["Ann".to_string(), "Bob".to_string()]);
        assert_eq!(s.date_min, "2024-01-01");
        assert_eq!(s.date_max, "2024-01-15");
    }

    #[test]
    fn filtered_cumulative_accuracies() {
        let s = summary_for(Some("ann"), AnalysisMode::Cumulative);
        // serves: 22 good + 3 error + 2 ace = 27
        assert_eq!(s.srv_accuracy, round_to(24.0 / 27.0, 3));
        // errors incl. fouls: srv 3 + atk 3 + fouls 1 = 7 over 3 games
        assert_eq!(s.avg_errors_per_set, 2.333);

        let stats = s.cumulative_stats().unwrap();
        assert_eq!(stats.total_games, 3);
        assert_eq!(stats.total_wins, 2);
        assert_eq!(stats.total_losses, 1);
        assert_eq!(stats.total_serves, 27);
        assert_eq!(stats.total_aces, 2);
        assert_eq!(stats.avg_serves_per_game, Some(9.0));
        assert!((stats.ace_percentage - 2.0 / 27.0).abs() < 1e-12);
    }

    #[test]
    fn cumulative_per_game_averages_absent_without_games() {
        let ds = preprocess(&load_csv_from_reader("player_name,srv_good\nAnn,4".as_bytes()).unwrap());
        let res = PlayerResolver::default().resolve(&ds, None).unwrap();
        let s = compute_summary(&ds, &res, AnalysisMode::Cumulative, &EngineConfig::default());
        assert_eq!(s.avg_errors_per_set, 0.0);
        assert_eq!(s.date_min, "");

        let json = serde_json::to_value(&s).unwrap();
        let stats = &json["mode_specific_stats"];
        assert_eq!(stats["total_games"], 0);
        assert!(stats.get("avg_serves_per_game").is_none());
    }

    #[test]
    fn temporal_unfiltered_uses_team_series() {
        let s = summary_for(None, AnalysisMode::Temporal);
        let stats = s.temporal_stats().unwrap();
        assert_eq!(stats.games_analyzed, 3);
        assert_eq!(stats.first_game.as_deref(), Some("2024-01-01"));
        assert_eq!(stats.last_game.as_deref(), Some("2024-01-15"));
        assert!(stats.srv.is_some());
        assert!(stats.momentum.is_some());
    }

    #[test]
    fn temporal_single_date_has_no_trends() {
        let s = summary_for(Some("bob"), AnalysisMode::Temporal);
        let stats = s.temporal_stats().unwrap();
        assert_eq!(stats.games_analyzed, 1);
        assert!(!stats.has_trends());
    }

    #[test]
    fn temporal_filtered_trend_follows_per_date_accuracy() {
        let s = summary_for(Some("Ann"), AnalysisMode::Temporal);
        let stats = s.temporal_stats().unwrap();
        assert_eq!(stats.games_analyzed, 3);
        let srv = stats.srv.unwrap();
        // per-date srv accuracy: 0.8, 0.9, 1.0
        assert!((srv.trend - 0.1).abs() < 1e-9);
        assert_eq!(srv.best_game, 1.0);
        assert_eq!(srv.worst_game, 0.8);
    }

    #[test]
    fn temporal_without_dates_has_no_mode_stats() {
        let mut csv_data = String::from("week_num,player_name,win,srv_good,srv_error\n");
        for week in 1..=10 {
            csv_data.push_str(&format!("{week},Ann,1,{week},1\n"));
        }
        let ds = preprocess(&load_csv_from_reader(csv_data.as_bytes()).unwrap());
        assert!(!ds.schema.has("date"));

        for query in [None, Some("ann")] {
            let res = PlayerResolver::default().resolve(&ds, query).unwrap();
            let s = compute_summary(&ds, &res, AnalysisMode::Temporal, &EngineConfig::default());
            assert!(s.mode_specific_stats.is_none(), "{query:?}");
            assert_eq!(s.date_min, "");
            // headline accuracies still cover every row
            assert!(s.srv_accuracy > 0.0);
        }
    }

    #[test]
    fn temporal_skips_undated_rows() {
        let csv_data = "\
date,player_name,srv_good,srv_error
2024-01-01,Ann,8,2
not-a-date,Ann,1,9
2024-01-08,Ann,9,1";
        let ds = preprocess(&load_csv_from_reader(csv_data.as_bytes()).unwrap());
        let res = PlayerResolver::default().resolve(&ds, Some("ann")).unwrap();
        let s = compute_summary(&ds, &res, AnalysisMode::Temporal, &EngineConfig::default());
        let stats = s.temporal_stats().unwrap();
        assert_eq!(stats.games_analyzed, 2);
        assert!((stats.srv.unwrap().trend - 0.1).abs() < 1e-9);
    }

    #[test]
    fn empty_selection_has_null_mode_stats() {
        let ds = preprocess(&load_csv_from_reader("player_name,srv_good\n".as_bytes()).unwrap());
        let res = PlayerResolver::default().resolve(&ds, None).unwrap();
        for mode in [AnalysisMode::Cumulative, AnalysisMode::Temporal] {
            let s = compute_summary(&ds, &res, mode, &EngineConfig::default());
            assert!(s.mode_specific_stats.is_none());
            let json = serde_json::to_value(&s).unwrap();
            assert!(json["mode_specific_stats"].is_null());
        }
    }

    #[test]
    fn wire_contract_field_names() {
        let json = serde_json::to_value(summary_for(None, AnalysisMode::Cumulative)).unwrap();
        for key in [
            "rows",
            "players",
            "date_min",
            "date_max",
            "srv_accuracy",
            "rcv_accuracy",
            "atk_accuracy",
            "avg_errors_per_set",
            "analysis_mode",
            "mode_specific_stats",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["analysis_mode"], "cumulative");
    }
}
