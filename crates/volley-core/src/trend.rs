// Trend, dispersion, and recency statistics over a temporal aggregate.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::aggregate::DateRow;
use crate::config::DEFAULT_RECENT_WINDOW;
use crate::metrics::safe_div;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Statistics for one metric series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricTrend {
    /// OLS slope against row index.
    pub trend: f64,
    /// Sample standard deviation.
    pub consistency: f64,
    pub recent_avg: f64,
    pub best_game: f64,
    pub worst_game: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Momentum {
    pub recent_win_rate: f64,
    pub overall_win_rate: f64,
    /// `recent_win_rate - overall_win_rate`.
    pub momentum: f64,
}

/// Temporal-mode statistics. Every trend field is `None` when fewer than two
/// data points exist; absence means "insufficient data", never zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemporalStats {
    pub srv: Option<MetricTrend>,
    pub rcv: Option<MetricTrend>,
    pub atk: Option<MetricTrend>,
    pub error: Option<MetricTrend>,
    pub momentum: Option<Momentum>,
    pub first_game: Option<String>,
    pub last_game: Option<String>,
    pub games_analyzed: usize,
}

impl TemporalStats {
    pub fn has_trends(&self) -> bool {
        self.srv.is_some() || self.rcv.is_some() || self.atk.is_some() || self.error.is_some()
    }
}

/// Serialised flat, as `srv_trend`, `srv_consistency`, ..., `momentum`,
/// `first_game`, `games_analyzed`. Absent values are omitted.
impl Serialize for TemporalStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (prefix, metric) in [
            ("srv", &self.srv),
            ("rcv", &self.rcv),
            ("atk", &self.atk),
            ("error", &self.error),
        ] {
            if let Some(m) = metric {
                map.serialize_entry(&format!("{prefix}_trend"), &m.trend)?;
                map.serialize_entry(&format!("{prefix}_consistency"), &m.consistency)?;
                map.serialize_entry(&format!("{prefix}_recent_avg"), &m.recent_avg)?;
                map.serialize_entry(&format!("{prefix}_best_game"), &m.best_game)?;
                map.serialize_entry(&format!("{prefix}_worst_game"), &m.worst_game)?;
            }
        }
        if let Some(m) = &self.momentum {
            map.serialize_entry("recent_win_rate", &m.recent_win_rate)?;
            map.serialize_entry("overall_win_rate", &m.overall_win_rate)?;
            map.serialize_entry("momentum", &m.momentum)?;
        }
        if let Some(first) = &self.first_game {
            map.serialize_entry("first_game", first)?;
        }
        if let Some(last) = &self.last_game {
            map.serialize_entry("last_game", last)?;
        }
        map.serialize_entry("games_analyzed", &self.games_analyzed)?;
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendAnalyzer {
    recent_window: usize,
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        TrendAnalyzer::new(DEFAULT_RECENT_WINDOW)
    }
}

impl TrendAnalyzer {
    pub fn new(recent_window: usize) -> Self {
        TrendAnalyzer {
            recent_window: recent_window.max(1),
        }
    }

    /// Analyze a series the caller has already sorted ascending by date.
    /// `with_wins` controls whether momentum is reported.
    pub fn analyze(&self, series: &[DateRow], with_wins: bool) -> TemporalStats {
        let mut stats = TemporalStats {
            games_analyzed: series.len(),
            ..TemporalStats::default()
        };

        let dates: Vec<_> = series.iter().filter_map(|r| r.date).collect();
        stats.first_game = dates.iter().min().map(|d| d.to_string());
        stats.last_game = dates.iter().max().map(|d| d.to_string());

        if series.len() < 2 {
            return stats;
        }

        let column = |f: fn(&DateRow) -> f64| series.iter().map(f).collect::<Vec<f64>>();
        stats.srv = self.metric(&column(|r| r.accuracy.srv_accuracy), Better::Higher);
        stats.rcv = self.metric(&column(|r| r.accuracy.rcv_accuracy), Better::Higher);
        stats.atk = self.metric(&column(|r| r.accuracy.atk_accuracy), Better::Higher);
        stats.error = self.metric(&column(|r| r.per_game.avg_total_errors), Better::Lower);

        if with_wins {
            stats.momentum = Some(self.momentum(series));
        }
        stats
    }

    fn metric(&self, values: &[f64], better: Better) -> Option<MetricTrend> {
        if values.len() < 2 {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (best_game, worst_game) = match better {
            Better::Higher => (max, min),
            Better::Lower => (min, max),
        };
        Some(MetricTrend {
            trend: ols_slope(values),
            consistency: sample_std(values),
            recent_avg: mean(&values[values.len().saturating_sub(self.recent_window)..]),
            best_game,
            worst_game,
        })
    }

    fn momentum(&self, series: &[DateRow]) -> Momentum {
        let win_rate = |rows: &[DateRow]| {
            let wins: f64 = rows.iter().map(|r| r.tally.wins).sum();
            let games: f64 = rows.iter().map(|r| r.tally.games_count).sum();
            safe_div(wins, games)
        };
        let recent = &series[series.len().saturating_sub(self.recent_window)..];
        let recent_win_rate = win_rate(recent);
        let overall_win_rate = win_rate(series);
        Momentum {
            recent_win_rate,
            overall_win_rate,
            momentum: recent_win_rate - overall_win_rate,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Better {
    Higher,
    Lower,
}

// ---------------------------------------------------------------------------
// Numeric helpers
// ---------------------------------------------------------------------------

pub fn mean(values: &[f64]) -> f64 {
    safe_div(values.iter().sum(), values.len() as f64)
}

/// Standard deviation with an N-1 denominator; 0.0 below two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Least-squares slope of `values` against x = 0, 1, 2, ...
pub fn ols_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);
    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - x_mean;
            (num + dx * (y - y_mean), den + dx * dx)
        });
    safe_div(num, den)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Tally;
    use crate::metrics::{AccuracyMetrics, DerivedTotals, PerGameAverages};
    use chrono::NaiveDate;

    fn row(day: u32, srv: f64, errors: f64, wins: f64, games: f64) -> DateRow {
        DateRow {
            date: NaiveDate::from_ymd_opt(2024, 1, day),
            year: Some(2024),
            week_num: String::new(),
            season: None,
            position: None,
            player_key: None,
            display_name: None,
            tally: Tally {
                wins,
                losses: games - wins,
                games_count: games,
                ..Tally::default()
            },
            totals: DerivedTotals::default(),
            accuracy: AccuracyMetrics {
                srv_accuracy: srv,
                ..AccuracyMetrics::default()
            },
            per_game: PerGameAverages {
                avg_total_errors: errors,
                ..PerGameAverages::default()
            },
        }
    }

    #[test]
    fn slope_of_linear_series() {
        assert!((ols_slope(&[1.0, 3.0, 5.0, 7.0]) - 2.0).abs() < 1e-12);
        assert!((ols_slope(&[0.9, 0.8]) + 0.1).abs() < 1e-12);
        assert_eq!(ols_slope(&[4.0]), 0.0);
    }

    #[test]
    fn sample_std_uses_n_minus_one() {
        // mean 5, squared deviations sum to 32, / 7
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((sample_std(&v) - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(sample_std(&[1.0]), 0.0);
    }

    #[test]
    fn single_row_has_no_trend_fields() {
        let stats = TrendAnalyzer::default().analyze(&[row(1, 0.8, 2.0, 1.0, 2.0)], true);
        assert!(!stats.has_trends());
        assert!(stats.momentum.is_none());
        assert_eq!(stats.games_analyzed, 1);
        assert_eq!(stats.first_game.as_deref(), Some("2024-01-01"));

        let json = serde_json::to_value(&stats).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.keys().all(|k| !k.ends_with("_trend") && !k.ends_with("_consistency")));
        assert_eq!(obj["games_analyzed"], 1);
    }

    #[test]
    fn best_and_worst_respect_metric_direction() {
        let series = [
            row(1, 0.7, 3.0, 1.0, 2.0),
            row(2, 0.9, 1.0, 2.0, 2.0),
            row(3, 0.8, 2.0, 0.0, 2.0),
        ];
        let stats = TrendAnalyzer::default().analyze(&series, true);
        let srv = stats.srv.unwrap();
        assert_eq!(srv.best_game, 0.9);
        assert_eq!(srv.worst_game, 0.7);
        let err = stats.error.unwrap();
        assert_eq!(err.best_game, 1.0);
        assert_eq!(err.worst_game, 3.0);
        assert!((err.trend + 0.5).abs() < 1e-12);
    }

    #[test]
    fn recent_average_uses_last_window() {
        let series = [
            row(1, 0.5, 0.0, 0.0, 1.0),
            row(2, 0.6, 0.0, 0.0, 1.0),
            row(3, 0.7, 0.0, 0.0, 1.0),
            row(4, 0.8, 0.0, 0.0, 1.0),
        ];
        let stats = TrendAnalyzer::default().analyze(&series, false);
        assert!((stats.srv.unwrap().recent_avg - 0.7).abs() < 1e-12);
        assert!(stats.momentum.is_none());
        assert_eq!(stats.last_game.as_deref(), Some("2024-01-04"));
    }

    #[test]
    fn momentum_compares_recent_and_overall_win_rates() {
        let series = [
            row(1, 0.0, 0.0, 0.0, 2.0),
            row(2, 0.0, 0.0, 0.0, 2.0),
            row(3, 0.0, 0.0, 2.0, 2.0),
            row(4, 0.0, 0.0, 2.0, 2.0),
            row(5, 0.0, 0.0, 2.0, 2.0),
        ];
        let m = TrendAnalyzer::default().analyze(&series, true).momentum.unwrap();
        assert_eq!(m.recent_win_rate, 1.0);
        assert_eq!(m.overall_win_rate, 0.6);
        assert!((m.momentum - 0.4).abs() < 1e-12);
    }

    #[test]
    fn flat_serialization_uses_prefixed_keys() {
        let series = [row(1, 0.8, 1.0, 1.0, 1.0), row(2, 0.9, 1.0, 1.0, 1.0)];
        let json = serde_json::to_value(TrendAnalyzer::default().analyze(&series, true)).unwrap();
        for key in ["srv_trend", "rcv_consistency", "atk_best_game", "error_worst_game", "momentum"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
