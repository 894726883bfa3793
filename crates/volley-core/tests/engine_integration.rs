// End-to-end tests over the public API: CSV file -> ingest -> summaries,
// player resolution, rendering input, and the summary cache.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use volley_core::table::load_csv;
use volley_core::{
    aggregate, AggregateFrame, AnalysisMode, Counters, Engine, EngineConfig, PlotKind,
    RenderRequest, ResolvedPlayer,
};

// ===========================================================================
// Test helpers
// ===========================================================================

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn season_engine() -> Engine {
    let (table, meta) = load_csv(&fixture("season.csv")).unwrap();
    let engine = Engine::with_config(EngineConfig::default());
    engine.ingest("season", &table, meta);
    engine
}

// ===========================================================================
// Loading
// ===========================================================================

#[test]
fn fixture_metadata() {
    let (table, meta) = load_csv(&fixture("season.csv")).unwrap();
    assert_eq!(table.records.len(), 8);
    assert_eq!(meta.rows, 8);
    assert_eq!(meta.cols, 25);
    assert_eq!(meta.source_name.as_deref(), Some("season.csv"));
    assert_eq!(meta.columns[4], "player_name");
}

#[test]
fn missing_file_is_io_error() {
    let err = load_csv(&fixture("nope.csv")).unwrap_err();
    assert!(matches!(err, volley_core::LoadError::Io { .. }));
}

// ===========================================================================
// Summaries
// ===========================================================================

#[test]
fn team_cumulative_summary() {
    let engine = season_engine();
    let s = engine
        .get_or_compute("season", None, AnalysisMode::Cumulative)
        .unwrap();

    assert_eq!(s.rows, 8);
    assert_eq!(s.players, vec!["Jordan Lee".to_string(), "Sam Ortiz".to_string()]);
    assert_eq!(s.date_min, "2024-09-03");
    assert_eq!(s.date_max, "2024-09-17");

    let stats = s.cumulative_stats().unwrap();
    assert_eq!(stats.total_games, 8);
    assert_eq!(stats.total_wins, 4);
    assert_eq!(stats.total_losses, 4);
}

#[test]
fn player_cumulative_summary() {
    let engine = season_engine();
    let s = engine
        .get_or_compute("season", Some("JORDAN LEE"), AnalysisMode::Cumulative)
        .unwrap();

    // serves: 22 good + 6 error + 3 ace
    assert_eq!(s.srv_accuracy, 0.806);
    // srv 6 + rcv 2 + atk 6 + fouls 3 over 4 games
    assert!((s.avg_errors_per_set - 4.25).abs() < 1e-9);

    let stats = s.cumulative_stats().unwrap();
    assert_eq!(stats.total_serves, 31);
    assert_eq!(stats.total_games, 4);
    assert_eq!(stats.total_aces, 3);
}

#[test]
fn approximate_player_query() {
    let engine = season_engine();
    let exact = engine
        .get_or_compute("season", Some("jordan lee"), AnalysisMode::Cumulative)
        .unwrap();
    let typo = engine
        .get_or_compute("season", Some("Jordon Lee"), AnalysisMode::Cumulative)
        .unwrap();
    assert_eq!(exact.srv_accuracy, typo.srv_accuracy);
    assert_eq!(exact.mode_specific_stats, typo.mode_specific_stats);
}

#[test]
fn temporal_summary_json_shape() {
    let engine = season_engine();
    let response = engine.summary_response("season", Some("Sam Ortiz"), AnalysisMode::Temporal);
    assert!(response.error.is_none());

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["analysis_mode"], "temporal");
    assert!(json["error"].is_null());

    let stats = &json["mode_specific_stats"];
    assert_eq!(stats["games_analyzed"], 3);
    assert_eq!(stats["first_game"], "2024-09-03");
    assert_eq!(stats["last_game"], "2024-09-17");
    for key in [
        "srv_trend",
        "srv_consistency",
        "rcv_recent_avg",
        "atk_best_game",
        "error_worst_game",
        "recent_win_rate",
        "momentum",
    ] {
        assert!(stats.get(key).is_some(), "missing {key}");
    }
}

#[test]
fn unknown_player_yields_error_response() {
    let engine = season_engine();
    let response = engine.summary_response("season", Some("Zed Quill"), AnalysisMode::Cumulative);
    let msg = response.error.unwrap();
    assert!(msg.contains("Zed Quill"));
    assert_eq!(response.summary.rows, 0);
    assert!(response.summary.players.is_empty());
}

#[test]
fn unknown_dataset_yields_error_response() {
    let engine = season_engine();
    let response = engine.summary_response("other", None, AnalysisMode::Cumulative);
    assert!(response.error.unwrap().contains("other"));
}

// ===========================================================================
// Aggregation consistency
// ===========================================================================

#[test]
fn temporal_and_cumulative_totals_agree() {
    let engine = season_engine();
    let state = engine.current().unwrap();
    let rows = state.dataset().row_refs();

    let AggregateFrame::Cumulative(cumulative) = aggregate(&rows, AnalysisMode::Cumulative) else {
        panic!("expected cumulative frame");
    };
    let AggregateFrame::Temporal(temporal) = aggregate(&rows, AnalysisMode::Temporal) else {
        panic!("expected temporal frame");
    };
    let by_player = volley_core::aggregate::totals_by_player(&temporal.player_by_date_no_pos);

    assert_eq!(cumulative.overall.len(), 2);
    for player in &cumulative.overall {
        let t = &by_player[&player.player_key];
        for col in Counters::COLUMNS {
            let a = player.tally.counters.get(col).unwrap();
            let b = t.counters.get(col).unwrap();
            assert!((a - b).abs() < 1e-9, "{col} differs for {}", player.player_key);
        }
        assert_eq!(player.tally.games_count, t.games_count);
    }
    assert_eq!(temporal.team_by_date.len(), 3);
}

// ===========================================================================
// Cache
// ===========================================================================

#[test]
fn equivalent_queries_share_cached_summary() {
    let engine = season_engine();
    let a = engine
        .get_or_compute("season", Some("Jordan Lee"), AnalysisMode::Temporal)
        .unwrap();
    let b = engine
        .get_or_compute("season", Some("  jordan LEE "), AnalysisMode::Temporal)
        .unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(engine.current().unwrap().cached_len(), 1);
}

#[test]
fn concurrent_readers_get_one_summary() {
    let engine = Arc::new(season_engine());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                engine
                    .get_or_compute("season", Some("team"), AnalysisMode::Temporal)
                    .unwrap()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Racing computations may each build a summary, but every caller gets
    // the single inserted value.
    let cached = engine
        .get_or_compute("season", None, AnalysisMode::Temporal)
        .unwrap();
    assert_eq!(engine.current().unwrap().cached_len(), 1);
    for r in &results {
        assert_eq!(**r, *cached);
    }
    assert!(results.iter().any(|r| Arc::ptr_eq(r, &cached)));
}

#[test]
fn reingest_invalidates_cache() {
    let engine = season_engine();
    engine
        .get_or_compute("season", None, AnalysisMode::Cumulative)
        .unwrap();
    let (table, meta) = load_csv(&fixture("season.csv")).unwrap();
    engine.ingest("season", &table, meta);

    let state = engine.current().unwrap();
    assert_eq!(state.cached_len(), 0);
    assert!(state.legacy_summary().is_none());
}

// ===========================================================================
// Collaborator surfaces
// ===========================================================================

#[test]
fn player_query_endpoint() {
    let engine = season_engine();
    let state = engine.current().unwrap();
    let resp = state.query_player(Some("sam"));

    assert_eq!(resp.players, vec!["Jordan Lee".to_string(), "Sam Ortiz".to_string()]);
    // "sam" sits inside "sam ortiz": the scaled window score is 90.
    match resp.resolved.unwrap() {
        ResolvedPlayer::Matched { used_name, exact, .. } => {
            assert_eq!(used_name, "Sam Ortiz");
            assert!(!exact);
        }
        other => panic!("expected a match, got {other:?}"),
    }

    let json = serde_json::to_value(state.query_player(Some("Zed"))).unwrap();
    assert_eq!(json["resolved"]["original"], "Zed");
    assert!(json["resolved"]["error"].is_string());
}

#[test]
fn render_input_shapes() {
    let engine = season_engine();
    let state = engine.current().unwrap();

    let input = state
        .render_input(&RenderRequest::parse(Some("avg_errors_over_time"), None, None))
        .unwrap();
    assert_eq!(input.kind, PlotKind::AvgErrorsOverTime);
    let AggregateFrame::Temporal(frame) = &input.frame else {
        panic!("time-series plots need the temporal frame");
    };
    assert_eq!(frame.team_by_date.len(), 3);

    let input = state
        .render_input(&RenderRequest::parse(Some("unknown"), Some("jordan"), Some("temporal")))
        .unwrap();
    assert_eq!(input.kind, PlotKind::Offense);
    assert_eq!(input.mode, AnalysisMode::Temporal);
    assert_eq!(input.player, "Jordan Lee");
}
