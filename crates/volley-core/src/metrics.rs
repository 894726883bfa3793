// Derived totals, accuracy ratios, and per-game averages.
//
// Every ratio goes through `safe_div`. The same functions apply to a single
// row's counters and to summed group counters.

use serde::Serialize;

use crate::model::Counters;

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// Division that returns 0.0 when the denominator is not strictly positive
/// or the quotient is not finite.
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 || denominator.is_nan() {
        return 0.0;
    }
    let q = numerator / denominator;
    if q.is_finite() {
        q
    } else {
        0.0
    }
}

/// Round half-to-even at `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

// ---------------------------------------------------------------------------
// Derived totals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DerivedTotals {
    pub attack_total: f64,
    pub serve_total: f64,
    pub receive_total: f64,
    /// Solo blocks count 1, two-person assists 1/2, three-person assists 1/3.
    pub block_total: f64,
    pub dig_total: f64,
}

pub fn totals(c: &Counters) -> DerivedTotals {
    DerivedTotals {
        attack_total: c.atk_error + c.atk_bad + c.atk_good + c.atk_kill,
        serve_total: c.srv_error + c.srv_good + c.srv_ace,
        receive_total: c.rcv_error + c.rcv_bad + c.rcv_good + c.rcv_perfect,
        block_total: c.blk_solo + c.blk_assist_2 / 2.0 + c.blk_assist_3 / 3.0,
        dig_total: c.dig_miss + c.dig_touch + c.dig_up,
    }
}

// ---------------------------------------------------------------------------
// Accuracy
// ---------------------------------------------------------------------------

/// Accuracy ratios rounded to 3 decimals. Serve and receive lie in [0, 1];
/// attack lies in [-1, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AccuracyMetrics {
    pub srv_accuracy: f64,
    pub rcv_accuracy: f64,
    pub atk_accuracy: f64,
    pub total_errors: f64,
}

pub fn accuracy(c: &Counters) -> AccuracyMetrics {
    let t = totals(c);
    let rcv_weighted = 3.0 * c.rcv_perfect + 2.0 * c.rcv_good + c.rcv_bad;
    AccuracyMetrics {
        srv_accuracy: round_to(safe_div(t.serve_total - c.srv_error, t.serve_total), 3),
        rcv_accuracy: round_to(safe_div(rcv_weighted, 3.0 * t.receive_total), 3),
        atk_accuracy: round_to(safe_div(c.atk_kill - c.atk_error, t.attack_total), 3),
        total_errors: total_errors(c),
    }
}

/// Serve, receive, attack, block, and defensive errors.
pub fn total_errors(c: &Counters) -> f64 {
    c.srv_error + c.rcv_error + c.atk_error + c.blk_error + c.defensive_error
}

/// `total_errors` plus faults; used for per-set error rates in summaries.
pub fn total_errors_with_faults(c: &Counters) -> f64 {
    total_errors(c) + c.fouls
}

// ---------------------------------------------------------------------------
// Per-game averages
// ---------------------------------------------------------------------------

/// Per-game averages. Counts are rounded to 1 decimal, error rates to 2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerGameAverages {
    pub avg_srv_ace: f64,
    pub avg_total_serves: f64,
    pub avg_rcv_good: f64,
    pub avg_rcv_bad: f64,
    pub avg_rcv_perfect: f64,
    pub avg_total_rcv: f64,
    pub avg_atk_good: f64,
    pub avg_atk_bad: f64,
    pub avg_total_atk: f64,
    pub avg_kills: f64,
    pub avg_assists: f64,
    pub avg_blocks: f64,
    pub avg_digs: f64,
    pub avg_atk_errors: f64,
    pub avg_rcv_errors: f64,
    pub avg_srv_errors: f64,
    pub avg_total_errors: f64,
    pub avg_blk_errors: f64,
    pub avg_def_errors: f64,
}

pub fn per_game(c: &Counters, games_count: f64) -> PerGameAverages {
    let t = totals(c);
    let count = |v: f64| round_to(safe_div(v, games_count), 1);
    let rate = |v: f64| round_to(safe_div(v, games_count), 2);

    PerGameAverages {
        avg_srv_ace: count(c.srv_ace),
        avg_total_serves: count(t.serve_total),
        avg_rcv_good: count(c.rcv_good),
        avg_rcv_bad: count(c.rcv_bad),
        avg_rcv_perfect: count(c.rcv_perfect),
        avg_total_rcv: count(t.receive_total),
        avg_atk_good: count(c.atk_good),
        avg_atk_bad: count(c.atk_bad),
        avg_total_atk: count(t.attack_total),
        avg_kills: count(c.atk_kill),
        avg_assists: count(c.assists),
        avg_blocks: count(t.block_total),
        avg_digs: count(t.dig_total),
        avg_atk_errors: rate(c.atk_error),
        avg_rcv_errors: rate(c.rcv_error),
        avg_srv_errors: rate(c.srv_error),
        avg_total_errors: rate(total_errors(c)),
        avg_blk_errors: rate(c.blk_error),
        avg_def_errors: rate(c.defensive_error),
    }
}
