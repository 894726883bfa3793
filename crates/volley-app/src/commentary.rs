// Narrative commentary over a computed summary.
//
// Providers sit behind an async trait so a model-backed implementation can
// be dropped in later. The built-in provider is a deterministic statistical
// narrative that needs no network.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};
use volley_core::{AnalysisMode, CumulativeStats, DatasetMeta, Summary, TemporalStats};

use crate::config::CommentaryConfig;

// ---------------------------------------------------------------------------
// Provider seam
// ---------------------------------------------------------------------------

/// Input handed to every commentary provider.
#[derive(Debug, Clone, Copy)]
pub struct CommentaryRequest<'a> {
    pub summary: &'a Summary,
    pub meta: &'a DatasetMeta,
    /// Resolved display name; empty for the whole team.
    pub player: &'a str,
}

#[async_trait]
pub trait CommentaryProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &CommentaryRequest<'_>) -> anyhow::Result<String>;
}

#[derive(Debug, Error)]
pub enum CommentaryError {
    #[error("commentary is disabled")]
    Disabled,

    #[error("commentary provider '{provider}' timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

/// The commentary client the app was configured with.
pub enum CommentaryClient {
    Active(Box<dyn CommentaryProvider>),
    Disabled,
}

impl CommentaryClient {
    pub fn from_config(config: &CommentaryConfig) -> Self {
        if config.enabled {
            CommentaryClient::Active(Box::new(StatisticalCommentary))
        } else {
            CommentaryClient::Disabled
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, CommentaryClient::Active(_))
    }

    /// Run the provider, giving up after `timeout`. The caller must not hold
    /// any engine lock across this call.
    pub async fn generate(
        &self,
        request: &CommentaryRequest<'_>,
        timeout: Duration,
    ) -> Result<String, CommentaryError> {
        match self {
            CommentaryClient::Active(provider) => {
                generate_with_timeout(provider.as_ref(), request, timeout).await
            }
            CommentaryClient::Disabled => Err(CommentaryError::Disabled),
        }
    }
}

pub async fn generate_with_timeout(
    provider: &dyn CommentaryProvider,
    request: &CommentaryRequest<'_>,
    timeout: Duration,
) -> Result<String, CommentaryError> {
    debug!("requesting commentary from '{}'", provider.name());
    match tokio::time::timeout(timeout, provider.generate(request)).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            warn!("commentary provider '{}' timed out", provider.name());
            Err(CommentaryError::Timeout {
                provider: provider.name().to_string(),
                timeout,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Statistical fallback
// ---------------------------------------------------------------------------

/// Slopes smaller than this are reported as stable.
const ACCURACY_TREND_EPSILON: f64 = 0.001;
const ERROR_TREND_EPSILON: f64 = 0.01;
const MOMENTUM_EPSILON: f64 = 0.1;

#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticalCommentary;

#[async_trait]
impl CommentaryProvider for StatisticalCommentary {
    fn name(&self) -> &str {
        "statistical"
    }

    async fn generate(&self, request: &CommentaryRequest<'_>) -> anyhow::Result<String> {
        Ok(statistical_commentary(request.summary, request.player))
    }
}

fn pct(v: f64) -> String {
    format!("{:.1}%", v * 100.0)
}

/// Deterministic narrative built from the summary alone.
pub fn statistical_commentary(summary: &Summary, player: &str) -> String {
    let who = if player.is_empty() { "Team" } else { player };
    let mut out = String::new();

    match summary.analysis_mode {
        AnalysisMode::Temporal => {
            let _ = writeln!(out, "Temporal analysis for {who}: performance trends");
        }
        AnalysisMode::Cumulative => {
            let _ = writeln!(out, "Cumulative analysis for {who}: overall performance");
        }
    }

    let srv = summary.srv_accuracy;
    let rcv = summary.rcv_accuracy;
    let atk = summary.atk_accuracy;
    let errors = summary.avg_errors_per_set;

    out.push_str(&if srv > 0.9 {
        format!("- Excellent service accuracy at {}\n", pct(srv))
    } else if srv > 0.85 {
        format!("- Good service accuracy at {}\n", pct(srv))
    } else {
        format!("- Service accuracy at {} is below the 85% target\n", pct(srv))
    });
    out.push_str(&if rcv > 0.75 {
        format!("- Strong serve receive at {}\n", pct(rcv))
    } else if rcv > 0.65 {
        format!("- Adequate serve receive at {}\n", pct(rcv))
    } else {
        format!("- Serve receive at {} is limiting the offense\n", pct(rcv))
    });
    out.push_str(&if atk > 0.3 {
        format!("- Outstanding hitting efficiency at {atk:.3}\n")
    } else if atk > 0.2 {
        format!("- Solid hitting efficiency at {atk:.3}\n")
    } else {
        format!("- Hitting efficiency at {atk:.3} shows offensive struggles\n")
    });
    out.push_str(&if errors < 4.0 {
        format!("- Excellent error control at {errors:.1} per set\n")
    } else if errors < 6.0 {
        format!("- Acceptable error rate at {errors:.1} per set\n")
    } else {
        format!("- High error rate at {errors:.1} per set\n")
    });

    if let Some(stats) = summary.temporal_stats() {
        temporal_section(&mut out, stats);
    } else if let Some(stats) = summary.cumulative_stats() {
        cumulative_section(&mut out, stats);
    }

    let _ = write!(
        out,
        "\nBased on {} rows from {} to {}.",
        summary.rows,
        or_na(&summary.date_min),
        or_na(&summary.date_max)
    );
    out
}

fn or_na(s: &str) -> &str {
    if s.is_empty() {
        "N/A"
    } else {
        s
    }
}

fn trend_line(label: &str, trend: f64, epsilon: f64, lower_is_better: bool) -> String {
    let improving = if lower_is_better { trend < -epsilon } else { trend > epsilon };
    let declining = if lower_is_better { trend > epsilon } else { trend < -epsilon };
    if improving {
        format!("- {label} improving ({trend:+.4} per game)\n")
    } else if declining {
        format!("- {label} declining ({trend:+.4} per game)\n")
    } else {
        format!("- {label} stable over time\n")
    }
}

fn temporal_section(out: &mut String, stats: &TemporalStats) {
    out.push_str("\nTrends:\n");
    if let Some(m) = &stats.srv {
        out.push_str(&trend_line("Service", m.trend, ACCURACY_TREND_EPSILON, false));
        let _ = writeln!(out, "  recent average {}", pct(m.recent_avg));
    }
    if let Some(m) = &stats.rcv {
        out.push_str(&trend_line("Receive", m.trend, ACCURACY_TREND_EPSILON, false));
        let _ = writeln!(out, "  recent average {}", pct(m.recent_avg));
    }
    if let Some(m) = &stats.atk {
        out.push_str(&trend_line("Attack", m.trend, ACCURACY_TREND_EPSILON, false));
        let _ = writeln!(out, "  recent hitting efficiency {:.3}", m.recent_avg);
    }
    if let Some(m) = &stats.error {
        out.push_str(&trend_line("Errors", m.trend, ERROR_TREND_EPSILON, true));
        let _ = writeln!(out, "  recent average {:.2} errors per game", m.recent_avg);
    }
    if let Some(m) = &stats.momentum {
        let recent = m.recent_win_rate * 100.0;
        let overall = m.overall_win_rate * 100.0;
        if m.momentum > MOMENTUM_EPSILON {
            let _ = writeln!(out, "- Positive momentum: recent wins {recent:.0}% vs {overall:.0}% overall");
        } else if m.momentum < -MOMENTUM_EPSILON {
            let _ = writeln!(out, "- Negative momentum: recent wins {recent:.0}% vs {overall:.0}% overall");
        } else {
            let _ = writeln!(out, "- Steady win rate around {overall:.0}%");
        }
    }
    if !stats.has_trends() {
        let _ = writeln!(out, "- Not enough games for trends ({} analyzed)", stats.games_analyzed);
    }
}

fn cumulative_section(out: &mut String, stats: &CumulativeStats) {
    out.push_str("\nTotals:\n");
    let win_pct = if stats.total_games > 0 {
        stats.total_wins as f64 / stats.total_games as f64 * 100.0
    } else {
        0.0
    };
    let _ = writeln!(
        out,
        "- Record {}-{} ({win_pct:.1}%) across {} games",
        stats.total_wins, stats.total_losses, stats.total_games
    );
    let _ = writeln!(
        out,
        "- Service: {} serves, {} aces ({})",
        stats.total_serves,
        stats.total_aces,
        pct(stats.ace_percentage)
    );
    let _ = writeln!(
        out,
        "- Offense: {} attacks, {} kills ({})",
        stats.total_attacks,
        stats.total_kills,
        pct(stats.kill_percentage)
    );
    let _ = writeln!(
        out,
        "- Receive: {} passes, {} perfect ({})",
        stats.total_receives,
        stats.total_perfect_passes,
        pct(stats.perfect_pass_percentage)
    );
    let _ = writeln!(
        out,
        "- Defense: {:.1} blocks, {} digs",
        stats.total_blocks, stats.total_digs
    );
    if let Some(avg) = stats.avg_assists_per_game {
        let _ = writeln!(out, "- Setting: {} assists ({avg:.1} per game)", stats.total_assists);
    }
}
