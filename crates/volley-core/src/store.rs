// Run state and summary cache.
//
// An `Engine` owns at most one `RunState` generation. Ingestion builds a
// fresh generation and swaps the pointer; readers clone the `Arc` once per
// request and work against that snapshot. Within a generation the only
// mutation is cache insertion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock};

use serde::Serialize;
use tracing::{debug, info};

use crate::aggregate::{aggregate, AggregateFrame, AnalysisMode};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::model::{display_names, player_key, Dataset};
use crate::preprocess::preprocess;
use crate::resolver::PlayerResolver;
use crate::summary::{compute_summary, Summary};
use crate::table::{DatasetMeta, RawTable};

// ---------------------------------------------------------------------------
// Filters and selectors
// ---------------------------------------------------------------------------

/// Normalised player filter, part of the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlayerFilter {
    All,
    /// Trimmed, case-folded query text.
    Player(String),
}

impl PlayerFilter {
    /// `""`, `all`, `team`, and `all/team` (any case, surrounding whitespace
    /// ignored) all mean "no filter".
    pub fn normalize(raw: Option<&str>) -> Self {
        let key = player_key(raw.unwrap_or(""));
        match key.as_str() {
            "" | "all" | "team" | "all/team" => PlayerFilter::All,
            _ => PlayerFilter::Player(key),
        }
    }

    pub fn query(&self) -> Option<&str> {
        match self {
            PlayerFilter::All => None,
            PlayerFilter::Player(key) => Some(key),
        }
    }
}

/// The rendering collaborator's plot selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotKind {
    Offense,
    Service,
    Receive,
    Errors,
    AtkAccOverTime,
    AvgErrorsOverTime,
}

impl PlotKind {
    pub const ALL: [PlotKind; 6] = [
        PlotKind::Offense,
        PlotKind::Service,
        PlotKind::Receive,
        PlotKind::Errors,
        PlotKind::AtkAccOverTime,
        PlotKind::AvgErrorsOverTime,
    ];

    /// Unknown or missing kinds fall back to `Offense`.
    pub fn normalize(raw: Option<&str>) -> Self {
        let raw = raw.map(|s| s.trim().to_lowercase()).unwrap_or_default();
        PlotKind::ALL
            .into_iter()
            .find(|k| k.as_str() == raw)
            .unwrap_or(PlotKind::Offense)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlotKind::Offense => "offense",
            PlotKind::Service => "service",
            PlotKind::Receive => "receive",
            PlotKind::Errors => "errors",
            PlotKind::AtkAccOverTime => "atk_acc_over_time",
            PlotKind::AvgErrorsOverTime => "avg_errors_over_time",
        }
    }

    /// Kinds that only make sense on the date axis.
    pub fn is_time_series(self) -> bool {
        matches!(self, PlotKind::AtkAccOverTime | PlotKind::AvgErrorsOverTime)
    }
}

/// Plot modes share the analysis-mode normalisation: anything but
/// "temporal" is cumulative.
pub type PlotMode = AnalysisMode;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub kind: PlotKind,
    pub player: Option<String>,
    pub mode: PlotMode,
}

impl RenderRequest {
    pub fn parse(kind: Option<&str>, player: Option<&str>, mode: Option<&str>) -> Self {
        RenderRequest {
            kind: PlotKind::normalize(kind),
            player: player.map(str::to_string),
            mode: PlotMode::normalize(mode),
        }
    }
}

/// Everything a renderer needs: the resolved name and a frame of the right
/// shape for the plot kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderInput {
    pub kind: PlotKind,
    pub mode: PlotMode,
    /// Empty when unfiltered.
    pub player: String,
    pub frame: AggregateFrame,
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// A summary with an optional error. On error the summary is the empty
/// default, never a partial result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub summary: Arc<Summary>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerQueryResponse {
    pub players: Vec<String>,
    pub resolved: Option<ResolvedPlayer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResolvedPlayer {
    Matched {
        original: String,
        used_name: String,
        exact: bool,
    },
    Failed {
        original: String,
        error: String,
    },
}

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

type CacheKey = (PlayerFilter, AnalysisMode);

/// One ingested dataset plus its summary cache.
#[derive(Debug)]
pub struct RunState {
    dataset_id: String,
    dataset: Dataset,
    meta: DatasetMeta,
    resolver: PlayerResolver,
    config: EngineConfig,
    cache: Mutex<HashMap<CacheKey, Arc<Summary>>>,
    /// Unfiltered cumulative summary, kept apart from the keyed cache.
    legacy: OnceLock<Arc<Summary>>,
}

impl RunState {
    pub fn new(
        dataset_id: impl Into<String>,
        dataset: Dataset,
        meta: DatasetMeta,
        config: EngineConfig,
    ) -> Self {
        RunState {
            dataset_id: dataset_id.into(),
            dataset,
            meta,
            resolver: PlayerResolver::new(config.match_threshold),
            config,
            cache: Mutex::new(HashMap::new()),
            legacy: OnceLock::new(),
        }
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn meta(&self) -> &DatasetMeta {
        &self.meta
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<CacheKey, Arc<Summary>>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn cached_len(&self) -> usize {
        self.cache().len()
    }

    pub fn legacy_summary(&self) -> Option<Arc<Summary>> {
        self.legacy.get().cloned()
    }

    /// Cached summary for `(player, mode)`, computing it on a miss.
    ///
    /// Computation runs without the cache lock held. If two callers race on
    /// the same key, the first insertion wins and both get that `Arc`.
    /// Failed resolutions are not cached.
    pub fn get_or_compute(
        &self,
        player: Option<&str>,
        mode: AnalysisMode,
    ) -> Result<Arc<Summary>, EngineError> {
        let filter = PlayerFilter::normalize(player);
        let key = (filter, mode);

        if let Some(hit) = self.cache().get(&key) {
            debug!("summary cache hit for {:?} in '{}'", key, self.dataset_id);
            return Ok(Arc::clone(hit));
        }
        debug!("summary cache miss for {:?} in '{}'", key, self.dataset_id);

        let resolution = self.resolver.resolve(&self.dataset, key.0.query())?;
        let computed = Arc::new(compute_summary(&self.dataset, &resolution, mode, &self.config));

        let summary = Arc::clone(self.cache().entry(key.clone()).or_insert(computed));
        if key == (PlayerFilter::All, AnalysisMode::Cumulative) {
            self.legacy.get_or_init(|| Arc::clone(&summary));
        }
        Ok(summary)
    }

    pub fn summary_response(&self, player: Option<&str>, mode: AnalysisMode) -> SummaryResponse {
        match self.get_or_compute(player, mode) {
            Ok(summary) => SummaryResponse {
                summary,
                error: None,
            },
            Err(e) => error_response(mode, &e),
        }
    }

    /// Player list plus, when a query is given, how it resolved. Never fails.
    pub fn query_player(&self, query: Option<&str>) -> PlayerQueryResponse {
        let mut players: Vec<String> = if self.dataset.schema.has("player_name") {
            display_names(self.dataset.rows.iter())
                .into_iter()
                .filter(|(key, _)| !key.is_empty())
                .map(|(_, name)| name)
                .collect()
        } else {
            Vec::new()
        };
        players.sort();

        let resolved = query.map(|q| match self.resolver.resolve(&self.dataset, Some(q)) {
            Ok(res) => ResolvedPlayer::Matched {
                original: q.to_string(),
                exact: !res.display_name.is_empty()
                    && res.display_name.to_lowercase() == q.trim().to_lowercase(),
                used_name: res.display_name,
            },
            Err(e) => ResolvedPlayer::Failed {
                original: q.to_string(),
                error: e.to_string(),
            },
        });

        PlayerQueryResponse { players, resolved }
    }

    /// Resolve and aggregate for the rendering collaborator. Time-series plot
    /// kinds always receive the temporal frame.
    pub fn render_input(&self, request: &RenderRequest) -> Result<RenderInput, EngineError> {
        let filter = PlayerFilter::normalize(request.player.as_deref());
        let resolution = self.resolver.resolve(&self.dataset, filter.query())?;
        let mode = if request.kind.is_time_series() {
            AnalysisMode::Temporal
        } else {
            request.mode
        };
        Ok(RenderInput {
            kind: request.kind,
            mode,
            frame: aggregate(&resolution.rows, mode),
            player: resolution.display_name,
        })
    }
}

fn error_response(mode: AnalysisMode, err: &EngineError) -> SummaryResponse {
    SummaryResponse {
        summary: Arc::new(Summary::empty(mode)),
        error: Some(err.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owner of the active generation.
#[derive(Debug, Default)]
pub struct Engine {
    config: EngineConfig,
    current: RwLock<Option<Arc<RunState>>>,
}

impl Engine {
    pub fn new() -> Self {
        Engine::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Engine {
            config,
            current: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Preprocess `table` into a new generation and make it current. The
    /// previous generation, and its cache, is dropped once its last reader
    /// releases it.
    pub fn ingest(
        &self,
        dataset_id: impl Into<String>,
        table: &RawTable,
        meta: DatasetMeta,
    ) -> Arc<RunState> {
        let dataset = preprocess(table);
        let state = Arc::new(RunState::new(dataset_id, dataset, meta, self.config));

        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = current.as_ref() {
            info!(
                "replacing dataset '{}' ({} cached summaries dropped)",
                prev.dataset_id(),
                prev.cached_len()
            );
        }
        info!(
            "ingested dataset '{}': {} rows, {} columns",
            state.dataset_id(),
            state.dataset().len(),
            state.dataset().schema.columns().len()
        );
        *current = Some(Arc::clone(&state));
        state
    }

    pub fn current(&self) -> Option<Arc<RunState>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The current generation, if it is `dataset_id`.
    pub fn run(&self, dataset_id: &str) -> Result<Arc<RunState>, EngineError> {
        match self.current() {
            Some(state) if state.dataset_id() == dataset_id => Ok(state),
            Some(_) => Err(EngineError::UnknownDataset(dataset_id.to_string())),
            None => Err(EngineError::NoDataset),
        }
    }

    pub fn get_or_compute(
        &self,
        dataset_id: &str,
        player: Option<&str>,
        mode: AnalysisMode,
    ) -> Result<Arc<Summary>, EngineError> {
        self.run(dataset_id)?.get_or_compute(player, mode)
    }

    pub fn summary_response(
        &self,
        dataset_id: &str,
        player: Option<&str>,
        mode: AnalysisMode,
    ) -> SummaryResponse {
        match self.run(dataset_id) {
            Ok(state) => state.summary_response(player, mode),
            Err(e) => error_response(mode, &e),
        }
    }

    pub fn clear(&self) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = None;
    }
}
