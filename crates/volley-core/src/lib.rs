// Library root for the volleyball stats engine: preprocessing, metrics,
// aggregation, player resolution, trend analysis, and the summary cache.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod preprocess;
pub mod resolver;
pub mod store;
pub mod summary;
pub mod table;
pub mod trend;

pub use aggregate::{aggregate, AggregateFrame, AnalysisMode};
pub use config::EngineConfig;
pub use error::{EngineError, LoadError};
pub use model::{Counters, Dataset, Row, Schema};
pub use preprocess::preprocess;
pub use resolver::{PlayerResolver, Resolution};
pub use store::{
    Engine, PlayerFilter, PlayerQueryResponse, PlotKind, PlotMode, RenderInput, RenderRequest,
    ResolvedPlayer, RunState, SummaryResponse,
};
pub use summary::{compute_summary, CumulativeStats, ModeStats, Summary};
pub use trend::{TemporalStats, TrendAnalyzer};
pub use table::{DatasetMeta, RawTable};
