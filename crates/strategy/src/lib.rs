pub mod analysis;
pub mod config;
pub mod indicators;
pub mod signal;

pub use analysis::{
    composite_score, format_volume, sort_by_volume_ratio, top_opportunities, PairAnalyzer, SortKey,
};
pub use config::{AnalysisConfig, DashboardFileConfig};
pub use signal::SignalClassifier;
