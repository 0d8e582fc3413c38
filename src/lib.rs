pub mod aggregate;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod ranking;
pub mod record;
pub mod state;
pub mod view;

pub use config::{AnalysisConfig, ReportConfig};
pub use ensemble::{Coverage, Ensemble, VotingMethod};
pub use error::{ConfigurationError, Dimension, EmptyGroupWarning, Error, Result};
pub use filter::{FilterCriteria, LawType, ProblemType};
pub use record::{EvaluationRecord, RecordOrigin};
pub use state::AppState;
pub use view::{ViewKind, ViewReport};
