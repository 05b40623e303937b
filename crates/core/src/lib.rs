pub mod config;
pub mod domain;
pub mod errors;
pub mod executor;

pub use domain::answer::{
    Answer, AnswerMetadata, Confidence, DataQuality, FormattedAnswer, Rejection, Row,
    ValidationResult,
};
pub use domain::intent::{Category, Intent, Metric, TimePeriod, TimeUnit, MAX_WINDOW_DAYS};
pub use domain::plan::{AggregateFn, AggregationType, Measure, Plan};
pub use domain::schema::Table;
pub use domain::store::StoreContext;
pub use errors::{InterfaceError, PipelineError};
pub use executor::{DataExecutor, ExecutorError};
