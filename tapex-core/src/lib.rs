pub mod cursor;
pub mod error;
pub mod key;
pub mod plan;
pub mod record;
pub mod sink;
pub mod stage;

pub use cursor::{Cursor, Dims, Position};
pub use error::ConfigError;
pub use key::{KeyPolicy, KeyPress};
pub use plan::{ConditionSpec, PlanSpec, Run, TrialEntry, TrialPlan};
pub use record::TapRecord;
pub use sink::{Delivery, ResultSink, SinkError};
pub use stage::{MicroStep, Stage};
