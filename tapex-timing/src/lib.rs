pub mod interval;
pub mod timer;

pub use interval::Interval;
pub use timer::{Clock, ManualClock, MonotonicClock, as_millis};
