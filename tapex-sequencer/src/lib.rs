pub mod config;
pub mod playback;
pub mod state;
pub mod view;

pub use config::{LeadIn, SessionConfig};
pub use playback::{PlaybackCycle, PlaybackError, PlaybackSurface};
pub use state::{ExportOutcome, SequencerEvent, TrialSequencer, Trigger};
pub use view::SessionView;
