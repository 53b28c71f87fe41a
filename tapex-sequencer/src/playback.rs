use std::path::PathBuf;

use thiserror::Error;

/// Identifies one load-and-play cycle. Completion notices carry the cycle
/// they belong to so late notices from an earlier load can be told apart.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackCycle(pub u64);

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio source `{0}` not found")]
    MissingSource(PathBuf),

    #[error("nothing loaded")]
    NothingLoaded,

    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Audio output the sequencer drives. A source change is never assumed to
/// autoplay: `play` always follows `load`.
pub trait PlaybackSurface {
    fn load(&mut self, source: &str, cycle: PlaybackCycle) -> Result<(), PlaybackError>;

    fn play(&mut self) -> Result<(), PlaybackError>;

    fn pause(&mut self);

    /// Reports, once, that the current cycle reached the end of its media.
    fn poll_complete(&mut self) -> Option<PlaybackCycle>;
}

impl<P: PlaybackSurface + ?Sized> PlaybackSurface for Box<P> {
    fn load(&mut self, source: &str, cycle: PlaybackCycle) -> Result<(), PlaybackError> {
        (**self).load(source, cycle)
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn poll_complete(&mut self) -> Option<PlaybackCycle> {
        (**self).poll_complete()
    }
}
