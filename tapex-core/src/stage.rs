use serde::{Deserialize, Serialize};

/// Coarse session stage. Gates which view is shown and whether timers and
/// keyboard capture are live at all.
#[derive(Copy, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Start,
    Running,
    End,
}

impl Stage {
    pub fn is_running(&self) -> bool {
        matches!(self, Stage::Running)
    }
}

/// Sub-stage of one condition's presentation.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MicroStep {
    /// Countdown before the phrase plays
    PreRoll,
    /// Audio plays and taps are recorded; exits on playback completion
    Phrase,
    /// Countdown of silence after the phrase
    Silence,
}

impl MicroStep {
    pub fn is_phrase(&self) -> bool {
        matches!(self, MicroStep::Phrase)
    }

    pub fn is_countdown(&self) -> bool {
        !self.is_phrase()
    }

    pub fn label(&self) -> &'static str {
        match self {
            MicroStep::PreRoll => "pre-roll",
            MicroStep::Phrase => "phrase",
            MicroStep::Silence => "silence",
        }
    }
}
