use tapex_core::{MicroStep, ResultSink, Stage};
use tapex_timing::Clock;

use super::playback::PlaybackSurface;
use super::state::{ExportOutcome, TrialSequencer};

/// Read-only snapshot of everything a view needs. Rendering is a function of
/// this value and never touches the sequencer.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub stage: Stage,
    /// 1-based
    pub run: usize,
    pub run_count: usize,
    /// 1-based
    pub condition: usize,
    pub condition_count: usize,
    pub step: Option<MicroStep>,
    pub countdown: u32,
    pub recording: bool,
    pub taps_in_trial: usize,
    pub previewing: bool,
    pub has_sample: bool,
    pub export: Option<ExportOutcome>,
}

impl SessionView {
    pub fn headline(&self) -> String {
        match self.stage {
            Stage::Start => "Tap to the Beats".to_string(),
            Stage::Running => format!("Run {}", self.run),
            Stage::End => "We thank you for your time spent taking this survey.".to_string(),
        }
    }

    pub fn prompt(&self) -> String {
        match (self.stage, self.step) {
            (Stage::Start, _) if self.previewing => "Playing sample excerpt".to_string(),
            (Stage::Start, _) if self.has_sample => {
                "Press P to play the sample, SPACE to start the test".to_string()
            }
            (Stage::Start, _) => "Press SPACE to start the test".to_string(),
            (Stage::Running, Some(MicroStep::Phrase)) => {
                "Tap to the beats on any key from a to z".to_string()
            }
            (Stage::Running, _) => format!("Next excerpt in {} seconds", self.countdown),
            (Stage::End, _) => match &self.export {
                Some(ExportOutcome::Delivered { .. }) => {
                    "Your response has been recorded.".to_string()
                }
                Some(ExportOutcome::Pending { .. }) => {
                    "Your session is complete. Sending your responses...".to_string()
                }
                _ => "Your session is complete.".to_string(),
            },
        }
    }

    pub fn excerpt_label(&self) -> Option<String> {
        self.stage
            .is_running()
            .then(|| format!("Excerpt-{}", self.condition))
    }
}

impl<C, P, K> TrialSequencer<C, P, K>
where
    C: Clock,
    P: PlaybackSurface,
    K: ResultSink,
{
    pub fn view(&self) -> SessionView {
        let dims = self.dims();
        let cursor = self.cursor();
        SessionView {
            stage: self.stage(),
            run: (self.position().run_index(dims) + 1).min(dims.runs),
            run_count: dims.runs,
            condition: cursor.map_or(0, |c| c.condition + 1),
            condition_count: dims.conditions,
            step: self.current_step(),
            countdown: self.countdown(),
            recording: self.is_recording(),
            taps_in_trial: self
                .recording_key()
                .and_then(|key| self.tap_record().get(key))
                .map_or(0, <[f64]>::len),
            previewing: self.is_previewing(),
            has_sample: self.config().sample_source.is_some(),
            export: self.export_outcome().cloned(),
        }
    }
}
