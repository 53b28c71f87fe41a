#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use tapex_core::{ConditionSpec, Cursor, MicroStep, PlanSpec, ResultSink, SinkError, TapRecord};
use tapex_sequencer::{
    LeadIn, PlaybackCycle, PlaybackError, PlaybackSurface, SequencerEvent, SessionConfig,
    TrialSequencer,
};
use tapex_timing::ManualClock;

pub type TestSequencer<K = Vec<TapRecord>> = TrialSequencer<ManualClock, ScriptedPlayback, K>;

/// Playback surface whose end-of-media is triggered by the test.
#[derive(Debug, Default)]
pub struct ScriptedPlayback {
    pub loads: Vec<String>,
    pub plays: usize,
    pub pauses: usize,
    pub fail_loads: bool,
    current: Option<PlaybackCycle>,
    playing: bool,
    finished: VecDeque<PlaybackCycle>,
}

impl ScriptedPlayback {
    /// Ends the current cycle, if it is playing.
    pub fn finish(&mut self) {
        if let (Some(cycle), true) = (self.current, self.playing) {
            self.playing = false;
            self.finished.push_back(cycle);
        }
    }

    /// Queues a completion notice regardless of what is loaded.
    pub fn inject(&mut self, cycle: PlaybackCycle) {
        self.finished.push_back(cycle);
    }

    pub fn current_cycle(&self) -> Option<PlaybackCycle> {
        self.current
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }
}

impl PlaybackSurface for ScriptedPlayback {
    fn load(&mut self, source: &str, cycle: PlaybackCycle) -> Result<(), PlaybackError> {
        if self.fail_loads {
            return Err(PlaybackError::MissingSource(source.into()));
        }
        self.loads.push(source.to_string());
        self.current = Some(cycle);
        self.playing = false;
        Ok(())
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        if self.current.is_none() {
            return Err(PlaybackError::NothingLoaded);
        }
        self.playing = true;
        self.plays += 1;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
        self.pauses += 1;
    }

    fn poll_complete(&mut self) -> Option<PlaybackCycle> {
        self.finished.pop_front()
    }
}

/// Sink that always fails, counting attempts.
#[derive(Debug, Default)]
pub struct UnreachableSink {
    pub attempts: usize,
}

impl ResultSink for UnreachableSink {
    fn submit(&mut self, _record: &TapRecord) -> Result<(), SinkError> {
        self.attempts += 1;
        Err(SinkError::Transport("connection refused".into()))
    }

    fn name(&self) -> &str {
        "unreachable"
    }
}

/// Four items, two runs, anchor plus two randomized treatments, three-second
/// pre-roll and no special first countdown.
pub fn small_config() -> SessionConfig {
    SessionConfig {
        plan: PlanSpec {
            catalog: ["01.wav", "02.wav", "03.wav", "04.wav"]
                .into_iter()
                .map(String::from)
                .collect(),
            run_count: 2,
            conditions: vec![
                ConditionSpec::fixed("Anchor"),
                ConditionSpec::randomized("A"),
                ConditionSpec::randomized("B"),
            ],
            source_root: "phrases".into(),
        },
        micro_steps: vec![MicroStep::PreRoll, MicroStep::Phrase],
        pre_roll_secs: 3,
        silence_secs: 2,
        initial_countdown_secs: None,
        lead_in: LeadIn::Countdown,
        sample_source: Some("phrases/Sample/16.wav".into()),
        ..SessionConfig::default()
    }
}

pub fn sequencer_with<K: ResultSink>(
    config: SessionConfig,
    sink: K,
) -> (TestSequencer<K>, ManualClock) {
    let clock = ManualClock::new();
    let plan = tapex_core::TrialPlan::from_seed(&config.plan, 7).expect("valid plan");
    let seq = TrialSequencer::new(config, plan, clock.clone(), ScriptedPlayback::default(), sink)
        .expect("valid config");
    (seq, clock)
}

pub fn sequencer(config: SessionConfig) -> (TestSequencer, ManualClock) {
    sequencer_with(config, Vec::new())
}

/// Moves the session forward by one micro-step: a countdown is ticked out
/// second by second, a phrase is ended by its playback completion.
pub fn step<K: ResultSink>(seq: &mut TestSequencer<K>, clock: &ManualClock) -> Vec<SequencerEvent> {
    if seq.is_recording() {
        seq.playback_mut().finish();
        return seq.pump();
    }
    let mut events = Vec::new();
    let start = seq.position();
    while seq.position() == start && seq.stage().is_running() {
        clock.advance(Duration::from_secs(1));
        events.extend(seq.pump());
    }
    events
}

/// Drives a started session to the end, calling `during_phrase` whenever a
/// recording window is open. Returns every cursor visited, in order.
pub fn run_to_end<K: ResultSink>(
    seq: &mut TestSequencer<K>,
    clock: &ManualClock,
    mut during_phrase: impl FnMut(&mut TestSequencer<K>, &ManualClock),
) -> Vec<Cursor> {
    let mut visited: Vec<Cursor> = seq.cursor().into_iter().collect();
    let mut guard = 0;
    while seq.stage().is_running() {
        if seq.is_recording() {
            during_phrase(seq, clock);
        }
        for event in step(seq, clock) {
            if let SequencerEvent::StepEntered { cursor, .. } = event {
                visited.push(cursor);
            }
        }
        guard += 1;
        assert!(guard < 10_000, "session never finished");
    }
    visited
}
