use std::time::Duration;

use rand::Rng;
use tapex_core::{
    ConfigError, Cursor, Delivery, Dims, KeyPress, MicroStep, Position, ResultSink, SinkError,
    Stage, TapRecord, TrialPlan,
};
use tapex_timing::{Clock, Interval, as_millis};
use tracing::{debug, error, info, warn};

use super::config::{LeadIn, SessionConfig};
use super::playback::{PlaybackCycle, PlaybackSurface};

const TICK: Duration = Duration::from_secs(1);

/// What caused a call to `advance`.
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The countdown of a countdown step ran out
    Timer,
    /// The phrase's audio reached its end
    PlaybackComplete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SequencerEvent {
    StepEntered { cursor: Cursor, step: MicroStep },
    CountdownTick { remaining: u32 },
    SampleFinished,
    Finished,
    /// A background export reported back
    ExportSettled(ExportOutcome),
    Ignored(Trigger),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Handed to the sink, result not known yet
    Pending { sink: String },
    Delivered { sink: String },
    Failed { sink: String, message: String },
}

impl ExportOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ExportOutcome::Delivered { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ExportOutcome::Pending { .. })
    }
}

#[derive(Debug)]
struct RecordingWindow {
    key: String,
    opened_at: Duration,
}

/// Registration held by the active micro-step. Dropping it is the teardown:
/// the countdown interval stops ticking and the recording window closes.
#[derive(Debug)]
enum ActiveStep {
    Countdown {
        interval: Interval,
    },
    Phrase {
        /// `None` when the source failed to load or start
        cycle: Option<PlaybackCycle>,
        window: RecordingWindow,
    },
}

impl ActiveStep {
    fn exit_trigger(&self) -> Trigger {
        match self {
            ActiveStep::Countdown { .. } => Trigger::Timer,
            ActiveStep::Phrase { .. } => Trigger::PlaybackComplete,
        }
    }
}

/// Owns the session's progress through the trial plan and the tap record.
///
/// Every transition runs through [`TrialSequencer::advance`]; countdown ticks
/// and playback completions are turned into triggers by
/// [`TrialSequencer::pump`], which the host calls from its event loop.
pub struct TrialSequencer<C, P, K>
where
    C: Clock,
    P: PlaybackSurface,
    K: ResultSink,
{
    config: SessionConfig,
    plan: TrialPlan,
    clock: C,
    playback: P,
    sink: K,
    stage: Stage,
    position: Position,
    active: Option<ActiveStep>,
    countdown: u32,
    first_countdown_pending: bool,
    record: TapRecord,
    audio_source: Option<String>,
    audio_playing: bool,
    cycles: u64,
    preview: Option<PlaybackCycle>,
    export: Option<ExportOutcome>,
}

impl<C, P, K> TrialSequencer<C, P, K>
where
    C: Clock,
    P: PlaybackSurface,
    K: ResultSink,
{
    pub fn new(
        config: SessionConfig,
        plan: TrialPlan,
        clock: C,
        playback: P,
        sink: K,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if plan.condition_count() != config.plan.conditions.len() {
            return Err(ConfigError::PlanMismatch {
                plan: plan.condition_count(),
                config: config.plan.conditions.len(),
            });
        }

        let countdown = config
            .initial_countdown_secs
            .unwrap_or_else(|| config.wait_secs(MicroStep::PreRoll));

        Ok(Self {
            config,
            plan,
            clock,
            playback,
            sink,
            stage: Stage::Start,
            position: Position::BeforeFirst,
            active: None,
            countdown,
            first_countdown_pending: true,
            record: TapRecord::new(),
            audio_source: None,
            audio_playing: false,
            cycles: 0,
            preview: None,
            export: None,
        })
    }

    /// Builds the plan from `config` with the given random source.
    pub fn with_rng<R: Rng + ?Sized>(
        config: SessionConfig,
        rng: &mut R,
        clock: C,
        playback: P,
        sink: K,
    ) -> Result<Self, ConfigError> {
        let plan = config.build_plan(rng)?;
        Self::new(config, plan, clock, playback, sink)
    }

    /// Leaves the start screen and lands on the first micro-step.
    pub fn start(&mut self) -> bool {
        if self.stage != Stage::Start {
            return false;
        }
        self.stop_preview();
        self.stage = Stage::Running;
        info!(
            runs = self.plan.run_count(),
            conditions = self.plan.condition_count(),
            steps = self.config.micro_steps.len(),
            total_steps = self.dims().total_steps(),
            "session started"
        );

        let target = match self.config.lead_in {
            LeadIn::Countdown => Position::BeforeFirst.next(self.dims()),
            LeadIn::Immediate => Position::At(Cursor {
                run: 0,
                condition: 0,
                step: self.config.phrase_step(),
            }),
        };
        self.move_to(target);
        true
    }

    /// The single transition function. `trigger` must match the exit path of
    /// the active micro-step; anything else is stale and ignored. The next
    /// position is computed from the cursor as it is at call time.
    pub fn advance(&mut self, trigger: Trigger) -> bool {
        if !self.stage.is_running() {
            debug!(?trigger, stage = ?self.stage, "advance outside running stage ignored");
            return false;
        }
        let Some(expected) = self.active.as_ref().map(ActiveStep::exit_trigger) else {
            return false;
        };
        if trigger != expected {
            debug!(?trigger, ?expected, "stale trigger ignored");
            return false;
        }

        let next = self.position.next(self.dims());
        self.move_to(next);
        true
    }

    /// Processes due countdown ticks and playback completions. On the End
    /// stage it picks up the result of a background export.
    pub fn pump(&mut self) -> Vec<SequencerEvent> {
        let mut events = Vec::new();
        let completed = self.playback.poll_complete();

        match self.stage {
            Stage::Start => {
                if completed.is_some() && completed == self.preview {
                    self.preview = None;
                    events.push(SequencerEvent::SampleFinished);
                }
            }
            Stage::Running => {
                let phrase_done = match &self.active {
                    Some(ActiveStep::Phrase { cycle: None, .. }) => true,
                    Some(ActiveStep::Phrase {
                        cycle: Some(cycle), ..
                    }) => completed == Some(*cycle),
                    _ => false,
                };

                if phrase_done {
                    self.audio_playing = false;
                    self.advance(Trigger::PlaybackComplete);
                    self.push_landing(&mut events);
                } else if let Some(stale) = completed {
                    debug!(cycle = stale.0, "completion from an inactive cycle ignored");
                    events.push(SequencerEvent::Ignored(Trigger::PlaybackComplete));
                }

                self.run_countdown(&mut events);
            }
            Stage::End => self.settle_export(&mut events),
        }

        events
    }

    /// Records a tap while a recording window is open. Auto-repeats and keys
    /// outside the accept policy are dropped.
    pub fn on_key(&mut self, press: KeyPress) -> bool {
        if press.repeat || !self.config.key_policy.accepts(press.key) {
            return false;
        }
        let Some(ActiveStep::Phrase { window, .. }) = &self.active else {
            return false;
        };

        let elapsed_ms = as_millis(self.clock.elapsed_since(window.opened_at));
        self.record.append(&window.key, elapsed_ms);
        debug!(key = %press.key, trial = %window.key, elapsed_ms, "tap recorded");
        true
    }

    /// Plays the volume-check sample. Only available on the start screen.
    pub fn preview_sample(&mut self) -> bool {
        if self.stage != Stage::Start {
            return false;
        }
        let Some(source) = self.config.sample_source.clone() else {
            return false;
        };

        self.stop_preview();
        let cycle = self.next_cycle();
        match self
            .playback
            .load(&source, cycle)
            .and_then(|()| self.playback.play())
        {
            Ok(()) => {
                info!(%source, "playing volume-check sample");
                self.preview = Some(cycle);
                true
            }
            Err(e) => {
                warn!(%source, error = %e, "volume-check sample unavailable");
                false
            }
        }
    }

    /// Full state reset onto a fresh plan; collaborators are kept.
    pub fn restart(&mut self, plan: TrialPlan) -> Result<(), ConfigError> {
        if plan.condition_count() != self.config.plan.conditions.len() {
            return Err(ConfigError::PlanMismatch {
                plan: plan.condition_count(),
                config: self.config.plan.conditions.len(),
            });
        }
        self.leave_step();
        self.stop_preview();
        self.plan = plan;
        self.stage = Stage::Start;
        self.position = Position::BeforeFirst;
        self.countdown = self
            .config
            .initial_countdown_secs
            .unwrap_or_else(|| self.config.wait_secs(MicroStep::PreRoll));
        self.first_countdown_pending = true;
        self.record = TapRecord::new();
        self.audio_source = None;
        self.export = None;
        info!("session reset");
        Ok(())
    }

    pub fn restart_with_rng<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ConfigError> {
        let plan = self.config.build_plan(rng)?;
        self.restart(plan)
    }

    fn run_countdown(&mut self, events: &mut Vec<SequencerEvent>) {
        let now = self.clock.now();
        loop {
            let due = match &mut self.active {
                Some(ActiveStep::Countdown { interval }) => interval.poll(now),
                _ => false,
            };
            if !due {
                break;
            }

            if self.countdown > 1 {
                self.countdown -= 1;
                events.push(SequencerEvent::CountdownTick {
                    remaining: self.countdown,
                });
            } else {
                self.advance(Trigger::Timer);
                self.push_landing(events);
            }
        }
    }

    fn push_landing(&self, events: &mut Vec<SequencerEvent>) {
        match self.position {
            Position::At(cursor) => events.push(SequencerEvent::StepEntered {
                cursor,
                step: self.config.micro_steps[cursor.step],
            }),
            Position::Finished => events.push(SequencerEvent::Finished),
            Position::BeforeFirst => {}
        }
    }

    fn move_to(&mut self, next: Position) {
        self.leave_step();
        self.position = next;
        match next {
            Position::At(cursor) => self.enter_step(cursor),
            Position::Finished => self.finish(),
            Position::BeforeFirst => {}
        }
    }

    /// Tears down the active step's timer or recording window. Always runs
    /// before the next step is installed.
    fn leave_step(&mut self) {
        if let Some(ActiveStep::Phrase { .. }) = self.active.take() {
            if self.audio_playing {
                self.playback.pause();
            }
        }
        self.audio_playing = false;
    }

    fn enter_step(&mut self, cursor: Cursor) {
        let Some(entry) = self.plan.entry(cursor.run, cursor.condition) else {
            error!(?cursor, "cursor outside trial plan, ending session");
            self.position = Position::Finished;
            self.finish();
            return;
        };
        let source = entry.source.clone();
        let step = self.config.micro_steps[cursor.step];
        self.audio_source = Some(source.clone());
        let now = self.clock.now();

        if step.is_phrase() {
            self.record.open(&source);
            let cycle = self.next_cycle();
            let cycle = match self
                .playback
                .load(&source, cycle)
                .and_then(|()| self.playback.play())
            {
                Ok(()) => {
                    self.audio_playing = true;
                    Some(cycle)
                }
                Err(e) => {
                    warn!(%source, error = %e, "playback failed, closing phrase");
                    None
                }
            };
            info!(
                run = cursor.run,
                condition = cursor.condition,
                %source,
                "phrase started, recording taps"
            );
            self.active = Some(ActiveStep::Phrase {
                cycle,
                window: RecordingWindow {
                    key: source,
                    opened_at: now,
                },
            });
        } else {
            self.countdown = match self.config.initial_countdown_secs {
                Some(secs) if self.first_countdown_pending => secs,
                _ => self.config.wait_secs(step),
            };
            self.first_countdown_pending = false;
            debug!(
                run = cursor.run,
                condition = cursor.condition,
                step = step.label(),
                seconds = self.countdown,
                "countdown started"
            );
            self.active = Some(ActiveStep::Countdown {
                interval: Interval::every(TICK, now),
            });
        }
    }

    /// Enters the End stage and hands the record to the sink, once.
    fn finish(&mut self) {
        self.stage = Stage::End;
        self.countdown = 0;
        self.audio_source = None;

        let missing = self
            .plan
            .trial_keys()
            .filter(|key| self.record.get(key).is_none())
            .count();
        if missing > 0 {
            warn!(missing, "session ended with trials that were never presented");
        }

        let sink = self.sink.name().to_string();
        info!(
            trials = self.record.len(),
            taps = self.record.total_taps(),
            %sink,
            "session complete, exporting tap record"
        );
        let outcome = match self.sink.begin_submit(&self.record) {
            Delivery::Settled(result) => export_outcome(sink, result),
            Delivery::Pending => {
                info!(%sink, "tap record export running in background");
                ExportOutcome::Pending { sink }
            }
        };
        self.export = Some(outcome);
    }

    /// Picks up the result of a background export once the sink has it.
    fn settle_export(&mut self, events: &mut Vec<SequencerEvent>) {
        let Some(ExportOutcome::Pending { sink }) = &self.export else {
            return;
        };
        let sink = sink.clone();
        if let Some(result) = self.sink.poll_submit() {
            let outcome = export_outcome(sink, result);
            self.export = Some(outcome.clone());
            events.push(SequencerEvent::ExportSettled(outcome));
        }
    }

    fn stop_preview(&mut self) {
        if self.preview.take().is_some() {
            self.playback.pause();
        }
    }

    fn next_cycle(&mut self) -> PlaybackCycle {
        self.cycles += 1;
        PlaybackCycle(self.cycles)
    }

    pub fn dims(&self) -> Dims {
        self.config.dims(&self.plan)
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.position.cursor()
    }

    pub fn current_step(&self) -> Option<MicroStep> {
        self.cursor().map(|c| self.config.micro_steps[c.step])
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.active, Some(ActiveStep::Phrase { .. }))
    }

    /// When recording, the trial key taps are filed under.
    pub fn recording_key(&self) -> Option<&str> {
        match &self.active {
            Some(ActiveStep::Phrase { window, .. }) => Some(&window.key),
            _ => None,
        }
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    /// Time until the next countdown tick, if a countdown is running.
    pub fn next_tick_in(&self) -> Option<Duration> {
        match &self.active {
            Some(ActiveStep::Countdown { interval }) => Some(interval.remaining(self.clock.now())),
            _ => None,
        }
    }

    pub fn audio_source(&self) -> Option<&str> {
        self.audio_source.as_deref()
    }

    pub fn is_audio_playing(&self) -> bool {
        self.audio_playing
    }

    pub fn is_previewing(&self) -> bool {
        self.preview.is_some()
    }

    pub fn tap_record(&self) -> &TapRecord {
        &self.record
    }

    pub fn export_outcome(&self) -> Option<&ExportOutcome> {
        self.export.as_ref()
    }

    pub fn plan(&self) -> &TrialPlan {
        &self.plan
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn playback(&self) -> &P {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut P {
        &mut self.playback
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }
}

fn export_outcome(sink: String, result: Result<(), SinkError>) -> ExportOutcome {
    match result {
        Ok(()) => {
            info!(%sink, "tap record exported");
            ExportOutcome::Delivered { sink }
        }
        Err(e) => {
            error!(%sink, error = %e, "tap record export failed");
            ExportOutcome::Failed {
                sink,
                message: e.to_string(),
            }
        }
    }
}
