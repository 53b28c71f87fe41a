use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use std::time::Duration;

use tapex_core::{KeyPress, PlanSpec, TapRecord, TrialPlan};
use tapex_sequencer::{PlaybackCycle, PlaybackError, PlaybackSurface, SessionConfig, TrialSequencer};
use tapex_timing::ManualClock;

/// Finishes every cycle as soon as it is polled.
#[derive(Default)]
struct InstantPlayback {
    current: Option<PlaybackCycle>,
}

impl PlaybackSurface for InstantPlayback {
    fn load(&mut self, _source: &str, cycle: PlaybackCycle) -> Result<(), PlaybackError> {
        self.current = Some(cycle);
        Ok(())
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn pause(&mut self) {}

    fn poll_complete(&mut self) -> Option<PlaybackCycle> {
        self.current.take()
    }
}

fn large_spec(items: usize) -> PlanSpec {
    PlanSpec {
        catalog: (0..items).map(|i| format!("{i:04}.wav")).collect(),
        run_count: items,
        ..PlanSpec::default()
    }
}

pub fn bench_build_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_plan");
    for items in [10usize, 1_000] {
        let spec = large_spec(items);
        group.bench_function(format!("{items}_items"), |b| {
            let mut seed = 0u64;
            b.iter(|| {
                seed += 1;
                black_box(TrialPlan::from_seed(&spec, seed).unwrap());
            });
        });
    }
    group.finish();
}

pub fn bench_full_session(c: &mut Criterion) {
    let config = SessionConfig {
        plan: large_spec(100),
        ..SessionConfig::default()
    };

    c.bench_function("full_session_100_runs", |b| {
        b.iter_batched(
            || {
                let clock = ManualClock::new();
                let plan = TrialPlan::from_seed(&config.plan, 1).unwrap();
                let seq = TrialSequencer::new(
                    config.clone(),
                    plan,
                    clock.clone(),
                    InstantPlayback::default(),
                    Vec::<TapRecord>::new(),
                )
                .unwrap();
                (seq, clock)
            },
            |(mut seq, clock)| {
                seq.start();
                while seq.stage().is_running() {
                    if seq.is_recording() {
                        for _ in 0..8 {
                            clock.advance(Duration::from_millis(500));
                            seq.on_key(KeyPress::new('j'));
                        }
                    } else {
                        clock.advance(Duration::from_secs(1));
                    }
                    black_box(seq.pump());
                }
                black_box(seq.tap_record().total_taps())
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(30)
        .measurement_time(Duration::from_secs(5));
    targets = bench_build_plan, bench_full_session
}

criterion_main!(benches);
