//! Event loop benchmarks using criterion for historical comparison.

use std::any::Any;
use std::hint::black_box;
use std::sync::Arc;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tempo_curve::Discrete;
use tempo_event::prelude::*;

#[derive(Default)]
struct Counter {
    fired: u64,
}

struct Body {
    id: TargetId,
    wake: Discrete<i64>,
}

impl Body {
    fn new(wake: i64) -> Arc<Self> {
        Arc::new(Self {
            id: TargetId::allocate(),
            wake: Discrete::new(wake),
        })
    }
}

impl EventTarget for Body {
    fn id(&self) -> TargetId {
        self.id
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Fires when the body's `wake` curve says so.
struct Wake;

impl EventClass<Counter> for Wake {
    fn id(&self) -> &str {
        "wake"
    }

    fn predict_trigger_time(
        &self,
        target: &dyn EventTarget,
        _: &Counter,
        reference_time: Time,
        _: &ParamMap,
    ) -> Option<Time> {
        let body = target.downcast_ref::<Body>()?;
        Some(Time::from_int(body.wake.get(reference_time)))
    }

    fn invoke(
        &self,
        _: &mut Loop<Counter>,
        _: &TargetRef,
        state: &mut Counter,
        _: Time,
        _: &ParamMap,
    ) {
        state.fired += 1;
    }
}

/// Fires every time unit, forever.
struct Tick;

impl EventClass<Counter> for Tick {
    fn id(&self) -> &str {
        "tick"
    }

    fn trigger_type(&self) -> TriggerType {
        TriggerType::Repeat
    }

    fn predict_trigger_time(
        &self,
        _: &dyn EventTarget,
        _: &Counter,
        reference_time: Time,
        _: &ParamMap,
    ) -> Option<Time> {
        Some(reference_time + Time::from_int(1))
    }

    fn invoke(
        &self,
        _: &mut Loop<Counter>,
        _: &TargetRef,
        state: &mut Counter,
        _: Time,
        _: &ParamMap,
    ) {
        state.fired += 1;
    }
}

fn populated(count: u64) -> (Loop<Counter>, Vec<Arc<Body>>) {
    let config = LoopConfig::default().with_max_events(usize::MAX);
    let mut event_loop = Loop::<Counter>::with_config(config);
    event_loop.onfilter(Arc::new(Wake), EventFilter::any());

    let state = Counter::default();
    let bodies: Vec<Arc<Body>> = (0..count)
        .map(|i| Body::new((i % 97) as i64 + 1))
        .collect();
    for body in &bodies {
        let target: TargetRef = body.clone();
        event_loop.register_object(&target, &state, Time::ZERO);
    }
    (event_loop, bodies)
}

fn schedule_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("schedule");

    for count in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(count));

        group.bench_with_input(BenchmarkId::new("register", count), &count, |b, &count| {
            b.iter(|| black_box(populated(count)));
        });

        group.bench_with_input(BenchmarkId::new("drain", count), &count, |b, &count| {
            b.iter_batched(
                || populated(count),
                |(mut event_loop, bodies)| {
                    let mut state = Counter::default();
                    let executed = event_loop.reach_time(Time::from_int(100), &mut state);
                    black_box(executed.unwrap());
                    assert_eq!(state.fired, bodies.len() as u64);
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn change_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("changes");

    for count in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(count));

        group.bench_with_input(BenchmarkId::new("notify_update", count), &count, |b, &count| {
            b.iter_batched(
                || populated(count),
                |(mut event_loop, bodies)| {
                    let state = Counter::default();
                    for body in &bodies {
                        body.wake.set_last(Time::ZERO, 200);
                        event_loop.notify_change(body.id(), Time::ZERO);
                    }
                    black_box(event_loop.update_changes(&state));
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn repeat_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("repeat");

    for periods in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(periods));

        group.bench_with_input(BenchmarkId::new("tick", periods), &periods, |b, &periods| {
            b.iter(|| {
                let config = LoopConfig::default().with_max_events(usize::MAX);
                let mut event_loop = Loop::<Counter>::with_config(config);
                let mut state = Counter::default();
                let body: TargetRef = Body::new(0);
                event_loop.create_event_with_class(
                    Arc::new(Tick),
                    &body,
                    &state,
                    Time::ZERO,
                    ParamMap::new(),
                );
                let executed = event_loop.reach_time(Time::from_int(periods as i64), &mut state);
                black_box(executed.unwrap());
                state.fired
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    schedule_benchmarks,
    change_benchmarks,
    repeat_benchmarks,
);

criterion_main!(benches);
