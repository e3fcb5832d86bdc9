// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::cell::Cell;
use std::rc::Rc;

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_transition::EventBus;
use understory_transition::error::NavigationError;
use understory_transition::events::{BeforeNavigation, NavigationEvent};
use understory_transition::navigation::{Navigation, NavigationTarget, NavigationType};
use understory_transition::registry::SubscribeOptions;

fn payload() -> NavigationEvent {
    NavigationEvent {
        navigation: Navigation::new(
            NavigationType::Link,
            Some(NavigationTarget::new("/")),
            Some(NavigationTarget::new("/bench")),
            async { Ok::<(), NavigationError>(()) },
        ),
    }
}

fn bus_with_listeners(n: usize, options: SubscribeOptions, hits: &Rc<Cell<u64>>) -> EventBus {
    let bus = EventBus::new();
    for _ in 0..n {
        let hits = Rc::clone(hits);
        bus.register::<BeforeNavigation, _>(
            move |_: &NavigationEvent| hits.set(hits.get() + 1),
            options,
        );
    }
    bus
}

fn bench_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit");
    let event = payload();
    for &n in &[10usize, 100, 1000] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("persistent_n{}", n), |b| {
            let hits = Rc::new(Cell::new(0));
            let bus = bus_with_listeners(n, SubscribeOptions::empty(), &hits);
            b.iter(|| {
                let report = bus.emit::<BeforeNavigation>(&event);
                black_box(report.invoked());
            });
        });
        group.bench_function(format!("one_shot_n{}", n), |b| {
            let hits = Rc::new(Cell::new(0));
            b.iter_batched(
                || bus_with_listeners(n, SubscribeOptions::AUTO_CLEAN, &hits),
                |bus| {
                    let report = bus.emit::<BeforeNavigation>(&event);
                    black_box(report.invoked());
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");
    for &n in &[100usize, 1000] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("register_deregister_n{}", n), |b| {
            let bus = EventBus::new();
            b.iter(|| {
                let ids: Vec<_> = (0..n)
                    .map(|_| {
                        bus.register::<BeforeNavigation, _>(
                            |_: &NavigationEvent| {},
                            SubscribeOptions::empty(),
                        )
                    })
                    .collect();
                for id in ids {
                    black_box(bus.deregister(id));
                }
            });
        });
        group.bench_function(format!("deferred_flush_n{}", n), |b| {
            b.iter_batched(
                || {
                    let bus = EventBus::new();
                    bus.begin_transition();
                    for _ in 0..n {
                        bus.register::<BeforeNavigation, _>(
                            |_: &NavigationEvent| {},
                            SubscribeOptions::empty(),
                        );
                    }
                    bus
                },
                |bus| black_box(bus.end_transition()),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_emit, bench_registration);
criterion_main!(benches);
