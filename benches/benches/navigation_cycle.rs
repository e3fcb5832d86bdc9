// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::Rect;
use understory_transition::TransitionRoot;
use understory_transition::action::{ActionContext, ActionDescriptor};
use understory_transition::navigation::NavigationType;
use understory_transition::sim::{SimElement, SimHost};

fn bench_navigation(c: &mut Criterion) {
    let mut group = c.benchmark_group("navigation");
    for &n in &[10usize, 100] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("element_actions_n{}", n), |b| {
            let mut host = SimHost::new();
            let root = TransitionRoot::new(host.environment());
            let transitions = root.setup();
            let elements: Vec<_> = (0..n)
                .map(|i| {
                    let top = i as f64 * 40.0;
                    let node = SimElement::new(Rect::new(0.0, top, 100.0, top + 30.0));
                    let action = transitions.element_action(
                        node.clone(),
                        ActionDescriptor::named_by(move |_: &ActionContext<SimElement>| {
                            format!("item-{i}")
                        })
                        .should_apply_with(|cx: &ActionContext<SimElement>| cx.is_in_viewport)
                        .classes(vec!["list".to_owned()]),
                    );
                    (node, action)
                })
                .collect();

            b.iter(|| {
                let mut nav = host.navigate(NavigationType::Link, "/", "/next");
                host.run_until_stalled();
                nav.complete();
                host.run_until_stalled();
                host.transitions.finish();
                host.run_until_stalled();
                black_box(host.document.classes().len());
            });
            black_box(elements.len());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_navigation);
criterion_main!(benches);
