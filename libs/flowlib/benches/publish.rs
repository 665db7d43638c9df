use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flowlib::core::{ElementId, FlowRuntime, PortCreationInfo};

// Benchmark: publish into a fan-out of push-connected inputs
fn bench_publish_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_fan_out");

    for destinations in [0usize, 1, 4, 16, 64].iter() {
        group.throughput(Throughput::Elements(*destinations as u64 + 1));
        group.bench_with_input(
            BenchmarkId::from_parameter(destinations),
            destinations,
            |b, &destinations| {
                let runtime = FlowRuntime::new();
                let mut ctx = runtime.thread_context("bench");
                let f64_type = runtime.type_registry().get::<f64>().unwrap();
                let source = runtime
                    .create_port(
                        &mut ctx,
                        ElementId::ROOT,
                        PortCreationInfo::output("source", f64_type.clone()),
                    )
                    .unwrap();
                for i in 0..destinations {
                    let input = runtime
                        .create_port(
                            &mut ctx,
                            ElementId::ROOT,
                            PortCreationInfo::input(format!("in{}", i), f64_type.clone()),
                        )
                        .unwrap();
                    runtime.connect(source.id(), input.id()).unwrap();
                }
                runtime.init_element(ElementId::ROOT).unwrap();

                let mut value = 0.0f64;
                b.iter(|| {
                    value += 1.0;
                    source.publish_value(&mut ctx, black_box(&value)).unwrap();
                });
            },
        );
    }

    group.finish();
}

// Benchmark: chain depth of push-connected proxies
fn bench_publish_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_chain");

    for depth in [1usize, 4, 16].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, &depth| {
            let runtime = FlowRuntime::new();
            let mut ctx = runtime.thread_context("bench");
            let f64_type = runtime.type_registry().get::<f64>().unwrap();
            let source = runtime
                .create_port(
                    &mut ctx,
                    ElementId::ROOT,
                    PortCreationInfo::output("source", f64_type.clone()),
                )
                .unwrap();
            let mut previous = source.id();
            for i in 0..depth {
                let proxy = runtime
                    .create_port(
                        &mut ctx,
                        ElementId::ROOT,
                        PortCreationInfo::proxy(format!("p{}", i), f64_type.clone()),
                    )
                    .unwrap();
                runtime.connect(previous, proxy.id()).unwrap();
                previous = proxy.id();
            }
            let sink = runtime
                .create_port(&mut ctx, ElementId::ROOT, PortCreationInfo::input("sink", f64_type))
                .unwrap();
            runtime.connect(previous, sink.id()).unwrap();
            runtime.init_element(ElementId::ROOT).unwrap();

            b.iter(|| {
                source.publish_value(&mut ctx, black_box(&1.5f64)).unwrap();
            });
        });
    }

    group.finish();
}

// Benchmark: optimistic read of a cheap-copy port
fn bench_get_value(c: &mut Criterion) {
    let runtime = FlowRuntime::new();
    let mut ctx = runtime.thread_context("bench");
    let f64_type = runtime.type_registry().get::<f64>().unwrap();
    let port = runtime
        .create_port(
            &mut ctx,
            ElementId::ROOT,
            PortCreationInfo::output("value", f64_type).with_default(2.0f64),
        )
        .unwrap();

    c.bench_function("get_value_cheap_copy", |b| {
        b.iter(|| black_box(port.get_value::<f64>()));
    });
}

criterion_group!(benches, bench_publish_fan_out, bench_publish_chain, bench_get_value);
criterion_main!(benches);
