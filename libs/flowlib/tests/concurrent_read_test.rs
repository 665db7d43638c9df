// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Readers on other threads racing the publishing thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use flowlib::core::{DataType, ElementId, FlowRuntime, Port, PortCreationInfo, ThreadContext};

const PUBLISHES: u32 = 20_000;

fn output_port(runtime: &FlowRuntime, ctx: &mut ThreadContext, data_type: DataType) -> Arc<Port> {
    let port = runtime
        .create_port(ctx, ElementId::ROOT, PortCreationInfo::output("out", data_type))
        .unwrap();
    runtime.init_element(port.id()).unwrap();
    port
}

/// Publish `1..=PUBLISHES` on the calling thread while a reader thread
/// decodes the current value with `read`. Returns the number of reads.
fn race<P, R>(port: &Port, ctx: &mut ThreadContext, publish: P, read: R) -> u64
where
    P: Fn(&Port, &mut ThreadContext, u32),
    R: Fn(&Port) -> u32 + Sync,
{
    let done = AtomicBool::new(false);
    std::thread::scope(|s| {
        let reader = s.spawn(|| {
            let mut reads = 0u64;
            let mut last = 0;
            loop {
                let value = read(port);
                assert!(value <= PUBLISHES, "read unpublished value {value}");
                assert!(value >= last, "read {value} after {last}");
                last = value;
                reads += 1;
                if done.load(Ordering::Acquire) {
                    break;
                }
            }
            reads
        });

        for i in 1..=PUBLISHES {
            publish(port, ctx, i);
        }
        done.store(true, Ordering::Release);
        reader.join().unwrap()
    })
}

#[test]
fn test_cheap_copy_reads_race_publisher() {
    let runtime = FlowRuntime::new();
    let mut ctx = runtime.thread_context("publisher");
    let f64_type = runtime.type_registry().get::<f64>().unwrap();
    let port = output_port(&runtime, &mut ctx, f64_type.clone());

    let reads = race(
        &port,
        &mut ctx,
        |port, ctx, i| port.publish_value(ctx, &(i as f64)).unwrap(),
        |port| {
            let locked = port.get_locked();
            assert!(locked.lock_count() >= 1);
            let held = locked.value::<f64>().unwrap();
            drop(locked);

            let copied = port.get_value::<f64>().unwrap();
            assert_eq!(copied.fract(), 0.0);
            assert!(copied >= held);
            copied as u32
        },
    );

    assert!(reads >= 1);
    assert_eq!(port.get_value::<f64>(), Some(PUBLISHES as f64));
    assert!(port.current_lock_count() >= 1);

    // Buffers the reader released last come back through the return queue
    ctx.reclaim_returns();
    let pool = ctx.pool(&f64_type).unwrap();
    assert_eq!(pool.pending_returns(), 0);
    assert_eq!(pool.available() + 1, pool.allocated());
}

#[test]
fn test_standard_reads_race_publisher() {
    let runtime = FlowRuntime::new();
    let mut ctx = runtime.thread_context("publisher");
    let string_type = runtime.type_registry().get::<String>().unwrap();
    let port = output_port(&runtime, &mut ctx, string_type);

    let reads = race(
        &port,
        &mut ctx,
        |port, ctx, i| port.publish_value(ctx, &i.to_string()).unwrap(),
        |port| {
            let locked = port.get_locked();
            assert!(locked.lock_count() >= 1);
            let text = locked.value::<String>().unwrap();
            if text.is_empty() {
                0
            } else {
                text.parse().unwrap()
            }
        },
    );

    assert!(reads >= 1);
    assert_eq!(port.get_value::<String>(), Some(PUBLISHES.to_string()));
}
