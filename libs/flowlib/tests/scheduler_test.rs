// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Schedule construction from the port graph.

use std::sync::Arc;

use flowlib::core::{
    ElementFlags, ElementId, Event, EventListener, ExecutionEvent, FlowRuntime, PeriodicTaskInfo,
    PortCreationInfo, Result, ScheduleBuilder, Task, ThreadContainer, ThreadContext, topics,
};
use parking_lot::Mutex;

fn noop() -> Arc<dyn Task> {
    Arc::new(|_ctx: &mut ThreadContext| {})
}

/// Component with an input interface holding port `in` and an output
/// interface holding port `out`.
struct Component {
    input: ElementId,
    output: ElementId,
    in_port: ElementId,
    out_port: ElementId,
}

fn component(
    runtime: &FlowRuntime,
    ctx: &mut ThreadContext,
    parent: ElementId,
    name: &str,
) -> Component {
    let f64_type = runtime.type_registry().get::<f64>().unwrap();
    let group = runtime
        .create_group(parent, name, ElementFlags::empty())
        .unwrap();
    let input = runtime.create_interface(group, "input", false).unwrap();
    let output = runtime.create_interface(group, "output", false).unwrap();
    let in_port = runtime
        .create_port(ctx, input, PortCreationInfo::input("in", f64_type.clone()))
        .unwrap();
    let out_port = runtime
        .create_port(ctx, output, PortCreationInfo::output("out", f64_type))
        .unwrap();
    Component {
        input,
        output,
        in_port: in_port.id(),
        out_port: out_port.id(),
    }
}

fn add_task(runtime: &FlowRuntime, component: &Component, parent: ElementId, name: &str) {
    let info = PeriodicTaskInfo::new(name)
        .incoming(component.input)
        .outgoing(component.output);
    runtime.add_periodic_task(parent, info, noop()).unwrap();
}

fn container(runtime: &FlowRuntime) -> Arc<ThreadContainer> {
    runtime
        .create_thread_container(ElementId::ROOT, "control")
        .unwrap()
}

fn build(runtime: &FlowRuntime, container: &ThreadContainer) -> Vec<String> {
    let tree = runtime.tree();
    ScheduleBuilder::build_for(&tree, container.id())
        .unwrap()
        .tasks()
        .iter()
        .map(|task| task.name().to_string())
        .collect()
}

#[test]
fn test_linear_chain_ignores_creation_order() {
    let runtime = FlowRuntime::new();
    let mut ctx = runtime.thread_context("test");
    let container = container(&runtime);

    // Created in reverse data order
    let c3 = component(&runtime, &mut ctx, container.id(), "c3");
    let c2 = component(&runtime, &mut ctx, container.id(), "c2");
    let c1 = component(&runtime, &mut ctx, container.id(), "c1");
    add_task(&runtime, &c3, container.id(), "t3");
    add_task(&runtime, &c2, container.id(), "t2");
    add_task(&runtime, &c1, container.id(), "t1");
    runtime.connect(c1.out_port, c2.in_port).unwrap();
    runtime.connect(c2.out_port, c3.in_port).unwrap();
    runtime.init_element(container.id()).unwrap();

    assert_eq!(build(&runtime, &container), vec!["t1", "t2", "t3"]);
}

#[test]
fn test_cycle_is_broken_deterministically() {
    let runtime = FlowRuntime::new();
    let mut ctx = runtime.thread_context("test");
    let container = container(&runtime);

    let c1 = component(&runtime, &mut ctx, container.id(), "c1");
    let c2 = component(&runtime, &mut ctx, container.id(), "c2");
    add_task(&runtime, &c1, container.id(), "t1");
    add_task(&runtime, &c2, container.id(), "t2");
    runtime.connect(c1.out_port, c2.in_port).unwrap();
    runtime.connect(c2.out_port, c1.in_port).unwrap();
    runtime.init_element(container.id()).unwrap();

    for _ in 0..3 {
        assert_eq!(build(&runtime, &container), vec!["t2", "t1"]);
    }

    let tree = runtime.tree();
    let schedule = ScheduleBuilder::build_for(&tree, container.id()).unwrap();
    assert_eq!(schedule.broken_cycles().len(), 1);
    assert_eq!(schedule.report().broken_cycles, vec!["/control/t2".to_string()]);
}

#[test]
fn test_uninitialised_tasks_are_not_scheduled() {
    let runtime = FlowRuntime::new();
    let mut ctx = runtime.thread_context("test");
    let container = container(&runtime);

    let c1 = component(&runtime, &mut ctx, container.id(), "c1");
    add_task(&runtime, &c1, container.id(), "t1");
    assert!(build(&runtime, &container).is_empty());

    runtime.init_element(container.id()).unwrap();
    assert_eq!(build(&runtime, &container), vec!["t1"]);
}

#[test]
fn test_nested_container_tasks_excluded() {
    let runtime = FlowRuntime::new();
    let mut ctx = runtime.thread_context("test");
    let outer = container(&runtime);
    let inner = runtime
        .create_thread_container(outer.id(), "inner")
        .unwrap();

    let c1 = component(&runtime, &mut ctx, outer.id(), "c1");
    let c2 = component(&runtime, &mut ctx, inner.id(), "c2");
    add_task(&runtime, &c1, outer.id(), "t1");
    add_task(&runtime, &c2, inner.id(), "t2");
    runtime.init_element(outer.id()).unwrap();

    assert_eq!(build(&runtime, &outer), vec!["t1"]);
    assert_eq!(build(&runtime, &inner), vec!["t2"]);
}

#[test]
fn test_sensor_tasks_run_first() {
    let runtime = FlowRuntime::new();
    let mut ctx = runtime.thread_context("test");
    let container = container(&runtime);

    let consumer = component(&runtime, &mut ctx, container.id(), "consumer");
    let sensor = runtime.create_interface(container.id(), "imu", true).unwrap();
    add_task(&runtime, &consumer, container.id(), "filter");
    runtime
        .add_periodic_task(
            container.id(),
            PeriodicTaskInfo::new("imu_driver").outgoing(sensor),
            noop(),
        )
        .unwrap();
    runtime.init_element(container.id()).unwrap();

    assert_eq!(build(&runtime, &container), vec!["imu_driver", "filter"]);
}

#[test]
fn test_connect_requests_reschedule() {
    let runtime = FlowRuntime::new();
    let mut ctx = runtime.thread_context("test");
    let container = container(&runtime);
    let c1 = component(&runtime, &mut ctx, container.id(), "c1");
    let c2 = component(&runtime, &mut ctx, container.id(), "c2");
    add_task(&runtime, &c2, container.id(), "t2");
    add_task(&runtime, &c1, container.id(), "t1");
    runtime.init_element(container.id()).unwrap();

    container.execute_cycle(&mut ctx).unwrap();
    assert!(!container.needs_reschedule());
    assert_eq!(container.schedule().task_names().len(), 2);

    runtime.connect(c1.out_port, c2.in_port).unwrap();
    assert!(container.needs_reschedule());

    container.execute_cycle(&mut ctx).unwrap();
    assert!(!container.needs_reschedule());
    let report = container.schedule_report();
    assert_eq!(report.tasks, vec!["/control/t1", "/control/t2"]);
    assert_eq!(
        report.dependencies,
        vec![("/control/t1".to_string(), "/control/t2".to_string())]
    );
}

#[test]
fn test_changes_elsewhere_do_not_reschedule() {
    let runtime = FlowRuntime::new();
    let mut ctx = runtime.thread_context("test");
    let container = container(&runtime);
    container.execute_cycle(&mut ctx).unwrap();
    assert!(!container.needs_reschedule());

    component(&runtime, &mut ctx, ElementId::ROOT, "elsewhere");
    assert!(!container.needs_reschedule());
}

struct Recorder {
    events: Vec<Event>,
}

impl EventListener for Recorder {
    fn on_event(&mut self, event: &Event) -> Result<()> {
        self.events.push(event.clone());
        Ok(())
    }
}

#[test]
fn test_cycle_break_is_announced() {
    let runtime = FlowRuntime::new();
    let mut ctx = runtime.thread_context("test");
    let recorder = Arc::new(Mutex::new(Recorder { events: Vec::new() }));
    runtime
        .event_bus()
        .subscribe(topics::EXECUTION, recorder.clone());

    let container = container(&runtime);
    let c1 = component(&runtime, &mut ctx, container.id(), "c1");
    let c2 = component(&runtime, &mut ctx, container.id(), "c2");
    add_task(&runtime, &c1, container.id(), "t1");
    add_task(&runtime, &c2, container.id(), "t2");
    runtime.connect(c1.out_port, c2.in_port).unwrap();
    runtime.connect(c2.out_port, c1.in_port).unwrap();
    runtime.init_element(container.id()).unwrap();

    container.execute_cycle(&mut ctx).unwrap();

    let events = &recorder.lock().events;
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        Event::Execution(ExecutionEvent::CycleBroken { task, .. }) if task == "t2"
    ));
}
