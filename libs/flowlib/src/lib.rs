// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! In-process data-flow core: typed ports exchanging pooled, reference
//! counted buffers along an edge graph, and thread containers that run
//! periodic tasks in data-flow order.

#![allow(clippy::type_complexity)] // Complex types are clear in context

pub mod core;

pub use core::{
    BoundsConfig, BufferManager, BufferPool, ContainerStats, DataType, Edge, ElementFlags,
    ElementId, Event, EventBus, EventListener, ExecutionEvent, FlowError, FlowRuntime,
    GraphInspector, LockedBuffer, Number, OutOfBoundsPolicy, PeriodicTask, PeriodicTaskInfo,
    Port, PortCreationInfo, PortFlags, PortKind, PortListener, PortOptions, PortValue,
    PullRequestHandler, PushStrategy, QueueFragment, Result, RuntimeConfig, Schedule,
    ScheduleBuilder, StructureEvent, Task, ThreadContainer, ThreadContext, TypeRegistry, Unit,
    UnusedBuffer,
};
