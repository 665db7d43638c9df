// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod schedule;
mod task;
mod thread_container;

pub use schedule::{Schedule, ScheduleBuilder, ScheduleReport};
pub use task::{PeriodicTask, PeriodicTaskInfo, Task};
pub use thread_container::{ContainerStats, ThreadContainer};
