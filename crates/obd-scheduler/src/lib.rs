//! OBD-II Scheduler for Rate-Based PID Sampling
//!
//! Polls a set of PIDs at per-PID rates through a single client, one
//! exchange at a time, and streams decoded readings over a channel.

mod scheduler;

pub use scheduler::{PidScheduler, ScheduledPid, SchedulerConfig};
