// Copyright © 2026 The node-bench Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Host-side plumbing shared by the benchmark runners: running external
//! tools, and turning their free-text output into numbers.

#[macro_use]
extern crate log;

pub mod exec;
pub mod mock;
pub mod net;
pub mod stats;
pub mod sysbench;

pub use exec::{ExecError, Executor, HostExecutor, ToolCommand, ToolOutput};
