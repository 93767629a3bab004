// Copyright © 2026 The node-bench Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Benchmark orchestration: parameter sweeps over `sysbench`, `iperf3`,
//! `ping` and `hping3`, and aggregation of their results into one report.

#[macro_use]
extern crate log;

pub mod config;
pub mod cpu;
pub mod mount;
pub mod network;
pub mod record;
pub mod report;
pub mod storage;
pub mod sweep;

use std::io;

use thiserror::Error;

pub use cpu::{CpuBenchmarker, CpuConfig, CpuParameters};
pub use network::{NetworkBenchmarker, NetworkConfig};
pub use record::{Record, ResultCollection, Value};
pub use report::Report;
pub use storage::{StorageBenchmarker, StorageConfig};
pub use sweep::{Combination, OneOrMany, Sweep};

#[derive(Error, Debug)]
pub enum Error {
    #[error("no benchmark results are available")]
    MissingResults,
    #[error("writing the report failed")]
    ReportCsv(#[source] csv::Error),
    #[error("writing the report failed")]
    ReportIo(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
