// Copyright © 2026 The node-bench Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use bench_infra::{Executor, ToolCommand};
use serde::{Deserialize, Serialize};

use crate::record::{Record, ResultCollection};
use crate::sweep::{Combination, OneOrMany, Sweep};

const THREADS: &str = "threads";
const CPU_MAX_PRIME: &str = "cpu-max-prime";

pub const DEFAULT_CPU_MAX_PRIME: u64 = 10000;

fn default_cpu_max_prime() -> OneOrMany<u64> {
    OneOrMany::One(DEFAULT_CPU_MAX_PRIME)
}

/// One `threads x cpu-max-prime` sweep.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CpuParameters {
    #[serde(default)]
    pub threads: OneOrMany<u32>,
    #[serde(rename = "cpu-max-prime", default = "default_cpu_max_prime")]
    pub cpu_max_prime: OneOrMany<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct CpuConfig {
    #[serde(default)]
    pub parameters: Vec<CpuParameters>,
}

pub struct CpuBenchmarker<'a, E: Executor + ?Sized> {
    config: CpuConfig,
    executor: &'a E,
}

impl<'a, E: Executor + ?Sized> CpuBenchmarker<'a, E> {
    pub fn new(config: CpuConfig, executor: &'a E) -> Self {
        CpuBenchmarker { config, executor }
    }

    fn command(combination: &Combination) -> ToolCommand {
        let mut cmd = ToolCommand::new("sysbench");
        cmd.arg("cpu")
            .arg(format!("--threads={}", combination[THREADS]))
            .arg(format!("--cpu-max-prime={}", combination[CPU_MAX_PRIME]))
            .arg("run");
        cmd
    }

    fn run_combination(&self, combination: &Combination) -> Record {
        info!(
            "Running sysbench with {} threads and cpu-max-prime={}",
            combination[THREADS], combination[CPU_MAX_PRIME]
        );
        let output = match self.executor.run(&Self::command(combination)) {
            Ok(output) => output.stdout,
            Err(e) => {
                warn!("Error running sysbench with {} threads: {e}", combination[THREADS]);
                e.output_text()
            }
        };

        let mut record = Record::from_sysbench_output(&output);
        record.extend(combination.iter().map(|(k, v)| (k, v.clone())));
        record
    }

    /// Runs every combination of every parameter set, one record each.
    pub fn run(&self) -> ResultCollection {
        let mut results = ResultCollection::new();
        for params in &self.config.parameters {
            let sweep = Sweep::new()
                .axis(THREADS, params.threads.to_vec())
                .axis(CPU_MAX_PRIME, params.cpu_max_prime.to_vec());
            for combination in sweep.expand() {
                results.push(self.run_combination(&combination));
            }
        }
        results
    }
}
