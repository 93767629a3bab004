// Copyright © 2026 The node-bench Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Bandwidth (`iperf3`) and latency (`ping`, `hping3`) runs against the
//! other nodes of the fleet.

use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use bench_infra::net::{
    parse_hping3_rtts, parse_iperf3_bandwidth, parse_ping_rtts, summarize_latency,
    LatencySummary,
};
use bench_infra::stats::std_deviation;
use bench_infra::{Executor, ToolCommand};
use serde::{Deserialize, Serialize};

use crate::record::{Record, ResultCollection};
use crate::sweep::{OneOrMany, Sweep};

const INTERFACE: &str = "interface";
const PEER: &str = "peer";

pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);
const IPERF3_DURATION_SECS: u32 = 10;
const PROBE_COUNT: u32 = 10;
const HPING3_PORT: u16 = 80;

fn default_threads() -> OneOrMany<u32> {
    OneOrMany::One(1)
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub interfaces: OneOrMany<String>,
    #[serde(default)]
    pub peers: OneOrMany<String>,
    #[serde(default)]
    pub workloads: OneOrMany<String>,
    #[serde(default = "default_threads")]
    pub threads: OneOrMany<u32>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            interfaces: OneOrMany::default(),
            peers: OneOrMany::default(),
            workloads: OneOrMany::default(),
            threads: default_threads(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Workload {
    Iperf,
    Ping,
    Hping3,
}

impl Workload {
    /// Execution order within a combination.
    pub const ALL: [Workload; 3] = [Workload::Iperf, Workload::Ping, Workload::Hping3];
}

impl FromStr for Workload {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iperf" | "iperf3" => Ok(Workload::Iperf),
            "ping" => Ok(Workload::Ping),
            "hping" | "hping3" => Ok(Workload::Hping3),
            _ => Err(format!("unknown network workload '{s}'")),
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Workload::Iperf => write!(f, "iperf"),
            Workload::Ping => write!(f, "ping"),
            Workload::Hping3 => write!(f, "hping"),
        }
    }
}

/// Columns shared by every network row.
struct Row<'a> {
    workload: Workload,
    interface: Option<&'a str>,
    peer: &'a str,
    threads: Option<u32>,
    latency: Option<LatencySummary>,
    bandwidth: Option<f64>,
}

impl From<Row<'_>> for Record {
    fn from(row: Row) -> Self {
        let mut record = Record::new();
        record.insert("workload", row.workload.to_string());
        record.insert("interface", row.interface);
        record.insert("peer", row.peer);
        record.insert("threads", row.threads);
        record.insert("avg_latency", row.latency.map(|l| l.avg));
        record.insert("p95_latency", row.latency.map(|l| l.p95));
        record.insert("bandwidth", row.bandwidth);
        record
    }
}

pub struct NetworkBenchmarker<'a, E: Executor + ?Sized> {
    config: NetworkConfig,
    executor: &'a E,
    delay: Duration,
}

impl<'a, E: Executor + ?Sized> NetworkBenchmarker<'a, E> {
    pub fn new(config: NetworkConfig, executor: &'a E) -> Self {
        NetworkBenchmarker {
            config,
            executor,
            delay: DEFAULT_DELAY,
        }
    }

    /// Pause after every tool invocation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The configured workloads in execution order, each at most once.
    fn workloads(&self) -> Vec<Workload> {
        let requested: Vec<Workload> = self
            .config
            .workloads
            .as_slice()
            .iter()
            .filter_map(|w| match w.parse() {
                Ok(workload) => Some(workload),
                Err(e) => {
                    warn!("Skipping {e}");
                    None
                }
            })
            .collect();
        Workload::ALL
            .into_iter()
            .filter(|w| requested.contains(w))
            .collect()
    }

    /// Runs `cmd` and returns whatever text it produced, failed or not.
    fn invoke(&self, cmd: &ToolCommand) -> String {
        info!("Running {cmd}");
        let output = match self.executor.run(cmd) {
            Ok(output) => output.stdout,
            Err(e) => {
                warn!("{e}");
                e.output_text()
            }
        };
        debug!("{}: {output}", cmd.get_program());
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        output
    }

    fn iperf(&self, interface: &str, peer: &str, threads: u32) -> Record {
        let mut cmd = ToolCommand::new("iperf3");
        cmd.args(["-c", peer, "--bind-dev", interface])
            .arg("-P")
            .arg(threads.to_string())
            .arg("-t")
            .arg(IPERF3_DURATION_SECS.to_string());
        let bandwidth = parse_iperf3_bandwidth(&self.invoke(&cmd));
        if bandwidth.is_none() {
            warn!("No bandwidth reported by iperf3 for {peer} over {interface}");
        }

        Row {
            workload: Workload::Iperf,
            interface: Some(interface),
            peer,
            threads: Some(threads),
            latency: None,
            bandwidth,
        }
        .into()
    }

    fn ping(&self, peer: &str) -> Record {
        let mut cmd = ToolCommand::new("ping");
        cmd.arg("-c").arg(PROBE_COUNT.to_string()).arg(peer);
        self.latency(Workload::Ping, peer, &cmd, parse_ping_rtts)
    }

    fn hping3(&self, peer: &str) -> Record {
        let mut cmd = ToolCommand::new("hping3");
        cmd.args(["-S", peer])
            .arg("-p")
            .arg(HPING3_PORT.to_string())
            .arg("-c")
            .arg(PROBE_COUNT.to_string());
        self.latency(Workload::Hping3, peer, &cmd, parse_hping3_rtts)
    }

    fn latency(
        &self,
        workload: Workload,
        peer: &str,
        cmd: &ToolCommand,
        parse: fn(&str) -> Vec<f64>,
    ) -> Record {
        let samples = parse(&self.invoke(cmd));
        let latency = summarize_latency(&samples);
        match std_deviation(&samples) {
            Some(jitter) => debug!(
                "{workload} to {peer}: {} samples, stddev {jitter:.3} ms",
                samples.len()
            ),
            None => warn!("No round-trip samples in the output of `{cmd}`"),
        }

        Row {
            workload,
            interface: None,
            peer,
            threads: None,
            latency,
            bandwidth: None,
        }
        .into()
    }

    /// For every interface and peer, runs the configured workloads in
    /// `iperf`, `ping`, `hping3` order; `iperf` once per thread count.
    pub fn run(&self) -> ResultCollection {
        let workloads = self.workloads();
        let sweep = Sweep::new()
            .axis(INTERFACE, self.config.interfaces.to_vec())
            .axis(PEER, self.config.peers.to_vec());

        let mut results = ResultCollection::new();
        for combination in sweep.expand() {
            let interface = combination[INTERFACE].to_string();
            let peer = combination[PEER].to_string();
            for workload in &workloads {
                match workload {
                    Workload::Iperf => {
                        for threads in self.config.threads.as_slice() {
                            results.push(self.iperf(&interface, &peer, *threads));
                        }
                    }
                    Workload::Ping => results.push(self.ping(&peer)),
                    Workload::Hping3 => results.push(self.hping3(&peer)),
                }
            }
        }
        results
    }
}
