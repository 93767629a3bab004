// Copyright © 2026 The node-bench Authors
//
// SPDX-License-Identifier: Apache-2.0
//

#[macro_use]
extern crate log;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::Context;
use bench_infra::HostExecutor;
use benchmarks::config::{load_json, MetricsTemplate, NodeConfig, Resources};
use benchmarks::mount::DEFAULT_MOUNT_BASE;
use benchmarks::{
    CpuBenchmarker, NetworkBenchmarker, Report, ResultCollection, StorageBenchmarker,
};
use clap::{value_parser, Arg, ArgMatches, Command};
use env_logger::Env;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Benchmark {
    Cpu,
    Storage,
    Network,
}

impl Benchmark {
    /// Execution order, whatever order they were asked for in.
    const ALL: [Benchmark; 3] = [Benchmark::Cpu, Benchmark::Storage, Benchmark::Network];
}

fn parse_benchmark(s: &str) -> Result<Benchmark, String> {
    match s {
        "cpu" => Ok(Benchmark::Cpu),
        "storage" => Ok(Benchmark::Storage),
        "network" => Ok(Benchmark::Network),
        _ => Err(format!("expected one of cpu, storage, network, got '{s}'")),
    }
}

fn create_app() -> Command {
    Command::new("node-bench")
        .version(env!("BUILD_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Run CPU, storage and network benchmarks on this node.")
        .arg(
            Arg::new("resources")
                .long("resources")
                .help("Fleet description: nodes with their disks and network interfaces")
                .num_args(1)
                .value_parser(value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("metrics")
                .long("metrics")
                .help("Benchmark parameters shared by every node")
                .num_args(1)
                .value_parser(value_parser!(PathBuf))
                .default_value("metrics.json"),
        )
        .arg(
            Arg::new("node-name")
                .long("node-name")
                .help("Name of this node in the resources file")
                .num_args(1)
                .env("NODE_NAME")
                .required(true),
        )
        .arg(
            Arg::new("report-file")
                .long("report-file")
                .help("Where to write the CSV report")
                .num_args(1)
                .value_parser(value_parser!(PathBuf))
                .default_value("results.csv"),
        )
        .arg(
            Arg::new("mount-base")
                .long("mount-base")
                .help("Directory the benchmarked disks are mounted under")
                .num_args(1)
                .value_parser(value_parser!(PathBuf))
                .default_value(DEFAULT_MOUNT_BASE),
        )
        .arg(
            Arg::new("benchmarks")
                .long("benchmarks")
                .help("Comma separated benchmarks to run: cpu, storage, network")
                .num_args(1)
                .value_delimiter(',')
                .value_parser(parse_benchmark)
                .default_values(["cpu", "storage"]),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .help("Kill any benchmark tool still running after this many seconds")
                .num_args(1)
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("network-delay")
                .long("network-delay")
                .help("Seconds to pause after each network test")
                .num_args(1)
                .value_parser(value_parser!(u64))
                .default_value("5"),
        )
}

fn selected_benchmarks(matches: &ArgMatches) -> Vec<Benchmark> {
    let requested: Vec<Benchmark> = matches
        .get_many::<Benchmark>("benchmarks")
        .map(|b| b.copied().collect())
        .unwrap_or_default();
    Benchmark::ALL
        .into_iter()
        .filter(|b| requested.contains(b))
        .collect()
}

fn node_config(matches: &ArgMatches) -> anyhow::Result<NodeConfig> {
    // Arguments with a default value or marked as required are always there.
    let resources_path = matches.get_one::<PathBuf>("resources").unwrap();
    let metrics_path = matches.get_one::<PathBuf>("metrics").unwrap();
    let node_name = matches.get_one::<String>("node-name").unwrap();

    let resources: Resources = load_json(resources_path)?;
    let template: MetricsTemplate = load_json(metrics_path)?;
    debug!("Resources: {resources:?}");
    debug!("Metrics: {template:?}");

    let config = NodeConfig::derive(&template, &resources, node_name)
        .context("Error deriving the node configuration")?;
    info!(
        "Running benchmarks on {node_name} with: {}",
        serde_json::to_string(&config)?
    );
    Ok(config)
}

fn write_report(report: &Report, path: &Path) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Error creating report file {}", path.display()))?;
    report
        .write_csv(BufWriter::new(file))
        .with_context(|| format!("Error writing report file {}", path.display()))
}

fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    let config = node_config(matches)?;
    let timeout = matches.get_one::<u64>("timeout").copied();
    let executor = HostExecutor::new(timeout.map(Duration::from_secs));

    let mut collections: Vec<ResultCollection> = Vec::new();
    for benchmark in selected_benchmarks(matches) {
        info!("Running {benchmark:?} benchmark");
        let results = match benchmark {
            Benchmark::Cpu => CpuBenchmarker::new(config.cpu.clone(), &executor).run(),
            Benchmark::Storage if !config.has_storage() => {
                info!("No disks to benchmark, skipping storage");
                continue;
            }
            Benchmark::Storage => {
                let mount_base = matches.get_one::<PathBuf>("mount-base").unwrap();
                StorageBenchmarker::new(config.storage.clone(), &executor)
                    .with_mount_base(mount_base)
                    .run()
            }
            Benchmark::Network => {
                let delay = *matches.get_one::<u64>("network-delay").unwrap();
                NetworkBenchmarker::new(config.network.clone(), &executor)
                    .with_delay(Duration::from_secs(delay))
                    .run()
            }
        };
        info!("{benchmark:?} benchmark produced {} rows", results.len());
        collections.push(results);
    }

    let report = Report::new(collections).context("Error aggregating results")?;
    write_report(&report, matches.get_one::<PathBuf>("report-file").unwrap())?;
    info!("Results:\n{report}");
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let matches = create_app().get_matches();
    if let Err(e) = run(&matches) {
        error!("{e:#}");
        process::exit(1);
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    fn matches(args: &[&str]) -> Result<ArgMatches, clap::Error> {
        create_app().try_get_matches_from(
            ["node-bench", "--node-name", "node1"]
                .into_iter()
                .chain(args.iter().copied()),
        )
    }

    #[test]
    fn test_defaults() {
        let m = matches(&["--resources", "resources.json"]).unwrap();
        assert_eq!(
            m.get_one::<PathBuf>("metrics").unwrap(),
            Path::new("metrics.json")
        );
        assert_eq!(
            m.get_one::<PathBuf>("report-file").unwrap(),
            Path::new("results.csv")
        );
        assert_eq!(
            m.get_one::<PathBuf>("mount-base").unwrap(),
            Path::new("/mnt/benchmark")
        );
        assert_eq!(m.get_one::<u64>("network-delay"), Some(&5));
        assert_eq!(m.get_one::<u64>("timeout"), None);
        assert_eq!(m.get_one::<String>("node-name").unwrap(), "node1");
        assert_eq!(
            selected_benchmarks(&m),
            vec![Benchmark::Cpu, Benchmark::Storage]
        );
    }

    #[test]
    fn test_benchmark_selection() {
        let m = matches(&["--resources", "r.json", "--benchmarks", "network,cpu,cpu"]).unwrap();
        assert_eq!(
            selected_benchmarks(&m),
            vec![Benchmark::Cpu, Benchmark::Network]
        );

        assert!(matches(&["--resources", "r.json", "--benchmarks", "gpu"]).is_err());
    }

    #[test]
    fn test_resources_required() {
        assert!(matches(&[]).is_err());
        assert!(matches(&["--resources", "r.json", "--timeout", "soon"]).is_err());
    }
}
