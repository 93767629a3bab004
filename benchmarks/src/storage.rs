// Copyright © 2026 The node-bench Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! `sysbench fileio` sweeps over block devices.
//!
//! Every device is mounted once before the sweep starts, and every
//! combination then goes through prepare, run and cleanup with the mount
//! point as working directory. Only the run phase is recorded.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use bench_infra::{Executor, ToolCommand};
use serde::{Deserialize, Serialize};

use crate::mount::{MountManager, DEFAULT_MOUNT_BASE};
use crate::record::{Record, ResultCollection};
use crate::sweep::{Combination, OneOrMany, Sweep};

const DISK: &str = "disk";
const BLOCKSIZE: &str = "blocksize";
const WORKLOAD: &str = "workload";
const THREADS: &str = "threads";
const FLAGS: &str = "flags";

#[derive(Deserialize)]
#[serde(untagged)]
enum DiskRepr {
    Path(String),
    Object { path: String },
}

/// A block device, written in config either as `"/dev/sdb"` or as
/// `{"path": "/dev/sdb"}`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "DiskRepr")]
pub struct Disk {
    pub path: String,
}

impl From<DiskRepr> for Disk {
    fn from(repr: DiskRepr) -> Self {
        match repr {
            DiskRepr::Path(path) | DiskRepr::Object { path } => Disk { path },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FileFlagsRepr {
    Flags(String),
    Object {
        #[serde(rename = "file-extra-flags")]
        file_extra_flags: String,
    },
}

/// Value of `--file-extra-flags`, written as `"dsync"` or as
/// `{"file-extra-flags": "dsync"}`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "FileFlagsRepr")]
pub struct FileFlags {
    #[serde(rename = "file-extra-flags")]
    pub file_extra_flags: String,
}

impl From<FileFlagsRepr> for FileFlags {
    fn from(repr: FileFlagsRepr) -> Self {
        match repr {
            FileFlagsRepr::Flags(file_extra_flags)
            | FileFlagsRepr::Object { file_extra_flags } => FileFlags { file_extra_flags },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub disks: OneOrMany<Disk>,
    pub blocksizes: OneOrMany<String>,
    pub workloads: OneOrMany<String>,
    pub threads: OneOrMany<u32>,
    pub flags: OneOrMany<FileFlags>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Prepare,
    Run,
    Cleanup,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Phase::Prepare => write!(f, "prepare"),
            Phase::Run => write!(f, "run"),
            Phase::Cleanup => write!(f, "cleanup"),
        }
    }
}

pub struct StorageBenchmarker<'a, E: Executor + ?Sized> {
    config: StorageConfig,
    executor: &'a E,
    mount_base: PathBuf,
}

impl<'a, E: Executor + ?Sized> StorageBenchmarker<'a, E> {
    pub fn new(config: StorageConfig, executor: &'a E) -> Self {
        StorageBenchmarker {
            config,
            executor,
            mount_base: PathBuf::from(DEFAULT_MOUNT_BASE),
        }
    }

    pub fn with_mount_base<P: Into<PathBuf>>(mut self, mount_base: P) -> Self {
        self.mount_base = mount_base.into();
        self
    }

    fn sweep(&self) -> Sweep {
        let c = &self.config;
        Sweep::new()
            .axis(DISK, c.disks.as_slice().iter().map(|d| d.path.as_str()))
            .axis(BLOCKSIZE, c.blocksizes.to_vec())
            .axis(WORKLOAD, c.workloads.to_vec())
            .axis(THREADS, c.threads.to_vec())
            .axis(
                FLAGS,
                c.flags
                    .as_slice()
                    .iter()
                    .map(|f| f.file_extra_flags.as_str()),
            )
    }

    fn command(phase: Phase, combination: &Combination, workdir: Option<&Path>) -> ToolCommand {
        let mut cmd = ToolCommand::new("sysbench");
        cmd.arg(format!("--file-block-size={}", combination[BLOCKSIZE]))
            .arg(format!("--file-test-mode={}", combination[WORKLOAD]))
            .arg(format!("--threads={}", combination[THREADS]))
            .arg(format!("--file-extra-flags={}", combination[FLAGS]))
            .arg("fileio")
            .arg(phase.to_string());
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Prepare and cleanup are best effort: the test files may already
    /// exist, or already be gone.
    fn best_effort(&self, phase: Phase, combination: &Combination, workdir: Option<&Path>) {
        if let Err(e) = self
            .executor
            .run(&Self::command(phase, combination, workdir))
        {
            warn!("Error during sysbench {phase} on {}: {e}", combination[DISK]);
        }
    }

    fn run_phase(&self, combination: &Combination, workdir: Option<&Path>) -> Record {
        let output = match self
            .executor
            .run(&Self::command(Phase::Run, combination, workdir))
        {
            Ok(output) => output.stdout,
            Err(e) => {
                warn!("Error while running sysbench on {}: {e}", combination[DISK]);
                e.output_text()
            }
        };

        let mut record = Record::from_sysbench_output(&output);
        record.extend(combination.iter().map(|(k, v)| (k, v.clone())));
        record
    }

    fn run_combination(&self, combination: &Combination, workdir: Option<&Path>) -> Record {
        info!(
            "Running sysbench fileio on {}: blocksize={} workload={} threads={} flags={}",
            combination[DISK],
            combination[BLOCKSIZE],
            combination[WORKLOAD],
            combination[THREADS],
            combination[FLAGS]
        );
        self.best_effort(Phase::Prepare, combination, workdir);
        let record = self.run_phase(combination, workdir);
        self.best_effort(Phase::Cleanup, combination, workdir);
        record
    }

    /// Where the file I/O runs of a device left on its raw path end up: the
    /// directory this process runs in.
    fn fallback_dir() -> String {
        match std::env::current_dir() {
            Ok(dir) => dir.display().to_string(),
            Err(_) => "the current directory".to_string(),
        }
    }

    /// Mounts every disk, runs the whole sweep, then unmounts. The unmount
    /// happens even if a combination panics.
    pub fn run(&self) -> ResultCollection {
        let mut mounts = MountManager::new(self.executor, &self.mount_base);
        let mut targets: HashMap<String, PathBuf> = HashMap::new();
        for disk in self.config.disks.as_slice() {
            if !targets.contains_key(&disk.path) {
                let target = mounts.mount(&disk.path);
                if target == Path::new(&disk.path) {
                    warn!(
                        "{} is not mounted, its sysbench fileio runs test {} and not the device",
                        disk.path,
                        Self::fallback_dir()
                    );
                }
                targets.insert(disk.path.clone(), target);
            }
        }

        let mut results = ResultCollection::new();
        for combination in self.sweep().expand() {
            let device = combination[DISK].to_string();
            // A device that fell back to its raw path has no directory to
            // work in.
            let workdir = targets
                .get(&device)
                .map(PathBuf::as_path)
                .filter(|t| *t != Path::new(&device));
            results.push(self.run_combination(&combination, workdir));
        }

        drop(mounts);
        results
    }
}

#[cfg(test)]
mod tests {
    use bench_infra::mock::ScriptedExecutor;
    use bench_infra::{ExecError, ToolOutput};
    use vmm_sys_util::tempdir::TempDir;

    use super::*;
    use crate::record::Value;

    const STDOUT: &str = "
        File operations:
            reads/s:                      0.00
            writes/s:                     29718.09
            fsyncs/s:                     1191.86

        Throughput:
            read, MiB/s:                  0.00
            written, MiB/s:               116.09

        General statistics:
            total time:                          10.0009s
            total number of events:              309103

        Latency (ms):
             min:                                    0.00
             avg:                                    0.26
             max:                                    8.15
             95th percentile:                        0.00
             sum:                                79932.20
        ";

    /// Devices are never mounted yet, `sysbench ... run` prints `STDOUT`,
    /// everything else succeeds silently.
    fn host() -> ScriptedExecutor {
        ScriptedExecutor::responding(|c| {
            match (c.get_program(), c.get_args().last().map(String::as_str)) {
                ("mountpoint", _) => Ok(ToolOutput::failed(1, "")),
                ("sysbench", Some("run")) => Ok(ToolOutput::ok(STDOUT)),
                _ => Ok(ToolOutput::ok("")),
            }
        })
    }

    fn config(json: &str) -> StorageConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_single_combination_end_to_end() {
        let tmp_dir = TempDir::new_with_prefix("/tmp/node-bench-storage").unwrap();
        let executor = host();
        let runner = StorageBenchmarker::new(
            config(
                r#"{"disks": ["/dev/x"], "blocksizes": ["4k"], "workloads": ["seqwr"],
                    "threads": [4], "flags": [{"file-extra-flags": "dsync"}]}"#,
            ),
            &executor,
        )
        .with_mount_base(tmp_dir.as_path());
        let results = runner.run();

        let mount_point = tmp_dir.as_path().join("x");
        let sysbench = |phase: &str| {
            format!(
                "sysbench --file-block-size=4k --file-test-mode=seqwr --threads=4 \
                 --file-extra-flags=dsync fileio {phase}"
            )
        };
        assert_eq!(
            executor.command_lines(),
            vec![
                format!("mountpoint -q {}", mount_point.display()),
                "mkfs.ext4 -F /dev/x".to_string(),
                format!("mount /dev/x {}", mount_point.display()),
                sysbench("prepare"),
                sysbench("run"),
                sysbench("cleanup"),
                format!("umount {}", mount_point.display()),
            ]
        );
        for call in &executor.calls()[3..6] {
            assert_eq!(call.get_current_dir(), Some(mount_point.as_path()));
        }

        assert_eq!(results.len(), 1);
        let record = &results.records()[0];
        assert_eq!(record.get("disk"), Some(&Value::from("/dev/x")));
        assert_eq!(record.get("blocksize"), Some(&Value::from("4k")));
        assert_eq!(record.get("workload"), Some(&Value::from("seqwr")));
        assert_eq!(record.get("threads"), Some(&Value::Int(4)));
        assert_eq!(record.get("flags"), Some(&Value::from("dsync")));
        assert_eq!(record.get("writes/s"), Some(&Value::Float(29718.09)));
        assert_eq!(record.get("latency_max"), Some(&Value::Float(8.15)));
        assert_eq!(record.len(), 12 + 5);
    }

    #[test]
    fn test_full_sweep_call_count() {
        let tmp_dir = TempDir::new_with_prefix("/tmp/node-bench-storage").unwrap();
        let executor = host();
        let config = config(
            r#"{"disks": [{"path": "/dev/nvme2n1"}],
                "blocksizes": ["4k", "16k", "128k"],
                "workloads": ["seqwr", "rndrd"],
                "threads": [4, 8],
                "flags": [{"file-extra-flags": "dsync"}]}"#,
        );
        let results = StorageBenchmarker::new(config, &executor)
            .with_mount_base(tmp_dir.as_path())
            .run();

        let combinations = 3 * 2 * 2;
        assert_eq!(results.len(), combinations);
        // probe + mkfs + mount, three sysbench phases per combination, umount.
        assert_eq!(executor.call_count(), 3 + combinations * 3 + 1);
        let order: Vec<(String, String)> = results
            .iter()
            .map(|r| {
                (
                    r.get("blocksize").unwrap().to_string(),
                    r.get("threads").unwrap().to_string(),
                )
            })
            .take(3)
            .collect();
        assert_eq!(
            order,
            vec![
                ("4k".to_string(), "4".to_string()),
                ("4k".to_string(), "8".to_string()),
                ("4k".to_string(), "4".to_string()),
            ]
        );
    }

    #[test]
    fn test_phase_failures_do_not_stop_the_sweep() {
        let tmp_dir = TempDir::new_with_prefix("/tmp/node-bench-storage").unwrap();
        let executor = ScriptedExecutor::responding(|c| match c.get_program() {
            "mountpoint" => Ok(ToolOutput::failed(1, "")),
            "sysbench" => Err(ExecError::Spawn(
                c.to_string(),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            )),
            _ => Ok(ToolOutput::ok("")),
        });
        let results = StorageBenchmarker::new(
            config(
                r#"{"disks": ["/dev/sdb"], "blocksizes": "4k", "workloads": ["seqwr", "seqrd"],
                    "threads": 1, "flags": "dsync"}"#,
            ),
            &executor,
        )
        .with_mount_base(tmp_dir.as_path())
        .run();

        assert_eq!(results.len(), 2);
        for record in &results {
            assert_eq!(
                record.columns().collect::<Vec<_>>(),
                vec!["disk", "blocksize", "workload", "threads", "flags"]
            );
        }
        assert!(executor
            .command_lines()
            .last()
            .unwrap()
            .starts_with("umount"));
    }

    #[test]
    fn test_raw_device_fallback_has_no_workdir() {
        let executor = ScriptedExecutor::responding(|c| match c.get_program() {
            "mountpoint" | "mount" => Ok(ToolOutput::failed(32, "")),
            _ => Ok(ToolOutput::ok("")),
        });
        let tmp_dir = TempDir::new_with_prefix("/tmp/node-bench-storage").unwrap();
        let results = StorageBenchmarker::new(
            config(
                r#"{"disks": ["/dev/sdc"], "blocksizes": ["1M"], "workloads": ["rndrw"],
                    "threads": [2], "flags": ["direct"]}"#,
            ),
            &executor,
        )
        .with_mount_base(tmp_dir.as_path())
        .run();

        assert_eq!(results.len(), 1);
        let calls = executor.calls();
        let sysbench: Vec<_> = calls
            .iter()
            .filter(|c| c.get_program() == "sysbench")
            .collect();
        assert_eq!(sysbench.len(), 3);
        assert!(sysbench.iter().all(|c| c.get_current_dir().is_none()));
        assert!(!calls.iter().any(|c| c.get_program() == "umount"));

        // The runs land in the process working directory, which is what the
        // fallback warning names.
        assert_eq!(
            StorageBenchmarker::<ScriptedExecutor>::fallback_dir(),
            std::env::current_dir().unwrap().display().to_string()
        );
    }

    #[test]
    fn test_unmount_on_panic() {
        let tmp_dir = TempDir::new_with_prefix("/tmp/node-bench-storage").unwrap();
        let executor = ScriptedExecutor::responding(|c| match c.get_program() {
            "mountpoint" => Ok(ToolOutput::failed(1, "")),
            "sysbench" => panic!("sysbench blew up"),
            _ => Ok(ToolOutput::ok("")),
        });
        let runner = StorageBenchmarker::new(
            config(
                r#"{"disks": ["/dev/sdd"], "blocksizes": ["4k"], "workloads": ["seqwr"],
                    "threads": [1], "flags": ["dsync"]}"#,
            ),
            &executor,
        )
        .with_mount_base(tmp_dir.as_path());

        let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| runner.run()));
        assert!(r.is_err());
        assert_eq!(
            executor.command_lines().last().unwrap(),
            &format!("umount {}", tmp_dir.as_path().join("sdd").display())
        );
    }
}
