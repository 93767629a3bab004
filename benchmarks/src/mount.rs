// Copyright © 2026 The node-bench Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Mount lifecycle for the block devices under storage test.
//!
//! Devices are formatted and mounted below a common base directory before
//! the sweep and unmounted when the [`MountManager`] goes away. Nothing in
//! here is fatal: a device that cannot be mounted is benchmarked through
//! its raw path instead.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bench_infra::{ExecError, Executor, ToolCommand};
use thiserror::Error;

pub const DEFAULT_MOUNT_BASE: &str = "/mnt/benchmark";

#[derive(Error, Debug)]
pub enum MountError {
    #[error("creating mount point {0} failed")]
    CreateDir(PathBuf, #[source] io::Error),
    #[error("creating a filesystem on {0} failed")]
    Mkfs(String, #[source] ExecError),
    #[error("mounting {0} on {1} failed")]
    Mount(String, PathBuf, #[source] ExecError),
    #[error("unmounting {0} failed")]
    Unmount(PathBuf, #[source] ExecError),
}

/// Formats `e` with its whole source chain.
fn chain(e: &dyn std::error::Error) -> String {
    let mut s = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        s.push_str(&format!(": {cause}"));
        source = cause.source();
    }
    s
}

pub struct MountManager<'a, E: Executor + ?Sized> {
    executor: &'a E,
    mount_base: PathBuf,
    // device path -> mount point
    mount_points: BTreeMap<String, PathBuf>,
}

impl<'a, E: Executor + ?Sized> MountManager<'a, E> {
    pub fn new<P: Into<PathBuf>>(executor: &'a E, mount_base: P) -> Self {
        MountManager {
            executor,
            mount_base: mount_base.into(),
            mount_points: BTreeMap::new(),
        }
    }

    pub fn mount_base(&self) -> &Path {
        &self.mount_base
    }

    /// Devices currently bound to a mount point.
    pub fn mount_points(&self) -> &BTreeMap<String, PathBuf> {
        &self.mount_points
    }

    /// `<mount base>/<device file name>`, e.g. `/mnt/benchmark/nvme0n1`.
    pub fn mount_point_for(&self, device: &str) -> PathBuf {
        let name = Path::new(device)
            .file_name()
            .map_or_else(|| device.into(), |n| n.to_os_string());
        self.mount_base.join(name)
    }

    /// Returns the path the device should be benchmarked at: its mount point,
    /// or the raw device path if it could not be mounted.
    pub fn mount(&mut self, device: &str) -> PathBuf {
        match self.try_mount(device) {
            Ok(mount_point) => {
                self.mount_points
                    .insert(device.to_string(), mount_point.clone());
                mount_point
            }
            Err(e) => {
                warn!("{}; using raw device {device}", chain(&e));
                PathBuf::from(device)
            }
        }
    }

    fn is_mounted(&self, mount_point: &Path) -> bool {
        let mut cmd = ToolCommand::new("mountpoint");
        cmd.arg("-q").arg(mount_point.to_string_lossy());
        match self.executor.output(&cmd) {
            Ok(output) => output.success(),
            Err(e) => {
                debug!("Probing {} failed: {e}", mount_point.display());
                false
            }
        }
    }

    fn try_mount(&self, device: &str) -> Result<PathBuf, MountError> {
        let mount_point = self.mount_point_for(device);
        if self.is_mounted(&mount_point) {
            info!("{} is already mounted", mount_point.display());
            return Ok(mount_point);
        }

        fs::create_dir_all(&mount_point)
            .map_err(|e| MountError::CreateDir(mount_point.clone(), e))?;

        let mut mkfs = ToolCommand::new("mkfs.ext4");
        mkfs.args(["-F", device]);
        if let Err(e) = self.executor.run(&mkfs) {
            // Usually the filesystem is already there.
            info!("{}", chain(&MountError::Mkfs(device.to_string(), e)));
        }

        let mut mount = ToolCommand::new("mount");
        mount.arg(device).arg(mount_point.to_string_lossy());
        self.executor
            .run(&mount)
            .map_err(|e| MountError::Mount(device.to_string(), mount_point.clone(), e))?;

        info!("Mounted {device} on {}", mount_point.display());
        Ok(mount_point)
    }

    /// Unmounts `mount_point` if it lives under the mount base. Raw device
    /// paths handed out as a fallback are left alone.
    pub fn unmount(&mut self, mount_point: &Path) {
        self.mount_points.retain(|_, mp| mp.as_path() != mount_point);
        if !mount_point.starts_with(&self.mount_base) {
            debug!("Not unmounting {}", mount_point.display());
            return;
        }

        let mut cmd = ToolCommand::new("umount");
        cmd.arg(mount_point.to_string_lossy());
        match self.executor.run(&cmd) {
            Ok(_) => info!("Unmounted {}", mount_point.display()),
            Err(e) => warn!(
                "{}",
                chain(&MountError::Unmount(mount_point.to_path_buf(), e))
            ),
        }
    }

    pub fn unmount_all(&mut self) {
        let mut mount_points: Vec<PathBuf> =
            std::mem::take(&mut self.mount_points).into_values().collect();
        mount_points.sort();
        mount_points.dedup();
        for mount_point in mount_points {
            self.unmount(&mount_point);
        }
    }
}

impl<E: Executor + ?Sized> Drop for MountManager<'_, E> {
    fn drop(&mut self) {
        self.unmount_all();
    }
}
