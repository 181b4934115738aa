use std::io;
use std::path::Path;

use fuser::MountOption;
use tracing::info;

use crate::config::MountConfig;
use crate::driver::DeviceDriver;
use crate::ops::FlatFS;

pub mod filesystem;

pub use filesystem::FuseDriver;

pub fn mount_options(config: &MountConfig) -> Vec<MountOption> {
    let mut options = vec![MountOption::FSName(config.fs_name.clone()), MountOption::DefaultPermissions];
    if config.allow_root {
        options.push(MountOption::AllowRoot);
    }
    if config.auto_unmount {
        options.push(MountOption::AutoUnmount);
    }
    options
}

/// Serves `fs` at `mountpoint` until the file system is unmounted.
pub fn mount<A: DeviceDriver, P: AsRef<Path>>(fs: FlatFS<A>, mountpoint: P, config: &MountConfig) -> io::Result<()> {
    info!(mountpoint = %mountpoint.as_ref().display(), fs_name = %config.fs_name, "mounting");
    fuser::mount2(FuseDriver::new(fs), mountpoint, &mount_options(config))
}
