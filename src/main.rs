use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use flatfs::config::Config;
use flatfs::consts::{BLOCK_SIZE, SECTOR_SIZE};
use flatfs::driver::file_drive::FileDrive;
use flatfs::util::format::pretty_size_from_bytes;
use flatfs::FlatFS;

#[derive(Parser)]
#[command(name = "flatfs", version, about = "Flat block-image file system")]
struct Cli {
    /// YAML configuration file (defaults to ./flatfs.yml when present).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create and format a new image file.
    Format(FormatArgs),
    /// Mount an image through FUSE.
    Mount(MountArgs),
    /// Print the superblock and usage of an image.
    Info(InfoArgs),
}

#[derive(Args)]
struct FormatArgs {
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Size of the volume in blocks.
    #[arg(long)]
    blocks: Option<u32>,

    /// Number of inodes, including the two reserved ones.
    #[arg(long)]
    inodes: Option<u32>,
}

#[derive(Args)]
struct MountArgs {
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    #[arg(value_name = "MOUNT_POINT")]
    mount_point: PathBuf,

    #[arg(long)]
    fs_name: Option<String>,

    #[arg(long)]
    allow_root: bool,

    #[arg(long)]
    auto_unmount: bool,
}

#[derive(Args)]
struct InfoArgs {
    #[arg(value_name = "IMAGE")]
    image: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "flatfs=info".to_string()))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    match cli.cmd {
        Command::Format(args) => {
            if let Some(blocks) = args.blocks {
                config.volume.block_count = blocks;
            }
            if let Some(inodes) = args.inodes {
                config.volume.inode_count = inodes;
            }
            config.validate()?;
            format_cmd(args.image, &config)
        }
        Command::Mount(args) => {
            if let Some(name) = args.fs_name.clone() {
                config.mount.fs_name = name;
            }
            config.mount.allow_root |= args.allow_root;
            config.mount.auto_unmount |= args.auto_unmount;
            config.validate()?;
            mount_cmd(args, &config)
        }
        Command::Info(args) => info_cmd(args.image),
    }
}

fn format_cmd(image: PathBuf, config: &Config) -> anyhow::Result<()> {
    let bytes = config.volume.block_count as u64 * BLOCK_SIZE as u64;
    let drive = FileDrive::create(&image, bytes, SECTOR_SIZE)
        .with_context(|| format!("cannot create {}", image.display()))?;
    let fs = FlatFS::format(drive, config.volume.inode_count)?;
    let stats = fs.stats()?;
    fs.unmount()?;
    println!(
        "formatted {}: {} blocks ({}), {} inodes",
        image.display(),
        stats.blocks,
        pretty_size_from_bytes(bytes),
        stats.inodes
    );
    Ok(())
}

fn mount_cmd(args: MountArgs, config: &Config) -> anyhow::Result<()> {
    if !args.mount_point.is_dir() {
        anyhow::bail!("mount point must be a directory");
    }
    let drive = FileDrive::open(&args.image, SECTOR_SIZE).with_context(|| format!("cannot open {}", args.image.display()))?;
    let fs = FlatFS::mount(drive)?;
    flatfs::fuse::mount(fs, &args.mount_point, &config.mount)?;
    Ok(())
}

fn info_cmd(image: PathBuf) -> anyhow::Result<()> {
    let drive = FileDrive::open(&image, SECTOR_SIZE).with_context(|| format!("cannot open {}", image.display()))?;
    let fs = FlatFS::mount(drive)?;
    let superblock = fs.volume().superblock;
    let stats = fs.stats()?;
    let block_bytes = |blocks: u32| pretty_size_from_bytes(blocks as u64 * stats.block_size as u64);

    println!("magic:             {:#010x}", superblock.magic);
    println!("block size:        {}", stats.block_size);
    println!("blocks:            {} ({})", stats.blocks, block_bytes(stats.blocks));
    println!("free blocks:       {} ({})", stats.free_blocks, block_bytes(stats.free_blocks));
    println!("first inode block: {}", superblock.first_inode_block);
    println!("first data block:  {}", superblock.first_data_block());
    println!("inodes:            {} ({} free)", stats.inodes, stats.free_inodes);
    fs.unmount()?;
    Ok(())
}
