use clap::Parser;
use splatpack_lib::buffer::{HostAllocator, HostBuffer, PackBuffer};
use splatpack_lib::{load_file, load_file_async, PointCloud};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "PLY Splat Packer",
    version = "1.0",
    author = "Denis Avvakumov",
    about = "Packs Gaussian splat PLY files into half-precision GPU buffers"
)]
struct Cli {
    #[arg(
        short = 'i',
        long = "input",
        value_name = "INPUT",
        required = true,
        help = "Path to the input PLY file."
    )]
    input: PathBuf,

    #[arg(
        short = 'o',
        long = "output-dir",
        value_name = "OUTPUT_DIR",
        help = "Directory for the packed buffers. Nothing is written when omitted."
    )]
    output_dir: Option<PathBuf>,

    #[arg(
        short = 'm',
        long = "max-buffer-size",
        value_name = "BYTES",
        help = "Fail when a single buffer would exceed this many bytes."
    )]
    max_buffer_size: Option<u64>,

    #[arg(
        short = 'a',
        long = "async",
        default_value = "false",
        help = "Read the input file asynchronously."
    )]
    async_mode: bool,

    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase log verbosity (-v debug, -vv trace)."
    )]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn write_buffers(dir: &Path, cloud: &PointCloud<HostBuffer>) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    for (name, buffer) in [
        ("gaussian_3d.bin", &cloud.gaussian_3d_buffer),
        ("sh.bin", &cloud.sh_buffer),
        ("splat_2d.bin", &cloud.splat_2d_buffer),
    ] {
        let path = dir.join(name);
        fs::write(&path, buffer.as_bytes())?;
        info!(bytes = buffer.size(), path = %path.display(), "wrote buffer");
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let allocator = match cli.max_buffer_size {
        Some(max) => HostAllocator::with_max_buffer_size(max),
        None => HostAllocator::new(),
    };

    let mode = if cli.async_mode {
        "Asynchronous"
    } else {
        "Synchronous"
    };
    info!(mode, input = %cli.input.display(), "loading point cloud");

    let start = Instant::now();

    let result = if cli.async_mode {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(load_file_async(&cli.input, &allocator))
    } else {
        load_file(&cli.input, &allocator)
    };
    let cloud = result.unwrap_or_else(|e| {
        error!(input = %cli.input.display(), "failed to load point cloud: {}", e);
        process::exit(1);
    });

    let elapsed = start.elapsed().as_millis();
    info!(
        points = cloud.num_points,
        sh_degree = cloud.sh_degree,
        elapsed_ms = elapsed as u64,
        "loaded point cloud"
    );

    if let Some(dir) = &cli.output_dir {
        write_buffers(dir, &cloud).unwrap_or_else(|e| {
            error!(output = %dir.display(), "failed to write buffers: {}", e);
            process::exit(1);
        });
        info!(output = %dir.display(), "successfully wrote buffers");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use splatpack_lib::load;

    #[test]
    fn test_write_buffers() {
        let raw_ply = b"ply
format binary_little_endian 1.0
element vertex 0
property float x
property float y
property float z
property float opacity
property float scale_0
property float scale_1
property float scale_2
property float rot_0
property float rot_1
property float rot_2
property float rot_3
property float f_dc_0
property float f_dc_1
property float f_dc_2
end_header
";
        let cloud = load(raw_ply, &HostAllocator::new()).expect("load(...) failed");
        let dir = std::env::temp_dir().join(format!("splatpack_cli_{}", process::id()));

        write_buffers(&dir, &cloud).expect("write_buffers failed");
        for name in ["gaussian_3d.bin", "sh.bin", "splat_2d.bin"] {
            let written = fs::read(dir.join(name)).expect("buffer file missing");
            assert!(written.is_empty());
        }

        fs::remove_dir_all(&dir).ok();
    }
}
