mod config;
mod console;

use std::{
    fs::File,
    io::{self, BufReader},
    path::PathBuf,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use imaging::{normalize, JsonVolumeSource, VolumeSource};
use positioning::{KinematicMapper, PositionCommitProtocol, SimulatedActuator};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::console::Console;

#[derive(Parser, Debug)]
#[command(name = "workstation", about = "Positioning bench for the therapy workstation")]
struct Cli {
    /// Settings file; defaults to ./workstation.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides the configured arm length, in millimeters.
    #[arg(long, global = true)]
    arm_length: Option<f64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a scan and report how it will be displayed.
    Orient {
        #[arg(long)]
        volume: PathBuf,
    },
    /// Show the actuator coordinates for a typed image-space pose.
    Preview {
        #[arg(long, allow_hyphen_values = true)]
        x: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        y: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        z: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        phi: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        theta: Option<String>,
    },
    /// Drive the simulated hexapod from stdin or a command script.
    Session {
        #[arg(long)]
        script: Option<PathBuf>,
        /// Scan to pick targets from.
        #[arg(long)]
        volume: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = config::load_settings(cli.config.as_deref());
    if let Some(arm_length) = cli.arm_length {
        settings.arm_length_mm = arm_length;
    }
    config::validate(&settings)?;
    let mapper = KinematicMapper::new(settings.arm_length_mm);

    match cli.command {
        Command::Orient { volume } => {
            let loaded = JsonVolumeSource.load(&volume)?;
            let image = normalize(&loaded.volume, loaded.axes);
            println!("title: {}", image.title);
            println!("x axis: {}", image.x_label);
            println!("y axis: {}", image.y_label);
            println!("shape: {:?}", image.shape());
            match image.intensity_range() {
                Some((lo, hi)) => println!("intensity: {lo} .. {hi}"),
                None => println!("intensity: empty"),
            }
        }
        Command::Preview {
            x,
            y,
            z,
            phi,
            theta,
        } => {
            console::render_preview(
                mapper,
                settings.default_theta_deg,
                [x, y, z, phi, theta],
                &mut io::stdout().lock(),
            )?;
        }
        Command::Session { script, volume } => {
            let (actuator, _hexapod) =
                SimulatedActuator::new(Duration::from_millis(settings.actuator_latency_ms));
            let protocol = PositionCommitProtocol::new(mapper, actuator);
            info!(
                arm_length_mm = settings.arm_length_mm,
                experiments_dir = %settings.experiments_dir.display(),
                "starting positioning session"
            );
            let mut console = Console::new(protocol, settings);
            if let Some(path) = volume {
                let loaded = JsonVolumeSource.load(&path)?;
                console = console.with_image(normalize(&loaded.volume, loaded.axes));
            }
            let mut stdout = io::stdout().lock();
            match script {
                Some(path) => {
                    let file = File::open(&path)
                        .with_context(|| format!("failed to open script '{}'", path.display()))?;
                    console.run(BufReader::new(file), &mut stdout)?;
                }
                None => console.run(io::stdin().lock(), &mut stdout)?,
            }
        }
    }

    Ok(())
}
