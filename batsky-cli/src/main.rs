//!
//! This binary provides a CLI for inspecting Swift/BAT sky-image files.
#![allow(clippy::uninlined_format_args)]

use clap::{Parser, Subcommand};

use batsky_core::{AxisLabel, CoordFrame, Histogram, SkyImage};
use batsky_io::read_sky_image;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] batsky_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] batsky_core::Error),

    #[error("Unknown axis name {0:?}; expected TIME, IMY, IMX, ENERGY, or HPX")]
    UnknownAxis(String),
}

/// Swift/BAT sky-image inspector.
#[derive(Parser)]
#[command(name = "batsky")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a sky image file
    Info {
        /// Input sky image file
        input: PathBuf,
    },

    /// Collapse a sky image onto the listed axes and summarize the result
    Project {
        /// Input sky image file
        input: PathBuf,

        /// Axes to keep, comma separated
        #[arg(short, long, value_delimiter = ',', default_value = "IMY,IMX")]
        axes: Vec<String>,
    },

    /// Reproject a sky image onto a HEALPix grid and summarize the result
    Healpix {
        /// Input sky image file
        input: PathBuf,

        /// HEALPix resolution parameter
        #[arg(long, default_value = "128")]
        nside: usize,

        /// Coordinate frame (icrs or galactic)
        #[arg(long, default_value = "galactic")]
        frame: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input } => {
            let image = read_sky_image(&input)?;
            print_info(&input, &image);
        }

        Commands::Project { input, axes } => {
            let image = read_sky_image(&input)?;
            let keep = axes
                .iter()
                .map(|name| parse_axis(name))
                .collect::<Result<Vec<_>>>()?;
            let projected = image.project(&keep)?;
            println!("Projection onto {}:", axes.join(", "));
            print_summary(&projected);
        }

        Commands::Healpix {
            input,
            nside,
            frame,
        } => {
            let image = read_sky_image(&input)?;
            let frame: CoordFrame = frame.parse().map_err(CliError::Core)?;
            let projected = image.healpix_projection(frame, nside)?;
            println!(
                "HEALPix map: nside {}, frame {}, {} pixels",
                nside,
                frame,
                projected.contents().shape()[1]
            );
            let spatial = projected.project(&[AxisLabel::Healpix])?;
            print_summary(&spatial);
        }
    }

    Ok(())
}

fn parse_axis(name: &str) -> Result<AxisLabel> {
    match name.trim().to_ascii_uppercase().as_str() {
        "TIME" => Ok(AxisLabel::Time),
        "IMY" => Ok(AxisLabel::ImY),
        "IMX" => Ok(AxisLabel::ImX),
        "ENERGY" => Ok(AxisLabel::Energy),
        "HPX" => Ok(AxisLabel::Healpix),
        _ => Err(CliError::UnknownAxis(name.to_string())),
    }
}

fn print_info(input: &std::path::Path, image: &SkyImage) {
    println!("File: {}", input.display());
    println!(
        "Image type: {}",
        image
            .image_type()
            .map_or_else(|| "untagged".to_string(), |ty| ty.to_string())
    );
    println!("Unit: {}", display_unit(image));
    let gti = image.gti();
    println!(
        "GTI: {} - {} s (exposure {} s)",
        gti.start,
        gti.stop,
        image.exposure()
    );
    println!("Shape: {:?}", image.contents().shape());
    if let Some(axis) = image.healpix_axis() {
        println!(
            "Spatial axis: HEALPix nside {} ({})",
            axis.nside(),
            axis.frame()
        );
    } else {
        println!(
            "WCS: {}",
            if image.wcs().is_some() {
                "present"
            } else {
                "absent (detector tangent plane)"
            }
        );
    }
    if image.is_mosaic_intermediate() {
        println!("Mosaic intermediate: yes");
    }
    println!("Energy bands (keV):");
    for band in image.energy_bands() {
        println!("  {:3}  {:9.3} - {:9.3}", band.index, band.e_min, band.e_max);
    }
}

fn print_summary(hist: &Histogram) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut finite = 0usize;
    for &v in hist.contents() {
        if v.is_finite() {
            min = min.min(v);
            max = max.max(v);
            sum += v;
            finite += 1;
        }
    }
    let total = hist.contents().len();
    if finite == 0 {
        println!("  no finite pixels out of {}", total);
        return;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = sum / finite as f64;
    println!("  {} of {} pixels finite", finite, total);
    println!("  min {:.6}  max {:.6}  mean {:.6}", min, max, mean);
}

fn display_unit(image: &SkyImage) -> String {
    let unit = image.unit();
    if unit == batsky_core::Unit::Dimensionless {
        "dimensionless".to_string()
    } else {
        unit.to_string()
    }
}
