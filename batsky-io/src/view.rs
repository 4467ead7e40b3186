//! Orchestration of a full sky-view production run.
//!
//! A sky view bundles the flux map produced from one detector plane image
//! with its optional auxiliary products (partial-coding, significance, and
//! background standard deviation maps). The external imaging tool is driven
//! through the [`ImageTool`] seam, once for the main products and once more
//! for the partial-coding map.

use crate::error::{Error, Result};
use crate::skyimage::read_sky_image;
use crate::task::{ImageTool, TaskParams, TaskStatus};
use batsky_core::SkyImage;
use log::warn;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A request to produce sky images from one detector plane image.
#[derive(Debug, Clone)]
pub struct SkyViewRequest {
    /// The detector plane image to deconvolve.
    pub dpi_file: PathBuf,
    /// The spacecraft attitude file associated with the DPI.
    pub attitude_file: PathBuf,
    /// The detector quality mask; absent means all detectors are assumed on.
    pub detector_quality_file: Option<PathBuf>,
    /// Output path for the flux map; derived from the DPI stem when absent.
    pub output_file: Option<PathBuf>,
    /// Whether to produce the partial-coding map.
    pub pcode_map: bool,
    /// Whether to produce the significance map.
    pub snr_map: bool,
    /// Whether to produce the background standard deviation map.
    pub bkg_stddev_map: bool,
    /// Extra parameter overrides, applied to known parameters only.
    pub overrides: BTreeMap<String, String>,
}

impl SkyViewRequest {
    /// Creates a request with the default product set (flux plus
    /// partial-coding map).
    #[must_use]
    pub fn new(dpi_file: impl Into<PathBuf>, attitude_file: impl Into<PathBuf>) -> Self {
        Self {
            dpi_file: dpi_file.into(),
            attitude_file: attitude_file.into(),
            detector_quality_file: None,
            output_file: None,
            pcode_map: true,
            snr_map: false,
            bkg_stddev_map: false,
            overrides: BTreeMap::new(),
        }
    }

    /// Sets the detector quality mask file.
    #[must_use]
    pub fn with_detector_quality(mut self, path: impl Into<PathBuf>) -> Self {
        self.detector_quality_file = Some(path.into());
        self
    }

    /// Sets an explicit output path for the flux map.
    #[must_use]
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    /// Selects whether the partial-coding map is produced.
    #[must_use]
    pub fn with_pcode_map(mut self, pcode_map: bool) -> Self {
        self.pcode_map = pcode_map;
        self
    }

    /// Selects whether the significance map is produced.
    #[must_use]
    pub fn with_snr_map(mut self, snr_map: bool) -> Self {
        self.snr_map = snr_map;
        self
    }

    /// Selects whether the background standard deviation map is produced.
    #[must_use]
    pub fn with_bkg_stddev_map(mut self, bkg_stddev_map: bool) -> Self {
        self.bkg_stddev_map = bkg_stddev_map;
        self
    }

    /// Adds a parameter override; unknown parameter names are ignored at
    /// run time.
    #[must_use]
    pub fn with_override(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    fn sky_image_path(&self) -> PathBuf {
        self.output_file
            .clone()
            .unwrap_or_else(|| self.dpi_file.with_extension("img"))
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let stem = self
            .dpi_file
            .file_stem()
            .map_or_else(|| "skyview".to_string(), |s| s.to_string_lossy().into_owned());
        self.dpi_file.with_file_name(format!("{stem}{suffix}"))
    }
}

/// The sky images produced from one detector plane image.
#[derive(Debug, Clone)]
pub struct SkyView {
    /// The deconvolved flux map.
    pub sky_image: SkyImage,
    /// The partial-coding map, when requested.
    pub pcode_image: Option<SkyImage>,
    /// The significance map, when requested.
    pub snr_image: Option<SkyImage>,
    /// The background standard deviation map, when requested.
    pub bkg_stddev_image: Option<SkyImage>,
}

impl SkyView {
    /// Drives the imaging tool and ingests every produced file.
    ///
    /// The tool runs once for the flux map and auxiliary maps, and a second
    /// time with `pcodemap=YES` when the partial-coding map is requested,
    /// matching the ground software's two-pass convention. Any nonzero
    /// status fails immediately; nothing is retried.
    ///
    /// # Errors
    /// Fails when the DPI or attitude file is missing, when the tool cannot
    /// be started or exits nonzero, or when a produced file cannot be
    /// ingested.
    pub fn create<T: ImageTool>(tool: &T, request: &SkyViewRequest) -> Result<SkyView> {
        if !request.dpi_file.exists() {
            return Err(Error::MissingFile(request.dpi_file.clone()));
        }
        if !request.attitude_file.exists() {
            return Err(Error::MissingFile(request.attitude_file.clone()));
        }
        let detmask = match &request.detector_quality_file {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::MissingFile(path.clone()));
                }
                path.display().to_string()
            }
            None => {
                warn!(
                    "no detector quality mask file has been specified; sky images will be \
                     constructed assuming that all detectors are on"
                );
                "NONE".to_string()
            }
        };

        let sky_path = request.sky_image_path();
        let snr_path = request.sibling("_snr.img");
        let bkg_path = request.sibling("_bkg_stddev.img");
        let pcode_path = request.sibling(".pcodeimg");

        let mut params = TaskParams::new();
        params.set_path("infile", &request.dpi_file);
        params.set_path("outfile", &sky_path);
        params.set_path("attitude", &request.attitude_file);
        params.set("detmask", detmask);
        params.set_flag("clobber", true);
        if request.snr_map {
            params.set_path("signifmap", &snr_path);
        }
        if request.bkg_stddev_map {
            params.set_path("bkgvarmap", &bkg_path);
        }
        for (name, value) in &request.overrides {
            if params.contains(name) {
                params.set(name, value.clone());
            }
        }

        run_checked(tool, &params)?;

        let pcode_image = if request.pcode_map {
            let mut pcode_params = params.clone();
            pcode_params.set_flag("pcodemap", true);
            pcode_params.set_path("outfile", &pcode_path);
            run_checked(tool, &pcode_params)?;
            Some(read_sky_image(&pcode_path)?)
        } else {
            None
        };

        let sky_image = read_sky_image(&sky_path)?;
        let snr_image = if request.snr_map {
            Some(read_sky_image(&snr_path)?)
        } else {
            None
        };
        let bkg_stddev_image = if request.bkg_stddev_map {
            Some(read_sky_image(&bkg_path)?)
        } else {
            None
        };

        Ok(SkyView {
            sky_image,
            pcode_image,
            snr_image,
            bkg_stddev_image,
        })
    }
}

fn run_checked<T: ImageTool>(tool: &T, params: &TaskParams) -> Result<TaskStatus> {
    let status = tool.run(params)?;
    if !status.success() {
        return Err(Error::ToolFailed {
            name: tool.name().to_string(),
            status: status.code,
            output: status.output,
        });
    }
    Ok(status)
}
