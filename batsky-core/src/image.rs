//! The sky-image container and its type-aware aggregation policy.
//!
//! A [`SkyImage`] is a single-time-bin histogram over (TIME, IMY, IMX,
//! ENERGY) or (TIME, HPX, ENERGY), tagged with the kind of map it holds.
//! The tag drives how an energy collapse combines bins: uncertainty-like
//! maps combine in quadrature, fractional/normalization maps cannot be
//! summed over energy at all and select their final slice instead.

use crate::axes::{Axes, Axis, AxisBinning, AxisLabel};
use crate::bins::{energy_bands, EnergyBand, GoodTimeInterval};
use crate::edges::BinEdges;
use crate::error::{Error, Result};
use crate::healpix::{CoordFrame, HealpixAxis};
use crate::histogram::Histogram;
use crate::units::Unit;
use crate::wcs::{frame, Wcs};
use log::warn;
use ndarray::{Array3, ArrayD, ArrayViewD, Axis as NdAxis};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The kind of map a sky image holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ImageType {
    /// Deconvolved flux map.
    Flux,
    /// Fraction of the field of view coded by the mask, per sky pixel.
    PartialCoding,
    /// Significance (signal-to-noise) map.
    SignalToNoise,
    /// Background standard deviation map.
    BackgroundStddev,
    /// Exposure map.
    Exposure,
}

/// How an energy collapse combines bins for a given image type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyReduction {
    /// Ordinary elementwise summation.
    LinearSum,
    /// Square, sum, square-root: uncertainty-like quantities.
    Quadrature,
    /// Summing is physically meaningless; keep only the final energy slice.
    LastSlice,
}

impl ImageType {
    /// Classifies a file extension name into an image type.
    ///
    /// Matching is case-insensitive on substrings, so the ground software's
    /// decorated names (`BAT_IMAGE`, `PCODEMAP`, ...) classify too.
    #[must_use]
    pub fn classify_extname(name: &str) -> Option<ImageType> {
        let lower = name.to_ascii_lowercase();
        if lower.contains("image") {
            Some(ImageType::Flux)
        } else if lower.contains("pcode") {
            Some(ImageType::PartialCoding)
        } else if lower.contains("signif") {
            Some(ImageType::SignalToNoise)
        } else if lower.contains("varmap") {
            Some(ImageType::BackgroundStddev)
        } else if lower.contains("exposure") {
            Some(ImageType::Exposure)
        } else {
            None
        }
    }

    /// The extension-name keyword for this image type.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            ImageType::Flux => "image",
            ImageType::PartialCoding => "pcode",
            ImageType::SignalToNoise => "signif",
            ImageType::BackgroundStddev => "varmap",
            ImageType::Exposure => "exposure",
        }
    }

    /// Whether contents of this type carry no physical unit.
    #[must_use]
    pub fn forces_dimensionless(self) -> bool {
        matches!(self, ImageType::PartialCoding | ImageType::SignalToNoise)
    }

    /// The strategy used when this image type is collapsed over energy.
    #[must_use]
    pub fn energy_reduction(self, mosaic_intermediate: bool) -> EnergyReduction {
        match (self, mosaic_intermediate) {
            // Fractional/normalization maps cannot be summed over energy,
            // mosaic intermediate or not.
            (ImageType::PartialCoding | ImageType::Exposure, _) => EnergyReduction::LastSlice,
            // Uncertainty-like maps combine in quadrature.
            (ImageType::SignalToNoise | ImageType::BackgroundStddev, false) => {
                EnergyReduction::Quadrature
            }
            // Mosaic intermediates hold partial sums; flux maps are additive.
            (ImageType::Flux, _) | (_, true) => EnergyReduction::LinearSum,
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageType::Flux => "flux",
            ImageType::PartialCoding => "partial_coding",
            ImageType::SignalToNoise => "signal_to_noise",
            ImageType::BackgroundStddev => "background_stddev",
            ImageType::Exposure => "exposure",
        };
        f.write_str(name)
    }
}

fn type_name(ty: Option<ImageType>) -> String {
    ty.map_or_else(|| "untyped".to_string(), |t| t.to_string())
}

/// A single-time-bin binned image of the sky.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyImage {
    hist: Histogram,
    timebins: BinEdges,
    energybins: BinEdges,
    gti: GoodTimeInterval,
    bands: Vec<EnergyBand>,
    wcs: Option<Wcs>,
    image_type: Option<ImageType>,
    mosaic_intermediate: bool,
}

/// Staged construction of a [`SkyImage`].
///
/// Collects the pieces, then validates them in a fixed order in
/// [`SkyImageBuilder::build`].
#[derive(Debug, Default, Clone)]
pub struct SkyImageBuilder {
    contents: Option<ArrayD<f64>>,
    unit: Option<Unit>,
    timebins: Option<BinEdges>,
    tstart: Option<Vec<f64>>,
    tstop: Option<Vec<f64>>,
    energybins: Option<BinEdges>,
    emin: Option<Vec<f64>>,
    emax: Option<Vec<f64>>,
    wcs: Option<Wcs>,
    healpix: Option<HealpixAxis>,
    image_type: Option<ImageType>,
    mosaic_intermediate: bool,
}

impl SkyImageBuilder {
    /// Sets the image contents: `(1, ny, nx, ne)`, or `(1, npix, ne)` when a
    /// healpix axis is declared.
    #[must_use]
    pub fn contents(mut self, contents: ArrayD<f64>) -> Self {
        self.contents = Some(contents);
        self
    }

    /// Sets the physical unit of the contents (defaults to counts).
    #[must_use]
    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the time binning as explicit edges.
    #[must_use]
    pub fn timebins(mut self, timebins: BinEdges) -> Self {
        self.timebins = Some(timebins);
        self
    }

    /// Sets the interval start times, in seconds.
    #[must_use]
    pub fn tstart(mut self, tstart: &[f64]) -> Self {
        self.tstart = Some(tstart.to_vec());
        self
    }

    /// Sets the interval stop times, in seconds.
    #[must_use]
    pub fn tstop(mut self, tstop: &[f64]) -> Self {
        self.tstop = Some(tstop.to_vec());
        self
    }

    /// Sets the energy binning as explicit edges.
    #[must_use]
    pub fn energybins(mut self, energybins: BinEdges) -> Self {
        self.energybins = Some(energybins);
        self
    }

    /// Sets per-bin energy bounds, in keV. Non-contiguous bounds are
    /// reconciled and the contents redistributed accordingly.
    #[must_use]
    pub fn energy_bounds(mut self, emin: &[f64], emax: &[f64]) -> Self {
        self.emin = Some(emin.to_vec());
        self.emax = Some(emax.to_vec());
        self
    }

    /// Attaches a world coordinate transform.
    #[must_use]
    pub fn wcs(mut self, wcs: Wcs) -> Self {
        self.wcs = Some(wcs);
        self
    }

    /// Declares the spatial axis to be a HEALPix grid instead of a
    /// tangent-plane pixel grid.
    #[must_use]
    pub fn healpix(mut self, healpix: HealpixAxis) -> Self {
        self.healpix = Some(healpix);
        self
    }

    /// Tags the kind of map the contents represent.
    #[must_use]
    pub fn image_type(mut self, image_type: ImageType) -> Self {
        self.image_type = Some(image_type);
        self
    }

    /// Marks the image as an unfinalized mosaic accumulator.
    #[must_use]
    pub fn mosaic_intermediate(mut self, mosaic_intermediate: bool) -> Self {
        self.mosaic_intermediate = mosaic_intermediate;
        self
    }

    /// Validates the collected pieces and assembles the image.
    ///
    /// # Errors
    /// Fails on missing contents, inconsistent time bounds, anything other
    /// than exactly one time bin, malformed energy bounds, or a contents
    /// shape that does not match the derived axes.
    pub fn build(self) -> Result<SkyImage> {
        let mut data = self.contents.ok_or(Error::MissingImageData)?;

        if self.wcs.is_none() {
            warn!(
                "no world coordinate system was specified; the sky image is assumed to be in \
                 the detector tangent plane and healpix conversion will not be possible"
            );
        }

        let expected_ndim = if self.healpix.is_some() { 3 } else { 4 };
        if data.ndim() != expected_ndim {
            return Err(Error::Dimensionality(data.ndim()));
        }
        let e_axis = data.ndim() - 1;

        // Time binning: explicit edges take precedence over start/stop pairs.
        let timebins = match (self.timebins, self.tstart, self.tstop) {
            (Some(timebins), _, _) => {
                if !timebins.unit().is_time() {
                    return Err(Error::UnitMismatch {
                        expected: Unit::Second,
                        found: timebins.unit(),
                    });
                }
                timebins
            }
            (None, Some(tstart), Some(tstop)) => {
                if tstart.len() != tstop.len() {
                    return Err(Error::TimeBounds(format!(
                        "tstart and tstop must have the same length, got {} and {}",
                        tstart.len(),
                        tstop.len()
                    )));
                }
                if tstart.is_empty() {
                    return Err(Error::TimeBounds("tstart and tstop are empty".to_string()));
                }
                if tstart.len() != 1 {
                    return Err(Error::MultipleTimeBins(tstart.len()));
                }
                BinEdges::pair(tstart[0], tstop[0], Unit::Second)?
            }
            (None, Some(_), None) | (None, None, Some(_)) => {
                return Err(Error::TimeBounds(
                    "both tstart and tstop must be given".to_string(),
                ));
            }
            (None, None, None) => {
                return Err(Error::TimeBounds(
                    "no time binning was specified".to_string(),
                ));
            }
        };
        if timebins.nbins() != 1 {
            return Err(Error::MultipleTimeBins(timebins.nbins()));
        }

        // Energy binning, reconciling per-bin bounds when necessary.
        let energybins = match (self.energybins, self.emin, self.emax) {
            (Some(energybins), _, _) => {
                if !energybins.unit().is_energy() {
                    return Err(Error::UnitMismatch {
                        expected: Unit::Kiloelectronvolt,
                        found: energybins.unit(),
                    });
                }
                energybins
            }
            (None, Some(emin), Some(emax)) => {
                let merged = BinEdges::from_bounds(&emin, &emax, Unit::Kiloelectronvolt)?;
                if data.shape()[e_axis] != emin.len() {
                    let mut expected = data.shape().to_vec();
                    expected[e_axis] = emin.len();
                    return Err(Error::ShapeMismatch {
                        shape: data.shape().to_vec(),
                        expected,
                    });
                }
                if !merged.contiguous {
                    // Scatter the existing slices into the enlarged binning.
                    let mut shape = data.shape().to_vec();
                    shape[e_axis] = merged.edges.nbins();
                    let mut enlarged = ArrayD::<f64>::zeros(shape);
                    for (i, &dst) in merged.placement.iter().enumerate() {
                        enlarged
                            .index_axis_mut(NdAxis(e_axis), dst)
                            .assign(&data.index_axis(NdAxis(e_axis), i));
                    }
                    data = enlarged;
                }
                merged.edges
            }
            (None, Some(_), None) | (None, None, Some(_)) => {
                return Err(Error::InvalidEdges(
                    "both emin and emax must be given".to_string(),
                ));
            }
            (None, None, None) => {
                return Err(Error::InvalidEdges(
                    "no energy binning was specified".to_string(),
                ));
            }
        };

        // Axis assembly and the shape check.
        let shape = data.shape().to_vec();
        let axes = if let Some(healpix) = self.healpix {
            let expected = vec![1, healpix.npix(), energybins.nbins()];
            if shape != expected {
                return Err(Error::ShapeMismatch { shape, expected });
            }
            Axes::new(vec![
                Axis::new(AxisLabel::Time, AxisBinning::Edges(timebins.clone())),
                Axis::new(AxisLabel::Healpix, AxisBinning::Grid(healpix)),
                Axis::new(AxisLabel::Energy, AxisBinning::Edges(energybins.clone())),
            ])?
        } else {
            let expected = vec![1, shape[1], shape[2], energybins.nbins()];
            if shape != expected {
                return Err(Error::ShapeMismatch { shape, expected });
            }
            Axes::new(vec![
                Axis::new(AxisLabel::Time, AxisBinning::Edges(timebins.clone())),
                Axis::new(AxisLabel::ImY, AxisBinning::Pixels(shape[1])),
                Axis::new(AxisLabel::ImX, AxisBinning::Pixels(shape[2])),
                Axis::new(AxisLabel::Energy, AxisBinning::Edges(energybins.clone())),
            ])?
        };

        let unit = match self.image_type {
            Some(ty) if ty.forces_dimensionless() => Unit::Dimensionless,
            _ => self.unit.unwrap_or(Unit::Count),
        };

        let hist = Histogram::new(axes, data, unit)?;
        let gti = GoodTimeInterval::new(timebins.lo_lim(), timebins.hi_lim())?;
        let bands = energy_bands(&energybins);

        Ok(SkyImage {
            hist,
            timebins,
            energybins,
            gti,
            bands,
            wcs: self.wcs,
            image_type: self.image_type,
            mosaic_intermediate: self.mosaic_intermediate,
        })
    }
}

impl SkyImage {
    /// Starts staged construction.
    #[must_use]
    pub fn builder() -> SkyImageBuilder {
        SkyImageBuilder::default()
    }

    /// Wraps an existing histogram, reusing its axis labels (including a
    /// HEALPix axis when present).
    ///
    /// # Errors
    /// Fails unless the histogram carries a canonical axis layout with
    /// exactly one time bin.
    pub fn from_histogram(
        hist: Histogram,
        wcs: Option<Wcs>,
        image_type: Option<ImageType>,
        mosaic_intermediate: bool,
    ) -> Result<Self> {
        let timebins = match hist.axes().get(AxisLabel::Time) {
            Some(Axis {
                binning: AxisBinning::Edges(edges),
                ..
            }) => edges.clone(),
            _ => return Err(Error::UnknownAxis(AxisLabel::Time)),
        };
        if !timebins.unit().is_time() {
            return Err(Error::UnitMismatch {
                expected: Unit::Second,
                found: timebins.unit(),
            });
        }
        if timebins.nbins() != 1 {
            return Err(Error::MultipleTimeBins(timebins.nbins()));
        }

        let energybins = match hist.axes().get(AxisLabel::Energy) {
            Some(Axis {
                binning: AxisBinning::Edges(edges),
                ..
            }) => edges.clone(),
            _ => return Err(Error::UnknownAxis(AxisLabel::Energy)),
        };
        if !energybins.unit().is_energy() {
            return Err(Error::UnitMismatch {
                expected: Unit::Kiloelectronvolt,
                found: energybins.unit(),
            });
        }

        let ndim = hist.axes().ndim();
        let plane = ndim == 4
            && matches!(hist.axes().index_of(AxisLabel::ImY), Ok(1))
            && matches!(hist.axes().index_of(AxisLabel::ImX), Ok(2));
        let hpx = ndim == 3 && matches!(hist.axes().index_of(AxisLabel::Healpix), Ok(1));
        let canonical = hist.axes().index_of(AxisLabel::Time)? == 0
            && hist.axes().index_of(AxisLabel::Energy)? == ndim - 1
            && (plane || hpx);
        if !canonical {
            return Err(Error::AxisLayout(
                "sky image axes must be ordered (TIME, IMY, IMX, ENERGY) or (TIME, HPX, ENERGY)"
                    .to_string(),
            ));
        }

        let hist = match image_type {
            Some(ty) if ty.forces_dimensionless() && hist.unit() != Unit::Dimensionless => {
                Histogram::new(hist.axes().clone(), hist.contents().clone(), Unit::Dimensionless)?
            }
            _ => hist,
        };

        let gti = GoodTimeInterval::new(timebins.lo_lim(), timebins.hi_lim())?;
        let bands = energy_bands(&energybins);
        Ok(SkyImage {
            hist,
            timebins,
            energybins,
            gti,
            bands,
            wcs,
            image_type,
            mosaic_intermediate,
        })
    }

    /// The underlying labeled histogram.
    #[must_use]
    pub fn histogram(&self) -> &Histogram {
        &self.hist
    }

    /// The binned contents.
    #[must_use]
    pub fn contents(&self) -> &ArrayD<f64> {
        self.hist.contents()
    }

    /// The physical unit of the contents.
    #[must_use]
    pub fn unit(&self) -> Unit {
        self.hist.unit()
    }

    /// The time bin edges (always exactly one bin).
    #[must_use]
    pub fn timebins(&self) -> &BinEdges {
        &self.timebins
    }

    /// The energy bin edges.
    #[must_use]
    pub fn energybins(&self) -> &BinEdges {
        &self.energybins
    }

    /// The good time interval.
    #[must_use]
    pub fn gti(&self) -> GoodTimeInterval {
        self.gti
    }

    /// Exposure duration in seconds.
    #[must_use]
    pub fn exposure(&self) -> f64 {
        self.gti.exposure()
    }

    /// The per-bin energy table.
    #[must_use]
    pub fn energy_bands(&self) -> &[EnergyBand] {
        &self.bands
    }

    /// The world coordinate transform, when one is attached.
    #[must_use]
    pub fn wcs(&self) -> Option<&Wcs> {
        self.wcs.as_ref()
    }

    /// The kind of map this image holds, when tagged.
    #[must_use]
    pub fn image_type(&self) -> Option<ImageType> {
        self.image_type
    }

    /// Whether this image is an unfinalized mosaic accumulator.
    #[must_use]
    pub fn is_mosaic_intermediate(&self) -> bool {
        self.mosaic_intermediate
    }

    /// The HEALPix pixelization of the spatial axis, when present.
    #[must_use]
    pub fn healpix_axis(&self) -> Option<&HealpixAxis> {
        match self.hist.axes().get(AxisLabel::Healpix) {
            Some(Axis {
                binning: AxisBinning::Grid(healpix),
                ..
            }) => Some(healpix),
            _ => None,
        }
    }

    /// Collapses all axes not in `keep`, honoring the image-type policy.
    ///
    /// When ENERGY is collapsed across more than one bin: uncertainty-like
    /// maps (significance, background standard deviation) combine in
    /// quadrature unless the image is a mosaic intermediate; partial-coding
    /// and exposure maps select their final energy slice; flux maps and
    /// mosaic intermediates sum linearly; untagged images fall back to a
    /// linear sum with an advisory warning.
    ///
    /// # Errors
    /// Fails on labels not present on this image or listed twice.
    pub fn project(&self, keep: &[AxisLabel]) -> Result<Histogram> {
        let ne = self.energybins.nbins();
        if keep.contains(&AxisLabel::Energy) || ne <= 1 {
            return self.hist.project(keep);
        }

        let Some(ty) = self.image_type else {
            warn!("collapsing {ne} energy bins on an untagged sky image; defaulting to a linear sum");
            return self.hist.project(keep);
        };

        match ty.energy_reduction(self.mosaic_intermediate) {
            EnergyReduction::LinearSum => self.hist.project(keep),
            EnergyReduction::Quadrature => {
                let squared = Histogram::new(
                    self.hist.axes().clone(),
                    self.hist.contents().mapv(|v| v * v),
                    self.hist.unit(),
                )?;
                let summed = squared.project(keep)?;
                Histogram::new(
                    summed.axes().clone(),
                    summed.contents().mapv(f64::sqrt),
                    summed.unit(),
                )
            }
            EnergyReduction::LastSlice => {
                let e_axis = self.hist.axes().index_of(AxisLabel::Energy)?;
                let last = self
                    .hist
                    .contents()
                    .index_axis(NdAxis(e_axis), ne - 1)
                    .to_owned();
                let axes = Axes::new(
                    self.hist
                        .axes()
                        .iter()
                        .filter(|a| a.label != AxisLabel::Energy)
                        .cloned()
                        .collect(),
                )?;
                Histogram::new(axes, last, self.hist.unit())?.project(keep)
            }
        }
    }

    /// Reprojects the image onto a HEALPix grid, or validates an existing
    /// one.
    ///
    /// For tangent-plane images every (time, energy) slice is sampled at
    /// each HEALPix pixel centre by bilinear interpolation through the
    /// stored world coordinate transform; directions outside the footprint
    /// become NaN. For images that already carry a HEALPix axis the stored
    /// grid must match the request exactly and a copy is returned.
    ///
    /// # Errors
    /// Fails with a mismatch error when a stored grid differs from the
    /// request, and with a missing-WCS error when a tangent-plane image has
    /// no transform attached.
    pub fn healpix_projection(&self, frame: CoordFrame, nside: usize) -> Result<SkyImage> {
        let requested = HealpixAxis::new(nside, frame)?;
        if let Some(stored) = self.healpix_axis() {
            if *stored != requested {
                return Err(Error::HealpixMismatch {
                    stored_nside: stored.nside(),
                    stored_frame: stored.frame(),
                    requested_nside: nside,
                    requested_frame: frame,
                });
            }
            return Ok(self.clone());
        }

        let wcs = self.wcs.as_ref().ok_or(Error::MissingWcs)?;
        let ne = self.energybins.nbins();
        let npix = requested.npix();

        let plane = self.hist.contents().index_axis(NdAxis(0), 0);
        let mut projected = Array3::<f64>::zeros((1, npix, ne));
        for e in 0..ne {
            let slice = plane.index_axis(NdAxis(2), e);
            for p in 0..npix {
                let (lon, lat) = requested.pixel_direction(p);
                let (ra, dec) = match frame {
                    CoordFrame::Icrs => (lon, lat),
                    CoordFrame::Galactic => frame::galactic_to_icrs(lon, lat),
                };
                projected[[0, p, e]] = match wcs.sky_to_pixel(ra, dec) {
                    Some((x, y)) => bilinear(&slice, x, y),
                    None => f64::NAN,
                };
            }
        }

        let axes = Axes::new(vec![
            Axis::new(AxisLabel::Time, AxisBinning::Edges(self.timebins.clone())),
            Axis::new(AxisLabel::Healpix, AxisBinning::Grid(requested)),
            Axis::new(
                AxisLabel::Energy,
                AxisBinning::Edges(self.energybins.clone()),
            ),
        ])?;
        let hist = Histogram::new(axes, projected.into_dyn(), self.hist.unit())?;
        SkyImage::from_histogram(hist, self.wcs, self.image_type, self.mosaic_intermediate)
    }

    /// Per-pixel (RA, Dec) grids of the tangent-plane pixel centres, in
    /// degrees.
    ///
    /// # Errors
    /// Fails without a world coordinate transform or on a HEALPix image.
    pub fn pixel_sky_coords(&self) -> Result<(ndarray::Array2<f64>, ndarray::Array2<f64>)> {
        let wcs = self.wcs.as_ref().ok_or(Error::MissingWcs)?;
        let ny_axis = self.hist.axes().index_of(AxisLabel::ImY)?;
        let nx_axis = self.hist.axes().index_of(AxisLabel::ImX)?;
        let ny = self.hist.axes().shape()[ny_axis];
        let nx = self.hist.axes().shape()[nx_axis];

        let mut ra = ndarray::Array2::<f64>::zeros((ny, nx));
        let mut dec = ndarray::Array2::<f64>::zeros((ny, nx));
        for y in 0..ny {
            for x in 0..nx {
                #[allow(clippy::cast_precision_loss)]
                let (r, d) = wcs.pixel_to_sky(x as f64, y as f64);
                ra[[y, x]] = r;
                dec[[y, x]] = d;
            }
        }
        Ok((ra, dec))
    }

    /// Adds another image elementwise, guarding the mosaic contract.
    ///
    /// Ordinary summation is only defined for identically binned, non-mosaic
    /// flux (or untagged) images; uncertainty-like and fractional maps, and
    /// mosaic intermediates, require specialized combination.
    ///
    /// # Errors
    /// Fails with a policy error on any disallowed combination, and with
    /// unit errors on mismatched content units.
    pub fn checked_sum(&self, other: &SkyImage) -> Result<SkyImage> {
        if self.mosaic_intermediate || other.mosaic_intermediate {
            return Err(Error::Policy(
                "mosaic intermediate images require specialized combination; refusing ordinary \
                 summation"
                    .to_string(),
            ));
        }
        if self.image_type != other.image_type {
            return Err(Error::Policy(format!(
                "cannot sum a {} image with a {} image",
                type_name(self.image_type),
                type_name(other.image_type)
            )));
        }
        if let Some(ty) = self.image_type {
            if ty != ImageType::Flux {
                return Err(Error::Policy(format!(
                    "cannot sum {ty} images with ordinary arithmetic"
                )));
            }
        }
        if self.hist.unit() != other.hist.unit() {
            return Err(Error::UnitMismatch {
                expected: self.hist.unit(),
                found: other.hist.unit(),
            });
        }
        if self.hist.axes() != other.hist.axes() {
            return Err(Error::Policy(
                "cannot sum images with different axis binning".to_string(),
            ));
        }

        let contents = self.hist.contents() + other.hist.contents();
        let hist = Histogram::new(self.hist.axes().clone(), contents, self.hist.unit())?;
        SkyImage::from_histogram(hist, self.wcs, self.image_type, false)
    }
}

/// Bilinear interpolation of a 2-D (IMY, IMX) slice at a fractional pixel
/// position; NaN outside the grid.
fn bilinear(map: &ArrayViewD<'_, f64>, x: f64, y: f64) -> f64 {
    let ny = map.shape()[0];
    let nx = map.shape()[1];
    if ny == 0 || nx == 0 {
        return f64::NAN;
    }
    #[allow(clippy::cast_precision_loss)]
    if x < 0.0 || y < 0.0 || x > (nx - 1) as f64 || y > (ny - 1) as f64 {
        return f64::NAN;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let x0 = x.floor() as usize;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(nx - 1);
    let y1 = (y0 + 1).min(ny - 1);
    #[allow(clippy::cast_precision_loss)]
    let fx = x - x0 as f64;
    #[allow(clippy::cast_precision_loss)]
    let fy = y - y0 as f64;

    map[[y0, x0]] * (1.0 - fx) * (1.0 - fy)
        + map[[y0, x1]] * fx * (1.0 - fy)
        + map[[y1, x0]] * (1.0 - fx) * fy
        + map[[y1, x1]] * fx * fy
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array3, Array4};

    fn energy_edges(edges: &[f64]) -> BinEdges {
        BinEdges::new(edges.to_vec(), Unit::Kiloelectronvolt).unwrap()
    }

    fn flat_image(values_per_bin: &[f64], ty: Option<ImageType>) -> SkyImage {
        let ne = values_per_bin.len();
        let mut contents = Array4::<f64>::zeros((1, 2, 2, ne));
        for (e, &v) in values_per_bin.iter().enumerate() {
            contents.index_axis_mut(NdAxis(3), e).fill(v);
        }
        let edges: Vec<f64> = (0..=ne).map(|i| 15.0 + 10.0 * i as f64).collect();
        let mut builder = SkyImage::builder()
            .contents(contents.into_dyn())
            .tstart(&[100.0])
            .tstop(&[160.0])
            .energybins(energy_edges(&edges))
            .wcs(Wcs::new([1.5, 1.5], [244.0, -15.6], [-0.2, 0.2]));
        if let Some(ty) = ty {
            builder = builder.image_type(ty);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_builder_requires_contents() {
        let result = SkyImage::builder()
            .tstart(&[0.0])
            .tstop(&[1.0])
            .energybins(energy_edges(&[15.0, 150.0]))
            .build();
        assert!(matches!(result, Err(Error::MissingImageData)));
    }

    #[test]
    fn test_builder_rejects_one_sided_time_bounds() {
        let contents = Array4::<f64>::zeros((1, 2, 2, 1)).into_dyn();
        let result = SkyImage::builder()
            .contents(contents)
            .tstart(&[0.0])
            .energybins(energy_edges(&[15.0, 150.0]))
            .build();
        assert!(matches!(result, Err(Error::TimeBounds(_))));
    }

    #[test]
    fn test_builder_rejects_multiple_time_bins() {
        let contents = Array4::<f64>::zeros((1, 2, 2, 1)).into_dyn();
        let timebins = BinEdges::new(vec![0.0, 30.0, 60.0], Unit::Second).unwrap();
        let result = SkyImage::builder()
            .contents(contents)
            .timebins(timebins)
            .energybins(energy_edges(&[15.0, 150.0]))
            .build();
        assert!(matches!(result, Err(Error::MultipleTimeBins(2))));
    }

    #[test]
    fn test_builder_rejects_wrong_dimensionality() {
        let contents = ndarray::Array2::<f64>::zeros((4, 4)).into_dyn();
        let result = SkyImage::builder()
            .contents(contents)
            .tstart(&[0.0])
            .tstop(&[1.0])
            .energybins(energy_edges(&[15.0, 150.0]))
            .build();
        assert!(matches!(result, Err(Error::Dimensionality(2))));
    }

    #[test]
    fn test_builder_rejects_time_unit_on_energy_axis() {
        let contents = Array4::<f64>::zeros((1, 2, 2, 1)).into_dyn();
        let result = SkyImage::builder()
            .contents(contents)
            .tstart(&[0.0])
            .tstop(&[1.0])
            .energybins(BinEdges::pair(15.0, 150.0, Unit::Second).unwrap())
            .build();
        assert!(matches!(result, Err(Error::UnitMismatch { .. })));
    }

    #[test]
    fn test_builder_redistributes_gapped_energy_bounds() {
        let mut contents = Array4::<f64>::zeros((1, 1, 1, 2));
        contents[[0, 0, 0, 0]] = 7.0;
        contents[[0, 0, 0, 1]] = 9.0;
        let image = SkyImage::builder()
            .contents(contents.into_dyn())
            .tstart(&[0.0])
            .tstop(&[1.0])
            .energy_bounds(&[15.0, 50.0], &[25.0, 150.0])
            .build()
            .unwrap();
        assert_eq!(
            image.energybins().edges(),
            &[15.0, 25.0, 50.0, 150.0]
        );
        assert_eq!(image.contents().shape(), &[1, 1, 1, 3]);
        assert_relative_eq!(image.contents()[[0, 0, 0, 0]], 7.0);
        assert_relative_eq!(image.contents()[[0, 0, 0, 1]], 0.0);
        assert_relative_eq!(image.contents()[[0, 0, 0, 2]], 9.0);
    }

    #[test]
    fn test_derived_bookkeeping() {
        let image = flat_image(&[1.0], Some(ImageType::Flux));
        assert_relative_eq!(image.gti().start, 100.0);
        assert_relative_eq!(image.gti().stop, 160.0);
        assert_relative_eq!(image.gti().centre(), 130.0);
        assert_relative_eq!(image.exposure(), 60.0);
        let bands = image.energy_bands();
        assert_eq!(bands.len(), 1);
        assert_eq!(bands[0].index, 1);
        assert_relative_eq!(bands[0].e_min, 15.0);
        assert_relative_eq!(bands[0].e_max, 25.0);
    }

    #[test]
    fn test_snr_projects_in_quadrature() {
        let image = flat_image(&[3.0, 4.0], Some(ImageType::SignalToNoise));
        assert_eq!(image.unit(), Unit::Dimensionless);
        let map = image
            .project(&[AxisLabel::ImY, AxisLabel::ImX])
            .unwrap();
        for &v in map.contents() {
            assert_relative_eq!(v, 5.0);
        }
    }

    #[test]
    fn test_bkg_stddev_projects_in_quadrature() {
        let image = flat_image(&[6.0, 8.0], Some(ImageType::BackgroundStddev));
        let map = image
            .project(&[AxisLabel::ImY, AxisLabel::ImX])
            .unwrap();
        for &v in map.contents() {
            assert_relative_eq!(v, 10.0);
        }
    }

    #[test]
    fn test_partial_coding_selects_last_slice() {
        let image = flat_image(&[0.1, 0.5, 0.9], Some(ImageType::PartialCoding));
        let map = image
            .project(&[AxisLabel::ImY, AxisLabel::ImX])
            .unwrap();
        for &v in map.contents() {
            assert_relative_eq!(v, 0.9);
        }
    }

    #[test]
    fn test_flux_projects_linearly() {
        let image = flat_image(&[3.0, 4.0], Some(ImageType::Flux));
        let map = image
            .project(&[AxisLabel::ImY, AxisLabel::ImX])
            .unwrap();
        for &v in map.contents() {
            assert_relative_eq!(v, 7.0);
        }
    }

    #[test]
    fn test_untagged_image_falls_back_to_linear_sum() {
        let image = flat_image(&[3.0, 4.0], None);
        let map = image
            .project(&[AxisLabel::ImY, AxisLabel::ImX])
            .unwrap();
        for &v in map.contents() {
            assert_relative_eq!(v, 7.0);
        }
    }

    #[test]
    fn test_mosaic_intermediate_snr_sums_linearly() {
        let ne = 2;
        let mut contents = Array4::<f64>::zeros((1, 1, 1, ne));
        contents[[0, 0, 0, 0]] = 3.0;
        contents[[0, 0, 0, 1]] = 4.0;
        let image = SkyImage::builder()
            .contents(contents.into_dyn())
            .tstart(&[0.0])
            .tstop(&[1.0])
            .energybins(energy_edges(&[15.0, 25.0, 35.0]))
            .image_type(ImageType::SignalToNoise)
            .mosaic_intermediate(true)
            .build()
            .unwrap();
        let map = image
            .project(&[AxisLabel::ImY, AxisLabel::ImX])
            .unwrap();
        assert_relative_eq!(map.contents()[[0, 0]], 7.0);
    }

    #[test]
    fn test_energy_kept_means_no_special_casing() {
        let image = flat_image(&[3.0, 4.0], Some(ImageType::SignalToNoise));
        let kept = image
            .project(&[AxisLabel::ImY, AxisLabel::ImX, AxisLabel::Energy])
            .unwrap();
        assert_relative_eq!(kept.contents()[[0, 0, 0]], 3.0);
        assert_relative_eq!(kept.contents()[[0, 0, 1]], 4.0);
    }

    #[test]
    fn test_energy_reduction_table() {
        assert_eq!(
            ImageType::SignalToNoise.energy_reduction(false),
            EnergyReduction::Quadrature
        );
        assert_eq!(
            ImageType::SignalToNoise.energy_reduction(true),
            EnergyReduction::LinearSum
        );
        assert_eq!(
            ImageType::PartialCoding.energy_reduction(true),
            EnergyReduction::LastSlice
        );
        assert_eq!(
            ImageType::Exposure.energy_reduction(false),
            EnergyReduction::LastSlice
        );
        assert_eq!(
            ImageType::Flux.energy_reduction(false),
            EnergyReduction::LinearSum
        );
    }

    #[test]
    fn test_classify_extname() {
        assert_eq!(
            ImageType::classify_extname("BAT_IMAGE_1"),
            Some(ImageType::Flux)
        );
        assert_eq!(
            ImageType::classify_extname("pcodemap"),
            Some(ImageType::PartialCoding)
        );
        assert_eq!(
            ImageType::classify_extname("SIGNIF2"),
            Some(ImageType::SignalToNoise)
        );
        assert_eq!(
            ImageType::classify_extname("varmap"),
            Some(ImageType::BackgroundStddev)
        );
        assert_eq!(ImageType::classify_extname("EBOUNDS"), None);
    }

    fn healpix_image(nside: usize, frame: CoordFrame) -> SkyImage {
        let axis = HealpixAxis::new(nside, frame).unwrap();
        let contents = Array3::<f64>::zeros((1, axis.npix(), 1)).into_dyn();
        SkyImage::builder()
            .contents(contents)
            .tstart(&[0.0])
            .tstop(&[1.0])
            .energybins(energy_edges(&[15.0, 150.0]))
            .healpix(axis)
            .build()
            .unwrap()
    }

    #[test]
    fn test_healpix_resolution_mismatch() {
        let image = healpix_image(8, CoordFrame::Galactic);
        let result = image.healpix_projection(CoordFrame::Galactic, 4);
        assert!(matches!(
            result,
            Err(Error::HealpixMismatch {
                stored_nside: 8,
                requested_nside: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_healpix_frame_mismatch() {
        let image = healpix_image(8, CoordFrame::Galactic);
        assert!(matches!(
            image.healpix_projection(CoordFrame::Icrs, 8),
            Err(Error::HealpixMismatch { .. })
        ));
    }

    #[test]
    fn test_matching_healpix_request_returns_copy() {
        let image = healpix_image(8, CoordFrame::Galactic);
        let copy = image.healpix_projection(CoordFrame::Galactic, 8).unwrap();
        assert_eq!(copy, image);
    }

    #[test]
    fn test_healpix_projection_requires_wcs() {
        let contents = Array4::<f64>::zeros((1, 4, 4, 1)).into_dyn();
        let image = SkyImage::builder()
            .contents(contents)
            .tstart(&[0.0])
            .tstop(&[1.0])
            .energybins(energy_edges(&[15.0, 150.0]))
            .build()
            .unwrap();
        assert!(matches!(
            image.healpix_projection(CoordFrame::Galactic, 64),
            Err(Error::MissingWcs)
        ));
    }

    #[test]
    fn test_healpix_projection_samples_constant_field() {
        let mut contents = Array4::<f64>::zeros((1, 64, 64, 1));
        contents.fill(2.5);
        let image = SkyImage::builder()
            .contents(contents.into_dyn())
            .tstart(&[0.0])
            .tstop(&[1.0])
            .energybins(energy_edges(&[15.0, 150.0]))
            .wcs(Wcs::new([32.5, 32.5], [244.0, -15.6], [-0.2, 0.2]))
            .image_type(ImageType::Flux)
            .build()
            .unwrap();

        let projected = image.healpix_projection(CoordFrame::Galactic, 8).unwrap();
        let axis = projected.healpix_axis().unwrap();
        assert_eq!(axis.nside(), 8);
        assert_eq!(axis.frame(), CoordFrame::Galactic);
        assert_eq!(projected.contents().shape(), &[1, 768, 1]);

        let finite: Vec<f64> = projected
            .contents()
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .collect();
        assert!(!finite.is_empty());
        assert!(finite.len() < 768);
        for v in finite {
            assert_relative_eq!(v, 2.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_pixel_sky_coords_reference_pixel() {
        let image = flat_image(&[1.0], Some(ImageType::Flux));
        let (ra, dec) = image.pixel_sky_coords().unwrap();
        // crpix = (1.5, 1.5) in FITS convention -> 0-based (0.5, 0.5); the
        // grid straddles the reference point symmetrically.
        assert_eq!(ra.shape(), &[2, 2]);
        assert!(ra.iter().all(|v| (*v - 244.0).abs() < 1.0));
        assert!(dec.iter().all(|v| (*v + 15.6).abs() < 1.0));
    }

    #[test]
    fn test_checked_sum_of_flux_images() {
        let a = flat_image(&[1.0, 2.0], Some(ImageType::Flux));
        let b = flat_image(&[10.0, 20.0], Some(ImageType::Flux));
        let sum = a.checked_sum(&b).unwrap();
        assert_relative_eq!(sum.contents()[[0, 0, 0, 0]], 11.0);
        assert_relative_eq!(sum.contents()[[0, 1, 1, 1]], 22.0);
    }

    #[test]
    fn test_checked_sum_rejects_mosaic_intermediates() {
        let mut contents = Array4::<f64>::zeros((1, 2, 2, 1));
        contents.fill(1.0);
        let a = SkyImage::builder()
            .contents(contents.clone().into_dyn())
            .tstart(&[0.0])
            .tstop(&[1.0])
            .energybins(energy_edges(&[15.0, 150.0]))
            .mosaic_intermediate(true)
            .build()
            .unwrap();
        let b = SkyImage::builder()
            .contents(contents.into_dyn())
            .tstart(&[0.0])
            .tstop(&[1.0])
            .energybins(energy_edges(&[15.0, 150.0]))
            .build()
            .unwrap();
        assert!(matches!(a.checked_sum(&b), Err(Error::Policy(_))));
    }

    #[test]
    fn test_checked_sum_rejects_uncertainty_maps() {
        let a = flat_image(&[3.0], Some(ImageType::SignalToNoise));
        let b = flat_image(&[4.0], Some(ImageType::SignalToNoise));
        assert!(matches!(a.checked_sum(&b), Err(Error::Policy(_))));
    }

    #[test]
    fn test_checked_sum_rejects_mixed_types() {
        let a = flat_image(&[3.0], Some(ImageType::Flux));
        let b = flat_image(&[4.0], Some(ImageType::Exposure));
        assert!(matches!(a.checked_sum(&b), Err(Error::Policy(_))));
    }
}
