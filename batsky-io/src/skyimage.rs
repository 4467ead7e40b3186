//! Reading and writing sky-image FITS containers.
//!
//! The on-disk layout is a multi-extension container: one 2-D image
//! extension per energy bin (named after the image type: `IMAGE`, `PCODE`,
//! `SIGNIF`, `VARMAP`, `EXPOSURE`), an `EBOUNDS` table with the energy-bin
//! boundaries, and an `STDGTI` table with the single good time interval.

use crate::error::{Error, Result};
use crate::fits::{image_is_empty, image_shape, read_optional_key, read_required_key};
use batsky_core::{ImageType, SkyImage, Unit, Wcs};
use fitsio::images::{ImageDescription, ImageType as FitsImageType};
use fitsio::tables::{ColumnDataType, ColumnDescription};
use fitsio::FitsFile;
use ndarray::{Array2, Array4, Axis};
use std::path::Path;

/// Reads a sky image from a multi-extension FITS container.
///
/// Every HDU is classified by its EXTNAME: image-type extensions supply one
/// energy slice each, `EBOUNDS` the energy boundaries, `STDGTI` the good
/// time interval. Partial-coding and significance images are forced
/// dimensionless regardless of their BUNIT.
///
/// # Errors
/// Fails on missing files, unrecognized or missing extensions, more than
/// one time bin, an energy-bin count that disagrees with the image count,
/// or malformed WCS/unit headers.
pub fn read_sky_image<P: AsRef<Path>>(path: P) -> Result<SkyImage> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::MissingFile(path.to_path_buf()));
    }
    let mut file = FitsFile::open(path)?;
    let num_hdus = file.num_hdus()?;

    // Classify every extension up front, as the original ground software
    // files carry EXTNAME on the primary HDU too.
    let mut image_hdus: Vec<(usize, ImageType)> = Vec::new();
    let mut ebounds_hdu = None;
    let mut gti_hdu = None;
    for index in 0..num_hdus {
        let hdu = file.hdu(index)?;
        let Some(extname) = read_optional_key::<String>(&mut file, &hdu, "EXTNAME")? else {
            if index == 0 && image_is_empty(&hdu) {
                continue;
            }
            return Err(Error::Format(format!(
                "extension {index} carries no EXTNAME keyword"
            )));
        };
        let lower = extname.to_ascii_lowercase();
        if lower.contains("ebounds") {
            if ebounds_hdu.replace(index).is_some() {
                return Err(Error::Format(
                    "more than one EBOUNDS extension".to_string(),
                ));
            }
        } else if lower.contains("stdgti") {
            if gti_hdu.replace(index).is_some() {
                return Err(Error::Format("more than one STDGTI extension".to_string()));
            }
        } else if let Some(ty) = ImageType::classify_extname(&extname) {
            image_hdus.push((index, ty));
        } else {
            return Err(Error::UnrecognizedExtension(extname));
        }
    }

    let gti_hdu = gti_hdu.ok_or(Error::MissingExtension("STDGTI"))?;
    if image_hdus.is_empty() {
        return Err(Error::MissingExtension("image"));
    }
    let image_type = image_hdus[0].1;
    if image_hdus.iter().any(|&(_, ty)| ty != image_type) {
        return Err(Error::Format(
            "mixed image extension types in one file are not supported".to_string(),
        ));
    }

    // Good time interval: exactly one row.
    let hdu = file.hdu(gti_hdu)?;
    let gti_rows: i64 = read_required_key(&mut file, &hdu, "NAXIS2")?;
    if gti_rows == 0 {
        return Err(Error::Format("the STDGTI table is empty".to_string()));
    }
    if gti_rows > 1 {
        #[allow(clippy::cast_sign_loss)]
        return Err(Error::MultipleTimeBins(gti_rows as usize));
    }
    let time_unit: String = read_required_key(&mut file, &hdu, "TUNIT1")?;
    if !time_unit.parse::<Unit>()?.is_time() {
        return Err(Error::Format(format!(
            "STDGTI TUNIT1 {time_unit:?} is not a time unit"
        )));
    }
    let tstart: Vec<f64> = hdu.read_col(&mut file, "START")?;
    let tstop: Vec<f64> = hdu.read_col(&mut file, "STOP")?;

    // Energy bounds: from the EBOUNDS table, or from per-extension headers.
    let (e_min, e_max) = if let Some(ebounds_hdu) = ebounds_hdu {
        let hdu = file.hdu(ebounds_hdu)?;
        let rows: i64 = read_required_key(&mut file, &hdu, "NAXIS2")?;
        #[allow(clippy::cast_sign_loss)]
        if rows as usize != image_hdus.len() {
            return Err(Error::Format(format!(
                "the number of energy bins, {rows}, is not equal to the number of image \
                 extensions, {}",
                image_hdus.len()
            )));
        }
        let energy_unit: String = read_required_key(&mut file, &hdu, "TUNIT1")?;
        if !energy_unit.parse::<Unit>()?.is_energy() {
            return Err(Error::Format(format!(
                "EBOUNDS TUNIT1 {energy_unit:?} is not an energy unit"
            )));
        }
        let e_min: Vec<f64> = hdu.read_col(&mut file, "E_MIN")?;
        let e_max: Vec<f64> = hdu.read_col(&mut file, "E_MAX")?;
        (e_min, e_max)
    } else {
        let mut e_min = Vec::with_capacity(image_hdus.len());
        let mut e_max = Vec::with_capacity(image_hdus.len());
        for &(index, _) in &image_hdus {
            let hdu = file.hdu(index)?;
            e_min.push(read_required_key(&mut file, &hdu, "E_MIN")?);
            e_max.push(read_required_key(&mut file, &hdu, "E_MAX")?);
            if let Some(eunit) = read_optional_key::<String>(&mut file, &hdu, "EUNIT")? {
                if !eunit.parse::<Unit>()?.is_energy() {
                    return Err(Error::Format(format!(
                        "image EUNIT {eunit:?} is not an energy unit"
                    )));
                }
            }
        }
        (e_min, e_max)
    };

    // Image slices, all of one shape; the first supplies WCS and unit.
    let first_hdu = file.hdu(image_hdus[0].0)?;
    let shape = image_shape(&first_hdu)?;
    if shape.len() != 2 {
        return Err(Error::Format(format!(
            "image extension {} is {}-dimensional; each energy slice must be a 2-D map",
            image_hdus[0].0,
            shape.len()
        )));
    }
    let (ny, nx) = (shape[0], shape[1]);
    let wcs = read_wcs(&mut file, &first_hdu)?;
    let unit = if image_type.forces_dimensionless() {
        Unit::Dimensionless
    } else {
        read_required_key::<String>(&mut file, &first_hdu, "BUNIT")?.parse()?
    };

    let mut data = Array4::zeros((1, ny, nx, image_hdus.len()));
    for (slot, &(index, _)) in image_hdus.iter().enumerate() {
        let hdu = file.hdu(index)?;
        let shape = image_shape(&hdu)?;
        if shape != [ny, nx] {
            return Err(Error::Format(format!(
                "image extension {index} has shape {shape:?}, but earlier slices have shape \
                 [{ny}, {nx}]"
            )));
        }
        let pixels: Vec<f64> = hdu.read_image(&mut file)?;
        let slice = Array2::from_shape_vec((ny, nx), pixels)
            .map_err(|e| Error::Format(e.to_string()))?;
        data.index_axis_mut(Axis(3), slot)
            .assign(&slice.insert_axis(Axis(0)));
    }

    let mut builder = SkyImage::builder()
        .contents(data.into_dyn())
        .tstart(&tstart)
        .tstop(&tstop)
        .energy_bounds(&e_min, &e_max)
        .image_type(image_type)
        .unit(unit);
    if let Some(wcs) = wcs {
        builder = builder.wcs(wcs);
    }
    Ok(builder.build()?)
}

/// Writes a tangent-plane sky image to the multi-extension container layout.
///
/// The primary HDU carries the first energy slice; further slices follow as
/// image extensions, then the EBOUNDS and STDGTI tables. Any existing file
/// at `path` is replaced, matching the ground software's clobber semantics.
///
/// # Errors
/// Fails for HEALPix-axis images, which this layout cannot represent, and
/// on any underlying FITS error.
pub fn write_sky_image<P: AsRef<Path>>(image: &SkyImage, path: P) -> Result<()> {
    let path = path.as_ref();
    if image.healpix_axis().is_some() {
        return Err(Error::UnsupportedImage);
    }
    if path.exists() {
        std::fs::remove_file(path)?;
    }

    let shape = image.contents().shape();
    let (ny, nx, ne) = (shape[1], shape[2], shape[3]);
    let keyword = image
        .image_type()
        .map_or("image", ImageType::keyword)
        .to_ascii_uppercase();
    let dimensions = [ny, nx];
    let description = ImageDescription {
        data_type: FitsImageType::Double,
        dimensions: &dimensions,
    };

    let mut file = FitsFile::create(path)
        .with_custom_primary(&description)
        .open()?;

    let plane = image.contents().index_axis(Axis(0), 0);
    for e in 0..ne {
        let extname = format!("{}{}", keyword, e + 1);
        let hdu = if e == 0 {
            let hdu = file.primary_hdu()?;
            hdu.write_key(&mut file, "EXTNAME", extname)?;
            hdu
        } else {
            file.create_image(extname, &description)?
        };

        let pixels: Vec<f64> = plane.index_axis(Axis(2), e).iter().copied().collect();
        hdu.write_image(&mut file, &pixels)?;
        hdu.write_key(&mut file, "BUNIT", image.unit().as_str())?;
        if let Some(wcs) = image.wcs() {
            write_wcs(&mut file, &hdu, wcs)?;
        }
        let band = &image.energy_bands()[e];
        hdu.write_key(&mut file, "E_MIN", band.e_min)?;
        hdu.write_key(&mut file, "E_MAX", band.e_max)?;
        hdu.write_key(&mut file, "EUNIT", Unit::Kiloelectronvolt.as_str())?;
    }

    let e_min_col = ColumnDescription::new("E_MIN")
        .with_type(ColumnDataType::Double)
        .create()?;
    let e_max_col = ColumnDescription::new("E_MAX")
        .with_type(ColumnDataType::Double)
        .create()?;
    let hdu = file.create_table("EBOUNDS", &[e_min_col, e_max_col])?;
    let e_min: Vec<f64> = image.energy_bands().iter().map(|b| b.e_min).collect();
    let e_max: Vec<f64> = image.energy_bands().iter().map(|b| b.e_max).collect();
    hdu.write_col(&mut file, "E_MIN", &e_min)?;
    hdu.write_col(&mut file, "E_MAX", &e_max)?;
    hdu.write_key(&mut file, "TUNIT1", Unit::Kiloelectronvolt.as_str())?;
    hdu.write_key(&mut file, "TUNIT2", Unit::Kiloelectronvolt.as_str())?;

    let start_col = ColumnDescription::new("START")
        .with_type(ColumnDataType::Double)
        .create()?;
    let stop_col = ColumnDescription::new("STOP")
        .with_type(ColumnDataType::Double)
        .create()?;
    let hdu = file.create_table("STDGTI", &[start_col, stop_col])?;
    let gti = image.gti();
    hdu.write_col(&mut file, "START", &[gti.start])?;
    hdu.write_col(&mut file, "STOP", &[gti.stop])?;
    hdu.write_key(&mut file, "TUNIT1", Unit::Second.as_str())?;
    hdu.write_key(&mut file, "TUNIT2", Unit::Second.as_str())?;

    Ok(())
}

/// Reads the celestial WCS keywords from an image header.
///
/// An image with none of the keywords is legal (detector tangent plane
/// only); no transform is attached and the downstream construction emits
/// the advisory warning. A partial keyword set is a format error.
fn read_wcs(file: &mut FitsFile, hdu: &fitsio::hdu::FitsHdu) -> Result<Option<Wcs>> {
    let keys = [
        "CRPIX1", "CRPIX2", "CRVAL1", "CRVAL2", "CDELT1", "CDELT2",
    ];
    let mut values = [0.0_f64; 6];
    let mut present = 0_usize;
    for (value, key) in values.iter_mut().zip(keys) {
        if let Some(v) = read_optional_key::<f64>(file, hdu, key)? {
            *value = v;
            present += 1;
        }
    }
    if present == 0 {
        return Ok(None);
    }
    if present != keys.len() {
        return Err(Error::Format(
            "incomplete world coordinate keywords: all of CRPIX/CRVAL/CDELT are required"
                .to_string(),
        ));
    }
    if let Some(ctype) = read_optional_key::<String>(file, hdu, "CTYPE1")? {
        if ctype.trim() != "RA---TAN" {
            return Err(Error::Format(format!(
                "unsupported celestial projection {ctype:?}; expected RA---TAN"
            )));
        }
    }
    Ok(Some(Wcs::new(
        [values[0], values[1]],
        [values[2], values[3]],
        [values[4], values[5]],
    )))
}

fn write_wcs(file: &mut FitsFile, hdu: &fitsio::hdu::FitsHdu, wcs: &Wcs) -> Result<()> {
    hdu.write_key(file, "CTYPE1", "RA---TAN")?;
    hdu.write_key(file, "CTYPE2", "DEC--TAN")?;
    hdu.write_key(file, "CRPIX1", wcs.crpix[0])?;
    hdu.write_key(file, "CRPIX2", wcs.crpix[1])?;
    hdu.write_key(file, "CRVAL1", wcs.crval[0])?;
    hdu.write_key(file, "CRVAL2", wcs.crval[1])?;
    hdu.write_key(file, "CDELT1", wcs.cdelt[0])?;
    hdu.write_key(file, "CDELT2", wcs.cdelt[1])?;
    Ok(())
}
