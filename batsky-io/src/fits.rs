//! Thin result-returning helpers over the `fitsio` API.

use crate::error::{Error, Result};
use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::headers::ReadsKey;
use fitsio::FitsFile;

/// cfitsio status codes for a keyword that does not exist.
const KEY_NO_EXIST: i32 = 202;
const BAD_KEYCHAR: i32 = 204;

/// Reads a header keyword that may or may not exist.
pub(crate) fn read_optional_key<T: ReadsKey>(
    file: &mut FitsFile,
    hdu: &FitsHdu,
    keyword: &str,
) -> Result<Option<T>> {
    match hdu.read_key(file, keyword) {
        Ok(value) => Ok(Some(value)),
        Err(fitsio::errors::Error::Fits(e)) if e.status == KEY_NO_EXIST || e.status == BAD_KEYCHAR => {
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Reads a header keyword that must exist.
pub(crate) fn read_required_key<T: ReadsKey>(
    file: &mut FitsFile,
    hdu: &FitsHdu,
    keyword: &str,
) -> Result<T> {
    read_optional_key(file, hdu, keyword)?.ok_or_else(|| {
        Error::Format(format!("required header keyword {keyword} is missing"))
    })
}

/// The dimensions of an image HDU, `[ny, nx]` for 2-D data.
pub(crate) fn image_shape(hdu: &FitsHdu) -> Result<Vec<usize>> {
    match &hdu.info {
        HduInfo::ImageInfo { shape, .. } => Ok(shape.clone()),
        _ => Err(Error::Format(
            "expected an image extension but found a table".to_string(),
        )),
    }
}

/// Whether an HDU is an image with no data, such as an empty primary.
pub(crate) fn image_is_empty(hdu: &FitsHdu) -> bool {
    match &hdu.info {
        HduInfo::ImageInfo { shape, .. } => shape.is_empty() || shape.iter().product::<usize>() == 0,
        _ => false,
    }
}
