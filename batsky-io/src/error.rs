//! I/O error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// FITS library error.
    #[error("FITS error: {0}")]
    Fits(#[from] fitsio::errors::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] batsky_core::Error),

    /// A referenced file does not exist.
    #[error("the file {0} does not seem to exist; please double check that it does")]
    MissingFile(PathBuf),

    /// An extension name outside the sky-image vocabulary.
    #[error(
        "unexpected extension name {0:?}: sky image files contain only image-type, \
         EBOUNDS, and STDGTI extensions"
    )]
    UnrecognizedExtension(String),

    /// A required extension is absent.
    #[error("missing required {0} extension")]
    MissingExtension(&'static str),

    /// The file violates the sky-image container layout.
    #[error("invalid sky image file: {0}")]
    Format(String),

    /// Multi-timebin sky image files are unsupported.
    #[error("the sky image file holds {0} time bins, which is not supported; expected exactly 1")]
    MultipleTimeBins(usize),

    /// The tangent-plane file layout cannot hold a HEALPix image.
    #[error("healpix sky images cannot be written to the tangent-plane file layout")]
    UnsupportedImage,

    /// A ground-software tool exited with a nonzero status.
    #[error("the {name} run failed with status {status}: {output}")]
    ToolFailed {
        name: String,
        status: i32,
        output: String,
    },
}
