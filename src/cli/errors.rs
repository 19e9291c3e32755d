use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Nothing to process: pass at least one --band, --index or --clouds")]
    NothingRequested,

    #[error("Product {product} has no {band} cloud band")]
    NoCloudBand { product: String, band: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Eoprep(#[from] eoprep::Error),
}
