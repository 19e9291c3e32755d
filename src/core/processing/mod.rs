//! Processing stages: element-wise operators, tie-point resampling, GCP
//! geocoding, quality/cloud masking and the per-band pipeline that chains them.
pub mod cache;
pub mod geocode;
pub mod mask;
pub mod ops;
pub mod pipeline;
pub mod tie_point;

pub use geocode::{Geocoder, Warper};
pub use mask::{ConnectedComponentSieve, Sieve};
pub use pipeline::{Preprocessor, ProductSource};
