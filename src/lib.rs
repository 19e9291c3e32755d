#![doc = r#"
EOPREP: multi-sensor satellite raster preprocessing.

This crate turns raw optical products into analysis-ready rasters: canonical
band mapping across sensors, radiometric calibration, radiance to reflectance
conversion with tie-point solar geometry, GCP geocoding, quality and cloud
masking, and a catalog of spectral indices evaluated on the result. It powers
the EOPREP CLI and can be embedded in your own Rust applications.

Requirements
------------
- GDAL development headers and runtime available on your system.
- The `gdalwarp` tool on `PATH` for geocoding.
- Rust 2024 edition toolchain.

Quick start: NDVI of a Sentinel-3 SLSTR product
-----------------------------------------------
```rust,no_run
use std::path::Path;
use eoprep::{PipelineParams, api::Product};

fn main() -> eoprep::Result<()> {
    let params = PipelineParams {
        resolution: Some(500.0),
        calibration: "S3_PN_SLSTR_L1_08".to_string(),
        ..Default::default()
    };
    let product = Product::open(Path::new("/data/S3B_SL_1_RBT____20191115T233722.SEN3"), &params)?;
    let ndvi = product.compute_index("NDVI")?;
    product.save(&ndvi, Path::new("/out"))?;
    Ok(())
}
```

Indices on your own arrays
--------------------------
```rust
use std::collections::BTreeMap;
use ndarray::array;
use eoprep::{CanonicalBand, evaluate_arrays};

fn main() -> eoprep::Result<()> {
    let mut bands = BTreeMap::new();
    bands.insert(CanonicalBand::RED, array![[0.2, 0.4]]);
    bands.insert(CanonicalBand::NIR, array![[0.6, 0.8]]);
    let out = evaluate_arrays("NDVI", &bands)?;
    assert!((out[[0, 0]] - 0.5).abs() < 1e-12);
    assert!((out[[0, 1]] - 1.0 / 3.0).abs() < 1e-12);
    Ok(())
}
```

Error handling
--------------
All public functions return `eoprep::Result<T>`; match on `eoprep::Error` to
handle specific cases.

```rust
use eoprep::{CanonicalBand, Error, ProductType, resolve_band};

match resolve_band(ProductType::L5_MSS, CanonicalBand::SWIR_1) {
    Ok(channel) => println!("SWIR_1 is channel {channel}"),
    Err(Error::BandUnavailable { band, product_type }) => {
        eprintln!("{band} is not carried by {product_type}")
    }
    Err(other) => eprintln!("Other error: {other}"),
}
```

Useful modules
--------------
- [`api`]: high-level product facade.
- [`core`]: band mapping, calibration, processing stages and the index catalog.
- [`types`]: canonical bands, cloud bands, product types.
- [`io`]: GDAL reader, `gdalwarp` GCP warp and writers.
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use core::calibration::CalibrationProfile;
pub use core::params::PipelineParams;
pub use core::raster::{RasterArray, SpatialMeta};
pub use error::{Error, Result};
pub use types::{CanonicalBand, CloudBand, ProductType, Resampling};

// Catalog and mapping
pub use core::bands::{BandMapping, resolve_band};
pub use core::index::{all_index_names, evaluate_arrays, evaluate_index, required_bands};

// Readers and writers
pub use io::gdal::{GdalError, GdalMetadata, GdalRasterReader};
pub use io::writers::metadata::{
    create_metadata_sidecar, embed_tiff_metadata, extract_metadata_fields,
};

// High-level API re-exports
pub use api::{Product, index_channels};
