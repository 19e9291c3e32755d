use clap::{Parser, Subcommand};
use std::path::PathBuf;

use eoprep::{CanonicalBand, CloudBand, ProductType};

#[derive(Parser)]
#[command(name = "eoprep", version, about = "EOPREP CLI")]
pub struct CliArgs {
    /// Enable logging (RUST_LOG overrides the default `info` level)
    #[arg(long, default_value_t = false, global = true)]
    pub log: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List every spectral index in the catalog
    Indices,

    /// Show the canonical bands an index needs, and their raw channels on a product type
    Bands {
        index: String,
        #[arg(long, value_enum)]
        product_type: Option<ProductType>,
    },

    /// Resolve a canonical band to a raw channel
    Resolve {
        #[arg(value_enum)]
        product_type: ProductType,
        #[arg(value_enum)]
        band: CanonicalBand,
    },

    /// Preprocess bands, cloud masks and indices of a Sentinel-3 product to GeoTIFF
    Process(ProcessArgs),
}

#[derive(clap::Args)]
pub struct ProcessArgs {
    /// Input product directory (*.SEN3)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// JSON parameter file; command-line options override its values
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// Canonical bands to preprocess
    #[arg(long = "band", value_enum)]
    pub bands: Vec<CanonicalBand>,

    /// Indices to compute
    #[arg(long = "index")]
    pub indices: Vec<String>,

    /// Cloud bands to extract
    #[arg(long = "clouds", value_enum)]
    pub clouds: Vec<CloudBand>,

    /// Output pixel size in meters
    #[arg(long)]
    pub resolution: Option<f64>,

    /// Calibration preset (SNAP, S3_PN_SLSTR_L1_06, S3_PN_SLSTR_L1_07, S3_PN_SLSTR_L1_08, NONE)
    #[arg(long)]
    pub calibration: Option<String>,

    /// Target CRS (e.g. EPSG:32631); defaults to the scene's UTM zone
    #[arg(long)]
    pub target_crs: Option<String>,

    /// Grid suffix of the reflective channels (an, ao, bn, bo, ...)
    #[arg(long)]
    pub suffix: Option<String>,
}
