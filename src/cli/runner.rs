use tracing::info;
use tracing_subscriber::EnvFilter;

use eoprep::api::{Product, index_channels};
use eoprep::core::product::Capabilities;
use eoprep::{PipelineParams, ProductType, all_index_names, required_bands, resolve_band};

use super::args::{CliArgs, Command, ProcessArgs};
use super::errors::AppError;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn params_from(args: &ProcessArgs) -> Result<PipelineParams, AppError> {
    let mut params = match &args.params {
        Some(path) => PipelineParams::from_json_file(path)?,
        None => PipelineParams::default(),
    };
    if args.resolution.is_some() {
        params.resolution = args.resolution;
    }
    if let Some(cal) = &args.calibration {
        params.calibration = cal.clone();
    }
    if args.target_crs.is_some() {
        params.target_crs = args.target_crs.clone();
    }
    if let Some(suffix) = &args.suffix {
        params.suffix = suffix.clone();
    }
    params.output_dir = args.output_dir.clone();
    params.validate()?;
    Ok(params)
}

/// Every requested index must be computable on the product before any band is
/// processed
fn check_indices(product_type: ProductType, names: &[String]) -> Result<(), AppError> {
    for name in names {
        index_channels(product_type, name)?;
    }
    Ok(())
}

fn process(args: ProcessArgs) -> Result<(), AppError> {
    let input = args.input.clone().ok_or(AppError::MissingArgument {
        arg: "--input".to_string(),
    })?;
    let output_dir = args.output_dir.clone().ok_or(AppError::MissingArgument {
        arg: "--output-dir".to_string(),
    })?;
    if args.bands.is_empty() && args.indices.is_empty() && args.clouds.is_empty() {
        return Err(AppError::NothingRequested);
    }
    let params = params_from(&args)?;
    std::fs::create_dir_all(&output_dir)?;
    let product = Product::open(&input, &params)?;
    check_indices(product.product_type(), &args.indices)?;
    info!("Processing {:?} -> {:?}", input, output_dir);

    let mut written = 0;
    for &band in &args.bands {
        // persisted by the pipeline under the output directory
        product.preprocess(band)?;
        if let Some(path) = product.band_file(band)? {
            info!("{} written to {:?}", band, path);
        }
        written += 1;
    }
    for &band in &args.clouds {
        if !product.has_cloud_band(band) {
            return Err(AppError::NoCloudBand {
                product: product.condensed_name(),
                band: band.to_string(),
            });
        }
        product.save(&product.load_clouds(band)?, &output_dir)?;
        written += 1;
    }
    for name in &args.indices {
        let raster = product.compute_index(name)?;
        product.save(&raster, &output_dir)?;
        written += 1;
    }
    info!("Processing complete! {} layers written", written);
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.log {
        init_logging();
    }

    match args.command {
        Command::Indices => {
            for name in all_index_names()? {
                println!("{name}");
            }
        }
        Command::Bands {
            index,
            product_type,
        } => match product_type {
            Some(pt) => {
                for (band, channel) in index_channels(pt, &index)? {
                    println!("{band}\t{channel}");
                }
            }
            None => {
                for band in required_bands(&index)? {
                    println!("{band}");
                }
            }
        },
        Command::Resolve { product_type, band } => {
            println!("{}", resolve_band(product_type, band)?);
        }
        Command::Process(process_args) => process(process_args)?,
    }
    Ok(())
}
