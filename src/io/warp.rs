use std::path::Path;
use std::process::Command;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use tracing::{debug, info};

use crate::core::processing::geocode::{GcpSet, WarpRequest, Warper};
use crate::core::raster::{RasterArray, SpatialMeta};
use crate::error::Result;
use crate::io::gdal::{GdalError, GdalRasterReader};
use crate::io::writers::tiff::write_tiff_f32;
use crate::types::Resampling;

/// GCP warp through the `gdalwarp` tool with thin-plate-spline transforms.
///
/// The sensor-grid array is written to a scratch GeoTIFF, wrapped in a VRT
/// carrying the control points, warped, and read back.
#[derive(Debug, Clone)]
pub struct GdalWarper {
    program: String,
}

impl Default for GdalWarper {
    fn default() -> Self {
        Self {
            program: "gdalwarp".to_string(),
        }
    }
}

impl GdalWarper {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

fn xml_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> std::result::Result<(), GdalError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// VRT of a single-band Float32 raster georeferenced only by `gcps`
pub fn gcp_vrt(
    source: &Path,
    shape: (usize, usize),
    gcps: &GcpSet,
    gcp_crs: &str,
) -> std::result::Result<String, GdalError> {
    let (rows, cols) = shape;
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    let mut root = BytesStart::new("VRTDataset");
    root.push_attribute(("rasterXSize", cols.to_string().as_str()));
    root.push_attribute(("rasterYSize", rows.to_string().as_str()));
    writer.write_event(Event::Start(root))?;

    let mut list = BytesStart::new("GCPList");
    list.push_attribute(("Projection", gcp_crs));
    writer.write_event(Event::Start(list))?;
    for (i, p) in gcps.points.iter().enumerate() {
        let mut gcp = BytesStart::new("GCP");
        gcp.push_attribute(("Id", (i + 1).to_string().as_str()));
        gcp.push_attribute(("Pixel", p.col.to_string().as_str()));
        gcp.push_attribute(("Line", p.row.to_string().as_str()));
        gcp.push_attribute(("X", p.lon.to_string().as_str()));
        gcp.push_attribute(("Y", p.lat.to_string().as_str()));
        gcp.push_attribute(("Z", p.elevation.to_string().as_str()));
        writer.write_event(Event::Empty(gcp))?;
    }
    writer.write_event(Event::End(BytesEnd::new("GCPList")))?;

    let mut band = BytesStart::new("VRTRasterBand");
    band.push_attribute(("dataType", "Float32"));
    band.push_attribute(("band", "1"));
    writer.write_event(Event::Start(band))?;
    xml_element(&mut writer, "NoDataValue", "nan")?;
    writer.write_event(Event::Start(BytesStart::new("SimpleSource")))?;
    let mut filename = BytesStart::new("SourceFilename");
    filename.push_attribute(("relativeToVRT", "0"));
    writer.write_event(Event::Start(filename))?;
    writer.write_event(Event::Text(BytesText::new(&source.display().to_string())))?;
    writer.write_event(Event::End(BytesEnd::new("SourceFilename")))?;
    xml_element(&mut writer, "SourceBand", "1")?;
    writer.write_event(Event::End(BytesEnd::new("SimpleSource")))?;
    writer.write_event(Event::End(BytesEnd::new("VRTRasterBand")))?;

    writer.write_event(Event::End(BytesEnd::new("VRTDataset")))?;
    String::from_utf8(writer.into_inner())
        .map_err(|e| GdalError::UnsupportedFormat(format!("VRT is not UTF-8: {e}")))
}

/// `gdalwarp` arguments of a GCP/TPS warp
pub fn warp_args(request: &WarpRequest<'_>, input: &Path, output: &Path) -> Vec<String> {
    let res = request.resolution.to_string();
    vec![
        "-of".into(),
        "GTiff".into(),
        "-overwrite".into(),
        "-r".into(),
        request.resampling.gdal_name().into(),
        "-tps".into(),
        "-s_srs".into(),
        request.source_crs.into(),
        "-t_srs".into(),
        request.target_crs.into(),
        "-tr".into(),
        res.clone(),
        res,
        "-dstnodata".into(),
        request.nodata.to_string(),
        input.display().to_string(),
        output.display().to_string(),
    ]
}

impl Warper for GdalWarper {
    fn warp_gcps(&self, request: &WarpRequest<'_>) -> Result<RasterArray> {
        let scratch = tempfile::Builder::new()
            .prefix(&format!("{}_", request.name))
            .tempdir()?;
        let tmp_in = scratch.path().join("source.tif");
        let tmp_vrt = scratch.path().join("source.vrt");
        let tmp_out = scratch.path().join("warped.tif");

        let shape = request.source.dim();
        let source = RasterArray::new(request.name, request.source.clone(), SpatialMeta::default());
        // Close the dataset before gdalwarp opens it
        drop(write_tiff_f32(&tmp_in, &source)?);
        std::fs::write(&tmp_vrt, gcp_vrt(&tmp_in, shape, request.gcps, request.source_crs)?)?;

        let args = warp_args(request, &tmp_vrt, &tmp_out);
        debug!("{} {}", self.program, args.join(" "));
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| GdalError::Warp(format!("cannot run {}: {}", self.program, e)))?;
        if !output.status.success() {
            // Best-effort cleanup
            let _ = std::fs::remove_file(&tmp_out);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GdalError::Warp(stderr).into());
        }

        let warped = GdalRasterReader::open(&tmp_out)?.read_raster(request.name)?;
        let (rows, cols) = warped.shape();
        info!(
            "Warped {} from {:?} to {}x{} in {}",
            request.name, shape, cols, rows, request.target_crs
        );
        Ok(warped.renamed(request.name))
    }
}
