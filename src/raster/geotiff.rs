//! Reads and writes single and multi-band GeoTIFF rasters.
//!
//! Bands are written as successive pages (image file directories), each a
//! single-sample grid. Pages holding several interleaved samples per pixel,
//! as GDAL writes them, are read as one band per sample. Georeferencing uses the pixel-scale/tiepoint pair, the
//! GeoKey directory for the EPSG code, and GDAL's nodata tag.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Seek},
    path::Path,
};

use ndarray::Array2;
use tiff::{
    decoder::{Decoder, DecodingResult, Limits},
    encoder::{colortype, TiffEncoder},
    tags::Tag,
    ColorType,
};

use super::{GeoRef, RasterGrid, DEFAULT_NODATA};
use crate::error::RasterError;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Reads the first band of a raster.
pub fn read_raster(path: &Path) -> Result<RasterGrid, RasterError> {
    read_band(path, 1)
}

/// Reads a 1-based band.
pub fn read_band(path: &Path, band: usize) -> Result<RasterGrid, RasterError> {
    let bands = read_bands(path)?;
    let available = bands.len();

    band.checked_sub(1)
        .and_then(|index| bands.into_iter().nth(index))
        .ok_or_else(|| RasterError::MissingBand {
            path: path.to_path_buf(),
            band,
            available,
        })
}

/// Reads every band of a raster, in page order.
pub fn read_bands(path: &Path) -> Result<Vec<RasterGrid>, RasterError> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());

    let mut bands = decode_page(&mut decoder, path)?;
    while decoder.more_images() {
        decoder.next_image()?;
        bands.extend(decode_page(&mut decoder, path)?);
    }

    Ok(bands)
}

pub fn write_raster(grid: &RasterGrid, path: &Path) -> Result<(), RasterError> {
    write_bands(std::slice::from_ref(grid), path)
}

/// Writes each grid as one `f32` page of a GeoTIFF.
pub fn write_bands(bands: &[RasterGrid], path: &Path) -> Result<(), RasterError> {
    if bands.is_empty() {
        return Err(RasterError::NoBands(path.to_path_buf()));
    }

    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;

    for band in bands {
        let (rows, cols) = band.shape();
        let t = &band.georef.transform;
        let geokeys = geokey_directory(band.georef.epsg);
        let nodata = band.nodata.to_string();

        let mut image = encoder.new_image::<colortype::Gray32Float>(cols as u32, rows as u32)?;
        let directory = image.encoder();
        directory.write_tag(Tag::ModelPixelScaleTag, &[t[1], -t[5], 0.0][..])?;
        directory.write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, t[0], t[3], 0.0][..])?;
        directory.write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])?;
        directory.write_tag(Tag::GdalNodata, nodata.as_str())?;

        let samples: Vec<f32> = band.data.iter().copied().collect();
        image.write_data(&samples)?;
    }

    Ok(())
}

/// Decodes one page into one grid per sample.
fn decode_page<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
) -> Result<Vec<RasterGrid>, RasterError> {
    let samples = match decoder.colortype()? {
        ColorType::Gray(_) => 1,
        ColorType::GrayA(_) => 2,
        ColorType::RGB(_) => 3,
        ColorType::RGBA(_) | ColorType::CMYK(_) => 4,
        ColorType::Multiband { num_samples, .. } => usize::from(num_samples),
        _ => return Err(RasterError::UnsupportedSampleFormat(path.to_path_buf())),
    };

    let (width, height) = decoder.dimensions()?;
    let georef = read_georef(decoder);
    let nodata = decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f32>().ok())
        .unwrap_or(DEFAULT_NODATA);

    let values: Vec<f32> = match decoder.read_image()? {
        DecodingResult::U8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        _ => return Err(RasterError::UnsupportedSampleFormat(path.to_path_buf())),
    };

    let shape = (height as usize, width as usize);
    if samples == 1 {
        let data = Array2::from_shape_vec(shape, values)?;
        return Ok(vec![RasterGrid::new(data, nodata, georef)]);
    }

    (0..samples)
        .map(|sample| -> Result<RasterGrid, RasterError> {
            let band = values.iter().skip(sample).step_by(samples).copied().collect();
            let data = Array2::from_shape_vec(shape, band)?;
            Ok(RasterGrid::new(data, nodata, georef.clone()))
        })
        .collect()
}

fn read_georef<R: Read + Seek>(decoder: &mut Decoder<R>) -> GeoRef {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok();
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok();

    let transform = match (scale, tiepoint) {
        (Some(s), Some(t)) if s.len() >= 2 && t.len() >= 6 => {
            [t[3] - t[0] * s[0], s[0], 0.0, t[4] + t[1] * s[1], 0.0, -s[1]]
        }
        _ => GeoRef::default().transform,
    };

    let epsg = decoder
        .get_tag_u16_vec(Tag::GeoKeyDirectoryTag)
        .ok()
        .and_then(|keys| epsg_from_geokeys(&keys));

    GeoRef { transform, epsg }
}

fn geokey_directory(epsg: Option<u16>) -> Vec<u16> {
    // header: version, revision, minor revision, key count
    let mut keys = vec![1, 1, 0, 0];

    // geographic CRS codes live in 4000-4999
    let crs = epsg.map(|code| match code {
        4000..=4999 => (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE, code),
        _ => (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE, code),
    });

    if let Some((model, _, _)) = crs {
        keys.extend([GT_MODEL_TYPE, 0, 1, model]);
    }
    keys.extend([GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
    if let Some((_, key, code)) = crs {
        keys.extend([key, 0, 1, code]);
    }

    keys[3] = ((keys.len() - 4) / 4) as u16;
    keys
}

fn epsg_from_geokeys(keys: &[u16]) -> Option<u16> {
    let count = *keys.get(3)? as usize;
    let entries: Vec<&[u16]> = keys
        .get(4..)?
        .chunks_exact(4)
        .take(count)
        // location 0 means the value is stored inline
        .filter(|entry| entry[1] == 0)
        .collect();

    [PROJECTED_CS_TYPE, GEOGRAPHIC_TYPE].iter().find_map(|key| {
        entries
            .iter()
            .find(|entry| entry[0] == *key)
            .map(|entry| entry[3])
    })
}

// -- Tests -------------------------------------------------------------------
