//! Pyramidal TIFF conversion.
//!
//! A source raster is decoded once, then written as a chain of tiled,
//! JPEG-compressed directories, each half the size of the previous one,
//! until a level fits inside a single tile.

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use derive_debug::Dbg;
use image::{
    DynamicImage, ImageBuffer, ImageReader, Pixel, PixelWithColorType,
    codecs::jpeg::JpegEncoder,
    imageops::{self, FilterType},
};
use tracing::{debug, trace};

use crate::{Error, ErrorContext, ErrorDetail};

pub mod batch;
mod tiff;

use tiff::{Directory, Photometric, TiffWriter};

pub use batch::{BatchMode, BatchReport, pyramids_from_directory, pyramids_from_index, update_pyramids};

/// Largest accepted tile edge. JPEG caps tile dimensions at 65535 and every
/// tile is allocated whole.
pub const MAX_TILE_SIZE: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidOptions {
    pub tile_size: u32,
    pub quality: u8,
}

impl Default for PyramidOptions {
    fn default() -> Self {
        Self {
            tile_size: 256,
            quality: 75,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidSummary {
    pub width: u32,
    pub height: u32,
    pub levels: usize,
    pub bytes: u64,
}

#[derive(Dbg)]
enum Raster {
    Rgb {
        #[dbg(skip)]
        data: image::RgbImage,
    },
    Luma {
        #[dbg(skip)]
        data: image::GrayImage,
    },
}

impl From<DynamicImage> for Raster {
    fn from(value: DynamicImage) -> Self {
        if value.color().has_color() {
            Self::Rgb {
                data: value.into_rgb8(),
            }
        } else {
            Self::Luma {
                data: value.into_luma8(),
            }
        }
    }
}

fn open(source: &Path) -> Result<ImageReader<BufReader<File>>, ErrorDetail> {
    ImageReader::open(source)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| ErrorDetail::DecodeImage(image::ImageError::IoError(e)))
}

/// Archival masters routinely decode past the reader's default allocation
/// cap, so no limits are applied.
fn decode(source: &Path) -> Result<DynamicImage, ErrorDetail> {
    let mut reader = open(source)?;
    reader.no_limits();
    reader.decode().map_err(ErrorDetail::DecodeImage)
}

fn encode_tiles<P>(
    level: &ImageBuffer<P, Vec<u8>>,
    dir: &Directory,
    quality: u8,
) -> Result<Vec<Vec<u8>>, ErrorDetail>
where
    P: Pixel<Subpixel = u8> + PixelWithColorType,
{
    let (width, height) = level.dimensions();
    let size = dir.tile_size;
    let mut tiles = Vec::with_capacity((dir.tiles_across() * dir.tiles_down()) as usize);
    for row in 0..dir.tiles_down() {
        for col in 0..dir.tiles_across() {
            let (x0, y0) = (col * size, row * size);
            // edge tiles repeat the last row and column
            let tile: ImageBuffer<P, Vec<u8>> = ImageBuffer::from_fn(size, size, |x, y| {
                *level.get_pixel((x0 + x).min(width - 1), (y0 + y).min(height - 1))
            });
            let mut buf = Vec::new();
            JpegEncoder::new_with_quality(&mut buf, quality)
                .encode_image(&tile)
                .map_err(ErrorDetail::EncodeTile)?;
            tiles.push(buf);
        }
    }
    Ok(tiles)
}

fn write_levels<P, W>(
    mut level: ImageBuffer<P, Vec<u8>>,
    photometric: Photometric,
    options: &PyramidOptions,
    out: W,
) -> Result<(usize, u64), ErrorDetail>
where
    P: Pixel<Subpixel = u8> + PixelWithColorType + 'static,
    W: std::io::Write,
{
    let mut writer = TiffWriter::new(out)?;
    let mut levels = 0;
    loop {
        let (width, height) = level.dimensions();
        let dir = Directory {
            width,
            height,
            tile_size: options.tile_size,
            photometric,
            reduced: levels > 0,
        };
        let tiles = encode_tiles(&level, &dir, options.quality)?;
        let last = width <= options.tile_size && height <= options.tile_size;
        writer.write_directory(&dir, &tiles, last)?;
        trace!(level = levels, width, height, tiles = tiles.len(), "wrote level");
        levels += 1;
        if last {
            break;
        }
        level = imageops::resize(
            &level,
            width.div_ceil(2),
            height.div_ceil(2),
            FilterType::Triangle,
        );
    }
    let (_, bytes) = writer.finish()?;
    Ok((levels, bytes))
}

fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.part"))
}

/// Runs `write` against a sibling `.part` file and renames it onto `dest`
/// only once `write` succeeded.
fn write_atomically<T>(
    dest: &Path,
    write: impl FnOnce(BufWriter<File>) -> Result<T, ErrorDetail>,
) -> Result<T, ErrorDetail> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(ErrorDetail::CreateDir)?;
    }
    let partial = partial_path(dest);
    let result = File::create(&partial)
        .map_err(ErrorDetail::WriteOutput)
        .and_then(|file| write(BufWriter::new(file)))
        .and_then(|value| {
            std::fs::rename(&partial, dest).map_err(ErrorDetail::WriteOutput)?;
            Ok(value)
        });
    if result.is_err() {
        let _ = std::fs::remove_file(&partial);
    }
    result
}

/// Decodes `source` and writes it to `dest` as a tiled pyramidal TIFF.
///
/// Blocking; callers on an async runtime should use `spawn_blocking`.
pub fn convert_to_pyramid(
    source: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    options: &PyramidOptions,
) -> Result<PyramidSummary, Error> {
    let source = source.as_ref();
    let dest = dest.as_ref();
    let ctx = ErrorContext::new(source);

    let image = decode(source).map_err(|e| ctx.error(e))?;
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(ctx.error(ErrorDetail::EmptyImage));
    }
    let raster = Raster::from(image);
    debug!(source = %source.display(), width, height, ?raster, "decoded");

    let (levels, bytes) = write_atomically(dest, |out| {
        let (levels, bytes) = match raster {
            Raster::Rgb { data } => write_levels(data, Photometric::YCbCr, options, out)?,
            Raster::Luma { data } => write_levels(data, Photometric::BlackIsZero, options, out)?,
        };
        Ok((levels, bytes))
    })
    .map_err(|e| ctx.error(e))?;

    Ok(PyramidSummary {
        width,
        height,
        levels,
        bytes,
    })
}
