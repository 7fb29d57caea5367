//! Little-endian classic TIFF writer for tiled, JPEG-compressed image
//! directories chained one after another.
//!
//! Each directory is laid out as `IFD | out-of-line values | tile data`, so
//! the offset of the following directory is known as soon as the tiles of
//! the current one are encoded.

use std::io::Write;

use crate::ErrorDetail;

const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;

const NEW_SUBFILE_TYPE: u16 = 254;
const IMAGE_WIDTH: u16 = 256;
const IMAGE_LENGTH: u16 = 257;
const BITS_PER_SAMPLE: u16 = 258;
const COMPRESSION: u16 = 259;
const PHOTOMETRIC_INTERPRETATION: u16 = 262;
const SAMPLES_PER_PIXEL: u16 = 277;
const PLANAR_CONFIGURATION: u16 = 284;
const TILE_WIDTH: u16 = 322;
const TILE_LENGTH: u16 = 323;
const TILE_OFFSETS: u16 = 324;
const TILE_BYTE_COUNTS: u16 = 325;
const YCBCR_SUBSAMPLING: u16 = 530;

const COMPRESSION_JPEG: u32 = 7;
const SUBFILE_REDUCED_RESOLUTION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Photometric {
    BlackIsZero,
    YCbCr,
}

impl Photometric {
    fn code(self) -> u32 {
        match self {
            Self::BlackIsZero => 1,
            Self::YCbCr => 6,
        }
    }

    fn samples_per_pixel(self) -> u32 {
        match self {
            Self::BlackIsZero => 1,
            Self::YCbCr => 3,
        }
    }
}

/// One resolution level.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Directory {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub photometric: Photometric,
    pub reduced: bool,
}

impl Directory {
    pub(crate) fn tiles_across(&self) -> u32 {
        self.width.div_ceil(self.tile_size)
    }

    pub(crate) fn tiles_down(&self) -> u32 {
        self.height.div_ceil(self.tile_size)
    }
}

struct Entry {
    tag: u16,
    typ: u16,
    values: Vec<u32>,
}

impl Entry {
    fn short(tag: u16, values: Vec<u32>) -> Self {
        Self {
            tag,
            typ: TYPE_SHORT,
            values,
        }
    }

    fn long(tag: u16, values: Vec<u32>) -> Self {
        Self {
            tag,
            typ: TYPE_LONG,
            values,
        }
    }

    fn value_bytes(&self) -> Vec<u8> {
        match self.typ {
            TYPE_SHORT => self
                .values
                .iter()
                .flat_map(|v| (*v as u16).to_le_bytes())
                .collect(),
            _ => self.values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }
}

fn to_offset(pos: u64) -> Result<u32, ErrorDetail> {
    u32::try_from(pos).map_err(|_| ErrorDetail::OutputTooLarge)
}

pub(crate) struct TiffWriter<W> {
    out: W,
    pos: u64,
}

impl<W: Write> TiffWriter<W> {
    pub(crate) fn new(mut out: W) -> Result<Self, ErrorDetail> {
        out.write_all(b"II")
            .and_then(|_| out.write_all(&42u16.to_le_bytes()))
            .and_then(|_| out.write_all(&8u32.to_le_bytes()))
            .map_err(ErrorDetail::WriteOutput)?;
        Ok(Self { out, pos: 8 })
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ErrorDetail> {
        self.out.write_all(bytes).map_err(ErrorDetail::WriteOutput)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }

    /// Writes one directory with its tiles in row-major order. `last` ends
    /// the directory chain.
    pub(crate) fn write_directory(
        &mut self,
        dir: &Directory,
        tiles: &[Vec<u8>],
        last: bool,
    ) -> Result<(), ErrorDetail> {
        debug_assert_eq!(
            tiles.len() as u64,
            dir.tiles_across() as u64 * dir.tiles_down() as u64
        );
        let spp = dir.photometric.samples_per_pixel();

        let mut entries = vec![
            Entry::long(
                NEW_SUBFILE_TYPE,
                vec![if dir.reduced {
                    SUBFILE_REDUCED_RESOLUTION
                } else {
                    0
                }],
            ),
            Entry::long(IMAGE_WIDTH, vec![dir.width]),
            Entry::long(IMAGE_LENGTH, vec![dir.height]),
            Entry::short(BITS_PER_SAMPLE, vec![8; spp as usize]),
            Entry::short(COMPRESSION, vec![COMPRESSION_JPEG]),
            Entry::short(PHOTOMETRIC_INTERPRETATION, vec![dir.photometric.code()]),
            Entry::short(SAMPLES_PER_PIXEL, vec![spp]),
            Entry::short(PLANAR_CONFIGURATION, vec![1]),
            Entry::long(TILE_WIDTH, vec![dir.tile_size]),
            Entry::long(TILE_LENGTH, vec![dir.tile_size]),
            Entry::long(TILE_OFFSETS, vec![0; tiles.len()]),
            Entry::long(
                TILE_BYTE_COUNTS,
                tiles
                    .iter()
                    .map(|t| to_offset(t.len() as u64))
                    .collect::<Result<_, _>>()?,
            ),
        ];
        if dir.photometric == Photometric::YCbCr {
            entries.push(Entry::short(YCBCR_SUBSAMPLING, vec![1, 1]));
        }

        let ifd_len = 2 + 12 * entries.len() as u64 + 4;
        let extra_len: u64 = entries
            .iter()
            .map(|e| e.value_bytes().len() as u64)
            .filter(|len| *len > 4)
            .sum();
        let tiles_start = self.pos + ifd_len + extra_len;

        let mut cursor = tiles_start;
        let offsets = tiles
            .iter()
            .map(|t| {
                let offset = to_offset(cursor);
                cursor += t.len() as u64;
                offset
            })
            .collect::<Result<Vec<_>, _>>()?;
        // next directory starts on a word boundary
        let padding = cursor % 2;
        let next = if last { 0 } else { to_offset(cursor + padding)? };
        if let Some(entry) = entries.iter_mut().find(|e| e.tag == TILE_OFFSETS) {
            entry.values = offsets;
        }

        let mut ifd = Vec::with_capacity(ifd_len as usize);
        let mut extra = Vec::with_capacity(extra_len as usize);
        ifd.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for entry in &entries {
            let bytes = entry.value_bytes();
            ifd.extend_from_slice(&entry.tag.to_le_bytes());
            ifd.extend_from_slice(&entry.typ.to_le_bytes());
            ifd.extend_from_slice(&(entry.values.len() as u32).to_le_bytes());
            if bytes.len() <= 4 {
                let mut inline = [0u8; 4];
                inline[..bytes.len()].copy_from_slice(&bytes);
                ifd.extend_from_slice(&inline);
            } else {
                let offset = to_offset(self.pos + ifd_len + extra.len() as u64)?;
                ifd.extend_from_slice(&offset.to_le_bytes());
                extra.extend_from_slice(&bytes);
            }
        }
        ifd.extend_from_slice(&next.to_le_bytes());

        self.write(&ifd)?;
        self.write(&extra)?;
        for tile in tiles {
            self.write(tile)?;
        }
        if padding == 1 {
            self.write(&[0])?;
        }
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Result<(W, u64), ErrorDetail> {
        self.out.flush().map_err(ErrorDetail::WriteOutput)?;
        Ok((self.out, self.pos))
    }
}
