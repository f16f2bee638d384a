use chrono::{NaiveTime, Timelike};
use exif::experimental::Writer;
use exif::{Context, Field, In, Rational, Tag, Value};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, RgbImage};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use std::io::Cursor;

use super::fields::{ExifFields, GpsFields};
use crate::error::EncodingError;

const MAX_QUALITY: u8 = 100;

const MARKER_APP0: u8 = 0xE0;
const MARKER_APP1: u8 = 0xE1;
const EXIF_PREFIX: &[u8] = b"Exif\0\0";
// The APP1 length field counts itself and the Exif\0\0 prefix.
const MAX_TIFF_LEN: usize = u16::MAX as usize - 2 - EXIF_PREFIX.len();

// GPS seconds are stored with four decimal places.
const SECONDS_DENOMINATOR: u32 = 10_000;

// Primary-IFD tags the TIFF writer derives itself or that only make sense
// alongside strip/tile data we never write.
const WRITER_OWNED_TAGS: &[u16] = &[
    0x8769, // ExifIFDPointer
    0x8825, // GPSInfoIFDPointer
    0x0111, // StripOffsets
    0x0117, // StripByteCounts
    0x0144, // TileOffsets
    0x0145, // TileByteCounts
    0x0201, // JPEGInterchangeFormat
    0x0202, // JPEGInterchangeFormatLength
];

/// Turns a raster plus GPS/EXIF blocks into JPEG bytes.
///
/// Split into two steps so a caller can keep the baseline encoding around
/// and fall back to it when [`embed`](MetadataEncoder::embed) fails.
pub trait MetadataEncoder: Send + Sync {
    /// Encode `raster` as a baseline JPEG with no injected metadata.
    fn serialize_baseline(&self, raster: &RgbImage) -> Result<Vec<u8>, EncodingError>;

    /// Rewrite `baseline` with its GPS and EXIF sub-IFDs replaced.
    fn embed(
        &self,
        baseline: &[u8],
        gps: &GpsFields,
        exif: &ExifFields,
    ) -> Result<Vec<u8>, EncodingError>;

    fn encode(
        &self,
        raster: &RgbImage,
        gps: &GpsFields,
        exif: &ExifFields,
    ) -> Result<Vec<u8>, EncodingError> {
        let baseline = self.serialize_baseline(raster)?;
        self.embed(&baseline, gps, exif)
    }
}

/// Encodes with `image`, then rebuilds the APP1 TIFF block with
/// `kamadak-exif` inside the `img-parts` segment list.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegMetadataEncoder;

impl JpegMetadataEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataEncoder for JpegMetadataEncoder {
    fn serialize_baseline(&self, raster: &RgbImage) -> Result<Vec<u8>, EncodingError> {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, MAX_QUALITY)
            .write_image(
                raster.as_raw(),
                raster.width(),
                raster.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| EncodingError::RasterSerializationFailed(e.to_string()))?;
        Ok(buf)
    }

    fn embed(
        &self,
        baseline: &[u8],
        gps: &GpsFields,
        exif: &ExifFields,
    ) -> Result<Vec<u8>, EncodingError> {
        // Open the source and confirm its container type.
        let format = image::guess_format(baseline)
            .map_err(|e| EncodingError::SourceUnreadable(e.to_string()))?;
        if format != ImageFormat::Jpeg {
            return Err(EncodingError::SourceUnreadable(format!(
                "expected a JPEG container, found {format:?}"
            )));
        }
        let mut jpeg = Jpeg::from_bytes(Bytes::copy_from_slice(baseline))
            .map_err(|e| EncodingError::SourceUnreadable(format!("failed to parse JPEG: {e}")))?;

        // Keep the existing top-level fields, drop every GPS/EXIF sub-IFD field.
        let mut fields = match jpeg.exif() {
            Some(raw) => preserved_primary_fields(&raw)?,
            None => Vec::new(),
        };
        log::debug!("Preserving {} existing primary IFD field(s)", fields.len());
        fields.extend(gps_ifd_fields(gps)?);
        fields.extend(exif_ifd_fields(exif));

        let tiff = write_tiff(&fields)?;
        jpeg.set_exif(Some(Bytes::from(tiff)));
        move_exif_after_app0(&mut jpeg);

        Ok(jpeg.encoder().bytes().to_vec())
    }
}

/// Parse an existing EXIF block and return its primary-IFD fields that are
/// neither sub-IFD contents nor writer-managed.
fn preserved_primary_fields(raw: &[u8]) -> Result<Vec<Field>, EncodingError> {
    let existing = exif::Reader::new()
        .read_raw(raw.to_vec())
        .map_err(|e| EncodingError::SourceUnreadable(format!("existing EXIF block: {e}")))?;

    Ok(existing
        .fields()
        .filter(|f| f.ifd_num == In::PRIMARY && f.tag.context() == Context::Tiff)
        .filter(|f| !WRITER_OWNED_TAGS.contains(&f.tag.number()))
        .map(|f| Field {
            tag: f.tag,
            ifd_num: f.ifd_num,
            value: f.value.clone(),
        })
        .collect())
}

fn write_tiff(fields: &[Field]) -> Result<Vec<u8>, EncodingError> {
    let mut writer = Writer::new();
    for field in fields {
        writer.push_field(field);
    }

    let mut buf = Cursor::new(Vec::new());
    writer
        .write(&mut buf, false)
        .map_err(|e| EncodingError::DestinationWriteFailed(format!("TIFF block: {e}")))?;

    let tiff = buf.into_inner();
    if tiff.len() > MAX_TIFF_LEN {
        return Err(EncodingError::DestinationWriteFailed(format!(
            "EXIF block of {} bytes does not fit in one APP1 segment",
            tiff.len()
        )));
    }
    Ok(tiff)
}

fn ascii(tag: Tag, value: &str) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![value.as_bytes().to_vec()]),
    }
}

fn gps_ifd_fields(gps: &GpsFields) -> Result<Vec<Field>, EncodingError> {
    let time = NaiveTime::parse_from_str(&gps.time_stamp, "%H:%M:%S").map_err(|e| {
        EncodingError::DestinationWriteFailed(format!(
            "GPS time stamp '{}' is malformed: {e}",
            gps.time_stamp
        ))
    })?;

    Ok(vec![
        ascii(Tag::GPSLatitudeRef, gps.latitude_ref.as_str()),
        Field {
            tag: Tag::GPSLatitude,
            ifd_num: In::PRIMARY,
            value: Value::Rational(degrees_to_dms(gps.latitude)),
        },
        ascii(Tag::GPSLongitudeRef, gps.longitude_ref.as_str()),
        Field {
            tag: Tag::GPSLongitude,
            ifd_num: In::PRIMARY,
            value: Value::Rational(degrees_to_dms(gps.longitude)),
        },
        Field {
            tag: Tag::GPSAltitudeRef,
            ifd_num: In::PRIMARY,
            value: Value::Byte(vec![gps.altitude_ref]),
        },
        Field {
            tag: Tag::GPSTimeStamp,
            ifd_num: In::PRIMARY,
            value: Value::Rational(vec![
                whole(time.hour()),
                whole(time.minute()),
                whole(time.second()),
            ]),
        },
        ascii(Tag::GPSDateStamp, &gps.date_stamp),
    ])
}

fn exif_ifd_fields(exif: &ExifFields) -> Vec<Field> {
    vec![
        ascii(Tag::DateTimeOriginal, &exif.date_time_original),
        ascii(Tag::DateTimeDigitized, &exif.date_time_digitized),
    ]
}

fn whole(n: u32) -> Rational {
    Rational { num: n, denom: 1 }
}

/// Split an unsigned decimal-degree magnitude into degree, minute and second
/// rationals, carrying so that minutes and seconds stay below 60.
pub(crate) fn degrees_to_dms(magnitude: f64) -> Vec<Rational> {
    let mut degrees = magnitude.trunc() as u32;
    let minutes_f = (magnitude - degrees as f64) * 60.0;
    let mut minutes = minutes_f.trunc() as u32;
    let mut seconds =
        ((minutes_f - minutes as f64) * 60.0 * SECONDS_DENOMINATOR as f64).round() as u32;

    if seconds >= 60 * SECONDS_DENOMINATOR {
        seconds -= 60 * SECONDS_DENOMINATOR;
        minutes += 1;
    }
    if minutes >= 60 {
        minutes -= 60;
        degrees += 1;
    }

    vec![
        whole(degrees),
        whole(minutes),
        Rational {
            num: seconds,
            denom: SECONDS_DENOMINATOR,
        },
    ]
}

/// Find the position of the EXIF APP1 segment in a JPEG.
fn find_exif_segment_pos(jpeg: &Jpeg) -> Option<usize> {
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == MARKER_APP1 && s.contents().starts_with(EXIF_PREFIX))
}

/// `set_exif` appends the segment wherever img-parts sees fit; readers expect
/// it directly after the JFIF header (or first, without one).
fn move_exif_after_app0(jpeg: &mut Jpeg) {
    let Some(exif_pos) = find_exif_segment_pos(jpeg) else {
        return;
    };
    let target = jpeg
        .segments()
        .iter()
        .position(|s| s.marker() == MARKER_APP0)
        .map(|p| p + 1)
        .unwrap_or(0);

    if exif_pos != target {
        let segments = jpeg.segments_mut();
        let seg = segments.remove(exif_pos);
        let target = if target > exif_pos { target - 1 } else { target };
        segments.insert(target, seg);
    }
}
