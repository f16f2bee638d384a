use anyhow::{Context as _, Result};
use exif::{Context, Exif, In, Rational, Tag, Value};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use std::path::Path;

use super::fields::{ExifFields, GpsFields, LatitudeRef, LongitudeRef};

/// GPS/EXIF fields recovered from an encoded JPEG.
///
/// Only understands the fields this crate writes. `gps` / `exif` are `None`
/// unless every field of the block is present and well-formed, while the
/// `has_*_ifd` flags report whether the sub-IFD exists at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddedMetadata {
    pub gps: Option<GpsFields>,
    pub exif: Option<ExifFields>,
    pub has_gps_ifd: bool,
    pub has_exif_ifd: bool,
}

impl EmbeddedMetadata {
    /// True when neither a GPS nor an EXIF sub-IFD is present.
    pub fn is_empty(&self) -> bool {
        !self.has_gps_ifd && !self.has_exif_ifd
    }
}

/// Read the embedded GPS/EXIF blocks from JPEG bytes.
pub fn read_embedded(bytes: &[u8]) -> Result<EmbeddedMetadata> {
    let jpeg = Jpeg::from_bytes(Bytes::copy_from_slice(bytes))
        .map_err(|e| anyhow::anyhow!("Failed to parse JPEG: {e}"))?;

    let Some(raw) = jpeg.exif() else {
        log::debug!("No EXIF segment found");
        return Ok(EmbeddedMetadata::default());
    };

    let exif = exif::Reader::new()
        .read_raw(raw.to_vec())
        .context("Failed to parse EXIF block")?;

    Ok(EmbeddedMetadata {
        gps: read_gps(&exif),
        exif: read_dates(&exif),
        has_gps_ifd: exif.fields().any(|f| f.tag.context() == Context::Gps),
        has_exif_ifd: exif.fields().any(|f| f.tag.context() == Context::Exif),
    })
}

/// Read the embedded GPS/EXIF blocks from a JPEG file.
pub fn read_embedded_file(path: &Path) -> Result<EmbeddedMetadata> {
    let bytes = std::fs::read(path).context("Failed to read image file")?;
    read_embedded(&bytes)
}

fn read_gps(exif: &Exif) -> Option<GpsFields> {
    let latitude_ref = LatitudeRef::parse(&ascii(exif, Tag::GPSLatitudeRef)?)?;
    let longitude_ref = LongitudeRef::parse(&ascii(exif, Tag::GPSLongitudeRef)?)?;
    let latitude = dms_to_degrees(rationals(exif, Tag::GPSLatitude)?)?;
    let longitude = dms_to_degrees(rationals(exif, Tag::GPSLongitude)?)?;

    let altitude_ref = match &exif.get_field(Tag::GPSAltitudeRef, In::PRIMARY)?.value {
        Value::Byte(v) => *v.first()?,
        _ => return None,
    };

    let time = rationals(exif, Tag::GPSTimeStamp)?;
    if time.len() != 3 {
        return None;
    }
    let [h, m, s] = [&time[0], &time[1], &time[2]].map(|r| r.to_f64().round() as u32);

    Some(GpsFields {
        latitude_ref,
        latitude,
        longitude_ref,
        longitude,
        altitude_ref,
        time_stamp: format!("{h:02}:{m:02}:{s:02}"),
        date_stamp: ascii(exif, Tag::GPSDateStamp)?,
    })
}

fn read_dates(exif: &Exif) -> Option<ExifFields> {
    Some(ExifFields {
        date_time_original: ascii(exif, Tag::DateTimeOriginal)?,
        date_time_digitized: ascii(exif, Tag::DateTimeDigitized)?,
    })
}

fn ascii(exif: &Exif, tag: Tag) -> Option<String> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(parts) => parts
            .first()
            .map(|b| String::from_utf8_lossy(b).trim_end_matches('\0').to_string()),
        _ => None,
    }
}

fn rationals(exif: &Exif, tag: Tag) -> Option<&[Rational]> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(v) => Some(v.as_slice()),
        _ => None,
    }
}

/// Convert 3 rationals (deg, min, sec) to decimal degrees.
fn dms_to_degrees(dms: &[Rational]) -> Option<f64> {
    if dms.len() != 3 || dms.iter().any(|r| r.denom == 0) {
        return None;
    }
    Some(dms[0].to_f64() + dms[1].to_f64() / 60.0 + dms[2].to_f64() / 3600.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::writer::{JpegMetadataEncoder, MetadataEncoder, degrees_to_dms};
    use crate::model::CanvasSize;
    use crate::raster::{FlatColor, make_blank_image};

    fn baseline() -> Vec<u8> {
        let raster = make_blank_image(CanvasSize::square(8).unwrap(), FlatColor::Pink).unwrap();
        JpegMetadataEncoder.serialize_baseline(&raster).unwrap()
    }

    #[test]
    fn baseline_has_no_embedded_metadata() {
        let embedded = read_embedded(&baseline()).unwrap();
        assert!(embedded.is_empty());
        assert_eq!(embedded, EmbeddedMetadata::default());
    }

    #[test]
    fn non_jpeg_is_an_error() {
        assert!(read_embedded(b"nope").is_err());
    }

    #[test]
    fn dms_round_trip_precision() {
        for value in [0.0, 0.5, 24.0297, 49.8397, 89.999_99, 151.21, 180.0] {
            let back = dms_to_degrees(&degrees_to_dms(value)).unwrap();
            assert!((back - value).abs() < 1e-6, "{value} -> {back}");
        }
    }

    #[test]
    fn dms_rejects_zero_denominator() {
        let bad = [
            Rational { num: 1, denom: 1 },
            Rational { num: 1, denom: 0 },
            Rational { num: 1, denom: 1 },
        ];
        assert_eq!(dms_to_degrees(&bad), None);
        assert_eq!(dms_to_degrees(&bad[..2]), None);
    }

    #[test]
    fn read_embedded_file_reads_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("plain.jpg");
        std::fs::write(&path, baseline()).unwrap();
        assert!(read_embedded_file(&path).unwrap().is_empty());
        assert!(read_embedded_file(&dir.path().join("missing.jpg")).is_err());
    }
}
