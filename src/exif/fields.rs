use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

use crate::model::Coordinate;

pub const GPS_TIME_FORMAT: &str = "%H:%M:%S";
pub const GPS_DATE_FORMAT: &str = "%Y:%m:%d";
pub const EXIF_DATE_TIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatitudeRef {
    North,
    South,
}

impl LatitudeRef {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::North => "N",
            Self::South => "S",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "N" => Some(Self::North),
            "S" => Some(Self::South),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongitudeRef {
    East,
    West,
}

impl LongitudeRef {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::East => "E",
            Self::West => "W",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "E" => Some(Self::East),
            "W" => Some(Self::West),
            _ => None,
        }
    }
}

impl fmt::Display for LatitudeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for LongitudeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contents of the GPS IFD, in tag order.
///
/// `latitude` and `longitude` are unsigned magnitudes; the hemisphere lives in
/// the matching reference field.
#[derive(Debug, Clone, PartialEq)]
pub struct GpsFields {
    pub latitude_ref: LatitudeRef,
    pub latitude: f64,
    pub longitude_ref: LongitudeRef,
    pub longitude: f64,
    /// Always 0 (above sea level). No altitude value accompanies it.
    pub altitude_ref: u8,
    /// `HH:mm:ss`
    pub time_stamp: String,
    /// `yyyy:MM:dd`
    pub date_stamp: String,
}

/// The two capture timestamps written to the EXIF IFD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExifFields {
    /// `yyyy:MM:dd HH:mm:ss`
    pub date_time_original: String,
    /// Same value as `date_time_original`.
    pub date_time_digitized: String,
}

/// Build the GPS block for `coordinate` fixed at `timestamp`, with the time
/// and date stamps rendered in `tz`.
pub fn build_gps_block<Tz>(
    coordinate: &Coordinate,
    timestamp: &DateTime<Utc>,
    tz: &Tz,
) -> GpsFields
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let lat = coordinate.latitude();
    let lon = coordinate.longitude();
    let local = timestamp.with_timezone(tz);

    GpsFields {
        latitude_ref: if lat >= 0.0 { LatitudeRef::North } else { LatitudeRef::South },
        latitude: lat.abs(),
        longitude_ref: if lon >= 0.0 { LongitudeRef::East } else { LongitudeRef::West },
        longitude: lon.abs(),
        altitude_ref: 0,
        time_stamp: local.format(GPS_TIME_FORMAT).to_string(),
        date_stamp: local.format(GPS_DATE_FORMAT).to_string(),
    }
}

pub fn build_exif_block<Tz>(timestamp: &DateTime<Utc>, tz: &Tz) -> ExifFields
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let formatted = timestamp
        .with_timezone(tz)
        .format(EXIF_DATE_TIME_FORMAT)
        .to_string();

    ExifFields {
        date_time_original: formatted.clone(),
        date_time_digitized: formatted,
    }
}
