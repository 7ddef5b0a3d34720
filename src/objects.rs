//! All the objects a feed is made of, both as raw CSV records and as linked,
//! validated structs.

pub use crate::enums::*;
use crate::serde_helpers::*;
use chrono::NaiveDate;
use geo_types::Coord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A stop record as it appears in `stops.txt`, before validation
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RawStop {
    /// Unique technical identifier of the stop
    #[serde(rename = "stop_id")]
    pub id: String,
    /// Name of the location
    #[serde(default, rename = "stop_name")]
    pub name: String,
    /// Type of the location
    #[serde(default)]
    pub location_type: LocationType,
    /// Defines hierarchy between the different locations
    pub parent_station: Option<String>,
    /// Latitude of the stop
    #[serde(
        deserialize_with = "de_with_optional_float",
        serialize_with = "serialize_float_as_str",
        rename = "stop_lat",
        default
    )]
    pub latitude: Option<f64>,
    /// Longitude of the stop
    #[serde(
        deserialize_with = "de_with_optional_float",
        serialize_with = "serialize_float_as_str",
        rename = "stop_lon",
        default
    )]
    pub longitude: Option<f64>,
}

/// A validated stop or station. Coordinates are mandatory after ingestion
/// (defaulted to 0,0 under lenient mode), see [crate::feed::TransitFeed].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stop {
    /// Unique technical identifier of the stop
    pub id: String,
    /// Name of the location
    pub name: String,
    /// Type of the location
    pub location_type: LocationType,
    /// Identifier of the parent station, if any
    pub parent_station: Option<String>,
    /// Latitude of the stop
    pub latitude: f64,
    /// Longitude of the stop
    pub longitude: f64,
}

impl Stop {
    /// The stop position as an `x = longitude, y = latitude` coordinate
    pub fn coord(&self) -> Coord {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }
}

impl fmt::Display for Stop {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// A route record from `routes.txt`. Only the fields needed for referential
/// checks are kept.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RawRoute {
    /// Unique technical identifier for the route
    #[serde(rename = "route_id")]
    pub id: String,
    /// Short name of the route
    #[serde(default, rename = "route_short_name")]
    pub short_name: String,
    /// Full name of the route
    #[serde(default, rename = "route_long_name")]
    pub long_name: String,
}

/// A single geographical point of a shape polyline, from `shapes.txt`
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct RawShapePoint {
    /// Identifier of the shape this point belongs to
    pub shape_id: String,
    /// Latitude of the shape point
    #[serde(rename = "shape_pt_lat", default)]
    pub latitude: f64,
    /// Longitude of the shape point
    #[serde(rename = "shape_pt_lon", default)]
    pub longitude: f64,
    /// Sequence of the point along the shape. Increases along the trip but
    /// does not need to be consecutive in the input
    #[serde(rename = "shape_pt_sequence")]
    pub sequence: usize,
    /// Distance traveled along the shape, in feed-specific units (optional)
    #[serde(
        deserialize_with = "de_with_optional_float",
        serialize_with = "serialize_float_as_str",
        rename = "shape_dist_traveled",
        default
    )]
    pub dist_traveled: Option<f64>,
}

/// A point of a [Shape] polyline.
///
/// After [crate::odometer::Odometer::normalize_shape] the sequence is
/// contiguous from 0 and `dist_traveled` holds the cumulative geodesic
/// distance in meters from the first point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShapePoint {
    /// Sequence of the point along the shape
    pub sequence: usize,
    /// Latitude of the shape point
    pub latitude: f64,
    /// Longitude of the shape point
    pub longitude: f64,
    /// Distance traveled along the shape from the first point
    pub dist_traveled: Option<f64>,
}

impl ShapePoint {
    /// The point position as an `x = longitude, y = latitude` coordinate
    pub fn coord(&self) -> Coord {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }
}

/// A shape: the physical path followed by the vehicles of a trip pattern
#[derive(Debug, Clone, Default)]
pub struct Shape {
    /// Unique technical identifier for the shape
    pub id: String,
    /// The ordered points of the polyline
    pub points: Vec<ShapePoint>,
}

/// A trip record as it appears in `trips.txt`, before validation
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct RawTrip {
    /// Unique technical identifier for the trip
    #[serde(rename = "trip_id")]
    pub id: String,
    /// References the route this trip runs along
    pub route_id: String,
    /// References the calendar on which this trip runs
    pub service_id: String,
    /// Shape of the trip, if any
    pub shape_id: Option<String>,
}

/// A trip: a vehicle following an ordered sequence of [StopTime]
#[derive(Debug, Clone, Default)]
pub struct Trip {
    /// Unique technical identifier for the trip
    pub id: String,
    /// References the route this trip runs along
    pub route_id: String,
    /// References the calendar on which this trip runs
    pub service_id: String,
    /// Shape of the trip, if any
    pub shape_id: Option<String>,
    /// All the stop times of the trip, in stop order
    pub stop_times: Vec<StopTime>,
    /// True for trips that were materialized from a frequency rule, kept for
    /// traceability
    pub frequency_generated: bool,
    /// Exactness of the headway for frequency generated trips
    pub exact_times: Option<ExactTimes>,
}

impl fmt::Display for Trip {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "trip '{}' (route '{}', service '{}')",
            self.id, self.route_id, self.service_id
        )
    }
}

/// A stop time record as it appears in `stop_times.txt`, before validation
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct RawStopTime {
    /// Trip to which this stop time belongs
    pub trip_id: String,
    /// Stop where the vehicle stops
    pub stop_id: String,
    /// Order of the stop for the trip. Increases along the trip but does not
    /// need to be consecutive in the input
    pub stop_sequence: u32,
    /// Arrival time, missing for intermediate stops whose time must be
    /// interpolated
    #[serde(
        deserialize_with = "deserialize_optional_time",
        serialize_with = "serialize_optional_time",
        default
    )]
    pub arrival_time: Option<u32>,
    /// Departure time, missing for intermediate stops whose time must be
    /// interpolated
    #[serde(
        deserialize_with = "deserialize_optional_time",
        serialize_with = "serialize_optional_time",
        default
    )]
    pub departure_time: Option<u32>,
    /// Distance traveled along the shape, in feed-specific units (optional)
    #[serde(
        deserialize_with = "de_with_optional_float",
        serialize_with = "serialize_float_as_str",
        default
    )]
    pub shape_dist_traveled: Option<f64>,
    /// Indicates the pickup method
    #[serde(default)]
    pub pickup_type: PickupDropOffType,
    /// Indicates the drop off method
    #[serde(default)]
    pub drop_off_type: PickupDropOffType,
}

/// The moment when a vehicle running a [Trip] stops at a [Stop].
///
/// Identity is the (trip, stop, sequence) composite. After normalization the
/// sequence is contiguous from 0, `shape_dist_traveled` is a non-decreasing
/// distance in meters, the first arrival and last departure are `None`, and
/// every synthesized time carries the `interpolated` flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopTime {
    /// Stop where the vehicle stops
    pub stop_id: String,
    /// Order of the stop for the trip
    pub stop_sequence: u32,
    /// Arrival time in seconds since midnight (may exceed 86400)
    pub arrival_time: Option<u32>,
    /// Departure time in seconds since midnight (may exceed 86400)
    pub departure_time: Option<u32>,
    /// Distance traveled along the shape from the first stop of the trip
    pub shape_dist_traveled: Option<f64>,
    /// True when the arrival/departure times were absent from the input and
    /// have been (or must be) synthesized
    pub interpolated: bool,
    /// Indicates the pickup method
    pub pickup_type: PickupDropOffType,
    /// Indicates the drop off method
    pub drop_off_type: PickupDropOffType,
}

/// A frequency record as it appears in `frequencies.txt`
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct RawFrequency {
    /// References the template trip that uses frequencies
    pub trip_id: String,
    /// Time at which the first vehicle departs from the first stop of the trip
    #[serde(
        deserialize_with = "deserialize_time",
        serialize_with = "serialize_time"
    )]
    pub start_time: u32,
    /// Time at which service changes to a different headway (or ceases)
    #[serde(
        deserialize_with = "deserialize_time",
        serialize_with = "serialize_time"
    )]
    pub end_time: u32,
    /// Time in seconds between departures from the same stop
    pub headway_secs: u32,
    /// Indicates the type of service for the trip
    #[serde(default)]
    pub exact_times: Option<ExactTimes>,
}

/// A validated frequency rule, consumed exactly once by
/// [crate::frequency::expand_frequencies] to emit concrete trips
#[derive(Debug, Clone)]
pub struct FrequencyRule {
    /// The template trip this rule expands
    pub trip_id: String,
    /// First departure offset of the expansion
    pub start_time: u32,
    /// End of the expansion interval; the interval is half open, no trip is
    /// generated at exactly `end_time`
    pub end_time: u32,
    /// Time in seconds between generated departures
    pub headway_secs: u32,
    /// Indicates the type of service for the generated trips
    pub exact_times: ExactTimes,
}

/// A calendar record as it appears in `calendar.txt`
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RawCalendar {
    /// Unique technical identifier of the service
    pub service_id: String,
    /// Does the service run on mondays
    pub monday: u8,
    /// Does the service run on tuesdays
    pub tuesday: u8,
    /// Does the service run on wednesdays
    pub wednesday: u8,
    /// Does the service run on thursdays
    pub thursday: u8,
    /// Does the service run on fridays
    pub friday: u8,
    /// Does the service run on saturdays
    pub saturday: u8,
    /// Does the service run on sundays
    pub sunday: u8,
    /// First service day of the interval
    #[serde(
        deserialize_with = "deserialize_date",
        serialize_with = "serialize_date"
    )]
    pub start_date: NaiveDate,
    /// Last service day of the interval, included
    #[serde(
        deserialize_with = "deserialize_date",
        serialize_with = "serialize_date"
    )]
    pub end_date: NaiveDate,
}

impl RawCalendar {
    /// Whether the weekday of `date` is a running day for this service
    pub fn runs_on(&self, date: NaiveDate) -> bool {
        use chrono::{Datelike, Weekday};
        let flag = match date.weekday() {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        };
        flag != 0
    }
}

/// A calendar date record as it appears in `calendar_dates.txt`
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RawCalendarDate {
    /// Identifier of the service that is modified at this date
    pub service_id: String,
    /// Date where the service is added or removed
    #[serde(
        deserialize_with = "deserialize_date",
        serialize_with = "serialize_date"
    )]
    pub date: NaiveDate,
    /// Is the service added or removed
    pub exception_type: Exception,
}

/// A service calendar with its running dates fully materialized: the weekday
/// ranges of `calendar.txt` merged with the add/remove exceptions of
/// `calendar_dates.txt`
#[derive(Debug, Clone, Default)]
pub struct Calendar {
    /// Unique technical identifier of the service
    pub service_id: String,
    /// Every date on which the service runs
    pub dates: BTreeSet<NaiveDate>,
}
