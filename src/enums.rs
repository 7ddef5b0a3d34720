use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

fn serialize_i32_as_str<S: Serializer>(s: S, value: i32) -> Result<S::Ok, S::Error> {
    s.serialize_str(&value.to_string())
}

/// Describes the kind of [crate::objects::Stop]. See `location_type` in `stops.txt`
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum LocationType {
    /// Stop (or Platform). A location where passengers board or disembark from a transit vehicle
    #[default]
    StopPoint,
    /// Station. A physical structure or area that contains one or more platforms
    StopArea,
    /// A location where passengers can enter or exit a station from the street
    StationEntrance,
    /// A location within a station, not matching any other location type
    GenericNode,
    /// A specific location on a platform, where passengers can board and/or alight vehicles
    BoardingArea,
    /// An unknown value
    Unknown(i32),
}

impl<'de> Deserialize<'de> for LocationType {
    fn deserialize<D>(deserializer: D) -> Result<LocationType, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "" | "0" => LocationType::StopPoint,
            "1" => LocationType::StopArea,
            "2" => LocationType::StationEntrance,
            "3" => LocationType::GenericNode,
            "4" => LocationType::BoardingArea,
            s => LocationType::Unknown(s.parse().map_err(|_| {
                serde::de::Error::custom(format!(
                    "invalid value for LocationType, must be an integer: {}",
                    s
                ))
            })?),
        })
    }
}

impl Serialize for LocationType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize_i32_as_str(
            serializer,
            match self {
                LocationType::StopPoint => 0,
                LocationType::StopArea => 1,
                LocationType::StationEntrance => 2,
                LocationType::GenericNode => 3,
                LocationType::BoardingArea => 4,
                LocationType::Unknown(i) => *i,
            },
        )
    }
}

/// Describes if and how a passenger can board or alight the vehicle. See
/// `pickup_type` and `drop_off_type` in `stop_times.txt`
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum PickupDropOffType {
    /// Regularly scheduled pickup or drop off
    #[default]
    Regular,
    /// No pickup or drop off available
    NotAvailable,
    /// Must phone agency to arrange pickup or drop off
    ArrangeByPhone,
    /// Must coordinate with driver to arrange pickup or drop off
    CoordinateWithDriver,
    /// An unknown value
    Unknown(i32),
}

impl<'de> Deserialize<'de> for PickupDropOffType {
    fn deserialize<D>(deserializer: D) -> Result<PickupDropOffType, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "" | "0" => PickupDropOffType::Regular,
            "1" => PickupDropOffType::NotAvailable,
            "2" => PickupDropOffType::ArrangeByPhone,
            "3" => PickupDropOffType::CoordinateWithDriver,
            s => PickupDropOffType::Unknown(s.parse().map_err(|_| {
                serde::de::Error::custom(format!(
                    "invalid value for PickupDropOffType, must be an integer: {}",
                    s
                ))
            })?),
        })
    }
}

impl Serialize for PickupDropOffType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize_i32_as_str(
            serializer,
            match self {
                PickupDropOffType::Regular => 0,
                PickupDropOffType::NotAvailable => 1,
                PickupDropOffType::ArrangeByPhone => 2,
                PickupDropOffType::CoordinateWithDriver => 3,
                PickupDropOffType::Unknown(i) => *i,
            },
        )
    }
}

/// Is the service schedule-based or frequency-based with exact headways. See
/// `exact_times` in `frequencies.txt`
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum ExactTimes {
    /// Frequency-based trips, headway is approximate
    #[default]
    FrequencyBased,
    /// Schedule-based trips with the exact same headway throughout the day
    ScheduleBased,
}

impl<'de> Deserialize<'de> for ExactTimes {
    fn deserialize<D>(deserializer: D) -> Result<ExactTimes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        match s.as_str() {
            "" | "0" => Ok(ExactTimes::FrequencyBased),
            "1" => Ok(ExactTimes::ScheduleBased),
            s => Err(serde::de::Error::custom(format!(
                "invalid value for ExactTimes, expected 0 or 1: {}",
                s
            ))),
        }
    }
}

impl Serialize for ExactTimes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize_i32_as_str(
            serializer,
            match self {
                ExactTimes::FrequencyBased => 0,
                ExactTimes::ScheduleBased => 1,
            },
        )
    }
}

/// Is the service added or removed on a given date. See `exception_type` in
/// `calendar_dates.txt`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    /// Service added for the given date
    Added,
    /// Service removed for the given date
    Deleted,
}

impl<'de> Deserialize<'de> for Exception {
    fn deserialize<D>(deserializer: D) -> Result<Exception, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        match s.as_str() {
            "1" => Ok(Exception::Added),
            "2" => Ok(Exception::Deleted),
            s => Err(serde::de::Error::custom(format!(
                "invalid value for Exception, expected 1 or 2: {}",
                s
            ))),
        }
    }
}

impl Serialize for Exception {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize_i32_as_str(
            serializer,
            match self {
                Exception::Added => 1,
                Exception::Deleted => 2,
            },
        )
    }
}
