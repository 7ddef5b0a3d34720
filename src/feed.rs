//! The linked, validated in-memory model of a feed, and the normalization
//! and frequency expansion passes over it.

use crate::frequency;
use crate::normalize::normalize_trip;
use crate::objects::{
    Calendar, Exception, FrequencyRule, LocationType, RawRoute, Shape, ShapePoint, Stop, StopTime,
    Trip,
};
use crate::odometer::Odometer;
use crate::reader::RawFeed;
use crate::Error;
use log::{error, info};
use std::collections::HashMap;
use std::path::Path;

/// Tuning knobs of the ingestion and normalization passes
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    /// In lenient mode, validation and referential errors are logged and the
    /// offending record defaulted or skipped; in strict mode they are fatal
    pub lenient: bool,
    /// Penalty applied per meter of forward progress when snapping a stop
    /// onto a shape, to keep backtracking shapes from snapping too far ahead
    pub cone_coefficient: f64,
    /// Backtracking below this many meters is silently clamped; above it the
    /// clamp is logged
    pub backtrack_tolerance: f64,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        NormalizeConfig {
            lenient: false,
            cone_coefficient: 0.001,
            backtrack_tolerance: 10.0,
        }
    }
}

/// A whole feed, linked by id and validated.
///
/// Obtained from [TransitFeed::from_path] or [TransitFeed::from_raw]; the
/// normalization passes ([TransitFeed::normalize],
/// [TransitFeed::expand_frequencies]) then rewrite it in place.
#[derive(Default)]
pub struct TransitFeed {
    /// All stops and stations, by id
    pub stops: HashMap<String, Stop>,
    /// All routes, by id
    pub routes: HashMap<String, RawRoute>,
    /// All service calendars with materialized running dates, by service id
    pub calendars: HashMap<String, Calendar>,
    /// All shapes, by id
    pub shapes: HashMap<String, Shape>,
    /// All trips with their stop times, by id
    pub trips: HashMap<String, Trip>,
    /// The frequency rules still awaiting expansion
    pub frequencies: Vec<FrequencyRule>,
}

impl TransitFeed {
    /// Reads and links a feed from a directory or zip archive
    pub fn from_path<P>(path: P, config: &NormalizeConfig) -> Result<Self, Error>
    where
        P: AsRef<Path> + std::fmt::Display,
    {
        Self::from_raw(RawFeed::from_path(path)?, config)
    }

    /// Links and validates the raw records into a feed.
    ///
    /// In strict mode the first validation or referential error aborts the
    /// ingestion; in lenient mode offending records are defaulted (missing
    /// coordinates become 0,0) or skipped (stop times on unknown stops),
    /// with an error logged each time.
    pub fn from_raw(raw: RawFeed, config: &NormalizeConfig) -> Result<Self, Error> {
        let mut feed = TransitFeed::default();

        // Stations first, so stop parent references can be checked
        let raw_stops = raw.stops?;
        for raw_stop in raw_stops
            .iter()
            .filter(|s| s.location_type == LocationType::StopArea)
            .chain(
                raw_stops
                    .iter()
                    .filter(|s| s.location_type != LocationType::StopArea),
            )
        {
            let (latitude, longitude) = match (raw_stop.latitude, raw_stop.longitude) {
                (Some(lat), Some(lon)) => (lat, lon),
                _ if config.lenient => {
                    error!(
                        "Missing coordinates for stop '{}', defaulting to (0, 0)",
                        raw_stop.id
                    );
                    (0.0, 0.0)
                }
                _ => return Err(Error::MissingCoordinates(raw_stop.id.clone())),
            };
            let mut parent_station = raw_stop.parent_station.clone().filter(|p| !p.is_empty());
            if let Some(parent) = &parent_station {
                if !feed.stops.contains_key(parent) {
                    if !config.lenient {
                        return Err(Error::ReferenceError {
                            object: "parent station",
                            id: parent.clone(),
                        });
                    }
                    error!(
                        "Unknown parent station '{}' for stop '{}', dropping the reference",
                        parent, raw_stop.id
                    );
                    parent_station = None;
                }
            }
            feed.stops.insert(
                raw_stop.id.clone(),
                Stop {
                    id: raw_stop.id.clone(),
                    name: raw_stop.name.clone(),
                    location_type: raw_stop.location_type,
                    parent_station,
                    latitude,
                    longitude,
                },
            );
        }

        for route in raw.routes? {
            feed.routes.insert(route.id.clone(), route);
        }

        feed.materialize_calendars(raw.calendar.transpose()?, raw.calendar_dates.transpose()?);

        for point in raw.shapes.transpose()?.unwrap_or_default() {
            feed.shapes
                .entry(point.shape_id.clone())
                .or_insert_with(|| Shape {
                    id: point.shape_id.clone(),
                    points: Vec::new(),
                })
                .points
                .push(ShapePoint {
                    sequence: point.sequence,
                    latitude: point.latitude,
                    longitude: point.longitude,
                    dist_traveled: point.dist_traveled,
                });
        }

        for raw_trip in raw.trips? {
            if !feed.routes.contains_key(&raw_trip.route_id) {
                if !config.lenient {
                    return Err(Error::ReferenceError {
                        object: "route",
                        id: raw_trip.route_id.clone(),
                    });
                }
                error!(
                    "Unknown route '{}' for trip '{}', skipping trip",
                    raw_trip.route_id, raw_trip.id
                );
                continue;
            }
            if !feed.calendars.contains_key(&raw_trip.service_id) {
                if !config.lenient {
                    return Err(Error::ReferenceError {
                        object: "service",
                        id: raw_trip.service_id.clone(),
                    });
                }
                error!(
                    "Unknown service '{}' for trip '{}', skipping trip",
                    raw_trip.service_id, raw_trip.id
                );
                continue;
            }
            let mut shape_id = raw_trip.shape_id.clone().filter(|s| !s.is_empty());
            if let Some(shape) = &shape_id {
                if !feed.shapes.contains_key(shape) {
                    if !config.lenient {
                        return Err(Error::ReferenceError {
                            object: "shape",
                            id: shape.clone(),
                        });
                    }
                    error!(
                        "Unknown shape '{}' for trip '{}', dropping the reference",
                        shape, raw_trip.id
                    );
                    shape_id = None;
                }
            }
            feed.trips.insert(
                raw_trip.id.clone(),
                Trip {
                    id: raw_trip.id,
                    route_id: raw_trip.route_id,
                    service_id: raw_trip.service_id,
                    shape_id,
                    ..Default::default()
                },
            );
        }

        for raw_st in raw.stop_times? {
            let Some(trip) = feed.trips.get_mut(&raw_st.trip_id) else {
                if !config.lenient {
                    return Err(Error::ReferenceError {
                        object: "trip",
                        id: raw_st.trip_id.clone(),
                    });
                }
                error!("Stop time on unknown trip '{}', skipped", raw_st.trip_id);
                continue;
            };
            if !feed.stops.contains_key(&raw_st.stop_id) {
                if !config.lenient {
                    return Err(Error::ReferenceError {
                        object: "stop",
                        id: raw_st.stop_id.clone(),
                    });
                }
                error!(
                    "Stop time on unknown stop '{}' in trip '{}', skipped",
                    raw_st.stop_id, raw_st.trip_id
                );
                continue;
            }
            // A record missing only one of its two times inherits the other;
            // a record missing both is a candidate for interpolation
            let interpolated = raw_st.arrival_time.is_none() && raw_st.departure_time.is_none();
            let arrival_time = raw_st.arrival_time.or(raw_st.departure_time);
            let departure_time = raw_st.departure_time.or(raw_st.arrival_time);
            trip.stop_times.push(StopTime {
                stop_id: raw_st.stop_id,
                stop_sequence: raw_st.stop_sequence,
                arrival_time,
                departure_time,
                shape_dist_traveled: raw_st.shape_dist_traveled,
                interpolated,
                pickup_type: raw_st.pickup_type,
                drop_off_type: raw_st.drop_off_type,
            });
        }
        for trip in feed.trips.values_mut() {
            trip.stop_times.sort_by_key(|st| st.stop_sequence);
        }

        for raw_freq in raw.frequencies.transpose()?.unwrap_or_default() {
            if !feed.trips.contains_key(&raw_freq.trip_id) {
                if !config.lenient {
                    return Err(Error::ReferenceError {
                        object: "trip",
                        id: raw_freq.trip_id.clone(),
                    });
                }
                error!("Frequency on unknown trip '{}', skipped", raw_freq.trip_id);
                continue;
            }
            feed.frequencies.push(FrequencyRule {
                trip_id: raw_freq.trip_id,
                start_time: raw_freq.start_time,
                end_time: raw_freq.end_time,
                headway_secs: raw_freq.headway_secs,
                exact_times: raw_freq.exact_times.unwrap_or_default(),
            });
        }

        info!(
            "Loaded {} stops, {} routes, {} calendars, {} shapes, {} trips, {} frequencies",
            feed.stops.len(),
            feed.routes.len(),
            feed.calendars.len(),
            feed.shapes.len(),
            feed.trips.len(),
            feed.frequencies.len()
        );
        Ok(feed)
    }

    /// Merges the weekday ranges of `calendar.txt` with the add/remove
    /// exceptions of `calendar_dates.txt` into explicit sets of running
    /// dates
    fn materialize_calendars(
        &mut self,
        calendars: Option<Vec<crate::objects::RawCalendar>>,
        calendar_dates: Option<Vec<crate::objects::RawCalendarDate>>,
    ) {
        for raw in calendars.unwrap_or_default() {
            let calendar = self
                .calendars
                .entry(raw.service_id.clone())
                .or_insert_with(|| Calendar {
                    service_id: raw.service_id.clone(),
                    ..Default::default()
                });
            let mut date = raw.start_date;
            while date <= raw.end_date {
                if raw.runs_on(date) {
                    calendar.dates.insert(date);
                }
                match date.succ_opt() {
                    Some(next) => date = next,
                    None => break,
                }
            }
        }
        // A calendar_dates-only service is legal: the calendar record is
        // created on the fly
        for raw in calendar_dates.unwrap_or_default() {
            let calendar = self
                .calendars
                .entry(raw.service_id.clone())
                .or_insert_with(|| Calendar {
                    service_id: raw.service_id.clone(),
                    ..Default::default()
                });
            match raw.exception_type {
                Exception::Added => {
                    calendar.dates.insert(raw.date);
                }
                Exception::Deleted => {
                    calendar.dates.remove(&raw.date);
                }
            }
        }
    }

    /// Normalizes every shape and every trip of the feed in place: shapes
    /// get contiguous sequences and cumulative meter distances, trips get
    /// contiguous sequences, resolved stop distances and interpolated
    /// missing times. Trips are processed grouped by shape so each shape's
    /// snapping cache is built once.
    pub fn normalize(&mut self, config: &NormalizeConfig) {
        let mut trips_by_shape: HashMap<Option<String>, Vec<String>> = HashMap::new();
        for (id, trip) in &self.trips {
            trips_by_shape
                .entry(trip.shape_id.clone())
                .or_default()
                .push(id.clone());
        }

        let mut odometer = Odometer::new();
        let mut shape_ids: Vec<String> = self.shapes.keys().cloned().collect();
        shape_ids.sort();
        for shape_id in shape_ids {
            if let Some(shape) = self.shapes.get_mut(&shape_id) {
                odometer.normalize_and_register_shape(shape, config);
            }
            let mut trip_ids = trips_by_shape
                .remove(&Some(shape_id.clone()))
                .unwrap_or_default();
            trip_ids.sort();
            for trip_id in &trip_ids {
                if let Some(trip) = self.trips.get_mut(trip_id) {
                    normalize_trip(trip, &self.stops, &mut odometer);
                }
            }
            odometer.debug_cache();
        }

        // Shapeless trips fall back to inter-stop geodesic distances
        odometer.register_noshape();
        let mut rest: Vec<String> = trips_by_shape.into_values().flatten().collect();
        rest.sort();
        for trip_id in &rest {
            if let Some(trip) = self.trips.get_mut(trip_id) {
                normalize_trip(trip, &self.stops, &mut odometer);
            }
        }
        info!("Normalized {} trips", self.trips.len());
    }

    /// Materializes every frequency rule into concrete trips and removes the
    /// templates.
    ///
    /// Templates are removed only once every rule has been expanded, since
    /// several rules may share one template.
    pub fn expand_frequencies(&mut self) {
        let mut rules_by_trip: HashMap<String, Vec<FrequencyRule>> = HashMap::new();
        for rule in self.frequencies.drain(..) {
            rules_by_trip
                .entry(rule.trip_id.clone())
                .or_default()
                .push(rule);
        }

        let mut templates = Vec::new();
        let mut generated = Vec::new();
        for (trip_id, rules) in &rules_by_trip {
            match self.trips.get(trip_id) {
                None => error!("Frequency references vanished trip '{}'", trip_id),
                Some(template) => {
                    generated.extend(frequency::expand_frequencies(template, rules));
                    templates.push(trip_id.clone());
                }
            }
        }
        for trip_id in &templates {
            self.trips.remove(trip_id);
        }
        info!(
            "Expanded {} trips from {} frequency templates",
            generated.len(),
            templates.len()
        );
        for trip in generated {
            self.trips.insert(trip.id.clone(), trip);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{
        RawCalendar, RawCalendarDate, RawStop, RawStopTime, RawTrip,
    };
    use chrono::NaiveDate;

    fn raw_stop(id: &str, lat: Option<f64>, lon: Option<f64>) -> RawStop {
        RawStop {
            id: id.to_owned(),
            name: id.to_owned(),
            latitude: lat,
            longitude: lon,
            ..Default::default()
        }
    }

    fn empty_raw() -> RawFeed {
        RawFeed {
            stops: Ok(Vec::new()),
            routes: Ok(Vec::new()),
            trips: Ok(Vec::new()),
            stop_times: Ok(Vec::new()),
            shapes: None,
            frequencies: None,
            calendar: None,
            calendar_dates: None,
        }
    }

    fn lenient() -> NormalizeConfig {
        NormalizeConfig {
            lenient: true,
            ..Default::default()
        }
    }

    /// A calendar_dates-only service, the cheapest way to make a service id
    /// resolvable in a test feed
    fn service(id: &str) -> Option<Result<Vec<RawCalendarDate>, Error>> {
        Some(Ok(vec![RawCalendarDate {
            service_id: id.to_owned(),
            date: NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
            exception_type: Exception::Added,
        }]))
    }

    #[test]
    fn test_missing_coordinates_strict_vs_lenient() {
        let mut raw = empty_raw();
        raw.stops = Ok(vec![raw_stop("s1", None, Some(1.0))]);
        assert!(matches!(
            TransitFeed::from_raw(raw, &NormalizeConfig::default()),
            Err(Error::MissingCoordinates(_))
        ));

        let mut raw = empty_raw();
        raw.stops = Ok(vec![raw_stop("s1", None, Some(1.0))]);
        let feed = TransitFeed::from_raw(raw, &lenient()).unwrap();
        let stop = &feed.stops["s1"];
        assert_eq!(stop.latitude, 0.0);
        assert_eq!(stop.longitude, 0.0);
    }

    #[test]
    fn test_unknown_parent_station() {
        let mut raw = empty_raw();
        raw.stops = Ok(vec![RawStop {
            parent_station: Some("nowhere".to_owned()),
            ..raw_stop("s1", Some(1.0), Some(1.0))
        }]);
        assert!(matches!(
            TransitFeed::from_raw(raw, &NormalizeConfig::default()),
            Err(Error::ReferenceError { .. })
        ));

        let mut raw = empty_raw();
        raw.stops = Ok(vec![RawStop {
            parent_station: Some("nowhere".to_owned()),
            ..raw_stop("s1", Some(1.0), Some(1.0))
        }]);
        let feed = TransitFeed::from_raw(raw, &lenient()).unwrap();
        assert_eq!(feed.stops["s1"].parent_station, None);
    }

    #[test]
    fn test_station_resolved_regardless_of_order() {
        // The station appears after its child in the file
        let mut raw = empty_raw();
        raw.stops = Ok(vec![
            RawStop {
                parent_station: Some("station".to_owned()),
                ..raw_stop("child", Some(1.0), Some(1.0))
            },
            RawStop {
                location_type: LocationType::StopArea,
                ..raw_stop("station", Some(1.0), Some(1.0))
            },
        ]);
        let feed = TransitFeed::from_raw(raw, &NormalizeConfig::default()).unwrap();
        assert_eq!(
            feed.stops["child"].parent_station.as_deref(),
            Some("station")
        );
    }

    #[test]
    fn test_one_sided_times_are_copied() {
        let mut raw = empty_raw();
        raw.stops = Ok(vec![
            raw_stop("a", Some(0.0), Some(0.0)),
            raw_stop("b", Some(0.0), Some(0.01)),
        ]);
        raw.routes = Ok(vec![RawRoute {
            id: "r1".to_owned(),
            ..Default::default()
        }]);
        raw.trips = Ok(vec![RawTrip {
            id: "t1".to_owned(),
            route_id: "r1".to_owned(),
            service_id: "sv1".to_owned(),
            shape_id: None,
        }]);
        raw.calendar_dates = service("sv1");
        raw.stop_times = Ok(vec![
            RawStopTime {
                trip_id: "t1".to_owned(),
                stop_id: "a".to_owned(),
                stop_sequence: 2,
                arrival_time: Some(100),
                departure_time: None,
                ..Default::default()
            },
            RawStopTime {
                trip_id: "t1".to_owned(),
                stop_id: "b".to_owned(),
                stop_sequence: 1,
                arrival_time: None,
                departure_time: None,
                ..Default::default()
            },
        ]);
        let feed = TransitFeed::from_raw(raw, &lenient()).unwrap();
        let trip = &feed.trips["t1"];
        // Sorted by stop_sequence: b (1) then a (2)
        assert_eq!(trip.stop_times[0].stop_id, "b");
        assert!(trip.stop_times[0].interpolated);
        assert_eq!(trip.stop_times[1].departure_time, Some(100));
        assert!(!trip.stop_times[1].interpolated);
    }

    #[test]
    fn test_calendar_materialization() {
        let mut raw = empty_raw();
        // One full week running monday and wednesday only
        raw.calendar = Some(Ok(vec![RawCalendar {
            service_id: "sv1".to_owned(),
            monday: 1,
            tuesday: 0,
            wednesday: 1,
            thursday: 0,
            friday: 0,
            saturday: 0,
            sunday: 0,
            start_date: NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(), // a monday
            end_date: NaiveDate::from_ymd_opt(2023, 5, 7).unwrap(),
        }]));
        raw.calendar_dates = Some(Ok(vec![
            // Remove the wednesday, add the friday
            RawCalendarDate {
                service_id: "sv1".to_owned(),
                date: NaiveDate::from_ymd_opt(2023, 5, 3).unwrap(),
                exception_type: Exception::Deleted,
            },
            RawCalendarDate {
                service_id: "sv1".to_owned(),
                date: NaiveDate::from_ymd_opt(2023, 5, 5).unwrap(),
                exception_type: Exception::Added,
            },
        ]));
        let feed = TransitFeed::from_raw(raw, &NormalizeConfig::default()).unwrap();
        let dates: Vec<NaiveDate> = feed.calendars["sv1"].dates.iter().cloned().collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
                NaiveDate::from_ymd_opt(2023, 5, 5).unwrap(),
            ]
        );
    }

    #[test]
    fn test_stop_time_on_unknown_stop() {
        let mut raw = empty_raw();
        raw.stops = Ok(vec![raw_stop("a", Some(0.0), Some(0.0))]);
        raw.routes = Ok(vec![RawRoute {
            id: "r1".to_owned(),
            ..Default::default()
        }]);
        raw.trips = Ok(vec![RawTrip {
            id: "t1".to_owned(),
            route_id: "r1".to_owned(),
            service_id: "sv1".to_owned(),
            shape_id: None,
        }]);
        raw.calendar_dates = service("sv1");
        raw.stop_times = Ok(vec![RawStopTime {
            trip_id: "t1".to_owned(),
            stop_id: "ghost".to_owned(),
            stop_sequence: 1,
            ..Default::default()
        }]);

        let feed = TransitFeed::from_raw(raw, &lenient()).unwrap();
        assert!(feed.trips["t1"].stop_times.is_empty());
    }

    #[test]
    fn test_trip_with_unresolved_references_is_skipped() {
        // A trip pointing at an unknown route or service is dropped whole in
        // lenient mode, not kept half-linked
        for (route_id, service_id) in [("ghost_route", "sv1"), ("r1", "ghost_service")] {
            let mut raw = empty_raw();
            raw.routes = Ok(vec![RawRoute {
                id: "r1".to_owned(),
                ..Default::default()
            }]);
            raw.calendar_dates = service("sv1");
            raw.trips = Ok(vec![RawTrip {
                id: "t1".to_owned(),
                route_id: route_id.to_owned(),
                service_id: service_id.to_owned(),
                shape_id: None,
            }]);
            let feed = TransitFeed::from_raw(raw, &lenient()).unwrap();
            assert!(
                !feed.trips.contains_key("t1"),
                "trip referencing {}/{} should be skipped",
                route_id,
                service_id
            );
        }

        // In strict mode the same feed aborts ingestion
        let mut raw = empty_raw();
        raw.calendar_dates = service("sv1");
        raw.trips = Ok(vec![RawTrip {
            id: "t1".to_owned(),
            route_id: "ghost_route".to_owned(),
            service_id: "sv1".to_owned(),
            shape_id: None,
        }]);
        assert!(matches!(
            TransitFeed::from_raw(raw, &NormalizeConfig::default()),
            Err(Error::ReferenceError { object: "route", .. })
        ));
    }
}
