//! Materialization of frequency-based schedules into concrete trips.
//!
//! Runs after normalization: expansion only changes trip cardinality, never
//! distances or times validity, so expanding last minimizes the number of
//! trips to normalize.

use crate::objects::{FrequencyRule, Trip};
use crate::serde_helpers::format_time;
use log::error;

/// Expands every rule of one template trip into concrete, time-shifted trip
/// copies.
///
/// For each rule, departures are generated at `start_time`,
/// `start_time + headway`, ... while strictly before `end_time` (half-open
/// interval: no trip departs at exactly `end_time`). Each generated trip
/// clones the template's stop times with every non-null time shifted by the
/// difference between the generated departure and the template's first
/// departure, gets a derived identifier `<template id>@<H:MM:SS>` and is
/// flagged `frequency_generated`.
///
/// The template itself is not touched: callers remove templates in a
/// separate pass once every rule referencing them has been expanded, since
/// one trip may carry several rules.
pub fn expand_frequencies(template: &Trip, rules: &[FrequencyRule]) -> Vec<Trip> {
    let Some(&base_departure) = template
        .stop_times
        .first()
        .and_then(|st| st.departure_time.as_ref())
    else {
        error!(
            "Cannot expand frequencies: no base departure time on {}",
            template
        );
        return Vec::new();
    };

    let mut generated = Vec::new();
    for rule in rules {
        if rule.headway_secs == 0 {
            error!(
                "Zero headway in frequency [{} - {}] of {}, skipping rule",
                format_time(rule.start_time),
                format_time(rule.end_time),
                template
            );
            continue;
        }
        let mut trip_dep_time = rule.start_time;
        while trip_dep_time < rule.end_time {
            // Departure times are assumed to be all distinct, as GTFS
            // requires; the derived id relies on that assumption
            let trip_id = format!("{}@{}", template.id, format_time(trip_dep_time));
            let mut trip = Trip {
                id: trip_id,
                route_id: template.route_id.clone(),
                service_id: template.service_id.clone(),
                shape_id: template.shape_id.clone(),
                stop_times: template.stop_times.clone(),
                frequency_generated: true,
                exact_times: Some(rule.exact_times),
            };
            // Widened: a stop time earlier than the base departure (bad but
            // accepted input) would underflow in u32; shifted times clamp at
            // midnight
            let shift = trip_dep_time as i64 - base_departure as i64;
            for stop_time in &mut trip.stop_times {
                stop_time.arrival_time = stop_time
                    .arrival_time
                    .map(|t| (t as i64 + shift).max(0) as u32);
                stop_time.departure_time = stop_time
                    .departure_time
                    .map(|t| (t as i64 + shift).max(0) as u32);
            }
            generated.push(trip);
            trip_dep_time += rule.headway_secs;
        }
    }
    generated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::ExactTimes;
    use crate::objects::StopTime;

    fn template() -> Trip {
        Trip {
            id: "t1".to_owned(),
            route_id: "r1".to_owned(),
            service_id: "s1".to_owned(),
            stop_times: vec![
                StopTime {
                    stop_id: "a".to_owned(),
                    stop_sequence: 0,
                    arrival_time: None,
                    departure_time: Some(28800),
                    shape_dist_traveled: Some(0.0),
                    ..Default::default()
                },
                StopTime {
                    stop_id: "b".to_owned(),
                    stop_sequence: 1,
                    arrival_time: Some(29100),
                    departure_time: None,
                    shape_dist_traveled: Some(1000.0),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    fn rule(start: u32, end: u32, headway: u32) -> FrequencyRule {
        FrequencyRule {
            trip_id: "t1".to_owned(),
            start_time: start,
            end_time: end,
            headway_secs: headway,
            exact_times: ExactTimes::FrequencyBased,
        }
    }

    #[test]
    fn test_expansion_is_half_open() {
        // 8:00 to 9:00 every 15 minutes: 4 trips, none at 9:00 sharp
        let trips = expand_frequencies(&template(), &[rule(28800, 32400, 900)]);
        assert_eq!(trips.len(), 4);
        let departures: Vec<u32> = trips
            .iter()
            .map(|t| t.stop_times[0].departure_time.unwrap())
            .collect();
        assert_eq!(departures, vec![28800, 29700, 30600, 31500]);
    }

    #[test]
    fn test_generated_trip_contents() {
        let trips = expand_frequencies(&template(), &[rule(30000, 30001, 900)]);
        assert_eq!(trips.len(), 1);
        let trip = &trips[0];
        assert_eq!(trip.id, "t1@8:20:00");
        assert!(trip.frequency_generated);
        assert_eq!(trip.route_id, "r1");
        assert_eq!(trip.service_id, "s1");
        // All non-null times shifted by (30000 - 28800), nulls kept
        assert_eq!(trip.stop_times[0].arrival_time, None);
        assert_eq!(trip.stop_times[0].departure_time, Some(30000));
        assert_eq!(trip.stop_times[1].arrival_time, Some(30300));
        assert_eq!(trip.stop_times[1].departure_time, None);
        // Distances are copied untouched
        assert_eq!(trip.stop_times[1].shape_dist_traveled, Some(1000.0));
    }

    #[test]
    fn test_multiple_rules_same_template() {
        let trips = expand_frequencies(
            &template(),
            &[rule(28800, 30600, 900), rule(30600, 32400, 1800)],
        );
        let departures: Vec<u32> = trips
            .iter()
            .map(|t| t.stop_times[0].departure_time.unwrap())
            .collect();
        assert_eq!(departures, vec![28800, 29700, 30600]);
    }

    #[test]
    fn test_shift_before_base_departure_clamps_at_midnight() {
        // A stop time earlier than the template's first departure, shifted
        // towards midnight: the result clamps at 0 instead of wrapping
        let mut template = template();
        template.stop_times[1].arrival_time = Some(28000);
        let trips = expand_frequencies(&template, &[rule(0, 1, 900)]);
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].stop_times[0].departure_time, Some(0));
        assert_eq!(trips[0].stop_times[1].arrival_time, Some(0));
    }

    #[test]
    fn test_empty_interval_generates_nothing() {
        assert!(expand_frequencies(&template(), &[rule(32400, 32400, 900)]).is_empty());
        assert!(expand_frequencies(&template(), &[rule(32400, 28800, 900)]).is_empty());
    }
}
