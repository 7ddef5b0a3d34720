//! Per-trip normalization: sequence renumbering, distance resolution through
//! the odometer, and interpolation of missing stop times.

use crate::objects::{Stop, Trip};
use crate::odometer::Odometer;
use log::error;
use std::collections::HashMap;

/// Normalizes `trip` in place. Stop times must already be in ascending
/// original stop order; afterwards:
/// - `stop_sequence` is contiguous from 0;
/// - `shape_dist_traveled` is a non-decreasing distance in meters resolved
///   by `odometer` (which must have the trip's shape registered, or no
///   shape at all);
/// - the first arrival and last departure are forced to `None`;
/// - every run of stop times flagged `interpolated` receives times
///   interpolated linearly in the distance domain between the surrounding
///   anchored times.
///
/// Interpolation runs without an anchor on one side are flat-extrapolated
/// from the single surrounding anchor and logged; a trip without any
/// anchored time keeps its times `None` and is logged. Never fails.
pub fn normalize_trip(trip: &mut Trip, stops: &HashMap<String, Stop>, odometer: &mut Odometer) {
    let n_stoptimes = trip.stop_times.len();
    let mut last_anchor: Option<(f64, u32)> = None; // (distance, departure time)
    let mut to_interpolate: Vec<usize> = Vec::new();
    odometer.reset();
    for stopseq in 0..n_stoptimes {
        let stoptime = &mut trip.stop_times[stopseq];
        stoptime.stop_sequence = stopseq as u32;
        if let Some(stop) = stops.get(&stoptime.stop_id) {
            stoptime.shape_dist_traveled =
                Some(odometer.dist_traveled(stop, stoptime.shape_dist_traveled));
        }
        if stopseq == 0 {
            // Force first arrival time to NULL
            stoptime.arrival_time = None;
        }
        if stopseq == n_stoptimes - 1 {
            // Force last departure time to NULL
            stoptime.departure_time = None;
        }
        if trip.stop_times[stopseq].interpolated {
            to_interpolate.push(stopseq);
        } else {
            if !to_interpolate.is_empty() {
                resolve_run(trip, &to_interpolate, last_anchor, stopseq);
                to_interpolate.clear();
            }
            let anchor = &trip.stop_times[stopseq];
            last_anchor = Some((
                anchor.shape_dist_traveled.unwrap_or(0.0),
                // The last stop's departure was just nulled; its arrival
                // carries the same instant for extrapolation purposes
                anchor.departure_time.or(anchor.arrival_time).unwrap_or(0),
            ));
        }
    }
    if !to_interpolate.is_empty() {
        // A run at trip end has no following anchor
        match last_anchor {
            None => {
                error!("Cannot interpolate missing time, no time at all: {}", trip);
                // Keep times NULL
            }
            Some((_, last_departure)) => {
                error!("Cannot interpolate missing time at trip end: {}", trip);
                for &i in &to_interpolate {
                    // Use last defined time as fallback value
                    trip.stop_times[i].arrival_time = Some(last_departure);
                    trip.stop_times[i].departure_time = Some(last_departure);
                }
            }
        }
    }
}

/// Resolves one pending run of interpolated stop times, `anchor_seq` being
/// the index of the anchored stop time that closed the run.
fn resolve_run(
    trip: &mut Trip,
    run: &[usize],
    last_anchor: Option<(f64, u32)>,
    anchor_seq: usize,
) {
    let next_arrival = trip.stop_times[anchor_seq]
        .arrival_time
        .or(trip.stop_times[anchor_seq].departure_time)
        .unwrap_or(0);
    match last_anchor {
        None => {
            // Run starts at the trip start: no previous anchor to
            // interpolate from, flat-extrapolate backwards
            error!("Cannot interpolate missing time at trip start: {}", trip);
            for &i in run {
                trip.stop_times[i].arrival_time = Some(next_arrival);
                trip.stop_times[i].departure_time = Some(next_arrival);
            }
        }
        Some((prev_dist, prev_departure)) => {
            let tdist = trip.stop_times[anchor_seq].shape_dist_traveled.unwrap_or(0.0) - prev_dist;
            let ttime = next_arrival as i64 - prev_departure as i64;
            for &i in run {
                let fdist = trip.stop_times[i].shape_dist_traveled.unwrap_or(0.0) - prev_dist;
                let t = if tdist > 0.0 {
                    prev_departure as i64 + (ttime as f64 * fdist / tdist).floor() as i64
                } else {
                    prev_departure as i64
                };
                let t = t.max(0) as u32;
                trip.stop_times[i].arrival_time = Some(t);
                trip.stop_times[i].departure_time = Some(t);
            }
        }
    }
}
