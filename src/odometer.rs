//! Shape normalization and per-stop distance-along-shape resolution.
//!
//! An [Odometer] is registered on one shape at a time, then driven once per
//! trip: `reset()` followed by one `dist_traveled()` call per stop, in
//! ascending stop order. The monotonic cursor, the segment scan start index
//! and the per-shape snapping cache are all owned by the odometer instance,
//! so a single instance must not be shared across trips without a `reset()`
//! in between.

use crate::geo::{orthodromic_distance, orthodromic_seg_distance, DistanceCache};
use crate::objects::{Shape, Stop};
use crate::piecewise::PiecewiseLinearFunction;
use crate::NormalizeConfig;
use log::{debug, warn};
use rustc_hash::FxHashMap;

/// One node of the snapping cache: a trie keyed by the sequence of stops
/// visited since `reset()`. After a given prefix of stops, the next stop
/// always resolves to the same distance, so repeated stop patterns across
/// the many trips sharing a shape skip the segment scan entirely.
#[derive(Debug, Default)]
struct CacheEntry {
    distance: f64,
    next_entries: FxHashMap<String, CacheEntry>,
}

impl CacheEntry {
    fn insert(&mut self, stop_id: &str, distance: f64) -> &mut CacheEntry {
        self.next_entries
            .entry(stop_id.to_owned())
            .or_insert(CacheEntry {
                distance,
                next_entries: FxHashMap::default(),
            })
    }
}

/// Per-shape odometer state: the normalized shape points, the optional
/// old-scale to meter-scale remapper, and the snapping cache.
struct OdometerShape {
    shape_id: String,
    points: Vec<(geo_types::Coord, f64)>,
    xdist: Option<PiecewiseLinearFunction>,
    cache: CacheEntry,
    cache_hit: u64,
    cache_miss: u64,
    // Cursor state, reset per trip
    distance: f64,
    istart: usize,
    // Path from the cache root for the stops visited since reset()
    cursor_path: Vec<String>,
    cone_coefficient: f64,
    backtrack_tolerance: f64,
}

impl OdometerShape {
    /// Normalizes `shape` in place and captures the state needed to resolve
    /// stop distances against it:
    /// 1) points sorted by original sequence and renumbered from 0;
    /// 2) `dist_traveled` recomputed as cumulative geodesic meters.
    ///
    /// When every input point carried a distance value, an old-to-new
    /// remapper is built from the overwritten values; otherwise stops are
    /// resolved geometrically.
    fn new(shape: &mut Shape, config: &NormalizeConfig) -> Self {
        let mut xdist = if shape.points.iter().all(|pt| pt.dist_traveled.is_some()) {
            Some(PiecewiseLinearFunction::new())
        } else {
            None
        };

        shape.points.sort_by_key(|pt| pt.sequence);
        let mut distance_meters = 0.0;
        let mut last_coord = None;
        let mut points = Vec::with_capacity(shape.points.len());
        for (ptseq, pt) in shape.points.iter_mut().enumerate() {
            let coord = pt.coord();
            if let Some(last) = last_coord {
                // The distance cache is not used here: most points of a
                // shape differ from each other
                distance_meters += orthodromic_distance(last, coord);
            }
            last_coord = Some(coord);
            pt.sequence = ptseq;
            let old_distance = pt.dist_traveled;
            pt.dist_traveled = Some(distance_meters);
            if let (Some(xdist), Some(old)) = (xdist.as_mut(), old_distance) {
                xdist.append(old, distance_meters);
            }
            points.push((coord, distance_meters));
        }

        OdometerShape {
            shape_id: shape.id.clone(),
            points,
            xdist,
            cache: CacheEntry::default(),
            cache_hit: 0,
            cache_miss: 0,
            distance: 0.0,
            istart: 0,
            cursor_path: Vec::new(),
            cone_coefficient: config.cone_coefficient,
            backtrack_tolerance: config.backtrack_tolerance,
        }
    }

    fn reset(&mut self) {
        self.distance = 0.0;
        self.istart = 0;
        self.cursor_path.clear();
    }

    fn cursor(&mut self) -> &mut CacheEntry {
        let mut entry = &mut self.cache;
        for stop_id in &self.cursor_path {
            entry = entry
                .next_entries
                .get_mut(stop_id)
                .expect("cursor path follows inserted cache entries");
        }
        entry
    }

    fn dist_traveled(&mut self, stop: &Stop, old_dist_traveled: Option<f64>) -> f64 {
        if let Some(xdist) = self.xdist.as_mut() {
            // Case 1: the original data carried shape_dist_traveled, remap
            // from the old scale to the meter scale. A zero or absent value
            // is not trusted and falls through to snapping.
            if let Some(old) = old_dist_traveled.filter(|d| *d != 0.0) {
                if let Ok(remapped) = xdist.interpolate(old) {
                    return remapped;
                }
            }
        }
        // Case 2: no usable original value, snap the stop onto the shape.
        // The cache is checked first: after the same prefix of stops, the
        // next stop always lands at the same distance.
        if let Some(entry) = self.cursor().next_entries.get(&stop.id) {
            let distance = entry.distance;
            self.cursor_path.push(stop.id.clone());
            self.cache_hit += 1;
            return distance;
        }
        let mut min_dist = f64::MAX;
        let mut best_i = self.istart;
        let mut best_dist = 0.0;
        for i in self.istart..self.points.len().saturating_sub(1) {
            let (a, dist_a) = self.points[i];
            let (b, _) = self.points[i + 1];
            let (mut dist, pdist) = orthodromic_seg_distance(stop.coord(), a, b);
            let newdist = dist_a + pdist;
            let howfar = newdist - self.distance;
            // Slight "cone" offset. There are pathological cases with
            // backtracking shapes where the best distance is marginally
            // better much further along (e.g. 0.01m vs 0.02m at the current
            // position). Penalizing candidates by how far ahead they lie
            // keeps the snap from running off to the shape end.
            dist += howfar * self.cone_coefficient;
            if dist < min_dist {
                min_dist = dist;
                best_i = i;
                best_dist = newdist;
            }
        }
        if best_dist > self.distance {
            self.distance = best_dist;
        } else {
            let delta = self.distance - best_dist;
            if delta > self.backtrack_tolerance {
                // Harmless if the backtracking distance is small; rounding
                // errors cause lots of false positives well under a meter.
                warn!(
                    "Backtracking of {:.2} m detected in shape {} for stop {} ({:.6},{:.6}) at distance {:.2} < {:.2} m on segment #[{}-{}]",
                    delta,
                    self.shape_id,
                    stop,
                    stop.latitude,
                    stop.longitude,
                    best_dist,
                    self.distance,
                    best_i,
                    best_i + 1
                );
            }
        }
        self.istart = best_i;
        self.cache_miss += 1;
        let distance = self.distance;
        self.cursor().insert(&stop.id, distance);
        self.cursor_path.push(stop.id.clone());
        distance
    }

    fn debug_cache(&self) {
        debug!(
            "Shape {}: cache hits: {}, misses: {}",
            self.shape_id, self.cache_hit, self.cache_miss
        );
    }
}

/// Resolves the cumulative distance of each stop of a trip, either along the
/// trip's registered shape, or as straight-line cumulative geodesic distance
/// between consecutive stops when the trip has no shape.
#[derive(Default)]
pub struct Odometer {
    odoshp: Option<OdometerShape>,
    distance: f64,
    last_stop_coord: Option<geo_types::Coord>,
    dcache: DistanceCache,
}

impl Odometer {
    /// An odometer with no shape registered yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes `shape` in place (contiguous sequence from 0, cumulative
    /// meter distances) and registers it for subsequent trip resolutions.
    pub fn normalize_and_register_shape(&mut self, shape: &mut Shape, config: &NormalizeConfig) {
        self.odoshp = Some(OdometerShape::new(shape, config));
        self.reset();
    }

    /// Registers that the next trips have no shape: distances fall back to
    /// straight-line geodesic accumulation between consecutive stops.
    pub fn register_noshape(&mut self) {
        self.odoshp = None;
        self.reset();
    }

    /// Rewinds the cursor state. Must be called between trips, otherwise the
    /// monotonic cursor of the previous trip leaks into the next one.
    pub fn reset(&mut self) {
        if let Some(odoshp) = self.odoshp.as_mut() {
            odoshp.reset();
        }
        self.distance = 0.0;
        self.last_stop_coord = None;
        self.dcache = DistanceCache::new();
    }

    /// Resolves the distance in meters traveled up to `stop`, given the
    /// original `shape_dist_traveled` value of its stop time (if any).
    /// Stops must be visited in ascending stop order; the result is
    /// non-decreasing across one trip.
    pub fn dist_traveled(&mut self, stop: &Stop, old_dist_traveled: Option<f64>) -> f64 {
        if let Some(odoshp) = self.odoshp.as_mut() {
            return odoshp.dist_traveled(stop, old_dist_traveled);
        }
        if let Some(last) = self.last_stop_coord {
            self.distance += self.dcache.orthodromic_distance(last, stop.coord());
        }
        self.last_stop_coord = Some(stop.coord());
        self.distance
    }

    /// Logs the hit/miss counters of the registered shape's snapping cache
    pub fn debug_cache(&self) {
        if let Some(odoshp) = self.odoshp.as_ref() {
            odoshp.debug_cache();
        }
    }
}
