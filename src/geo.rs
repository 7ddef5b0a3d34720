//! Geodesic primitives used by the odometer and the clusterizer.
//!
//! Coordinates are `geo_types::Coord` with `x = longitude, y = latitude`, in
//! degrees. All distances are in meters.

use geo_types::Coord;
use rustc_hash::FxHashMap;

/// Mean earth radius, in meters
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// Great-circle (Haversine) distance between two points, in meters.
///
/// Symmetric, zero for identical points, and obeys the spherical triangle
/// inequality within floating precision.
pub fn orthodromic_distance(a: Coord, b: Coord) -> f64 {
    let (lon_a, lat_a) = (a.x.to_radians(), a.y.to_radians());
    let (lon_b, lat_b) = (b.x.to_radians(), b.y.to_radians());
    let dlon = lon_b - lon_a;
    let dlat = lat_b - lat_a;
    let h = (dlat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * h.sqrt().asin() * EARTH_RADIUS
}

/// Distance from point `p` to the segment `[a, b]`, in meters, under a local
/// equirectangular approximation valid at the segment's latitude.
///
/// Returns `(distance, arc_length)` where `arc_length` is the distance from
/// `a` to the projection of `p` onto the segment, clamped to `[0, |ab|]`.
/// A zero-length segment yields the distance to `a` and an arc length of 0.
pub fn orthodromic_seg_distance(p: Coord, a: Coord, b: Coord) -> (f64, f64) {
    // Flat-earth plane centered on a, scaled by cos(lat) on the longitude axis
    let cos_lat = a.y.to_radians().cos();
    let px = (p.x - a.x).to_radians() * cos_lat;
    let py = (p.y - a.y).to_radians();
    let bx = (b.x - a.x).to_radians() * cos_lat;
    let by = (b.y - a.y).to_radians();

    let seg_len2 = bx * bx + by * by;
    let t = if seg_len2 > 0.0 {
        ((px * bx + py * by) / seg_len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let dx = px - t * bx;
    let dy = py - t * by;
    let distance = (dx * dx + dy * dy).sqrt() * EARTH_RADIUS;
    let arc_length = t * seg_len2.sqrt() * EARTH_RADIUS;
    (distance, arc_length)
}

/// Memoizing wrapper around [orthodromic_distance], keyed by the 4-tuple of
/// endpoint coordinates. The same stop pairs recur across many trips sharing
/// a route, so hits are frequent.
#[derive(Default)]
pub struct DistanceCache {
    cache: FxHashMap<[u64; 4], f64>,
}

impl DistanceCache {
    /// An empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Same as [orthodromic_distance], memoized
    pub fn orthodromic_distance(&mut self, a: Coord, b: Coord) -> f64 {
        let key = [
            a.y.to_bits(),
            a.x.to_bits(),
            b.y.to_bits(),
            b.x.to_bits(),
        ];
        *self
            .cache
            .entry(key)
            .or_insert_with(|| orthodromic_distance(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAUTICAL_MILE: f64 = 1853.248;

    fn coord(lat: f64, lon: f64) -> Coord {
        Coord { x: lon, y: lat }
    }

    #[test]
    fn test_distance() {
        let a = coord(0.0, 0.0);
        let b = coord(1.0, 0.0);
        let c = coord(0.0, 1.0);
        assert!(orthodromic_distance(a, a).abs() < 1e-3);
        let dab = orthodromic_distance(a, b);
        let dac = orthodromic_distance(a, c);
        let dbc = orthodromic_distance(b, c);
        assert!((dab - dac).abs() < 1e-3);
        // One minute of latitude is the definition of the nautical mile
        assert!((dab / 60.0 - NAUTICAL_MILE).abs() < 1.0);
        // Spherical triangle inequality
        assert!(dab * dab + dac * dac > dbc * dbc);

        // Longitude shrinks by cos(latitude)
        let f = coord(45.0, 0.0);
        let g = coord(45.0001, 0.0);
        let h = coord(45.0, 0.0001);
        let dfg = orthodromic_distance(f, g);
        let dfh = orthodromic_distance(f, h);
        assert!((dfg * 45f64.to_radians().cos() - dfh).abs() < 1e-3);
    }

    #[test]
    fn test_distance_symmetry() {
        let a = coord(43.7, -79.4);
        let b = coord(45.5, -73.6);
        assert_eq!(
            orthodromic_distance(a, b).to_bits(),
            orthodromic_distance(b, a).to_bits()
        );
    }

    #[test]
    fn test_seg_distance() {
        let a = coord(0.0, 0.0);
        let b = coord(1.0, 0.0);

        // Degenerate segment
        let (d, arc) = orthodromic_seg_distance(a, a, a);
        assert!(d.abs() < 1e-3);
        assert_eq!(arc, 0.0);

        // Endpoints and midpoint lie on the segment
        let (d, arc) = orthodromic_seg_distance(a, a, b);
        assert!(d.abs() < 1e-3);
        assert!(arc.abs() < 1e-3);
        let (d, arc) = orthodromic_seg_distance(b, a, b);
        assert!(d.abs() < 1e-3);
        assert!((arc - orthodromic_distance(a, b)).abs() < 1.0);
        let c = coord(0.5, 0.0);
        let (d, arc) = orthodromic_seg_distance(c, a, b);
        assert!(d.abs() < 1e-3);
        assert!((arc - orthodromic_distance(a, c)).abs() < 1.0);

        // Projection before a clamps to a
        let before = coord(-1.0, 0.0);
        let (d, arc) = orthodromic_seg_distance(before, a, b);
        assert!((d / 60.0 - NAUTICAL_MILE).abs() < 1.0);
        assert_eq!(arc, 0.0);

        // Projection past b clamps to the full segment length
        let past = coord(2.0, 0.0);
        let (d, arc) = orthodromic_seg_distance(past, a, b);
        assert!((d / 60.0 - NAUTICAL_MILE).abs() < 1.0);
        assert!((arc - orthodromic_distance(a, b)).abs() < 1.0);

        // Point abeam of the segment
        let side = coord(0.01, 1.0);
        let (d, _) = orthodromic_seg_distance(side, a, b);
        assert!((d / 60.0 - NAUTICAL_MILE).abs() < 2.0);
    }

    #[test]
    fn test_distance_cache() {
        let mut cache = DistanceCache::new();
        let a = coord(45.0, 0.0);
        let b = coord(45.0, 0.01);
        let d1 = cache.orthodromic_distance(a, b);
        let d2 = cache.orthodromic_distance(a, b);
        assert_eq!(d1.to_bits(), d2.to_bits());
        assert!((d1 - orthodromic_distance(a, b)).abs() < 1e-9);
    }
}
