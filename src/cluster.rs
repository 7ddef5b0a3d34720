//! Quadtree-accelerated union-find grouping of nearby stops into clusters,
//! used by analysis passes (e.g. departures-per-stop reports) and not by the
//! normalization pipeline.

use crate::geo::orthodromic_distance;
use crate::objects::Stop;
use petgraph::unionfind::UnionFind;
use rstar::{primitives::GeomWithData, RTree, AABB};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

/// Meters per degree of latitude (and of longitude at the equator)
const METERS_PER_DEGREE: f64 = 111_320.0;

/// A maximal group of mutually-proximate stops, merged transitively
#[derive(Debug)]
pub struct Cluster {
    /// Dense cluster index, stable for one clusterize run
    pub id: usize,
    /// The member stops
    pub items: Vec<Stop>,
}

impl Cluster {
    /// Mean position of the members
    pub fn barycenter(&self) -> (f64, f64) {
        let n = self.items.len() as f64;
        let lat = self.items.iter().map(|s| s.latitude).sum::<f64>() / n;
        let lon = self.items.iter().map(|s| s.longitude).sum::<f64>() / n;
        (lat, lon)
    }

    /// Aggregates a field across members into a deduplicated, sorted,
    /// delimiter-joined string
    pub fn aggregate<'a, F>(&'a self, field: F, separator: &str) -> String
    where
        F: Fn(&'a Stop) -> &'a str,
    {
        let values: BTreeSet<&str> = self.items.iter().map(field).collect();
        values.into_iter().collect::<Vec<_>>().join(separator)
    }
}

/// Pairwise acceptance predicate: given two stops and their geodesic
/// distance, decides whether they may share a cluster
pub type Comparator = Box<dyn Fn(&Stop, &Stop, f64) -> bool>;

/// Groups stops closer than a distance threshold into clusters.
///
/// Stops are held in a spatial index; [SpatialClusterizer::clusterize] runs
/// the union-find pass. Clustering is idempotent and independent of the
/// insertion order, membership being transitive by construction.
pub struct SpatialClusterizer {
    threshold: f64,
    stops: Vec<Stop>,
    clusters: Vec<Cluster>,
    cluster_of: FxHashMap<String, usize>,
}

impl SpatialClusterizer {
    /// `threshold` is the maximum geodesic distance in meters between two
    /// stops for them to be union'ed
    pub fn new(threshold: f64) -> Self {
        SpatialClusterizer {
            threshold,
            stops: Vec::new(),
            clusters: Vec::new(),
            cluster_of: FxHashMap::default(),
        }
    }

    /// Inserts one stop. Must be called before the clustering pass
    pub fn add_point(&mut self, stop: Stop) {
        self.stops.push(stop);
    }

    /// Inserts every stop of `stops`
    pub fn add_points(&mut self, stops: impl IntoIterator<Item = Stop>) {
        for stop in stops {
            self.add_point(stop);
        }
    }

    /// Builds the standard acceptance predicate.
    ///
    /// `samename` additionally requires members to share the exact same
    /// name. `station_penalty` shrinks the acceptable distance to
    /// `threshold * station_penalty` for pairs that do not share a parent
    /// station (use 1.0 to disable).
    pub fn make_comparator(threshold: f64, samename: bool, station_penalty: f64) -> Comparator {
        Box::new(move |a: &Stop, b: &Stop, distance: f64| {
            if samename && a.name != b.name {
                return false;
            }
            let same_station = match (&a.parent_station, &b.parent_station) {
                (Some(pa), Some(pb)) => pa == pb,
                _ => false,
            };
            same_station || distance <= threshold * station_penalty
        })
    }

    /// Runs the clustering pass. Membership queries are only valid
    /// afterwards.
    pub fn clusterize(&mut self) {
        self.clusterize_with(|_, _, _| true)
    }

    /// Runs the clustering pass with a pairwise acceptance predicate on top
    /// of the distance threshold.
    pub fn clusterize_with<F>(&mut self, comparator: F)
    where
        F: Fn(&Stop, &Stop, f64) -> bool,
    {
        let tree: RTree<GeomWithData<[f64; 2], usize>> = RTree::bulk_load(
            self.stops
                .iter()
                .enumerate()
                .map(|(i, s)| GeomWithData::new([s.longitude, s.latitude], i))
                .collect(),
        );

        let mut sets: UnionFind<usize> = UnionFind::new(self.stops.len());
        for (i, stop) in self.stops.iter().enumerate() {
            // Bounding box sized from the threshold, with the longitude span
            // widened by the local cos(latitude) correction
            let dlat = self.threshold / METERS_PER_DEGREE;
            let cos_lat = stop.latitude.to_radians().cos().max(1e-12);
            let dlon = self.threshold / (METERS_PER_DEGREE * cos_lat);
            let envelope = AABB::from_corners(
                [stop.longitude - dlon, stop.latitude - dlat],
                [stop.longitude + dlon, stop.latitude + dlat],
            );
            for neighbor in tree.locate_in_envelope(&envelope) {
                let j = neighbor.data;
                if j <= i {
                    continue;
                }
                let other = &self.stops[j];
                let distance = orthodromic_distance(stop.coord(), other.coord());
                if distance <= self.threshold && comparator(stop, other, distance) {
                    sets.union(i, j);
                }
            }
        }

        // Enumerate the surviving sets as dense cluster ids
        self.clusters.clear();
        self.cluster_of.clear();
        let mut cluster_by_root: FxHashMap<usize, usize> = FxHashMap::default();
        for (i, stop) in self.stops.iter().enumerate() {
            let root = sets.find(i);
            let cluster_id = *cluster_by_root.entry(root).or_insert_with(|| {
                self.clusters.push(Cluster {
                    id: self.clusters.len(),
                    items: Vec::new(),
                });
                self.clusters.len() - 1
            });
            self.clusters[cluster_id].items.push(stop.clone());
            self.cluster_of.insert(stop.id.clone(), cluster_id);
        }
    }

    /// All clusters produced by the last [SpatialClusterizer::clusterize] run
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// The cluster containing `stop`, if it was inserted
    pub fn cluster_of(&self, stop: &Stop) -> Option<&Cluster> {
        self.cluster_of.get(&stop.id).map(|&i| &self.clusters[i])
    }

    /// Whether `a` and `b` were grouped together by the last clustering run
    pub fn in_same_cluster(&self, a: &Stop, b: &Stop) -> bool {
        match (self.cluster_of.get(&a.id), self.cluster_of.get(&b.id)) {
            (Some(ca), Some(cb)) => ca == cb,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(id: &str, lat: f64, lon: f64) -> Stop {
        Stop {
            id: id.to_owned(),
            name: id.to_owned(),
            latitude: lat,
            longitude: lon,
            ..Default::default()
        }
    }

    fn named_stop(id: &str, name: &str, lat: f64, lon: f64, parent: Option<&str>) -> Stop {
        Stop {
            id: id.to_owned(),
            name: name.to_owned(),
            latitude: lat,
            longitude: lon,
            parent_station: parent.map(str::to_owned),
            ..Default::default()
        }
    }

    /// Colinear stops at roughly 0 m, 10 m and 1900 m along the equator
    fn colinear_stops() -> Vec<Stop> {
        vec![
            stop("a", 0.0, 0.0),
            stop("b", 0.0, 0.0000899), // ~10 m
            stop("c", 0.0, 0.01707),   // ~1900 m
        ]
    }

    #[test]
    fn test_two_clusters() {
        let mut sc = SpatialClusterizer::new(1000.0);
        sc.add_points(colinear_stops());
        sc.clusterize();

        assert_eq!(sc.clusters().len(), 2);
        let a = stop("a", 0.0, 0.0);
        let b = stop("b", 0.0, 0.0000899);
        let c = stop("c", 0.0, 0.01707);
        assert!(sc.in_same_cluster(&a, &b));
        assert!(sc.in_same_cluster(&b, &a));
        assert!(!sc.in_same_cluster(&a, &c));
        assert!(!sc.in_same_cluster(&b, &c));
        assert_eq!(sc.cluster_of(&c).unwrap().items.len(), 1);
    }

    #[test]
    fn test_transitive_chaining() {
        // b bridges a and c even though a and c are more than 1 km apart
        let mut sc = SpatialClusterizer::new(1000.0);
        sc.add_points(vec![
            stop("a", 0.0, 0.0),
            stop("b", 0.0, 0.008), // ~890 m from a
            stop("c", 0.0, 0.016), // ~890 m from b, ~1780 m from a
        ]);
        sc.clusterize();

        assert_eq!(sc.clusters().len(), 1);
        assert!(sc.in_same_cluster(&stop("a", 0.0, 0.0), &stop("c", 0.0, 0.016)));
    }

    #[test]
    fn test_insertion_order_independence() {
        let mut forward = SpatialClusterizer::new(1000.0);
        forward.add_points(colinear_stops());
        forward.clusterize();

        let mut reversed = SpatialClusterizer::new(1000.0);
        let mut stops = colinear_stops();
        stops.reverse();
        reversed.add_points(stops);
        reversed.clusterize();

        assert_eq!(forward.clusters().len(), reversed.clusters().len());
        for s1 in colinear_stops() {
            for s2 in colinear_stops() {
                assert_eq!(
                    forward.in_same_cluster(&s1, &s2),
                    reversed.in_same_cluster(&s1, &s2)
                );
            }
        }
    }

    #[test]
    fn test_same_name_comparator() {
        let mut sc = SpatialClusterizer::new(1000.0);
        sc.add_points(vec![
            named_stop("a", "Central", 0.0, 0.0, None),
            named_stop("b", "Main St", 0.0, 0.0000899, None),
        ]);
        sc.clusterize_with(|a, b, _| a.name == b.name);
        assert_eq!(sc.clusters().len(), 2);

        let mut sc = SpatialClusterizer::new(1000.0);
        sc.add_points(vec![
            named_stop("a", "Central", 0.0, 0.0, None),
            named_stop("b", "Central", 0.0, 0.0000899, None),
        ]);
        sc.clusterize_with(|a, b, _| a.name == b.name);
        assert_eq!(sc.clusters().len(), 1);
    }

    #[test]
    fn test_station_penalty_comparator() {
        let threshold = 1000.0;
        // Two stops ~890 m apart: within the raw threshold but beyond the
        // penalized one when they do not share a station
        let strangers = vec![
            named_stop("a", "X", 0.0, 0.0, Some("sta1")),
            named_stop("b", "Y", 0.0, 0.008, Some("sta2")),
        ];
        let mut sc = SpatialClusterizer::new(threshold);
        sc.add_points(strangers);
        sc.clusterize_with(SpatialClusterizer::make_comparator(threshold, false, 0.5));
        assert_eq!(sc.clusters().len(), 2);

        let siblings = vec![
            named_stop("a", "X", 0.0, 0.0, Some("sta1")),
            named_stop("b", "Y", 0.0, 0.008, Some("sta1")),
        ];
        let mut sc = SpatialClusterizer::new(threshold);
        sc.add_points(siblings);
        sc.clusterize_with(SpatialClusterizer::make_comparator(threshold, false, 0.5));
        assert_eq!(sc.clusters().len(), 1);
    }

    #[test]
    fn test_barycenter_and_aggregate() {
        let mut sc = SpatialClusterizer::new(1000.0);
        sc.add_points(vec![
            named_stop("a", "Central", 10.0, 20.0, None),
            named_stop("b", "Main St", 10.001, 20.001, None),
            named_stop("c", "Central", 10.002, 20.002, None),
        ]);
        sc.clusterize();
        assert_eq!(sc.clusters().len(), 1);
        let cluster = &sc.clusters()[0];
        let (lat, lon) = cluster.barycenter();
        assert!((lat - 10.001).abs() < 1e-9);
        assert!((lon - 20.001).abs() < 1e-9);
        // Deduplicated, sorted, joined
        assert_eq!(cluster.aggregate(|s| &s.name, ";"), "Central;Main St");
    }
}
