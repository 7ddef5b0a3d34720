/*! Reads [General Transit Feed Specification](https://gtfs.org/) (GTFS) feeds and normalizes them into a canonical form.

Feeds in the wild are messy: stop sequences have gaps, `shape_dist_traveled`
comes in arbitrary units or not at all, intermediate stop times are omitted,
and whole timetables are folded into frequency rules. This crate reads a feed
(a directory or zip of CSV files), links the objects by identifier, and
rewrites it so that downstream consumers see one canonical shape:

- shape and stop sequences are contiguous from 0;
- every `shape_dist_traveled` is a cumulative, non-decreasing distance in
  meters, resolved by snapping stops onto their trip's shape when the feed
  did not provide usable values (see [Odometer]);
- missing intermediate stop times are interpolated linearly in the distance
  domain and flagged as such;
- frequency rules are expanded into concrete trips (see
  [TransitFeed::expand_frequencies]).

To get started, see [TransitFeed].

A [SpatialClusterizer] is also provided to group nearby stops for analysis
purposes; it is independent of the normalization pipeline.

## Design decisions

### Two representations

The raw structs ([RawFeed] and the `Raw*` objects) hold the records as close
as possible to their CSV representation. [TransitFeed] links them by id; in
strict mode an object referencing a non existing id is an error, in lenient
mode it is logged and defaulted or skipped.

### Use of Enum

Many values are integers that are actually enumerations of certain values.
We always use Rust enums, like [LocationType], to represent them, and not
the integer value.

### Times

Times are seconds since midnight and may exceed 24:00:00 for trips running
past midnight, as the GTFS reference requires.
*/
#![warn(missing_docs)]

pub mod cluster;
mod enums;
pub mod error;
mod feed;
pub mod frequency;
pub mod geo;
mod normalize;
pub mod objects;
pub mod odometer;
pub mod piecewise;
mod reader;
mod serde_helpers;


pub use cluster::SpatialClusterizer;
pub use error::Error;
pub use feed::{NormalizeConfig, TransitFeed};
pub use frequency::expand_frequencies;
pub use normalize::normalize_trip;
pub use objects::*;
pub use odometer::Odometer;
pub use piecewise::PiecewiseLinearFunction;
pub use reader::{FeedReader, RawFeed};
