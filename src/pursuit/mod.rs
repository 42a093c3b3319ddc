//! Path following with the pure-pursuit algorithm.

pub mod follower;
pub mod path;

pub use follower::{PurePursuit, PurePursuitConfig};
pub use path::{line_circle_intersections, HermitePoint, Path};
