pub mod delaunay_planner;
pub mod edge_cache;
pub mod geometry;
pub mod grid;
pub mod obstacle_map;
pub mod pose_group;
pub mod protocol;
pub mod raster;
pub mod spline;
pub mod world;

pub use delaunay_planner::*;
pub use geometry::*;
pub use grid::*;
pub use obstacle_map::*;
pub use pose_group::*;
pub use protocol::*;
pub use spline::*;
pub use world::*;
