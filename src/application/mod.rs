pub mod path_planner;
pub mod planner_process;

pub use path_planner::*;
pub use planner_process::*;
