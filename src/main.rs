use std::error::Error;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gryphon_pathplan::adapters::outbound::init_logger;
use gryphon_pathplan::application::PathPlanner;
use gryphon_pathplan::domains::path_planning::{path_length, Obstacle, PathSegment, Pose};
use gryphon_pathplan::Config;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = if Path::new(CONFIG_PATH).exists() {
        Config::from_file(CONFIG_PATH).await?
    } else {
        Config::default()
    };

    // fast_log may already own the `log` facade; tracing still gets installed.
    let logger = init_logger(&config.logging);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    info!("Starting path planner demo");
    let samples = config.planning.length_samples;
    let mut planner = PathPlanner::new(config, logger);
    planner.startup()?;

    let start = Pose::new(0.0, 0.0, 0.0);
    let goal = Pose::new(5.0, 0.0, 0.0);

    info!("Free run from {} to {}", start, goal);
    match planner.search_default(start, goal).await {
        Ok(path) => print_path(&path, samples),
        Err(e) => error!("Free run failed: {}", e),
    }

    planner.add_obstacle(Obstacle::rectangle("crate", 2.5, 0.0, 1.0, 1.0));
    info!("Detour around a 1x1 obstacle at (2.5, 0.0)");
    match planner.search_default(start, goal).await {
        Ok(path) => print_path(&path, samples),
        Err(e) => warn!("Detour failed: {}", e),
    }

    let backup = planner.backup();
    info!("World backup:\n{}", backup.to_json()?);

    planner.shutdown().await;
    info!("Path planner demo finished");
    Ok(())
}

fn print_path(path: &[PathSegment], samples: usize) {
    info!(
        "{} segments, length {:.2}",
        path.len(),
        path_length(path, samples)
    );
    for (i, segment) in path.iter().enumerate() {
        info!(
            "  {:>2}: {} -> {}{}",
            i,
            segment.spline.start,
            segment.spline.end,
            if segment.backward { " (backward)" } else { "" }
        );
    }
}
