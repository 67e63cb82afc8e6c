use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use super::planner_process::PlannerProcess;
use crate::common::{PlannerError, PlannerResult};
use crate::config::Config;
use crate::domains::logger::DynLogger;
use crate::domains::path_planning::{
    Area, CommandPayload, Obstacle, PathSegment, PlannerCommand, PlannerResponse, Point, Pose,
    ResponseContent, Spline, WorldBackup,
};

/// Caller side of the planner: owns the world and talks to the worker through
/// deadline-bounded commands.
pub struct PathPlanner {
    config: Config,
    logger: DynLogger,
    process: Option<PlannerProcess>,
    obstacles: HashMap<String, Obstacle>,
    areas: HashMap<String, Area>,
    needs_backup: bool,
    responses: HashMap<Uuid, PlannerResponse>,
}

impl PathPlanner {
    pub fn new(config: Config, logger: DynLogger) -> Self {
        Self {
            config,
            logger,
            process: None,
            obstacles: HashMap::new(),
            areas: HashMap::new(),
            needs_backup: false,
            responses: HashMap::new(),
        }
    }

    pub fn startup(&mut self) -> PlannerResult<()> {
        if self.process.is_some() {
            return Ok(());
        }
        let process = PlannerProcess::spawn(
            self.config.robot.outline.clone(),
            self.config.planning.clone(),
            self.logger.clone(),
        )?;
        self.process = Some(process);
        self.logger.info("path planner started");
        Ok(())
    }

    pub async fn shutdown(&mut self) {
        if let Some(mut process) = self.process.take() {
            process.shutdown(self.config.process.shutdown_grace()).await;
            self.logger.info("path planner stopped");
        }
        self.responses.clear();
    }

    pub fn is_running(&self) -> bool {
        self.process.as_ref().is_some_and(|p| p.is_alive())
    }

    /// Moves at most one response from the worker into the response table.
    /// Responses whose deadline has already passed are dropped.
    pub fn step(&mut self) -> PlannerResult<()> {
        let process = self.process.as_mut().ok_or(PlannerError::WorkerGone)?;
        let response = match process.try_recv() {
            Ok(response) => response,
            Err(PlannerError::WorkerGone) => {
                self.logger.error("planner worker is gone");
                return Err(PlannerError::WorkerGone);
            }
            Err(e) => return Err(e),
        };
        if let Some(response) = response {
            if response.is_expired(Utc::now()) {
                self.logger
                    .info(&format!("dropping stale response {}", response.id));
            } else {
                self.responses.insert(response.id, response);
            }
        }
        Ok(())
    }

    /// Number of delivered responses not yet claimed by a call.
    pub fn pending_responses(&self) -> usize {
        self.responses.len()
    }

    pub async fn call(&mut self, command: PlannerCommand) -> PlannerResult<ResponseContent> {
        let id = command.id;
        self.process
            .as_ref()
            .ok_or(PlannerError::WorkerGone)?
            .send(&command)?;
        let interval = self.config.process.check_interval();
        loop {
            self.step()?;
            if let Some(response) = self.responses.remove(&id) {
                return response.content.map_err(PlannerError::from);
            }
            if command.is_expired(Utc::now()) {
                return Err(PlannerError::Timeout { id });
            }
            tokio::time::sleep(interval).await;
        }
    }

    pub async fn grow_map(&mut self, points: Vec<Point>, timeout: Duration) -> PlannerResult<()> {
        let command = PlannerCommand::new(CommandPayload::GrowMap { points }, timeout);
        match self.call(command).await? {
            ResponseContent::MapGrown => Ok(()),
            other => Err(unexpected("grow_map", &other)),
        }
    }

    pub async fn search(
        &mut self,
        start: Pose,
        goal: Pose,
        timeout: Duration,
    ) -> PlannerResult<Vec<PathSegment>> {
        let (areas, obstacles) = self.world();
        let payload = CommandPayload::Search {
            areas,
            obstacles,
            start,
            goal,
        };
        match self.call(PlannerCommand::new(payload, timeout)).await? {
            ResponseContent::Path(path) => Ok(path),
            other => Err(unexpected("search", &other)),
        }
    }

    /// True if the spline collides.
    pub async fn test_spline(
        &mut self,
        spline: Spline,
        backward: bool,
        timeout: Duration,
    ) -> PlannerResult<bool> {
        let (areas, obstacles) = self.world();
        let payload = CommandPayload::TestSpline {
            areas,
            obstacles,
            spline,
            backward,
        };
        match self.call(PlannerCommand::new(payload, timeout)).await? {
            ResponseContent::Collision(collides) => Ok(collides),
            other => Err(unexpected("test_spline", &other)),
        }
    }

    pub async fn get_obstacle_distance(
        &mut self,
        pose: Pose,
        timeout: Duration,
    ) -> PlannerResult<f64> {
        let (areas, obstacles) = self.world();
        let payload = CommandPayload::ObstacleDistance {
            areas,
            obstacles,
            pose,
        };
        match self.call(PlannerCommand::new(payload, timeout)).await? {
            ResponseContent::Distance(distance) => Ok(distance),
            other => Err(unexpected("get_obstacle_distance", &other)),
        }
    }

    pub async fn grow_map_default(&mut self, points: Vec<Point>) -> PlannerResult<()> {
        let timeout = self.config.process.default_timeout();
        self.grow_map(points, timeout).await
    }

    pub async fn search_default(&mut self, start: Pose, goal: Pose) -> PlannerResult<Vec<PathSegment>> {
        let timeout = self.config.process.default_timeout();
        self.search(start, goal, timeout).await
    }

    pub async fn test_spline_default(&mut self, spline: Spline, backward: bool) -> PlannerResult<bool> {
        let timeout = self.config.process.default_timeout();
        self.test_spline(spline, backward, timeout).await
    }

    pub async fn get_obstacle_distance_default(&mut self, pose: Pose) -> PlannerResult<f64> {
        let timeout = self.config.process.default_timeout();
        self.get_obstacle_distance(pose, timeout).await
    }

    /// Areas and obstacles ordered by id so unchanged worlds compare equal in the worker.
    fn world(&self) -> (Vec<Area>, Vec<Obstacle>) {
        let mut areas: Vec<Area> = self.areas.values().cloned().collect();
        areas.sort_by(|a, b| a.id.cmp(&b.id));
        let mut obstacles: Vec<Obstacle> = self.obstacles.values().cloned().collect();
        obstacles.sort_by(|a, b| a.id.cmp(&b.id));
        (areas, obstacles)
    }

    pub fn obstacles(&self) -> &HashMap<String, Obstacle> {
        &self.obstacles
    }

    pub fn areas(&self) -> &HashMap<String, Area> {
        &self.areas
    }

    pub fn add_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacles.insert(obstacle.id.clone(), obstacle);
        self.needs_backup = true;
    }

    pub fn remove_obstacle(&mut self, id: &str) -> Option<Obstacle> {
        let removed = self.obstacles.remove(id);
        self.needs_backup |= removed.is_some();
        removed
    }

    pub fn add_area(&mut self, area: Area) {
        self.areas.insert(area.id.clone(), area);
        self.needs_backup = true;
    }

    pub fn remove_area(&mut self, id: &str) -> Option<Area> {
        let removed = self.areas.remove(id);
        self.needs_backup |= removed.is_some();
        removed
    }

    pub fn clear(&mut self) {
        self.obstacles.clear();
        self.areas.clear();
        self.needs_backup = true;
    }

    pub fn needs_backup(&self) -> bool {
        self.needs_backup
    }

    /// Snapshot of the world; clears the dirty flag.
    pub fn backup(&mut self) -> WorldBackup {
        self.needs_backup = false;
        WorldBackup {
            obstacles: self
                .obstacles
                .iter()
                .map(|(id, o)| (id.clone(), o.clone()))
                .collect(),
            areas: self
                .areas
                .iter()
                .map(|(id, a)| (id.clone(), a.clone()))
                .collect(),
        }
    }

    pub fn restore(&mut self, backup: WorldBackup) {
        self.obstacles = backup.obstacles.into_iter().collect();
        self.areas = backup.areas.into_iter().collect();
        self.needs_backup = false;
    }
}

fn unexpected(call: &str, content: &ResponseContent) -> PlannerError {
    PlannerError::Worker {
        message: format!("unexpected response to {}: {:?}", call, content),
    }
}
