use chrono::{DateTime, Utc};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::common::{PlannerError, PlannerResult};
use crate::config::PlanningConfig;
use crate::domains::logger::{scoped, DynLogger};
use crate::domains::path_planning::{
    decode, encode, CommandPayload, DelaunayPlanner, FailureKind, PlannerCommand, PlannerResponse,
    Point, ResponseContent, WorkerFailure,
};

/// Owns the one `DelaunayPlanner` and answers commands against it.
pub struct PlannerWorker {
    planner: DelaunayPlanner,
    robot_outline: Vec<Point>,
    config: PlanningConfig,
    logger: DynLogger,
}

impl PlannerWorker {
    pub fn new(robot_outline: Vec<Point>, config: PlanningConfig, logger: DynLogger) -> Self {
        let planner = DelaunayPlanner::new(robot_outline.clone(), config.clone(), logger.clone());
        Self {
            planner,
            robot_outline,
            config,
            logger,
        }
    }

    pub fn planner(&self) -> &DelaunayPlanner {
        &self.planner
    }

    /// Always produces exactly one response; errors and panics become failures.
    pub fn handle(&mut self, command: PlannerCommand) -> PlannerResponse {
        let name = command.payload.name();
        let payload = command.payload.clone();
        let deadline = command.deadline;
        let outcome = catch_unwind(AssertUnwindSafe(|| self.dispatch(payload, deadline)));
        let content = match outcome {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => {
                self.logger
                    .error(&format!("{} {} failed: {}", name, command.id, e));
                Err(e.to_failure())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                self.logger.error(&format!(
                    "{} {} panicked: {}; resetting planner state",
                    name, command.id, message
                ));
                self.planner = DelaunayPlanner::new(
                    self.robot_outline.clone(),
                    self.config.clone(),
                    self.logger.clone(),
                );
                Err(WorkerFailure {
                    kind: FailureKind::Internal,
                    message,
                })
            }
        };
        command.respond(content)
    }

    fn dispatch(
        &mut self,
        payload: CommandPayload,
        deadline: DateTime<Utc>,
    ) -> PlannerResult<ResponseContent> {
        match payload {
            CommandPayload::GrowMap { points } => {
                self.planner.grow_map(&points, deadline)?;
                Ok(ResponseContent::MapGrown)
            }
            CommandPayload::Search {
                areas,
                obstacles,
                start,
                goal,
            } => {
                self.planner
                    .update_map(areas, obstacles, &[start.point(), goal.point()], deadline)?;
                Ok(ResponseContent::Path(self.planner.search(&start, &goal)?))
            }
            CommandPayload::TestSpline {
                areas,
                obstacles,
                spline,
                backward,
            } => {
                let ends = [spline.start.point(), spline.end.point()];
                self.planner.update_map(areas, obstacles, &ends, deadline)?;
                Ok(ResponseContent::Collision(
                    self.planner.test_spline(&spline, backward)?,
                ))
            }
            CommandPayload::ObstacleDistance {
                areas,
                obstacles,
                pose,
            } => {
                self.planner
                    .update_map(areas, obstacles, &[pose.point()], deadline)?;
                Ok(ResponseContent::Distance(
                    self.planner.get_obstacle_distance(&pose)?,
                ))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Handle on the planner worker thread. Commands and responses cross as bincode frames.
pub struct PlannerProcess {
    commands: Option<UnboundedSender<Vec<u8>>>,
    responses: UnboundedReceiver<Vec<u8>>,
    handle: Option<JoinHandle<()>>,
    logger: DynLogger,
}

impl PlannerProcess {
    pub fn spawn(
        robot_outline: Vec<Point>,
        config: PlanningConfig,
        logger: DynLogger,
    ) -> PlannerResult<Self> {
        let (command_tx, command_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (response_tx, response_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let worker_logger = scoped(logger.clone(), "planner-worker");
        let handle = std::thread::Builder::new()
            .name("planner-worker".to_string())
            .spawn(move || {
                let worker = PlannerWorker::new(robot_outline, config, worker_logger.clone());
                run_worker(worker, command_rx, response_tx, worker_logger);
            })?;

        Ok(Self {
            commands: Some(command_tx),
            responses: response_rx,
            handle: Some(handle),
            logger,
        })
    }

    pub fn send(&self, command: &PlannerCommand) -> PlannerResult<()> {
        let frame = encode(command)?;
        self.commands
            .as_ref()
            .ok_or(PlannerError::WorkerGone)?
            .send(frame)
            .map_err(|_| PlannerError::WorkerGone)
    }

    /// Next response if one is waiting; `WorkerGone` once the worker has died and
    /// everything it sent has been drained.
    pub fn try_recv(&mut self) -> PlannerResult<Option<PlannerResponse>> {
        match self.responses.try_recv() {
            Ok(frame) => Ok(Some(decode(&frame)?)),
            Err(TryRecvError::Empty) if self.is_alive() => Ok(None),
            Err(_) => Err(PlannerError::WorkerGone),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Closes both channel ends and waits up to `grace` for the worker to finish its current
    /// command. A worker still busy after that is detached. Returns whether it exited.
    pub async fn shutdown(&mut self, grace: Duration) -> bool {
        self.commands.take();
        self.responses.close();
        let Some(handle) = self.handle.take() else {
            return true;
        };

        let started = Instant::now();
        while !handle.is_finished() && started.elapsed() < grace {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        if handle.is_finished() {
            if handle.join().is_err() {
                self.logger.error("planner worker terminated with a panic");
            }
            true
        } else {
            self.logger.error(&format!(
                "planner worker did not exit within {:.1}s; detaching it",
                grace.as_secs_f64()
            ));
            false
        }
    }
}

fn run_worker(
    mut worker: PlannerWorker,
    mut commands: UnboundedReceiver<Vec<u8>>,
    responses: UnboundedSender<Vec<u8>>,
    logger: DynLogger,
) {
    logger.info("started");
    while let Some(frame) = commands.blocking_recv() {
        let command: PlannerCommand = match decode(&frame) {
            Ok(command) => command,
            Err(e) => {
                logger.error(&format!("dropping undecodable command: {}", e));
                continue;
            }
        };
        let response = worker.handle(command);
        match encode(&response) {
            Ok(frame) => {
                if responses.send(frame).is_err() {
                    break;
                }
            }
            Err(e) => logger.error(&format!("could not encode response {}: {}", response.id, e)),
        }
    }
    logger.info("stopped");
}
