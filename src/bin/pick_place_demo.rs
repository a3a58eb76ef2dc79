use std::path::PathBuf;

use anyhow::{Context, Result};
use nalgebra::Point3;
use pickplace_core::control::status::{spawn_status_listener, GoalStatus};
use pickplace_core::fault::{spawn_fault_listener, RobotMode};
use pickplace_core::sim::{self, Journal};
use pickplace_core::{
    observability, AppConfig, BoundingBox, DepthImage, RgbImage, TaskExecutor, TaskInfo,
};
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init();

    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(path.as_deref()).context("failed to load configuration")?;

    let journal = Journal::new();
    let backend = sim::backend(&journal, Point3::new(0.45, -0.1, 0.03));

    // Feed the shared flags the way the planner status and robot state
    // streams would.
    let (status_tx, status_rx) = mpsc::channel(16);
    let (mode_tx, mode_rx) = mpsc::channel(16);
    let status_task = spawn_status_listener(backend.status.clone(), status_rx);
    let fault_task = spawn_fault_listener(backend.faults.clone(), mode_rx);
    status_tx.send(vec![GoalStatus::Succeeded.code()]).await?;
    mode_tx.send(RobotMode::Idle).await?;

    let executor_config = config.taskexecutor;
    let chain_valid = tokio::task::spawn_blocking(move || -> Result<bool> {
        let mut executor = TaskExecutor::start(executor_config, backend)?;

        let depth = DepthImage::filled(640, 480, 0.75);
        let color = RgbImage {
            width: 640,
            height: 480,
            data: vec![0; 640 * 480 * 3],
        };
        let pick = TaskInfo::new(depth.clone(), BoundingBox::new(300, 220, 340, 260), 3)
            .with_rgb(color);
        let place = TaskInfo::new(depth, BoundingBox::new(400, 200, 440, 240), 0);

        executor.open_slot();
        let picked = executor.pick(&pick)?;
        info!(?picked, "pick finished");
        let placed = executor.place(&place)?;
        info!(?placed, "place finished");

        let valid = executor.is_valid();
        executor.cleanup()?;
        Ok(valid)
    })
    .await??;

    info!(chain_valid, calls = journal.calls().len(), "demo finished");

    drop(status_tx);
    drop(mode_tx);
    status_task.await?;
    fault_task.await?;
    Ok(())
}
