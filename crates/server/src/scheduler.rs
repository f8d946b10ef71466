use chrono::Utc;
use database::services::reconcile::BatchReconciler;
use log::{debug, error, info};
use sea_orm::DatabaseConnection;
use std::time::Duration;
use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};

/// Starts the periodic batch sweep. The first sweep runs immediately.
///
/// A sweep that outlasts the period delays the next one instead of queueing
/// ticks, and the advisory lock taken by the reconciler keeps other server
/// instances from sweeping at the same time.
pub fn spawn(db: DatabaseConnection, period: Duration) -> JoinHandle<()> {
    info!("Batch sweep scheduled every {}s", period.as_secs());

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            match BatchReconciler::reconcile_all_batches(&db, Utc::now()).await {
                Ok(report) => debug!("Batch sweep report: {report:?}"),
                Err(err) => error!("Batch sweep failed: {err}"),
            }
        }
    })
}
