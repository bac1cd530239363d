use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use super::deployments::DeploymentController;

/// Periodically reconciles every deployment until shut down.
///
/// Passes run back to back on one task, so a slow pass delays the next tick
/// instead of overlapping it.
pub struct ReconcileLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<usize>,
}

impl ReconcileLoop {
    pub fn spawn(controller: DeploymentController, every: Duration) -> Self {
        let (shutdown, mut stop) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut passes = 0usize;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop.changed() => break,
                }

                match controller.reconcile_all().await {
                    Ok(report) => {
                        let changed = report.outcomes.iter().filter(|o| !o.is_converged()).count();
                        tracing::debug!(
                            "Reconcile pass {}: {} deployments, {} changed, {} failed",
                            passes,
                            report.outcomes.len() + report.failures.len(),
                            changed,
                            report.failures.len()
                        );
                    }
                    Err(e) => tracing::warn!("Reconcile pass {} failed: {}", passes, e),
                }
                passes += 1;
            }

            tracing::info!("Reconcile loop stopped after {} passes", passes);
            passes
        });

        Self { shutdown, handle }
    }

    /// Signal the loop and wait for the current pass to finish. Returns the
    /// number of completed passes.
    pub async fn shutdown(self) -> usize {
        let _ = self.shutdown.send(true);
        match self.handle.await {
            Ok(passes) => passes,
            Err(e) => {
                tracing::error!("Reconcile loop task failed: {}", e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContainerSpec, Deployment, DeploymentSpec, PodSpec, PodTemplateSpec};
    use crate::orchestrator::testing::Harness;
    use crate::repository::PodFilter;

    #[tokio::test]
    async fn test_loop_converges_and_stops() {
        let harness = Harness::with_nodes(&["node-a"]).await;
        let deployment = Deployment::new(
            "default",
            "worker",
            DeploymentSpec {
                replicas: 2,
                selector: Default::default(),
                template: PodTemplateSpec {
                    metadata: Default::default(),
                    spec: PodSpec {
                        containers: vec![ContainerSpec::new("worker", "busybox")],
                        node_name: None,
                    },
                },
            },
        );
        harness.deployments.create_deployment(deployment).await.unwrap();

        let reconcile_loop = ReconcileLoop::spawn(harness.deployments.clone(), Duration::from_millis(10));
        let mut converged = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if harness.pods.list_pods(&PodFilter::all()).await.unwrap().len() == 2 {
                converged = true;
                break;
            }
        }
        let passes = reconcile_loop.shutdown().await;

        assert!(converged);
        assert!(passes >= 1);
        assert_eq!(harness.pods.list_pods(&PodFilter::all()).await.unwrap().len(), 2);
    }
}
