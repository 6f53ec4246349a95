use crate::{
    core::PolicyId,
    k8s::{watcher, Api, DnsPolicy},
    status::{self, Reconciler},
    store::{KubeEvents, KubeStore},
};
use futures::prelude::*;
use kube::runtime::controller::{Action, Controller};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// User-correctable failures are retried this many times more slowly than transient ones.
const STANDING_ERROR_BACKOFF: u32 = 6;

pub(crate) struct Context {
    reconciler: Reconciler<KubeStore, KubeEvents>,
    retry_delay: Duration,
}

// === impl Context ===

impl Context {
    pub(crate) fn new(reconciler: Reconciler<KubeStore, KubeEvents>, retry_delay: Duration) -> Self {
        Self {
            reconciler,
            retry_delay,
        }
    }
}

/// Runs the `DnsPolicy` controller until `drain` is signaled.
///
/// The controller's queue serializes reconciliations of the same policy. On shutdown it stops
/// accepting changes and waits for in-flight reconciliations before releasing `drain`.
pub(crate) async fn run(api: Api<DnsPolicy>, ctx: Context, drain: drain::Watch) {
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let controller = Controller::new(api, watcher::Config::default())
        .graceful_shutdown_on(stop_rx.map(|_| ()))
        .run(reconcile, error_policy, Arc::new(ctx))
        .for_each(|res| async move {
            match res {
                Ok((obj, action)) => debug!(policy = %obj, ?action, "Reconciled"),
                Err(error) => warn!(%error, "Reconcile failed"),
            }
        });
    tokio::pin!(controller);

    info!("DnsPolicy controller started");
    tokio::select! {
        _ = &mut controller => {}
        handle = drain.signaled() => {
            let _ = stop_tx.send(());
            handle.release_after(controller).await;
        }
    }
    info!("DnsPolicy controller stopped");
}

async fn reconcile(policy: Arc<DnsPolicy>, ctx: Arc<Context>) -> Result<Action, status::Error> {
    let id = PolicyId::from(&*policy);
    ctx.reconciler.reconcile(&id).await?;
    Ok(Action::await_change())
}

fn error_policy(_policy: Arc<DnsPolicy>, error: &status::Error, ctx: Arc<Context>) -> Action {
    let delay = if error.is_user_correctable() {
        ctx.retry_delay * STANDING_ERROR_BACKOFF
    } else {
        ctx.retry_delay
    };
    Action::requeue(delay)
}
