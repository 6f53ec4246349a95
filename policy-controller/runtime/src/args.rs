use crate::{
    admission::Admission,
    controller::{self, Context},
    http,
    index::{self, PolicyIndex},
    k8s::{Api, DnsPolicy},
    status::{ReconcileMetrics, Reconciler},
    store::{KubeEvents, KubeStore},
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::net::SocketAddr;
use tokio::time::Duration;
use tracing::{info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "dns-policy", about = "A DNS policy resource controller")]
pub struct Args {
    #[clap(
        long,
        default_value = "dns_policy=info,warn",
        env = "DNS_POLICY_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Disables the admission controller server.
    #[clap(long)]
    admission_controller_disabled: bool,

    /// Address on which the policy query API is served.
    #[clap(long, default_value = "0.0.0.0:8080")]
    api_addr: SocketAddr,

    #[clap(long, default_value = "10000")]
    api_read_timeout_ms: u64,

    #[clap(long, default_value = "10000")]
    api_write_timeout_ms: u64,

    #[clap(long, default_value = "60000")]
    api_idle_timeout_ms: u64,

    /// How long in-flight API requests may run once shutdown begins.
    #[clap(long, default_value = "5000")]
    api_shutdown_grace_ms: u64,

    /// Name reported as the source of Kubernetes events.
    #[clap(long, default_value = "dnspolicy-controller")]
    controller_name: String,

    /// Base delay before a failed reconciliation is retried.
    #[clap(long, default_value = "5000")]
    retry_delay_ms: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            admission_controller_disabled,
            api_addr,
            api_read_timeout_ms,
            api_write_timeout_ms,
            api_idle_timeout_ms,
            api_shutdown_grace_ms,
            controller_name,
            retry_delay_ms,
        } = self;

        let server = if admission_controller_disabled {
            None
        } else {
            Some(server)
        };

        // Shared between the reconciler, which writes it, and the query API, which reads it.
        let index = PolicyIndex::new();

        let mut prom = <Registry>::default();
        index::metrics::register(
            prom.sub_registry_with_prefix("dns_policy_index"),
            index.clone(),
        );
        let reconcile_metrics =
            ReconcileMetrics::register(prom.sub_registry_with_prefix("dns_policy"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_optional_server(server)
            .build()
            .await?;

        // Bind before spawning anything so that an unusable address fails startup.
        let api = http::Server::bind(
            api_addr,
            http::Timeouts {
                read: Duration::from_millis(api_read_timeout_ms),
                write: Duration::from_millis(api_write_timeout_ms),
                idle: Duration::from_millis(api_idle_timeout_ms),
                shutdown_grace: Duration::from_millis(api_shutdown_grace_ms),
            },
        )
        .await?;
        tokio::spawn(api.run(index.clone(), runtime.shutdown_handle()));

        let client = runtime.client();
        let hostname = std::env::var("HOSTNAME").ok();
        let reconciler = Reconciler::new(
            index,
            KubeStore::new(client.clone()),
            KubeEvents::new(client.clone(), controller_name, hostname),
            reconcile_metrics,
        );
        let ctx = Context::new(reconciler, Duration::from_millis(retry_delay_ms));
        tokio::spawn(
            controller::run(Api::<DnsPolicy>::all(client), ctx, runtime.shutdown_handle())
                .instrument(info_span!("controller")),
        );

        let runtime = runtime.spawn_server(Admission::new);

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
