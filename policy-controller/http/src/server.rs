use crate::{Error, QueryService};
use dns_policy_controller_k8s_index::PolicyIndex;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use parking_lot::Mutex;
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::watch,
    task::JoinSet,
    time::{self, Duration, Instant},
};
use tokio_io_timeout::TimeoutStream;
use tower::ServiceExt;
use tracing::{debug, debug_span, info, instrument, warn, Instrument};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Bounds on how long a client may hold server resources.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Timeouts {
    /// Bounds the time to receive a request's headers, including the wait for the next request on
    /// a kept-alive connection.
    pub read: Duration,

    /// Bounds how long a response write may stall. A connection whose peer stops reading is
    /// closed once no bytes have been written for this long.
    pub write: Duration,

    /// Closes connections that have had no request in flight for this long.
    pub idle: Duration,

    /// How long in-flight connections may run after shutdown begins.
    pub shutdown_grace: Duration,
}

/// An HTTP/1 server for the [`QueryService`].
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    timeouts: Timeouts,
}

/// Tracks request activity on a single connection.
#[derive(Debug)]
struct Activity {
    in_flight: AtomicUsize,
    last: Mutex<Instant>,
}

struct InFlight(Arc<Activity>);

// === impl Timeouts ===

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(10),
            write: Duration::from_secs(10),
            idle: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

// === impl Server ===

impl Server {
    pub async fn bind(addr: SocketAddr, timeouts: Timeouts) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| Error::Bind { addr, source })?;
        Ok(Self {
            listener,
            local_addr,
            timeouts,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves requests until `drain` is signaled.
    ///
    /// Once signaled the listener is closed immediately. Open connections are asked to finish
    /// their in-flight request and close; any still open after the shutdown grace period are
    /// dropped. Shutdown is released only after every connection is gone.
    #[instrument(skip_all, fields(addr = %self.local_addr))]
    pub async fn run(self, index: PolicyIndex, drain: drain::Watch) {
        let Self {
            listener,
            local_addr,
            timeouts,
        } = self;
        let svc = QueryService::new(index);
        let (close_tx, close_rx) = watch::channel(());
        let mut conns = JoinSet::new();

        info!(addr = %local_addr, "policy API server listening");
        let signaled = drain.signaled();
        let backoff = time::sleep(Duration::ZERO);
        tokio::pin!(signaled, backoff);
        let mut backing_off = false;
        let release = loop {
            tokio::select! {
                release = &mut signaled => break release,

                _ = &mut backoff, if backing_off => backing_off = false,

                res = listener.accept(), if !backing_off => match res {
                    Ok((io, client)) => {
                        conns.spawn(
                            serve_connection(io, svc.clone(), timeouts, close_rx.clone())
                                .instrument(debug_span!("conn", %client)),
                        );
                    }
                    Err(error) => {
                        warn!(%error, "Failed to accept connection");
                        backoff.as_mut().reset(Instant::now() + ACCEPT_BACKOFF);
                        backing_off = true;
                    }
                },

                Some(res) = conns.join_next(), if !conns.is_empty() => {
                    if let Err(error) = res {
                        warn!(%error, "Connection task failed");
                    }
                }
            }
        };
        drop(listener);

        let open = conns.len();
        debug!(open, "Closing connections");
        let _ = close_tx.send(());
        release
            .release_after(async move {
                let closed = time::timeout(timeouts.shutdown_grace, async {
                    while conns.join_next().await.is_some() {}
                })
                .await;
                if closed.is_err() {
                    warn!(remaining = conns.len(), "Grace period elapsed; dropping connections");
                    conns.shutdown().await;
                }
            })
            .await;
        info!("policy API server stopped");
    }
}

async fn serve_connection(
    io: TcpStream,
    svc: QueryService,
    timeouts: Timeouts,
    mut closed: watch::Receiver<()>,
) {
    let activity = Arc::new(Activity::new());
    let tracked = {
        let activity = activity.clone();
        hyper::service::service_fn(move |req| {
            let guard = activity.begin();
            let call = svc.clone().oneshot(req);
            async move {
                let rsp = call.await;
                drop(guard);
                rsp
            }
        })
    };

    // Writes that make no progress fail the connection, so a client that stops reading cannot
    // hold it open indefinitely.
    let mut io = TimeoutStream::new(io);
    io.set_write_timeout(Some(timeouts.write));

    let conn = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(timeouts.read)
        .keep_alive(true)
        .serve_connection(TokioIo::new(Box::pin(io)), tracked);
    tokio::pin!(conn);

    loop {
        tokio::select! {
            res = conn.as_mut() => {
                if let Err(error) = res {
                    debug!(%error, "Connection closed");
                }
                return;
            }

            // Fires on shutdown, or if the server was dropped.
            _ = closed.changed() => {
                debug!("Shutting down");
                conn.as_mut().graceful_shutdown();
                break;
            }

            _ = time::sleep_until(activity.idle_deadline(timeouts.idle)) => {
                if activity.is_idle(timeouts.idle) {
                    debug!("Closing idle connection");
                    conn.as_mut().graceful_shutdown();
                    break;
                }
            }
        }
    }

    if let Err(error) = conn.await {
        debug!(%error, "Connection closed");
    }
}

// === impl Activity ===

impl Activity {
    fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            last: Mutex::new(Instant::now()),
        }
    }

    fn begin(self: &Arc<Self>) -> InFlight {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        *self.last.lock() = Instant::now();
        InFlight(self.clone())
    }

    /// The earliest instant at which the connection may be considered idle.
    fn idle_deadline(&self, idle: Duration) -> Instant {
        if self.in_flight.load(Ordering::Acquire) > 0 {
            return Instant::now() + idle;
        }
        *self.last.lock() + idle
    }

    fn is_idle(&self, idle: Duration) -> bool {
        self.in_flight.load(Ordering::Acquire) == 0 && self.last.lock().elapsed() >= idle
    }
}

// === impl InFlight ===

impl Drop for InFlight {
    fn drop(&mut self) {
        *self.0.last.lock() = Instant::now();
        self.0.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
