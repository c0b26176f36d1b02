//! Accept loop, graceful drain and the stop handle
//!
//! One task accepts connections, one task per connection serves it, and a
//! supervisor task owns the shutdown sequence:
//!
//! 1. wait for the stop signal
//! 2. stop accepting and release the listening socket
//! 3. let open connections finish (each is told to shut down gracefully)
//!    for at most the drain window
//! 4. abort whatever is left
//!
//! The stop signal is a `watch` channel that only ever moves to `true`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{Router, body::Body};
use hyper::{Request, body::Incoming, server::conn::http1};
use hyper_util::{rt::TokioIo, service::TowerToHyperService};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OnceCell, watch};
use tokio::task::{JoinHandle, JoinSet};
use tower::ServiceExt;
use tracing::{debug, error, info, warn};

/// Pause after a failed accept, so a persistent error (EMFILE) does not spin the loop
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Where a server is in its life. Transitions are strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LifecycleState {
    /// Router configured, no socket yet
    Created = 0,
    /// Listener bound and accepting
    Serving = 1,
    /// Stop requested, in-flight connections finishing
    Draining = 2,
    /// Listener closed and drain finished
    Stopped = 3,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Serving,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Serving => write!(f, "serving"),
            Self::Draining => write!(f, "draining"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Lifecycle(AtomicU8);

impl Lifecycle {
    pub(crate) fn current(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move to `to` unless the state is already at or past it
    pub(crate) fn advance(&self, to: LifecycleState) {
        let from = LifecycleState::from_u8(self.0.fetch_max(to as u8, Ordering::SeqCst));
        if from < to {
            debug!(from = %from, to = %to, "Server state changed");
        }
    }
}

/// How the shutdown sequence ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every in-flight connection finished inside the drain window
    Completed,
    /// The drain window elapsed; `aborted` connections were force-closed
    TimedOut { aborted: usize },
    /// The accept task died, so there was nothing left to drain
    Failed(String),
}

/// Returned by `Server::serve`; stops the server and waits for the drain.
///
/// Dropping the handle raises the stop signal without waiting.
pub struct StopHandle {
    stop_tx: watch::Sender<bool>,
    supervisor: Mutex<Option<JoinHandle<ShutdownOutcome>>>,
    outcome: OnceCell<ShutdownOutcome>,
    local_addr: SocketAddr,
    lifecycle: Arc<Lifecycle>,
}

impl StopHandle {
    pub(crate) fn new(
        stop_tx: watch::Sender<bool>,
        supervisor: JoinHandle<ShutdownOutcome>,
        local_addr: SocketAddr,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        Self {
            stop_tx,
            supervisor: Mutex::new(Some(supervisor)),
            outcome: OnceCell::new(),
            local_addr,
            lifecycle,
        }
    }

    /// Address the listener was bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.current()
    }

    /// Stop accepting, drain in-flight requests and close the listener.
    ///
    /// Returns once no handler is running and the port is free. Later calls
    /// return the first outcome without doing anything.
    pub async fn stop(&self) -> ShutdownOutcome {
        self.outcome
            .get_or_init(|| async {
                self.stop_tx.send_replace(true);

                let supervisor = self
                    .supervisor
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();

                let outcome = match supervisor {
                    Some(handle) => handle
                        .await
                        .unwrap_or_else(|e| ShutdownOutcome::Failed(e.to_string())),
                    None => ShutdownOutcome::Failed("shutdown supervisor missing".to_string()),
                };

                warn!(outcome = ?outcome, "HTTP server has been drained and shut down");
                outcome
            })
            .await
            .clone()
    }
}

impl Drop for StopHandle {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}

/// Resolves once the stop signal is raised or its sender is gone.
async fn stopped(stop_rx: &mut watch::Receiver<bool>) {
    let _ = stop_rx.wait_for(|stop| *stop).await;
}

pub(crate) fn spawn(
    listener: TcpListener,
    router: Router,
    drain_timeout: Duration,
    lifecycle: Arc<Lifecycle>,
) -> StopHandle {
    let local_addr = listener
        .local_addr()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));
    let (stop_tx, stop_rx) = watch::channel(false);

    let accept = tokio::spawn(accept_connections(listener, router, stop_rx.clone()));
    let supervisor = tokio::spawn(supervise(stop_rx, accept, drain_timeout, lifecycle.clone()));

    StopHandle::new(stop_tx, supervisor, local_addr, lifecycle)
}

async fn accept_connections(
    listener: TcpListener,
    router: Router,
    mut stop_rx: watch::Receiver<bool>,
) -> JoinSet<()> {
    let mut connections = JoinSet::new();
    let connection_stop = stop_rx.clone();

    loop {
        tokio::select! {
            biased;
            _ = stopped(&mut stop_rx) => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote_addr)) => {
                    connections.spawn(serve_connection(
                        stream,
                        remote_addr,
                        router.clone(),
                        connection_stop.clone(),
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    accept_backoff(&mut stop_rx).await;
                }
            },
        }

        // Reap finished connections so the set only holds live ones
        while connections.try_join_next().is_some() {}
    }

    drop(listener);
    debug!(open_connections = connections.len(), "Listener closed");
    connections
}

/// Sleep for the accept backoff, cut short by the stop signal
async fn accept_backoff(stop_rx: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = stopped(stop_rx) => {}
        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => {}
    }
}

async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    router: Router,
    mut stop_rx: watch::Receiver<bool>,
) {
    let io = TokioIo::new(stream);
    let service = TowerToHyperService::new(
        router.map_request(|request: Request<Incoming>| request.map(Body::new)),
    );

    let conn = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = stopped(&mut stop_rx) => {
            // Finish the request in flight, refuse further keep-alive requests
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(err) = result {
        debug!(error = %err, remote_addr = %remote_addr, "Connection error");
    }
}

async fn supervise(
    mut stop_rx: watch::Receiver<bool>,
    accept: JoinHandle<JoinSet<()>>,
    drain_timeout: Duration,
    lifecycle: Arc<Lifecycle>,
) -> ShutdownOutcome {
    stopped(&mut stop_rx).await;
    lifecycle.advance(LifecycleState::Draining);
    info!(
        drain_timeout_secs = drain_timeout.as_secs_f64(),
        "Stop requested, draining HTTP server"
    );

    let outcome = match accept.await {
        Ok(connections) => drain(connections, drain_timeout).await,
        Err(e) => ShutdownOutcome::Failed(e.to_string()),
    };

    lifecycle.advance(LifecycleState::Stopped);
    match &outcome {
        ShutdownOutcome::Completed => info!("All connections drained"),
        ShutdownOutcome::TimedOut { aborted } => warn!(
            aborted = aborted,
            drain_timeout_secs = drain_timeout.as_secs_f64(),
            "Drain window elapsed, closing remaining connections"
        ),
        ShutdownOutcome::Failed(reason) => {
            error!(reason = %reason, "Accept task failed, skipping drain")
        }
    }
    outcome
}

async fn drain(mut connections: JoinSet<()>, drain_timeout: Duration) -> ShutdownOutcome {
    debug!(in_flight = connections.len(), "Waiting for connections");

    let finished = tokio::time::timeout(drain_timeout, async {
        while connections.join_next().await.is_some() {}
    })
    .await;

    if finished.is_ok() {
        return ShutdownOutcome::Completed;
    }

    let aborted = connections.len();
    connections.abort_all();
    while connections.join_next().await.is_some() {}
    ShutdownOutcome::TimedOut { aborted }
}
