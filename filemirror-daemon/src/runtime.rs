use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::{Instant, MissedTickBehavior};

use filemirror_core::paths::{root_at, socket_path_at};
use filemirror_core::RegistryError;
use filemirror_sync::{SyncCoordinator, SyncError, SyncSummary};

use crate::error::{io_err, DaemonError};
use crate::protocol::{DaemonRequest, DaemonResponse};

struct SyncJob {
    source: &'static str,
    respond_to: oneshot::Sender<Result<PassSummary, String>>,
}

/// Outcome of one pass over the registry.
#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    /// `timer` or `socket`.
    pub source: String,
    #[serde(flatten)]
    pub files: SyncSummary,
    /// Shutdown arrived mid-pass; remaining entries were skipped.
    pub cancelled: bool,
    pub finished_at_unix: u64,
    pub duration_ms: u128,
}

#[derive(Debug)]
struct DaemonState {
    started_at_unix: u64,
    interval_secs: u64,
    passes: u64,
    last_pass: Option<PassSummary>,
}

type SharedState = Arc<RwLock<DaemonState>>;

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(
    home: &Path,
    coordinator: Arc<SyncCoordinator>,
    interval: Duration,
) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), coordinator, interval))
}

/// Run the daemon until `stop` is requested over the socket or ctrl-c.
///
/// Every task is joined before returning, so no pass outlives the call.
pub async fn run(
    home: PathBuf,
    coordinator: Arc<SyncCoordinator>,
    interval: Duration,
) -> Result<(), DaemonError> {
    let root = root_at(&home);
    fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;

    let state: SharedState = Arc::new(RwLock::new(DaemonState {
        started_at_unix: unix_seconds_now(),
        interval_secs: interval.as_secs(),
        passes: 0,
        last_pass: None,
    }));

    let (sync_tx, sync_rx) = mpsc::channel::<SyncJob>(16);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    // Bind before spawning anything so a second daemon fails fast.
    let socket = socket_path_at(&home);
    prepare_socket_for_bind(&socket)?;
    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(
        socket = %socket.display(),
        interval_secs = interval.as_secs(),
        "daemon started"
    );

    let loop_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let sync_tx = sync_tx.clone();
        tokio::spawn(async move {
            let result = sync_loop_task(interval, sync_tx, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let state = state.clone();
        tokio::spawn(async move {
            let result = sync_processor_task(coordinator, state, sync_rx, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let state = state.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                listener,
                socket,
                state,
                sync_tx,
                shutdown.clone(),
                shutdown_rx,
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (loop_result, processor_result, socket_result, signal_result) =
        tokio::join!(loop_handle, processor_handle, socket_handle, signal_handle);

    handle_join("sync_loop", loop_result)?;
    handle_join("sync_processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon stopped");
    Ok(())
}

/// Queue one pass per tick. The first tick fires immediately.
async fn sync_loop_task(
    interval: Duration,
    sync_tx: mpsc::Sender<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                match enqueue_sync(&sync_tx, "timer").await {
                    Ok(summary) => tracing::info!(
                        updated = summary.files.updated,
                        up_to_date = summary.files.up_to_date,
                        unverified = summary.files.unverified,
                        failed = summary.files.failed,
                        duration_ms = summary.duration_ms,
                        "periodic sync completed",
                    ),
                    Err(DaemonError::ChannelClosed(_)) => break,
                    Err(err) => tracing::error!(error = %err, "periodic sync failed"),
                }
            }
        }
    }
    Ok(())
}

/// Single worker: passes from the timer and the socket never overlap.
async fn sync_processor_task(
    coordinator: Arc<SyncCoordinator>,
    state: SharedState,
    mut sync_rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = sync_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let started = Instant::now();
                let stop = Arc::new(AtomicBool::new(false));

                let mut pass = {
                    let coordinator = coordinator.clone();
                    let stop = stop.clone();
                    tokio::task::spawn_blocking(move || coordinator.sync_all_until(&stop))
                };

                let mut shutting_down = false;
                let joined = tokio::select! {
                    joined = &mut pass => joined,
                    _ = shutdown_rx.recv() => {
                        tracing::info!("shutdown requested; stopping pass at next entry");
                        shutting_down = true;
                        stop.store(true, Ordering::SeqCst);
                        pass.await
                    }
                };
                let result = joined
                    .map_err(|err| DaemonError::Protocol(format!("sync task join error: {err}")))?;

                let outcome = match result {
                    Ok(reports) => Ok(SyncSummary::from_reports(&reports)),
                    Err(SyncError::Registry(RegistryError::EmptyRegistry)) => {
                        tracing::debug!("nothing tracked");
                        Ok(SyncSummary::default())
                    }
                    Err(err) => Err(err.to_string()),
                };
                let outcome = match outcome {
                    Ok(files) => {
                        let summary = PassSummary {
                            source: job.source.to_string(),
                            files,
                            cancelled: shutting_down,
                            finished_at_unix: unix_seconds_now(),
                            duration_ms: started.elapsed().as_millis(),
                        };
                        let mut state = state.write().await;
                        state.passes += 1;
                        state.last_pass = Some(summary.clone());
                        Ok(summary)
                    }
                    Err(err) => {
                        tracing::error!(error = %err, source = job.source, "sync pass failed");
                        Err(err)
                    }
                };

                let _ = job.respond_to.send(outcome);
                if shutting_down {
                    break;
                }
            }
        }
    }
    Ok(())
}

async fn socket_server_task(
    listener: UnixListener,
    socket: PathBuf,
    state: SharedState,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let result = loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break Ok(()),
            accepted = listener.accept() => {
                let (stream, _) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => break Err(io_err(&socket, e)),
                };
                let state = state.clone();
                let sync_tx = sync_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                let socket = socket.clone();
                tokio::spawn(async move {
                    if let Err(err) =
                        handle_socket_client(stream, socket, state, sync_tx, shutdown_tx).await
                    {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    };

    drop(listener);
    match fs::remove_file(&socket) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => tracing::warn!(socket = %socket.display(), error = %err, "failed to remove socket"),
    }
    result
}

async fn handle_socket_client(
    stream: UnixStream,
    socket: PathBuf,
    state: SharedState,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<DaemonRequest>(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = match request {
            DaemonRequest::Status => DaemonResponse::ok(status_payload(&socket, &state).await),
            DaemonRequest::Sync => match enqueue_sync(&sync_tx, "socket").await {
                Ok(summary) => DaemonResponse::ok(serde_json::to_value(summary)?),
                Err(err) => DaemonResponse::error(err.to_string()),
            },
            DaemonRequest::Stop => {
                tracing::info!("stop requested over socket");
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
        };
        write_response(&mut writer, &response).await?;
        if request == DaemonRequest::Stop {
            break;
        }
    }
    Ok(())
}

async fn status_payload(socket: &Path, state: &SharedState) -> Value {
    let state = state.read().await;
    json!({
        "running": true,
        "started_at_unix": state.started_at_unix,
        "interval_secs": state.interval_secs,
        "passes": state.passes,
        "last_pass_at_unix": state.last_pass.as_ref().map(|p| p.finished_at_unix),
        "last_pass": state.last_pass,
        "socket": socket.display().to_string(),
    })
}

async fn enqueue_sync(
    sync_tx: &mpsc::Sender<SyncJob>,
    source: &'static str,
) -> Result<PassSummary, DaemonError> {
    let (tx, rx) = oneshot::channel();
    sync_tx
        .send(SyncJob {
            source,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync queue"))?;
    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync response"))?;
    outcome.map_err(DaemonError::Protocol)
}

/// Remove a socket left behind by a dead daemon; refuse to steal a live one.
fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }
    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::AlreadyRunning {
                socket: socket.to_path_buf(),
            })
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }
    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    writer
        .write_all(&payload)
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
