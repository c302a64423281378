mod downlink;
mod local;
mod opener;
mod uplink;

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::Client;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::args::ClientConfig;
use crate::config;
use crate::id;

/// Single source of truth for "the local side is done" (SPEC_FULL.md §9
/// Design Notes), shared between the uplink and downlink pumps so neither
/// has to poll the other's private state.
pub struct LocalState {
    closed: AtomicBool,
    notify: Notify,
}

impl LocalState {
    fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once [`close`](Self::close) has been called, or immediately
    /// if it already has. Subscribes before the second check so a `close()`
    /// racing this call is never missed.
    pub async fn wait_closed(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        if self.is_closed() {
            return;
        }
        notified.await;
    }
}

pub async fn run(config: ClientConfig) -> i32 {
    let connection_id = id::generate_connection_id();
    println!("Connection id: {connection_id}");

    let uplink_client = match build_client(config::client_uplink_timeout()) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("Failed to build HTTP client: {err}");
            return 1;
        }
    };

    if let Err(err) = opener::open_tunnel(
        &uplink_client,
        &config.bridge_url,
        &connection_id,
        &config.remote_host,
        config.remote_port.get(),
    )
    .await
    {
        eprintln!("Failed to open tunnel: {err}");
        return 1;
    }
    println!("Tunnel opened towards {}:{}", config.remote_host, config.remote_port);

    let (local_in, local_out) = match local::acquire(&config.local).await {
        Ok(pair) => pair,
        Err(err) => {
            eprintln!("Failed to acquire local endpoint: {err}");
            let url = opener::tunnel_url(&config.bridge_url, &connection_id);
            let _ = uplink_client.delete(url).send().await;
            return 1;
        }
    };

    let downlink_client = match build_client(config::client_downlink_timeout()) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("Failed to build HTTP client: {err}");
            return 1;
        }
    };

    let state = Rc::new(LocalState::new());

    let signal_watcher = match install_signal_watcher(state.clone()) {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("Failed to install signal handlers: {err}");
            return 1;
        }
    };

    let downlink_id = connection_id.clone();
    let downlink_url = config.bridge_url.clone();
    let downlink_state = state.clone();
    let downlink_task = tokio::task::spawn_local(async move {
        downlink::run_downlink(&downlink_client, &downlink_url, &downlink_id, &downlink_state, local_out).await
    });

    let uplink_url = config.bridge_url.clone();
    let uplink_state = state.clone();
    let uplink_task = tokio::task::spawn_local(async move {
        uplink::run_uplink(&uplink_client, &uplink_url, &connection_id, &uplink_state, local_in).await
    });

    let (downlink_result, uplink_result) = tokio::join!(downlink_task, uplink_task);
    signal_watcher.abort();

    let mut exit_code = 0;

    match downlink_result {
        Ok(downlink::DownlinkExit::Closed) => {}
        Ok(downlink::DownlinkExit::Fatal(err)) => {
            eprintln!("Downlink pump failed: {err}");
            exit_code = 1;
        }
        Err(err) => {
            eprintln!("Downlink pump task did not finish cleanly: {err}");
            exit_code = 1;
        }
    }

    match uplink_result {
        Ok(uplink::UplinkExit::Closed) => {}
        Ok(uplink::UplinkExit::Fatal(err)) => {
            eprintln!("Uplink pump failed: {err}");
            exit_code = 1;
        }
        Err(err) => {
            eprintln!("Uplink pump task did not finish cleanly: {err}");
            exit_code = 1;
        }
    }

    println!("Tunnel closed");
    exit_code
}

fn build_client(timeout: std::time::Duration) -> reqwest::Result<Client> {
    Client::builder().timeout(timeout).build()
}

/// Translates INT/HUP/TERM into a single `close()` on the shared state
/// (SPEC_FULL.md §4.8): whichever signal arrives first wins, and the task
/// exits once it has.
fn install_signal_watcher(state: Rc<LocalState>) -> std::io::Result<JoinHandle<()>> {
    let mut int = signal(SignalKind::interrupt())?;
    let mut hup = signal(SignalKind::hangup())?;
    let mut term = signal(SignalKind::terminate())?;

    Ok(tokio::task::spawn_local(async move {
        tokio::select! {
            _ = int.recv() => println!("SIGINT received, closing local endpoint"),
            _ = hup.recv() => println!("SIGHUP received, closing local endpoint"),
            _ = term.recv() => println!("SIGTERM received, closing local endpoint"),
        }
        state.close();
    }))
}
