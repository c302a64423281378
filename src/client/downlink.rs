//! Downlink Pump: long-polls GET and writes received bytes to the local
//! endpoint (SPEC_FULL.md §4.6).

use std::rc::Rc;

use reqwest::{Client, StatusCode, Url};
use tokio::io::AsyncWriteExt;

use crate::client::local::LocalWriter;
use crate::client::opener::tunnel_url;
use crate::client::LocalState;
use crate::config;
use crate::error::BridgeError;

pub enum DownlinkExit {
    /// Local endpoint closed, remote closed, or bridge unreachable — all
    /// converge on the same "tunnel is done" outcome (exit code 0).
    Closed,
    Fatal(BridgeError),
}

pub async fn run_downlink(
    client: &Client,
    bridge_url: &Url,
    id: &str,
    state: &Rc<LocalState>,
    mut output: LocalWriter,
) -> DownlinkExit {
    loop {
        if state.is_closed() {
            return DownlinkExit::Closed;
        }

        let url = tunnel_url(bridge_url, id);
        let response = tokio::select! {
            response = client.get(url).send() => response,
            () = state.wait_closed() => return DownlinkExit::Closed,
        };

        match response {
            Ok(response) => match response.status() {
                StatusCode::OK => match response.bytes().await {
                    Ok(bytes) => {
                        // §4.4 requires unbuffered local output; flush so a
                        // stdio `_out` doesn't sit on a partial line.
                        let write_result = match output.write_all(&bytes).await {
                            Ok(()) => output.flush().await,
                            Err(err) => Err(err),
                        };
                        if let Err(err) = write_result {
                            eprintln!("Failed to write to local endpoint: {err}");
                            state.close();
                            return DownlinkExit::Closed;
                        }
                    }
                    Err(_) if state.is_closed() => return DownlinkExit::Closed,
                    Err(_) => continue,
                },
                StatusCode::NO_CONTENT => {}
                StatusCode::GONE | StatusCode::NOT_FOUND => {
                    state.close();
                    return DownlinkExit::Closed;
                }
                status if status.is_server_error() => {
                    return DownlinkExit::Fatal(BridgeError::Fatal(format!("bridge GET failed: {status}")));
                }
                status => {
                    return DownlinkExit::Fatal(BridgeError::Fatal(format!("unexpected GET status {status}")));
                }
            },
            Err(err) if err.is_connect() => {
                state.close();
                return DownlinkExit::Closed;
            }
            Err(_) if state.is_closed() => return DownlinkExit::Closed,
            Err(_) => {
                // Read/request timeout: retry while the local side is still open.
                tokio::time::sleep(config::RETRY_BACKOFF).await;
            }
        }
    }
}
