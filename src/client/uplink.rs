//! Uplink Pump: reads the local endpoint and PUTs bytes to the bridge, then
//! the Closer's DELETE on the way out (SPEC_FULL.md §4.7, §4.8).

use std::rc::Rc;

use reqwest::{Client, StatusCode, Url};
use tokio::io::AsyncReadExt;

use crate::client::local::LocalReader;
use crate::client::opener::tunnel_url;
use crate::client::LocalState;
use crate::config::{self, MAX_CHUNK};
use crate::error::BridgeError;

pub enum UplinkExit {
    Closed,
    Fatal(BridgeError),
}

pub async fn run_uplink(client: &Client, bridge_url: &Url, id: &str, state: &Rc<LocalState>, mut input: LocalReader) -> UplinkExit {
    let mut buf = vec![0u8; MAX_CHUNK];
    let mut filled = 0usize;

    let exit = 'outer: loop {
        if filled == 0 {
            let read_result = tokio::select! {
                result = input.read(&mut buf) => Some(result),
                () = state.wait_closed() => None,
            };

            match read_result {
                None => break 'outer None,
                Some(Ok(0)) => break 'outer None,
                Some(Ok(n)) => filled = n,
                Some(Err(err)) => {
                    eprintln!("Local read failed: {err}");
                    break 'outer None;
                }
            }
        }

        loop {
            let url = tunnel_url(bridge_url, id);
            let chunk = buf[..filled].to_vec();

            match client.put(url).header("content-type", "application/octet-stream").body(chunk).send().await {
                Ok(response) if response.status() == StatusCode::OK => {
                    filled = 0;
                    break;
                }
                Ok(response) if response.status() == StatusCode::GONE => {
                    state.close();
                    break 'outer None;
                }
                Ok(response) if response.status() == StatusCode::NOT_FOUND => {
                    // The table entry is already gone — most likely the
                    // downlink just saw the remote close and removed it
                    // (handler.rs's GET-side 410 path) before this buffered
                    // PUT landed. That's an orderly teardown, not a failure.
                    state.close();
                    break 'outer None;
                }
                Ok(response) if response.status().is_server_error() => {
                    break 'outer Some(BridgeError::Fatal(format!("bridge PUT failed: {}", response.status())));
                }
                Ok(response) => {
                    break 'outer Some(BridgeError::Fatal(format!("unexpected PUT status {}", response.status())));
                }
                Err(_) if state.is_closed() => break 'outer None,
                Err(_) => {
                    // Retryable transport error: keep the buffer, re-dial, try again.
                    tokio::time::sleep(config::RETRY_BACKOFF).await;
                }
            }
        }
    };

    let url = tunnel_url(bridge_url, id);
    if let Err(err) = client.delete(url).send().await {
        eprintln!("Failed to send close request to bridge: {err}");
    }
    state.close();

    match exit {
        None => UplinkExit::Closed,
        Some(err) => UplinkExit::Fatal(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    /// A bridge stand-in that answers every request 404, as the real bridge
    /// does for a PUT against an id it no longer has (e.g. the downlink
    /// already tore the tunnel down via a 410 GET).
    struct NotFoundHandler;

    impl maker_web::Handler for NotFoundHandler {
        async fn handle(&self, _: &mut (), _: &maker_web::Request, response: &mut maker_web::Response) -> maker_web::Handled {
            response.status(maker_web::StatusCode::NotFound).body("unknown connection id")
        }
    }

    async fn spawn_not_found_bridge() -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = maker_web::Server::builder().listener(listener).handler(NotFoundHandler).build();
        tokio::spawn(server.launch());
        Url::parse(&format!("http://{addr}/br")).unwrap()
    }

    #[tokio::test]
    async fn put_404_is_closed_not_fatal() {
        let bridge_url = spawn_not_found_bridge().await;
        let client = Client::new();
        let state = Rc::new(crate::client::LocalState::new());

        // `tokio::io::duplex` gives us an in-memory local endpoint: write
        // one chunk so the pump has bytes to PUT, and keep the write half
        // alive so the pump's only way out is the 404 branch, not local EOF.
        let (mut local_write, local_read) = tokio::io::duplex(64);
        local_write.write_all(b"already torn down").await.unwrap();

        let exit = run_uplink(&client, &bridge_url, "conn-race", &state, Box::new(local_read)).await;
        assert!(matches!(exit, UplinkExit::Closed), "404 on PUT must be a clean close, not Fatal");
        assert!(state.is_closed());
    }
}
