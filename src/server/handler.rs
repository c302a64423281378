use std::io;

use maker_web::{Handled, Handler, Method, Request, Response, StatusCode};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::config;
use crate::server::table::{ConnectionTable, OpenOutcome};
use crate::utils::enable_keepalive;

pub struct BridgeHandler {
    mount_segments: Vec<String>,
    table: ConnectionTable,
}

impl BridgeHandler {
    pub fn new(mount_path: &str) -> Self {
        let mount_segments = mount_path.split('/').filter(|s| !s.is_empty()).map(str::to_owned).collect();
        Self {
            mount_segments,
            table: ConnectionTable::default(),
        }
    }

    pub async fn close_all(&self) {
        self.table.close_all().await;
    }

    /// Matches the request path against the configured mount prefix and
    /// returns the trailing connection id segment, if any.
    fn connection_id<'a>(&self, request: &'a Request) -> Option<&'a str> {
        let segments = request.url().path_segments();
        if segments.len() != self.mount_segments.len() + 1 {
            return None;
        }
        for (expected, actual) in self.mount_segments.iter().zip(segments) {
            if expected.as_bytes() != *actual {
                return None;
            }
        }
        std::str::from_utf8(segments[self.mount_segments.len()]).ok()
    }
}

impl Handler for BridgeHandler {
    async fn handle(&self, _: &mut (), request: &Request, response: &mut Response) -> Handled {
        let Some(id) = self.connection_id(request) else {
            return response.status(StatusCode::NotFound).body("unknown route");
        };

        match request.method() {
            Method::Post => self.handle_open(id, request, response).await,
            Method::Put => self.handle_write(id, request, response).await,
            Method::Get => self.handle_read(id, response).await,
            Method::Delete => self.handle_close(id, response).await,
            _ => response.status(StatusCode::NotFound).body("unsupported method"),
        }
    }
}

impl BridgeHandler {
    async fn handle_open(&self, id: &str, request: &Request, response: &mut Response) -> Handled {
        let body = request.body().unwrap_or(&[]);
        let target = match std::str::from_utf8(body) {
            Ok(target) => target,
            Err(_) => return response.status(StatusCode::NotAcceptable).body("body is not valid utf-8"),
        };
        let Some((host, port)) = target.rsplit_once(':') else {
            return response.status(StatusCode::NotAcceptable).body("body must be host:port");
        };
        let Ok(port) = port.parse::<u16>() else {
            return response.status(StatusCode::NotAcceptable).body(format!("invalid port: {port}"));
        };

        let stream = match TcpStream::connect((host, port)).await {
            Ok(stream) => stream,
            Err(err) => {
                let message = format!("dial {target} failed: {err}");
                eprintln!("[{id}] {message}");
                return response.status(StatusCode::NotAcceptable).body(message);
            }
        };

        if let Err(err) = enable_keepalive(&stream) {
            let message = format!("keepalive setup failed: {err}");
            eprintln!("[{id}] {message}");
            return response.status(StatusCode::NotAcceptable).body(message);
        }

        match self.table.open(id, stream).await {
            OpenOutcome::Opened(_) => {
                println!("[{id}] opened towards {target}");
                response.status(StatusCode::Created).body("opened")
            }
            OpenOutcome::Conflict => {
                eprintln!("[{id}] rejected: id already used");
                response.status(StatusCode::Conflict).body("id already used")
            }
        }
    }

    async fn handle_write(&self, id: &str, request: &Request, response: &mut Response) -> Handled {
        let Some(tunnel) = self.table.get(id).await else {
            return response.status(StatusCode::NotFound).body("unknown connection id");
        };

        let body = request.body().unwrap_or(&[]);
        let mut write_half = tunnel.write.lock().await;
        match write_half.write_all(body).await {
            Ok(()) => response.status(StatusCode::Ok).body(""),
            Err(err) => {
                drop(write_half);
                self.table.remove(id).await;
                eprintln!("[{id}] destination write failed, closing: {err}");
                response.status(StatusCode::Gone).body("destination write failed")
            }
        }
    }

    async fn handle_read(&self, id: &str, response: &mut Response) -> Handled {
        let Some(tunnel) = self.table.get(id).await else {
            return response.status(StatusCode::NotFound).body("unknown connection id");
        };

        let mut read_half = tunnel.read.lock().await;
        let mut buf = vec![0u8; config::MAX_CHUNK];

        match try_read(&mut *read_half, &mut buf) {
            Some(Ok(0)) => {
                drop(read_half);
                self.table.remove(id).await;
                return response.status(StatusCode::Gone).body("destination closed");
            }
            Some(Ok(n)) => {
                return response
                    .status(StatusCode::Ok)
                    .header("content-type", "application/octet-stream")
                    .body(&buf[..n])
            }
            Some(Err(_)) => {
                drop(read_half);
                self.table.remove(id).await;
                return response.status(StatusCode::Gone).body("destination read failed");
            }
            None => {}
        }

        let became_readable = tokio::time::timeout(config::server_poll_wait(), read_half.readable()).await;

        if became_readable.is_err() {
            return response.status(StatusCode::NoContent).body("");
        }

        match try_read(&mut *read_half, &mut buf) {
            Some(Ok(0)) => {
                drop(read_half);
                self.table.remove(id).await;
                response.status(StatusCode::Gone).body("destination closed")
            }
            Some(Ok(n)) => response
                .status(StatusCode::Ok)
                .header("content-type", "application/octet-stream")
                .body(&buf[..n]),
            Some(Err(_)) => {
                drop(read_half);
                self.table.remove(id).await;
                response.status(StatusCode::Gone).body("destination read failed")
            }
            None => response.status(StatusCode::NoContent).body(""),
        }
    }

    async fn handle_close(&self, id: &str, response: &mut Response) -> Handled {
        self.table.remove(id).await;
        response.status(StatusCode::Ok).body("")
    }
}

/// One non-blocking read attempt. `None` means "would block", matching the
/// long-poll handler's retry-once-then-204 shape (SPEC_FULL.md §4.1).
fn try_read(read_half: &mut tokio::net::tcp::OwnedReadHalf, buf: &mut [u8]) -> Option<io::Result<usize>> {
    match read_half.try_read(buf) {
        Ok(n) => Some(Ok(n)),
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => None,
        Err(err) => Some(Err(err)),
    }
}
