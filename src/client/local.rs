//! Local Endpoint acquisition: either a single accepted TCP connection, or
//! the process's standard input/output pair (SPEC_FULL.md §3).

use std::io;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;

use crate::args::LocalEndpointKind;
use crate::utils::enable_keepalive;

pub type LocalReader = Box<dyn AsyncRead + Unpin>;
pub type LocalWriter = Box<dyn AsyncWrite + Unpin>;

/// Binds (for [`LocalEndpointKind::Listener`]) and waits for the local side
/// to become available, returning independent read/write halves.
pub async fn acquire(local: &LocalEndpointKind) -> io::Result<(LocalReader, LocalWriter)> {
    match local {
        LocalEndpointKind::Stdio => Ok((Box::new(tokio::io::stdin()), Box::new(tokio::io::stdout()))),
        LocalEndpointKind::Listener(port) => {
            let listener = TcpListener::bind(("0.0.0.0", port.get())).await?;
            println!("Waiting for a local connection on port {port}...");
            let (stream, from) = listener.accept().await?;
            println!("Accepted local connection from {from}");
            enable_keepalive(&stream)?;
            let (read, write) = stream.into_split();
            Ok((Box::new(read), Box::new(write)))
        }
    }
}
