use std::io;

use socket2::SockRef;
use tokio::net::TcpStream;

/// Enables TCP keepalive on a connected socket so that a half-open peer is
/// eventually detected within OS defaults, without consuming the stream.
pub fn enable_keepalive(stream: &TcpStream) -> io::Result<()> {
    SockRef::from(stream).set_keepalive(true)
}
