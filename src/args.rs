//! CLI front-end: translates `std::env::args()` into a typed [`ArgumentsRequest`].
//!
//! This module owns no tunneling semantics. The bridge dispatches on argument
//! arity alone (SPEC_FULL.md §4.9, §6): exactly two positional arguments start
//! a server, exactly four start a client, anything else is a usage error.

use std::{fmt, num::NonZeroU16};

use reqwest::Url;

pub fn get_version_string() -> String {
    format!(
        concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"), " ({} {})"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

pub fn get_usage_string() -> &'static str {
    "Usage:\n  \
     bridge <localPort> <mountPath>                                  (run as server)\n  \
     bridge <localPort|STDIN|-> <bridgeURL> <remoteHost> <remotePort> (run as client)"
}

/// The local endpoint the client relays bytes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEndpointKind {
    /// Accept exactly one connection on this local TCP port.
    Listener(NonZeroU16),
    /// Use the process's standard input/output pair.
    Stdio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub local_port: NonZeroU16,
    pub mount_path: String,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub local: LocalEndpointKind,
    pub bridge_url: Url,
    pub remote_host: String,
    pub remote_port: NonZeroU16,
}

#[derive(Debug)]
pub enum ArgumentsRequest {
    Server(ServerConfig),
    Client(ClientConfig),
    /// Wrong arity or an argument that failed to parse. Per SPEC_FULL.md §6
    /// this is a documented quirk, not an error: the caller prints the usage
    /// block and exits 0, the same as the historical reference.
    Usage,
}

fn parse_local_arg(arg: &str) -> Option<LocalEndpointKind> {
    if arg.eq_ignore_ascii_case("stdin") || arg == "-" {
        return Some(LocalEndpointKind::Stdio);
    }
    arg.parse::<NonZeroU16>().ok().map(LocalEndpointKind::Listener)
}

fn parse_bridge_url(arg: &str) -> Option<Url> {
    Url::parse(arg).ok()
}

/// Parses `std::env::args()` (or any equivalent iterator, for testability)
/// into an [`ArgumentsRequest`]. Never returns an error: malformed arguments
/// fold into [`ArgumentsRequest::Usage`] just like wrong arity does.
pub fn parse_arguments<T>(args: T) -> ArgumentsRequest
where
    T: Iterator<Item = String>,
{
    // Ignore the first argument, as it's by convention the name of the program.
    let rest: Vec<String> = args.skip(1).collect();

    match rest.as_slice() {
        [local_port, mount_path] => match local_port.parse::<NonZeroU16>() {
            Ok(local_port) if !mount_path.is_empty() => ArgumentsRequest::Server(ServerConfig {
                local_port,
                mount_path: mount_path.clone(),
            }),
            _ => ArgumentsRequest::Usage,
        },
        [local, bridge_url, remote_host, remote_port] => {
            let local = parse_local_arg(local);
            let bridge_url = parse_bridge_url(bridge_url);
            let remote_port = remote_port.parse::<NonZeroU16>().ok();

            match (local, bridge_url, remote_port) {
                (Some(local), Some(bridge_url), Some(remote_port)) if !remote_host.is_empty() => {
                    ArgumentsRequest::Client(ClientConfig {
                        local,
                        bridge_url,
                        remote_host: remote_host.clone(),
                        remote_port,
                    })
                }
                _ => ArgumentsRequest::Usage,
            }
        }
        _ => ArgumentsRequest::Usage,
    }
}

impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "server on :{} mount {}", self.local_port, self.mount_path)
    }
}

impl fmt::Display for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.local {
            LocalEndpointKind::Stdio => write!(f, "stdio"),
            LocalEndpointKind::Listener(port) => write!(f, "local :{port}"),
        }?;
        write!(
            f,
            " -> {} -> {}:{}",
            self.bridge_url, self.remote_host, self.remote_port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> impl Iterator<Item = String> {
        std::iter::once("bridge".to_string()).chain(v.iter().map(|s| s.to_string()))
    }

    #[test]
    fn two_args_is_server() {
        let result = parse_arguments(args(&["8080", "/br"]));
        match result {
            ArgumentsRequest::Server(cfg) => {
                assert_eq!(cfg.local_port.get(), 8080);
                assert_eq!(cfg.mount_path, "/br");
            }
            _ => panic!("expected server config"),
        }
    }

    #[test]
    fn four_args_is_client_with_listener() {
        let result = parse_arguments(args(&["8022", "http://127.0.0.1:8080/br", "127.0.0.1", "9000"]));
        match result {
            ArgumentsRequest::Client(cfg) => {
                assert_eq!(cfg.local, LocalEndpointKind::Listener(NonZeroU16::new(8022).unwrap()));
                assert_eq!(cfg.remote_host, "127.0.0.1");
                assert_eq!(cfg.remote_port.get(), 9000);
            }
            _ => panic!("expected client config"),
        }
    }

    #[test]
    fn four_args_is_client_with_stdio() {
        for token in ["STDIN", "-", "stdin"] {
            let result = parse_arguments(args(&[token, "http://127.0.0.1:8080/br", "127.0.0.1", "9000"]));
            match result {
                ArgumentsRequest::Client(cfg) => assert_eq!(cfg.local, LocalEndpointKind::Stdio),
                _ => panic!("expected client config for {token}"),
            }
        }
    }

    #[test]
    fn wrong_arity_is_usage() {
        assert!(matches!(parse_arguments(args(&[])), ArgumentsRequest::Usage));
        assert!(matches!(parse_arguments(args(&["1"])), ArgumentsRequest::Usage));
        assert!(matches!(parse_arguments(args(&["1", "2", "3"])), ArgumentsRequest::Usage));
        assert!(matches!(parse_arguments(args(&["1", "2", "3", "4", "5"])), ArgumentsRequest::Usage));
    }

    #[test]
    fn malformed_numeric_argument_is_usage() {
        let result = parse_arguments(args(&["not-a-port", "/br"]));
        assert!(matches!(result, ArgumentsRequest::Usage));
    }

    #[test]
    fn malformed_client_port_is_usage() {
        let result = parse_arguments(args(&["8022", "http://127.0.0.1:8080/br", "127.0.0.1", "not-a-port"]));
        assert!(matches!(result, ArgumentsRequest::Usage));
    }
}
