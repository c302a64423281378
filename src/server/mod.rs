mod handler;
mod table;

use std::sync::Arc;
use std::time::Duration;

use maker_web::limits::{ConnLimits, ReqLimits, RespLimits, ServerLimits};
use maker_web::{Handler, Server};
use tokio::net::TcpListener;

use crate::args::ServerConfig;
use crate::config;
use crate::error::BridgeError;

use handler::BridgeHandler;

/// Runs the bridge server until SIGINT, then drains the Connection Table.
pub async fn run(config: ServerConfig) -> Result<(), BridgeError> {
    let listener = TcpListener::bind(("0.0.0.0", config.local_port.get())).await?;

    let handler = Arc::new(BridgeHandler::new(&config.mount_path));

    let server = Server::builder()
        .listener(listener)
        .handler(SharedHandler(handler.clone()))
        .server_limits(ServerLimits {
            max_connections: 500,
            ..ServerLimits::default()
        })
        .connection_limits(ConnLimits {
            connection_lifetime: Duration::from_secs(config::SERVER_REQUEST_TIMEOUT_SECONDS),
            max_requests_per_connection: usize::MAX,
            ..ConnLimits::default()
        })
        .request_limits(ReqLimits {
            url_size: 512,
            body_size: config::MAX_CHUNK,
            ..ReqLimits::default()
        })
        .response_limits(RespLimits {
            default_capacity: 4096,
            max_capacity: config::MAX_CHUNK + 4096,
            ..RespLimits::default()
        })
        .build();

    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
        .map_err(|err| BridgeError::Fatal(format!("failed to install SIGINT handler: {err}")))?;

    tokio::select! {
        _ = server.launch() => {}
        _ = sigint.recv() => {
            println!("SIGINT received, closing all tunnels");
        }
    }

    handler.close_all().await;
    Ok(())
}

/// maker_web's [`Handler`](maker_web::Handler) requires `Sync + Send +
/// 'static`, which `Arc<BridgeHandler>` already satisfies; this newtype just
/// forwards `handle` so the server owns a cheap clone instead of the handler
/// itself.
struct SharedHandler(Arc<BridgeHandler>);

impl maker_web::Handler for SharedHandler {
    async fn handle(
        &self,
        data: &mut (),
        request: &maker_web::Request,
        response: &mut maker_web::Response,
    ) -> maker_web::Handled {
        self.0.handle(data, request, response).await
    }
}
