use std::{env, process::exit};

use args::ArgumentsRequest;
use tokio::task::LocalSet;

mod args;
mod client;
mod config;
mod error;
mod id;
mod server;
mod utils;

fn main() {
    let request = args::parse_arguments(env::args());

    let config = match request {
        ArgumentsRequest::Usage => {
            eprintln!("{}", args::get_usage_string());
            return;
        }
        ArgumentsRequest::Server(config) => {
            println!("{}", args::get_version_string());
            Mode::Server(config)
        }
        ArgumentsRequest::Client(config) => {
            println!("{}", args::get_version_string());
            Mode::Client(config)
        }
    };

    let runtime_result = tokio::runtime::Builder::new_current_thread().enable_all().build();

    let runtime = match runtime_result {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start Tokio runtime: {err}");
            exit(1);
        }
    };

    let exit_code = LocalSet::new().block_on(&runtime, async_main(config));
    exit(exit_code);
}

enum Mode {
    Server(args::ServerConfig),
    Client(args::ClientConfig),
}

async fn async_main(mode: Mode) -> i32 {
    match mode {
        Mode::Server(config) => {
            println!("Listening on port {} at {}", config.local_port, config.mount_path);
            match server::run(config).await {
                Ok(()) => 0,
                Err(err) => {
                    eprintln!("Server finished with error: {err}");
                    1
                }
            }
        }
        Mode::Client(config) => {
            println!("Tunneling {config}");
            client::run(config).await
        }
    }
}
