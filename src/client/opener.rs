//! Tunnel Opener: issues the POST that establishes a connection id on the
//! bridge (SPEC_FULL.md §4.5).

use reqwest::{Client, StatusCode, Url};

use crate::config;
use crate::error::BridgeError;

/// Builds `<bridge_url>/<id>`, regardless of whether `bridge_url` carries a
/// trailing slash.
pub fn tunnel_url(bridge_url: &Url, id: &str) -> Url {
    let mut url = bridge_url.clone();
    {
        let mut segments = url.path_segments_mut().expect("bridge URL cannot be a base");
        segments.pop_if_empty().push(id);
    }
    url
}

/// Opens a tunnel for `id` towards `remote_host:remote_port`. Per §4.1, a
/// `201` enters *Connected*; anything else is fatal for this invocation.
///
/// A transient transport/connect error (the bridge not yet accepting
/// connections, a reset mid-handshake) is retried up to
/// [`config::OPEN_RETRY_ATTEMPTS`] times with [`config::RETRY_BACKOFF`]
/// between attempts (§4.5, §7). A non-`201` response is not a transport
/// error — it means the bridge answered and rejected the open — so it
/// fails fast without retrying.
pub async fn open_tunnel(
    client: &Client,
    bridge_url: &Url,
    id: &str,
    remote_host: &str,
    remote_port: u16,
) -> Result<(), BridgeError> {
    let url = tunnel_url(bridge_url, id);
    let body = format!("{remote_host}:{remote_port}");

    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = client
            .post(url.clone())
            .header("content-type", "text/plain")
            .body(body.clone())
            .send()
            .await;

        match result {
            Ok(response) => {
                return match response.status() {
                    StatusCode::CREATED => Ok(()),
                    status => {
                        let text = response.text().await.unwrap_or_default();
                        Err(BridgeError::Fatal(format!("bridge responded {status}: {text}")))
                    }
                };
            }
            Err(err) if attempt < config::OPEN_RETRY_ATTEMPTS => {
                eprintln!("Opening POST failed (attempt {attempt}/{}): {err}, retrying", config::OPEN_RETRY_ATTEMPTS);
                tokio::time::sleep(config::RETRY_BACKOFF).await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tunnel_url_appends_id_segment() {
        let base = Url::parse("http://127.0.0.1:8080/br").unwrap();
        let url = tunnel_url(&base, "abc123");
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/br/abc123");
    }

    #[test]
    fn tunnel_url_handles_trailing_slash() {
        let base = Url::parse("http://127.0.0.1:8080/br/").unwrap();
        let url = tunnel_url(&base, "abc123");
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/br/abc123");
    }

    struct RejectHandler;

    impl maker_web::Handler for RejectHandler {
        async fn handle(&self, _: &mut (), _: &maker_web::Request, response: &mut maker_web::Response) -> maker_web::Handled {
            response.status(maker_web::StatusCode::NotAcceptable).body("dial failed")
        }
    }

    async fn spawn_rejecting_bridge() -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = maker_web::Server::builder().listener(listener).handler(RejectHandler).build();
        tokio::spawn(server.launch());
        Url::parse(&format!("http://{addr}/br")).unwrap()
    }

    #[tokio::test]
    async fn non_created_status_fails_fast_without_retrying() {
        let bridge_url = spawn_rejecting_bridge().await;
        let client = Client::new();

        let started = tokio::time::Instant::now();
        let result = open_tunnel(&client, &bridge_url, "conn-1", "10.0.0.1", 9000).await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(BridgeError::Fatal(_))));
        // A 406 is not a transport error: it must not pay the retry backoff.
        assert!(elapsed < config::RETRY_BACKOFF, "non-201 response retried instead of failing fast");
    }

    #[tokio::test]
    async fn connect_failure_retries_then_gives_up() {
        // Nothing listens on this loopback port, so every attempt is a
        // transport/connect error.
        let bridge_url = Url::parse("http://127.0.0.1:1/br").unwrap();
        let client = Client::new();

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            open_tunnel(&client, &bridge_url, "conn-1", "10.0.0.1", 9000),
        )
        .await
        .expect("open_tunnel must give up instead of retrying forever");

        assert!(result.is_err());
    }
}
