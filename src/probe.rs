//! Dev-server discovery
//!
//! The front-end dev server may be listening on either of two ports
//! depending on how it was started, so candidates are probed in order and
//! the first one that answers wins.

use std::time::Duration;
use tracing::{info, warn};

use crate::error::{SmokeError, SmokeResult};

/// Default candidate URLs for the dev server.
pub fn default_candidates() -> Vec<String> {
    vec![
        "http://localhost:8081".to_string(),
        "http://localhost:19006".to_string(),
    ]
}

/// Probe candidates in order, returning the first URL that answers.
/// Any HTTP status counts as reachable; only transport failures move on
/// to the next candidate.
pub async fn probe_candidates(candidates: &[String], timeout: Duration) -> SmokeResult<String> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;

    for url in candidates {
        info!("Probing {}...", url);
        match client.get(url).send().await {
            Ok(resp) => {
                info!("Dev server answered at {} ({})", url, resp.status());
                return Ok(url.clone());
            }
            Err(e) if e.is_connect() => {
                warn!("Nothing listening at {}", url);
            }
            Err(e) => {
                warn!("Probe of {} failed: {}", url, e);
            }
        }
    }

    Err(SmokeError::ServerUnreachable(candidates.join(", ")))
}

/// Single-URL readiness check used while a spawned server boots.
pub async fn is_reachable(client: &reqwest::Client, url: &str) -> bool {
    matches!(client.get(url).send().await, Ok(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Minimal HTTP server answering one request with 200 OK.
    fn serve_once() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                );
            }
        });
        format!("http://127.0.0.1:{}", addr.port())
    }

    #[tokio::test]
    async fn test_probe_finds_live_server() {
        let live = serve_once();
        // A port nothing listens on: bind then drop
        let dead = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port())
        };

        let candidates = vec![dead, live.clone()];
        let url = probe_candidates(&candidates, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(url, live);
    }

    #[tokio::test]
    async fn test_probe_all_unreachable() {
        let dead = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port())
        };

        let err = probe_candidates(&[dead], Duration::from_secs(2)).await;
        assert!(matches!(err, Err(SmokeError::ServerUnreachable(_))));
    }

    #[test]
    fn test_default_candidates_order() {
        let candidates = default_candidates();
        assert_eq!(candidates[0], "http://localhost:8081");
        assert_eq!(candidates[1], "http://localhost:19006");
    }
}
