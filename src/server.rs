//! Optional dev-server lifecycle
//!
//! Normally the dev server is already running and only probed. With
//! `--spawn-server` the runner starts it itself (e.g. `npx expo start
//! --web`) and tears it down when the run ends.

use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{SmokeError, SmokeResult};
use crate::probe;

/// Handle to a spawned dev-server process
pub struct DevServer {
    child: Child,
    pub base_url: String,
}

impl DevServer {
    /// Spawn the server command and wait for it to answer HTTP requests.
    pub async fn spawn(config: DevServerConfig) -> SmokeResult<Self> {
        info!("Spawning dev server: {}", config.command);

        let child = Command::new("sh")
            .arg("-c")
            .arg(&config.command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SmokeError::ServerStartup(format!("failed to spawn '{}': {}", config.command, e))
            })?;

        let server = DevServer {
            child,
            base_url: config.url.clone(),
        };

        server.wait_until_ready(&config.url, config.startup_timeout).await?;

        info!("Dev server is up at {}", config.url);
        Ok(server)
    }

    async fn wait_until_ready(&self, url: &str, timeout: Duration) -> SmokeResult<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout {
            attempts += 1;
            if probe::is_reachable(&client, url).await {
                return Ok(());
            }
            if attempts == 1 {
                info!("Waiting for dev server to start...");
            }
            sleep(Duration::from_millis(100)).await;
        }

        Err(SmokeError::ServerNotReady(attempts))
    }

    /// Stop the server, SIGTERM first then kill.
    pub fn stop(&mut self) -> SmokeResult<()> {
        info!("Stopping dev server (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            } else {
                warn!("SIGTERM failed, killing outright");
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();

        Ok(())
    }
}

impl Drop for DevServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for spawning a dev server
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Shell command that starts the server
    pub command: String,

    /// URL the server will listen on once up
    pub url: String,

    /// How long to wait for the first successful probe
    pub startup_timeout: Duration,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            command: "npx expo start --web --non-interactive".to_string(),
            url: "http://localhost:19006".to_string(),
            startup_timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_failure_maps_to_startup_error() {
        // sh spawns fine but the command exits at once; the readiness
        // probe has to give up.
        let config = DevServerConfig {
            command: "true".to_string(),
            url: "http://127.0.0.1:1".to_string(),
            startup_timeout: Duration::from_millis(300),
        };
        let err = DevServer::spawn(config).await;
        assert!(matches!(err, Err(SmokeError::ServerNotReady(_))));
    }
}
