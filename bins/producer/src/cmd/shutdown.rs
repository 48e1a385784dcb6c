use std::io;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Waits for SIGINT or SIGTERM. On unix both handlers are installed by
/// `register`, so a signal that arrives before `recv` is polled is still
/// seen. Elsewhere only ctrl-c is supported and it is hooked on first poll.
pub struct ShutdownSignal {
    #[cfg(unix)]
    sigint: Signal,
    #[cfg(unix)]
    sigterm: Signal,
}

impl ShutdownSignal {
    #[cfg(unix)]
    pub fn register() -> io::Result<Self> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn register() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Resolves with the name of the signal received.
    #[cfg(unix)]
    pub async fn recv(mut self) -> io::Result<&'static str> {
        tokio::select! {
            Some(()) = self.sigint.recv() => Ok("SIGINT"),
            Some(()) = self.sigterm.recv() => Ok("SIGTERM"),
            else => Err(io::Error::other("signal streams closed")),
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(self) -> io::Result<&'static str> {
        tokio::signal::ctrl_c().await?;
        Ok("ctrl-c")
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn interrupt_sent_before_recv_is_not_lost() {
        let signal = ShutdownSignal::register().unwrap();
        let status = std::process::Command::new("kill")
            .args(["-INT", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let name = tokio::time::timeout(Duration::from_secs(5), signal.recv()).await.unwrap().unwrap();
        assert_eq!(name, "SIGINT");
    }
}
