use std::io;

/// SIGINT or SIGTERM stops the dispatch loop after its current step.
///
/// The unix handlers are live from `register` onward. Without unix signals
/// only ctrl-c is watched, and that hook is installed lazily by `recv`.
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    pub fn register() -> io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    #[cfg(unix)]
    pub async fn recv(mut self) -> io::Result<&'static str> {
        tokio::select! {
            Some(()) = self.terminate.recv() => Ok("SIGTERM"),
            Some(()) = self.interrupt.recv() => Ok("SIGINT"),
            else => Err(io::Error::other("signal streams closed")),
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(self) -> io::Result<&'static str> {
        tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
    }
}
