use anyhow::{Context, Result};
use futures::future::poll_fn;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Poll;
use tokio::net::TcpStream;
use tokio::signal::unix::{signal, Signal, SignalKind};

use crate::listener::ListenerSet;
use crate::logger::Logger;

/// Streams for the three termination signals that trigger graceful
/// shutdown. No other signals are intercepted.
pub struct Signals {
    interrupt: Signal,
    terminate: Signal,
    abort: Signal,
}

impl Signals {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            abort: signal(SignalKind::from_raw(libc::SIGABRT))?,
        })
    }

    /// Resolve with the signal's name once any registered signal arrives.
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.abort.recv() => "SIGABRT",
        }
    }
}

/// Accept, log, and refuse connections until a termination signal arrives.
///
/// Returns `Ok(())` on signal-triggered shutdown. Accept and wait failures
/// are treated as fatal: a trap that silently stops trapping is worse than
/// one that exits loudly.
pub async fn run(set: ListenerSet, logger: &Logger, running: &AtomicBool) -> Result<()> {
    let mut signals = Signals::new().context("Unable to register signal handlers")?;
    run_until(set, logger, running, signals.recv()).await
}

/// Loop body of [`run`], with the shutdown condition abstracted so tests can
/// trigger it without delivering a real signal.
pub(crate) async fn run_until<F>(
    set: ListenerSet,
    logger: &Logger,
    running: &AtomicBool,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = &'static str>,
{
    tokio::pin!(shutdown);
    let mut failure = None;

    while running.load(Ordering::SeqCst) {
        tokio::select! {
            name = &mut shutdown => {
                logger.warn(&format!("Caught signal {name}!"));
                running.store(false, Ordering::SeqCst);
            }
            batch = next_batch(&set) => match batch {
                Ok(batch) => {
                    for (port, stream, peer) in batch {
                        logger.connection(peer.ip(), port);
                        // Refuse service: no read, no write.
                        drop(stream);
                    }
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
    }

    set.close(logger);
    match failure {
        Some(e) => Err(e).context("Error accepting connection"),
        None => Ok(()),
    }
}

/// Wait until at least one listener has a pending connection, then accept
/// exactly one connection from every ready listener, in registration order.
///
/// A listener with more than one queued connection is drained across
/// subsequent wakes through level-triggered readiness, not in one pass.
async fn next_batch(set: &ListenerSet) -> io::Result<Vec<(u16, TcpStream, SocketAddr)>> {
    poll_fn(|cx| {
        let mut ready = Vec::new();
        for (port, listener) in set.iter() {
            match listener.poll_accept(cx) {
                Poll::Ready(Ok((stream, peer))) => ready.push((port, stream, peer)),
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => {}
            }
        }
        if ready.is_empty() {
            Poll::Pending
        } else {
            Poll::Ready(Ok(ready))
        }
    })
    .await
}
