//! TCP server for the line protocol.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use super::protocol::{parse_request, Request, Response};
use super::service::{Gate, Verdict};
use crate::config::ServerConfig;
use crate::error::Result;
use crate::ratelimit::{Clock, SystemClock};

/// Line protocol server answering admission checks from a [`Gate`].
pub struct LineServer<C = SystemClock> {
    /// Bound listener
    listener: TcpListener,
    /// The gate deciding every request
    gate: Arc<Gate<C>>,
    /// How often to sweep idle keys, if at all
    sweep_interval: Option<Duration>,
}

impl<C: Clock + 'static> LineServer<C> {
    /// Bind the listener described by `config`.
    pub async fn bind(config: &ServerConfig, gate: Arc<Gate<C>>) -> Result<Self> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        Ok(Self {
            listener,
            gate,
            sweep_interval: config.sweep_interval(),
        })
    }

    /// Address the server is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve connections until `signal` resolves.
    ///
    /// Connections already accepted keep running on their own tasks; only
    /// the accept loop and the sweeper stop.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        info!(
            addr = %self.local_addr()?,
            sweep_interval = ?self.sweep_interval,
            "Starting line protocol server with graceful shutdown"
        );

        let sweeper = self
            .sweep_interval
            .map(|every| tokio::spawn(sweep_periodically(self.gate.clone(), every)));

        tokio::pin!(signal);
        loop {
            tokio::select! {
                _ = &mut signal => {
                    info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "Accepted connection");
                        let gate = self.gate.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, gate.as_ref()).await {
                                warn!(peer = %peer, error = %e, "Connection closed with error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                },
            }
        }

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }
        Ok(())
    }
}

/// Answer request lines on `stream` until the peer closes it.
async fn handle_connection<S, C>(stream: S, gate: &Gate<C>) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: Clock,
{
    let mut stream = BufReader::new(stream);
    let mut line = String::new();

    loop {
        line.clear();
        if stream.read_line(&mut line).await? == 0 {
            break;
        }

        let mut reply = respond(gate, &line).to_string();
        reply.push('\n');
        stream.write_all(reply.as_bytes()).await?;
    }

    stream.flush().await
}

fn respond<C: Clock>(gate: &Gate<C>, line: &str) -> Response {
    match parse_request(line) {
        Ok(Request::Ping) => Response::Pong,
        Ok(Request::Check { resource, key }) => match gate.check(resource, key) {
            Verdict::Allowed => Response::Ok,
            Verdict::Limited { retry_after } => Response::Limited(retry_after),
        },
        Err(e) => {
            debug!(error = %e, "Rejected malformed request");
            Response::Error(e.to_string())
        }
    }
}

async fn sweep_periodically<C: Clock>(gate: Arc<Gate<C>>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let removed = gate.sweep();
        debug!(
            removed = removed,
            remaining = gate.key_count(),
            "Swept idle keys"
        );
    }
}
