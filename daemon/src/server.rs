//! TCP listener and the sequential accept loop.
//!
//! Connections are served one at a time: the loop does not accept again
//! until the current connection, inference included, has finished. A client
//! that stalls mid-request therefore stalls the whole server unless a read
//! timeout is configured or shutdown is requested.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

use crate::handler::{ConnectionLimits, handle_connection};
use crate::transcribe::{InferenceAdapter, Transcriber};

/// Socket setup step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    Create,
    Bind,
    Listen,
}

/// The listening socket could not be created, bound or put into listen mode.
#[derive(Debug, Error)]
#[error("socket {stage:?} failed for {addr}: {source}")]
pub struct SocketSetupError {
    pub stage: SetupStage,
    pub addr: SocketAddr,
    #[source]
    pub source: io::Error,
}

/// Address for `port` on all IPv4 interfaces.
pub fn all_interfaces(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))
}

/// Create, bind and listen, reusing the address if it is in TIME_WAIT.
pub fn bind_listener(addr: SocketAddr, backlog: u32) -> Result<TcpListener, SocketSetupError> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }
    .map_err(setup_error(addr, SetupStage::Create))?;

    socket
        .set_reuseaddr(true)
        .map_err(setup_error(addr, SetupStage::Create))?;
    socket.bind(addr).map_err(setup_error(addr, SetupStage::Bind))?;
    socket.listen(backlog).map_err(setup_error(addr, SetupStage::Listen))
}

fn setup_error(addr: SocketAddr, stage: SetupStage) -> impl FnOnce(io::Error) -> SocketSetupError {
    move |source| SocketSetupError {
        stage,
        addr,
        source,
    }
}

/// Accept and serve connections until `shutdown` is cancelled.
///
/// Cancellation also reaches a connection that is still reading its request;
/// one that is already transcribing is answered before the loop exits.
/// Accept errors are logged and skipped.
pub async fn serve<T>(
    listener: TcpListener,
    adapter: InferenceAdapter<T>,
    limits: ConnectionLimits,
    shutdown: CancellationToken,
) where
    T: Transcriber + 'static,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested, no longer accepting connections");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let span = info_span!("connection", %peer);
                        handle_connection(stream, &adapter, &limits, &shutdown)
                            .instrument(span)
                            .await;
                    }
                    Err(e) => {
                        warn!(error = %e, "Accept failed, continuing");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "server_test.rs"]
mod tests;
