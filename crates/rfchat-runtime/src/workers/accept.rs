//! Accept worker: waits on a bound listener for one inbound peer

use std::sync::Weak;

use rfchat_core::{ConnectionType, WorkerId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::service::ServiceInner;
use crate::workers::OwnedListener;

pub(crate) async fn run(
    service: Weak<ServiceInner>,
    id: WorkerId,
    cancel: CancellationToken,
    mut listener: OwnedListener,
) {
    debug!("Accept worker {} waiting for inbound peer", id);

    let accepted = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Accept worker {} cancelled", id);
            return;
        }
        result = listener.socket.accept() => result,
    };

    // Stop listening before the handoff; only one peer is ever taken
    drop(listener);

    match accepted {
        Ok((channel, peer)) => {
            let Some(service) = service.upgrade() else {
                return;
            };
            info!("Inbound connection from {}", peer);
            if !service
                .on_socket_established(id, channel, peer, ConnectionType::Incoming)
                .await
            {
                debug!("Accept worker {} was superseded, channel discarded", id);
            }
        }
        Err(e) if cancel.is_cancelled() => {
            debug!("Accept worker {} stopped by cancellation: {}", id, e);
        }
        Err(e) => {
            // State stays as is; the initiator decides whether to listen again
            warn!("Accept failed on worker {}: {}", id, e);
            if let Some(service) = service.upgrade() {
                service.on_accept_stopped(id).await;
            }
        }
    }
}
