//! Connect worker: one outbound connection attempt

use std::sync::{Arc, Weak};

use rfchat_core::{ConnectionType, RemoteDevice, ServiceRecord, SocketProvider, WorkerId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::service::ServiceInner;

pub(crate) async fn run(
    service: Weak<ServiceInner>,
    provider: Arc<dyn SocketProvider>,
    id: WorkerId,
    cancel: CancellationToken,
    peer: RemoteDevice,
    record: ServiceRecord,
) {
    debug!("Connect worker {} dialing {}", id, peer);

    // A cancelled attempt reports nothing; dropping the future closes the
    // half-open socket
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Connect worker {} cancelled", id);
            return;
        }
        result = provider.connect(&peer, &record) => result,
    };

    let Some(service) = service.upgrade() else {
        return;
    };

    match result {
        Ok((channel, remote)) => {
            info!("Outbound connection to {} established", remote);
            if !service
                .on_socket_established(id, channel, remote, ConnectionType::Outgoing)
                .await
            {
                debug!("Connect worker {} was superseded, channel discarded", id);
            }
        }
        Err(e) => service.on_connection_failed(id, e).await,
    }
}
