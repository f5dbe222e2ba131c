//! Connected worker: read loop over an established channel

use std::sync::Weak;

use rfchat_core::{TransportError, WorkerId};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::framing::FrameReader;
use crate::service::ServiceInner;

pub(crate) async fn run(
    service: Weak<ServiceInner>,
    id: WorkerId,
    cancel: CancellationToken,
    mut reader: FrameReader,
) {
    debug!("Connected worker {} reading", id);

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = reader.next_message() => next,
        };

        let Some(service) = service.upgrade() else {
            break;
        };

        match next {
            Ok(Some(text)) => service.on_message_received(id, text).await,
            Ok(None) => {
                service.on_connection_lost(id, TransportError::Closed).await;
                break;
            }
            Err(e) => {
                service.on_connection_lost(id, e).await;
                break;
            }
        }
    }

    debug!("Connected worker {} stopped", id);
}
