// ── Change-event streams ──
//
// Subscription handle over the adapter's event broadcast channel.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use crate::store::ResourceEvent;

/// A subscription to resource change events.
///
/// Subscribers that fall behind lose the oldest events; the adapter's
/// pending-event table still records them.
pub struct ResourceEventStream {
    inner: BroadcastStream<Arc<ResourceEvent>>,
}

impl ResourceEventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<Arc<ResourceEvent>>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
        }
    }
}

impl Stream for ResourceEventStream {
    type Item = Arc<ResourceEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    warn!(skipped, "event subscriber lagged");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
