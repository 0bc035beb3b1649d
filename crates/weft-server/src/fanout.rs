//! Stream duplication with independent branches.

use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// One output of [`tee`].
///
/// Each branch buffers on its own queue, so a slow reader never holds back
/// the other branch. Dropping a branch detaches it.
#[derive(Debug)]
pub struct Branch<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Stream for Branch<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Drive `source` on a background task and duplicate every item into two
/// branches.
///
/// The source is drained until it ends or both branches are dropped.
pub fn tee<S>(source: S) -> (Branch<S::Item>, Branch<S::Item>)
where
    S: Stream + Send + 'static,
    S::Item: Clone + Send + 'static,
{
    let (left_tx, left_rx) = mpsc::unbounded_channel();
    let (right_tx, right_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut source = std::pin::pin!(source);
        let mut left = Some(left_tx);
        let mut right = Some(right_tx);
        while let Some(item) = source.next().await {
            if let Some(tx) = &left {
                if tx.send(item.clone()).is_err() {
                    tracing::debug!("tee: first branch detached");
                    left = None;
                }
            }
            if let Some(tx) = &right {
                if tx.send(item).is_err() {
                    tracing::debug!("tee: second branch detached");
                    right = None;
                }
            }
            if left.is_none() && right.is_none() {
                break;
            }
        }
    });

    (Branch { rx: left_rx }, Branch { rx: right_rx })
}
