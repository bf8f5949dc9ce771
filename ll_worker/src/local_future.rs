//! D1 and queue futures are `!Send`, but axum handlers must be `Send`. Handler bodies marked
//! [`ll_macro::local_async`] run on the isolate's local executor and are awaited through a
//! [`HandlerFuture`], which only holds the receiving end of a channel.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::FutureExt;

use crate::error::ApiError;

/// [`Send`] handle to a handler body running locally.
pub struct HandlerFuture<T> {
    recv: oneshot::Receiver<Result<T, ApiError>>,
    route: &'static str,
}

impl<T: 'static> HandlerFuture<T> {
    /// Spawns the body of the `route` handler on the local executor.
    pub fn spawn(
        route: &'static str,
        body: impl Future<Output = Result<T, ApiError>> + 'static,
    ) -> Self {
        let (send, recv) = oneshot::channel();
        wasm_bindgen_futures::spawn_local(async move {
            let out = body.await;
            if send.send(out).is_err() {
                log::warn!("`{}` client went away before the response was ready.", route);
            }
        });
        Self { recv, route }
    }
}

impl<T> Future for HandlerFuture<T> {
    type Output = Result<T, ApiError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let route = self.route;
        self.recv.poll_unpin(cx).map(|out| {
            // Sender dropped without sending: the body panicked or the isolate dropped the task.
            out.unwrap_or_else(|_| {
                Err(ApiError::Internal(format!(
                    "`{}` handler stopped before responding.",
                    route
                )))
            })
        })
    }
}

#[cfg(test)]
mod test {
    use futures::executor::block_on;
    use http::StatusCode;

    use super::*;

    #[test]
    fn test_dropped_handler_is_internal_error() {
        let (send, recv) = oneshot::channel::<Result<u32, ApiError>>();
        drop(send);
        let err = block_on(HandlerFuture {
            recv,
            route: "POST /api/cleanup",
        })
        .unwrap_err();
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, err.status());
        assert!(err.message().contains("POST /api/cleanup"), "{}", err.message());
    }

    #[test]
    fn test_handler_result_passes_through() {
        let (send, recv) = oneshot::channel();
        send.send(Err(ApiError::Forbidden("no".into()))).unwrap();
        let err = block_on(HandlerFuture::<u32> {
            recv,
            route: "GET /api/wallet",
        })
        .unwrap_err();
        assert_eq!(StatusCode::FORBIDDEN, err.status());
    }
}
