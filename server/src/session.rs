// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

//! Shared session plumbing for both gateways: the state machine labels and
//! the task supervisor that bounds, logs and panic-isolates one connection.

use crate::crypt_stream::NetError;
use anyhow::anyhow;
use futures::FutureExt;
use log::{debug, error, warn};
use smol::Timer;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

/// Every gateway exchange is single-shot: there is no way back to
/// `AwaitingRequest`, and every error path leads straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    AwaitingInit,
    AwaitingRequest,
    Processing,
    Responding,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::AwaitingInit => "AwaitingInit",
            SessionState::AwaitingRequest => "AwaitingRequest",
            SessionState::Processing => "Processing",
            SessionState::Responding => "Responding",
            SessionState::Closed => "Closed",
        };
        f.write_str(name)
    }
}

/// Runs one session future to completion on its own task. Never returns an
/// error: whatever happens inside stays inside this connection. The socket
/// owned by the future is dropped (and thereby closed) exactly once, on
/// every path out of here, including panics.
pub(crate) async fn supervise<F>(gateway: &'static str, id: i32, timeout: Duration, fut: F)
where
    F: Future<Output = anyhow::Result<()>>,
{
    debug!("{gateway}: new connection #{id}");
    let bounded = smol::future::or(fut, async {
        Timer::after(timeout).await;
        Err(anyhow!("no complete exchange within {timeout:?}"))
    });
    match AssertUnwindSafe(bounded).catch_unwind().await {
        Ok(Ok(())) => debug!("{gateway}: connection #{id} done"),
        Ok(Err(err)) => match err.downcast_ref::<NetError>() {
            Some(net) if net.is_disconnect() => {
                debug!("{gateway}: connection #{id}: peer went away")
            }
            _ => warn!("{gateway}: connection #{id} error: {err:#}"),
        },
        Err(_) => error!("{gateway}: connection #{id} panicked"),
    }
}
