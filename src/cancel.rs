// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! Cooperative cancellation (component of the §5 concurrency contract).
//! Checked at storage-interaction boundaries only; the core never spawns
//! threads or polls on its own.

/// A cooperative cancellation signal. Implementations are consulted at each
/// storage read/write boundary inside the write, read and proof engines.
pub trait CancellationToken: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

/// The default token: never cancels. Used when a caller has no cancellation
/// source of its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancelled;

impl CancellationToken for NeverCancelled {
    fn is_cancelled(&self) -> bool {
        false
    }
}

pub(crate) fn check(token: &dyn CancellationToken) -> crate::error::Result<()> {
    if token.is_cancelled() {
        Err(crate::error::Error::Cancelled)
    } else {
        Ok(())
    }
}
