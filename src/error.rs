// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! Error kinds surfaced by the tree's public API.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("corrupt node: {0}")]
    CorruptNode(String),

    #[error("unsupported serialization format version: {0}")]
    VersionUnsupported(u32),

    #[error("integrity check failed: {0}")]
    IntegrityFailure(String),

    #[error("duplicate key hash encountered building extension chain: {0:?}")]
    DuplicateKey(Vec<u8>),

    #[error("operation cancelled")]
    Cancelled,

    #[error("storage failure: {0}")]
    StorageFailure(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub(crate) fn corrupt_node(msg: impl Into<String>) -> Self {
        let backtrace = format!("{:#?}", backtrace::Backtrace::new());
        tracing::debug!("backtrace: {}", backtrace);
        Error::CorruptNode(msg.into())
    }

    pub(crate) fn integrity_failure(msg: impl Into<String>) -> Self {
        Error::IntegrityFailure(msg.into())
    }
}
