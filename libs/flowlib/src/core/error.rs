// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Port not ready: {0}")]
    PortNotReady(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection already exists: {0}")]
    ConnectionAlreadyExists(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Invalid element: {0}")]
    InvalidElement(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FlowError>;
