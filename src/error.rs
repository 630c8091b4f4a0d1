// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Error types for the annotation store.

use crate::models::annotation::{Frame, IndividualId};
use std::path::PathBuf;

/// Errors raised by store operations and annotation file I/O.
///
/// Every variant is recoverable: the store is left exactly as it was before
/// the failing call.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("individual {id} already has a region on frame {frame}")]
    DuplicateAnnotation { id: IndividualId, frame: Frame },

    #[error("no region for individual {id} on frame {frame}")]
    NotFound { id: IndividualId, frame: Frame },

    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error("failed to parse {path}: {message}")]
    Serialization { path: PathBuf, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image name {0} appears more than once in the image set")]
    DuplicateImageName(String),

    #[error("frame {0} has annotations but no destination file")]
    UnsavedFrame(Frame),

    #[error("failed to write image {path}: {message}")]
    Image { path: PathBuf, message: String },

    #[error("unsupported annotation file extension: {0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("player error: {0}")]
    Player(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn serialization(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        StoreError::Serialization {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
