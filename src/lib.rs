// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Fish annotator
//!
//! Annotation store for manually tracking fish (or other objects) across
//! video frames and image sets: one region per individual per frame,
//! species labels, degraded-frame markers, and a lossless file round trip.

pub mod config;
pub mod error;
pub mod io;
pub mod models;
pub mod session;
pub mod util;

pub use error::{Result, StoreError};
pub use models::{Annotation, AnnotationList, Frame, IndividualId, Region, ShapeKind};
