// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation data model: records, the store, file documents and
//! derived statistics.

pub mod annotation;
pub mod collection;
pub mod project;
pub mod stats;

pub use annotation::{Annotation, Frame, IndividualId, Region, ShapeKind};
pub use collection::AnnotationList;
