// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation file documents.
//!
//! A video is saved as one document holding every annotation. An image set
//! is saved as one sidecar document per image.

use super::annotation::{Annotation, Frame};
use super::collection::AnnotationList;
use serde::{Deserialize, Serialize};

/// Complete annotation data for one video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoAnnotationFile {
    pub media_file: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_frames: Vec<Frame>,
    pub annotations: Vec<Annotation>,
}

impl VideoAnnotationFile {
    /// Snapshot a list for saving.
    pub fn from_list(media_file: impl Into<String>, list: &AnnotationList) -> Self {
        Self {
            media_file: media_file.into(),
            degraded_frames: list.degraded_frames().cloned().collect(),
            annotations: list.iter().cloned().collect(),
        }
    }
}

/// Annotations belonging to one image of an image set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAnnotationFile {
    pub image_file: String,
    #[serde(default)]
    pub degraded: bool,
    pub annotations: Vec<Annotation>,
}

impl ImageAnnotationFile {
    /// Snapshot the annotations of one image (keyed by its filename).
    pub fn from_list(image_file: impl Into<String>, list: &AnnotationList) -> Self {
        let image_file = image_file.into();
        let frame = Frame::Image(image_file.clone());
        Self {
            degraded: list.is_degraded(&frame),
            annotations: list
                .regions_for_frame(&frame)
                .into_iter()
                .cloned()
                .collect(),
            image_file,
        }
    }
}
