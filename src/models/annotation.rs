// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation data structures.
//!
//! This module defines the per-individual, per-frame records held by the
//! annotation store: the frame key, the drawn region and its shape, and the
//! species labels.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of one tracked individual.
pub type IndividualId = u64;

/// Where an annotation applies: a video frame index or an image filename.
///
/// Frame indices sort before filenames, then by value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frame {
    Index(u64),
    Image(String),
}

impl Frame {
    /// The video frame index, if this is a video frame.
    pub fn index(&self) -> Option<u64> {
        match self {
            Frame::Index(i) => Some(*i),
            Frame::Image(_) => None,
        }
    }

    /// The image filename, if this is an image-set frame.
    pub fn image(&self) -> Option<&str> {
        match self {
            Frame::Index(_) => None,
            Frame::Image(name) => Some(name),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Index(i) => write!(f, "{}", i),
            Frame::Image(name) => write!(f, "{}", name),
        }
    }
}

impl From<u64> for Frame {
    fn from(index: u64) -> Self {
        Frame::Index(index)
    }
}

impl From<&str> for Frame {
    fn from(name: &str) -> Self {
        Frame::Image(name.to_string())
    }
}

impl From<String> for Frame {
    fn from(name: String) -> Self {
        Frame::Image(name)
    }
}

/// Kind of primitive drawn for an annotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    #[default]
    Box,
    Line,
    Dot,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeKind::Box => write!(f, "box"),
            ShapeKind::Line => write!(f, "line"),
            ShapeKind::Dot => write!(f, "dot"),
        }
    }
}

/// An axis-aligned rectangle in frame pixel coordinates.
///
/// Width and height are never negative and every component is finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RegionRepr")]
pub struct Region {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

#[derive(Deserialize)]
struct RegionRepr {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl TryFrom<RegionRepr> for Region {
    type Error = StoreError;

    fn try_from(repr: RegionRepr) -> Result<Self, Self::Error> {
        Region::new(repr.x, repr.y, repr.width, repr.height)
    }
}

impl Region {
    /// Create a region, rejecting negative or non-finite dimensions.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Result<Self, StoreError> {
        if ![x, y, width, height].iter().all(|v| v.is_finite()) {
            return Err(StoreError::InvalidRegion(format!(
                "non-finite component in ({}, {}, {}, {})",
                x, y, width, height
            )));
        }
        if width < 0.0 || height < 0.0 {
            return Err(StoreError::InvalidRegion(format!(
                "negative size {}x{}",
                width, height
            )));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Create a region spanning two opposite corners, in any order.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self, StoreError> {
        Self::new(x1.min(x2), y1.min(y2), (x2 - x1).abs(), (y2 - y1).abs())
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// One individual's region and classification on one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "id")]
    pub individual_id: IndividualId,
    pub frame: Frame,
    pub species: String,
    pub subspecies: String,
    pub region: Region,
    #[serde(rename = "shape", default)]
    pub shape_kind: ShapeKind,
}

impl Annotation {
    /// Create a box annotation.
    pub fn new(
        individual_id: IndividualId,
        frame: impl Into<Frame>,
        species: impl Into<String>,
        subspecies: impl Into<String>,
        region: Region,
    ) -> Self {
        Self {
            individual_id,
            frame: frame.into(),
            species: species.into(),
            subspecies: subspecies.into(),
            region,
            shape_kind: ShapeKind::Box,
        }
    }

    /// Replace the shape kind.
    pub fn with_shape(mut self, shape_kind: ShapeKind) -> Self {
        self.shape_kind = shape_kind;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_rejects_negative_size() {
        assert!(Region::new(0.0, 0.0, -1.0, 4.0).is_err());
        assert!(Region::new(0.0, 0.0, 3.0, -0.5).is_err());
        assert!(Region::new(0.0, 0.0, 0.0, 0.0).is_ok());
    }

    #[test]
    fn test_region_rejects_nan() {
        assert!(Region::new(f64::NAN, 0.0, 1.0, 1.0).is_err());
        assert!(Region::new(0.0, 0.0, f64::INFINITY, 1.0).is_err());
    }

    #[test]
    fn test_region_from_corners_any_order() {
        let r = Region::from_corners(10.0, 8.0, 2.0, 4.0).unwrap();
        assert_eq!(r.x(), 2.0);
        assert_eq!(r.y(), 4.0);
        assert_eq!(r.width(), 8.0);
        assert_eq!(r.height(), 4.0);
        assert_eq!((r.right(), r.bottom()), (10.0, 8.0));
    }

    #[test]
    fn test_region_deserialize_validates() {
        let ok: Region = serde_json::from_str(r#"{"x":1,"y":2,"width":3,"height":4}"#).unwrap();
        assert_eq!(ok, Region::new(1.0, 2.0, 3.0, 4.0).unwrap());

        let bad = serde_json::from_str::<Region>(r#"{"x":1,"y":2,"width":-3,"height":4}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_frame_ordering_and_serde() {
        assert!(Frame::Index(10) < Frame::Index(11));
        assert!(Frame::Index(u64::MAX) < Frame::from("a.png"));
        assert!(Frame::from("ceres1.png") < Frame::from("ceres2.jpg"));

        assert_eq!(serde_json::to_string(&Frame::Index(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&Frame::from("x.png")).unwrap(), "\"x.png\"");
        let f: Frame = serde_json::from_str("\"007\"").unwrap();
        assert_eq!(f, Frame::from("007"));
    }

    #[test]
    fn test_annotation_serializes_short_field_names() {
        let a = Annotation::new(3, 12u64, "cod", "atlantic", Region::new(1.0, 2.0, 3.0, 4.0).unwrap())
            .with_shape(ShapeKind::Dot);
        let value = serde_json::to_value(&a).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["frame"], 12);
        assert_eq!(value["shape"], "dot");
        assert_eq!(value["region"]["width"], 3.0);
    }
}
