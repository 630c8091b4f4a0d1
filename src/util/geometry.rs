// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Geometric utility functions.
//!
//! Clipping of drawn regions to the frame.

use crate::models::annotation::Region;

/// Clip a region to the frame bounds.
///
/// Returns `None` when the region lies entirely outside the frame.
pub fn clamp_region(region: &Region, width: u32, height: u32) -> Option<Region> {
    let (w, h) = (width as f64, height as f64);
    let x1 = region.x().clamp(0.0, w);
    let y1 = region.y().clamp(0.0, h);
    let x2 = region.right().clamp(0.0, w);
    let y2 = region.bottom().clamp(0.0, h);
    if region.x() > w || region.y() > h || region.right() < 0.0 || region.bottom() < 0.0 {
        return None;
    }
    Region::from_corners(x1, y1, x2, y2).ok()
}
