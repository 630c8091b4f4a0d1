// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Derived statistics over an annotation list.
//!
//! Nothing here owns state; every function is a read-only view.

use super::annotation::{Frame, IndividualId};
use super::collection::AnnotationList;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Summary of one tracked individual.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndividualStats {
    pub id: IndividualId,
    pub frame_count: usize,
    pub first_frame: Frame,
    pub last_frame: Frame,
    /// Species on the individual's most recent frame
    pub species: String,
    pub subspecies: String,
}

/// Totals for a whole annotation list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub annotations: usize,
    pub individuals: usize,
    pub frames: usize,
    pub degraded_frames: usize,
    pub species: BTreeMap<String, usize>,
}

/// Annotation count per species label.
pub fn species_counts(list: &AnnotationList) -> BTreeMap<String, usize> {
    list.census().clone()
}

/// Number of distinct individuals carrying each species label.
pub fn individuals_per_species(list: &AnnotationList) -> BTreeMap<String, usize> {
    let mut seen: BTreeMap<&str, BTreeSet<IndividualId>> = BTreeMap::new();
    for annotation in list.iter() {
        seen.entry(annotation.species.as_str())
            .or_default()
            .insert(annotation.individual_id);
    }
    seen.into_iter()
        .map(|(species, ids)| (species.to_string(), ids.len()))
        .collect()
}

/// Statistics for one individual, or `None` if it has no annotations.
pub fn individual_stats(list: &AnnotationList, id: IndividualId) -> Option<IndividualStats> {
    let annotations = list.annotations_for_individual(id);
    let first = annotations.first()?;
    let last = annotations.last()?;
    Some(IndividualStats {
        id,
        frame_count: annotations.len(),
        first_frame: first.frame.clone(),
        last_frame: last.frame.clone(),
        species: last.species.clone(),
        subspecies: last.subspecies.clone(),
    })
}

/// Totals used for status displays and the command line summary.
pub fn summarize(list: &AnnotationList) -> Summary {
    Summary {
        annotations: list.len(),
        individuals: list.individual_ids().count(),
        frames: list.frames().count(),
        degraded_frames: list.degraded_frames().count(),
        species: species_counts(list),
    }
}
