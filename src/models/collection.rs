// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! The annotation store.
//!
//! Records live once in a slot arena. Two ordered indices map
//! individual -> frame -> slot and frame -> individual -> slot, and a species
//! census is kept alongside. Every mutation validates first and then updates
//! the arena, both indices and the census together.

use super::annotation::{Annotation, Frame, IndividualId, Region};
use crate::error::{Result, StoreError};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

type Slot = usize;

/// All annotations for one video or one image set.
#[derive(Debug, Clone, Default)]
pub struct AnnotationList {
    /// Owned records; `None` marks a free slot
    slots: Vec<Option<Annotation>>,
    /// Free slots available for reuse
    free: Vec<Slot>,
    by_individual: BTreeMap<IndividualId, BTreeMap<Frame, Slot>>,
    by_frame: BTreeMap<Frame, BTreeMap<IndividualId, Slot>>,
    /// Annotation count per species label
    census: BTreeMap<String, usize>,
    degraded: BTreeSet<Frame>,
    /// Highest id ever handed out by `next_individual_id` or inserted
    max_issued_id: Option<IndividualId>,
}

impl AnnotationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of annotations held.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add an annotation.
    ///
    /// Fails with [`StoreError::DuplicateAnnotation`] if the individual
    /// already has a region on that frame.
    pub fn insert(&mut self, annotation: Annotation) -> Result<()> {
        let id = annotation.individual_id;
        if self.slot_of(id, &annotation.frame).is_some() {
            return Err(StoreError::DuplicateAnnotation {
                id,
                frame: annotation.frame,
            });
        }

        let frame = annotation.frame.clone();
        self.census_add(&annotation.species);
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(annotation);
                slot
            }
            None => {
                self.slots.push(Some(annotation));
                self.slots.len() - 1
            }
        };
        self.by_individual
            .entry(id)
            .or_default()
            .insert(frame.clone(), slot);
        self.by_frame.entry(frame.clone()).or_default().insert(id, slot);
        self.max_issued_id = self.max_issued_id.max(Some(id));

        log::debug!("Inserted individual {} on frame {}", id, frame);
        Ok(())
    }

    /// Remove and return the annotation for an individual on a frame.
    ///
    /// An individual left without annotations drops out of
    /// [`individual_ids`](Self::individual_ids); its id is not reissued.
    pub fn remove(&mut self, id: IndividualId, frame: &Frame) -> Result<Annotation> {
        let slot = self.slot_of(id, frame).ok_or_else(|| StoreError::NotFound {
            id,
            frame: frame.clone(),
        })?;

        if let Some(frames) = self.by_individual.get_mut(&id) {
            frames.remove(frame);
            if frames.is_empty() {
                self.by_individual.remove(&id);
            }
        }
        if let Some(ids) = self.by_frame.get_mut(frame) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_frame.remove(frame);
            }
        }
        let annotation = self.slots[slot]
            .take()
            .ok_or_else(|| StoreError::NotFound {
                id,
                frame: frame.clone(),
            })?;
        self.free.push(slot);
        self.census_remove(&annotation.species);

        log::debug!("Removed individual {} from frame {}", id, frame);
        Ok(annotation)
    }

    /// Look up the annotation for an individual on a frame.
    pub fn get(&self, id: IndividualId, frame: &Frame) -> Option<&Annotation> {
        self.slot_of(id, frame).and_then(|slot| self.slots[slot].as_ref())
    }

    /// Annotations on a frame, ascending by individual id.
    pub fn regions_for_frame(&self, frame: &Frame) -> Vec<&Annotation> {
        self.by_frame
            .get(frame)
            .map(|ids| ids.values().filter_map(|&slot| self.slots[slot].as_ref()).collect())
            .unwrap_or_default()
    }

    /// Number of annotations on a frame (or image file).
    pub fn count_for_frame(&self, frame: &Frame) -> usize {
        self.by_frame.get(frame).map_or(0, BTreeMap::len)
    }

    /// Frames on which an individual has an annotation, ascending.
    pub fn frames_for_individual(&self, id: IndividualId) -> Vec<&Frame> {
        self.by_individual
            .get(&id)
            .map(|frames| frames.keys().collect())
            .unwrap_or_default()
    }

    /// Earliest frame with a detection of this individual.
    pub fn first_frame(&self, id: IndividualId) -> Option<&Frame> {
        self.by_individual.get(&id)?.keys().next()
    }

    /// First frame strictly after `frame` with a detection of this individual.
    pub fn next_frame_after(&self, id: IndividualId, frame: &Frame) -> Option<&Frame> {
        self.by_individual
            .get(&id)?
            .range((Bound::Excluded(frame), Bound::Unbounded))
            .next()
            .map(|(f, _)| f)
    }

    /// Last frame strictly before `frame` with a detection of this individual.
    pub fn prev_frame_before(&self, id: IndividualId, frame: &Frame) -> Option<&Frame> {
        self.by_individual
            .get(&id)?
            .range((Bound::Unbounded, Bound::Excluded(frame)))
            .next_back()
            .map(|(f, _)| f)
    }

    /// Frames holding at least one annotation, ascending.
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.by_frame.keys()
    }

    /// Individuals with at least one annotation, ascending.
    pub fn individual_ids(&self) -> impl DoubleEndedIterator<Item = IndividualId> + '_ {
        self.by_individual.keys().copied()
    }

    /// Nearest individual id above `id` that still has annotations.
    pub fn next_individual(&self, id: IndividualId) -> Option<IndividualId> {
        self.by_individual
            .range((Bound::Excluded(id), Bound::Unbounded))
            .next()
            .map(|(&i, _)| i)
    }

    /// Nearest individual id below `id` that still has annotations.
    pub fn prev_individual(&self, id: IndividualId) -> Option<IndividualId> {
        self.by_individual.range(..id).next_back().map(|(&i, _)| i)
    }

    /// Reserve a fresh individual id.
    ///
    /// Ids are never reused: the result is above every id inserted or
    /// reserved so far, even if those individuals were since removed.
    pub fn next_individual_id(&mut self) -> Result<IndividualId> {
        let id = match self.max_issued_id {
            None => 0,
            Some(max) => max.checked_add(1).ok_or_else(|| {
                StoreError::InvalidState("no individual ids left".to_string())
            })?,
        };
        self.max_issued_id = Some(id);
        Ok(id)
    }

    /// All annotations, ordered by individual then frame.
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.by_individual
            .values()
            .flat_map(|frames| frames.values())
            .filter_map(|&slot| self.slots[slot].as_ref())
    }

    /// Annotations of one individual, ascending by frame.
    pub fn annotations_for_individual(&self, id: IndividualId) -> Vec<&Annotation> {
        self.by_individual
            .get(&id)
            .map(|frames| frames.values().filter_map(|&slot| self.slots[slot].as_ref()).collect())
            .unwrap_or_default()
    }

    /// Change the species labels of one annotation.
    pub fn set_species(
        &mut self,
        id: IndividualId,
        frame: &Frame,
        species: &str,
        subspecies: &str,
    ) -> Result<()> {
        let slot = self.slot_of(id, frame).ok_or_else(|| StoreError::NotFound {
            id,
            frame: frame.clone(),
        })?;
        self.relabel(slot, species, subspecies);
        Ok(())
    }

    /// Change the species labels of every annotation of an individual.
    ///
    /// Returns the number of annotations relabelled.
    pub fn set_species_for_individual(
        &mut self,
        id: IndividualId,
        species: &str,
        subspecies: &str,
    ) -> usize {
        let slots: Vec<Slot> = self
            .by_individual
            .get(&id)
            .map(|frames| frames.values().copied().collect())
            .unwrap_or_default();
        for &slot in &slots {
            self.relabel(slot, species, subspecies);
        }
        slots.len()
    }

    /// Replace the region of one annotation.
    pub fn set_region(&mut self, id: IndividualId, frame: &Frame, region: Region) -> Result<()> {
        let annotation = self
            .slot_of(id, frame)
            .and_then(|slot| self.slots[slot].as_mut())
            .ok_or_else(|| StoreError::NotFound {
                id,
                frame: frame.clone(),
            })?;
        annotation.region = region;
        Ok(())
    }

    /// Distinct species labels across all annotations.
    pub fn all_species(&self) -> BTreeSet<String> {
        self.census.keys().cloned().collect()
    }

    /// Annotation count per species label.
    pub fn census(&self) -> &BTreeMap<String, usize> {
        &self.census
    }

    /// Mark or unmark a frame as visually degraded.
    pub fn set_degraded(&mut self, frame: Frame, degraded: bool) {
        if degraded {
            self.degraded.insert(frame);
        } else {
            self.degraded.remove(&frame);
        }
    }

    pub fn is_degraded(&self, frame: &Frame) -> bool {
        self.degraded.contains(frame)
    }

    pub fn degraded_frames(&self) -> impl Iterator<Item = &Frame> {
        self.degraded.iter()
    }

    fn slot_of(&self, id: IndividualId, frame: &Frame) -> Option<Slot> {
        self.by_individual.get(&id)?.get(frame).copied()
    }

    fn relabel(&mut self, slot: Slot, species: &str, subspecies: &str) {
        let Some(annotation) = self.slots[slot].as_mut() else {
            return;
        };
        let old = std::mem::replace(&mut annotation.species, species.to_string());
        annotation.subspecies = subspecies.to_string();
        if old != species {
            self.census_remove(&old);
            self.census_add(species);
        }
    }

    fn census_add(&mut self, species: &str) {
        *self.census.entry(species.to_string()).or_insert(0) += 1;
    }

    fn census_remove(&mut self, species: &str) {
        if let Some(count) = self.census.get_mut(species) {
            *count -= 1;
            if *count == 0 {
                self.census.remove(species);
            }
        }
    }
}

/// Equal when both hold the same annotations, regardless of index layout or
/// degraded markers.
impl PartialEq for AnnotationList {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|a| other.get(a.individual_id, &a.frame) == Some(a))
    }
}

impl TryFrom<Vec<Annotation>> for AnnotationList {
    type Error = StoreError;

    /// Build a list, failing on the first duplicate `(individual, frame)`.
    fn try_from(annotations: Vec<Annotation>) -> Result<Self> {
        let mut list = Self::new();
        for annotation in annotations {
            list.insert(annotation)?;
        }
        Ok(list)
    }
}
