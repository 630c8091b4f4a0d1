// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Interactive annotation session.
//!
//! This module holds the state behind an annotation window: the loaded
//! media, the current frame and fish, undo/redo history and the link to the
//! video player. A front end calls these methods in response to user
//! actions and calls [`AnnotationSession::poll_player`] from its event loop,
//! so the store is only ever touched from one thread.

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::io::media::{PlayerCommand, PlayerEvent, PlayerLink, VideoFrame};
use crate::io::serialization::image_frame;
use crate::models::annotation::{Annotation, Frame, IndividualId, Region, ShapeKind};
use crate::models::collection::AnnotationList;
use crate::models::stats::{self, IndividualStats};
use crate::util::geometry::clamp_region;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Undoable session state: the store plus labels of fish not yet drawn.
#[derive(Clone)]
struct Snapshot {
    annotations: AnnotationList,
    pending_labels: BTreeMap<IndividualId, (String, String)>,
}

/// History system for undo/redo functionality.
struct History {
    /// Undo stack (past states)
    undo_stack: Vec<Snapshot>,
    /// Redo stack (future states after undo)
    redo_stack: Vec<Snapshot>,
    /// Maximum history size
    max_size: usize,
}

impl History {
    fn new(max_size: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_size,
        }
    }

    /// Save the state from before a change
    fn push(&mut self, snapshot: Snapshot) {
        if self.max_size == 0 {
            return;
        }
        self.undo_stack.push(snapshot);
        if self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
        // A new edit invalidates anything undone
        self.redo_stack.clear();
    }

    fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.undo_stack.pop()?;
        self.redo_stack.push(current);
        Some(previous)
    }

    fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push(current);
        Some(next)
    }

    fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

/// What is being annotated.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    Video { path: PathBuf },
    Images { paths: Vec<PathBuf>, index: usize },
}

/// Playback state reported by the player.
#[derive(Debug, Clone, PartialEq)]
pub struct Playback {
    pub stopped: bool,
    /// Whether playback was stopped when the slider was grabbed
    was_stopped: bool,
    pub rate: f64,
    pub native_rate: f64,
    pub duration: u64,
    pub resolution: Option<(u32, u32)>,
}

impl Default for Playback {
    fn default() -> Self {
        Self {
            stopped: true,
            was_stopped: true,
            rate: 0.0,
            native_rate: 0.0,
            duration: 0,
            resolution: None,
        }
    }
}

/// State behind one annotation window.
pub struct AnnotationSession {
    annotations: AnnotationList,
    config: Config,
    media: Option<MediaSource>,
    player: Option<PlayerLink>,
    playback: Playback,
    /// Frame currently displayed
    current_frame: Option<Frame>,
    /// Last image delivered by the player
    last_image: Option<VideoFrame>,
    /// Currently selected fish
    fish_id: Option<IndividualId>,
    /// Labels for fish added but not yet drawn
    pending_labels: BTreeMap<IndividualId, (String, String)>,
    history: History,
}

impl AnnotationSession {
    pub fn new(config: Config) -> Self {
        let history = History::new(config.history_size);
        Self {
            annotations: AnnotationList::new(),
            config,
            media: None,
            player: None,
            playback: Playback::default(),
            current_frame: None,
            last_image: None,
            fish_id: None,
            pending_labels: BTreeMap::new(),
            history,
        }
    }

    /// Attach the player that will drive video playback.
    pub fn with_player(mut self, player: PlayerLink) -> Self {
        self.player = Some(player);
        self
    }

    pub fn annotations(&self) -> &AnnotationList {
        &self.annotations
    }

    pub fn media(&self) -> Option<&MediaSource> {
        self.media.as_ref()
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.current_frame.as_ref()
    }

    pub fn last_image(&self) -> Option<&VideoFrame> {
        self.last_image.as_ref()
    }

    pub fn current_fish(&self) -> Option<IndividualId> {
        self.fish_id
    }

    // ---------------------------------------------------------------
    // Media
    // ---------------------------------------------------------------

    /// Ask the player to open a video. Annotations are reset once the player
    /// reports the media as loaded.
    pub fn open_video(&mut self, path: &Path) -> Result<()> {
        self.command(PlayerCommand::Load(path.to_path_buf()))
    }

    /// Start annotating an image set, reading any existing sidecar files.
    pub fn open_images(&mut self, paths: Vec<PathBuf>) -> Result<()> {
        let annotations = AnnotationList::read_images(&paths, self.config.format)?;
        self.current_frame = match paths.first() {
            Some(first) => Some(image_frame(first)?),
            None => None,
        };
        self.reset(annotations);
        log::info!("Opened image set with {} images", paths.len());
        self.media = Some(MediaSource::Images { paths, index: 0 });
        Ok(())
    }

    /// Move to another image of the image set.
    pub fn go_to_image(&mut self, index: usize) -> Result<()> {
        let Some(MediaSource::Images { paths, index: current }) = self.media.as_mut() else {
            return Err(StoreError::InvalidState("no image set loaded".to_string()));
        };
        let path = paths.get(index).ok_or_else(|| {
            StoreError::InvalidState(format!("image {} out of range ({} images)", index, paths.len()))
        })?;
        let frame = image_frame(path)?;
        *current = index;
        self.current_frame = Some(frame);
        Ok(())
    }

    /// Load annotations for the current media from `path`.
    ///
    /// Videos use a single annotation file; image sets always read their
    /// sidecars and ignore `path`.
    pub fn load_annotations(&mut self, path: &Path) -> Result<()> {
        let annotations = match &self.media {
            Some(MediaSource::Images { paths, .. }) => {
                AnnotationList::read_images(paths, self.config.format)?
            }
            _ => AnnotationList::read_video(path)?.0,
        };
        self.reset(annotations);
        Ok(())
    }

    /// Save annotations for the current media.
    pub fn save_annotations(&self, path: &Path) -> Result<()> {
        match &self.media {
            Some(MediaSource::Images { paths, .. }) => {
                self.annotations.write_images(paths, self.config.format)
            }
            Some(MediaSource::Video { path: video }) => self
                .annotations
                .write_video(path, &video.to_string_lossy()),
            None => self.annotations.write_video(path, ""),
        }
    }

    fn reset(&mut self, annotations: AnnotationList) {
        self.annotations = annotations;
        self.fish_id = self.annotations.individual_ids().next();
        self.pending_labels.clear();
        self.history.clear();
    }

    // ---------------------------------------------------------------
    // Player
    // ---------------------------------------------------------------

    /// Apply every queued player notification.
    ///
    /// Player errors do not stop processing; they are returned so the front
    /// end can show them.
    pub fn poll_player(&mut self) -> Vec<StoreError> {
        let events = match &self.player {
            Some(player) => player.drain(),
            None => return Vec::new(),
        };
        let mut errors = Vec::new();
        for event in events {
            if let Err(e) = self.handle_player_event(event) {
                errors.push(e);
            }
        }
        errors
    }

    /// Apply one player notification.
    pub fn handle_player_event(&mut self, event: PlayerEvent) -> Result<()> {
        match event {
            PlayerEvent::FrameReady { image, frame } => {
                self.current_frame = Some(Frame::Index(frame));
                self.last_image = Some(image);
            }
            PlayerEvent::DurationChanged(duration) => self.playback.duration = duration,
            PlayerEvent::RateChanged(rate) => self.playback.rate = rate,
            PlayerEvent::ResolutionChanged { width, height } => {
                self.playback.resolution = Some((width, height));
            }
            PlayerEvent::MediaLoaded { path, native_rate } => {
                log::info!("Loaded video {} at {} fps", path.display(), native_rate);
                self.playback.native_rate = native_rate;
                self.playback.rate = native_rate;
                self.current_frame = Some(Frame::Index(0));
                self.last_image = None;
                self.media = Some(MediaSource::Video { path });
                self.reset(AnnotationList::new());
            }
            PlayerEvent::StateChanged { stopped } => self.playback.stopped = stopped,
            PlayerEvent::Error(message) => {
                log::warn!("Player error: {}", message);
                return Err(StoreError::Player(message));
            }
        }
        Ok(())
    }

    fn command(&self, command: PlayerCommand) -> Result<()> {
        let player = self
            .player
            .as_ref()
            .ok_or_else(|| StoreError::Player("no player attached".to_string()))?;
        log::debug!("Player command: {:?}", command);
        player
            .send(command)
            .map_err(|_| StoreError::Player("player disconnected".to_string()))
    }

    /// Toggle between playing and stopped.
    pub fn play_pause(&mut self) -> Result<()> {
        if self.playback.stopped {
            self.command(PlayerCommand::Play)
        } else {
            self.command(PlayerCommand::Stop)
        }
    }

    pub fn faster(&mut self) -> Result<()> {
        self.command(PlayerCommand::SpeedUp)
    }

    pub fn slower(&mut self) -> Result<()> {
        self.command(PlayerCommand::SlowDown)
    }

    pub fn next_frame(&mut self) -> Result<()> {
        self.command(PlayerCommand::NextFrame)
    }

    pub fn prev_frame(&mut self) -> Result<()> {
        self.command(PlayerCommand::PrevFrame)
    }

    /// Step back by one of the configured rewind steps.
    pub fn rewind_step(&mut self, step: usize) -> Result<()> {
        let seconds = self
            .config
            .seek_step_seconds
            .get(step)
            .copied()
            .ok_or_else(|| StoreError::InvalidState(format!("no rewind step {}", step)))?;
        self.rewind(seconds)
    }

    /// Step back by a number of seconds at the native rate.
    fn rewind(&mut self, seconds: f64) -> Result<()> {
        let current = self.current_index().unwrap_or(0);
        let step = (seconds * self.playback.native_rate).round().max(0.0) as u64;
        self.seek(current.saturating_sub(step))
    }

    pub fn seek(&mut self, frame: u64) -> Result<()> {
        self.command(PlayerCommand::Seek(frame))
    }

    /// Pause while the position slider is held.
    pub fn slider_pressed(&mut self) -> Result<()> {
        self.playback.was_stopped = self.playback.stopped;
        if !self.playback.stopped {
            self.command(PlayerCommand::Stop)?;
        }
        Ok(())
    }

    /// Resume playback if it was running before the slider was grabbed.
    pub fn slider_released(&mut self) -> Result<()> {
        if !self.playback.was_stopped {
            self.command(PlayerCommand::Play)?;
        }
        Ok(())
    }

    /// Save the last frame delivered by the player as an image file.
    ///
    /// The encoding follows the extension of `path`.
    pub fn write_image(&self, path: &Path) -> Result<()> {
        let frame = self
            .last_image
            .as_ref()
            .ok_or_else(|| StoreError::InvalidState("no frame displayed".to_string()))?;
        let buffer = image::RgbaImage::from_raw(frame.width, frame.height, frame.pixels.clone())
            .ok_or_else(|| StoreError::Image {
                path: path.to_path_buf(),
                message: format!(
                    "{} bytes do not fill a {}x{} RGBA frame",
                    frame.pixels.len(),
                    frame.width,
                    frame.height
                ),
            })?;
        buffer.save(path).map_err(|e| StoreError::Image {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        log::info!("Wrote frame image to {}", path.display());
        Ok(())
    }

    fn current_index(&self) -> Option<u64> {
        self.current_frame.as_ref().and_then(Frame::index)
    }

    // ---------------------------------------------------------------
    // Fish and regions
    // ---------------------------------------------------------------

    /// Start a new individual with the given labels and select it.
    ///
    /// The individual exists in the store once a region is drawn for it.
    pub fn add_individual(&mut self, species: &str, subspecies: &str) -> Result<IndividualId> {
        let id = self.annotations.next_individual_id()?;
        self.pending_labels
            .insert(id, (species.to_string(), subspecies.to_string()));
        self.fish_id = Some(id);
        log::info!("Added individual {} ({} {})", id, species, subspecies);
        Ok(id)
    }

    /// Add a region for the current fish on the current frame.
    ///
    /// Fails with [`StoreError::DuplicateAnnotation`] if one already exists.
    pub fn add_region(&mut self, region: Region, shape_kind: ShapeKind) -> Result<()> {
        let (id, frame) = self.selection()?;
        let region = self.fit_to_frame(region)?;
        let (species, subspecies) = self.labels_for(id);
        let annotation = Annotation::new(id, frame, species, subspecies, region).with_shape(shape_kind);
        self.edit(|list| list.insert(annotation))?;
        self.pending_labels.remove(&id);
        Ok(())
    }

    /// Remove the current fish's region on the current frame.
    pub fn remove_region(&mut self) -> Result<Annotation> {
        let (id, frame) = self.selection()?;
        self.edit(|list| list.remove(id, &frame))
    }

    /// Move or resize the current fish's region on the current frame.
    pub fn update_region(&mut self, region: Region) -> Result<()> {
        let (id, frame) = self.selection()?;
        let region = self.fit_to_frame(region)?;
        self.edit(|list| list.set_region(id, &frame, region))
    }

    /// Advance one frame and copy the current fish's region onto it.
    pub fn next_and_copy(&mut self) -> Result<()> {
        let (id, frame) = self.selection()?;
        let source = self
            .annotations
            .get(id, &frame)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                id,
                frame: frame.clone(),
            })?;
        let next = match &frame {
            Frame::Index(i) => Frame::Index(i.checked_add(1).ok_or_else(|| {
                StoreError::InvalidState("already on the last frame".to_string())
            })?),
            Frame::Image(_) => self.next_image_frame()?,
        };
        let copy = Annotation {
            frame: next.clone(),
            ..source
        };
        self.edit(|list| list.insert(copy))?;

        match &self.media {
            Some(MediaSource::Images { index, .. }) => {
                let index = *index;
                self.go_to_image(index + 1)?;
            }
            _ => {
                self.current_frame = Some(next);
                // The display catches up when the frame arrives.
                if self.player.is_some() {
                    self.command(PlayerCommand::NextFrame)?;
                }
            }
        }
        Ok(())
    }

    fn next_image_frame(&self) -> Result<Frame> {
        match &self.media {
            Some(MediaSource::Images { paths, index }) => paths
                .get(index + 1)
                .ok_or_else(|| StoreError::InvalidState("already on the last image".to_string()))
                .and_then(|p| image_frame(p)),
            _ => Err(StoreError::InvalidState("no image set loaded".to_string())),
        }
    }

    /// Relabel every region of the current fish.
    pub fn set_species(&mut self, species: &str, subspecies: &str) -> Result<()> {
        let id = self.fish()?;
        if !self.annotations.frames_for_individual(id).is_empty() {
            self.edit(|list| {
                list.set_species_for_individual(id, species, subspecies);
                Ok(())
            })?;
        }
        if let Some(labels) = self.pending_labels.get_mut(&id) {
            *labels = (species.to_string(), subspecies.to_string());
        }
        Ok(())
    }

    /// Select the next higher fish id that has annotations.
    pub fn next_fish(&mut self) -> Option<IndividualId> {
        let next = match self.fish_id {
            Some(id) => self.annotations.next_individual(id),
            None => self.annotations.individual_ids().next(),
        };
        if next.is_some() {
            self.fish_id = next;
        }
        next
    }

    /// Select the next lower fish id that has annotations.
    pub fn prev_fish(&mut self) -> Option<IndividualId> {
        let prev = match self.fish_id {
            Some(id) => self.annotations.prev_individual(id),
            None => self.annotations.individual_ids().next_back(),
        };
        if prev.is_some() {
            self.fish_id = prev;
        }
        prev
    }

    /// Select a fish by id.
    pub fn go_to_fish(&mut self, id: IndividualId) -> Result<()> {
        if self.annotations.first_frame(id).is_none() && !self.pending_labels.contains_key(&id) {
            return Err(StoreError::InvalidState(format!("no individual with id {}", id)));
        }
        self.fish_id = Some(id);
        Ok(())
    }

    /// Remove every region of the current fish and select a neighbour.
    pub fn remove_fish(&mut self) -> Result<usize> {
        let id = self.fish()?;
        let frames: Vec<Frame> = self
            .annotations
            .frames_for_individual(id)
            .into_iter()
            .cloned()
            .collect();
        let removed = frames.len();
        if removed > 0 {
            self.edit(|list| {
                for frame in &frames {
                    list.remove(id, frame)?;
                }
                Ok(())
            })?;
        }
        self.pending_labels.remove(&id);
        self.fish_id = self
            .annotations
            .next_individual(id)
            .or_else(|| self.annotations.prev_individual(id));
        log::info!("Removed individual {} ({} regions)", id, removed);
        Ok(removed)
    }

    /// Go to the first frame where the current fish was detected.
    pub fn go_to_first_frame(&mut self) -> Result<Frame> {
        let id = self.fish()?;
        let frame = self
            .annotations
            .first_frame(id)
            .cloned()
            .ok_or_else(|| StoreError::InvalidState(format!("individual {} has no regions", id)))?;
        match &frame {
            Frame::Index(i) => self.seek(*i)?,
            Frame::Image(name) => {
                let index = self.image_index(name)?;
                self.go_to_image(index)?;
            }
        }
        Ok(frame)
    }

    fn image_index(&self, name: &str) -> Result<usize> {
        let Some(MediaSource::Images { paths, .. }) = &self.media else {
            return Err(StoreError::InvalidState("no image set loaded".to_string()));
        };
        paths
            .iter()
            .position(|p| p.file_name().is_some_and(|n| n.to_string_lossy() == name))
            .ok_or_else(|| StoreError::InvalidState(format!("image {} is not in the set", name)))
    }

    /// Mark the current frame as visually degraded (or clear the mark).
    pub fn set_degraded(&mut self, degraded: bool) -> Result<()> {
        let frame = self.frame()?;
        self.edit(|list| {
            list.set_degraded(frame, degraded);
            Ok(())
        })
    }

    // ---------------------------------------------------------------
    // History
    // ---------------------------------------------------------------

    pub fn undo(&mut self) -> bool {
        let current = self.snapshot();
        match self.history.undo(current) {
            Some(previous) => {
                self.restore(previous);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        let current = self.snapshot();
        match self.history.redo(current) {
            Some(next) => {
                self.restore(next);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Apply a change to the store, recording history only if it succeeds.
    fn edit<T>(&mut self, change: impl FnOnce(&mut AnnotationList) -> Result<T>) -> Result<T> {
        let mut working = self.annotations.clone();
        let out = change(&mut working)?;
        let previous = Snapshot {
            annotations: std::mem::replace(&mut self.annotations, working),
            pending_labels: self.pending_labels.clone(),
        };
        self.history.push(previous);
        Ok(out)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            annotations: self.annotations.clone(),
            pending_labels: self.pending_labels.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.annotations = snapshot.annotations;
        self.pending_labels = snapshot.pending_labels;
    }

    // ---------------------------------------------------------------
    // Views
    // ---------------------------------------------------------------

    /// Regions to draw over the current frame.
    pub fn current_regions(&self) -> Vec<&Annotation> {
        self.current_frame
            .as_ref()
            .map(|frame| self.annotations.regions_for_frame(frame))
            .unwrap_or_default()
    }

    pub fn current_frame_degraded(&self) -> bool {
        self.current_frame
            .as_ref()
            .is_some_and(|frame| self.annotations.is_degraded(frame))
    }

    /// Species labels to offer: configured defaults plus every label in use.
    pub fn species_choices(&self) -> BTreeSet<String> {
        let mut choices = self.annotations.all_species();
        choices.extend(self.config.default_species.iter().cloned());
        choices
    }

    /// Count of distinct fish per species, for the species controls.
    pub fn species_counts(&self) -> BTreeMap<String, usize> {
        stats::individuals_per_species(&self.annotations)
    }

    /// Statistics for the selected fish.
    pub fn fish_stats(&self) -> Option<IndividualStats> {
        stats::individual_stats(&self.annotations, self.fish_id?)
    }

    // ---------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------

    fn fish(&self) -> Result<IndividualId> {
        self.fish_id
            .ok_or_else(|| StoreError::InvalidState("no fish selected".to_string()))
    }

    fn frame(&self) -> Result<Frame> {
        self.current_frame
            .clone()
            .ok_or_else(|| StoreError::InvalidState("no frame displayed".to_string()))
    }

    fn selection(&self) -> Result<(IndividualId, Frame)> {
        Ok((self.fish()?, self.frame()?))
    }

    fn labels_for(&self, id: IndividualId) -> (String, String) {
        if let Some(labels) = self.pending_labels.get(&id) {
            return labels.clone();
        }
        self.annotations
            .annotations_for_individual(id)
            .last()
            .map(|a| (a.species.clone(), a.subspecies.clone()))
            .unwrap_or_default()
    }

    fn fit_to_frame(&self, region: Region) -> Result<Region> {
        match (self.config.clamp_regions, self.playback.resolution) {
            (true, Some((width, height))) => clamp_region(&region, width, height).ok_or_else(|| {
                StoreError::InvalidRegion("region lies outside the frame".to_string())
            }),
            _ => Ok(region),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::media::PlayerEndpoint;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Region {
        Region::new(x, y, w, h).unwrap()
    }

    fn video_session() -> (AnnotationSession, PlayerEndpoint) {
        let (link, endpoint) = PlayerLink::pair();
        let mut session = AnnotationSession::new(Config::default()).with_player(link);
        endpoint
            .events
            .send(PlayerEvent::MediaLoaded {
                path: PathBuf::from("reef.mp4"),
                native_rate: 10.0,
            })
            .unwrap();
        endpoint
            .events
            .send(PlayerEvent::ResolutionChanged { width: 640, height: 480 })
            .unwrap();
        assert!(session.poll_player().is_empty());
        (session, endpoint)
    }

    fn show_frame(session: &mut AnnotationSession, frame: u64) {
        session
            .handle_player_event(PlayerEvent::FrameReady {
                image: VideoFrame {
                    width: 1,
                    height: 1,
                    pixels: vec![0, 0, 0, 255],
                },
                frame,
            })
            .unwrap();
    }

    #[test]
    fn test_add_individual_and_region() {
        let (mut session, _player) = video_session();
        let id = session.add_individual("cod", "atlantic").unwrap();
        session.add_region(rect(10.0, 10.0, 20.0, 20.0), ShapeKind::Box).unwrap();

        let a = session.annotations().get(id, &Frame::Index(0)).unwrap();
        assert_eq!(a.species, "cod");
        assert_eq!(a.subspecies, "atlantic");
        assert_eq!(session.current_regions().len(), 1);

        let err = session
            .add_region(rect(0.0, 0.0, 1.0, 1.0), ShapeKind::Box)
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateAnnotation { .. }));
        assert_eq!(session.annotations().len(), 1);
    }

    #[test]
    fn test_regions_are_clamped_to_resolution() {
        let (mut session, _player) = video_session();
        session.add_individual("cod", "").unwrap();
        session.add_region(rect(600.0, 470.0, 100.0, 100.0), ShapeKind::Box).unwrap();
        let a = &session.current_regions()[0];
        assert_eq!(a.region, rect(600.0, 470.0, 40.0, 10.0));

        session.add_individual("cod", "").unwrap();
        assert!(matches!(
            session.add_region(rect(700.0, 0.0, 5.0, 5.0), ShapeKind::Box),
            Err(StoreError::InvalidRegion(_))
        ));
    }

    #[test]
    fn test_remove_region_requires_existing() {
        let (mut session, _player) = video_session();
        session.add_individual("cod", "").unwrap();
        assert!(matches!(session.remove_region(), Err(StoreError::NotFound { .. })));
        assert!(!session.can_undo());
    }

    #[test]
    fn test_next_and_copy() {
        let (mut session, player) = video_session();
        let id = session.add_individual("cod", "").unwrap();
        session.add_region(rect(1.0, 1.0, 5.0, 5.0), ShapeKind::Box).unwrap();
        session.next_and_copy().unwrap();

        assert_eq!(player.commands.try_recv().unwrap(), PlayerCommand::NextFrame);
        assert_eq!(session.current_frame(), Some(&Frame::Index(1)));
        assert_eq!(
            session.annotations().frames_for_individual(id),
            vec![&Frame::Index(0), &Frame::Index(1)]
        );
        assert_eq!(
            session.annotations().get(id, &Frame::Index(1)).unwrap().region,
            rect(1.0, 1.0, 5.0, 5.0)
        );
    }

    #[test]
    fn test_fish_navigation_and_first_frame() {
        let (mut session, player) = video_session();
        let a = session.add_individual("cod", "").unwrap();
        show_frame(&mut session, 12);
        session.add_region(rect(0.0, 0.0, 5.0, 5.0), ShapeKind::Box).unwrap();
        let b = session.add_individual("haddock", "").unwrap();
        session.add_region(rect(0.0, 0.0, 5.0, 5.0), ShapeKind::Box).unwrap();

        assert_eq!(session.prev_fish(), Some(a));
        assert_eq!(session.prev_fish(), None);
        assert_eq!(session.current_fish(), Some(a));
        assert_eq!(session.next_fish(), Some(b));

        session.go_to_fish(a).unwrap();
        show_frame(&mut session, 30);
        session.add_region(rect(0.0, 0.0, 5.0, 5.0), ShapeKind::Box).unwrap();
        assert_eq!(session.go_to_first_frame().unwrap(), Frame::Index(12));
        assert_eq!(player.commands.try_recv().unwrap(), PlayerCommand::Seek(12));

        assert!(session.go_to_fish(99).is_err());
        let stats = session.fish_stats().unwrap();
        assert_eq!(stats.frame_count, 2);
        assert_eq!(stats.last_frame, Frame::Index(30));
    }

    #[test]
    fn test_remove_fish_selects_neighbour() {
        let (mut session, _player) = video_session();
        let a = session.add_individual("cod", "").unwrap();
        session.add_region(rect(0.0, 0.0, 5.0, 5.0), ShapeKind::Box).unwrap();
        show_frame(&mut session, 1);
        session.add_region(rect(0.0, 0.0, 5.0, 5.0), ShapeKind::Box).unwrap();
        let b = session.add_individual("skate", "").unwrap();
        session.add_region(rect(0.0, 0.0, 5.0, 5.0), ShapeKind::Box).unwrap();

        session.go_to_fish(a).unwrap();
        assert_eq!(session.remove_fish().unwrap(), 2);
        assert_eq!(session.current_fish(), Some(b));
        assert_eq!(session.annotations().len(), 1);
        assert_eq!(session.species_counts().get("cod"), None);

        // Ids are not reused after removal.
        assert!(session.add_individual("cod", "").unwrap() > b);
    }

    #[test]
    fn test_set_species_relabels_fish() {
        let (mut session, _player) = video_session();
        session.add_individual("cod", "").unwrap();
        session.add_region(rect(0.0, 0.0, 5.0, 5.0), ShapeKind::Box).unwrap();
        show_frame(&mut session, 3);
        session.add_region(rect(0.0, 0.0, 5.0, 5.0), ShapeKind::Box).unwrap();
        session.set_species("pollock", "saithe").unwrap();

        assert_eq!(
            session.annotations().all_species().into_iter().collect::<Vec<_>>(),
            vec!["pollock"]
        );
        assert_eq!(session.annotations().census().get("pollock"), Some(&2));
    }

    #[test]
    fn test_undo_redo() {
        let (mut session, _player) = video_session();
        session.add_individual("cod", "").unwrap();
        session.add_region(rect(0.0, 0.0, 5.0, 5.0), ShapeKind::Box).unwrap();
        session.set_degraded(true).unwrap();
        assert!(session.current_frame_degraded());

        assert!(session.undo());
        assert!(!session.current_frame_degraded());
        assert!(session.undo());
        assert!(session.annotations().is_empty());
        assert!(!session.undo());

        assert!(session.redo());
        assert_eq!(session.annotations().len(), 1);
        assert!(session.can_redo());
    }

    #[test]
    fn test_undo_restores_pending_labels() {
        let (mut session, _player) = video_session();
        let id = session.add_individual("cod", "atlantic").unwrap();
        session.add_region(rect(0.0, 0.0, 5.0, 5.0), ShapeKind::Box).unwrap();
        assert!(session.undo());
        assert!(session.annotations().is_empty());

        session.add_region(rect(0.0, 0.0, 5.0, 5.0), ShapeKind::Box).unwrap();
        let a = session.annotations().get(id, &Frame::Index(0)).unwrap();
        assert_eq!(a.species, "cod");
        assert_eq!(a.subspecies, "atlantic");
    }

    #[test]
    fn test_set_species_before_drawing_is_not_undoable() {
        let (mut session, _player) = video_session();
        let id = session.add_individual("cod", "").unwrap();
        session.set_species("haddock", "").unwrap();
        assert!(!session.can_undo());

        session.add_region(rect(0.0, 0.0, 5.0, 5.0), ShapeKind::Box).unwrap();
        assert_eq!(
            session.annotations().get(id, &Frame::Index(0)).unwrap().species,
            "haddock"
        );
    }

    #[test]
    fn test_next_and_copy_on_last_frame_index() {
        let (mut session, player) = video_session();
        show_frame(&mut session, u64::MAX);
        session.add_individual("cod", "").unwrap();
        session.add_region(rect(0.0, 0.0, 5.0, 5.0), ShapeKind::Box).unwrap();

        assert!(matches!(session.next_and_copy(), Err(StoreError::InvalidState(_))));
        assert_eq!(session.annotations().len(), 1);
        assert_eq!(session.current_frame(), Some(&Frame::Index(u64::MAX)));
        assert!(player.commands.try_recv().is_err());
    }

    #[test]
    fn test_history_is_bounded() {
        let config = Config {
            history_size: 2,
            ..Config::default()
        };
        let mut session = AnnotationSession::new(config);
        session.handle_player_event(PlayerEvent::FrameReady {
            image: VideoFrame { width: 0, height: 0, pixels: Vec::new() },
            frame: 0,
        })
        .unwrap();
        session.add_individual("cod", "").unwrap();
        for _ in 0..4 {
            session.set_degraded(true).unwrap();
        }
        assert!(session.undo());
        assert!(session.undo());
        assert!(!session.undo());
    }

    #[test]
    fn test_player_errors_are_reported() {
        let (mut session, player) = video_session();
        player.events.send(PlayerEvent::Error("codec".to_string())).unwrap();
        player.events.send(PlayerEvent::StateChanged { stopped: false }).unwrap();

        let errors = session.poll_player();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], StoreError::Player(m) if m == "codec"));
        assert!(!session.playback().stopped);
    }

    #[test]
    fn test_transport_commands() {
        let (mut session, player) = video_session();
        show_frame(&mut session, 25);

        session.play_pause().unwrap();
        session.rewind_step(0).unwrap();
        session.rewind_step(1).unwrap();
        session.handle_player_event(PlayerEvent::StateChanged { stopped: false }).unwrap();
        session.slider_pressed().unwrap();
        session.slider_released().unwrap();

        let sent: Vec<_> = player.commands.try_iter().collect();
        assert_eq!(
            sent,
            vec![
                PlayerCommand::Play,
                PlayerCommand::Seek(15),
                PlayerCommand::Seek(0),
                PlayerCommand::Stop,
                PlayerCommand::Play,
            ]
        );
    }

    #[test]
    fn test_rewind_steps_come_from_config() {
        let (link, player) = PlayerLink::pair();
        let config = Config {
            seek_step_seconds: vec![0.5],
            ..Config::default()
        };
        let mut session = AnnotationSession::new(config).with_player(link);
        session
            .handle_player_event(PlayerEvent::MediaLoaded {
                path: PathBuf::from("reef.mp4"),
                native_rate: 10.0,
            })
            .unwrap();
        show_frame(&mut session, 25);

        session.rewind_step(0).unwrap();
        assert_eq!(player.commands.try_recv().unwrap(), PlayerCommand::Seek(20));
        assert!(matches!(session.rewind_step(1), Err(StoreError::InvalidState(_))));
    }

    #[test]
    fn test_write_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let mut session = AnnotationSession::new(Config::default());
        assert!(matches!(session.write_image(&path), Err(StoreError::InvalidState(_))));

        session
            .handle_player_event(PlayerEvent::FrameReady {
                image: VideoFrame {
                    width: 2,
                    height: 1,
                    pixels: vec![255, 0, 0, 255, 0, 0, 255, 255],
                },
                frame: 4,
            })
            .unwrap();
        session.write_image(&path).unwrap();
        let written = image::open(&path).unwrap().to_rgba8();
        assert_eq!(written.dimensions(), (2, 1));
        assert_eq!(written.get_pixel(1, 0).0, [0, 0, 255, 255]);

        session
            .handle_player_event(PlayerEvent::FrameReady {
                image: VideoFrame {
                    width: 4,
                    height: 4,
                    pixels: vec![0; 3],
                },
                frame: 5,
            })
            .unwrap();
        let short = dir.path().join("short.png");
        assert!(matches!(session.write_image(&short), Err(StoreError::Image { .. })));
        assert!(!short.exists());
    }

    #[test]
    fn test_commands_without_player_fail() {
        let mut session = AnnotationSession::new(Config::default());
        assert!(matches!(session.next_frame(), Err(StoreError::Player(_))));
    }

    #[test]
    fn test_new_media_resets_annotations() {
        let (mut session, player) = video_session();
        session.add_individual("cod", "").unwrap();
        session.add_region(rect(0.0, 0.0, 5.0, 5.0), ShapeKind::Box).unwrap();

        player
            .events
            .send(PlayerEvent::MediaLoaded {
                path: PathBuf::from("other.mp4"),
                native_rate: 25.0,
            })
            .unwrap();
        session.poll_player();
        assert!(session.annotations().is_empty());
        assert!(!session.can_undo());
        assert_eq!(
            session.media(),
            Some(&MediaSource::Video { path: PathBuf::from("other.mp4") })
        );
    }

    #[test]
    fn test_video_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reef.json");
        let (mut session, _player) = video_session();
        session.add_individual("cod", "").unwrap();
        session.add_region(rect(0.0, 0.0, 5.0, 5.0), ShapeKind::Box).unwrap();
        session.save_annotations(&path).unwrap();

        let (mut other, _player2) = video_session();
        other.load_annotations(&path).unwrap();
        assert_eq!(other.annotations(), session.annotations());
        assert_eq!(other.current_fish(), Some(0));
    }

    #[test]
    fn test_image_set_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let images: Vec<PathBuf> = ["a.png", "b.png", "c.png"]
            .iter()
            .map(|n| dir.path().join(n))
            .collect();

        let mut session = AnnotationSession::new(Config::default());
        session.open_images(images.clone()).unwrap();
        assert_eq!(session.current_frame(), Some(&Frame::from("a.png")));

        let id = session.add_individual("cod", "").unwrap();
        session.add_region(rect(0.0, 0.0, 5.0, 5.0), ShapeKind::Box).unwrap();
        session.next_and_copy().unwrap();
        assert_eq!(session.current_frame(), Some(&Frame::from("b.png")));
        assert_eq!(session.annotations().count_for_frame(&Frame::from("b.png")), 1);

        session.go_to_image(2).unwrap();
        assert_eq!(session.go_to_first_frame().unwrap(), Frame::from("a.png"));
        assert_eq!(session.current_frame(), Some(&Frame::from("a.png")));
        session.save_annotations(Path::new("unused")).unwrap();

        let mut reopened = AnnotationSession::new(Config::default());
        reopened.open_images(images).unwrap();
        assert_eq!(reopened.annotations(), session.annotations());
        assert_eq!(reopened.annotations().frames_for_individual(id).len(), 2);
        assert!(reopened.go_to_image(3).is_err());
    }

    #[test]
    fn test_species_choices_include_defaults() {
        let config = Config {
            default_species: vec!["haddock".to_string()],
            ..Config::default()
        };
        let (link, _endpoint) = PlayerLink::pair();
        let mut session = AnnotationSession::new(config).with_player(link);
        session.handle_player_event(PlayerEvent::FrameReady {
            image: VideoFrame { width: 0, height: 0, pixels: Vec::new() },
            frame: 0,
        })
        .unwrap();
        session.add_individual("cod", "").unwrap();
        session.add_region(rect(0.0, 0.0, 1.0, 1.0), ShapeKind::Dot).unwrap();

        let choices: Vec<_> = session.species_choices().into_iter().collect();
        assert_eq!(choices, vec!["cod", "haddock"]);
    }
}
