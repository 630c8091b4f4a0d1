// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Interface to the video player.
//!
//! Decoding happens elsewhere, usually on its own thread. The player sends
//! [`PlayerEvent`]s and receives [`PlayerCommand`]s over channels; the
//! annotation session drains events on its own thread before touching the
//! store.

use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, SendError, Sender};

/// A decoded frame as RGBA pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Notifications emitted by the player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    FrameReady { image: VideoFrame, frame: u64 },
    /// New duration in total frames
    DurationChanged(u64),
    /// New playback rate in frames per second
    RateChanged(f64),
    ResolutionChanged { width: u32, height: u32 },
    MediaLoaded { path: PathBuf, native_rate: f64 },
    StateChanged { stopped: bool },
    Error(String),
}

/// Transport commands accepted by the player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Play,
    Stop,
    Load(PathBuf),
    /// Double the playback rate
    SpeedUp,
    /// Halve the playback rate
    SlowDown,
    Seek(u64),
    NextFrame,
    PrevFrame,
}

/// The session's end of the player channels.
pub struct PlayerLink {
    events: Receiver<PlayerEvent>,
    commands: Sender<PlayerCommand>,
}

/// The player's end of the channels.
pub struct PlayerEndpoint {
    pub events: Sender<PlayerEvent>,
    pub commands: Receiver<PlayerCommand>,
}

impl PlayerLink {
    /// Create a connected pair of channel ends.
    pub fn pair() -> (PlayerLink, PlayerEndpoint) {
        let (event_tx, event_rx) = channel();
        let (command_tx, command_rx) = channel();
        (
            PlayerLink {
                events: event_rx,
                commands: command_tx,
            },
            PlayerEndpoint {
                events: event_tx,
                commands: command_rx,
            },
        )
    }

    /// Send a command to the player.
    pub fn send(&self, command: PlayerCommand) -> Result<(), SendError<PlayerCommand>> {
        self.commands.send(command)
    }

    /// Take every event currently queued, without blocking.
    pub fn drain(&self) -> Vec<PlayerEvent> {
        self.events.try_iter().collect()
    }
}
