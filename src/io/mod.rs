// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! I/O: annotation files and the video player interface.

pub mod media;
pub mod serialization;
