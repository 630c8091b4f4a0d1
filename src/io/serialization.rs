// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation file serialization and deserialization.
//!
//! This module handles writing and reading annotation documents in JSON and
//! YAML formats. Each destination file is written to a temporary sibling and
//! renamed into place, so a file is either fully replaced or left untouched.

use crate::error::{Result, StoreError};
use crate::models::annotation::Frame;
use crate::models::collection::AnnotationList;
use crate::models::project::{ImageAnnotationFile, VideoAnnotationFile};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// On-disk encoding of annotation documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

impl Format {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path.extension().and_then(|s| s.to_str());
        match extension {
            Some("json") => Ok(Format::Json),
            Some("yaml") | Some("yml") => Ok(Format::Yaml),
            other => Err(StoreError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }
}

/// Serialize a document and atomically replace `path` with it.
pub fn export<T: Serialize>(data: &T, path: &Path, format: Format) -> Result<()> {
    let text = match format {
        Format::Json => {
            serde_json::to_string_pretty(data).map_err(|e| StoreError::serialization(path, e))?
        }
        Format::Yaml => {
            serde_yaml::to_string(data).map_err(|e| StoreError::serialization(path, e))?
        }
    };
    write_atomic(path, text.as_bytes())
}

/// Read and parse a document.
pub fn import<T: DeserializeOwned>(path: &Path, format: Format) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    match format {
        Format::Json => serde_json::from_str(&text).map_err(|e| StoreError::serialization(path, e)),
        Format::Yaml => serde_yaml::from_str(&text).map_err(|e| StoreError::serialization(path, e)),
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = temp_path(path);
    if let Err(e) = std::fs::write(&tmp, contents) {
        let _ = std::fs::remove_file(&tmp);
        return Err(StoreError::io(&tmp, e));
    }
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        StoreError::io(path, e)
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Sidecar annotation file for an image: the full image name plus the
/// format extension, e.g. `ceres1.png.json`.
pub fn sidecar_path(image: &Path, format: Format) -> PathBuf {
    let mut name = image.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(format.extension());
    image.with_file_name(name)
}

/// Frame key used for an image: its filename without directories.
pub fn image_frame(image: &Path) -> Result<Frame> {
    image
        .file_name()
        .map(|name| Frame::Image(name.to_string_lossy().into_owned()))
        .ok_or_else(|| StoreError::serialization(image, "image path has no file name"))
}

/// Frame keys for an image set, rejecting names that occur twice.
fn image_frames(images: &[PathBuf]) -> Result<Vec<Frame>> {
    let mut seen = BTreeSet::new();
    images
        .iter()
        .map(|image| {
            let frame = image_frame(image)?;
            if !seen.insert(frame.clone()) {
                return Err(StoreError::DuplicateImageName(frame.to_string()));
            }
            Ok(frame)
        })
        .collect()
}

impl AnnotationList {
    /// Write every annotation and degraded marker of a video to one file.
    ///
    /// The format follows the extension of `path`.
    pub fn write_video(&self, path: &Path, media_file: &str) -> Result<()> {
        let format = Format::from_path(path)?;
        export(&VideoAnnotationFile::from_list(media_file, self), path, format)?;
        log::info!("Wrote {} annotations to {}", self.len(), path.display());
        Ok(())
    }

    /// Read a video annotation file written by [`write_video`](Self::write_video).
    ///
    /// Returns the list and the media file it refers to.
    pub fn read_video(path: &Path) -> Result<(Self, String)> {
        let format = Format::from_path(path)?;
        let doc: VideoAnnotationFile = import(path, format)?;
        let mut list =
            Self::try_from(doc.annotations).map_err(|e| StoreError::serialization(path, e))?;
        for frame in doc.degraded_frames {
            list.set_degraded(frame, true);
        }
        log::info!("Read {} annotations from {}", list.len(), path.display());
        Ok((list, doc.media_file))
    }

    /// Replace this list with the contents of a video annotation file.
    ///
    /// On failure the list is left unchanged.
    pub fn load_video(&mut self, path: &Path) -> Result<String> {
        let (list, media_file) = Self::read_video(path)?;
        *self = list;
        Ok(media_file)
    }

    /// Write one sidecar file per image holding that image's annotations.
    ///
    /// Sidecars are written even when empty so removed annotations do not
    /// reappear on the next read. Nothing is written if an annotated or
    /// degraded frame has no image in `images`.
    pub fn write_images(&self, images: &[PathBuf], format: Format) -> Result<()> {
        let frames = image_frames(images)?;
        let keys: BTreeSet<&Frame> = frames.iter().collect();
        if let Some(frame) = self
            .frames()
            .chain(self.degraded_frames())
            .find(|frame| !keys.contains(frame))
        {
            return Err(StoreError::UnsavedFrame(frame.clone()));
        }

        for (image, frame) in images.iter().zip(&frames) {
            let name = frame.image().unwrap_or_default().to_string();
            let doc = ImageAnnotationFile::from_list(name, self);
            export(&doc, &sidecar_path(image, format), format)?;
        }
        log::info!("Wrote annotations for {} images", images.len());
        Ok(())
    }

    /// Read the sidecar files of an image set.
    ///
    /// Images without a sidecar simply have no annotations.
    pub fn read_images(images: &[PathBuf], format: Format) -> Result<Self> {
        let frames = image_frames(images)?;
        let mut list = Self::new();
        for (image, frame) in images.iter().zip(frames) {
            let path = sidecar_path(image, format);
            if !path.exists() {
                log::debug!("No annotations for {}", image.display());
                continue;
            }
            let doc: ImageAnnotationFile = import(&path, format)?;
            for annotation in doc.annotations {
                if annotation.frame != frame {
                    return Err(StoreError::serialization(
                        &path,
                        format!("annotation for {} found in file for {}", annotation.frame, frame),
                    ));
                }
                list.insert(annotation)
                    .map_err(|e| StoreError::serialization(&path, e))?;
            }
            if doc.degraded {
                list.set_degraded(frame, true);
            }
        }
        log::info!("Read {} annotations from {} images", list.len(), images.len());
        Ok(list)
    }

    /// Replace this list with the sidecar contents of an image set.
    ///
    /// On failure the list is left unchanged.
    pub fn load_images(&mut self, images: &[PathBuf], format: Format) -> Result<()> {
        *self = Self::read_images(images, format)?;
        Ok(())
    }
}
