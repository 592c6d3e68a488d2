//! Loop and track descriptors, and the jam manifest they arrive in

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while reading a jam manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid manifest: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Duplicate loop id: {0}")]
    DuplicateLoop(LoopId),
}

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Identity of a loop within a jam
    LoopId
);
id_type!(
    /// Identity of a single uploaded track
    TrackId
);

/// One audio source belonging to a loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub id: TrackId,
    /// Download URL; absent for placeholders that were never uploaded
    #[serde(rename = "url", default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(
        rename = "displayName",
        alias = "file_name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name: Option<String>,
}

impl TrackDescriptor {
    pub fn new(id: impl Into<TrackId>, source_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_url: Some(source_url.into()),
            display_name: None,
        }
    }

    /// Placeholder slot with no audio yet
    pub fn placeholder(id: impl Into<TrackId>) -> Self {
        Self {
            id: id.into(),
            source_url: None,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Whether this track can be fetched and scheduled
    pub fn is_playable(&self) -> bool {
        self.source_url.is_some()
    }

    /// Label shown for the track at the given position in its loop
    pub fn label(&self, index: usize) -> String {
        match (&self.display_name, &self.source_url) {
            (Some(name), _) => name.clone(),
            (None, Some(_)) => format!("Audio {}", index + 1),
            (None, None) => self.id.to_string(),
        }
    }
}

/// A named set of tracks played back together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopDescriptor {
    pub id: LoopId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub tracks: Vec<TrackDescriptor>,
}

impl LoopDescriptor {
    pub fn new(id: impl Into<LoopId>, tracks: Vec<TrackDescriptor>) -> Self {
        Self {
            id: id.into(),
            name: None,
            tracks,
        }
    }

    /// Tracks that have a source URL
    pub fn playable_tracks(&self) -> impl Iterator<Item = &TrackDescriptor> {
        self.tracks.iter().filter(|t| t.is_playable())
    }

    /// Set of track ids, used to detect a changed loop
    pub fn track_ids(&self) -> BTreeSet<TrackId> {
        self.tracks.iter().map(|t| t.id.clone()).collect()
    }
}

/// Loops of one jam, as delivered by the jam API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JamManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub loops: Vec<LoopDescriptor>,
}

impl JamManifest {
    /// Load a manifest from a JSON file
    pub fn load_from(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a manifest from JSON text
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let manifest: Self = serde_json::from_str(content)?;

        let mut seen = BTreeSet::new();
        for lp in &manifest.loops {
            if !seen.insert(&lp.id) {
                return Err(ManifestError::DuplicateLoop(lp.id.clone()));
            }
        }

        Ok(manifest)
    }
}
