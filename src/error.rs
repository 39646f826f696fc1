use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while opening slides or reading tiles from them.
#[derive(Debug, Clone, Error)]
pub enum SlideError {
    /// Bad path, unsupported or corrupt format, or a provider feature mismatch
    #[error("Unreadable slide {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },

    /// Tile level, column or row outside the pyramid
    #[error("Invalid tile coordinates: level={level}, col={col}, row={row}")]
    InvalidCoordinates { level: usize, col: u32, row: u32 },

    /// The slide's embedded colour profile could not be turned into a transform
    #[error("Color management error: {0}")]
    Color(#[from] ColorError),
}

impl SlideError {
    /// Build an `Unreadable` error for `path`.
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SlideError::Unreadable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from the colour management pipeline.
#[derive(Debug, Clone, Error)]
pub enum ColorError {
    /// Unrecognized colour mode in configuration (fatal at startup)
    #[error("Unknown color mode: {0}")]
    InvalidColorMode(String),

    /// Embedded profile could not be parsed or mapped to sRGB
    #[error("Invalid color profile: {0}")]
    Profile(String),
}

/// Errors from the colormap overlay engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    /// An empty color ramp was supplied at apply time
    #[error("Color ramp has no colors")]
    DegenerateRamp,

    /// A ramp string from a request could not be parsed
    #[error("Invalid color ramp: {0}")]
    InvalidRamp(String),

    /// Pixel layout with no scalar intensity interpretation
    #[error("Unsupported pixel layout for colormap: {0}")]
    UnsupportedPixelLayout(String),
}

/// Errors surfaced by the tile serving orchestrator.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// Path does not exist or escapes the slide root
    #[error("Slide not found: {path}")]
    NotFound { path: String },

    /// Requested tile format is not served
    #[error("Unsupported tile format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Slide(#[from] SlideError),

    #[error(transparent)]
    Overlay(#[from] OverlayError),

    /// Tile encoding failed
    #[error("Failed to encode tile: {message}")]
    Encode { message: String },

    /// A blocking worker panicked or was cancelled
    #[error("Tile worker failed: {0}")]
    Task(String),
}

impl TileError {
    /// Whether this error should be reported to a client as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TileError::NotFound { .. }
                | TileError::UnsupportedFormat(_)
                | TileError::Slide(SlideError::Unreadable { .. })
                | TileError::Slide(SlideError::InvalidCoordinates { .. })
        )
    }
}
