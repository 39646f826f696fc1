//! Colour management for slide tiles.
//!
//! Slides may embed an ICC profile describing their stored RGB values. Once
//! per slide, [`ColorTransform::build`] picks what to do with that profile
//! for the configured [`ColorMode`]; every tile read afterwards only applies
//! the precomputed transform.
//!
//! | Mode                                   | Pixels          | Tile profile        |
//! |----------------------------------------|-----------------|---------------------|
//! | `ignore`                               | unchanged       | removed             |
//! | `embed`                                | unchanged       | original, unchanged |
//! | `default` and the four rendering intents | mapped to sRGB | compact sRGB        |
//!
//! Slides without a profile get a pass-through transform in every mode.

mod transform;

pub use transform::{ColorMode, ColorTransform, SrgbConversion, SRGB_PROFILE_BYTES};
