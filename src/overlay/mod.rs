//! Colormap overlays.
//!
//! Quantitative slides (fluorescence, density maps) store a scalar intensity
//! per pixel. The viewer can ask for those intensities to be recoloured
//! through a [`ColorRamp`], normalized against the slide's precomputed
//! ceiling so a handful of saturated pixels do not compress the ramp.
//!
//! ```text
//!  tile ──► mean over channels ──► clamp [0, ceiling] ──► / ceiling ──► ramp ──► RGB
//! ```
//!
//! [`apply_colormap`] is pure. The per-slide choice of ramp lives in a
//! [`ColormapRegistry`] owned by the tile service.

mod colormap;
mod ramp;
mod registry;

pub use colormap::apply_colormap;
pub use ramp::ColorRamp;
pub use registry::ColormapRegistry;
