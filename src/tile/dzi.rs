//! Deep Zoom Image (DZI) descriptor.
//!
//! Deep Zoom numbers levels from 0 (a 1x1 image) up to full resolution at
//! `ceil(log2(max(width, height)))`, halving dimensions (rounding up) at each
//! step down.

use super::encoder::TileFormat;

/// Generate the DZI XML descriptor for a slide.
///
/// # Example Output
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Image xmlns="http://schemas.microsoft.com/deepzoom/2008"
///        TileSize="254"
///        Overlap="1"
///        Format="jpeg">
///   <Size Width="46920" Height="33600" />
/// </Image>
/// ```
pub fn generate_dzi_xml(
    width: u32,
    height: u32,
    tile_size: u32,
    overlap: u32,
    format: TileFormat,
) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Image xmlns="http://schemas.microsoft.com/deepzoom/2008"
       TileSize="{tile_size}"
       Overlap="{overlap}"
       Format="{format}">
  <Size Width="{width}" Height="{height}" />
</Image>"#
    )
}

/// Number of Deep Zoom levels for an image of the given size.
pub fn dzi_level_count(width: u32, height: u32) -> usize {
    let mut max_dim = width.max(height).max(1);
    let mut levels = 1;
    while max_dim > 1 {
        max_dim = max_dim.div_ceil(2);
        levels += 1;
    }
    levels
}

/// Dimensions of Deep Zoom `level`, or `None` past full resolution.
pub fn dzi_level_dimensions(width: u32, height: u32, level: usize) -> Option<(u32, u32)> {
    let count = dzi_level_count(width, height);
    if level >= count {
        return None;
    }

    let (mut w, mut h) = (width.max(1), height.max(1));
    for _ in level + 1..count {
        w = w.div_ceil(2);
        h = h.div_ceil(2);
    }
    Some((w, h))
}

/// Tile grid (columns, rows) of a level of the given dimensions.
pub fn tile_grid((width, height): (u32, u32), tile_size: u32) -> (u32, u32) {
    let tile_size = tile_size.max(1);
    (width.div_ceil(tile_size), height.div_ceil(tile_size))
}
