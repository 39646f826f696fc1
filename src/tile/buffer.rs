use bytes::Bytes;
use image::DynamicImage;

/// Decoded tile pixels plus side-channel metadata carried to the encoder.
#[derive(Debug, Clone)]
pub struct Tile {
    pub image: DynamicImage,

    /// ICC profile to embed when the tile is encoded
    pub icc_profile: Option<Bytes>,
}

impl Tile {
    /// Wrap decoded pixels with no attached profile.
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            icc_profile: None,
        }
    }

    /// Attach an ICC profile.
    pub fn with_icc_profile(mut self, profile: Bytes) -> Self {
        self.icc_profile = Some(profile);
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

impl From<DynamicImage> for Tile {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}
