//! Texture loading

use std::sync::atomic::{AtomicBool, Ordering};

use image::{DynamicImage, GenericImageView};

use super::TextureId;

/// Decoded RGBA8 image referenced by a material's map
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    pub name: String,
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
    disposed: AtomicBool,
}

impl Texture {
    /// Create from tightly packed RGBA8 pixels
    pub fn from_rgba8(name: &str, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            id: TextureId::next(),
            name: name.to_string(),
            width,
            height,
            data,
            disposed: AtomicBool::new(false),
        }
    }

    /// Decode an encoded image (PNG, JPEG)
    pub fn from_bytes(bytes: &[u8], name: &str) -> Result<Self, image::ImageError> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_image(img, name))
    }

    /// Create texture from image
    pub fn from_image(img: DynamicImage, name: &str) -> Self {
        let (width, height) = img.dimensions();
        Self::from_rgba8(name, width, height, img.to_rgba8().into_raw())
    }

    /// Create a solid color texture
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self::from_rgba8(name, 1, 1, color.to_vec())
    }

    /// Create a default white texture
    pub fn white() -> Self {
        Self::solid_color([255, 255, 255, 255], "white")
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Flag the texture as disposed. Returns false if it already was.
    pub(crate) fn mark_disposed(&self) -> bool {
        !self.disposed.swap(true, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_bytes() {
        let mut png = Vec::new();
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            2,
            3,
            image::Rgb([10, 20, 30]),
        ));
        img.write_to(
            &mut std::io::Cursor::new(&mut png),
            image::ImageOutputFormat::Png,
        )
        .unwrap();

        let texture = Texture::from_bytes(&png, "test").unwrap();
        assert_eq!((texture.width, texture.height), (2, 3));
        assert_eq!(texture.data().len(), 2 * 3 * 4);
        assert_eq!(&texture.data()[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(Texture::from_bytes(b"not an image", "bad").is_err());
    }
}
