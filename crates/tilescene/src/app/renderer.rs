use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{ImageReader, RgbaImage};
use pixels::{Error, Pixels, SurfaceTexture};
use tracing::warn;
use winit::window::Window;

use crate::geometry::{ScreenRect, Vec2};
use crate::scene::RenderTarget;

const CLEAR_COLOR: [u8; 4] = [18, 20, 26, 255];

/// `pixels` framebuffer the scene draws into. Sprites are PNG files named `<key>.png` under the
/// sprite directory; keys without an image are drawn as flat colour blocks.
pub struct FrameRenderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    width: u32,
    height: u32,
    sprites: SpriteCache,
}

impl FrameRenderer {
    pub fn new(window: Arc<Window>, sprites_dir: PathBuf) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            width: size.width,
            height: size.height,
            sprites: SpriteCache::new(sprites_dir),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn clear(&mut self) {
        for pixel in self.pixels.frame_mut().chunks_exact_mut(4) {
            pixel.copy_from_slice(&CLEAR_COLOR);
        }
    }

    pub fn present(&mut self) -> Result<(), Error> {
        self.pixels.render()
    }

    fn build_pixels(window: Arc<Window>, width: u32, height: u32) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }
}

impl RenderTarget for FrameRenderer {
    fn screen_centre(&self) -> Vec2 {
        Vec2::new(self.width as f32 / 2.0, self.height as f32 / 2.0)
    }

    fn render_sprite(&mut self, key: &str, dest: ScreenRect, mask: Option<ScreenRect>) {
        let mut frame = FrameBuffer {
            rgba: self.pixels.frame_mut(),
            width: self.width,
            height: self.height,
        };
        match self.sprites.get(key) {
            Some(image) => {
                let source = mask.unwrap_or(ScreenRect::new(0, 0, image.width() as i32, image.height() as i32));
                frame.blit_scaled(image, source, dest);
            }
            None => frame.fill_rect(dest, fallback_color(key)),
        }
    }
}

struct SpriteCache {
    dir: PathBuf,
    images: HashMap<String, Option<RgbaImage>>,
}

impl SpriteCache {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            images: HashMap::new(),
        }
    }

    /// Loads on first use. Failures are logged once and remembered.
    fn get(&mut self, key: &str) -> Option<&RgbaImage> {
        if !self.images.contains_key(key) {
            let loaded = match load_sprite(&self.dir, key) {
                Ok(image) => Some(image),
                Err(reason) => {
                    warn!(sprite_key = key, reason = %reason, "sprite_load_failed_using_fallback");
                    None
                }
            };
            self.images.insert(key.to_string(), loaded);
        }
        self.images.get(key).and_then(Option::as_ref)
    }
}

fn load_sprite(dir: &Path, key: &str) -> Result<RgbaImage, String> {
    if key.is_empty() || key.contains(['/', '\\']) || key.contains("..") {
        return Err(format!("invalid sprite key '{key}'"));
    }
    let path = dir.join(format!("{key}.png"));
    let reader = ImageReader::open(&path)
        .map_err(|error| format!("open {} failed: {error}", path.display()))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode {} failed: {error}", path.display()))?;
    Ok(decoded.to_rgba8())
}

/// Stable per-key colour so missing sprites stay distinguishable.
fn fallback_color(key: &str) -> [u8; 4] {
    let hash = key
        .bytes()
        .fold(0x811c_9dc5_u32, |hash, byte| (hash ^ byte as u32).wrapping_mul(0x0100_0193));
    let [r, g, b, _] = hash.to_le_bytes();
    [64 + r / 2, 64 + g / 2, 64 + b / 2, 255]
}

struct FrameBuffer<'a> {
    rgba: &'a mut [u8],
    width: u32,
    height: u32,
}

impl FrameBuffer<'_> {
    fn clipped(&self, dest: ScreenRect) -> Option<(i32, i32, i32, i32)> {
        if dest.width <= 0 || dest.height <= 0 {
            return None;
        }
        let left = dest.x.max(0);
        let top = dest.y.max(0);
        let right = dest.x.saturating_add(dest.width).min(self.width as i32);
        let bottom = dest.y.saturating_add(dest.height).min(self.height as i32);
        (left < right && top < bottom).then_some((left, top, right, bottom))
    }

    fn offset(&self, x: i32, y: i32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    fn fill_rect(&mut self, dest: ScreenRect, color: [u8; 4]) {
        let Some((left, top, right, bottom)) = self.clipped(dest) else {
            return;
        };
        for y in top..bottom {
            for x in left..right {
                let offset = self.offset(x, y);
                self.rgba[offset..offset + 4].copy_from_slice(&color);
            }
        }
    }

    /// Nearest-neighbour copy of `source` (clipped to the image) stretched over `dest`.
    /// Fully transparent texels are skipped.
    fn blit_scaled(&mut self, image: &RgbaImage, source: ScreenRect, dest: ScreenRect) {
        let src_left = source.x.max(0);
        let src_top = source.y.max(0);
        let src_right = source.x.saturating_add(source.width).min(image.width() as i32);
        let src_bottom = source.y.saturating_add(source.height).min(image.height() as i32);
        if src_left >= src_right || src_top >= src_bottom {
            return;
        }
        let Some((left, top, right, bottom)) = self.clipped(dest) else {
            return;
        };

        let src_w = i64::from(src_right - src_left);
        let src_h = i64::from(src_bottom - src_top);
        let dest_w = i64::from(dest.width);
        let dest_h = i64::from(dest.height);

        for y in top..bottom {
            let sy = src_top as i64 + (i64::from(y - dest.y) * src_h / dest_h).min(src_h - 1);
            for x in left..right {
                let sx = src_left as i64 + (i64::from(x - dest.x) * src_w / dest_w).min(src_w - 1);
                let texel = image.get_pixel(sx as u32, sy as u32).0;
                if texel[3] == 0 {
                    continue;
                }
                let offset = self.offset(x, y);
                self.rgba[offset..offset + 4].copy_from_slice(&texel);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn frame(width: u32, height: u32) -> Vec<u8> {
        vec![0; (width * height * 4) as usize]
    }

    fn pixel(rgba: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * width + x) * 4) as usize;
        [rgba[offset], rgba[offset + 1], rgba[offset + 2], rgba[offset + 3]]
    }

    fn checker() -> RgbaImage {
        RgbaImage::from_fn(2, 2, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        })
    }

    #[test]
    fn fill_rect_is_clipped_to_frame() {
        let mut rgba = frame(4, 4);
        let mut buffer = FrameBuffer {
            rgba: &mut rgba,
            width: 4,
            height: 4,
        };
        buffer.fill_rect(ScreenRect::new(-2, 2, 4, 10), [9, 9, 9, 255]);
        assert_eq!(pixel(&rgba, 4, 0, 2), [9, 9, 9, 255]);
        assert_eq!(pixel(&rgba, 4, 1, 3), [9, 9, 9, 255]);
        assert_eq!(pixel(&rgba, 4, 2, 2), [0, 0, 0, 0]);
        assert_eq!(pixel(&rgba, 4, 0, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn blit_scales_source_with_nearest_neighbour() {
        let mut rgba = frame(4, 4);
        let mut buffer = FrameBuffer {
            rgba: &mut rgba,
            width: 4,
            height: 4,
        };
        buffer.blit_scaled(&checker(), ScreenRect::new(0, 0, 2, 2), ScreenRect::new(0, 0, 4, 4));
        assert_eq!(pixel(&rgba, 4, 0, 0), [255, 0, 0, 255]);
        assert_eq!(pixel(&rgba, 4, 1, 1), [255, 0, 0, 255]);
        assert_eq!(pixel(&rgba, 4, 2, 0), [0, 0, 255, 255]);
        assert_eq!(pixel(&rgba, 4, 3, 3), [255, 0, 0, 255]);
    }

    #[test]
    fn blit_uses_mask_region_and_skips_transparent_texels() {
        let mut image = checker();
        image.put_pixel(1, 1, Rgba([0, 0, 0, 0]));
        let mut rgba = frame(2, 2);
        let mut buffer = FrameBuffer {
            rgba: &mut rgba,
            width: 2,
            height: 2,
        };
        buffer.blit_scaled(&image, ScreenRect::new(1, 0, 1, 2), ScreenRect::new(0, 0, 2, 2));
        assert_eq!(pixel(&rgba, 2, 1, 0), [0, 0, 255, 255]);
        assert_eq!(pixel(&rgba, 2, 0, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn sprite_cache_loads_png_and_remembers_missing_keys() {
        let temp = tempfile::tempdir().expect("temp");
        checker()
            .save(temp.path().join("checker.png"))
            .expect("save png");
        let mut cache = SpriteCache::new(temp.path().to_path_buf());

        let image = cache.get("checker").expect("loaded");
        assert_eq!(image.dimensions(), (2, 2));
        assert!(cache.get("missing").is_none());
        assert!(cache.images.contains_key("missing"));
        assert!(cache.get("../checker").is_none());
    }

    #[test]
    fn fallback_color_is_stable_and_opaque() {
        assert_eq!(fallback_color("grass"), fallback_color("grass"));
        assert_ne!(fallback_color("grass"), fallback_color("water"));
        assert_eq!(fallback_color("grass")[3], 255);
    }
}
