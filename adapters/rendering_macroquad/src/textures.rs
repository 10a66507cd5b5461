//! Avatar decoding and texture upload.

use image::RgbaImage;
use macroquad::{
    color::WHITE,
    math::Vec2 as MacroquadVec2,
    texture::{draw_texture_ex, DrawTextureParams, Texture2D},
};

/// GPU textures created for one decoded image.
#[derive(Clone, Copy, Debug)]
pub(crate) struct AvatarTextures {
    /// Image as downloaded, used by the side panels.
    pub(crate) square: Texture2D,
    /// Image with everything outside the inscribed circle cleared, used by tokens.
    pub(crate) round: Texture2D,
}

/// Decodes `bytes` and uploads both texture variants.
///
/// Returns `None` for undecodable data or images too large for a texture.
pub(crate) fn decode_avatar(bytes: &[u8]) -> Option<AvatarTextures> {
    let mut pixels = image::load_from_memory(bytes).ok()?.to_rgba8();
    let width = u16::try_from(pixels.width()).ok()?;
    let height = u16::try_from(pixels.height()).ok()?;

    let square = Texture2D::from_rgba8(width, height, pixels.as_raw());
    circle_mask(&mut pixels);
    let round = Texture2D::from_rgba8(width, height, pixels.as_raw());

    Some(AvatarTextures { square, round })
}

/// Clears every pixel whose centre lies outside the largest inscribed circle.
pub(crate) fn circle_mask(pixels: &mut RgbaImage) {
    let centre_x = pixels.width() as f32 / 2.0;
    let centre_y = pixels.height() as f32 / 2.0;
    let radius = centre_x.min(centre_y);
    let radius_squared = radius * radius;

    for (x, y, pixel) in pixels.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - centre_x;
        let dy = y as f32 + 0.5 - centre_y;
        if dx * dx + dy * dy > radius_squared {
            pixel.0[3] = 0;
        }
    }
}

/// Draws `texture` stretched over the square at `origin` with side `size`.
pub(crate) fn draw_stretched(texture: Texture2D, origin: glam::Vec2, size: f32) {
    draw_texture_ex(
        texture,
        origin.x,
        origin.y,
        WHITE,
        DrawTextureParams {
            dest_size: Some(MacroquadVec2::new(size, size)),
            ..DrawTextureParams::default()
        },
    );
}
