//! RGBA color primitive shared by the colormap LUT builders.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color::rgba(r, g, b, 255)
    }

    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    /// Packs the color as little-endian RGBA bytes, the layout used by the `png` crate's RGBA8 buffer.
    pub fn to_le_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Linearly interpolates between two colors, including alpha. `t` is clamped to `[0, 1]`.
    pub fn lerp(a: Color, b: Color, t: f64) -> Color {
        let t = t.clamp(0.0, 1.0);
        let lerp_channel = |x: u8, y: u8| -> u8 { (x as f64 + (y as f64 - x as f64) * t).round() as u8 };
        Color::rgba(
            lerp_channel(a.r, b.r),
            lerp_channel(a.g, b.g),
            lerp_channel(a.b, b.b),
            lerp_channel(a.a, b.a),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_endpoints() {
        let a = Color::rgba(0, 0, 0, 0);
        let b = Color::rgba(255, 255, 255, 255);
        assert_eq!(Color::lerp(a, b, 0.0), a);
        assert_eq!(Color::lerp(a, b, 1.0), b);
    }

    #[test]
    fn lerp_midpoint() {
        let a = Color::rgba(0, 0, 0, 255);
        let b = Color::rgba(100, 0, 0, 255);
        assert_eq!(Color::lerp(a, b, 0.5).r, 50);
    }
}
