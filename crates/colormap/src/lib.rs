//! Pure-function RGBA lookup tables mapping a wire uint16 elevation value
//! (plus a water level, in flood mode) to an 8-bit color.

use inf::Color;

pub const LUT_LEN: usize = 1 << 16;

const WATER: Color = Color::rgba(70, 130, 180, 230);
const OCEAN: Color = Color::rgba(70, 130, 180, 255);

const SAFE: Color = Color::rgba(76, 175, 80, 120);
const CAUTION: Color = Color::rgba(255, 193, 7, 160);
const DANGER: Color = Color::rgba(244, 67, 54, 200);
const FLOODED: Color = Color::rgba(33, 150, 243, 220);

/// `(elevation_m, color)` hypsometric stops for topographic mode, low to high.
const TOPO_STOPS: [(f64, Color); 15] = [
    (0.0, Color::rgba(40, 120, 60, 255)),
    (5.0, Color::rgba(86, 150, 70, 255)),
    (15.0, Color::rgba(130, 175, 85, 255)),
    (30.0, Color::rgba(170, 195, 110, 255)),
    (60.0, Color::rgba(205, 200, 120, 255)),
    (100.0, Color::rgba(220, 195, 130, 255)),
    (150.0, Color::rgba(210, 175, 120, 255)),
    (250.0, Color::rgba(190, 150, 105, 255)),
    (400.0, Color::rgba(165, 125, 95, 255)),
    (700.0, Color::rgba(145, 110, 90, 255)),
    (1200.0, Color::rgba(140, 120, 115, 255)),
    (2000.0, Color::rgba(150, 145, 145, 255)),
    (3000.0, Color::rgba(175, 175, 175, 255)),
    (4500.0, Color::rgba(210, 210, 210, 255)),
    (6500.0, Color::rgba(255, 255, 255, 255)),
];

const TOPO_COMPRESS_SCALE: f64 = 120.0;
const TOPO_COMPRESS_MAX: f64 = 6500.0;

/// The rendering mode a LUT is built for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    /// Parameter-free absolute topographic coloring.
    Topographic,
    /// Flood-risk coloring relative to a water level, quantized to 0.1 m.
    Flood { water_level_quantum: f64 },
}

/// A 65,536-entry RGBA lookup table, indexed directly by wire uint16 value.
pub struct Lut(Box<[Color; LUT_LEN]>);

impl Lut {
    pub fn build(mode: Mode) -> Self {
        let mut table = Box::new([Color::TRANSPARENT; LUT_LEN]);
        for (u, slot) in table.iter_mut().enumerate() {
            let elevation = tile_codec::decode_value(u as u16);
            *slot = match mode {
                Mode::Topographic => topographic_color(elevation),
                Mode::Flood { water_level_quantum } => flood_color(elevation, water_level_quantum),
            };
        }
        Lut(table)
    }

    pub fn get(&self, wire_value: u16) -> Color {
        self.0[wire_value as usize]
    }
}

fn topographic_color(elevation: Option<f64>) -> Color {
    let e = match elevation {
        None => return OCEAN,
        Some(e) if e < 0.0 => return OCEAN,
        Some(e) => e,
    };

    let clamped = e.clamp(0.0, TOPO_COMPRESS_MAX);
    let t = asinh(clamped / TOPO_COMPRESS_SCALE) / asinh(TOPO_COMPRESS_MAX / TOPO_COMPRESS_SCALE);
    let target = t * TOPO_COMPRESS_MAX;

    for window in TOPO_STOPS.windows(2) {
        let (e0, c0) = window[0];
        let (e1, c1) = window[1];
        if target <= e1 || (e1 - target).abs() < f64::EPSILON {
            let span = e1 - e0;
            let local_t = if span > 0.0 { (target - e0) / span } else { 0.0 };
            return Color::lerp(c0, c1, local_t);
        }
    }

    TOPO_STOPS.last().unwrap().1
}

fn asinh(x: f64) -> f64 {
    (x + (x * x + 1.0).sqrt()).ln()
}

fn flood_color(elevation: Option<f64>, water_level: f64) -> Color {
    let e = match elevation {
        None => return WATER,
        Some(e) => e,
    };

    let r = e - water_level;
    if r >= 5.0 {
        Color::TRANSPARENT
    } else if r >= 2.0 {
        Color::lerp(SAFE, CAUTION, (5.0 - r) / 3.0)
    } else if r >= 0.5 {
        Color::lerp(CAUTION, DANGER, (2.0 - r) / 1.5)
    } else if r >= -0.5 {
        Color::lerp(DANGER, FLOODED, (0.5 - r) / 1.0)
    } else {
        FLOODED
    }
}

/// Quantizes a water level to the 0.1 m grid used as the Lut/cache key.
pub fn quantize_water_level(water_level_m: f64) -> f64 {
    (water_level_m * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn nodata_maps_to_water_in_flood_mode() {
        let lut = Lut::build(Mode::Flood { water_level_quantum: 1.0 });
        assert_eq!(lut.get(tile_codec::NODATA_U16), WATER);
    }

    #[test]
    fn nodata_maps_to_ocean_in_topographic_mode() {
        let lut = Lut::build(Mode::Topographic);
        assert_eq!(lut.get(tile_codec::NODATA_U16), OCEAN);
    }

    #[test]
    fn quantize_snaps_to_tenth_of_meter() {
        assert_relative_eq!(quantize_water_level(1.23), 1.2);
        assert_relative_eq!(quantize_water_level(1.27), 1.3);
    }

    #[test]
    fn flood_mode_far_above_water_is_transparent() {
        let lut = Lut::build(Mode::Flood { water_level_quantum: 0.0 });
        let u = tile_codec::encode_value(10);
        assert_eq!(lut.get(u).a, 0);
    }

    #[test]
    fn flood_mode_well_below_water_is_flooded_color() {
        let lut = Lut::build(Mode::Flood { water_level_quantum: 5.0 });
        let u = tile_codec::encode_value(0);
        assert_eq!(lut.get(u), FLOODED);
    }

    #[test]
    fn topographic_same_input_is_byte_identical() {
        let a = Lut::build(Mode::Topographic);
        let b = Lut::build(Mode::Topographic);
        for u in (0..LUT_LEN as u32).step_by(997) {
            assert_eq!(a.get(u as u16), b.get(u as u16));
        }
    }

    #[test]
    fn topographic_below_sea_level_is_ocean() {
        let lut = Lut::build(Mode::Topographic);
        let u = tile_codec::encode_value(-10);
        assert_eq!(lut.get(u), OCEAN);
    }
}
