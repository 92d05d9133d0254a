//! Configuration for Glow Tree RS
//! Session parameters mutated by the UI plus fixed scene constants

use serde::{Deserialize, Serialize};

// ============================================================================
// Scene constants
// ============================================================================

pub const TREE_PARTICLES: usize = 9000;
pub const TREE_HEIGHT: f32 = 12.0;
pub const BASE_RADIUS: f32 = 6.5;
/// Exponent >1 biases particle density toward the base of the cone.
pub const DENSITY_BIAS: f32 = 1.2;

pub const SPARKLE_PARTICLES: usize = 600;

pub const SNOW_PARTICLES: usize = 400;
pub const SNOW_SPREAD: f32 = 40.0;
pub const SNOW_FLOOR: f32 = -8.0;
pub const SNOW_RESPAWN_MIN: f32 = 18.0;
pub const SNOW_RESPAWN_SPAN: f32 = 6.0;

// ============================================================================
// Session parameters
// ============================================================================

/// User-mutable scalars/flags, created at startup with defaults and read by
/// the update loop every frame. Color and size never affect positions;
/// sparkle intensity and rotation speed do.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize, Debug)]
pub struct SceneParams {
    pub tint: [u8; 3],
    pub size_mult: f32,
    pub sparkle_intensity: f32,
    pub rotation_speed: f32,
    pub snow_visible: bool,
}

impl Default for SceneParams {
    fn default() -> Self {
        Self {
            tint: [0xff, 0x8f, 0xbf],
            size_mult: 1.0,
            sparkle_intensity: 1.0,
            rotation_speed: 0.15,
            snow_visible: true,
        }
    }
}

impl SceneParams {
    /// Sparkle layer tint: the tree tint nudged in HSL space
    /// (saturation -0.02, lightness +0.06). Lighter than the tree except
    /// when lightness already sits against the white clamp.
    pub fn sparkle_tint(&self) -> [u8; 3] {
        offset_hsl(self.tint, -0.02, 0.06)
    }
}

// ============================================================================
// Export configuration
// ============================================================================

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ExportConfig {
    pub fps: u32,
    /// Hard cap on a single recording, in seconds.
    pub max_duration_secs: f32,
    pub screenshot_path: String,
    pub video_path: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            max_duration_secs: 600.0,
            screenshot_path: "glow_tree.png".to_string(),
            video_path: "glow_tree.webm".to_string(),
        }
    }
}

// ============================================================================
// App configuration
// ============================================================================

#[derive(Clone, Default, Serialize, Deserialize, Debug)]
pub struct AppConfig {
    pub scene: SceneParams,
    pub export: ExportConfig,
}

impl AppConfig {
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================================================
// Color helpers
// ============================================================================

pub fn rgb_to_hsl(rgb: [u8; 3]) -> (f32, f32, f32) {
    let r = rgb[0] as f32 / 255.0;
    let g = rgb[1] as f32 / 255.0;
    let b = rgb[2] as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < f32::EPSILON {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let h = if (max - r).abs() < f32::EPSILON {
        ((g - b) / d + if g < b { 6.0 } else { 0.0 }) / 6.0
    } else if (max - g).abs() < f32::EPSILON {
        ((b - r) / d + 2.0) / 6.0
    } else {
        ((r - g) / d + 4.0) / 6.0
    };

    (h, s, l)
}

pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [u8; 3] {
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);

    if s < f32::EPSILON {
        let v = (l * 255.0).round() as u8;
        return [v, v, v];
    }

    fn hue(p: f32, q: f32, mut t: f32) -> f32 {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    [
        (hue(p, q, h + 1.0 / 3.0) * 255.0).round() as u8,
        (hue(p, q, h) * 255.0).round() as u8,
        (hue(p, q, h - 1.0 / 3.0) * 255.0).round() as u8,
    ]
}

/// Shift a color in HSL space, clamping saturation and lightness to [0, 1].
pub fn offset_hsl(rgb: [u8; 3], ds: f32, dl: f32) -> [u8; 3] {
    let (h, s, l) = rgb_to_hsl(rgb);
    hsl_to_rgb(h, s + ds, l + dl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparkle_tint_is_lighter() {
        for tint in [
            [0xff, 0x8f, 0xbf],
            [0x20, 0x80, 0xff],
            [0x10, 0x10, 0x10],
            [0x00, 0xff, 0x00],
        ] {
            let params = SceneParams {
                tint,
                ..Default::default()
            };
            let (_, _, tree_l) = rgb_to_hsl(params.tint);
            let (_, _, sparkle_l) = rgb_to_hsl(params.sparkle_tint());
            assert!(
                sparkle_l > tree_l,
                "sparkle lightness {sparkle_l} must exceed tree lightness {tree_l}"
            );
        }
    }

    #[test]
    fn sparkle_tint_saturates_at_white() {
        // At or near white the +0.06 lightness shift clamps, so the
        // sparkle layer matches the tree instead of exceeding it.
        for tint in [[0xff, 0xff, 0xff], [0xfe, 0xfd, 0xfe]] {
            let params = SceneParams {
                tint,
                ..Default::default()
            };
            let (_, _, tree_l) = rgb_to_hsl(params.tint);
            let (_, _, sparkle_l) = rgb_to_hsl(params.sparkle_tint());
            assert!(sparkle_l >= tree_l);
            assert!(sparkle_l <= 1.0);
        }
    }

    #[test]
    fn hsl_round_trip() {
        for rgb in [[255, 143, 191], [0, 0, 0], [255, 255, 255], [12, 200, 99]] {
            let (h, s, l) = rgb_to_hsl(rgb);
            let back = hsl_to_rgb(h, s, l);
            for c in 0..3 {
                assert!(
                    (rgb[c] as i16 - back[c] as i16).abs() <= 1,
                    "{rgb:?} -> {back:?}"
                );
            }
        }
    }

    #[test]
    fn config_json_round_trip() {
        let mut config = AppConfig::default();
        config.scene.size_mult = 1.8;
        config.scene.sparkle_intensity = 0.3;
        config.scene.snow_visible = false;
        config.export.fps = 60;

        let json = config.to_json().unwrap();
        let back = AppConfig::from_json(&json).unwrap();
        assert_eq!(back.scene, config.scene);
        assert_eq!(back.export.fps, 60);
    }
}
