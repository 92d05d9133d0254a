//! Per-frame procedural animation.
//!
//! Tree and sparkle live positions are pure functions of the cached base
//! positions, the per-particle seed, the elapsed time and the current
//! session parameters. Snow is the one stateful set: flakes fall by their
//! fixed speed scaled by the frame delta and wrap vertically.

use crate::config::{SceneParams, SNOW_FLOOR, SNOW_RESPAWN_MIN, SNOW_RESPAWN_SPAN, TREE_HEIGHT};
use crate::scene::{ParticleSet, Scene, SnowField};
use rand::Rng;
use rayon::prelude::*;

const SWAY_AMPLITUDE: f32 = 0.08;
const SWAY_FREQ: f32 = 0.8;
const SWAY_PHASE_SCALE: f32 = 0.01;
const BOB_AMPLITUDE: f32 = 0.06;
const BOB_FREQ: f32 = 1.2;
const BOB_PHASE_SCALE: f32 = 0.02;
const DEPTH_AMPLITUDE: f32 = 0.06;
const DEPTH_FREQ: f32 = 0.9;
const DEPTH_PHASE_SCALE: f32 = 0.015;
const SPARKLE_AMPLITUDE: f32 = 0.12;

/// Baseline motion persists even at zero sparkle intensity.
#[inline]
pub fn intensity_blend(sparkle_intensity: f32) -> f32 {
    0.6 + 0.4 * sparkle_intensity
}

/// Wind-like sway and bob over the tree body. Particles higher up sway
/// more; particles near the vertical center bob more. Runs in parallel
/// over the full set.
pub fn update_tree(tree: &mut ParticleSet, t: f32, params: &SceneParams) {
    let blend = intensity_blend(params.sparkle_intensity);

    let base = &tree.base;
    let seeds = &tree.seeds;
    tree.live
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, live)| {
            let b = base[i];
            let seed = seeds[i];

            let sway = SWAY_AMPLITUDE * (t * SWAY_FREQ + seed * SWAY_PHASE_SCALE).sin() * blend;
            let bob = BOB_AMPLITUDE * (t * BOB_FREQ + seed * BOB_PHASE_SCALE).sin() * blend;

            live.x = b.x + sway * (1.0 + b.y / TREE_HEIGHT);
            live.y = b.y + bob * (1.0 - b.y.abs() / TREE_HEIGHT);
            live.z = b.z + DEPTH_AMPLITUDE * (t * DEPTH_FREQ + seed * DEPTH_PHASE_SCALE).cos();
        });
}

/// Vertical shimmer on the sparkle layer. Unlike the tree this uses the
/// raw intensity, both as frequency and amplitude scale; horizontal
/// coordinates stay at base.
pub fn update_sparkle(sparkle: &mut ParticleSet, t: f32, params: &SceneParams) {
    let k = params.sparkle_intensity;

    for (i, live) in sparkle.live.iter_mut().enumerate() {
        let b = sparkle.base[i];
        live.x = b.x;
        live.z = b.z;
        live.y = b.y + SPARKLE_AMPLITUDE * (t * 3.0 * k + sparkle.seeds[i] * 0.1).sin() * k;
    }
}

/// Advance snow by the wall-clock delta, normalized so the configured
/// per-flake speed corresponds to one 60 Hz frame. Flakes that pass the
/// floor respawn in a band above the scene, so after any step no flake
/// sits below the floor.
pub fn advance_snow(snow: &mut SnowField, dt: f32, rng: &mut impl Rng) {
    for (pos, &speed) in snow.positions.iter_mut().zip(&snow.speeds) {
        pos.y -= speed * dt * 60.0;
        if pos.y < SNOW_FLOOR {
            pos.y = SNOW_RESPAWN_MIN + rng.gen::<f32>() * SNOW_RESPAWN_SPAN;
        }
    }
}

/// Shared slow yaw oscillation for the tree and sparkle groups.
#[inline]
pub fn group_yaw(t: f32, rotation_speed: f32) -> f32 {
    (t * rotation_speed).sin() * 0.08
}

/// Independent, slower star yaw.
#[inline]
pub fn star_yaw(t: f32) -> f32 {
    0.2 * (t * 0.9).sin()
}

/// One full animation step: recompute all live positions and group yaws
/// for elapsed time `t`, stepping snow by `dt`. Snow keeps falling while
/// hidden; the visibility flag only gates drawing, so toggling it back on
/// shows a simulation that never paused.
pub fn step(scene: &mut Scene, t: f32, dt: f32, params: &SceneParams, rng: &mut impl Rng) {
    update_tree(&mut scene.tree, t, params);
    update_sparkle(&mut scene.sparkle, t, params);
    advance_snow(&mut scene.snow, dt, rng);
    scene.group_yaw = group_yaw(t, params.rotation_speed);
    scene.star_yaw = star_yaw(t);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{generate_snow, generate_sparkle, generate_tree};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params_with_intensity(sparkle_intensity: f32) -> SceneParams {
        SceneParams {
            sparkle_intensity,
            ..Default::default()
        }
    }

    #[test]
    fn displacement_from_base_is_bounded() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut tree = generate_tree(&mut rng, 2000, 12.0, 6.5);
        let mut sparkle = generate_sparkle(&mut rng, 600, 12.0, 6.5);

        // Maximum intensity, worst-case scaling.
        let params = params_with_intensity(3.0);
        for step in 0..200 {
            let t = step as f32 * 0.37;
            update_tree(&mut tree, t, &params);
            update_sparkle(&mut sparkle, t, &params);

            for (live, base) in tree.live.iter().zip(&tree.base) {
                let d = *live - *base;
                assert!(d.x.abs() <= 0.5 && d.y.abs() <= 0.5 && d.z.abs() <= 0.5, "{d:?}");
            }
            for (live, base) in sparkle.live.iter().zip(&sparkle.base) {
                let d = *live - *base;
                assert!(d.x == 0.0 && d.z == 0.0, "sparkle must only move vertically");
                assert!(d.y.abs() <= 0.5, "{d:?}");
            }
        }
    }

    #[test]
    fn update_is_idempotent_for_fixed_time() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tree = generate_tree(&mut rng, 500, 12.0, 6.5);
        let mut sparkle = generate_sparkle(&mut rng, 100, 12.0, 6.5);
        let params = params_with_intensity(1.3);

        update_tree(&mut tree, 5.5, &params);
        update_sparkle(&mut sparkle, 5.5, &params);
        let tree_first = tree.live.clone();
        let sparkle_first = sparkle.live.clone();

        update_tree(&mut tree, 5.5, &params);
        update_sparkle(&mut sparkle, 5.5, &params);
        assert_eq!(tree.live, tree_first);
        assert_eq!(sparkle.live, sparkle_first);
    }

    #[test]
    fn snow_keeps_falling_while_hidden() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut scene = crate::scene::Scene::generate(&mut rng);
        let params = SceneParams {
            snow_visible: false,
            ..Default::default()
        };

        let before = scene.snow.positions.clone();
        step(&mut scene, 1.0, 1.0 / 60.0, &params, &mut rng);
        let moved = scene
            .snow
            .positions
            .iter()
            .zip(&before)
            .filter(|(after, before)| after.y != before.y)
            .count();
        assert_eq!(moved, scene.snow.len(), "hidden snow must not pause");
    }

    #[test]
    fn snow_zero_dt_is_noop() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut snow = generate_snow(&mut rng, 400);
        let before = snow.positions.clone();
        advance_snow(&mut snow, 0.0, &mut rng);
        assert_eq!(snow.positions, before);
    }

    #[test]
    fn snow_wraps_at_floor() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut snow = generate_snow(&mut rng, 400);

        // Drive every flake toward the floor and check the wrap law after
        // each step: no flake ever rests below the floor, and respawns land
        // in the band above the scene.
        for _ in 0..20_000 {
            let prev: Vec<f32> = snow.positions.iter().map(|p| p.y).collect();
            advance_snow(&mut snow, 1.0 / 60.0, &mut rng);
            for (i, p) in snow.positions.iter().enumerate() {
                assert!(p.y >= SNOW_FLOOR, "flake {i} rests below the floor: {}", p.y);
                if p.y > prev[i] {
                    // Only a wrap can move a flake upward.
                    assert!(
                        (SNOW_RESPAWN_MIN..SNOW_RESPAWN_MIN + SNOW_RESPAWN_SPAN).contains(&p.y),
                        "respawn outside band: {}",
                        p.y
                    );
                }
            }
        }
    }

    #[test]
    fn zero_intensity_keeps_baseline_sway() {
        let mut rng = StdRng::seed_from_u64(31);
        let tree = generate_tree(&mut rng, 300, 12.0, 6.5);

        let mut quiet = tree.clone();
        let mut full = tree.clone();
        update_tree(&mut quiet, 2.0, &params_with_intensity(0.0));
        update_tree(&mut full, 2.0, &params_with_intensity(1.0));

        assert!((intensity_blend(0.0) - 0.6).abs() < 1e-6);

        let mut any_motion = false;
        for i in 0..tree.len() {
            let dq = quiet.live[i].x - quiet.base[i].x;
            let df = full.live[i].x - full.base[i].x;
            // The affine blend fixes the quiet/full amplitude ratio at 0.6.
            assert!((dq - df * 0.6).abs() < 1e-4, "expected 0.6x baseline, got {dq} vs {df}");
            if dq.abs() > 1e-4 {
                any_motion = true;
            }
        }
        assert!(any_motion, "baseline sway must never vanish");
    }

    #[test]
    fn group_yaw_scales_with_rotation_speed_and_stays_small() {
        for &speed in &[0.0, 0.15, 1.0] {
            for step in 0..100 {
                let t = step as f32 * 0.5;
                assert!(group_yaw(t, speed).abs() <= 0.08 + 1e-6);
                assert!(star_yaw(t).abs() <= 0.2 + 1e-6);
            }
        }
        assert_eq!(group_yaw(1.0, 0.0), 0.0);
    }
}
