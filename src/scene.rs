//! Scene composition: particle field generation and the static ornament.
//!
//! Everything here is built once at startup. Particle sets keep their
//! cardinality for the whole session; only the `live` positions are
//! rewritten each frame from the cached base positions.

use crate::config::{
    BASE_RADIUS, DENSITY_BIAS, SNOW_PARTICLES, SNOW_SPREAD, SPARKLE_PARTICLES, TREE_HEIGHT,
    TREE_PARTICLES,
};
use glam::Vec3;
use rand::Rng;
use std::f32::consts::TAU;

/// A fixed-size ordered set of particles. `base` is immutable after
/// generation; `live` is recomputed every frame; `seeds` decorrelate
/// per-particle oscillation phases.
#[derive(Clone)]
pub struct ParticleSet {
    pub base: Vec<Vec3>,
    pub live: Vec<Vec3>,
    pub seeds: Vec<f32>,
}

impl ParticleSet {
    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }
}

/// Falling snow. Flakes carry a fixed per-flake fall speed instead of a
/// phase seed, and wrap vertically.
#[derive(Clone)]
pub struct SnowField {
    pub positions: Vec<Vec3>,
    pub speeds: Vec<f32>,
}

impl SnowField {
    pub fn len(&self) -> usize {
        self.positions.len()
    }
}

/// One extruded five-pointed star, generated once and only rotated after
/// that. `outline` is the flat star polygon in the XY plane; the mesh is
/// the outline swept along Z by `depth`.
#[derive(Clone)]
pub struct StarMesh {
    pub outline: Vec<Vec3>,
    pub depth: f32,
    pub center: Vec3,
}

impl StarMesh {
    pub fn new(inner_r: f32, outer_r: f32, points: usize, depth: f32, center: Vec3) -> Self {
        let step = std::f32::consts::PI / points as f32;
        // Start at the top so one point faces straight up.
        let mut rot = -std::f32::consts::FRAC_PI_2;
        let mut outline = Vec::with_capacity(points * 2);
        for i in 0..points * 2 {
            let r = if i % 2 == 0 { outer_r } else { inner_r };
            outline.push(Vec3::new(rot.cos() * r, rot.sin() * r, 0.0));
            rot += step;
        }
        Self {
            outline,
            depth,
            center,
        }
    }
}

/// Single point light used to shade the star, plus a flat ambient term.
#[derive(Clone, Copy)]
pub struct PointLight {
    pub position: Vec3,
    pub color: [f32; 3],
    pub intensity: f32,
    pub ambient: f32,
}

/// The full renderable scene. Members are never removed during the
/// session; the update loop mutates `live` positions and the yaw fields.
#[derive(Clone)]
pub struct Scene {
    pub tree: ParticleSet,
    pub sparkle: ParticleSet,
    pub snow: SnowField,
    pub star: StarMesh,
    pub light: PointLight,
    /// Shared yaw oscillation for the tree and sparkle groups.
    pub group_yaw: f32,
    /// Independent, slower yaw for the star.
    pub star_yaw: f32,
}

impl Scene {
    pub fn generate(rng: &mut impl Rng) -> Self {
        Self {
            tree: generate_tree(rng, TREE_PARTICLES, TREE_HEIGHT, BASE_RADIUS),
            sparkle: generate_sparkle(rng, SPARKLE_PARTICLES, TREE_HEIGHT, BASE_RADIUS),
            snow: generate_snow(rng, SNOW_PARTICLES),
            star: StarMesh::new(
                0.35,
                0.75,
                5,
                0.18,
                Vec3::new(0.0, TREE_HEIGHT / 2.0 + 0.9, 0.0),
            ),
            light: PointLight {
                position: Vec3::new(0.0, 6.0, 6.0),
                color: [1.0, 0.62, 0.81],
                intensity: 0.6,
                ambient: 0.12,
            },
            group_yaw: 0.0,
            star_yaw: 0.0,
        }
    }
}

/// Conical tree body. Density is biased toward the base; the randomized
/// radial factor stays below 1 so every particle lies inside the cone of
/// the given height and base radius.
pub fn generate_tree(rng: &mut impl Rng, count: usize, height: f32, base_radius: f32) -> ParticleSet {
    let mut base = Vec::with_capacity(count);
    let mut seeds = Vec::with_capacity(count);

    for _ in 0..count {
        let t = rng.gen::<f32>().powf(DENSITY_BIAS);
        let y = t * height - height / 2.0;
        let radius = (1.0 - t) * base_radius * (0.4 + rng.gen::<f32>() * 0.6);
        let angle = rng.gen::<f32>() * TAU;
        base.push(Vec3::new(angle.cos() * radius, y, angle.sin() * radius));
        seeds.push(rng.gen::<f32>() * 1000.0);
    }

    let live = base.clone();
    ParticleSet { base, live, seeds }
}

/// Bright overlay layer. Unbiased vertical distribution and a slightly
/// tighter radial band than the tree body.
pub fn generate_sparkle(
    rng: &mut impl Rng,
    count: usize,
    height: f32,
    base_radius: f32,
) -> ParticleSet {
    let mut base = Vec::with_capacity(count);
    let mut seeds = Vec::with_capacity(count);

    for _ in 0..count {
        let t = rng.gen::<f32>();
        let y = t * height - height / 2.0;
        let radius = (1.0 - t) * base_radius * (0.3 + rng.gen::<f32>() * 0.7);
        let angle = rng.gen::<f32>() * TAU;
        base.push(Vec3::new(angle.cos() * radius, y, angle.sin() * radius));
        seeds.push(rng.gen::<f32>() * 1000.0);
    }

    let live = base.clone();
    ParticleSet { base, live, seeds }
}

/// Snow spreads over a wide square around the tree with a per-flake fall
/// speed in [0.01, 0.04) world units per 60 Hz frame.
pub fn generate_snow(rng: &mut impl Rng, count: usize) -> SnowField {
    let mut positions = Vec::with_capacity(count);
    let mut speeds = Vec::with_capacity(count);

    for _ in 0..count {
        positions.push(Vec3::new(
            (rng.gen::<f32>() - 0.5) * SNOW_SPREAD,
            rng.gen::<f32>() * 30.0 - 5.0,
            (rng.gen::<f32>() - 0.5) * SNOW_SPREAD,
        ));
        speeds.push(0.01 + rng.gen::<f32>() * 0.03);
    }

    SnowField { positions, speeds }
}
