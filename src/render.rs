//! Scene renderer for the egui preview canvas.
//!
//! Projects live particle positions through the orbit camera, depth-sorts
//! far-to-near and paints glow discs plus the star mesh. The base point
//! size follows the viewport width and is recomputed on resize.

use crate::camera::OrbitCamera;
use crate::config::SceneParams;
use crate::scene::{ParticleSet, Scene, StarMesh};
use egui::{Color32, Painter, Pos2, Rect, Stroke};
use glam::{Mat3, Vec3};

const SNOW_SIZE: f32 = 0.3;
const TREE_OPACITY: f32 = 0.95;
const SNOW_OPACITY: f32 = 0.9;

/// Base point size in world units for the tree layer, derived from the
/// viewport width so points keep their apparent weight across resizes.
pub fn base_point_size(viewport_width: f32) -> f32 {
    0.16 * viewport_width / 1200.0 + 0.9
}

struct ProjectedPoint {
    pos: Pos2,
    depth: f32,
    radius: f32,
    color: Color32,
    halo: bool,
}

pub struct SceneRenderer {
    points: Vec<ProjectedPoint>,
}

impl SceneRenderer {
    pub fn new() -> Self {
        Self {
            points: Vec::with_capacity(10_000),
        }
    }

    pub fn render(
        &mut self,
        painter: &Painter,
        rect: Rect,
        scene: &Scene,
        camera: &OrbitCamera,
        params: &SceneParams,
    ) {
        self.points.clear();

        let group_rot = Mat3::from_rotation_y(scene.group_yaw);
        let tree_size = base_point_size(rect.width()) * params.size_mult;
        let sparkle_size = (params.size_mult * 0.7).max(0.2);

        let tint = params.tint;
        let tree_color = Color32::from_rgba_unmultiplied(
            tint[0],
            tint[1],
            tint[2],
            (TREE_OPACITY * 255.0) as u8,
        );
        let sparkle_tint = params.sparkle_tint();
        let sparkle_color = Color32::from_rgba_unmultiplied(
            sparkle_tint[0],
            sparkle_tint[1],
            sparkle_tint[2],
            (TREE_OPACITY * 255.0) as u8,
        );
        let snow_color = Color32::from_rgba_unmultiplied(255, 255, 255, (SNOW_OPACITY * 255.0) as u8);

        self.collect_points(&scene.tree, group_rot, camera, rect, tree_size, tree_color, true);
        self.collect_points(
            &scene.sparkle,
            group_rot,
            camera,
            rect,
            sparkle_size,
            sparkle_color,
            true,
        );

        if params.snow_visible {
            for pos in &scene.snow.positions {
                if let Some((screen, depth)) = camera.project(*pos) {
                    self.points.push(ProjectedPoint {
                        pos: rect.min + screen.to_vec2(),
                        depth,
                        radius: camera.point_radius(SNOW_SIZE, depth),
                        color: snow_color,
                        halo: false,
                    });
                }
            }
        }

        // Far to near, so additive glow layers stack plausibly.
        self.points.sort_by(|a, b| {
            b.depth
                .partial_cmp(&a.depth)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for p in &self.points {
            if p.halo {
                let halo = Color32::from_rgba_unmultiplied(
                    p.color.r(),
                    p.color.g(),
                    p.color.b(),
                    p.color.a() / 5,
                );
                painter.circle_filled(p.pos, p.radius * 1.8, halo);
            }
            painter.circle_filled(p.pos, p.radius, p.color);
        }

        self.render_star(painter, rect, scene, camera);
    }

    #[allow(clippy::too_many_arguments)]
    fn collect_points(
        &mut self,
        set: &ParticleSet,
        rotation: Mat3,
        camera: &OrbitCamera,
        rect: Rect,
        world_size: f32,
        color: Color32,
        halo: bool,
    ) {
        for live in &set.live {
            let world = rotation * *live;
            if let Some((screen, depth)) = camera.project(world) {
                self.points.push(ProjectedPoint {
                    pos: rect.min + screen.to_vec2(),
                    depth,
                    radius: camera.point_radius(world_size, depth),
                    color,
                    halo,
                });
            }
        }
    }

    fn render_star(&self, painter: &Painter, rect: Rect, scene: &Scene, camera: &OrbitCamera) {
        let star = &scene.star;
        let rot = Mat3::from_rotation_y(scene.star_yaw);

        let front = project_face(star, rot, camera, rect, star.depth / 2.0);
        let back = project_face(star, rot, camera, rect, -star.depth / 2.0);

        let shade = star_shade(scene, rot);

        // Back face first, darker, then the lit front face over it.
        if let Some(back) = back {
            fill_fan(painter, &back, scale_color(shade, 0.55));
        }
        if let Some(front) = front {
            fill_fan(painter, &front, shade);
            // Bevel silhouette.
            let edge = scale_color(shade, 1.1);
            for i in 0..front.len() {
                painter.line_segment(
                    [front[i], front[(i + 1) % front.len()]],
                    Stroke::new(1.0, edge),
                );
            }
        }
    }
}

fn project_face(
    star: &StarMesh,
    rot: Mat3,
    camera: &OrbitCamera,
    rect: Rect,
    z: f32,
) -> Option<Vec<Pos2>> {
    let mut out = Vec::with_capacity(star.outline.len());
    for v in &star.outline {
        let world = star.center + rot * Vec3::new(v.x, v.y, z);
        let (screen, _) = camera.project(world)?;
        out.push(rect.min + screen.to_vec2());
    }
    Some(out)
}

/// The star polygon is star-shaped with respect to its centroid, so a
/// triangle fan from the centroid fills it correctly despite concavity.
fn fill_fan(painter: &Painter, outline: &[Pos2], color: Color32) {
    let n = outline.len();
    if n < 3 {
        return;
    }
    let centroid = Pos2::new(
        outline.iter().map(|p| p.x).sum::<f32>() / n as f32,
        outline.iter().map(|p| p.y).sum::<f32>() / n as f32,
    );

    let mut mesh = egui::Mesh::default();
    let center_idx = 0u32;
    mesh.colored_vertex(centroid, color);
    for p in outline {
        mesh.colored_vertex(*p, color);
    }
    for i in 0..n as u32 {
        let a = 1 + i;
        let b = 1 + (i + 1) % n as u32;
        mesh.add_triangle(center_idx, a, b);
    }
    painter.add(egui::Shape::mesh(mesh));
}

/// Ambient plus one point light, evaluated against the star's front
/// normal after its yaw rotation.
fn star_shade(scene: &Scene, rot: Mat3) -> Color32 {
    let light = scene.light;
    let normal = rot * Vec3::Z;
    let to_light = (light.position - scene.star.center).normalize_or_zero();
    let diffuse = normal.dot(to_light).max(0.0) * light.intensity;

    // Warm white base with the light color folded into the diffuse term.
    let base = [1.0, 0.95, 0.97];
    let mut rgb = [0u8; 3];
    for c in 0..3 {
        let v = base[c] * (light.ambient + diffuse * light.color[c]) + base[c] * 0.55;
        rgb[c] = (v.clamp(0.0, 1.0) * 255.0) as u8;
    }
    Color32::from_rgb(rgb[0], rgb[1], rgb[2])
}

fn scale_color(color: Color32, factor: f32) -> Color32 {
    Color32::from_rgb(
        (color.r() as f32 * factor).min(255.0) as u8,
        (color.g() as f32 * factor).min(255.0) as u8,
        (color.b() as f32 * factor).min(255.0) as u8,
    )
}

impl Default for SceneRenderer {
    fn default() -> Self {
        Self::new()
    }
}
