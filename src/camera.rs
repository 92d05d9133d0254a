//! Perspective orbit camera for the tree scene.
//!
//! Right-handed system; the camera orbits a target point and looks at it.
//! Drag adjusts yaw/pitch, scroll adjusts distance within a clamped range.

use glam::{Mat4, Vec3};

const MIN_DISTANCE: f32 = 8.0;
const MAX_DISTANCE: f32 = 40.0;
const MAX_PITCH: f32 = 1.45;

#[derive(Clone)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    viewport: (f32, f32),
}

impl OrbitCamera {
    /// Default view: eye at roughly (0, 6, 18) looking at the origin.
    pub fn new(width: f32, height: f32) -> Self {
        let distance = (6.0f32 * 6.0 + 18.0 * 18.0).sqrt();
        Self {
            target: Vec3::ZERO,
            yaw: std::f32::consts::FRAC_PI_2,
            pitch: (6.0f32 / distance).asin(),
            distance,
            fov_y: 50f32.to_radians(),
            near: 0.1,
            far: 1000.0,
            viewport: (width.max(1.0), height.max(1.0)),
        }
    }

    /// Reapply viewport dimensions; the aspect ratio follows automatically.
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport = (width.max(1.0), height.max(1.0));
    }

    pub fn aspect(&self) -> f32 {
        self.viewport.0 / self.viewport.1
    }

    pub fn eye(&self) -> Vec3 {
        let cp = self.pitch.cos();
        self.target
            + Vec3::new(
                self.yaw.cos() * cp,
                self.pitch.sin(),
                self.yaw.sin() * cp,
            ) * self.distance
    }

    pub fn orbit(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * 0.008;
        self.pitch = (self.pitch + dy * 0.008).clamp(-MAX_PITCH, MAX_PITCH);
    }

    pub fn zoom(&mut self, scroll: f32) {
        self.distance = (self.distance * (1.0 - scroll * 0.001)).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    pub fn view_projection(&self) -> Mat4 {
        let proj = Mat4::perspective_rh(self.fov_y, self.aspect().max(1e-6), self.near, self.far);
        let view = Mat4::look_at_rh(self.eye(), self.target, Vec3::Y);
        proj * view
    }

    /// Project a world point to viewport pixels. Returns the screen position
    /// and the view depth; points at or behind the eye plane are culled.
    pub fn project(&self, world: Vec3) -> Option<(egui::Pos2, f32)> {
        let clip = self.view_projection() * world.extend(1.0);
        if clip.w <= self.near {
            return None;
        }
        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        let (w, h) = self.viewport;
        Some((
            egui::Pos2::new((ndc_x * 0.5 + 0.5) * w, (1.0 - (ndc_y * 0.5 + 0.5)) * h),
            clip.w,
        ))
    }

    /// Screen-space radius of a sphere of `world_size` diameter at `depth`.
    pub fn point_radius(&self, world_size: f32, depth: f32) -> f32 {
        let proj_scale = 0.5 * self.viewport.1 / (self.fov_y * 0.5).tan();
        (world_size * 0.5 * proj_scale / depth.max(1e-3)).max(0.3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_visible_point_inside_viewport() {
        let cam = OrbitCamera::new(1280.0, 720.0);
        let (pos, depth) = cam.project(Vec3::ZERO).expect("origin must be visible");
        assert!(pos.x > 0.0 && pos.x < 1280.0);
        assert!(pos.y > 0.0 && pos.y < 720.0);
        assert!(depth > 0.0);
    }

    #[test]
    fn culls_point_behind_eye() {
        let cam = OrbitCamera::new(800.0, 600.0);
        let behind = cam.eye() + (cam.eye() - cam.target).normalize() * 5.0;
        assert!(cam.project(behind).is_none());
    }

    #[test]
    fn resize_changes_aspect() {
        let mut cam = OrbitCamera::new(1200.0, 600.0);
        assert!((cam.aspect() - 2.0).abs() < 1e-6);
        cam.set_viewport(600.0, 600.0);
        assert!((cam.aspect() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zoom_stays_clamped() {
        let mut cam = OrbitCamera::new(800.0, 600.0);
        for _ in 0..10_000 {
            cam.zoom(120.0);
        }
        assert!(cam.distance >= MIN_DISTANCE);
        for _ in 0..10_000 {
            cam.zoom(-120.0);
        }
        assert!(cam.distance <= MAX_DISTANCE);
    }

    #[test]
    fn nearer_points_draw_larger() {
        let cam = OrbitCamera::new(800.0, 600.0);
        assert!(cam.point_radius(1.0, 5.0) > cam.point_radius(1.0, 20.0));
    }
}
