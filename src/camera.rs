use std::f64::consts::{PI, TAU};

use glam::{Mat3, Mat4, Vec3};

use crate::config::RendererConfig;

/// Orbit angle in radians for a wall-clock time: `π * now_ms / half_turn_ms`.
///
/// The angle is wrapped into `[0, 2π)` in double precision before narrowing
/// so epoch-sized timestamps keep full resolution.
pub fn orbit_angle(now_ms: f64, half_turn_ms: f64) -> f32 {
    (PI * (now_ms / half_turn_ms)).rem_euclid(TAU) as f32
}

/// Camera circling the origin around the Y axis.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    projection: Mat4,
    eye: Vec3,
    target: Vec3,
    up: Vec3,
    half_turn_ms: f64,
    fov_y: f32,
    near: f32,
    far: f32,
}

impl OrbitCamera {
    pub fn new(config: &RendererConfig, aspect: f32) -> Self {
        let mut camera = Self {
            projection: Mat4::IDENTITY,
            eye: config.camera_eye,
            target: Vec3::ZERO,
            up: Vec3::Y,
            half_turn_ms: config.orbit_half_turn_ms,
            fov_y: config.camera_fov_y,
            near: config.camera_near,
            far: config.camera_far,
        };
        camera.set_aspect(aspect);
        camera
    }

    /// Rebuilds the projection after the surface changes shape.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.projection = Mat4::perspective_rh(self.fov_y, aspect.max(0.01), self.near, self.far);
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn eye_at(&self, angle: f32) -> Vec3 {
        Mat3::from_rotation_y(angle) * self.eye
    }

    pub fn view_proj_for_angle(&self, angle: f32) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye_at(angle), self.target, self.up);
        self.projection * view
    }

    /// View-projection at wall-clock time `now_ms`.
    pub fn view_proj_at(&self, now_ms: f64) -> Mat4 {
        self.view_proj_for_angle(orbit_angle(now_ms, self.half_turn_ms))
    }
}

/// Directional light looking at the origin through an orthographic box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRig {
    pub position: Vec3,
    pub view_proj: Mat4,
}

impl LightRig {
    pub fn new(config: &RendererConfig) -> Self {
        let extent = config.light_extent;
        let projection = Mat4::orthographic_rh(
            -extent,
            extent,
            -extent,
            extent,
            config.light_near,
            config.light_far,
        );
        let view = Mat4::look_at_rh(config.light_position, Vec3::ZERO, Vec3::Y);
        Self {
            position: config.light_position,
            view_proj: projection * view,
        }
    }
}

/// Model transform placing the mesh in the world.
pub fn model_matrix(config: &RendererConfig) -> Mat4 {
    Mat4::from_translation(config.model_offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_follows_wall_clock() {
        assert_eq!(orbit_angle(0.0, 2000.0), 0.0);
        assert!((orbit_angle(1000.0, 2000.0) - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert!((orbit_angle(2000.0, 2000.0) - std::f32::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn angle_wraps_each_full_turn() {
        let a = orbit_angle(500.0, 2000.0);
        let b = orbit_angle(4500.0, 2000.0);
        assert!((a - b).abs() < 1e-5);
    }

    #[test]
    fn same_time_same_view() {
        let camera = OrbitCamera::new(&RendererConfig::default(), 16.0 / 9.0);
        let t = 1_700_000_123_456.0;
        assert_eq!(camera.view_proj_at(t), camera.view_proj_at(t));
    }

    #[test]
    fn eye_keeps_orbit_radius() {
        let camera = OrbitCamera::new(&RendererConfig::default(), 1.0);
        for step in 0..8 {
            let eye = camera.eye_at(step as f32 * 0.7);
            assert!((eye.length() - 2.0).abs() < 1e-5);
            assert!(eye.y.abs() < 1e-6);
        }
        let quarter = camera.eye_at(std::f32::consts::FRAC_PI_2);
        assert!((quarter - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn light_projects_origin_inside_clip_volume() {
        let light = LightRig::new(&RendererConfig::default());
        let clip = light.view_proj * Vec3::ZERO.extend(1.0);
        assert!(clip.x.abs() < 1e-4 && clip.y.abs() < 1e-4);
        assert!((0.0..=1.0).contains(&clip.z));
    }

    #[test]
    fn model_is_offset_translation() {
        let model = model_matrix(&RendererConfig::default());
        assert_eq!(model.w_axis.truncate(), Vec3::new(0.0, -0.5, 0.0));
    }
}
