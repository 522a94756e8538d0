use std::f32::consts::PI;

use glam::Vec3;

/// Fixed scene parameters for the viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Edge length of the square shadow map, in texels.
    pub shadow_map_size: u32,
    pub clear_color: [f64; 4],
    pub light_position: Vec3,
    /// Half extent of the light's orthographic box on X and Y.
    pub light_extent: f32,
    pub light_near: f32,
    pub light_far: f32,
    pub camera_fov_y: f32,
    pub camera_near: f32,
    pub camera_far: f32,
    /// Eye position at orbit angle zero.
    pub camera_eye: Vec3,
    /// Milliseconds per half turn of the orbit.
    pub orbit_half_turn_ms: f64,
    pub model_offset: Vec3,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            shadow_map_size: 1024,
            clear_color: [0.5, 0.5, 0.5, 1.0],
            light_position: Vec3::new(50.0, 100.0, -100.0),
            light_extent: 80.0,
            light_near: -200.0,
            light_far: 300.0,
            camera_fov_y: 2.0 * PI / 5.0,
            camera_near: 1.0,
            camera_far: 2000.0,
            camera_eye: Vec3::new(0.0, 0.0, 2.0),
            orbit_half_turn_ms: 2000.0,
            model_offset: Vec3::new(0.0, -0.5, 0.0),
        }
    }
}
