use bytemuck::{bytes_of, Pod, Zeroable};
use glam::{Mat4, Vec3};
use log::debug;

use crate::error::{RendererError, Result};

/// Byte offset of the light view-projection inside the scene buffer.
pub const LIGHT_VIEW_PROJ_OFFSET: u64 = 0;
/// Byte offset of the camera view-projection inside the scene buffer.
pub const CAMERA_VIEW_PROJ_OFFSET: u64 = 64;
/// Byte offset of the light position inside the scene buffer.
pub const LIGHT_POSITION_OFFSET: u64 = 128;

pub const SCENE_UNIFORM_SIZE: u64 = std::mem::size_of::<SceneUniforms>() as u64;
pub const MODEL_UNIFORM_SIZE: u64 = std::mem::size_of::<ModelUniforms>() as u64;
pub const ROTATION_UNIFORM_SIZE: u64 = std::mem::size_of::<RotationUniform>() as u64;

/// Uniform buffer offsets must sit on 16-byte boundaries.
pub const UNIFORM_ALIGNMENT: u64 = 16;

const _: () = {
    assert!(SCENE_UNIFORM_SIZE == 144);
    assert!(LIGHT_VIEW_PROJ_OFFSET % UNIFORM_ALIGNMENT == 0);
    assert!(CAMERA_VIEW_PROJ_OFFSET % UNIFORM_ALIGNMENT == 0);
    assert!(LIGHT_POSITION_OFFSET % UNIFORM_ALIGNMENT == 0);
    assert!(ROTATION_UNIFORM_SIZE % UNIFORM_ALIGNMENT == 0);
};

/// Scene buffer contents: light matrix, camera matrix, padded light position.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneUniforms {
    pub light_view_proj: [[f32; 4]; 4],
    pub camera_view_proj: [[f32; 4]; 4],
    pub light_position: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ModelUniforms {
    pub model: [[f32; 4]; 4],
}

/// `{degree, axis}` followed by padding up to 16 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RotationUniform {
    pub degree: f32,
    pub axis: f32,
    _padding: [f32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RotationAxis {
    #[default]
    X,
    Y,
    Z,
}

impl RotationAxis {
    pub const NAMES: [&'static str; 3] = ["x", "y", "z"];

    /// Encoding consumed by the colour shader: 0 = X, 1 = Y, 2 = Z.
    pub fn code(self) -> f32 {
        match self {
            Self::X => 0.0,
            Self::Y => 1.0,
            Self::Z => 2.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "x" | "X" => Some(Self::X),
            "y" | "Y" => Some(Self::Y),
            "z" | "Z" => Some(Self::Z),
            _ => None,
        }
    }
}

/// Interactive model rotation applied by the colour pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotationSettings {
    pub degree: f32,
    pub axis: RotationAxis,
}

impl RotationSettings {
    pub const MAX_DEGREE: f32 = 180.0;

    /// Creates settings with `degree` clamped to `[0, 180]`.
    pub fn new(degree: f32, axis: RotationAxis) -> Self {
        Self {
            degree: degree.clamp(0.0, Self::MAX_DEGREE),
            axis,
        }
    }

    pub fn to_uniform(self) -> RotationUniform {
        RotationUniform {
            degree: self.degree,
            axis: self.axis.code(),
            _padding: [0.0; 2],
        }
    }

    /// World-space rotation matching the colour shader's transform.
    pub fn matrix(self) -> Mat4 {
        let angle = self.degree.to_radians();
        match self.axis {
            RotationAxis::X => Mat4::from_rotation_x(angle),
            RotationAxis::Y => Mat4::from_rotation_y(angle),
            RotationAxis::Z => Mat4::from_rotation_z(angle),
        }
    }
}

/// Uniform buffers written by [`UniformState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformSlot {
    Scene,
    Model,
    Rotation,
}

impl UniformSlot {
    pub const ALL: [UniformSlot; 3] = [Self::Scene, Self::Model, Self::Rotation];

    pub fn size(self) -> u64 {
        match self {
            Self::Scene => SCENE_UNIFORM_SIZE,
            Self::Model => MODEL_UNIFORM_SIZE,
            Self::Rotation => ROTATION_UNIFORM_SIZE,
        }
    }
}

/// Destination for uniform bytes: GPU buffers or a host mirror.
pub trait UniformSink {
    fn write_uniform(&mut self, slot: UniformSlot, offset: u64, bytes: &[u8]);
}

/// CPU-side copy of the uniform data and the only writer of the uniform buffers.
///
/// Not thread-safe: settings changes must reach it on the frame loop's thread.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformState {
    scene: SceneUniforms,
    model: ModelUniforms,
    rotation: RotationSettings,
    light_written: bool,
    model_written: bool,
}

impl Default for UniformState {
    fn default() -> Self {
        Self::new()
    }
}

impl UniformState {
    pub fn new() -> Self {
        let identity = Mat4::IDENTITY.to_cols_array_2d();
        Self {
            scene: SceneUniforms {
                light_view_proj: identity,
                camera_view_proj: identity,
                light_position: [0.0; 4],
            },
            model: ModelUniforms { model: identity },
            rotation: RotationSettings::default(),
            light_written: false,
            model_written: false,
        }
    }

    pub fn scene(&self) -> &SceneUniforms {
        &self.scene
    }

    pub fn model(&self) -> &ModelUniforms {
        &self.model
    }

    pub fn rotation(&self) -> RotationSettings {
        self.rotation
    }

    /// Writes the camera matrix; the rest of the scene buffer is untouched.
    pub fn set_camera<S: UniformSink + ?Sized>(&mut self, sink: &mut S, view_proj: Mat4) {
        self.scene.camera_view_proj = view_proj.to_cols_array_2d();
        sink.write_uniform(
            UniformSlot::Scene,
            CAMERA_VIEW_PROJ_OFFSET,
            bytes_of(&self.scene.camera_view_proj),
        );
    }

    /// Writes the light matrix and position. May only be called once.
    pub fn set_light<S: UniformSink + ?Sized>(
        &mut self,
        sink: &mut S,
        view_proj: Mat4,
        position: Vec3,
    ) -> Result<()> {
        if self.light_written {
            return Err(RendererError::UniformAlreadyWritten("light"));
        }
        self.scene.light_view_proj = view_proj.to_cols_array_2d();
        self.scene.light_position = position.extend(0.0).to_array();
        sink.write_uniform(
            UniformSlot::Scene,
            LIGHT_VIEW_PROJ_OFFSET,
            bytes_of(&self.scene.light_view_proj),
        );
        sink.write_uniform(
            UniformSlot::Scene,
            LIGHT_POSITION_OFFSET,
            bytes_of(&self.scene.light_position),
        );
        self.light_written = true;
        Ok(())
    }

    /// Writes the model matrix. May only be called once.
    pub fn set_model<S: UniformSink + ?Sized>(&mut self, sink: &mut S, matrix: Mat4) -> Result<()> {
        if self.model_written {
            return Err(RendererError::UniformAlreadyWritten("model"));
        }
        self.model.model = matrix.to_cols_array_2d();
        sink.write_uniform(UniformSlot::Model, 0, bytes_of(&self.model));
        self.model_written = true;
        Ok(())
    }

    pub fn set_rotation<S: UniformSink + ?Sized>(&mut self, sink: &mut S, settings: RotationSettings) {
        self.rotation = RotationSettings::new(settings.degree, settings.axis);
        debug!(
            "rotation set to {} degrees about {}",
            self.rotation.degree,
            self.rotation.axis.name()
        );
        sink.write_uniform(UniformSlot::Rotation, 0, bytes_of(&self.rotation.to_uniform()));
    }
}

/// Host memory standing in for the three uniform buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct HostUniforms {
    scene: Vec<u8>,
    model: Vec<u8>,
    rotation: Vec<u8>,
    writes: Vec<(UniformSlot, u64, usize)>,
}

impl Default for HostUniforms {
    fn default() -> Self {
        Self {
            scene: vec![0; SCENE_UNIFORM_SIZE as usize],
            model: vec![0; MODEL_UNIFORM_SIZE as usize],
            rotation: vec![0; ROTATION_UNIFORM_SIZE as usize],
            writes: Vec::new(),
        }
    }
}

impl HostUniforms {
    pub fn bytes(&self, slot: UniformSlot) -> &[u8] {
        match slot {
            UniformSlot::Scene => &self.scene,
            UniformSlot::Model => &self.model,
            UniformSlot::Rotation => &self.rotation,
        }
    }

    /// Every write as `(slot, offset, length)`, oldest first.
    pub fn writes(&self) -> &[(UniformSlot, u64, usize)] {
        &self.writes
    }

    /// Reads back the `{degree, axis}` payload of the rotation buffer.
    pub fn rotation_payload(&self) -> [f32; 2] {
        let uniform: RotationUniform = bytemuck::pod_read_unaligned(&self.rotation);
        [uniform.degree, uniform.axis]
    }

    fn slot_mut(&mut self, slot: UniformSlot) -> &mut Vec<u8> {
        match slot {
            UniformSlot::Scene => &mut self.scene,
            UniformSlot::Model => &mut self.model,
            UniformSlot::Rotation => &mut self.rotation,
        }
    }
}

impl UniformSink for HostUniforms {
    fn write_uniform(&mut self, slot: UniformSlot, offset: u64, bytes: &[u8]) {
        let start = offset as usize;
        let buffer = self.slot_mut(slot);
        assert!(
            start + bytes.len() <= buffer.len(),
            "uniform write past end of {slot:?} buffer"
        );
        buffer[start..start + bytes.len()].copy_from_slice(bytes);
        self.writes.push((slot, offset, bytes.len()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix_at(bytes: &[u8], offset: usize) -> Mat4 {
        let cols: [f32; 16] = bytemuck::pod_read_unaligned(&bytes[offset..offset + 64]);
        Mat4::from_cols_array(&cols)
    }

    #[test]
    fn scene_layout_offsets() {
        let mut state = UniformState::new();
        let mut host = HostUniforms::default();
        let light = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let camera = Mat4::from_scale(Vec3::splat(4.0));
        state
            .set_light(&mut host, light, Vec3::new(50.0, 100.0, -100.0))
            .unwrap();
        state.set_camera(&mut host, camera);

        let scene = host.bytes(UniformSlot::Scene);
        assert_eq!(matrix_at(scene, 0), light);
        assert_eq!(matrix_at(scene, 64), camera);
        let position: [f32; 4] = bytemuck::pod_read_unaligned(&scene[128..144]);
        assert_eq!(position, [50.0, 100.0, -100.0, 0.0]);
        assert_eq!(bytes_of(state.scene()), scene);
    }

    #[test]
    fn light_and_model_are_write_once() {
        let mut state = UniformState::new();
        let mut host = HostUniforms::default();
        state.set_light(&mut host, Mat4::IDENTITY, Vec3::ONE).unwrap();
        state.set_model(&mut host, Mat4::IDENTITY).unwrap();
        assert!(matches!(
            state.set_light(&mut host, Mat4::IDENTITY, Vec3::ONE),
            Err(RendererError::UniformAlreadyWritten("light"))
        ));
        assert!(matches!(
            state.set_model(&mut host, Mat4::IDENTITY),
            Err(RendererError::UniformAlreadyWritten("model"))
        ));
    }

    #[test]
    fn camera_write_touches_only_its_range() {
        let mut state = UniformState::new();
        let mut host = HostUniforms::default();
        state.set_camera(&mut host, Mat4::IDENTITY);
        assert_eq!(host.writes(), &[(UniformSlot::Scene, 64, 64)]);
    }

    #[test]
    fn rotation_payload_encodes_axis() {
        let mut state = UniformState::new();
        let mut host = HostUniforms::default();
        state.set_rotation(&mut host, RotationSettings::new(90.0, RotationAxis::Y));
        assert_eq!(host.rotation_payload(), [90.0, 1.0]);
        state.set_rotation(&mut host, RotationSettings::new(400.0, RotationAxis::Z));
        assert_eq!(host.rotation_payload(), [180.0, 2.0]);
    }

    #[test]
    fn axis_names_round_trip() {
        for axis in [RotationAxis::X, RotationAxis::Y, RotationAxis::Z] {
            assert_eq!(RotationAxis::from_name(axis.name()), Some(axis));
        }
        assert_eq!(RotationAxis::from_name("w"), None);
    }
}
