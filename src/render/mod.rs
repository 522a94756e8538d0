mod gpu;
mod pipeline;
mod shaders;

pub use gpu::Renderer;
pub use pipeline::{
    DepthBuffer, PipelineBuilder, Pipelines, ShadowMap, COLOR_DEPTH_FORMAT, SHADOW_DEPTH_FORMAT,
};
pub use shaders::{color_shader_source, shadow_shader_source, AMBIENT, SHADOW_BIAS};
