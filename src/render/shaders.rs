const SCENE_BINDINGS: &str = r#"
struct Scene {
    light_view_proj: mat4x4<f32>,
    camera_view_proj: mat4x4<f32>,
    light_position: vec3<f32>,
}

struct Model {
    matrix: mat4x4<f32>,
}
"#;

const SHADOW_BODY: &str = r#"
@group(0) @binding(0)
var<uniform> scene: Scene;

@group(1) @binding(0)
var<uniform> model: Model;

@vertex
fn vs_shadow(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return scene.light_view_proj * model.matrix * vec4<f32>(position, 1.0);
}
"#;

const COLOR_BODY: &str = r#"
struct Rotation {
    degree: f32,
    axis: f32,
}

@group(0) @binding(0)
var<uniform> scene: Scene;
@group(0) @binding(1)
var shadow_map: texture_depth_2d;
@group(0) @binding(2)
var shadow_sampler: sampler_comparison;

@group(1) @binding(0)
var<uniform> model: Model;

@group(2) @binding(0)
var<uniform> rotation: Rotation;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) light_pos: vec4<f32>,
    @location(1) world_pos: vec3<f32>,
    @location(2) normal: vec3<f32>,
}

fn rotation_matrix(degree: f32, axis: f32) -> mat4x4<f32> {
    let angle = radians(degree);
    let c = cos(angle);
    let s = sin(angle);
    if (axis < 0.5) {
        return mat4x4<f32>(
            vec4<f32>(1.0, 0.0, 0.0, 0.0),
            vec4<f32>(0.0, c, s, 0.0),
            vec4<f32>(0.0, -s, c, 0.0),
            vec4<f32>(0.0, 0.0, 0.0, 1.0),
        );
    }
    if (axis < 1.5) {
        return mat4x4<f32>(
            vec4<f32>(c, 0.0, -s, 0.0),
            vec4<f32>(0.0, 1.0, 0.0, 0.0),
            vec4<f32>(s, 0.0, c, 0.0),
            vec4<f32>(0.0, 0.0, 0.0, 1.0),
        );
    }
    return mat4x4<f32>(
        vec4<f32>(c, s, 0.0, 0.0),
        vec4<f32>(-s, c, 0.0, 0.0),
        vec4<f32>(0.0, 0.0, 1.0, 0.0),
        vec4<f32>(0.0, 0.0, 0.0, 1.0),
    );
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = model.matrix * vec4<f32>(input.position, 1.0);
    let rotate = rotation_matrix(rotation.degree, rotation.axis);
    let rotated = rotate * world;

    // Shadow lookup uses the pose the shadow pass rendered.
    out.light_pos = scene.light_view_proj * world;
    out.position = scene.camera_view_proj * rotated;
    out.world_pos = rotated.xyz;
    out.normal = (rotate * model.matrix * vec4<f32>(input.normal, 0.0)).xyz;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let ndc = input.light_pos.xyz / input.light_pos.w;
    let shadow_uv = ndc.xy * vec2<f32>(0.5, -0.5) + vec2<f32>(0.5, 0.5);
    let texel = 1.0 / SHADOW_DEPTH_TEXTURE_SIZE;

    var visibility = 0.0;
    for (var y = -1; y <= 1; y++) {
        for (var x = -1; x <= 1; x++) {
            let offset = vec2<f32>(f32(x), f32(y)) * texel;
            visibility += textureSampleCompare(
                shadow_map,
                shadow_sampler,
                shadow_uv + offset,
                ndc.z - SHADOW_BIAS,
            );
        }
    }
    visibility /= 9.0;

    let light_dir = normalize(scene.light_position - input.world_pos);
    let lambert = max(dot(normalize(input.normal), light_dir), 0.0);
    let lighting = min(AMBIENT + visibility * lambert, 1.0);
    return vec4<f32>(lighting * ALBEDO, 1.0);
}
"#;

/// Depth offset subtracted before the shadow comparison to avoid acne.
pub const SHADOW_BIAS: f32 = 0.007;
pub const AMBIENT: f32 = 0.2;
pub const ALBEDO: [f32; 3] = [0.9, 0.9, 0.9];

/// Depth-only shader for the shadow pass.
pub fn shadow_shader_source() -> String {
    format!("{SCENE_BINDINGS}{SHADOW_BODY}")
}

/// Lit, shadow-sampling shader for the colour pass.
pub fn color_shader_source(shadow_map_size: u32) -> String {
    let [r, g, b] = ALBEDO;
    format!(
        "const SHADOW_DEPTH_TEXTURE_SIZE: f32 = {size:.1};\n\
         const SHADOW_BIAS: f32 = {SHADOW_BIAS:?};\n\
         const AMBIENT: f32 = {AMBIENT:?};\n\
         const ALBEDO: vec3<f32> = vec3<f32>({r:?}, {g:?}, {b:?});\n\
         {SCENE_BINDINGS}{COLOR_BODY}",
        size = shadow_map_size as f32,
    )
}
