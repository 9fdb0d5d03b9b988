//! Outline shaders and the global names they read

use crate::backend::traits::ShaderDescriptor;
use crate::pipeline::ExecutionMode;

/// Mask target / global texture
pub const MASK_TEXTURE: &str = "_MaskTex";
/// First blur pass output
pub const BLUR_VERTICAL_TEXTURE: &str = "_BlurVertTex";
/// Final blur output / global texture
pub const BLUR_TEXTURE: &str = "_BlurTex";
/// Snapshot of the camera color taken before compositing
pub const CAMERA_COPY_TEXTURE: &str = "_CamTex";

pub const OUTLINE_COLOR: &str = "_OutlineColor";
pub const OUTLINE_STRENGTH: &str = "_OutlineStrength";
pub const BLUR_STRENGTH: &str = "_BlurStrength";
pub const BLUR_DIRECTION: &str = "_BlurDirection";

pub const MASK_SHADER_NAME: &str = "Overlay/OutlineMask";
pub const BLUR_SHADER_NAME: &str = "Overlay/OutlineBlur";
pub const SEPARABLE_BLUR_SHADER_NAME: &str = "Overlay/OutlineBlurSeparable";
pub const COMPOSITE_SHADER_NAME: &str = "Overlay/OutlineComposite";
pub const COPY_SHADER_NAME: &str = "Overlay/Copy";

/// Bindings shared by every overlay shader.
///
/// `source_tex` is the blit source; `mask_tex` and `blur_tex` are the
/// `_MaskTex` and `_BlurTex` globals.
pub const OVERLAY_COMMON: &str = r#"
struct OverlayUniforms {
    view_proj: mat4x4<f32>,
    outline_color: vec4<f32>,
    // x: outline strength, y: blur strength, zw: blur direction
    params: vec4<f32>,
    // xy: 1 / target size
    texel_size: vec4<f32>,
}

@group(0) @binding(0) var<uniform> u: OverlayUniforms;
@group(0) @binding(1) var source_tex: texture_2d<f32>;
@group(0) @binding(2) var mask_tex: texture_2d<f32>;
@group(0) @binding(3) var blur_tex: texture_2d<f32>;
@group(0) @binding(4) var linear_sampler: sampler;

struct MeshInput {
    @location(0) position: vec3<f32>,
    @location(1) model_0: vec4<f32>,
    @location(2) model_1: vec4<f32>,
    @location(3) model_2: vec4<f32>,
    @location(4) model_3: vec4<f32>,
}

@vertex
fn vs_mesh(input: MeshInput) -> @builtin(position) vec4<f32> {
    let model = mat4x4<f32>(input.model_0, input.model_1, input.model_2, input.model_3);
    return u.view_proj * model * vec4<f32>(input.position, 1.0);
}

struct FullscreenOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_fullscreen(@builtin(vertex_index) vertex_index: u32) -> FullscreenOutput {
    var output: FullscreenOutput;

    // Generate fullscreen triangle
    let x = f32((vertex_index << 1u) & 2u);
    let y = f32(vertex_index & 2u);

    output.position = vec4<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0, 0.0, 1.0);
    output.uv = vec2<f32>(x, 1.0 - y);

    return output;
}
"#;

pub const MASK_FRAGMENT: &str = r#"
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}
"#;

const BLUR_KERNEL: &str = r#"
fn gaussian_blur(uv: vec2<f32>, direction: vec2<f32>) -> vec4<f32> {
    let texel_step = direction * u.texel_size.xy;
    var weights = array<f32, 5>(0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216);

    var result = textureSample(source_tex, linear_sampler, uv) * weights[0];
    for (var i = 1; i < 5; i = i + 1) {
        let offset = texel_step * f32(i);
        result += textureSample(source_tex, linear_sampler, uv + offset) * weights[i];
        result += textureSample(source_tex, linear_sampler, uv - offset) * weights[i];
    }
    return result;
}
"#;

pub const BLUR_FRAGMENT: &str = r#"
@fragment
fn fs_main(input: FullscreenOutput) -> @location(0) vec4<f32> {
    return gaussian_blur(input.uv, u.params.zw);
}
"#;

pub const SEPARABLE_BLUR_FRAGMENT: &str = r#"
@fragment
fn fs_first_axis(input: FullscreenOutput) -> @location(0) vec4<f32> {
    return gaussian_blur(input.uv, vec2<f32>(u.params.y, 0.0));
}

@fragment
fn fs_second_axis(input: FullscreenOutput) -> @location(0) vec4<f32> {
    return gaussian_blur(input.uv, vec2<f32>(0.0, u.params.y));
}
"#;

pub const COMPOSITE_FRAGMENT: &str = r#"
@fragment
fn fs_main(input: FullscreenOutput) -> @location(0) vec4<f32> {
    let scene = textureSample(source_tex, linear_sampler, input.uv);
    let mask = textureSample(mask_tex, linear_sampler, input.uv).r;
    let blurred = textureSample(blur_tex, linear_sampler, input.uv).r;

    let outline = saturate((blurred - mask) * u.params.x) * u.outline_color.a;
    return vec4<f32>(mix(scene.rgb, u.outline_color.rgb, outline), scene.a);
}
"#;

pub const COPY_FRAGMENT: &str = r#"
@fragment
fn fs_main(input: FullscreenOutput) -> @location(0) vec4<f32> {
    return textureSample(source_tex, linear_sampler, input.uv);
}
"#;

fn compose(parts: &[&str]) -> String {
    parts.concat()
}

pub fn mask_shader() -> ShaderDescriptor {
    ShaderDescriptor::new(
        MASK_SHADER_NAME,
        &compose(&[OVERLAY_COMMON, MASK_FRAGMENT]),
        &["fs_main"],
    )
}

/// Blur through a `_BlurDirection` uniform, one pass.
pub fn blur_shader() -> ShaderDescriptor {
    ShaderDescriptor::new(
        BLUR_SHADER_NAME,
        &compose(&[OVERLAY_COMMON, BLUR_KERNEL, BLUR_FRAGMENT]),
        &["fs_main"],
    )
}

/// Blur with the axis baked into the pass index.
pub fn separable_blur_shader() -> ShaderDescriptor {
    ShaderDescriptor::new(
        SEPARABLE_BLUR_SHADER_NAME,
        &compose(&[OVERLAY_COMMON, BLUR_KERNEL, SEPARABLE_BLUR_FRAGMENT]),
        &["fs_first_axis", "fs_second_axis"],
    )
}

pub fn composite_shader() -> ShaderDescriptor {
    ShaderDescriptor::new(
        COMPOSITE_SHADER_NAME,
        &compose(&[OVERLAY_COMMON, COMPOSITE_FRAGMENT]),
        &["fs_main"],
    )
}

pub fn copy_shader() -> ShaderDescriptor {
    ShaderDescriptor::new(
        COPY_SHADER_NAME,
        &compose(&[OVERLAY_COMMON, COPY_FRAGMENT]),
        &["fs_main"],
    )
}

/// Mask, blur and composite shaders for an execution mode.
pub fn outline_shaders(mode: ExecutionMode) -> [ShaderDescriptor; 3] {
    let blur = match mode {
        ExecutionMode::Immediate => blur_shader(),
        ExecutionMode::RenderGraph => separable_blur_shader(),
    };
    [mask_shader(), blur, composite_shader()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separable_blur_has_two_passes() {
        let [_, blur, _] = outline_shaders(ExecutionMode::RenderGraph);
        assert_eq!(blur.name, SEPARABLE_BLUR_SHADER_NAME);
        assert_eq!(blur.passes, vec!["fs_first_axis", "fs_second_axis"]);
        assert!(blur.source.contains("fn gaussian_blur"));
    }

    #[test]
    fn test_immediate_blur_reads_direction() {
        let [mask, blur, composite] = outline_shaders(ExecutionMode::Immediate);
        assert_eq!(mask.name, MASK_SHADER_NAME);
        assert!(blur.source.contains("u.params.zw"));
        assert_eq!(composite.passes.len(), 1);
    }
}
