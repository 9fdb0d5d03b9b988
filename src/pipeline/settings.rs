//! Designer-facing configuration
//!
//! Strength values are clamped when they are set, so passes always read
//! values already inside their ranges.

use std::ops::RangeInclusive;

use crate::backend::types::{Color, LayerMask};
use crate::pipeline::events::{CameraEvent, RenderPassEvent};

/// Allowed outline strength
pub const OUTLINE_STRENGTH_RANGE: RangeInclusive<f32> = 0.5..=10.0;
/// Allowed blur strength
pub const BLUR_STRENGTH_RANGE: RangeInclusive<f32> = 0.1..=3.0;

const DEFAULT_OUTLINE_STRENGTH: f32 = 5.0;
const DEFAULT_BLUR_STRENGTH: f32 = 1.0;

fn clamp_to(value: f32, range: &RangeInclusive<f32>, fallback: f32) -> f32 {
    if value.is_nan() {
        return fallback;
    }
    value.clamp(*range.start(), *range.end())
}

/// Settings of the selection outline
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSettings {
    pub event: RenderPassEvent,
    pub meshes_cache_name: String,
    pub renderers_cache_name: String,
    pub custom_renderers_cache_name: String,
    pub layer_mask: LayerMask,
    pub outline_color: Color,
    outline_strength: f32,
    blur_strength: f32,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            event: RenderPassEvent::BeforeRenderingPostProcessing,
            meshes_cache_name: "SelectedMeshes".to_string(),
            renderers_cache_name: "SelectedRenderers".to_string(),
            custom_renderers_cache_name: "CustomOutlineRenderersCache".to_string(),
            layer_mask: LayerMask::ALL,
            outline_color: Color::from_rgba8(255, 128, 0, 255),
            outline_strength: DEFAULT_OUTLINE_STRENGTH,
            blur_strength: DEFAULT_BLUR_STRENGTH,
        }
    }
}

impl SelectionSettings {
    pub fn outline_strength(&self) -> f32 {
        self.outline_strength
    }

    pub fn blur_strength(&self) -> f32 {
        self.blur_strength
    }

    pub fn set_outline_strength(&mut self, value: f32) {
        self.outline_strength = clamp_to(value, &OUTLINE_STRENGTH_RANGE, DEFAULT_OUTLINE_STRENGTH);
    }

    pub fn set_blur_strength(&mut self, value: f32) {
        self.blur_strength = clamp_to(value, &BLUR_STRENGTH_RANGE, DEFAULT_BLUR_STRENGTH);
    }

    pub fn with_outline_strength(mut self, value: f32) -> Self {
        self.set_outline_strength(value);
        self
    }

    pub fn with_blur_strength(mut self, value: f32) -> Self {
        self.set_blur_strength(value);
        self
    }

    pub fn with_outline_color(mut self, color: Color) -> Self {
        self.outline_color = color;
        self
    }

    pub fn with_layer_mask(mut self, mask: LayerMask) -> Self {
        self.layer_mask = mask;
        self
    }

    pub fn with_event(mut self, event: RenderPassEvent) -> Self {
        self.event = event;
        self
    }

    pub fn with_cache_names(mut self, meshes: &str, renderers: &str, custom_renderers: &str) -> Self {
        self.meshes_cache_name = meshes.to_string();
        self.renderers_cache_name = renderers.to_string();
        self.custom_renderers_cache_name = custom_renderers.to_string();
        self
    }
}

/// Settings of the render cache feature
#[derive(Debug, Clone, PartialEq)]
pub struct RenderCacheSettings {
    pub event: RenderPassEvent,
    pub renderers_cache_name: String,
}

impl Default for RenderCacheSettings {
    fn default() -> Self {
        Self {
            event: RenderPassEvent::AfterRenderingOpaques,
            renderers_cache_name: "RenderersCache".to_string(),
        }
    }
}

/// Camera events gizmo passes are created for
#[derive(Debug, Clone, PartialEq)]
pub struct GizmoSettings {
    pub camera_events: Vec<CameraEvent>,
}

impl Default for GizmoSettings {
    fn default() -> Self {
        Self {
            camera_events: vec![
                CameraEvent::AfterForwardAlpha,
                CameraEvent::BeforeImageEffects,
                CameraEvent::AfterImageEffectsOpaque,
                CameraEvent::AfterImageEffects,
            ],
        }
    }
}

impl GizmoSettings {
    /// Distinct ordering keys of the configured events, in frame order.
    pub fn ordering_keys(&self) -> Vec<RenderPassEvent> {
        let mut keys: Vec<RenderPassEvent> = self
            .camera_events
            .iter()
            .map(|e| e.to_render_pass_event())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

/// Configuration for building the overlay pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    pub selection: SelectionSettings,
    pub render_cache: RenderCacheSettings,
    pub gizmos: GizmoSettings,
    pub enable_selection: bool,
    pub enable_render_cache: bool,
    pub enable_gizmos: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            selection: SelectionSettings::default(),
            render_cache: RenderCacheSettings::default(),
            gizmos: GizmoSettings::default(),
            enable_selection: true,
            enable_render_cache: true,
            enable_gizmos: true,
        }
    }
}

impl OverlayConfig {
    pub fn with_selection(mut self, selection: SelectionSettings) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_render_cache(mut self, render_cache: RenderCacheSettings) -> Self {
        self.render_cache = render_cache;
        self
    }

    pub fn with_gizmos(mut self, gizmos: GizmoSettings) -> Self {
        self.gizmos = gizmos;
        self
    }
}
