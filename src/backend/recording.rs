//! Recording backend for tests and headless hosts.
//!
//! Performs no GPU work. Every submitted command is validated the way a real
//! backend would (temporaries resolved, blits checked for aliasing, draws
//! require a bound target) and appended to a log, and counters track
//! transient texture traffic.

use std::collections::{HashMap, HashSet};

use crate::backend::command::{Command, CommandBuffer, TemporaryTargets};
use crate::backend::traits::*;
use crate::backend::types::*;

/// Transient handles are numbered above this so they never collide with the
/// small ids hosts hand out for their own textures.
pub const TRANSIENT_HANDLE_BASE: u64 = 1 << 32;

/// Counters accumulated by a [`RecordingBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingStats {
    pub submissions: usize,
    pub draw_calls: usize,
    pub clears: usize,
    pub transient_allocations: usize,
    pub transient_releases: usize,
    pub materials_created: usize,
    pub materials_destroyed: usize,
}

/// Recording GPU backend.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_texture_id: u64,
    next_material_id: u64,
    live_transients: HashSet<TextureHandle>,
    materials: HashMap<u64, String>,
    failing_shaders: HashSet<String>,
    log: Vec<(String, Command)>,
    stats: RecordingStats,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make material creation fail for `shader_name`, as a host would when
    /// the shader asset is missing.
    pub fn with_missing_shader(mut self, shader_name: &str) -> Self {
        self.failing_shaders.insert(shader_name.to_string());
        self
    }

    pub fn stats(&self) -> RecordingStats {
        self.stats
    }

    /// Transient textures allocated and not yet released.
    pub fn live_transients(&self) -> usize {
        self.live_transients.len()
    }

    pub fn live_materials(&self) -> usize {
        self.materials.len()
    }

    /// Shader name a live material was created from.
    pub fn material_shader(&self, material: MaterialHandle) -> Option<&str> {
        self.materials.get(&material.0).map(String::as_str)
    }

    /// Every executed command, tagged with the name of its buffer.
    pub fn submitted(&self) -> &[(String, Command)] {
        &self.log
    }

    /// Names of submitted buffers in submission order, deduplicated
    /// consecutively.
    pub fn submitted_buffers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (name, _) in &self.log {
            if names.last() != Some(&name.as_str()) {
                names.push(name);
            }
        }
        names
    }

    pub fn reset_log(&mut self) {
        self.log.clear();
        self.stats = RecordingStats {
            materials_created: self.stats.materials_created,
            materials_destroyed: self.stats.materials_destroyed,
            ..RecordingStats::default()
        };
    }

    fn allocate(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if !desc.is_valid_transient() {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?}: {}x{} {:?}",
                desc.label, desc.width, desc.height, desc.format
            )));
        }
        self.next_texture_id += 1;
        let handle = TextureHandle(TRANSIENT_HANDLE_BASE + self.next_texture_id);
        log::trace!(
            "RecordingBackend: creating transient {:?} ({}x{}, {:?}) -> {}",
            desc.label,
            desc.width,
            desc.height,
            desc.format,
            handle.0
        );
        self.live_transients.insert(handle);
        self.stats.transient_allocations += 1;
        Ok(handle)
    }

    fn execute(
        &mut self,
        command: &Command,
        temporaries: &mut TemporaryTargets,
        target_bound: &mut bool,
    ) -> BackendResult<()> {
        match command {
            Command::GetTemporary { id, desc } => {
                temporaries.acquire(*id, || self.allocate(desc))?;
            }
            Command::ReleaseTemporary { id } => {
                if let Some(handle) = temporaries.release(*id) {
                    self.release_transient(handle);
                }
            }
            Command::SetRenderTarget { color, depth } => {
                temporaries.resolve(*color)?;
                if let Some(depth) = depth {
                    temporaries.resolve(*depth)?;
                }
                *target_bound = true;
            }
            Command::Clear { .. } => {
                if !*target_bound {
                    return Err(BackendError::NoRenderTarget);
                }
                self.stats.clears += 1;
            }
            Command::Blit {
                source,
                destination,
                ..
            } => {
                let src = temporaries.resolve(*source)?;
                let dst = temporaries.resolve(*destination)?;
                if src == dst {
                    return Err(BackendError::AliasedBlit(src.0));
                }
                *target_bound = true;
                self.stats.draw_calls += 1;
            }
            Command::SetGlobalTexture { texture, .. } => {
                temporaries.resolve(*texture)?;
            }
            Command::DrawMesh { .. }
            | Command::DrawMeshInstanced { .. }
            | Command::DrawRenderer { .. }
            | Command::DrawProcedural { .. } => {
                if !*target_bound {
                    return Err(BackendError::NoRenderTarget);
                }
                self.stats.draw_calls += 1;
            }
            Command::SetWireframe(_)
            | Command::SetGlobalFloat { .. }
            | Command::SetGlobalVector { .. }
            | Command::SetGlobalColor { .. } => {}
        }
        Ok(())
    }
}

impl RenderBackend for RecordingBackend {
    fn name(&self) -> &str {
        "Recording Backend"
    }

    fn create_transient(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        self.allocate(desc)
    }

    fn release_transient(&mut self, texture: TextureHandle) {
        if self.live_transients.remove(&texture) {
            log::trace!("RecordingBackend: releasing transient {}", texture.0);
            self.stats.transient_releases += 1;
        } else {
            log::warn!("RecordingBackend: release of unknown texture {}", texture.0);
        }
    }

    fn submit(&mut self, commands: &CommandBuffer) -> BackendResult<()> {
        log::trace!(
            "RecordingBackend: submitting '{}' ({} commands)",
            commands.name(),
            commands.len()
        );
        self.stats.submissions += 1;

        let mut temporaries = TemporaryTargets::new();
        let mut target_bound = false;
        let mut result = Ok(());
        for command in commands.commands() {
            if let Err(err) = self.execute(command, &mut temporaries, &mut target_bound) {
                result = Err(err);
                break;
            }
            self.log.push((commands.name().to_string(), command.clone()));
        }

        for (id, handle) in temporaries.drain() {
            log::warn!(
                "RecordingBackend: temporary '{}' not released by '{}'",
                id,
                commands.name()
            );
            self.release_transient(handle);
        }
        result
    }
}

impl MaterialFactory for RecordingBackend {
    fn create_material(&mut self, shader: &ShaderDescriptor) -> BackendResult<MaterialHandle> {
        if self.failing_shaders.contains(&shader.name) {
            return Err(BackendError::ShaderCreationFailed(shader.name.clone()));
        }
        self.next_material_id += 1;
        log::trace!(
            "RecordingBackend: creating material {} from '{}'",
            self.next_material_id,
            shader.name
        );
        self.materials
            .insert(self.next_material_id, shader.name.clone());
        self.stats.materials_created += 1;
        Ok(MaterialHandle(self.next_material_id))
    }

    fn destroy_material(&mut self, material: MaterialHandle) {
        if self.materials.remove(&material.0).is_some() {
            self.stats.materials_destroyed += 1;
        }
    }
}
