//! # Draw Call Renderer
//!
//! Owns the submitted draw calls and turns them into device commands once
//! per [`DrawCallRenderer::draw`]:
//!
//! 1. Shadow slots are assigned, lights are moved into view space and the
//!    light block is uploaded.
//! 2. The program groups are rebuilt if submissions changed them.
//! 3. The shadow pass renders depth for every slot and cascade.
//! 4. The main pass walks the groups, activating each program once.
//!
//! Groups map a program name to the draw calls whose material uses it. Only
//! submissions, removals and program changes invalidate them; transform
//! updates, the common per-frame case, do not.
//!
//! The object, material, light and shadow blocks are single uniform buffers
//! at fixed binding points that every draw overwrites.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::config::{DrawOrder, RendererConfig};
use crate::foundation::math::Mat4;
use crate::render::api::{BufferUpdateMode, DepthAttachment, GraphicsDevice, UniformBuffer};
use crate::render::geometry::MeshOffsetData;
use crate::render::primitives::Frustum;
use crate::render::resources::{
    Mesh, Program, RenderContext, ResourceResolver, SharedGeometryBuffer, LIGHT_BLOCK_BINDING,
    MATERIAL_BLOCK_BINDING, OBJECT_BLOCK_BINDING, REQUIRED_UNIFORM_BINDINGS, SHADOW_BLOCK_BINDING,
};
use crate::render::systems::lighting::{pack_lights, Light};
use crate::render::systems::shadows::{
    assign_shadow_slots, compute_cascades, pack_shadows, point_light_face_views, point_light_projection,
    spot_light_projection, spot_light_view, ShadowAssignment, ShadowKind, ShadowMaps, ShadowSlotData,
};
use crate::render::{RenderError, RenderResult};

use super::draw_call::{DrawCall, DrawCallKey, DrawCallReference, DrawCallTarget};
use super::object_block::ObjectBlock;
use super::stats::FrameStats;

static NEXT_RENDERER_ID: AtomicU64 = AtomicU64::new(1);

/// The four singleton uniform buffers
#[derive(Debug)]
struct FrameBuffers {
    object: UniformBuffer,
    material: UniformBuffer,
    light: UniformBuffer,
    shadow: UniformBuffer,
}

/// Per-frame draw call renderer
pub struct DrawCallRenderer {
    id: u64,
    device: Box<dyn GraphicsDevice>,
    context: Rc<RenderContext>,
    config: RendererConfig,
    draw_calls: BTreeMap<DrawCallKey, DrawCall>,
    next_key: u64,
    groups: BTreeMap<String, Vec<DrawCallKey>>,
    groups_dirty: bool,
    lights: Vec<Light>,
    buffers: FrameBuffers,
    shadows: ShadowMaps,
    stats: FrameStats,
}

impl DrawCallRenderer {
    /// Create a renderer drawing through `device` with resources from `context`
    ///
    /// Fails when the configuration is invalid, the device has fewer than
    /// four uniform binding points, or a uniform buffer cannot be created.
    pub fn new(
        mut device: Box<dyn GraphicsDevice>,
        context: Rc<RenderContext>,
        config: RendererConfig,
    ) -> RenderResult<Self> {
        config
            .validate()
            .map_err(|e| RenderError::InitializationFailed(e.to_string()))?;

        let available = device.max_uniform_buffer_bindings();
        if available < REQUIRED_UNIFORM_BINDINGS {
            return Err(RenderError::OutOfUniformBindings { required: REQUIRED_UNIFORM_BINDINGS, available });
        }

        let light_size = pack_lights(&[], config.max_light_count).len();
        let shadow_size = pack_shadows(&[], config.max_shadow_light_count, &[]).len();
        let buffers = FrameBuffers {
            object: UniformBuffer::new(device.as_mut(), OBJECT_BLOCK_BINDING, std::mem::size_of::<ObjectBlock>())?,
            material: UniformBuffer::new(device.as_mut(), MATERIAL_BLOCK_BINDING, config.material_buffer_capacity)?,
            light: UniformBuffer::new(device.as_mut(), LIGHT_BLOCK_BINDING, light_size)?,
            shadow: UniformBuffer::new(device.as_mut(), SHADOW_BLOCK_BINDING, shadow_size)?,
        };

        let id = NEXT_RENDERER_ID.fetch_add(1, Ordering::Relaxed);
        log::info!(
            "Draw call renderer {} created on '{}' backend ({} lights, {} shadow slots)",
            id,
            device.name(),
            config.max_light_count,
            config.max_shadow_light_count
        );

        Ok(Self {
            id,
            device,
            context,
            shadows: ShadowMaps::new(config.shadow_map_size, config.max_shadow_light_count),
            config,
            draw_calls: BTreeMap::new(),
            next_key: 1,
            groups: BTreeMap::new(),
            groups_dirty: false,
            lights: Vec::new(),
            buffers,
            stats: FrameStats::default(),
        })
    }

    /// Identity checked against [`DrawCallReference::renderer_id`]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resource catalogs
    pub fn context(&self) -> &Rc<RenderContext> {
        &self.context
    }

    /// Active configuration
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Graphics device
    pub fn device(&self) -> &dyn GraphicsDevice {
        self.device.as_ref()
    }

    /// Mutable graphics device
    pub fn device_mut(&mut self) -> &mut dyn GraphicsDevice {
        self.device.as_mut()
    }

    // === Submission ===

    /// Store a draw call under the next key
    pub fn submit_draw_call(&mut self, call: DrawCall) -> DrawCallReference {
        let key = DrawCallKey(self.next_key);
        self.next_key += 1;
        log::trace!("Submitted draw call '{}' as {:?}", call.label, key);
        self.draw_calls.insert(key, call);
        self.groups_dirty = true;
        DrawCallReference { key, renderer_id: self.id }
    }

    /// Look up a submitted draw call
    pub fn get_draw_call(&self, target: impl Into<DrawCallTarget>) -> Option<&DrawCall> {
        let key = self.resolve_key(target.into())?;
        self.draw_calls.get(&key)
    }

    /// Replace a submitted draw call; false when the key is unknown
    ///
    /// The groups are only invalidated when the new call's program differs
    /// from the old one.
    pub fn set_draw_call(&mut self, target: impl Into<DrawCallTarget>, call: DrawCall) -> bool {
        let Some(key) = self.resolve_key(target.into()) else {
            return false;
        };
        let Some(existing) = self.draw_calls.get(&key) else {
            return false;
        };
        if self.program_name(existing) != self.program_name(&call) {
            self.groups_dirty = true;
        }
        self.draw_calls.insert(key, call);
        true
    }

    /// Remove a submitted draw call; false when the key is unknown
    pub fn remove_draw_call(&mut self, target: impl Into<DrawCallTarget>) -> bool {
        let Some(key) = self.resolve_key(target.into()) else {
            return false;
        };
        if self.draw_calls.remove(&key).is_none() {
            return false;
        }
        self.groups_dirty = true;
        true
    }

    /// Rebuild the program groups
    ///
    /// Draw calls whose material or program does not resolve are left out
    /// until the next rebuild.
    pub fn update_draw_calls(&mut self) {
        self.groups.clear();
        for (key, call) in &self.draw_calls {
            let Some(material) = call.material.get(&self.context.materials) else {
                log::warn!("Draw call '{}': material '{}' not found", call.label, call.material.name());
                continue;
            };
            let program = material.program();
            if program.get(&self.context.programs).is_none() {
                log::warn!("Draw call '{}': program '{}' not found", call.label, program.name());
                continue;
            }
            self.groups.entry(program.name().to_string()).or_default().push(*key);
        }
        self.groups_dirty = false;
        log::debug!("Grouped {} draw calls into {} programs", self.draw_calls.len(), self.groups.len());
    }

    /// Whether the groups will be rebuilt before the next draw
    pub fn is_group_cache_dirty(&self) -> bool {
        self.groups_dirty
    }

    /// Number of program groups
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of draw calls grouped under a program
    pub fn group_len(&self, program: &str) -> usize {
        self.groups.get(program).map_or(0, Vec::len)
    }

    /// Number of submitted draw calls
    pub fn draw_call_count(&self) -> usize {
        self.draw_calls.len()
    }

    fn resolve_key(&self, target: DrawCallTarget) -> Option<DrawCallKey> {
        match target {
            DrawCallTarget::Key(key) => Some(key),
            DrawCallTarget::Reference(reference) if reference.renderer_id == self.id => Some(reference.key),
            DrawCallTarget::Reference(reference) => {
                log::debug!(
                    "Draw call reference from renderer {} used on renderer {}",
                    reference.renderer_id,
                    self.id
                );
                None
            }
        }
    }

    fn program_name(&self, call: &DrawCall) -> Option<String> {
        call.material
            .get(&self.context.materials)
            .map(|material| material.program().name().to_string())
    }

    // === Lights ===

    /// Place a light at `index`; false when the index exceeds the light block
    pub fn set_light(&mut self, index: usize, light: Light) -> bool {
        if index >= self.config.max_light_count {
            log::warn!("Light index {} out of range (max {})", index, self.config.max_light_count);
            return false;
        }
        if index >= self.lights.len() {
            self.lights.resize_with(index + 1, Light::default);
        }
        self.lights[index] = light;
        true
    }

    /// Light at `index`
    pub fn light(&self, index: usize) -> Option<&Light> {
        self.lights.get(index)
    }

    /// Mutable light at `index`
    pub fn light_mut(&mut self, index: usize) -> Option<&mut Light> {
        self.lights.get_mut(index)
    }

    /// Every light slot in use
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Main framebuffer size
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.config.viewport = (width, height);
    }

    /// Counters of the last frame
    pub fn frame_stats(&self) -> FrameStats {
        self.stats
    }

    // === Frame ===

    /// Render one frame
    ///
    /// `view` and `projection` are the camera matrices; `frustum` holds the
    /// parameters `projection` was built from and drives the cascade split.
    /// Errors only come from the device rejecting the light or shadow block.
    /// Draw calls with missing resources or rejected uniforms are skipped,
    /// and a failed shadow map leaves the frame without shadows.
    pub fn draw(&mut self, view: &Mat4, projection: &Mat4, frustum: &Frustum) -> RenderResult<()> {
        self.stats = FrameStats::default();

        let assignment = assign_shadow_slots(&mut self.lights, self.config.max_shadow_light_count);
        self.stats.shadow_lights_skipped = assignment.skipped;
        for light in &mut self.lights {
            light.update_view_space(view);
        }
        let light_block = pack_lights(&self.lights, self.config.max_light_count);
        self.buffers
            .light
            .write(self.device.as_mut(), &light_block, self.config.light_update_mode)?;

        if self.groups_dirty {
            self.update_draw_calls();
        }

        self.shadow_pass(&assignment, view, frustum)?;
        self.main_pass(view, projection);

        log::trace!("Frame: {:?}", self.stats);
        Ok(())
    }

    fn shadow_pass(&mut self, assignment: &ShadowAssignment, view: &Mat4, frustum: &Frustum) -> RenderResult<()> {
        let Self { device, context, config, draw_calls, groups, lights, buffers, shadows, stats, .. } = self;

        let casters: Vec<(Rc<Program>, &Vec<DrawCallKey>)> = groups
            .iter()
            .filter_map(|(name, keys)| context.programs.resolve(name).map(|program| (program, keys)))
            .filter(|(program, _)| program.is_shadow_capable())
            .collect();

        let mut pass = Pass {
            device: device.as_mut(),
            context,
            draw_calls,
            buffers,
            object_mode: config.object_update_mode,
            material_mode: config.material_update_mode,
            stats,
            last_buffer: None,
        };
        let mut slot_data = Vec::with_capacity(assignment.slots.len());
        let mut cascades = Vec::new();

        if !assignment.slots.is_empty() || assignment.directional.is_some() {
            let framebuffer = shadows.framebuffer(pass.device)?;
            pass.device.bind_framebuffer(Some(framebuffer));
            pass.device.set_viewport(shadows.size(), shadows.size());
            pass.device.set_color_write(false);

            let rendered = (|| -> RenderResult<()> {
                for slot in &assignment.slots {
                    let light = &lights[slot.light];
                    let texture = shadows.ensure_slot(pass.device, slot.slot, slot.kind)?;
                    match slot.kind {
                        ShadowKind::Point => {
                            let projection = point_light_projection(config.shadow_near_plane, light.range);
                            for (face, face_view) in point_light_face_views(&light.position).iter().enumerate() {
                                pass.device.attach_depth(framebuffer, DepthAttachment::CubeFace(texture, face as u32));
                                pass.device.clear_depth();
                                pass.render_depth(&casters, face_view, &projection);
                            }
                            slot_data.push(ShadowSlotData::point(light));
                        }
                        ShadowKind::Spot => {
                            let light_view = spot_light_view(&light.position, &light.direction);
                            let projection =
                                spot_light_projection(light.spot_half_angle, config.shadow_near_plane, light.range);
                            pass.device.attach_depth(framebuffer, DepthAttachment::Texture2D(texture));
                            pass.device.clear_depth();
                            pass.render_depth(&casters, &light_view, &projection);
                            slot_data.push(ShadowSlotData::spot(&(projection * light_view), light));
                        }
                    }
                    pass.stats.shadowed_lights += 1;
                }

                if let Some(index) = assignment.directional {
                    cascades = compute_cascades(
                        view,
                        frustum,
                        &lights[index].direction,
                        config.max_shadow_distance,
                        config.cascade_split_lambda,
                        config.cascade_z_padding,
                    );
                    if !cascades.is_empty() {
                        let texture = shadows.ensure_cascade(pass.device)?;
                        for cascade in &cascades {
                            pass.device.attach_depth(framebuffer, DepthAttachment::Layer(texture, cascade.index as u32));
                            pass.device.clear_depth();
                            pass.render_depth(&casters, &cascade.light_view, &cascade.light_projection);
                        }
                        pass.stats.shadowed_lights += 1;
                    }
                }
                Ok(())
            })();

            pass.device.set_color_write(true);
            pass.device.bind_framebuffer(None);
            if let Err(error) = rendered {
                log::warn!("Shadow pass aborted, frame drawn without shadows: {}", error);
                slot_data.clear();
                cascades.clear();
                pass.stats.shadowed_lights = 0;
            }
        }

        let shadow_block = pack_shadows(&slot_data, shadows.slot_count(), &cascades);
        pass.buffers.shadow.write(pass.device, &shadow_block, config.light_update_mode)
    }

    fn main_pass(&mut self, view: &Mat4, projection: &Mat4) {
        let Self { device, context, config, draw_calls, groups, buffers, shadows, stats, .. } = self;
        let sort_transparent = config.draw_order == DrawOrder::TransparencySorted;

        let mut pass = Pass {
            device: device.as_mut(),
            context,
            draw_calls,
            buffers,
            object_mode: config.object_update_mode,
            material_mode: config.material_update_mode,
            stats,
            last_buffer: None,
        };
        pass.device.bind_framebuffer(None);
        pass.device.set_viewport(config.viewport.0, config.viewport.1);
        pass.device.set_color_write(true);

        let mut transparent: Vec<(f32, Rc<Program>, DrawCallKey)> = Vec::new();
        for (name, keys) in groups.iter() {
            let Some(program) = pass.context.programs.resolve(name) else {
                log::warn!("Program '{}' no longer loaded, {} draw calls skipped", name, keys.len());
                pass.stats.draw_calls_skipped += keys.len();
                continue;
            };
            let mut active = false;
            for key in keys {
                if sort_transparent {
                    if let Some(depth) = pass.transparent_depth(*key, view) {
                        transparent.push((depth, Rc::clone(&program), *key));
                        continue;
                    }
                }
                if !active {
                    program.activate(pass.device);
                    program.bind_shadow_maps(pass.device, shadows);
                    pass.stats.program_switches += 1;
                    pass.last_buffer = None;
                    active = true;
                }
                pass.draw_main(&program, *key, view, projection);
            }
        }

        // Farthest first: view space looks down -Z
        transparent.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let mut current: Option<&Rc<Program>> = None;
        for (_, program, key) in &transparent {
            if current.map_or(true, |active| !Rc::ptr_eq(active, program)) {
                program.activate(pass.device);
                program.bind_shadow_maps(pass.device, shadows);
                pass.stats.program_switches += 1;
                pass.last_buffer = None;
                current = Some(program);
            }
            pass.draw_main(program, *key, view, projection);
        }
    }
}

impl Drop for DrawCallRenderer {
    fn drop(&mut self) {
        let device = self.device.as_mut();
        self.shadows.release(device);
        for buffer in [&self.buffers.object, &self.buffers.material, &self.buffers.light, &self.buffers.shadow] {
            device.delete_buffer(buffer.id());
        }
        log::debug!("Draw call renderer {} released", self.id);
    }
}

/// Borrowed state one render pass draws with
struct Pass<'a> {
    device: &'a mut dyn GraphicsDevice,
    context: &'a RenderContext,
    draw_calls: &'a BTreeMap<DrawCallKey, DrawCall>,
    buffers: &'a mut FrameBuffers,
    object_mode: BufferUpdateMode,
    material_mode: BufferUpdateMode,
    stats: &'a mut FrameStats,
    last_buffer: Option<SharedGeometryBuffer>,
}

impl Pass<'_> {
    /// View-space depth of a drawable call with a transparent material
    fn transparent_depth(&self, key: DrawCallKey, view: &Mat4) -> Option<f32> {
        let call = self.draw_calls.get(&key).filter(|call| call.enabled)?;
        let material = call.material.get(&self.context.materials)?;
        material.is_transparent().then(|| (view * call.world())[(2, 3)])
    }

    /// Upload and bind the mesh's geometry buffer if needed
    ///
    /// The vertex array is only rebound when the buffer differs from the
    /// previous draw in this pass or was just re-uploaded.
    fn bind_geometry(&mut self, program: &Program, mesh: &Mesh, depth: bool) -> Option<MeshOffsetData> {
        let offset = mesh.offset().filter(|offset| offset.index_count > 0)?;
        let buffer = mesh.buffer();
        let upload = buffer.borrow_mut().update_if_dirty(self.device);
        let uploaded = match upload {
            Ok(uploaded) => uploaded,
            Err(error) => {
                log::warn!("Geometry buffer '{}' upload failed: {}", buffer.borrow().label(), error);
                return None;
            }
        };

        let same_buffer = self.last_buffer.as_ref().is_some_and(|last| Rc::ptr_eq(last, buffer));
        if uploaded || !same_buffer {
            let geometry = buffer.borrow();
            let bound = if depth {
                program.bind_depth_to(self.device, &geometry)
            } else {
                program.bind_to(self.device, &geometry)
            };
            if !bound {
                self.last_buffer = None;
                return None;
            }
            self.last_buffer = Some(Rc::clone(buffer));
        }
        Some(offset)
    }

    /// Draw one call of the active program
    ///
    /// A call whose uniforms the device rejects is counted as skipped and the
    /// pass moves on.
    fn draw_main(&mut self, program: &Program, key: DrawCallKey, view: &Mat4, projection: &Mat4) {
        let (draw_calls, context) = (self.draw_calls, self.context);
        let Some(call) = draw_calls.get(&key) else {
            return;
        };
        if !call.enabled {
            self.stats.draw_calls_disabled += 1;
            return;
        }
        let (Some(mesh), Some(material)) = (
            call.geometry.get(&context.meshes),
            call.material.get(&context.materials),
        ) else {
            log::trace!("Draw call '{}' skipped: mesh or material missing", call.label);
            self.stats.draw_calls_skipped += 1;
            return;
        };
        let Some(offset) = self.bind_geometry(program, &mesh, false) else {
            log::trace!("Draw call '{}' skipped: no drawable geometry", call.label);
            self.stats.draw_calls_skipped += 1;
            return;
        };

        let block = ObjectBlock::new(&call.world(), view, projection);
        let uploaded = self
            .buffers
            .object
            .write(self.device, bytemuck::bytes_of(&block), self.object_mode)
            .and_then(|_| program.set_material(self.device, &mut self.buffers.material, &material, self.material_mode));
        if let Err(error) = uploaded {
            log::warn!("Draw call '{}' skipped: {}", call.label, error);
            self.stats.draw_calls_skipped += 1;
            return;
        }
        program.bind_textures(self.device, &material, &context.textures);
        self.device.draw_indexed(offset.index_count, offset.index_start, offset.base_vertex as i32);
        self.stats.draw_calls_issued += 1;
    }

    /// Draw every shadow caster with the depth variant of its program
    fn render_depth(
        &mut self,
        casters: &[(Rc<Program>, &Vec<DrawCallKey>)],
        light_view: &Mat4,
        light_projection: &Mat4,
    ) {
        let (draw_calls, context) = (self.draw_calls, self.context);
        for (program, keys) in casters {
            program.activate_depth(self.device);
            self.last_buffer = None;
            for key in keys.iter() {
                let Some(call) = draw_calls.get(key).filter(|call| call.enabled) else {
                    continue;
                };
                let Some(mesh) = call.geometry.get(&context.meshes) else {
                    continue;
                };
                let Some(offset) = self.bind_geometry(program, &mesh, true) else {
                    continue;
                };
                let block = ObjectBlock::new(&call.world(), light_view, light_projection);
                if let Err(error) = self.buffers.object.write(self.device, bytemuck::bytes_of(&block), self.object_mode) {
                    log::warn!("Shadow caster '{}' skipped: {}", call.label, error);
                    continue;
                }
                self.device.draw_indexed(offset.index_count, offset.index_start, offset.base_vertex as i32);
                self.stats.shadow_draws += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::api::MapAccess;
    use crate::render::backends::HeadlessDevice;
    use crate::render::geometry::{GeometryBuffer, GeometryDescription, VertexAttribute};
    use crate::render::resources::{Material, ProgramDescription, ShaderSource};
    use std::cell::RefCell;

    const VERTEX: &str = "#version 330 core
in vec3 aPosition;
uniform Object { mat4 world; };
void main() {}
";

    const FRAGMENT: &str = "#version 330 core
uniform Lights { vec4 header; };
void main() {}
";

    fn context(device: &mut HeadlessDevice) -> Rc<RenderContext> {
        let context = RenderContext::new();
        let mut description = ProgramDescription {
            vertex_shader: ShaderSource::Inline(VERTEX.to_string()),
            fragment_shader: ShaderSource::Inline(FRAGMENT.to_string()),
            ..ProgramDescription::default()
        };
        description.attributes.insert(VertexAttribute::Position, "aPosition".to_string());
        for name in ["lit", "unlit"] {
            let program = Program::new(device, name, &description, 4).unwrap();
            context.programs.insert(name, program);
        }
        context.materials.insert("red", Material::new("red", "lit"));
        context.materials.insert("blue", Material::new("blue", "unlit"));
        context.materials.insert("ghost", Material::new("ghost", "missing"));

        let buffer = Rc::new(RefCell::new(GeometryBuffer::new("shared")));
        let layout = GeometryDescription::new().with(VertexAttribute::Position, 3);
        let mesh = Mesh::new("tri", &buffer, &layout, &[0.0; 9], &[0, 1, 2]).unwrap();
        context.meshes.insert("tri", mesh);
        Rc::new(context)
    }

    fn renderer() -> DrawCallRenderer {
        let mut device = HeadlessDevice::new();
        let context = context(&mut device);
        DrawCallRenderer::new(Box::new(device), context, RendererConfig::new()).unwrap()
    }

    #[test]
    fn test_submit_get_remove() {
        let mut renderer = renderer();
        let reference = renderer.submit_draw_call(DrawCall::new("tri", "red", Mat4::identity()));

        assert_eq!(renderer.get_draw_call(reference).map(|call| call.label.as_str()), Some("tri"));
        assert!(renderer.remove_draw_call(reference));
        assert!(renderer.get_draw_call(reference).is_none());
        assert!(!renderer.remove_draw_call(reference));
    }

    #[test]
    fn test_reference_from_other_renderer_is_not_found() {
        let mut first = renderer();
        let mut second = renderer();
        let reference = first.submit_draw_call(DrawCall::new("tri", "red", Mat4::identity()));
        second.submit_draw_call(DrawCall::new("tri", "red", Mat4::identity()));

        assert_ne!(first.id(), second.id());
        assert!(second.get_draw_call(reference).is_none());
        assert!(second.get_draw_call(reference.key).is_some());
    }

    #[test]
    fn test_set_draw_call_dirties_only_on_program_change() {
        let mut renderer = renderer();
        let reference = renderer.submit_draw_call(DrawCall::new("tri", "red", Mat4::identity()));
        renderer.update_draw_calls();

        let moved = DrawCall::new("tri", "red", Mat4::new_translation(&crate::foundation::math::Vec3::x()));
        assert!(renderer.set_draw_call(reference, moved));
        assert!(!renderer.is_group_cache_dirty());

        assert!(renderer.set_draw_call(reference, DrawCall::new("tri", "blue", Mat4::identity())));
        assert!(renderer.is_group_cache_dirty());
    }

    #[test]
    fn test_groups_skip_unresolved_programs() {
        let mut renderer = renderer();
        renderer.submit_draw_call(DrawCall::new("tri", "red", Mat4::identity()));
        renderer.submit_draw_call(DrawCall::new("tri", "red", Mat4::identity()));
        renderer.submit_draw_call(DrawCall::new("tri", "blue", Mat4::identity()));
        renderer.submit_draw_call(DrawCall::new("tri", "ghost", Mat4::identity()));
        renderer.update_draw_calls();

        assert_eq!(renderer.group_count(), 2);
        assert_eq!(renderer.group_len("lit"), 2);
        assert_eq!(renderer.group_len("unlit"), 1);
        assert_eq!(renderer.draw_call_count(), 4);
    }

    #[test]
    fn test_too_few_bindings_is_an_error() {
        let device = HeadlessDevice::new().with_max_uniform_buffer_bindings(2);
        let result = DrawCallRenderer::new(Box::new(device), Rc::new(RenderContext::new()), RendererConfig::new());
        assert!(matches!(result, Err(RenderError::OutOfUniformBindings { required: 4, available: 2 })));
    }

    #[test]
    fn test_light_index_out_of_range_is_rejected() {
        let mut renderer = renderer();
        let max = renderer.config().max_light_count;
        assert!(!renderer.set_light(max, Light::default()));
        assert!(renderer.set_light(2, Light::default()));
        assert_eq!(renderer.lights().len(), 3);
    }

    #[test]
    fn test_disabled_calls_are_counted() {
        let mut renderer = renderer();
        let mut call = DrawCall::new("tri", "red", Mat4::identity());
        call.enabled = false;
        renderer.submit_draw_call(call);
        renderer.submit_draw_call(DrawCall::new("tri", "red", Mat4::identity()));

        renderer.draw(&Mat4::identity(), &Mat4::identity(), &Frustum::default()).unwrap();
        let stats = renderer.frame_stats();
        assert_eq!(stats.draw_calls_issued, 1);
        assert_eq!(stats.draw_calls_disabled, 1);
        assert_eq!(stats.program_switches, 1);
    }

    #[test]
    fn test_rejected_depth_uniforms_restore_main_target() {
        let mut device = HeadlessDevice::new();
        let context = context(&mut device);
        let mut description = ProgramDescription {
            vertex_shader: ShaderSource::Inline(VERTEX.to_string()),
            fragment_shader: ShaderSource::Inline(FRAGMENT.to_string()),
            shadow_vertex_shader: Some(ShaderSource::Inline(VERTEX.to_string())),
            shadow_fragment_shader: Some(ShaderSource::Inline("#version 330 core\nvoid main() {}\n".to_string())),
            ..ProgramDescription::default()
        };
        description.attributes.insert(VertexAttribute::Position, "aPosition".to_string());
        context.programs.insert("caster", Program::new(&mut device, "caster", &description, 4).unwrap());
        context.materials.insert("rock", Material::new("rock", "caster"));

        let mut renderer = DrawCallRenderer::new(Box::new(device), context, RendererConfig::new()).unwrap();
        renderer.submit_draw_call(DrawCall::new("tri", "rock", Mat4::identity()));
        renderer.set_light(0, Light::spot(Vec3::new(0.0, 5.0, 0.0), -Vec3::y(), Vec3::new(1.0, 1.0, 1.0), 1.0, 20.0, 0.5));
        renderer.update_draw_calls();

        let object = renderer.buffers.object.id();
        let headless = renderer.device_mut().as_any_mut().downcast_mut::<HeadlessDevice>().unwrap();
        headless.map_buffer(object, 0, std::mem::size_of::<ObjectBlock>(), MapAccess::WRITE).unwrap();

        let max_slots = renderer.config.max_shadow_light_count;
        let assignment = assign_shadow_slots(&mut renderer.lights, max_slots);
        renderer.shadow_pass(&assignment, &Mat4::identity(), &Frustum::default()).unwrap();

        let headless = renderer.device().as_any().downcast_ref::<HeadlessDevice>().unwrap();
        assert!(headless.color_write_enabled());
        assert_eq!(headless.bound_framebuffer(), None);
        assert!(headless.offscreen_draws().is_empty());
        assert_eq!(renderer.frame_stats().shadow_draws, 0);
        assert_eq!(renderer.frame_stats().shadowed_lights, 1);
    }
}
