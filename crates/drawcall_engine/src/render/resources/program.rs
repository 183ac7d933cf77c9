//! Shader programs bound to the renderer's memory layout
//!
//! A [`Program`] is created from a [`ProgramDescription`]. At construction
//! every name the description declares is resolved once against the linked
//! program: vertex inputs become attribute locations, the four uniform blocks
//! are routed to the renderer's fixed binding points, and each sampler gets a
//! texture unit. Material samplers come first, then the point and spot
//! shadow-map arrays (one entry per shadow slot), then the cascade map.
//!
//! Names that do not resolve are not fatal. They are logged and the slot
//! stays unbound, so the shader reads zeros instead of the renderer failing.
//!
//! A description may also carry a depth-only shader pair. Programs with one
//! take part in the shadow pass.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use serde::{Serialize, Deserialize};

use crate::render::api::{
    BufferId, BufferUpdateMode, GraphicsDevice, ProgramId, ShaderSources, TextureKind, UniformBuffer,
    VertexArrayId, VertexAttributeFormat,
};
use crate::render::geometry::{GeometryBuffer, GeometryDescription, VertexAttribute};
use crate::render::systems::shadows::{ShadowKind, ShadowMaps};
use crate::render::{RenderError, RenderResult};
use super::materials::{Material, MaterialDescription, MaterialProperty};
use super::registry::{ResourceReference, ResourceResolver, ResourceStore};
use super::texture::Texture;

/// Binding point of the per-object block
pub const OBJECT_BLOCK_BINDING: u32 = 0;
/// Binding point of the material block
pub const MATERIAL_BLOCK_BINDING: u32 = 1;
/// Binding point of the light block
pub const LIGHT_BLOCK_BINDING: u32 = 2;
/// Binding point of the shadow block
pub const SHADOW_BLOCK_BINDING: u32 = 3;
/// Binding points a device must offer
pub const REQUIRED_UNIFORM_BINDINGS: u32 = 4;

/// Where the GLSL for one stage comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShaderSource {
    /// Source text
    Inline(String),
    /// File containing the source
    Path(PathBuf),
}

impl ShaderSource {
    /// Source text, reading the file if needed
    pub fn read(&self) -> RenderResult<String> {
        match self {
            Self::Inline(source) => Ok(source.clone()),
            Self::Path(path) => std::fs::read_to_string(path).map_err(|e| {
                RenderError::ResourceCreationFailed(format!("cannot read shader {}: {}", path.display(), e))
            }),
        }
    }
}

impl Default for ShaderSource {
    fn default() -> Self {
        Self::Inline(String::new())
    }
}

/// Program record as produced by a description loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramDescription {
    /// Vertex stage
    pub vertex_shader: ShaderSource,
    /// Fragment stage
    pub fragment_shader: ShaderSource,
    /// Depth-only vertex stage for the shadow pass
    pub shadow_vertex_shader: Option<ShaderSource>,
    /// Depth-only fragment stage for the shadow pass
    pub shadow_fragment_shader: Option<ShaderSource>,
    /// Shader input name of every vertex attribute the program reads
    pub attributes: BTreeMap<VertexAttribute, String>,
    /// Material sampler names, in texture unit order
    pub textures: Vec<String>,
    /// Name of the per-object uniform block
    pub object_buffer: String,
    /// Name of the material uniform block
    pub material_buffer: String,
    /// Name of the light uniform block
    pub light_buffer: String,
    /// Name of the shadow uniform block
    pub shadow_buffer: String,
    /// Cubemap sampler array for point light shadows
    pub point_shadow_maps: String,
    /// 2D sampler array for spot light shadows
    pub spot_shadow_maps: String,
    /// Array sampler for the directional cascades
    pub cascade_shadow_map: String,
    /// Material block layout, in packing order
    pub material: Vec<MaterialProperty>,
}

impl Default for ProgramDescription {
    fn default() -> Self {
        Self {
            vertex_shader: ShaderSource::default(),
            fragment_shader: ShaderSource::default(),
            shadow_vertex_shader: None,
            shadow_fragment_shader: None,
            attributes: BTreeMap::new(),
            textures: Vec::new(),
            object_buffer: "Object".to_string(),
            material_buffer: "Material".to_string(),
            light_buffer: "Lights".to_string(),
            shadow_buffer: "Shadows".to_string(),
            point_shadow_maps: "pointShadowMaps".to_string(),
            spot_shadow_maps: "spotShadowMaps".to_string(),
            cascade_shadow_map: "cascadeShadowMap".to_string(),
            material: Vec::new(),
        }
    }
}

/// Vertex array configured for one program, with the last layout it was set up for
#[derive(Debug)]
struct VertexBinding {
    vao: VertexArrayId,
    locations: BTreeMap<VertexAttribute, u32>,
    cache: Cell<Option<(GeometryDescription, BufferId)>>,
}

impl VertexBinding {
    fn new(
        device: &mut dyn GraphicsDevice,
        program: ProgramId,
        label: &str,
        attributes: &BTreeMap<VertexAttribute, String>,
        warn_missing: bool,
    ) -> RenderResult<Self> {
        let mut locations = BTreeMap::new();
        for (attribute, name) in attributes {
            match device.attribute_location(program, name) {
                Some(location) => {
                    locations.insert(*attribute, location);
                }
                None if warn_missing => log::warn!("Program '{}': vertex input '{}' not found", label, name),
                None => log::trace!("Program '{}': vertex input '{}' unused", label, name),
            }
        }
        let vao = device.create_vertex_array()?;
        Ok(Self { vao, locations, cache: Cell::new(None) })
    }

    fn bind(&self, device: &mut dyn GraphicsDevice, buffer: &GeometryBuffer) -> bool {
        let (Some(description), Some(gpu)) = (buffer.description(), buffer.gpu_buffers()) else {
            return false;
        };

        if let Some((layout, vertex_buffer)) = self.cache.get() {
            if layout == *description {
                if vertex_buffer != gpu.vertex_buffer {
                    device.set_vertex_array_buffers(self.vao, gpu.vertex_buffer, gpu.index_buffer, description.stride());
                    self.cache.set(Some((layout, gpu.vertex_buffer)));
                }
                device.bind_vertex_array(self.vao);
                return true;
            }
        }

        if let Some(missing) = self.locations.keys().find(|attribute| description.get(**attribute).is_none()) {
            log::warn!("Geometry buffer '{}' has no {:?} attribute", buffer.label(), missing);
            return false;
        }

        if let Some((previous, _)) = self.cache.get() {
            for (attribute, _, _) in previous.ordered_attributes() {
                if let Some(location) = self.locations.get(&attribute) {
                    device.disable_vertex_attribute(self.vao, *location);
                }
            }
        }
        for (attribute, layout, offset) in description.ordered_attributes() {
            if let Some(location) = self.locations.get(&attribute) {
                device.set_vertex_attribute_format(self.vao, VertexAttributeFormat {
                    location: *location,
                    components: layout.components,
                    offset,
                    normalized: attribute.is_normalized(),
                });
            }
        }
        device.set_vertex_array_buffers(self.vao, gpu.vertex_buffer, gpu.index_buffer, description.stride());
        device.bind_vertex_array(self.vao);
        self.cache.set(Some((*description, gpu.vertex_buffer)));
        true
    }
}

#[derive(Debug)]
struct DepthVariant {
    id: ProgramId,
    vertices: VertexBinding,
}

/// Compiled program plus the layout it expects
pub struct Program {
    name: String,
    id: ProgramId,
    vertices: VertexBinding,
    depth: Option<DepthVariant>,
    material: MaterialDescription,
    texture_units: Vec<(String, Option<u32>)>,
    point_shadow_units: Vec<Option<u32>>,
    spot_shadow_units: Vec<Option<u32>>,
    cascade_shadow_unit: Option<u32>,
}

impl Program {
    /// Compile and bind a program
    ///
    /// `shadow_slots` is the length of the point and spot shadow sampler
    /// arrays. Fails when the device has too few uniform binding points, a
    /// shader does not compile, or the material layout is invalid.
    pub fn new(
        device: &mut dyn GraphicsDevice,
        name: impl Into<String>,
        description: &ProgramDescription,
        shadow_slots: usize,
    ) -> RenderResult<Self> {
        let name = name.into();
        let available = device.max_uniform_buffer_bindings();
        if available < REQUIRED_UNIFORM_BINDINGS {
            return Err(RenderError::OutOfUniformBindings { required: REQUIRED_UNIFORM_BINDINGS, available });
        }

        let material = MaterialDescription::new(description.material.clone())?;
        if !material.is_aligned() {
            log::warn!(
                "Program '{}': material layout is {} bytes, not a multiple of 16",
                name,
                material.byte_size()
            );
        }

        let sources = ShaderSources {
            vertex: description.vertex_shader.read()?,
            fragment: description.fragment_shader.read()?,
        };
        let id = device.create_program(&name, &sources)?;
        let vertices = VertexBinding::new(device, id, &name, &description.attributes, true)?;
        bind_blocks(device, id, &name, description, true);

        let mut next_unit = 0u32;
        let mut assign = |device: &mut dyn GraphicsDevice, sampler: &str| -> Option<u32> {
            let unit = next_unit;
            next_unit += 1;
            match device.uniform_location(id, sampler) {
                Some(location) => {
                    device.set_sampler_unit(id, location, unit);
                    Some(unit)
                }
                None => {
                    log::warn!("Program '{}': sampler '{}' not found", name, sampler);
                    None
                }
            }
        };

        let texture_units = description
            .textures
            .iter()
            .map(|sampler| (sampler.clone(), assign(device, sampler)))
            .collect();
        let point_shadow_units = (0..shadow_slots)
            .map(|i| assign(device, &format!("{}[{}]", description.point_shadow_maps, i)))
            .collect();
        let spot_shadow_units = (0..shadow_slots)
            .map(|i| assign(device, &format!("{}[{}]", description.spot_shadow_maps, i)))
            .collect();
        let cascade_shadow_unit = assign(device, &description.cascade_shadow_map);

        let depth = match (&description.shadow_vertex_shader, &description.shadow_fragment_shader) {
            (Some(vertex), Some(fragment)) => {
                let label = format!("{}.depth", name);
                let sources = ShaderSources { vertex: vertex.read()?, fragment: fragment.read()? };
                let depth_id = device.create_program(&label, &sources)?;
                let depth_vertices = VertexBinding::new(device, depth_id, &label, &description.attributes, false)?;
                bind_blocks(device, depth_id, &label, description, false);
                Some(DepthVariant { id: depth_id, vertices: depth_vertices })
            }
            (None, None) => None,
            _ => {
                log::warn!("Program '{}': depth variant needs both stages, shadow pass disabled", name);
                None
            }
        };

        log::debug!(
            "Program '{}' ready: {} attributes, {} material bytes, shadow capable: {}",
            name,
            vertices.locations.len(),
            material.byte_size(),
            depth.is_some()
        );

        Ok(Self {
            name,
            id,
            vertices,
            depth,
            material,
            texture_units,
            point_shadow_units,
            spot_shadow_units,
            cascade_shadow_unit,
        })
    }

    /// Program name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device handle of the main variant
    pub fn id(&self) -> ProgramId {
        self.id
    }

    /// Device handle of the depth variant
    pub fn depth_id(&self) -> Option<ProgramId> {
        self.depth.as_ref().map(|depth| depth.id)
    }

    /// Whether the program renders into shadow maps
    pub fn is_shadow_capable(&self) -> bool {
        self.depth.is_some()
    }

    /// Material block layout
    pub fn material_description(&self) -> &MaterialDescription {
        &self.material
    }

    /// Texture unit of a material sampler, `None` when unbound
    pub fn texture_unit(&self, sampler: &str) -> Option<u32> {
        self.texture_units
            .iter()
            .find(|(name, _)| name == sampler)
            .and_then(|(_, unit)| *unit)
    }

    /// Make the main variant current
    pub fn activate(&self, device: &mut dyn GraphicsDevice) {
        device.use_program(self.id);
    }

    /// Make the depth variant current; false when there is none
    pub fn activate_depth(&self, device: &mut dyn GraphicsDevice) -> bool {
        match &self.depth {
            Some(depth) => {
                device.use_program(depth.id);
                true
            }
            None => false,
        }
    }

    /// Configure and bind the vertex array for `buffer`
    ///
    /// Only binds when the buffer's layout and vertex buffer match the last
    /// call, and only reattaches buffers when just the vertex buffer changed.
    /// Returns false when the buffer lacks an attribute the program reads or
    /// has not been uploaded.
    pub fn bind_to(&self, device: &mut dyn GraphicsDevice, buffer: &GeometryBuffer) -> bool {
        self.vertices.bind(device, buffer)
    }

    /// [`Self::bind_to`] for the depth variant
    pub fn bind_depth_to(&self, device: &mut dyn GraphicsDevice, buffer: &GeometryBuffer) -> bool {
        match &self.depth {
            Some(depth) => depth.vertices.bind(device, buffer),
            None => false,
        }
    }

    /// Pack `material` against this program's layout and upload it
    pub fn set_material(
        &self,
        device: &mut dyn GraphicsDevice,
        buffer: &mut UniformBuffer,
        material: &Material,
        mode: BufferUpdateMode,
    ) -> RenderResult<()> {
        let bytes = material.convert_bytes_via_description(&self.material);
        if bytes.is_empty() {
            return Ok(());
        }
        buffer.write(device, &bytes, mode)
    }

    /// Bind the material's textures to the declared sampler units
    ///
    /// Samplers the material does not map, or whose texture does not
    /// resolve, get an empty binding.
    pub fn bind_textures(
        &self,
        device: &mut dyn GraphicsDevice,
        material: &Material,
        textures: &dyn ResourceResolver<Texture>,
    ) {
        for (sampler, unit) in &self.texture_units {
            let Some(unit) = unit else { continue };
            let texture = material.texture(sampler).and_then(|reference| reference.get(textures));
            match texture {
                Some(texture) => device.bind_texture(*unit, texture.kind, Some(texture.id)),
                None => {
                    log::trace!("Material '{}': sampler '{}' has no texture", material.name(), sampler);
                    device.bind_texture(*unit, TextureKind::Texture2D, None);
                }
            }
        }
    }

    /// Bind every allocated shadow map to its sampler unit
    pub fn bind_shadow_maps(&self, device: &mut dyn GraphicsDevice, shadows: &ShadowMaps) {
        for slot in 0..self.point_shadow_units.len() {
            let allocated = shadows.slot(slot + 1);
            if let Some(unit) = self.point_shadow_units[slot] {
                let texture = allocated.filter(|s| s.kind == ShadowKind::Point).map(|s| s.texture);
                device.bind_texture(unit, TextureKind::Cubemap, texture);
            }
            if let Some(unit) = self.spot_shadow_units.get(slot).copied().flatten() {
                let texture = allocated.filter(|s| s.kind == ShadowKind::Spot).map(|s| s.texture);
                device.bind_texture(unit, TextureKind::Texture2D, texture);
            }
        }
        if let Some(unit) = self.cascade_shadow_unit {
            device.bind_texture(unit, shadows.cascade_kind(), shadows.cascade_texture());
        }
    }

    /// Delete device objects
    pub fn release(&self, device: &mut dyn GraphicsDevice) {
        device.delete_vertex_array(self.vertices.vao);
        device.delete_program(self.id);
        if let Some(depth) = &self.depth {
            device.delete_vertex_array(depth.vertices.vao);
            device.delete_program(depth.id);
        }
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("shadow_capable", &self.is_shadow_capable())
            .field("material_bytes", &self.material.byte_size())
            .finish()
    }
}

fn bind_blocks(
    device: &mut dyn GraphicsDevice,
    program: ProgramId,
    label: &str,
    description: &ProgramDescription,
    warn_missing: bool,
) {
    let blocks = [
        (&description.object_buffer, OBJECT_BLOCK_BINDING),
        (&description.material_buffer, MATERIAL_BLOCK_BINDING),
        (&description.light_buffer, LIGHT_BLOCK_BINDING),
        (&description.shadow_buffer, SHADOW_BLOCK_BINDING),
    ];
    for (name, binding) in blocks {
        match device.uniform_block_index(program, name) {
            Some(index) => device.uniform_block_binding(program, index, binding),
            None if warn_missing => log::warn!("Program '{}': uniform block '{}' not found", label, name),
            None => {}
        }
    }
}

/// Lazily resolved program
pub type ProgramReference = ResourceReference<Program>;

/// Loaded programs by name
pub type ProgramStore = ResourceStore<Program>;

impl ResourceStore<Program> {
    /// Build and insert every description
    ///
    /// Stops at the first program that fails to build and returns its error.
    pub fn load(
        &self,
        device: &mut dyn GraphicsDevice,
        descriptions: &HashMap<String, ProgramDescription>,
        shadow_slots: usize,
    ) -> RenderResult<usize> {
        let mut names: Vec<&String> = descriptions.keys().collect();
        names.sort();
        for name in names {
            let program = Program::new(device, name.clone(), &descriptions[name], shadow_slots)?;
            self.insert(name.clone(), program);
        }
        log::info!("Loaded {} programs", descriptions.len());
        Ok(descriptions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::{DeviceCommand, HeadlessDevice};

    const VERTEX: &str = "#version 330 core
layout(location = 0) in vec3 aPosition;
in vec3 aNormal;
uniform Object { mat4 world; mat4 wvp; };
void main() {}
";

    const FRAGMENT: &str = "#version 330 core
uniform Material { vec4 diffuse; };
uniform Lights { vec4 header; };
uniform sampler2D albedo;
uniform samplerCube pointShadowMaps[2];
uniform sampler2D spotShadowMaps[2];
void main() {}
";

    fn description() -> ProgramDescription {
        let mut description = ProgramDescription {
            vertex_shader: ShaderSource::Inline(VERTEX.to_string()),
            fragment_shader: ShaderSource::Inline(FRAGMENT.to_string()),
            textures: vec!["albedo".to_string(), "normalMap".to_string()],
            material: vec![MaterialProperty::float("diffuse", &[1.0, 1.0, 1.0, 1.0])],
            ..ProgramDescription::default()
        };
        description.attributes.insert(VertexAttribute::Position, "aPosition".to_string());
        description.attributes.insert(VertexAttribute::Normal, "aNormal".to_string());
        description
    }

    fn uploaded(device: &mut HeadlessDevice, layout: GeometryDescription) -> GeometryBuffer {
        let mut buffer = GeometryBuffer::new("test");
        let floats = layout.floats_per_vertex() * 3;
        buffer.add_mesh(&layout, &vec![0.0; floats], &[0, 1, 2]).unwrap();
        buffer.update_if_dirty(device).unwrap();
        buffer
    }

    #[test]
    fn test_construction_resolves_names() {
        let mut device = HeadlessDevice::new();
        let program = Program::new(&mut device, "lit", &description(), 2).unwrap();

        assert_eq!(device.block_binding(program.id(), "Object"), Some(OBJECT_BLOCK_BINDING));
        assert_eq!(device.block_binding(program.id(), "Material"), Some(MATERIAL_BLOCK_BINDING));
        assert_eq!(device.block_binding(program.id(), "Lights"), Some(LIGHT_BLOCK_BINDING));
        assert_eq!(device.block_binding(program.id(), "Shadows"), None);

        assert_eq!(program.texture_unit("albedo"), Some(0));
        assert_eq!(program.texture_unit("normalMap"), None);
        assert_eq!(device.sampler_unit(program.id(), "pointShadowMaps[0]"), Some(2));
        assert_eq!(device.sampler_unit(program.id(), "spotShadowMaps[1]"), Some(5));
        assert!(!program.is_shadow_capable());
    }

    #[test]
    fn test_too_few_bindings_is_an_error() {
        let mut device = HeadlessDevice::new().with_max_uniform_buffer_bindings(3);
        let error = Program::new(&mut device, "lit", &description(), 2).unwrap_err();
        assert!(matches!(error, RenderError::OutOfUniformBindings { required: 4, available: 3 }));
    }

    #[test]
    fn test_compile_failure_is_an_error() {
        let mut device = HeadlessDevice::new();
        let broken = ProgramDescription {
            fragment_shader: ShaderSource::Inline("#error broken\nvoid main() {}".to_string()),
            ..description()
        };
        let error = Program::new(&mut device, "broken", &broken, 2).unwrap_err();
        assert!(matches!(error, RenderError::ShaderCompilation { ref program, .. } if program == "broken"));
    }

    #[test]
    fn test_bind_to_sets_normalized_formats_in_order() {
        let mut device = HeadlessDevice::new();
        let program = Program::new(&mut device, "lit", &description(), 2).unwrap();
        let layout = GeometryDescription::position_normal_texcoord();
        let buffer = uploaded(&mut device, layout);

        assert!(program.bind_to(&mut device, &buffer));
        let formats = device.vertex_attributes(program.vertices.vao);
        assert_eq!(formats.len(), 2);
        assert_eq!((formats[0].offset, formats[0].normalized), (0, false));
        assert_eq!((formats[1].offset, formats[1].normalized), (12, true));
    }

    #[test]
    fn test_bind_to_caches_layout() {
        let mut device = HeadlessDevice::new();
        let program = Program::new(&mut device, "lit", &description(), 2).unwrap();
        let layout = GeometryDescription::position_normal_texcoord();
        let first = uploaded(&mut device, layout);
        let second = uploaded(&mut device, layout);

        assert!(program.bind_to(&mut device, &first));
        device.clear_log();
        assert!(program.bind_to(&mut device, &first));
        assert_eq!(device.commands(), &[DeviceCommand::BindVertexArray(program.vertices.vao)]);

        device.clear_log();
        assert!(program.bind_to(&mut device, &second));
        let gpu = second.gpu_buffers().unwrap();
        assert_eq!(
            device.commands(),
            &[
                DeviceCommand::VertexArrayBuffers(program.vertices.vao, gpu.vertex_buffer, gpu.index_buffer),
                DeviceCommand::BindVertexArray(program.vertices.vao),
            ]
        );
    }

    #[test]
    fn test_bind_to_rejects_missing_attribute() {
        let mut device = HeadlessDevice::new();
        let program = Program::new(&mut device, "lit", &description(), 2).unwrap();
        let buffer = uploaded(&mut device, GeometryDescription::new().with(VertexAttribute::Position, 3));
        assert!(!program.bind_to(&mut device, &buffer));
    }

    #[test]
    fn test_set_material_uploads_packed_bytes() {
        let mut device = HeadlessDevice::new();
        let program = Program::new(&mut device, "lit", &description(), 2).unwrap();
        let mut buffer = UniformBuffer::new(&mut device, MATERIAL_BLOCK_BINDING, 16).unwrap();
        let material = Material::new("red", "lit")
            .with_property("diffuse", crate::render::resources::materials::PropertyValue::float(&[1.0, 0.0, 0.0, 1.0]));

        program.set_material(&mut device, &mut buffer, &material, BufferUpdateMode::SubData).unwrap();
        let contents: Vec<f32> = bytemuck::pod_collect_to_vec(device.buffer_contents(buffer.id()).unwrap());
        assert_eq!(contents, vec![1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_depth_variant_ignores_unread_inputs() {
        let mut device = HeadlessDevice::new();
        let shadowed = ProgramDescription {
            shadow_vertex_shader: Some(ShaderSource::Inline(
                "#version 330 core\nin vec3 aPosition;\nuniform Object { mat4 world; };\nvoid main() {}\n".to_string(),
            )),
            shadow_fragment_shader: Some(ShaderSource::Inline("#version 330 core\nvoid main() {}\n".to_string())),
            ..description()
        };
        let program = Program::new(&mut device, "lit", &shadowed, 2).unwrap();
        let depth = program.depth.as_ref().unwrap();
        assert_eq!(depth.vertices.locations.len(), 1);
        assert!(depth.vertices.locations.contains_key(&VertexAttribute::Position));

        let buffer = uploaded(&mut device, GeometryDescription::new().with(VertexAttribute::Position, 3));
        assert!(program.bind_depth_to(&mut device, &buffer));
        assert!(!program.bind_to(&mut device, &buffer));
    }
}
