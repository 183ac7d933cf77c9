//! Shared scene fixture for the integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use drawcall_engine::prelude::*;
use drawcall_engine::render::resources::{MaterialProperty, PropertyValue, ShaderSource};

pub const VERTEX: &str = "#version 330 core
layout(location = 0) in vec3 aPosition;
in vec3 aNormal;
uniform Object { mat4 world; mat4 view; mat4 projection; };
void main() {}
";

pub const FRAGMENT: &str = "#version 330 core
uniform Material { vec4 diffuse; float roughness; ivec3 flags; };
uniform Lights { ivec4 counts; };
uniform Shadows { ivec4 shadowCounts; };
uniform sampler2D albedo;
uniform samplerCube pointShadowMaps[4];
uniform sampler2D spotShadowMaps[4];
uniform sampler2DArray cascadeShadowMap;
out vec4 color;
void main() {}
";

pub const DEPTH_VERTEX: &str = "#version 330 core
in vec3 aPosition;
uniform Object { mat4 world; };
void main() {}
";

pub const DEPTH_FRAGMENT: &str = "#version 330 core
void main() {}
";

pub const DIFFUSE_DEFAULT: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

fn description(shadow_capable: bool) -> ProgramDescription {
    let mut description = ProgramDescription {
        vertex_shader: ShaderSource::Inline(VERTEX.to_string()),
        fragment_shader: ShaderSource::Inline(FRAGMENT.to_string()),
        textures: vec!["albedo".to_string()],
        material: vec![
            MaterialProperty::float("diffuse", &DIFFUSE_DEFAULT),
            MaterialProperty::float("roughness", &[0.5]),
            MaterialProperty::int("flags", &[0, 0, 0]),
        ],
        ..ProgramDescription::default()
    };
    if shadow_capable {
        description.shadow_vertex_shader = Some(ShaderSource::Inline(DEPTH_VERTEX.to_string()));
        description.shadow_fragment_shader = Some(ShaderSource::Inline(DEPTH_FRAGMENT.to_string()));
    }
    description.attributes.insert(VertexAttribute::Position, "aPosition".to_string());
    description.attributes.insert(VertexAttribute::Normal, "aNormal".to_string());
    description
}

/// Two programs ("lit" casts shadows, "flat" does not), three materials and
/// three meshes sharing one geometry buffer
pub struct Scene {
    pub renderer: DrawCallRenderer,
    pub context: Rc<RenderContext>,
    pub buffer: Rc<RefCell<GeometryBuffer>>,
}

pub fn scene(config: RendererConfig) -> Scene {
    drawcall_engine::foundation::logging::init_with_level(log::LevelFilter::Warn);
    let mut device = HeadlessDevice::new();
    let context = Rc::new(RenderContext::new());
    let slots = config.max_shadow_light_count;

    context
        .programs
        .insert("lit", Program::new(&mut device, "lit", &description(true), slots).unwrap());
    context
        .programs
        .insert("flat", Program::new(&mut device, "flat", &description(false), slots).unwrap());

    context.materials.insert(
        "stone",
        Material::new("stone", "lit").with_property("diffuse", PropertyValue::float(&[0.5, 0.5, 0.5, 1.0])),
    );
    context.materials.insert("paint", Material::new("paint", "flat"));
    context
        .materials
        .insert("glass", Material::new("glass", "flat").with_transparency(true));

    let buffer = Rc::new(RefCell::new(GeometryBuffer::new("scene")));
    let layout = GeometryDescription::new()
        .with(VertexAttribute::Position, 3)
        .with(VertexAttribute::Normal, 3);
    for (name, vertex_count, index_count) in [("tri", 3, 3), ("quad", 4, 6), ("fan", 5, 9)] {
        let vertices = vec![0.0f32; vertex_count * 6];
        let indices: Vec<u32> = (0..index_count).map(|i| i as u32 % vertex_count as u32).collect();
        let mesh = Mesh::new(name, &buffer, &layout, &vertices, &indices).unwrap();
        context.meshes.insert(name, mesh);
    }

    let renderer = DrawCallRenderer::new(Box::new(device), Rc::clone(&context), config).unwrap();
    Scene { renderer, context, buffer }
}

pub fn headless(renderer: &DrawCallRenderer) -> &HeadlessDevice {
    renderer.device().as_any().downcast_ref::<HeadlessDevice>().unwrap()
}

pub fn headless_mut(renderer: &mut DrawCallRenderer) -> &mut HeadlessDevice {
    renderer.device_mut().as_any_mut().downcast_mut::<HeadlessDevice>().unwrap()
}

pub fn camera() -> (Mat4, Mat4, Frustum) {
    let frustum = Frustum::new(0.1, 200.0, std::f32::consts::FRAC_PI_3, 16.0 / 9.0);
    let view = Mat4::look_at(Vec3::new(0.0, 5.0, 10.0), Vec3::zeros(), Vec3::y());
    (view, frustum.projection(), frustum)
}

pub fn draw(renderer: &mut DrawCallRenderer) {
    let (view, projection, frustum) = camera();
    renderer.draw(&view, &projection, &frustum).unwrap();
}
