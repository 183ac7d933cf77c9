//! Loading programs, materials and textures from parsed descriptions

mod common;

use std::collections::HashMap;
use std::rc::Rc;

use common::{draw, headless, FRAGMENT, VERTEX};
use drawcall_engine::prelude::*;
use drawcall_engine::render::api::{TextureDescriptor, TextureFormat, TextureId, TextureKind};
use drawcall_engine::render::resources::{
    MaterialProperty, ResourceResolver, SerializableMaterial, ShaderSource, Texture,
};

const MATERIALS: &str = r#"{
    "brick": (
        program: "lit",
        textures: { "albedo": "atlas-walls" },
        properties: { "roughness": Float((0.9, 0.0, 0.0, 0.0)) },
    ),
    "plaster": (
        program: "lit",
    ),
}"#;

fn programs() -> HashMap<String, ProgramDescription> {
    let mut description = ProgramDescription {
        vertex_shader: ShaderSource::Inline(VERTEX.to_string()),
        fragment_shader: ShaderSource::Inline(FRAGMENT.to_string()),
        textures: vec!["albedo".to_string()],
        material: vec![
            MaterialProperty::float("diffuse", &[1.0, 1.0, 1.0, 1.0]),
            MaterialProperty::float("roughness", &[0.5]),
            MaterialProperty::int("flags", &[0, 0, 0]),
        ],
        ..ProgramDescription::default()
    };
    description.attributes.insert(VertexAttribute::Position, "aPosition".to_string());
    HashMap::from([("lit".to_string(), description)])
}

#[test]
fn test_loaded_resources_render() {
    let mut device = HeadlessDevice::new();
    let context = Rc::new(RenderContext::new());
    let config = RendererConfig::new();

    let loaded = context
        .programs
        .load(&mut device, &programs(), config.max_shadow_light_count)
        .unwrap();
    assert_eq!(loaded, 1);

    let records: HashMap<String, SerializableMaterial> = ron::from_str(MATERIALS).unwrap();
    assert_eq!(context.materials.load(&records), 2);

    let descriptor = TextureDescriptor {
        kind: TextureKind::Texture2D,
        format: TextureFormat::Rgba8,
        width: 64,
        height: 64,
    };
    let texture = device.create_texture(&descriptor).unwrap();
    context.textures.insert_atlas("walls", Texture::new_2d(texture, 64, 64));

    let buffer = Rc::new(std::cell::RefCell::new(GeometryBuffer::new("walls")));
    let layout = GeometryDescription::new().with(VertexAttribute::Position, 3);
    let mesh = Mesh::new("wall", &buffer, &layout, &[0.0; 12], &[0, 1, 2, 2, 3, 0]).unwrap();
    context.meshes.insert("wall", mesh);

    let mut renderer = DrawCallRenderer::new(Box::new(device), Rc::clone(&context), config).unwrap();
    renderer.submit_draw_call(DrawCall::new("wall", "brick", Mat4::identity()));
    renderer.submit_draw_call(DrawCall::new("wall", "plaster", Mat4::identity()));
    draw(&mut renderer);

    let albedo = context.programs.resolve("lit").and_then(|program| program.texture_unit("albedo")).unwrap();
    let draws = headless(&renderer).main_pass_draws();
    assert_eq!(draws.len(), 2);
    let bound: Vec<Option<TextureId>> =
        draws.iter().map(|draw| draw.textures.get(&albedo).copied().flatten()).collect();
    // submission order inside the "lit" group
    assert_eq!(bound, vec![Some(texture), None]);
}
