//! Main pass behaviour observed through the headless device

mod common;

use approx::assert_relative_eq;
use common::{camera, draw, headless, headless_mut, scene, DIFFUSE_DEFAULT};
use drawcall_engine::prelude::*;
use drawcall_engine::render::backends::DeviceCommand;
use drawcall_engine::render::resources::{MATERIAL_BLOCK_BINDING, OBJECT_BLOCK_BINDING};
use std::cell::RefCell;
use std::rc::Rc;

fn floats(bytes: &[u8], count: usize) -> Vec<f32> {
    bytemuck::pod_collect_to_vec(&bytes[..count * 4])
}

#[test]
fn test_main_pass_draws_with_mesh_offsets() {
    let mut scene = scene(RendererConfig::new());
    scene.renderer.submit_draw_call(DrawCall::new("fan", "paint", Mat4::identity()));
    scene.renderer.submit_draw_call(DrawCall::new("quad", "paint", Mat4::identity()));
    draw(&mut scene.renderer);

    let draws = headless(&scene.renderer).main_pass_draws();
    assert_eq!(draws.len(), 2);
    assert_eq!((draws[0].index_count, draws[0].first_index, draws[0].base_vertex), (9, 9, 7));
    assert_eq!((draws[1].index_count, draws[1].first_index, draws[1].base_vertex), (6, 3, 3));
    assert!(draws.iter().all(|draw| draw.in_bounds));
}

#[test]
fn test_offsets_follow_mesh_removal() {
    let mut scene = scene(RendererConfig::new());
    scene.renderer.submit_draw_call(DrawCall::new("fan", "paint", Mat4::identity()));
    scene.context.meshes.remove("tri");
    draw(&mut scene.renderer);

    let draws = headless(&scene.renderer).main_pass_draws();
    assert_eq!(draws.len(), 1);
    assert_eq!((draws[0].first_index, draws[0].base_vertex), (6, 4));
    assert!(draws[0].in_bounds);
    assert_eq!(scene.buffer.borrow().mesh_count(), 2);
}

#[test]
fn test_program_activated_once_per_group() {
    let mut scene = scene(RendererConfig::new());
    for _ in 0..3 {
        scene.renderer.submit_draw_call(DrawCall::new("tri", "stone", Mat4::identity()));
        scene.renderer.submit_draw_call(DrawCall::new("quad", "paint", Mat4::identity()));
    }
    headless_mut(&mut scene.renderer).clear_log();
    draw(&mut scene.renderer);

    assert_eq!(scene.renderer.group_count(), 2);
    assert_eq!(scene.renderer.group_len("lit"), 3);
    assert_eq!(scene.renderer.group_len("flat"), 3);

    let stats = scene.renderer.frame_stats();
    assert_eq!(stats.draw_calls_issued, 6);
    assert_eq!(stats.program_switches, 2);

    let uses = headless(&scene.renderer)
        .commands()
        .iter()
        .filter(|command| matches!(command, DeviceCommand::UseProgram(_)))
        .count();
    assert_eq!(uses, 2);
}

#[test]
fn test_vertex_layout_is_configured_once_per_group() {
    let mut scene = scene(RendererConfig::new());
    for _ in 0..4 {
        scene.renderer.submit_draw_call(DrawCall::new("tri", "paint", Mat4::identity()));
    }
    draw(&mut scene.renderer);
    headless_mut(&mut scene.renderer).clear_log();
    draw(&mut scene.renderer);

    let commands = headless(&scene.renderer).commands();
    let binds = commands.iter().filter(|c| matches!(c, DeviceCommand::BindVertexArray(_))).count();
    let attaches = commands.iter().filter(|c| matches!(c, DeviceCommand::VertexArrayBuffers(..))).count();
    assert_eq!(binds, 1);
    assert_eq!(attaches, 0);
}

#[test]
fn test_object_block_holds_matrices() {
    let mut scene = scene(RendererConfig::new());
    let world = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
    scene.renderer.submit_draw_call(DrawCall::new("tri", "paint", world));
    let (view, projection, frustum) = camera();
    scene.renderer.draw(&view, &projection, &frustum).unwrap();

    let draws = headless(&scene.renderer).main_pass_draws();
    let record = draws[0];
    let world_column = record.uniform_matrix(OBJECT_BLOCK_BINDING, 0).unwrap()[3];
    assert_relative_eq!(world_column[0], 1.0);
    assert_relative_eq!(world_column[2], 3.0);

    let expected = projection * view * world;
    let wvp = record.uniform_matrix(OBJECT_BLOCK_BINDING, 5).unwrap();
    for column in 0..4 {
        for row in 0..4 {
            assert_relative_eq!(wvp[column][row], expected[(row, column)], epsilon = 1e-4);
        }
    }
}

#[test]
fn test_shared_transform_is_read_each_frame() {
    let mut scene = scene(RendererConfig::new());
    let transform = std::rc::Rc::new(std::cell::Cell::new(Mat4::identity()));
    scene
        .renderer
        .submit_draw_call(DrawCall::with_shared_transform("tri", "paint", std::rc::Rc::clone(&transform)));
    draw(&mut scene.renderer);

    transform.set(Mat4::new_translation(&Vec3::new(0.0, 7.0, 0.0)));
    headless_mut(&mut scene.renderer).clear_log();
    draw(&mut scene.renderer);

    assert!(!scene.renderer.is_group_cache_dirty());
    let draws = headless(&scene.renderer).main_pass_draws();
    let world = draws[0].uniform_matrix(OBJECT_BLOCK_BINDING, 0).unwrap();
    assert_relative_eq!(world[3][1], 7.0);
}

#[test]
fn test_material_block_uses_overrides_and_defaults() {
    let mut scene = scene(RendererConfig::new());
    scene.renderer.submit_draw_call(DrawCall::new("tri", "stone", Mat4::identity()));
    scene.renderer.submit_draw_call(DrawCall::new("tri", "paint", Mat4::identity()));
    draw(&mut scene.renderer);

    let draws = headless(&scene.renderer).main_pass_draws();
    // Groups are ordered by program name: "flat" before "lit"
    let paint = floats(&draws[0].uniforms[&MATERIAL_BLOCK_BINDING], 5);
    let stone = floats(&draws[1].uniforms[&MATERIAL_BLOCK_BINDING], 5);
    assert_eq!(&paint[..4], &DIFFUSE_DEFAULT);
    assert_eq!(&stone[..4], &[0.5, 0.5, 0.5, 1.0]);
    assert_relative_eq!(stone[4], 0.5);
}

#[test]
fn test_missing_mesh_is_skipped_not_fatal() {
    let mut scene = scene(RendererConfig::new());
    scene.renderer.submit_draw_call(DrawCall::new("missing", "paint", Mat4::identity()));
    scene.renderer.submit_draw_call(DrawCall::new("tri", "paint", Mat4::identity()));
    draw(&mut scene.renderer);

    let stats = scene.renderer.frame_stats();
    assert_eq!(stats.draw_calls_issued, 1);
    assert_eq!(stats.draw_calls_skipped, 1);
}

#[test]
fn test_transparent_calls_drawn_back_to_front() {
    let config = RendererConfig::new().with_draw_order(DrawOrder::TransparencySorted);
    let mut scene = scene(config);
    let near = Mat4::new_translation(&Vec3::new(0.0, 0.0, 5.0));
    let far = Mat4::new_translation(&Vec3::new(0.0, 0.0, -20.0));
    scene.renderer.submit_draw_call(DrawCall::new("tri", "glass", near).with_label("near"));
    scene.renderer.submit_draw_call(DrawCall::new("quad", "glass", far).with_label("far"));
    scene.renderer.submit_draw_call(DrawCall::new("fan", "stone", Mat4::identity()));
    draw(&mut scene.renderer);

    let draws = headless(&scene.renderer).main_pass_draws();
    let order: Vec<u32> = draws.iter().map(|draw| draw.index_count).collect();
    // opaque fan, then the far quad, then the near triangle
    assert_eq!(order, vec![9, 6, 3]);
}

#[test]
fn test_viewport_restored_for_main_pass() {
    let mut scene = scene(RendererConfig::new().with_viewport(800, 600));
    scene.renderer.submit_draw_call(DrawCall::new("tri", "stone", Mat4::identity()));
    scene
        .renderer
        .set_light(0, Light::spot(Vec3::new(0.0, 10.0, 0.0), -Vec3::y(), Vec3::new(1.0, 1.0, 1.0), 1.0, 30.0, 0.6));
    draw(&mut scene.renderer);
    assert_eq!(headless(&scene.renderer).viewport(), (800, 600));

    scene.renderer.set_viewport(640, 480);
    draw(&mut scene.renderer);
    assert_eq!(headless(&scene.renderer).viewport(), (640, 480));
}

#[test]
fn test_every_update_mode_renders_a_frame() {
    let modes = [
        BufferUpdateMode::SubData,
        BufferUpdateMode::InvalidateSubData,
        BufferUpdateMode::MapInvalidate,
        BufferUpdateMode::Orphan,
        BufferUpdateMode::MapWrite,
    ];
    for mode in modes {
        let mut scene = scene(RendererConfig::new().with_update_mode(mode));
        let world = Mat4::new_translation(&Vec3::new(4.0, 0.0, 0.0));
        scene.renderer.submit_draw_call(DrawCall::new("tri", "stone", world));
        scene
            .renderer
            .set_light(0, Light::spot(Vec3::new(0.0, 10.0, 0.0), -Vec3::y(), Vec3::new(1.0, 1.0, 1.0), 1.0, 30.0, 0.4));
        let (view, projection, frustum) = camera();
        assert!(scene.renderer.draw(&view, &projection, &frustum).is_ok(), "{:?}", mode);

        let stats = scene.renderer.frame_stats();
        assert_eq!(stats.draw_calls_issued, 1, "{:?}", mode);
        assert_eq!(stats.shadow_draws, 1, "{:?}", mode);
        let draws = headless(&scene.renderer).main_pass_draws();
        let world_column = draws[0].uniform_matrix(OBJECT_BLOCK_BINDING, 0).unwrap()[3];
        assert_relative_eq!(world_column[0], 4.0);
        let diffuse = floats(&draws[0].uniforms[&MATERIAL_BLOCK_BINDING], 4);
        assert_eq!(diffuse, vec![0.5, 0.5, 0.5, 1.0], "{:?}", mode);
    }
}

#[test]
fn test_alternating_buffers_rebind_each_switch() {
    let mut scene = scene(RendererConfig::new());
    let other = Rc::new(RefCell::new(GeometryBuffer::new("other")));
    let layout = GeometryDescription::new()
        .with(VertexAttribute::Position, 3)
        .with(VertexAttribute::Normal, 3);
    let mesh = Mesh::new("other", &other, &layout, &[0.0; 18], &[0, 1, 2]).unwrap();
    scene.context.meshes.insert("other", mesh);

    for mesh in ["tri", "other", "quad"] {
        scene.renderer.submit_draw_call(DrawCall::new(mesh, "paint", Mat4::identity()));
    }
    draw(&mut scene.renderer);
    headless_mut(&mut scene.renderer).clear_log();
    draw(&mut scene.renderer);

    assert_eq!(scene.renderer.frame_stats().draw_calls_issued, 3);
    let device = headless(&scene.renderer);
    let commands = device.commands();
    let binds = commands.iter().filter(|c| matches!(c, DeviceCommand::BindVertexArray(_))).count();
    let attaches = commands.iter().filter(|c| matches!(c, DeviceCommand::VertexArrayBuffers(..))).count();
    assert_eq!(binds, 3);
    // the first draw matches the buffer left attached by the previous frame
    assert_eq!(attaches, 2);
    assert!(!commands.iter().any(|c| matches!(c, DeviceCommand::VertexAttributeFormat(..))));

    let first_indices: Vec<u32> = device.main_pass_draws().iter().map(|draw| draw.first_index).collect();
    assert_eq!(first_indices, vec![0, 0, 3]);
}
