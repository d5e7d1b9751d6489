//! End-to-end frame submission without a GPU: primitives in, frame plans out.

use std::time::Duration;

use lumen_animation::{
    AnimatedProperty, AnimationTarget, AnimationValue, Easing, ManualClock,
};
use lumen_core::{
    Color, FaceId, FontStyle, FontWeight, ScaleChange, Size, UnderlineStyle, ViewId, WindowId,
};
use lumen_display::{DisplayConfig, DisplaySession, WindowInfo};
use lumen_gpu::{BatchBinding, ExternalHandle, FramePlan, PipelineKind, PixelFormat};
use lumen_text::{BlockRasterizer, GlyphKey};

const WINDOW: WindowId = WindowId(1);

fn session() -> (DisplaySession, ManualClock) {
    let clock = ManualClock::new();
    let session = DisplaySession::with_parts(
        DisplayConfig::default(),
        Box::new(BlockRasterizer::new()),
        Box::new(clock.clone()),
    );
    (session, clock)
}

fn red_on_blue(session: &mut DisplaySession, id: FaceId) {
    session.set_face(
        id,
        Color::rgb(1.0, 0.0, 0.0),
        Some(Color::rgb(0.0, 0.0, 1.0)),
        FontWeight::NORMAL,
        FontStyle::Normal,
        UnderlineStyle::None,
        "monospace",
    );
}

fn char_frame(session: &mut DisplaySession, ch: char, face: FaceId) -> FramePlan {
    session.begin_frame(WINDOW, 800.0, 600.0, Color::WHITE);
    session.add_char(ch, 0.0, 0.0, 8.0, 12.0, 4.0, face);
    session.end_frame(WINDOW).unwrap();
    session.last_plan(WINDOW).unwrap().clone()
}

#[test]
fn single_char_frame_is_one_rect_and_one_glyph_draw() {
    let (mut session, _) = session();
    red_on_blue(&mut session, FaceId(1));

    let plan = char_frame(&mut session, 'A', FaceId(1));

    assert_eq!(plan.batches.len(), 2);
    assert_eq!(plan.batches[0].pipeline, PipelineKind::Rect);
    assert_eq!(plan.batches[0].vertex_count(), 6);
    assert_eq!(plan.rect_vertices[0].color, Color::WHITE.to_array());

    assert_eq!(plan.batches[1].pipeline, PipelineKind::Glyph);
    assert_eq!(plan.batches[1].binding, BatchBinding::AtlasPage(0));
    assert_eq!(plan.batches[1].vertex_count(), 6);
    assert!(plan
        .textured_vertices
        .iter()
        .all(|v| v.color == Color::rgb(1.0, 0.0, 0.0).to_array()));
    assert_eq!(plan.skipped_glyphs, 0);
}

#[test]
fn scale_change_keys_new_glyphs_and_keeps_logical_size() {
    let (mut session, _) = session();
    assert_eq!(session.resize(WINDOW, 800.0, 600.0, 1.0), None);

    let plan = char_frame(&mut session, 'A', FaceId(0));
    assert_eq!(plan.physical_size, (800, 600));
    let width_1x = plan.textured_vertices[1].position[0] - plan.textured_vertices[0].position[0];
    assert_eq!(width_1x, 7.0);

    assert_eq!(
        session.resize(WINDOW, 800.0, 600.0, 2.0),
        Some(ScaleChange { old: 1, new: 2 })
    );
    let plan = char_frame(&mut session, 'A', FaceId(0));
    assert_eq!(plan.physical_size, (1600, 1200));
    let width_2x = plan.textured_vertices[1].position[0] - plan.textured_vertices[0].position[0];
    assert_eq!(width_2x, 14.0);

    let atlas = session.atlas();
    assert!(atlas.contains(&GlyphKey::new('A', FaceId(0), 1)));
    assert!(atlas.contains(&GlyphKey::new('A', FaceId(0), 2)));
    assert_eq!(atlas.len(), 2);

    assert_eq!(
        session.window_size(WINDOW),
        Some(WindowInfo {
            logical: Size::new(800.0, 600.0),
            physical: (1600, 1200),
            scale: 2,
        })
    );
}

#[test]
fn only_the_newest_external_frame_is_rendered() {
    let (mut session, _) = session();
    let view = ViewId(3);
    let frame = |size: u32| ExternalHandle::SharedMemory {
        pixels: vec![0x80; (size * size * 4) as usize].into(),
        stride: size * 4,
    };

    let first = session.import_external_frame(view, frame(4), 4, 4, PixelFormat::Bgra8, None);
    assert!(first.is_none());
    let discarded = session
        .import_external_frame(view, frame(8), 8, 8, PixelFormat::Bgra8, None)
        .expect("first frame is returned unrendered");
    assert_eq!(discarded.width, 4);

    session.begin_frame(WINDOW, 800.0, 600.0, Color::WHITE);
    session.add_external_view(view, 10.0, 10.0, 320.0, 240.0);
    session.end_frame(WINDOW).unwrap();

    let importer = session.importer();
    assert_eq!(importer.frames_imported(view), 1);
    let stats = importer.stats();
    assert_eq!(stats.direct + stats.copied, 1);
    assert_eq!(stats.failed, 0);

    let plan = session.last_plan(WINDOW).unwrap();
    let views: Vec<_> = plan
        .batches_of(PipelineKind::Texture)
        .map(|b| b.binding)
        .collect();
    assert_eq!(views, vec![BatchBinding::View(view)]);
}

#[test]
fn view_without_frames_is_not_drawn() {
    let (mut session, _) = session();
    session.begin_frame(WINDOW, 800.0, 600.0, Color::WHITE);
    session.add_external_view(ViewId(9), 0.0, 0.0, 100.0, 100.0);
    session.end_frame(WINDOW).unwrap();
    let plan = session.last_plan(WINDOW).unwrap();
    assert_eq!(plan.batches_of(PipelineKind::Texture).count(), 0);
}

#[test]
fn identical_input_builds_identical_plans() {
    let build = || {
        let (mut session, clock) = session();
        red_on_blue(&mut session, FaceId(4));
        session.resize(WINDOW, 640.0, 480.0, 2.0);
        session.smooth_scroll(WINDOW, 0.0, 32.0, Some(Duration::from_millis(100)));
        clock.advance(Duration::from_millis(40));

        session.begin_frame(WINDOW, 640.0, 480.0, Color::BLACK);
        session.add_stretch(0.0, 0.0, 640.0, 16.0, FaceId(4));
        for (i, ch) in "hello".chars().enumerate() {
            session.add_char(ch, i as f32 * 8.0, 0.0, 8.0, 12.0, 4.0, FaceId(4));
        }
        session.add_border(0.0, 470.0, 640.0, 1.0, Color::WHITE);
        session.end_frame(WINDOW).unwrap();
        session.last_plan(WINDOW).unwrap().clone()
    };

    assert_eq!(build(), build());
}

#[test]
fn animated_opacity_fades_glyphs() {
    let (mut session, clock) = session();
    let id = session.start_animation(
        AnimationTarget::Window(WINDOW),
        AnimatedProperty::Opacity,
        AnimationValue::Scalar(0.0),
        AnimationValue::Scalar(1.0),
        Duration::from_millis(100),
        Easing::Linear,
    );

    clock.advance(Duration::from_millis(50));
    let plan = char_frame(&mut session, 'x', FaceId(0));
    assert_eq!(plan.textured_vertices[0].color[3], 0.5);
    assert!(session.needs_frames());

    assert!(session.cancel_animation(id));
    assert!(!session.needs_frames());
}

#[test]
fn frames_for_two_windows_are_independent() {
    let (mut session, _) = session();
    let other = WindowId(2);

    session.begin_frame(WINDOW, 100.0, 100.0, Color::WHITE);
    session.add_border(0.0, 0.0, 10.0, 1.0, Color::BLACK);
    session.end_frame(WINDOW).unwrap();

    session.begin_frame(other, 200.0, 50.0, Color::BLACK);
    session.end_frame(other).unwrap();

    assert_eq!(session.last_plan(WINDOW).unwrap().rect_vertices.len(), 12);
    assert_eq!(session.last_plan(other).unwrap().rect_vertices.len(), 6);
    assert_eq!(session.last_plan(other).unwrap().frame_number, 1);
}
