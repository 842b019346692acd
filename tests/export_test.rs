use egui::{Color32, Vec2, pos2};
use image::{Rgba, RgbaImage};
use inpaint_tools::codec::{EncodedImage, encode_png};
use inpaint_tools::export::ExportScope;
use inpaint_tools::geometry::Point;
use inpaint_tools::gesture::PointerEvent;
use inpaint_tools::scene::{Drawable, ObjectKind, SceneGraph, StrokeObject};
use inpaint_tools::{EditorConfig, EditorError, Session, ViewportTransform};

const BASE: [u8; 4] = [200, 10, 10, 255];

/// 64x48 red image in a 400x300 container
fn loaded_session() -> Session {
    let mut session = Session::new(EditorConfig::default());
    session.set_container_size(Vec2::new(400.0, 300.0));
    let png = encode_png(&RgbaImage::from_pixel(64, 48, Rgba(BASE))).unwrap();
    session.load_image(&png).unwrap();
    session
}

fn close(a: Rgba<u8>, b: [u8; 4]) -> bool {
    a.0.iter().zip(b).all(|(x, y)| x.abs_diff(y) <= 2)
}

mod export_tests {
    use super::*;

    #[test]
    fn test_dimensions_match_base_regardless_of_viewport() {
        let mut session = loaded_session();
        session.set_tool(inpaint_tools::Tool::Pan);
        session.handle_pointer(PointerEvent::Down {
            pos: pos2(100.0, 100.0),
            modifiers: Default::default(),
        });
        session.handle_pointer(PointerEvent::Up {
            pos: pos2(140.0, 80.0),
        });
        assert_eq!(session.viewport().pan, Vec2::new(40.0, -20.0));
        let viewport_before = *session.viewport();

        let data = session.get_export_data().unwrap();
        assert_eq!((data.image.width, data.image.height), (64, 48));
        assert_eq!((data.mask.width, data.mask.height), (64, 48));
        assert_eq!(*session.viewport(), viewport_before);
    }

    #[test]
    fn test_mask_is_white_strokes_on_black() {
        let mut session = loaded_session();
        session.add_mask_stroke(vec![Point::new(10.0, 24.0), Point::new(30.0, 24.0)], Some(8.0));

        let data = session.get_export_data().unwrap();
        let mask = data.mask.decode().unwrap();
        assert!(close(*mask.get_pixel(20, 24), [255, 255, 255, 255]));
        assert!(close(*mask.get_pixel(55, 5), [0, 0, 0, 255]));

        // Strokes never leak into the image
        let image = data.image.decode().unwrap();
        assert!(close(*image.get_pixel(20, 24), BASE));
    }

    #[test]
    fn test_export_restores_scene_state() {
        let mut session = loaded_session();
        session.add_mask_stroke(vec![Point::new(10.0, 24.0), Point::new(30.0, 24.0)], None);
        let brush = session.config().brush_color;
        let background = session.scene().background;

        session.get_export_data().unwrap();

        let stroke = session
            .scene()
            .list_objects(Some(ObjectKind::Stroke))
            .next()
            .unwrap();
        assert!(stroke.flags.visible);
        assert_eq!(stroke.as_stroke().unwrap().color, brush);
        assert_eq!(session.scene().background, background);
        assert!(
            session
                .scene()
                .list_objects(Some(ObjectKind::Image))
                .all(|o| o.flags.visible)
        );
    }

    #[test]
    fn test_export_ignores_pending_result() {
        let mut session = loaded_session();
        let result = EncodedImage::from_rgba(&RgbaImage::from_pixel(64, 48, Rgba([0, 0, 255, 255])))
            .unwrap();
        session.set_result(&result.to_base64()).unwrap();

        let data = session.get_export_data().unwrap();
        let image = data.image.decode().unwrap();
        assert!(close(*image.get_pixel(32, 24), BASE));
        assert!(session.scene().pending_result().unwrap().flags.visible);
    }

    #[test]
    fn test_export_follows_moved_image() {
        let mut session = loaded_session();
        let before = session.get_export_data().unwrap();

        let mut moved = loaded_session();
        moved.set_tool(inpaint_tools::Tool::Select);
        moved.handle_pointer(PointerEvent::Down {
            pos: pos2(200.0, 150.0),
            modifiers: Default::default(),
        });
        moved.handle_pointer(PointerEvent::Up {
            pos: pos2(250.0, 150.0),
        });
        assert!(moved.scene().base_bounds().unwrap().min_x > 0.0);

        let after = moved.get_export_data().unwrap();
        assert_eq!((after.image.width, after.image.height), (64, 48));
        assert_eq!(after.image.decode().unwrap(), before.image.decode().unwrap());
    }

    #[test]
    fn test_nothing_to_export_without_image() {
        let mut session = Session::new(EditorConfig::default());
        assert!(session.get_export_data().is_none());
        assert!(matches!(
            session.export_image_and_mask(),
            Err(EditorError::NothingToExport)
        ));
    }

    #[test]
    fn test_download_renders_visible_canvas() {
        let mut session = loaded_session();
        session.set_container_size(Vec2::new(800.0, 300.0));
        let encoded = session.download().unwrap();
        assert_eq!((encoded.width, encoded.height), (1600, 600));

        let pixels = encoded.decode().unwrap();
        // Image centered in the container; the sides show the background
        assert!(close(*pixels.get_pixel(800, 300), BASE));
        assert!(close(*pixels.get_pixel(2, 2), [0x26, 0x26, 0x26, 255]));
    }
}

mod scope_tests {
    use super::*;

    #[test]
    fn test_scope_restores_everything_on_drop() {
        let mut scene = SceneGraph::new();
        let id = scene.add_object(Drawable::Stroke(StrokeObject::new(
            vec![Point::new(1.0, 1.0)],
            4.0,
            Color32::RED,
        )));
        let mut viewport = ViewportTransform::default();
        viewport.zoom = 3.0;
        viewport.pan = Vec2::new(10.0, -4.0);

        {
            let mut scope = ExportScope::begin(&mut scene, &mut viewport);
            assert_eq!(scope.viewport().zoom, 1.0);
            assert_eq!(scope.viewport().pan, Vec2::ZERO);

            scope.set_visible(id, false);
            scope.set_visible(id, true);
            scope.set_visible(id, false);
            scope.force_stroke_color(Color32::WHITE);
            scope.set_background(Color32::BLACK);
            assert!(!scope.scene().get(id).unwrap().flags.visible);
        }

        let obj = scene.get(id).unwrap();
        assert!(obj.flags.visible);
        assert_eq!(obj.as_stroke().unwrap().color, Color32::RED);
        assert_eq!(scene.background, inpaint_tools::scene::DEFAULT_BACKGROUND);
        assert_eq!(viewport.zoom, 3.0);
        assert_eq!(viewport.pan, Vec2::new(10.0, -4.0));
    }
}
