use egui::{Color32, Vec2, pos2};
use inpaint_tools::ViewportTransform;
use inpaint_tools::geometry::Placement;
use inpaint_tools::gesture::{
    GestureContext, GestureOutcome, GestureRouter, Modifiers, PointerEvent, TouchEvent, TouchPhase,
};
use inpaint_tools::mode::{BrushStyle, InteractionMode, derive_flags};
use inpaint_tools::scene::{AssetId, ImageObject, ObjectRole, SceneGraph};

const BRUSH: BrushStyle = BrushStyle {
    width: 10.0,
    color: Color32::RED,
};

struct Fixture {
    viewport: ViewportTransform,
    scene: SceneGraph,
    router: GestureRouter,
}

impl Fixture {
    /// 200x100 image fitted into a 400x400 container: zoom 2, pan (0, 100)
    fn new() -> Self {
        let mut scene = SceneGraph::new();
        let id = scene.set_base_image(ImageObject {
            asset: AssetId(1),
            width: 200,
            height: 100,
            placement: Placement::default(),
        });
        if let Some(obj) = scene.get_mut(id) {
            obj.flags = derive_flags(InteractionMode::Select, ObjectRole::BaseImage, true);
        }
        let mut viewport = ViewportTransform::default();
        viewport.fit_bounds(scene.base_bounds().unwrap(), Vec2::new(400.0, 400.0));
        Self {
            viewport,
            scene,
            router: GestureRouter::new(),
        }
    }

    fn pointer(&mut self, mode: InteractionMode, event: PointerEvent) -> Option<GestureOutcome> {
        let mut ctx = GestureContext {
            viewport: &mut self.viewport,
            scene: &mut self.scene,
            mode,
            brush: BRUSH,
        };
        self.router.handle_pointer(event, &mut ctx)
    }

    fn touch(
        &mut self,
        mode: InteractionMode,
        id: u64,
        phase: TouchPhase,
        x: f32,
        y: f32,
    ) -> Option<GestureOutcome> {
        let mut ctx = GestureContext {
            viewport: &mut self.viewport,
            scene: &mut self.scene,
            mode,
            brush: BRUSH,
        };
        self.router.handle_touch(
            TouchEvent {
                id,
                phase,
                pos: pos2(x, y),
            },
            &mut ctx,
        )
    }
}

fn down(x: f32, y: f32) -> PointerEvent {
    PointerEvent::Down {
        pos: pos2(x, y),
        modifiers: Modifiers::default(),
    }
}

fn moved(x: f32, y: f32) -> PointerEvent {
    PointerEvent::Move {
        pos: pos2(x, y),
        modifiers: Modifiers::default(),
    }
}

fn up(x: f32, y: f32) -> PointerEvent {
    PointerEvent::Up { pos: pos2(x, y) }
}

mod pointer_tests {
    use super::*;

    #[test]
    fn test_fixture_viewport() {
        let f = Fixture::new();
        assert_eq!(f.viewport.zoom, 2.0);
        assert_eq!(f.viewport.pan, Vec2::new(0.0, 100.0));
    }

    #[test]
    fn test_paint_stroke_in_scene_space() {
        let mut f = Fixture::new();
        let mode = InteractionMode::Paint;
        assert_eq!(f.pointer(mode, down(20.0, 120.0)), Some(GestureOutcome::StrokeProgress));
        f.pointer(mode, moved(60.0, 140.0));
        assert_eq!(f.router.stroke_in_progress().map(<[_]>::len), Some(2));

        let Some(GestureOutcome::PathCreated(stroke)) = f.pointer(mode, up(60.0, 140.0)) else {
            panic!("expected a finished stroke");
        };
        assert_eq!(stroke.points.len(), 2);
        assert_eq!((stroke.points[0].x, stroke.points[0].y), (10.0, 10.0));
        assert_eq!((stroke.points[1].x, stroke.points[1].y), (30.0, 20.0));
        assert_eq!(stroke.width, 10.0);
        assert!(!f.router.is_active());
    }

    #[test]
    fn test_click_makes_single_point_stroke() {
        let mut f = Fixture::new();
        let mode = InteractionMode::Paint;
        f.pointer(mode, down(50.0, 150.0));
        let outcome = f.pointer(mode, up(50.0, 150.0));
        assert!(matches!(outcome, Some(GestureOutcome::PathCreated(s)) if s.points.len() == 1));
    }

    #[test]
    fn test_pan_modifier_overrides_drawing() {
        let mut f = Fixture::new();
        let mode = InteractionMode::Paint;
        f.pointer(
            mode,
            PointerEvent::Down {
                pos: pos2(100.0, 100.0),
                modifiers: Modifiers { pan: true },
            },
        );
        assert!(f.router.stroke_in_progress().is_none());
        f.pointer(mode, moved(110.0, 95.0));
        assert_eq!(f.pointer(mode, up(110.0, 95.0)), Some(GestureOutcome::ViewportChanged));
        assert_eq!(f.viewport.pan, Vec2::new(10.0, 95.0));
    }

    #[test]
    fn test_select_drag_moves_image() {
        let mut f = Fixture::new();
        let mode = InteractionMode::Select;
        let base = f.scene.base_id();
        assert_eq!(f.pointer(mode, down(200.0, 200.0)), Some(GestureOutcome::Selected(base)));
        f.pointer(mode, moved(220.0, 210.0));
        assert_eq!(
            f.pointer(mode, up(220.0, 210.0)),
            base.map(GestureOutcome::ObjectModified)
        );
        let bounds = f.scene.base_bounds().unwrap();
        assert_eq!((bounds.min_x, bounds.min_y), (10.0, 5.0));
    }

    #[test]
    fn test_click_without_move_is_not_a_modification() {
        let mut f = Fixture::new();
        let mode = InteractionMode::Select;
        f.pointer(mode, down(200.0, 200.0));
        assert_eq!(f.pointer(mode, up(200.0, 200.0)), None);
    }

    #[test]
    fn test_click_on_empty_canvas_clears_selection() {
        let mut f = Fixture::new();
        let outcome = f.pointer(InteractionMode::Select, down(200.0, 20.0));
        assert_eq!(outcome, Some(GestureOutcome::Selected(None)));
    }

    #[test]
    fn test_cancel_reverts_drag() {
        let mut f = Fixture::new();
        let mode = InteractionMode::Select;
        f.pointer(mode, down(200.0, 200.0));
        f.pointer(mode, moved(260.0, 200.0));
        f.router.cancel(&mut f.scene);
        assert_eq!(f.scene.base_bounds().unwrap().min_x, 0.0);
    }

    #[test]
    fn test_wheel_zoom_keeps_pivot() {
        let mut f = Fixture::new();
        let pivot = pos2(120.0, 180.0);
        let before = f.viewport.to_scene_space(pivot);
        f.pointer(
            InteractionMode::Paint,
            PointerEvent::Wheel {
                pos: pivot,
                delta_y: -200.0,
            },
        );
        let after = f.viewport.to_scene_space(pivot);
        assert!(f.viewport.zoom > 2.0);
        assert!((before.x - after.x).abs() < 1e-3);
        assert!((before.y - after.y).abs() < 1e-3);
    }
}

mod touch_tests {
    use super::*;

    #[test]
    fn test_single_finger_draws() {
        let mut f = Fixture::new();
        let mode = InteractionMode::Paint;
        f.touch(mode, 7, TouchPhase::Start, 20.0, 120.0);
        f.touch(mode, 7, TouchPhase::Move, 40.0, 120.0);
        let outcome = f.touch(mode, 7, TouchPhase::End, 40.0, 120.0);
        assert!(matches!(outcome, Some(GestureOutcome::PathCreated(_))));
    }

    #[test]
    fn test_second_finger_drops_stroke() {
        let mut f = Fixture::new();
        let mode = InteractionMode::Paint;
        f.touch(mode, 1, TouchPhase::Start, 20.0, 120.0);
        f.touch(mode, 1, TouchPhase::Move, 40.0, 120.0);
        f.touch(mode, 2, TouchPhase::Start, 200.0, 120.0);
        assert!(f.router.is_pinching());
        assert!(f.router.stroke_in_progress().is_none());

        assert_eq!(
            f.touch(mode, 2, TouchPhase::End, 200.0, 120.0),
            Some(GestureOutcome::PinchEnded)
        );
        assert_eq!(f.touch(mode, 1, TouchPhase::End, 40.0, 120.0), None);
    }

    #[test]
    fn test_pinch_pans_with_midpoint() {
        let mut f = Fixture::new();
        let mode = InteractionMode::Pan;
        f.touch(mode, 1, TouchPhase::Start, 100.0, 200.0);
        f.touch(mode, 2, TouchPhase::Start, 300.0, 200.0);
        f.touch(mode, 1, TouchPhase::Move, 130.0, 180.0);
        f.touch(mode, 2, TouchPhase::Move, 330.0, 180.0);
        assert!((f.viewport.zoom - 2.0).abs() < 1e-4);
        assert!((f.viewport.pan.x - 30.0).abs() < 1e-3);
        assert!((f.viewport.pan.y - 80.0).abs() < 1e-3);
    }

    #[test]
    fn test_lifting_a_leading_finger_restarts_pinch() {
        let mut f = Fixture::new();
        f.viewport.zoom = 3.0;
        let mode = InteractionMode::Pan;
        f.touch(mode, 1, TouchPhase::Start, 100.0, 200.0);
        f.touch(mode, 2, TouchPhase::Start, 300.0, 200.0);
        f.touch(mode, 3, TouchPhase::Start, 200.0, 300.0);

        // Fingers 2 and 3 now drive the pinch; holding still must not jump
        assert_eq!(f.touch(mode, 1, TouchPhase::End, 100.0, 200.0), None);
        assert!(f.router.is_pinching());
        let pan = f.viewport.pan;
        f.touch(mode, 3, TouchPhase::Move, 200.0, 300.0);
        assert!((f.viewport.zoom - 3.0).abs() < 1e-4);
        assert!((f.viewport.pan - pan).length() < 1e-3);

        // Spreading the new pair by half again scales from its own distance
        f.touch(mode, 2, TouchPhase::Move, 325.0, 175.0);
        f.touch(mode, 3, TouchPhase::Move, 175.0, 325.0);
        assert!((f.viewport.zoom - 4.5).abs() < 1e-3);
    }

    #[test]
    fn test_cancelled_touch_discards_stroke() {
        let mut f = Fixture::new();
        let mode = InteractionMode::Paint;
        f.touch(mode, 1, TouchPhase::Start, 20.0, 120.0);
        f.touch(mode, 1, TouchPhase::Move, 40.0, 120.0);
        assert_eq!(f.touch(mode, 1, TouchPhase::Cancel, 40.0, 120.0), None);
        assert!(!f.router.is_active());
    }
}
