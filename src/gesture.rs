//! Routes raw pointer and touch input to viewport updates or scene mutations
//!
//! All state in here belongs to the gesture currently in progress and is
//! reset when the pointer or the last finger is released.

use egui::Pos2;

use crate::geometry::Point;
use crate::mode::{BrushStyle, InteractionMode};
use crate::scene::{Drawable, ObjectId, SceneGraph, StrokeObject};
use crate::viewport::ViewportTransform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// Pan modifier (alt/option) held: drag pans in any mode
    pub pan: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down { pos: Pos2, modifiers: Modifiers },
    Move { pos: Pos2, modifiers: Modifiers },
    Up { pos: Pos2 },
    Wheel { pos: Pos2, delta_y: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Start,
    Move,
    End,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub id: u64,
    pub phase: TouchPhase,
    pub pos: Pos2,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    ViewportChanged,
    StrokeProgress,
    /// A freehand stroke was released; the caller decides paint or erase
    PathCreated(StrokeObject),
    /// An object was dragged to a new position and released
    ObjectModified(ObjectId),
    Selected(Option<ObjectId>),
    /// Fewer than two fingers remain; drawing flags must be reapplied
    PinchEnded,
}

/// Everything a gesture may read or mutate
pub struct GestureContext<'a> {
    pub viewport: &'a mut ViewportTransform,
    pub scene: &'a mut SceneGraph,
    pub mode: InteractionMode,
    pub brush: BrushStyle,
}

#[derive(Debug, Default)]
enum DragState {
    #[default]
    Idle,
    Panning {
        last: Pos2,
    },
    Drawing {
        points: Vec<Point>,
    },
    Moving {
        id: ObjectId,
        origin: Point,
        last: Point,
    },
}

#[derive(Debug, Clone, Copy)]
struct Pinch {
    /// Touch ids of the two fingers driving the pinch
    pair: (u64, u64),
    initial_distance: f32,
    initial_zoom: f32,
    last_mid: Pos2,
}

#[derive(Debug, Default)]
pub struct GestureRouter {
    drag: DragState,
    touches: Vec<(u64, Pos2)>,
    pinch: Option<Pinch>,
    /// Touch id currently acting as the single pointer
    touch_pointer: Option<u64>,
}

impl GestureRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.drag, DragState::Idle) || self.pinch.is_some()
    }

    pub fn is_pinching(&self) -> bool {
        self.pinch.is_some()
    }

    /// Scene-space points of the stroke being drawn, if any
    pub fn stroke_in_progress(&self) -> Option<&[Point]> {
        match &self.drag {
            DragState::Drawing { points } => Some(points),
            _ => None,
        }
    }

    /// Abandon the single-pointer gesture. A partial stroke is dropped and a
    /// dragged object goes back to where it started.
    pub fn cancel(&mut self, scene: &mut SceneGraph) {
        if let DragState::Moving { id, origin, last } = std::mem::take(&mut self.drag) {
            move_image(scene, id, origin - last);
        }
    }

    pub fn handle_pointer(
        &mut self,
        event: PointerEvent,
        ctx: &mut GestureContext<'_>,
    ) -> Option<GestureOutcome> {
        match event {
            PointerEvent::Down { pos, modifiers } => {
                if self.pinch.is_some() {
                    return None;
                }
                self.cancel(ctx.scene);
                self.pointer_down(pos, modifiers, ctx)
            }
            PointerEvent::Move { pos, .. } => self.pointer_move(pos, ctx),
            PointerEvent::Up { pos } => self.pointer_up(pos, ctx),
            PointerEvent::Wheel { pos, delta_y } => {
                ctx.viewport.zoom_by_wheel(pos, delta_y);
                Some(GestureOutcome::ViewportChanged)
            }
        }
    }

    fn pointer_down(
        &mut self,
        pos: Pos2,
        modifiers: Modifiers,
        ctx: &mut GestureContext<'_>,
    ) -> Option<GestureOutcome> {
        if ctx.mode == InteractionMode::Pan || modifiers.pan {
            self.drag = DragState::Panning { last: pos };
            return None;
        }

        let scene_pos = ctx.viewport.to_scene_space(pos);
        if ctx.mode.is_drawing() {
            self.drag = DragState::Drawing {
                points: vec![scene_pos],
            };
            return Some(GestureOutcome::StrokeProgress);
        }

        let hit = ctx
            .scene
            .hit_test(scene_pos)
            .filter(|id| ctx.scene.get(*id).is_some_and(|o| o.flags.selectable));
        if let Some(id) = hit {
            self.drag = DragState::Moving {
                id,
                origin: scene_pos,
                last: scene_pos,
            };
        }
        Some(GestureOutcome::Selected(hit))
    }

    fn pointer_move(&mut self, pos: Pos2, ctx: &mut GestureContext<'_>) -> Option<GestureOutcome> {
        match &mut self.drag {
            DragState::Idle => None,
            DragState::Panning { last } => {
                let delta = pos - *last;
                *last = pos;
                ctx.viewport.pan_by(delta.x, delta.y);
                Some(GestureOutcome::ViewportChanged)
            }
            DragState::Drawing { points } => {
                let scene_pos = ctx.viewport.to_scene_space(pos);
                if points.last() == Some(&scene_pos) {
                    return None;
                }
                points.push(scene_pos);
                Some(GestureOutcome::StrokeProgress)
            }
            DragState::Moving { id, last, .. } => {
                let scene_pos = ctx.viewport.to_scene_space(pos);
                let delta = scene_pos - *last;
                *last = scene_pos;
                move_image(ctx.scene, *id, delta);
                None
            }
        }
    }

    fn pointer_up(&mut self, pos: Pos2, ctx: &mut GestureContext<'_>) -> Option<GestureOutcome> {
        // Pick up the release position before finalizing
        self.pointer_move(pos, ctx);

        match std::mem::take(&mut self.drag) {
            DragState::Idle => None,
            DragState::Panning { .. } => Some(GestureOutcome::ViewportChanged),
            DragState::Drawing { points } => Some(GestureOutcome::PathCreated(StrokeObject::new(
                points,
                ctx.brush.width,
                ctx.brush.color,
            ))),
            DragState::Moving { id, origin, last } => {
                (origin != last).then_some(GestureOutcome::ObjectModified(id))
            }
        }
    }

    /// Start measuring from the first two fingers at the current zoom
    fn seed_pinch(&mut self, zoom: f32) {
        if let [(id_a, a), (id_b, b), ..] = self.touches.as_slice() {
            self.pinch = Some(Pinch {
                pair: (*id_a, *id_b),
                initial_distance: a.distance(*b),
                initial_zoom: zoom,
                last_mid: midpoint(*a, *b),
            });
        }
    }

    pub fn handle_touch(
        &mut self,
        event: TouchEvent,
        ctx: &mut GestureContext<'_>,
    ) -> Option<GestureOutcome> {
        match event.phase {
            TouchPhase::Start => {
                self.touches.retain(|(id, _)| *id != event.id);
                self.touches.push((event.id, event.pos));
                match self.touches.len() {
                    1 if self.pinch.is_none() => {
                        self.touch_pointer = Some(event.id);
                        self.handle_pointer(
                            PointerEvent::Down {
                                pos: event.pos,
                                modifiers: Modifiers::default(),
                            },
                            ctx,
                        )
                    }
                    2 => {
                        self.cancel(ctx.scene);
                        self.touch_pointer = None;
                        self.seed_pinch(ctx.viewport.zoom);
                        None
                    }
                    _ => None,
                }
            }
            TouchPhase::Move => {
                if let Some(slot) = self.touches.iter_mut().find(|(id, _)| *id == event.id) {
                    slot.1 = event.pos;
                }
                if let Some(pinch) = self.pinch.as_mut() {
                    if self.touches.len() < 2 {
                        return None;
                    }
                    let (a, b) = (self.touches[0].1, self.touches[1].1);
                    let mid = midpoint(a, b);
                    let delta = mid - pinch.last_mid;
                    pinch.last_mid = mid;
                    ctx.viewport.pan_by(delta.x, delta.y);
                    if pinch.initial_distance > 0.0 {
                        let target = pinch.initial_zoom * (a.distance(b) / pinch.initial_distance);
                        ctx.viewport.zoom_at(mid, target);
                    }
                    return Some(GestureOutcome::ViewportChanged);
                }
                if self.touch_pointer == Some(event.id) {
                    return self.handle_pointer(
                        PointerEvent::Move {
                            pos: event.pos,
                            modifiers: Modifiers::default(),
                        },
                        ctx,
                    );
                }
                None
            }
            TouchPhase::End | TouchPhase::Cancel => {
                self.touches.retain(|(id, _)| *id != event.id);
                if let Some(pinch) = self.pinch {
                    if self.touches.len() < 2 {
                        self.pinch = None;
                        return Some(GestureOutcome::PinchEnded);
                    }
                    if pinch.pair != (self.touches[0].0, self.touches[1].0) {
                        self.seed_pinch(ctx.viewport.zoom);
                    }
                    return None;
                }
                if self.touch_pointer == Some(event.id) {
                    self.touch_pointer = None;
                    if event.phase == TouchPhase::End {
                        return self.handle_pointer(PointerEvent::Up { pos: event.pos }, ctx);
                    }
                    self.cancel(ctx.scene);
                }
                None
            }
        }
    }
}

fn midpoint(a: Pos2, b: Pos2) -> Pos2 {
    a + (b - a) / 2.0
}

fn move_image(scene: &mut SceneGraph, id: ObjectId, delta: Point) {
    if let Some(obj) = scene.get_mut(id)
        && let Drawable::Image(img) = &mut obj.drawable
    {
        img.placement.translate(delta);
    }
}
