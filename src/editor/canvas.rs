use std::collections::HashMap;

use egui::{Color32, Pos2, Rect, Sense, Stroke, TextureHandle, Vec2};
use inpaint_tools::Session;
use inpaint_tools::geometry::Point;
use inpaint_tools::gesture::{Modifiers, PointerEvent, TouchEvent, TouchPhase};
use inpaint_tools::scene::{AssetId, Drawable, ImageObject, StrokeObject};

const SELECTED_COLOR: Color32 = Color32::from_rgb(0, 150, 255);
/// Translucent white, premultiplied
const ERASER_TRAIL: Color32 = Color32::from_rgba_premultiplied(60, 60, 60, 60);

/// Per-frame glue between egui and the session: texture cache and input
/// bookkeeping that has no place in the engine itself.
#[derive(Default)]
pub struct CanvasView {
    textures: HashMap<AssetId, TextureHandle>,
    container: Vec2,
    touches_down: usize,
    pointer_down: bool,
}

impl CanvasView {
    pub fn new() -> Self {
        Self::default()
    }

    fn texture_for(
        &mut self,
        ctx: &egui::Context,
        session: &Session,
        asset: AssetId,
    ) -> Option<egui::TextureId> {
        if let Some(tex) = self.textures.get(&asset) {
            return Some(tex.id());
        }
        let pixels = session.assets().get(asset)?;
        let size = [pixels.width() as usize, pixels.height() as usize];
        let image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_raw());
        let handle = ctx.load_texture(
            format!("asset-{}", asset.0),
            image,
            egui::TextureOptions::LINEAR,
        );
        let id = handle.id();
        self.textures.insert(asset, handle);
        Some(id)
    }

    /// Drop textures whose assets the session has released
    fn collect_textures(&mut self, session: &Session) {
        self.textures.retain(|id, _| session.assets().contains(*id));
    }
}

pub fn render_canvas(ui: &mut egui::Ui, session: &mut Session, view: &mut CanvasView) {
    let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
    let canvas_rect = response.rect;

    if canvas_rect.size() != view.container {
        view.container = canvas_rect.size();
        session.set_container_size(view.container);
    }

    feed_input(ui, session, view, &response, canvas_rect);
    let session: &Session = session;

    painter.rect_filled(canvas_rect, 0.0, session.scene().background);

    let ctx = ui.ctx().clone();
    for obj in session.scene().objects().iter().filter(|o| o.flags.visible) {
        match &obj.drawable {
            Drawable::Image(img) => {
                if let Some(texture) = view.texture_for(&ctx, session, img.asset) {
                    render_image(&painter, session, img, texture, canvas_rect);
                }
            }
            Drawable::Stroke(stroke) => render_stroke(&painter, session, stroke, canvas_rect),
        }
    }

    if let Some(points) = session.stroke_in_progress() {
        let presentation = session.presentation();
        if let Some(brush) = presentation.brush {
            let color = if brush.color == Color32::TRANSPARENT {
                ERASER_TRAIL
            } else {
                brush.color
            };
            let preview = StrokeObject::new(points.to_vec(), brush.width, color);
            render_stroke(&painter, session, &preview, canvas_rect);
        }
    }

    if let Some(bounds) = session
        .selection()
        .and_then(|id| session.scene().get(id))
        .and_then(|o| o.bounds())
    {
        let min = to_screen(session, Point::new(bounds.min_x, bounds.min_y), canvas_rect);
        let max = to_screen(session, Point::new(bounds.max_x, bounds.max_y), canvas_rect);
        painter.rect_stroke(
            Rect::from_min_max(min, max),
            0.0,
            Stroke::new(1.0, SELECTED_COLOR),
        );
    }

    if response.hovered() {
        ui.ctx().set_cursor_icon(session.presentation().cursor);
    }

    view.collect_textures(session);
}

fn to_screen(session: &Session, point: Point, canvas_rect: Rect) -> Pos2 {
    session.viewport().to_screen_space(point) + canvas_rect.min.to_vec2()
}

fn render_image(
    painter: &egui::Painter,
    session: &Session,
    img: &ImageObject,
    texture: egui::TextureId,
    canvas_rect: Rect,
) {
    let corners = img.placement.corners(img.width, img.height);
    let uvs = [
        Pos2::new(0.0, 0.0),
        Pos2::new(1.0, 0.0),
        Pos2::new(1.0, 1.0),
        Pos2::new(0.0, 1.0),
    ];

    let mut mesh = egui::Mesh::with_texture(texture);
    for (corner, uv) in corners.iter().zip(uvs) {
        mesh.vertices.push(egui::epaint::Vertex {
            pos: to_screen(session, *corner, canvas_rect),
            uv,
            color: Color32::WHITE,
        });
    }
    mesh.add_triangle(0, 1, 2);
    mesh.add_triangle(0, 2, 3);
    painter.add(egui::Shape::mesh(mesh));
}

fn render_stroke(
    painter: &egui::Painter,
    session: &Session,
    stroke: &StrokeObject,
    canvas_rect: Rect,
) {
    let width = stroke.width * session.viewport().zoom;
    let points: Vec<Pos2> = stroke
        .points
        .iter()
        .map(|p| to_screen(session, *p, canvas_rect))
        .collect();

    match points.as_slice() {
        [] => {}
        [only] => {
            painter.circle_filled(*only, width / 2.0, stroke.color);
        }
        _ => {
            painter.add(egui::Shape::line(points, Stroke::new(width, stroke.color)));
        }
    }
}

fn feed_input(
    ui: &egui::Ui,
    session: &mut Session,
    view: &mut CanvasView,
    response: &egui::Response,
    canvas_rect: Rect,
) {
    let (events, space_held, scroll) = ui.input(|i| {
        (
            i.events.clone(),
            i.key_down(egui::Key::Space),
            i.raw_scroll_delta,
        )
    });
    let local = |pos: Pos2| (pos - canvas_rect.min).to_pos2();

    for event in events {
        match event {
            egui::Event::Touch { id, phase, pos, .. } => {
                let phase = match phase {
                    egui::TouchPhase::Start => {
                        if !canvas_rect.contains(pos) {
                            continue;
                        }
                        view.touches_down += 1;
                        TouchPhase::Start
                    }
                    egui::TouchPhase::Move => TouchPhase::Move,
                    egui::TouchPhase::End => {
                        view.touches_down = view.touches_down.saturating_sub(1);
                        TouchPhase::End
                    }
                    egui::TouchPhase::Cancel => {
                        view.touches_down = view.touches_down.saturating_sub(1);
                        TouchPhase::Cancel
                    }
                };
                session.handle_touch(TouchEvent {
                    id: id.0,
                    phase,
                    pos: local(pos),
                });
            }
            // Touch input also arrives as emulated pointer events
            _ if view.touches_down > 0 => {}
            egui::Event::PointerButton {
                pos,
                button: egui::PointerButton::Primary,
                pressed,
                modifiers,
            } => {
                if pressed && canvas_rect.contains(pos) && response.hovered() {
                    view.pointer_down = true;
                    session.handle_pointer(PointerEvent::Down {
                        pos: local(pos),
                        modifiers: Modifiers {
                            pan: modifiers.alt || space_held,
                        },
                    });
                } else if !pressed && view.pointer_down {
                    view.pointer_down = false;
                    session.handle_pointer(PointerEvent::Up { pos: local(pos) });
                }
            }
            egui::Event::PointerMoved(pos) => {
                let modifiers = ui.input(|i| i.modifiers);
                session.handle_pointer(PointerEvent::Move {
                    pos: local(pos),
                    modifiers: Modifiers {
                        pan: modifiers.alt || space_held,
                    },
                });
            }
            _ => {}
        }
    }

    if response.hovered()
        && scroll.y != 0.0
        && let Some(pos) = response.hover_pos()
    {
        // egui reports wheel-up as positive, the zoom curve expects the opposite
        session.handle_pointer(PointerEvent::Wheel {
            pos: local(pos),
            delta_y: -scroll.y,
        });
    }
}
