//! Viewport transform between screen space and scene space
//!
//! `screen = scene * zoom + pan`. The viewport never touches scene content
//! and is never recorded in history.

use egui::{Pos2, Vec2};

use crate::geometry::{Bounds, Point};

pub const DEFAULT_MAX_ZOOM: f32 = 5.0;

/// Per-notch factor of the mouse-wheel zoom: `zoom * WHEEL_ZOOM_BASE^delta_y`
pub const WHEEL_ZOOM_BASE: f32 = 0.999;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportTransform {
    pub zoom: f32,
    pub pan: Vec2,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub container: Vec2,
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ZOOM)
    }
}

impl ViewportTransform {
    pub fn new(max_zoom: f32) -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
            min_zoom: 1.0,
            max_zoom,
            container: Vec2::ZERO,
        }
    }

    /// Identity map used while exporting pixels in scene coordinates
    pub fn identity(&self) -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
            min_zoom: 1.0,
            max_zoom: self.max_zoom.max(1.0),
            container: self.container,
        }
    }

    /// Upper zoom clamp; raised to the fit zoom when the fit already exceeds it
    pub fn zoom_ceiling(&self) -> f32 {
        self.max_zoom.max(self.min_zoom)
    }

    pub fn clamp_zoom(&self, zoom: f32) -> f32 {
        zoom.clamp(self.min_zoom, self.zoom_ceiling())
    }

    /// Fit an image of `image_size` at the scene origin into `container`
    pub fn fit_to_container(&mut self, image_size: Vec2, container: Vec2) {
        self.fit_bounds(Bounds::from_size(image_size.x, image_size.y), container);
    }

    /// Set the zoom floor to the fit zoom of `bounds`, zoom to it and center
    pub fn fit_bounds(&mut self, bounds: Bounds, container: Vec2) {
        self.container = container;
        self.min_zoom = fit_zoom(bounds, container);
        self.zoom = self.min_zoom;
        self.center_on(bounds);
    }

    /// Recompute the zoom floor for `bounds` without recentering
    pub fn refit_floor(&mut self, bounds: Bounds) {
        self.min_zoom = fit_zoom(bounds, self.container);
        let pivot = Pos2::new(self.container.x / 2.0, self.container.y / 2.0);
        let zoom = self.zoom;
        self.zoom_at(pivot, zoom);
    }

    fn center_on(&mut self, bounds: Bounds) {
        let c = bounds.center();
        self.pan = Vec2::new(
            self.container.x / 2.0 - c.x * self.zoom,
            self.container.y / 2.0 - c.y * self.zoom,
        );
    }

    /// Pivot-preserving zoom: `screen_point` shows the same scene point
    /// before and after. Returns the clamped zoom actually applied.
    pub fn zoom_at(&mut self, screen_point: Pos2, new_zoom: f32) -> f32 {
        let pivot = self.to_scene_space(screen_point);
        self.zoom = self.clamp_zoom(new_zoom);
        self.pan = Vec2::new(
            screen_point.x - pivot.x * self.zoom,
            screen_point.y - pivot.y * self.zoom,
        );
        self.zoom
    }

    pub fn zoom_by_wheel(&mut self, screen_point: Pos2, delta_y: f32) -> f32 {
        let target = self.zoom * WHEEL_ZOOM_BASE.powf(delta_y);
        self.zoom_at(screen_point, target)
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.pan += Vec2::new(dx, dy);
    }

    pub fn to_scene_space(&self, screen: Pos2) -> Point {
        Point::new(
            (screen.x - self.pan.x) / self.zoom,
            (screen.y - self.pan.y) / self.zoom,
        )
    }

    pub fn to_screen_space(&self, scene: Point) -> Pos2 {
        Pos2::new(
            scene.x * self.zoom + self.pan.x,
            scene.y * self.zoom + self.pan.y,
        )
    }

    /// Screen-space delta to scene-space delta
    pub fn to_scene_delta(&self, delta: Vec2) -> Point {
        Point::new(delta.x / self.zoom, delta.y / self.zoom)
    }
}

/// `min(container_w / image_w, container_h / image_h)`, 1.0 for degenerate input
pub fn fit_zoom(bounds: Bounds, container: Vec2) -> f32 {
    let (w, h) = (bounds.width(), bounds.height());
    if w <= 0.0 || h <= 0.0 || container.x <= 0.0 || container.y <= 0.0 {
        return 1.0;
    }
    (container.x / w).min(container.y / h)
}
