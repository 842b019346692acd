//! Export pipeline: pixel-accurate base image and mask for the generation
//! service, plus full-canvas download renders.
//!
//! The export process:
//! 1. Neutralize the viewport so pixels come out in scene coordinates
//! 2. Crop to the base image's bounding box
//! 3. Render the image with every stroke hidden
//! 4. Render the mask: strokes only, forced to white, on black
//! 5. Restore every visibility, color and background change, then the viewport
//!
//! Steps 1 and 5 are tied together by [`ExportScope`], which restores on drop
//! no matter how the export exits.

use egui::Color32;
use image::{Rgba, RgbaImage};
use tiny_skia::{
    ColorU8, FillRule, FilterQuality, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint,
    Stroke, Transform,
};

use crate::codec::EncodedImage;
use crate::error::EditorError;
use crate::geometry::Bounds;
use crate::scene::{AssetStore, Drawable, ImageObject, ObjectId, ObjectKind, SceneGraph, StrokeObject};
use crate::viewport::ViewportTransform;

/// What to rasterize: the viewport in effect, the region of the canvas
/// (in canvas pixels) and an output resolution multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterRequest {
    pub viewport: ViewportTransform,
    pub region: Bounds,
    pub multiplier: f32,
}

impl RasterRequest {
    pub fn output_size(&self) -> (u32, u32) {
        (
            (self.region.width() * self.multiplier).round().max(0.0) as u32,
            (self.region.height() * self.multiplier).round().max(0.0) as u32,
        )
    }
}

/// Rendering capability: draws the visible scene objects in order
pub trait Rasterizer {
    fn rasterize(
        &self,
        scene: &SceneGraph,
        assets: &AssetStore,
        request: &RasterRequest,
    ) -> Result<RgbaImage, EditorError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SkiaRasterizer;

impl Rasterizer for SkiaRasterizer {
    fn rasterize(
        &self,
        scene: &SceneGraph,
        assets: &AssetStore,
        request: &RasterRequest,
    ) -> Result<RgbaImage, EditorError> {
        let (width, height) = request.output_size();
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            EditorError::Raster(format!("cannot allocate {}x{} surface", width, height))
        })?;

        let [r, g, b, a] = scene.background.to_srgba_unmultiplied();
        pixmap.fill(tiny_skia::Color::from_rgba8(r, g, b, a));

        let view = view_transform(request);
        for obj in scene.objects().iter().filter(|o| o.flags.visible) {
            match &obj.drawable {
                Drawable::Image(img) => draw_image(&mut pixmap, img, assets, view)?,
                Drawable::Stroke(stroke) => draw_stroke(&mut pixmap, stroke, view),
            }
        }

        Ok(pixmap_to_rgba(&pixmap))
    }
}

/// scene → screen (viewport) → crop region → output multiplier
fn view_transform(request: &RasterRequest) -> Transform {
    let vp = &request.viewport;
    let m = request.multiplier;
    Transform::from_row(
        vp.zoom * m,
        0.0,
        0.0,
        vp.zoom * m,
        (vp.pan.x - request.region.min_x) * m,
        (vp.pan.y - request.region.min_y) * m,
    )
}

fn draw_image(
    pixmap: &mut Pixmap,
    img: &ImageObject,
    assets: &AssetStore,
    view: Transform,
) -> Result<(), EditorError> {
    let Some(pixels) = assets.get(img.asset) else {
        return Err(EditorError::Raster(format!("missing image asset {:?}", img.asset)));
    };
    let source = rgba_to_pixmap(pixels)?;

    let p = &img.placement;
    let transform = Transform::from_translate(-(img.width as f32) / 2.0, -(img.height as f32) / 2.0)
        .post_scale(p.scale_x, p.scale_y)
        .post_rotate(p.angle)
        .post_translate(p.center.x, p.center.y)
        .post_concat(view);

    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    pixmap.draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
    Ok(())
}

fn draw_stroke(pixmap: &mut Pixmap, stroke: &StrokeObject, view: Transform) {
    let [r, g, b, a] = stroke.color.to_srgba_unmultiplied();
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;

    match stroke.points.as_slice() {
        [] => {}
        [only] => {
            if let Some(path) = PathBuilder::from_circle(only.x, only.y, stroke.width / 2.0) {
                pixmap.fill_path(&path, &paint, FillRule::Winding, view, None);
            }
        }
        [first, rest @ ..] => {
            let mut pb = PathBuilder::new();
            pb.move_to(first.x, first.y);
            for p in rest {
                pb.line_to(p.x, p.y);
            }
            if let Some(path) = pb.finish() {
                let style = Stroke {
                    width: stroke.width,
                    line_cap: LineCap::Round,
                    line_join: LineJoin::Round,
                    ..Default::default()
                };
                pixmap.stroke_path(&path, &paint, &style, view, None);
            }
        }
    }
}

fn rgba_to_pixmap(img: &RgbaImage) -> Result<Pixmap, EditorError> {
    let mut pixmap = Pixmap::new(img.width(), img.height()).ok_or_else(|| {
        EditorError::Raster(format!("cannot allocate {}x{} image", img.width(), img.height()))
    })?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(img.pixels()) {
        let Rgba([r, g, b, a]) = *src;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pixmap)
}

fn pixmap_to_rgba(pixmap: &Pixmap) -> RgbaImage {
    let mut out = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in out.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    out
}

/// Scoped override of the viewport and of object visibility/colors.
///
/// Every change made through the scope is recorded once with its original
/// value and put back when the scope is dropped.
pub struct ExportScope<'a> {
    scene: &'a mut SceneGraph,
    viewport: &'a mut ViewportTransform,
    saved_viewport: ViewportTransform,
    saved_background: Color32,
    saved_objects: Vec<(ObjectId, bool, Option<Color32>)>,
}

impl<'a> ExportScope<'a> {
    pub fn begin(scene: &'a mut SceneGraph, viewport: &'a mut ViewportTransform) -> Self {
        let saved_viewport = *viewport;
        *viewport = viewport.identity();
        let saved_background = scene.background;
        Self {
            scene,
            viewport,
            saved_viewport,
            saved_background,
            saved_objects: Vec::new(),
        }
    }

    pub fn scene(&self) -> &SceneGraph {
        &*self.scene
    }

    pub fn viewport(&self) -> &ViewportTransform {
        &*self.viewport
    }

    fn remember(&mut self, id: ObjectId) {
        if self.saved_objects.iter().any(|(saved, _, _)| *saved == id) {
            return;
        }
        if let Some(obj) = self.scene.get(id) {
            let color = obj.as_stroke().map(|s| s.color);
            self.saved_objects.push((id, obj.flags.visible, color));
        }
    }

    fn ids_of(&self, kind: Option<ObjectKind>) -> Vec<ObjectId> {
        self.scene.list_objects(kind).map(|o| o.id).collect()
    }

    pub fn set_visible(&mut self, id: ObjectId, visible: bool) {
        self.remember(id);
        if let Some(obj) = self.scene.get_mut(id) {
            obj.flags.visible = visible;
        }
    }

    pub fn set_kind_visible(&mut self, kind: ObjectKind, visible: bool) {
        for id in self.ids_of(Some(kind)) {
            self.set_visible(id, visible);
        }
    }

    pub fn force_stroke_color(&mut self, color: Color32) {
        for id in self.ids_of(Some(ObjectKind::Stroke)) {
            self.remember(id);
            if let Some(obj) = self.scene.get_mut(id)
                && let Drawable::Stroke(stroke) = &mut obj.drawable
            {
                stroke.color = color;
            }
        }
    }

    pub fn set_background(&mut self, color: Color32) {
        self.scene.background = color;
    }
}

impl Drop for ExportScope<'_> {
    fn drop(&mut self) {
        for (id, visible, color) in self.saved_objects.drain(..).rev() {
            if let Some(obj) = self.scene.get_mut(id) {
                obj.flags.visible = visible;
                if let (Some(color), Drawable::Stroke(stroke)) = (color, &mut obj.drawable) {
                    stroke.color = color;
                }
            }
        }
        self.scene.background = self.saved_background;
        *self.viewport = self.saved_viewport;
    }
}

/// Image and mask, same size and pixel-aligned, cropped to the base image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportData {
    pub image: EncodedImage,
    pub mask: EncodedImage,
}

pub fn export_image_and_mask(
    scene: &mut SceneGraph,
    viewport: &mut ViewportTransform,
    assets: &AssetStore,
    rasterizer: &dyn Rasterizer,
) -> Result<ExportData, EditorError> {
    let crop = scene.base_bounds().ok_or(EditorError::NothingToExport)?;
    let pending = scene.pending_id();

    let (image, mask) = {
        let mut scope = ExportScope::begin(scene, viewport);
        let request = RasterRequest {
            viewport: *scope.viewport(),
            region: crop,
            multiplier: 1.0,
        };

        scope.set_kind_visible(ObjectKind::Stroke, false);
        if let Some(id) = pending {
            scope.set_visible(id, false);
        }
        let image = rasterizer.rasterize(scope.scene(), assets, &request)?;

        scope.set_kind_visible(ObjectKind::Image, false);
        scope.set_kind_visible(ObjectKind::Stroke, true);
        scope.force_stroke_color(Color32::WHITE);
        scope.set_background(Color32::BLACK);
        let mask = rasterizer.rasterize(scope.scene(), assets, &request)?;

        (image, mask)
    };

    Ok(ExportData {
        image: EncodedImage::from_rgba(&image)?,
        mask: EncodedImage::from_rgba(&mask)?,
    })
}

/// Render the whole visible canvas as the user sees it, at `multiplier`
pub fn render_download(
    scene: &SceneGraph,
    viewport: &ViewportTransform,
    assets: &AssetStore,
    rasterizer: &dyn Rasterizer,
    multiplier: f32,
) -> Result<EncodedImage, EditorError> {
    let region = Bounds::from_size(viewport.container.x, viewport.container.y);
    if region.width() <= 0.0 || region.height() <= 0.0 {
        return Err(EditorError::Raster("canvas has no size".to_string()));
    }
    let request = RasterRequest {
        viewport: *viewport,
        region,
        multiplier,
    };
    let pixels = rasterizer.rasterize(scene, assets, &request)?;
    EncodedImage::from_rgba(&pixels)
}
