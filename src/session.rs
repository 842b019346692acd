//! Editing session: the facade the UI talks to
//!
//! A [`Session`] owns one viewport, one scene graph, one history log and the
//! current tool state. It runs the propose → review → commit/discard cycle
//! for generated results:
//!
//! ```text
//!   Idle --set_result--> Proposed --commit_result--> Idle (one snapshot)
//!                                 --discard_result-> Idle (no snapshot)
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use egui::Vec2;
use image::RgbaImage;

use crate::codec::{self, EncodedImage};
use crate::config::EditorConfig;
use crate::error::{EditorError, GenerationError};
use crate::export::{self, ExportData, Rasterizer, SkiaRasterizer};
use crate::generation::{GenerateRequest, validate_prompt};
use crate::geometry::{Placement, Point};
use crate::gesture::{GestureContext, GestureOutcome, GestureRouter, PointerEvent, TouchEvent};
use crate::history::{History, HistorySnapshot, HistoryState};
use crate::mode::{self, BrushStyle, InteractionMode, MaskMode, Tool, ToolPresentation, derive_flags};
use crate::scene::{
    AssetStore, Drawable, ImageObject, ObjectId, ObjectRole, SceneGraph, StrokeObject,
};
use crate::viewport::ViewportTransform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewState {
    #[default]
    Idle,
    /// A result is on the canvas and waiting for commit or discard
    Proposed,
}

/// Shared flag telling async work whether its session is still mounted
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

type HistoryObserver = Box<dyn FnMut(HistoryState)>;

pub struct Session {
    config: EditorConfig,
    viewport: ViewportTransform,
    scene: SceneGraph,
    assets: AssetStore,
    history: History,
    gestures: GestureRouter,
    tool: Tool,
    mask_mode: MaskMode,
    selection: Option<ObjectId>,
    rasterizer: Box<dyn Rasterizer>,
    observer: Option<HistoryObserver>,
    alive: Arc<AtomicBool>,
}

impl Session {
    pub fn new(config: EditorConfig) -> Self {
        Self::with_rasterizer(config, Box::new(SkiaRasterizer))
    }

    pub fn with_rasterizer(config: EditorConfig, rasterizer: Box<dyn Rasterizer>) -> Self {
        let mut scene = SceneGraph::new();
        scene.background = config.background;
        Self {
            viewport: ViewportTransform::new(config.max_zoom),
            history: History::with_capacity(config.history_depth),
            config,
            scene,
            assets: AssetStore::new(),
            gestures: GestureRouter::new(),
            tool: Tool::default(),
            mask_mode: MaskMode::default(),
            selection: None,
            rasterizer,
            observer: None,
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn liveness(&self) -> Liveness {
        Liveness(Arc::clone(&self.alive))
    }

    /// Tear the session down: outstanding async work sees a dead liveness
    /// token and every later call becomes a no-op.
    pub fn unmount(&mut self) {
        if !self.is_mounted() {
            return;
        }
        self.alive.store(false, Ordering::Release);
        self.gestures = GestureRouter::new();
        self.scene.clear();
        self.history.clear();
        self.assets.retain(&HashSet::new());
        self.observer = None;
        tracing::info!("Session unmounted");
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn viewport(&self) -> &ViewportTransform {
        &self.viewport
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_state(&self) -> HistoryState {
        self.history.state()
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn mask_mode(&self) -> MaskMode {
        self.mask_mode
    }

    pub fn mode(&self) -> InteractionMode {
        InteractionMode::from_tool(self.tool, self.mask_mode)
    }

    pub fn presentation(&self) -> ToolPresentation {
        mode::presentation(self.mode(), self.config.brush())
    }

    pub fn selection(&self) -> Option<ObjectId> {
        self.selection
    }

    pub fn review_state(&self) -> ReviewState {
        if self.scene.pending_id().is_some() {
            ReviewState::Proposed
        } else {
            ReviewState::Idle
        }
    }

    pub fn has_image(&self) -> bool {
        self.scene.base_id().is_some()
    }

    pub fn stroke_in_progress(&self) -> Option<&[Point]> {
        self.gestures.stroke_in_progress()
    }

    /// Observer called with the new `(can_undo, can_redo)` after every
    /// history change
    pub fn set_history_observer(&mut self, observer: impl FnMut(HistoryState) + 'static) {
        self.observer = Some(Box::new(observer));
        self.notify_history();
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
        self.enter_mode();
    }

    pub fn set_mask_mode(&mut self, mask_mode: MaskMode) {
        self.mask_mode = mask_mode;
        self.enter_mode();
    }

    pub fn set_mode(&mut self, mode: InteractionMode) {
        (self.tool, self.mask_mode) = mode.to_tool(self.mask_mode);
        self.enter_mode();
    }

    fn enter_mode(&mut self) {
        self.gestures.cancel(&mut self.scene);
        self.selection = None;
        self.apply_mode_flags();
    }

    /// Re-derive selectable/evented for every object from the current mode
    fn apply_mode_flags(&mut self) {
        let mode = self.mode();
        let roles: Vec<(ObjectId, ObjectRole)> = self
            .scene
            .objects()
            .iter()
            .map(|o| (o.id, self.scene.object_role(o)))
            .collect();
        for (id, role) in roles {
            if let Some(obj) = self.scene.get_mut(id) {
                obj.flags = derive_flags(mode, role, obj.flags.visible);
            }
        }
    }

    /// Container resized: refit the base image
    pub fn set_container_size(&mut self, size: Vec2) {
        match self.scene.base_bounds() {
            Some(bounds) => self.viewport.fit_bounds(bounds, size),
            None => self.viewport.container = size,
        }
    }

    pub fn fit_to_container(&mut self) {
        let size = self.viewport.container;
        self.set_container_size(size);
    }

    /// Brush handed to gestures: the erase brush draws no visible ink
    fn gesture_brush(&self) -> BrushStyle {
        self.presentation().brush.unwrap_or(self.config.brush())
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> Option<GestureOutcome> {
        if !self.is_mounted() {
            return None;
        }
        let mode = self.mode();
        let brush = self.gesture_brush();
        let mut ctx = GestureContext {
            viewport: &mut self.viewport,
            scene: &mut self.scene,
            mode,
            brush,
        };
        let outcome = self.gestures.handle_pointer(event, &mut ctx);
        self.process_outcome(outcome.as_ref());
        outcome
    }

    pub fn handle_touch(&mut self, event: TouchEvent) -> Option<GestureOutcome> {
        if !self.is_mounted() {
            return None;
        }
        let mode = self.mode();
        let brush = self.gesture_brush();
        let mut ctx = GestureContext {
            viewport: &mut self.viewport,
            scene: &mut self.scene,
            mode,
            brush,
        };
        let outcome = self.gestures.handle_touch(event, &mut ctx);
        self.process_outcome(outcome.as_ref());
        outcome
    }

    fn process_outcome(&mut self, outcome: Option<&GestureOutcome>) {
        match outcome {
            Some(GestureOutcome::PathCreated(stroke)) => {
                let mask = match self.mode() {
                    InteractionMode::Erase => MaskMode::Erase,
                    _ => MaskMode::Paint,
                };
                self.apply_stroke(stroke.clone(), mask);
            }
            Some(GestureOutcome::ObjectModified(_)) => {
                self.snapshot();
            }
            Some(GestureOutcome::Selected(selection)) => {
                self.selection = *selection;
            }
            Some(GestureOutcome::PinchEnded) => self.apply_mode_flags(),
            Some(GestureOutcome::ViewportChanged | GestureOutcome::StrokeProgress) | None => {}
        }
    }

    /// Paint keeps the stroke and snapshots. Erase treats the stroke's box as
    /// a deletion lasso and snapshots only if some stroke was removed.
    /// Returns whether a snapshot was recorded.
    pub fn apply_stroke(&mut self, stroke: StrokeObject, mask: MaskMode) -> bool {
        if !self.is_mounted() || stroke.points.is_empty() {
            return false;
        }
        match mask {
            MaskMode::Paint => {
                self.scene.add_object(Drawable::Stroke(stroke));
                self.apply_mode_flags();
                self.snapshot()
            }
            MaskMode::Erase => {
                let Some(area) = stroke.bounds() else {
                    return false;
                };
                let doomed = self.scene.strokes_overlapping(&area, None);
                if doomed.is_empty() {
                    return false;
                }
                for id in &doomed {
                    self.scene.remove_object(*id);
                }
                tracing::debug!("Erased {} stroke(s)", doomed.len());
                self.snapshot()
            }
        }
    }

    /// Add a mask stroke from scene-space points with the configured brush
    pub fn add_mask_stroke(&mut self, points: Vec<Point>, width: Option<f32>) -> bool {
        let stroke = StrokeObject::new(
            points,
            width.unwrap_or(self.config.brush_width),
            self.config.brush_color,
        );
        self.apply_stroke(stroke, MaskMode::Paint)
    }

    /// Decode `bytes` and make it the new base image. On failure nothing in
    /// the session changes.
    pub fn load_image(&mut self, bytes: &[u8]) -> Result<(), EditorError> {
        if !self.is_mounted() {
            return Err(EditorError::Unmounted);
        }
        let pixels = codec::decode_image_bytes(bytes).inspect_err(|e| {
            tracing::warn!("Rejected image: {}", e);
        })?;
        self.install_base_image(pixels);
        Ok(())
    }

    pub fn load_image_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), EditorError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).inspect_err(|e| {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
        })?;
        self.load_image(&bytes)?;
        tracing::info!("Loaded image: {}", path.display());
        Ok(())
    }

    /// Replace the whole scene with `pixels` as base image and reseed history
    pub fn install_base_image(&mut self, pixels: RgbaImage) {
        if !self.is_mounted() {
            return;
        }
        self.gestures.cancel(&mut self.scene);
        self.scene.clear();
        self.selection = None;

        let (width, height) = pixels.dimensions();
        let asset = self.assets.insert(pixels);
        self.scene.set_base_image(ImageObject {
            asset,
            width,
            height,
            placement: Placement::default(),
        });
        self.fit_to_container();

        self.history.unlock();
        self.history.clear();
        self.apply_mode_flags();
        self.snapshot();
        self.prune_assets();
        tracing::info!("Base image set ({}x{})", width, height);
    }

    pub fn clear_mask(&mut self) {
        if !self.is_mounted() {
            return;
        }
        self.gestures.cancel(&mut self.scene);
        let removed = self.scene.remove_strokes();
        tracing::debug!("Cleared {} mask stroke(s)", removed);
        self.snapshot();
    }

    /// Record the committed scene in history. Returns whether the log grew.
    pub fn snapshot(&mut self) -> bool {
        if !self.is_mounted() || self.history.is_locked() {
            return false;
        }
        let pushed = match HistorySnapshot::capture(&self.scene.to_document()) {
            Ok(snapshot) => self.history.push(snapshot),
            Err(e) => {
                tracing::warn!("Failed to serialize scene: {}", e);
                false
            }
        };
        if pushed {
            self.prune_assets();
            self.notify_history();
        }
        pushed
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo_target() {
            Some(index) if self.is_mounted() => self.replay(index),
            _ => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo_target() {
            Some(index) if self.is_mounted() => self.replay(index),
            _ => false,
        }
    }

    /// Restore the snapshot at `index`. A snapshot that fails to parse or
    /// names a missing asset leaves the scene and the index untouched.
    fn replay(&mut self, index: usize) -> bool {
        let Some(snapshot) = self.history.get(index) else {
            return false;
        };
        let doc = match snapshot.document() {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("History replay aborted: {}", e);
                return false;
            }
        };
        if let Some(missing) = doc.assets().into_iter().find(|a| !self.assets.contains(*a)) {
            tracing::warn!("History replay aborted: asset {:?} is gone", missing);
            return false;
        }

        self.history.lock();
        self.gestures.cancel(&mut self.scene);
        self.scene.restore_document(doc);
        self.selection = None;
        self.fit_to_container();
        self.apply_mode_flags();
        self.history.set_index(index);
        self.history.unlock();

        self.prune_assets();
        self.notify_history();
        true
    }

    fn notify_history(&mut self) {
        let state = self.history.state();
        if let Some(observer) = self.observer.as_mut() {
            observer(state);
        }
    }

    fn prune_assets(&mut self) {
        let mut keep = self.history.referenced_assets();
        keep.extend(self.scene.referenced_assets());
        self.assets.retain(&keep);
    }

    pub fn export_image_and_mask(&mut self) -> Result<ExportData, EditorError> {
        if !self.is_mounted() {
            return Err(EditorError::Unmounted);
        }
        export::export_image_and_mask(
            &mut self.scene,
            &mut self.viewport,
            &self.assets,
            self.rasterizer.as_ref(),
        )
    }

    /// Image and mask for the generation service, `None` without a base image
    pub fn get_export_data(&mut self) -> Option<ExportData> {
        match self.export_image_and_mask() {
            Ok(data) => Some(data),
            Err(EditorError::NothingToExport) => None,
            Err(e) => {
                tracing::warn!("Export failed: {}", e);
                None
            }
        }
    }

    /// Full canvas as currently displayed, at the download multiplier
    pub fn download(&self) -> Result<EncodedImage, EditorError> {
        export::render_download(
            &self.scene,
            &self.viewport,
            &self.assets,
            self.rasterizer.as_ref(),
            self.config.download_multiplier,
        )
    }

    pub fn download_to<P: AsRef<Path>>(&self, path: P) -> Result<(), EditorError> {
        let encoded = self.download()?;
        std::fs::write(path.as_ref(), &encoded.png)?;
        tracing::info!(
            "Saved {}x{} render to {}",
            encoded.width,
            encoded.height,
            path.as_ref().display()
        );
        Ok(())
    }

    /// Put a generated image (base64 or data URL) on the canvas for review.
    /// No-op once the session is unmounted.
    pub fn set_result(&mut self, image_data: &str) -> Result<(), EditorError> {
        if !self.is_mounted() {
            tracing::debug!("Result arrived after unmount, ignored");
            return Ok(());
        }
        let pixels = codec::decode_image_data(image_data).inspect_err(|e| {
            tracing::warn!("Rejected result image: {}", e);
        })?;
        self.set_result_image(pixels);
        Ok(())
    }

    pub fn set_result_image(&mut self, pixels: RgbaImage) {
        if !self.is_mounted() {
            return;
        }
        let (width, height) = pixels.dimensions();
        let placement = self.result_placement(width, height);
        let asset = self.assets.insert(pixels);
        self.scene.set_pending(ImageObject {
            asset,
            width,
            height,
            placement,
        });
        self.apply_mode_flags();
        self.prune_assets();
        tracing::info!("Result proposed ({}x{})", width, height);
    }

    /// Cover the base image exactly; without one, center at a fraction of
    /// the visible canvas.
    fn result_placement(&self, width: u32, height: u32) -> Placement {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        if let Some(base) = self.scene.base_image() {
            let p = base.placement;
            return Placement {
                center: p.center,
                scale_x: p.scale_x * base.width as f32 / w,
                scale_y: p.scale_y * base.height as f32 / h,
                angle: p.angle,
            };
        }

        let container = self.viewport.container;
        if container.x <= 0.0 || container.y <= 0.0 {
            return Placement::at_origin(width, height);
        }
        let fraction = self.config.result_fallback_fraction;
        let screen_scale = (container.x * fraction / w).min(container.y * fraction / h);
        let scale = screen_scale / self.viewport.zoom;
        Placement {
            center: self
                .viewport
                .to_scene_space(egui::pos2(container.x / 2.0, container.y / 2.0)),
            scale_x: scale,
            scale_y: scale,
            angle: 0.0,
        }
    }

    pub fn discard_result(&mut self) -> bool {
        let Some(id) = self.scene.pending_id() else {
            return false;
        };
        self.scene.remove_object(id);
        self.prune_assets();
        tracing::info!("Result discarded");
        true
    }

    /// Accept the pending result as the new base image. The mask is cleared
    /// and exactly one snapshot is recorded.
    pub fn commit_result(&mut self) -> bool {
        if !self.is_mounted() || self.scene.pending_id().is_none() {
            return false;
        }
        self.gestures.cancel(&mut self.scene);

        self.history.lock();
        if let Some(id) = self.scene.promote_pending()
            && let Some(obj) = self.scene.get_mut(id)
        {
            obj.flags.visible = true;
        }
        self.scene.remove_strokes();
        self.selection = None;
        self.history.unlock();

        self.apply_mode_flags();
        if let Some(bounds) = self.scene.base_bounds() {
            self.viewport.refit_floor(bounds);
        }
        self.snapshot();
        tracing::info!("Result committed");
        true
    }

    /// Press-and-hold compare: `true` shows the original under the result
    pub fn toggle_compare(&mut self, show_original: bool) {
        if let Some(id) = self.scene.pending_id()
            && let Some(obj) = self.scene.get_mut(id)
        {
            obj.flags.visible = !show_original;
        }
    }

    /// Validate the prompt and export the request body for `POST /generate`
    pub fn build_generate_request(&mut self, prompt: &str) -> Result<GenerateRequest, GenerationError> {
        let prompt = validate_prompt(prompt)?;
        let data = self.export_image_and_mask()?;
        Ok(GenerateRequest {
            image: data.image.to_base64(),
            mask: data.mask.to_base64(),
            prompt: prompt.to_string(),
        })
    }

    /// Feed a finished generation call back in. Success proposes the result;
    /// failure is returned unchanged and the scene stays idle.
    pub fn apply_generation(
        &mut self,
        outcome: Result<String, GenerationError>,
    ) -> Result<(), GenerationError> {
        match outcome {
            Ok(image) => Ok(self.set_result(&image)?),
            Err(e) => {
                tracing::warn!("Generation failed: {}", e);
                Err(e)
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}

/// Mount point for at most one session per editing surface
#[derive(Default)]
pub struct Surface {
    session: Option<Session>,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session unless one is already mounted. Returns whether a
    /// new session was created.
    pub fn mount(&mut self, config: EditorConfig) -> bool {
        if self.session.is_some() {
            tracing::debug!("Surface already mounted, ignoring second mount");
            return false;
        }
        self.session = Some(Session::new(config));
        true
    }

    pub fn unmount(&mut self) -> bool {
        match self.session.take() {
            Some(mut session) => {
                session.unmount();
                true
            }
            None => false,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    /// Run `f` against the mounted session, `None` when nothing is mounted
    pub fn with_session<R>(&mut self, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.session.as_mut().map(f)
    }
}
