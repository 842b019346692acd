//! Scene graph: the base image, an optional pending result and mask strokes
//!
//! Objects are kept in draw order (index 0 is drawn first). Image pixels live
//! in an [`AssetStore`] so that serialized snapshots only carry asset ids.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use egui::Color32;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::geometry::{Bounds, Placement, Point};

/// Canvas background behind the images
pub const DEFAULT_BACKGROUND: Color32 = Color32::from_rgb(0x26, 0x26, 0x26);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Image,
    Stroke,
}

/// Which part an object plays in the scene; drives the mode flag policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectRole {
    BaseImage,
    CommittedImage,
    PendingResult,
    Stroke,
}

/// `visible` is part of a snapshot, `selectable`/`evented` are transient and
/// re-derived from the interaction mode after every scene replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectFlags {
    pub visible: bool,
    #[serde(skip)]
    pub selectable: bool,
    #[serde(skip)]
    pub evented: bool,
}

impl Default for ObjectFlags {
    fn default() -> Self {
        Self {
            visible: true,
            selectable: false,
            evented: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageObject {
    pub asset: AssetId,
    pub width: u32,
    pub height: u32,
    pub placement: Placement,
}

impl ImageObject {
    pub fn bounds(&self) -> Bounds {
        self.placement.bounds(self.width, self.height)
    }
}

/// Freehand mask stroke; points are in scene space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeObject {
    pub points: Vec<Point>,
    pub width: f32,
    pub color: Color32,
}

impl StrokeObject {
    pub fn new(points: Vec<Point>, width: f32, color: Color32) -> Self {
        Self {
            points,
            width,
            color,
        }
    }

    /// Bounding box of the painted area (path box grown by half the width)
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.points).map(|b| b.inflate(self.width / 2.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Drawable {
    Image(ImageObject),
    Stroke(StrokeObject),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: ObjectId,
    pub flags: ObjectFlags,
    pub drawable: Drawable,
}

impl SceneObject {
    pub fn kind(&self) -> ObjectKind {
        match self.drawable {
            Drawable::Image(_) => ObjectKind::Image,
            Drawable::Stroke(_) => ObjectKind::Stroke,
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        match &self.drawable {
            Drawable::Image(img) => Some(img.bounds()),
            Drawable::Stroke(stroke) => stroke.bounds(),
        }
    }

    pub fn as_image(&self) -> Option<&ImageObject> {
        match &self.drawable {
            Drawable::Image(img) => Some(img),
            Drawable::Stroke(_) => None,
        }
    }

    pub fn as_stroke(&self) -> Option<&StrokeObject> {
        match &self.drawable {
            Drawable::Stroke(stroke) => Some(stroke),
            Drawable::Image(_) => None,
        }
    }
}

/// Serialized form of the committed scene, as stored in history.
///
/// The base image is tagged explicitly rather than inferred from object order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    pub objects: Vec<SceneObject>,
    pub base: Option<ObjectId>,
}

impl SceneDocument {
    pub fn assets(&self) -> Vec<AssetId> {
        self.objects
            .iter()
            .filter_map(|o| o.as_image().map(|img| img.asset))
            .collect()
    }
}

#[derive(Debug)]
pub struct SceneGraph {
    objects: Vec<SceneObject>,
    base: Option<ObjectId>,
    pending: Option<ObjectId>,
    next_id: u64,
    pub background: Color32,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            base: None,
            pending: None,
            next_id: 1,
            background: DEFAULT_BACKGROUND,
        }
    }

    fn allocate_id(&mut self) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add on top of the draw order
    pub fn add_object(&mut self, drawable: Drawable) -> ObjectId {
        let id = self.allocate_id();
        self.objects.push(SceneObject {
            id,
            flags: ObjectFlags::default(),
            drawable,
        });
        id
    }

    pub fn remove_object(&mut self, id: ObjectId) -> Option<SceneObject> {
        let idx = self.objects.iter().position(|o| o.id == id)?;
        if self.base == Some(id) {
            self.base = None;
        }
        if self.pending == Some(id) {
            self.pending = None;
        }
        Some(self.objects.remove(idx))
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.base = None;
        self.pending = None;
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut SceneObject> {
        self.objects.iter_mut()
    }

    /// Objects in draw order, optionally restricted to one kind
    pub fn list_objects(&self, filter: Option<ObjectKind>) -> impl Iterator<Item = &SceneObject> {
        self.objects
            .iter()
            .filter(move |o| filter.is_none_or(|kind| o.kind() == kind))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    pub fn base_id(&self) -> Option<ObjectId> {
        self.base
    }

    pub fn pending_id(&self) -> Option<ObjectId> {
        self.pending
    }

    pub fn base_image(&self) -> Option<&ImageObject> {
        self.base.and_then(|id| self.get(id)).and_then(|o| o.as_image())
    }

    pub fn base_bounds(&self) -> Option<Bounds> {
        self.base_image().map(|img| img.bounds())
    }

    pub fn pending_result(&self) -> Option<&SceneObject> {
        self.pending.and_then(|id| self.get(id))
    }

    /// Replace any existing base image with `image`, placed with its
    /// top-left corner at the scene origin and drawn first.
    pub fn set_base_image(&mut self, mut image: ImageObject) -> ObjectId {
        if let Some(old) = self.base {
            self.remove_object(old);
        }
        image.placement = Placement::at_origin(image.width, image.height);
        let id = self.allocate_id();
        self.objects.insert(
            0,
            SceneObject {
                id,
                flags: ObjectFlags::default(),
                drawable: Drawable::Image(image),
            },
        );
        self.base = Some(id);
        id
    }

    /// Add `image` as the pending result, replacing a previous one
    pub fn set_pending(&mut self, image: ImageObject) -> ObjectId {
        if let Some(old) = self.pending {
            self.remove_object(old);
        }
        let id = self.add_object(Drawable::Image(image));
        self.pending = Some(id);
        id
    }

    /// Turn the pending result into the base image. The previous base is
    /// removed and the new base is moved to the back of the draw order.
    pub fn promote_pending(&mut self) -> Option<ObjectId> {
        let id = self.pending.take()?;
        if let Some(old) = self.base
            && old != id
        {
            self.remove_object(old);
        }
        self.base = Some(id);
        self.send_to_back(id);
        Some(id)
    }

    pub fn send_to_back(&mut self, id: ObjectId) {
        if let Some(idx) = self.objects.iter().position(|o| o.id == id) {
            let obj = self.objects.remove(idx);
            self.objects.insert(0, obj);
        }
    }

    pub fn remove_strokes(&mut self) -> usize {
        let before = self.objects.len();
        self.objects.retain(|o| o.kind() != ObjectKind::Stroke);
        before - self.objects.len()
    }

    /// Strokes (other than `except`) whose painted box overlaps `area`
    pub fn strokes_overlapping(&self, area: &Bounds, except: Option<ObjectId>) -> Vec<ObjectId> {
        self.list_objects(Some(ObjectKind::Stroke))
            .filter(|o| Some(o.id) != except)
            .filter(|o| o.bounds().is_some_and(|b| b.intersects(area)))
            .map(|o| o.id)
            .collect()
    }

    /// Top-most evented object under a scene point
    pub fn hit_test(&self, point: Point) -> Option<ObjectId> {
        self.objects
            .iter()
            .rev()
            .filter(|o| o.flags.visible && o.flags.evented)
            .find(|o| o.bounds().is_some_and(|b| b.contains(point)))
            .map(|o| o.id)
    }

    pub fn object_role(&self, obj: &SceneObject) -> ObjectRole {
        match obj.kind() {
            ObjectKind::Stroke => ObjectRole::Stroke,
            ObjectKind::Image if self.base == Some(obj.id) => ObjectRole::BaseImage,
            ObjectKind::Image if self.pending == Some(obj.id) => ObjectRole::PendingResult,
            ObjectKind::Image => ObjectRole::CommittedImage,
        }
    }

    /// Committed state only: the pending result never enters a document
    pub fn to_document(&self) -> SceneDocument {
        SceneDocument {
            objects: self
                .objects
                .iter()
                .filter(|o| Some(o.id) != self.pending)
                .cloned()
                .collect(),
            base: self.base,
        }
    }

    /// Replace all committed objects with `doc`. A pending result survives on
    /// top of the restored objects. Transient flags come back cleared.
    pub fn restore_document(&mut self, doc: SceneDocument) {
        let pending = self.pending.and_then(|id| self.remove_object(id));

        let base = match doc.base {
            Some(id) if doc.objects.iter().any(|o| o.id == id && o.as_image().is_some()) => {
                Some(id)
            }
            tagged => {
                let fallback = doc
                    .objects
                    .iter()
                    .rev()
                    .find(|o| o.kind() == ObjectKind::Image)
                    .map(|o| o.id);
                if tagged.is_some() {
                    tracing::warn!(
                        "Snapshot base tag {:?} does not name an image, using {:?}",
                        tagged,
                        fallback
                    );
                }
                fallback
            }
        };

        self.objects = doc.objects;
        for obj in &mut self.objects {
            obj.flags.selectable = false;
            obj.flags.evented = false;
        }
        self.base = base;
        self.pending = None;

        if let Some(max) = self.objects.iter().map(|o| o.id.0).max() {
            self.next_id = self.next_id.max(max + 1);
        }

        if let Some(obj) = pending {
            self.pending = Some(obj.id);
            self.objects.push(obj);
        }
    }

    pub fn referenced_assets(&self) -> Vec<AssetId> {
        self.objects
            .iter()
            .filter_map(|o| o.as_image().map(|img| img.asset))
            .collect()
    }
}

/// Decoded image pixels shared between the scene and history snapshots
#[derive(Debug, Default)]
pub struct AssetStore {
    images: HashMap<AssetId, Arc<RgbaImage>>,
    next_id: u64,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, image: RgbaImage) -> AssetId {
        self.next_id += 1;
        let id = AssetId(self.next_id);
        self.images.insert(id, Arc::new(image));
        id
    }

    pub fn get(&self, id: AssetId) -> Option<&Arc<RgbaImage>> {
        self.images.get(&id)
    }

    pub fn contains(&self, id: AssetId) -> bool {
        self.images.contains_key(&id)
    }

    /// Drop every asset not in `keep`
    pub fn retain(&mut self, keep: &HashSet<AssetId>) {
        self.images.retain(|id, _| keep.contains(id));
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
