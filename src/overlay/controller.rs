use std::rc::Rc;

use thiserror::Error;

use super::{Overlay, OverlayId, OverlayStyle, RenderSurface};
use crate::geometry::{
    Color, EllipseShape, LineShape, Point, PolylineShape, RectShape, Shape, ShapeKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    CropSelect,
    Draw,
}

/// Finished draw gesture, handed to the annotation session for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedGesture {
    pub overlay_id: OverlayId,
    pub shape: Shape,
    pub style: OverlayStyle,
}

/// Gesture invariants the toolkit's event ordering can violate. These are
/// logged and ignored, never returned: a stray pointer event must not take
/// the session down.
#[derive(Debug, Error)]
pub enum GestureStateError {
    #[error("pointer released with no active gesture")]
    ReleaseWithoutGesture,
    #[error("crop commit with no selection rectangle")]
    CommitWithoutSelection,
    #[error("overlay {0} is not live")]
    UnknownOverlay(OverlayId),
}

fn ignore(err: GestureStateError) {
    tracing::warn!(%err, "ignoring out-of-order gesture event");
}

/// Translates pointer events into live overlays, one gesture at a time.
///
/// The two modes are mutually exclusive; switching mode mid-gesture aborts
/// the in-progress shape. The active gesture is tracked by an explicit
/// overlay handle, never by list position.
pub struct OverlayController {
    surface: Rc<dyn RenderSurface>,
    mode: InteractionMode,
    shape_kind: ShapeKind,
    style: OverlayStyle,
    overlays: Vec<Overlay>,
    crop_overlay: Option<Overlay>,
    crop_attached: bool,
    clip: Option<RectShape>,
    active: Option<OverlayId>,
    gesture_start: Option<Point>,
    next_id: OverlayId,
}

impl OverlayController {
    pub fn new(surface: Rc<dyn RenderSurface>, style: OverlayStyle) -> Self {
        Self {
            surface,
            mode: InteractionMode::Draw,
            shape_kind: ShapeKind::Rectangle,
            style,
            overlays: Vec::new(),
            crop_overlay: None,
            crop_attached: false,
            clip: None,
            active: None,
            gesture_start: None,
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> OverlayId {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: InteractionMode) {
        if self.mode == mode {
            return;
        }
        self.abort_gesture();
        if self.mode == InteractionMode::CropSelect {
            self.detach_crop_overlay();
        }
        self.mode = mode;
    }

    pub fn shape_kind(&self) -> ShapeKind {
        self.shape_kind
    }

    pub fn set_shape_kind(&mut self, kind: ShapeKind) {
        self.shape_kind = kind;
    }

    /// Seed style applied to overlays created by future gestures.
    pub fn style(&self) -> OverlayStyle {
        self.style
    }

    pub fn set_border_color(&mut self, color: Color) {
        self.style.border_color = color;
    }

    pub fn set_background_color(&mut self, color: Color) {
        self.style.background_color = color;
    }

    pub fn set_background_opacity(&mut self, opacity: f64) {
        self.style.background_opacity = opacity.clamp(0.0, 1.0);
    }

    /// New border thickness, precomputed for the current vertical scale.
    /// Applies to the seed style and every live overlay so stroke width
    /// stays constant in screen space.
    pub fn apply_thickness(&mut self, thickness: f64) {
        self.style.thickness = thickness;
        for overlay in &mut self.overlays {
            overlay.style.thickness = thickness;
            self.surface.invalidate_overlay(overlay);
        }
        if let Some(overlay) = self.crop_overlay.as_mut() {
            overlay.style.thickness = thickness;
            if self.crop_attached {
                self.surface.invalidate_overlay(overlay);
            }
        }
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn overlay(&self, id: OverlayId) -> Option<&Overlay> {
        self.overlays.iter().find(|overlay| overlay.id == id)
    }

    pub fn clip(&self) -> Option<RectShape> {
        self.clip
    }

    pub fn crop_selection(&self) -> Option<RectShape> {
        match self.crop_overlay.as_ref()?.shape {
            Some(Shape::Rectangle(rect)) => Some(rect),
            _ => None,
        }
    }

    pub fn pointer_down(&mut self, point: Point) {
        self.gesture_start = Some(point);
        match self.mode {
            InteractionMode::CropSelect => {
                if self.crop_overlay.is_none() {
                    let id = self.allocate_id();
                    self.crop_overlay = Some(Overlay {
                        id,
                        shape: None,
                        style: self.style,
                    });
                }
                let Some(overlay) = self.crop_overlay.as_ref() else {
                    return;
                };
                if !self.crop_attached {
                    self.surface.attach_overlay(overlay);
                    self.crop_attached = true;
                }
                self.active = Some(overlay.id);
            }
            InteractionMode::Draw => {
                let id = self.allocate_id();
                let overlay = Overlay {
                    id,
                    shape: None,
                    style: self.style,
                };
                self.surface.attach_overlay(&overlay);
                self.overlays.push(overlay);
                self.active = Some(id);
            }
        }
    }

    pub fn pointer_moved(&mut self, point: Point, primary_held: bool) {
        if !primary_held {
            return;
        }
        // A drag that began outside the surface has no gesture here.
        let (Some(active), Some(start)) = (self.active, self.gesture_start) else {
            return;
        };

        match self.mode {
            InteractionMode::CropSelect => {
                let Some(overlay) = self.crop_overlay.as_mut() else {
                    ignore(GestureStateError::UnknownOverlay(active));
                    return;
                };
                overlay.shape = Some(Shape::Rectangle(RectShape::from_drag(start, point)));
                self.surface.invalidate_overlay(overlay);
            }
            InteractionMode::Draw => {
                let kind = self.shape_kind;
                let Some(overlay) = self
                    .overlays
                    .iter_mut()
                    .find(|overlay| overlay.id == active)
                else {
                    ignore(GestureStateError::UnknownOverlay(active));
                    return;
                };
                update_draw_shape(overlay, kind, start, point);
                self.surface.invalidate_overlay(overlay);
            }
        }
    }

    /// Ends the gesture. In draw mode a non-empty shape is returned for
    /// persistence; an empty one (click without drag) stays attached as an
    /// empty overlay.
    pub fn pointer_up(&mut self) -> Option<CompletedGesture> {
        let Some(active) = self.active.take() else {
            ignore(GestureStateError::ReleaseWithoutGesture);
            return None;
        };
        self.gesture_start = None;

        match self.mode {
            // The selection rectangle stays live until commit or mode switch.
            InteractionMode::CropSelect => None,
            InteractionMode::Draw => {
                let overlay = self.overlay(active)?;
                let shape = overlay.shape.clone()?;
                Some(CompletedGesture {
                    overlay_id: active,
                    shape,
                    style: overlay.style,
                })
            }
        }
    }

    /// Secondary-button delete gesture. Returns whether an overlay was live
    /// under that id and has been removed.
    pub fn remove_overlay(&mut self, id: OverlayId) -> bool {
        let Some(index) = self.overlays.iter().position(|overlay| overlay.id == id) else {
            ignore(GestureStateError::UnknownOverlay(id));
            return false;
        };
        self.surface.detach_overlay(id);
        self.overlays.remove(index);
        if self.active == Some(id) {
            self.active = None;
            self.gesture_start = None;
        }
        true
    }

    /// Installs a rehydrated overlay for an already-persisted shape.
    pub fn install_overlay(&mut self, shape: Shape, style: OverlayStyle) -> OverlayId {
        let id = self.allocate_id();
        let overlay = Overlay {
            id,
            shape: Some(shape),
            style,
        };
        self.surface.attach_overlay(&overlay);
        self.overlays.push(overlay);
        id
    }

    /// Detaches and discards every draw overlay, aborting any gesture.
    pub fn clear_overlays(&mut self) {
        for overlay in &self.overlays {
            self.surface.detach_overlay(overlay.id);
        }
        self.overlays.clear();
        self.active = None;
        self.gesture_start = None;
    }

    /// Clips the image surface to the current selection rectangle and
    /// detaches (but does not forget) the selection overlay.
    pub fn commit_crop(&mut self) {
        let rect = match self.crop_overlay.as_ref().map(|overlay| &overlay.shape) {
            Some(Some(Shape::Rectangle(rect))) => *rect,
            _ => {
                ignore(GestureStateError::CommitWithoutSelection);
                return;
            }
        };
        self.surface.set_clip(Some(rect));
        self.clip = Some(rect);
        self.detach_crop_overlay();
    }

    pub fn clear_crop(&mut self) {
        self.surface.set_clip(None);
        self.clip = None;
    }

    fn abort_gesture(&mut self) {
        let Some(active) = self.active.take() else {
            self.gesture_start = None;
            return;
        };
        self.gesture_start = None;
        if self.mode == InteractionMode::Draw {
            if let Some(index) = self.overlays.iter().position(|overlay| overlay.id == active) {
                self.surface.detach_overlay(active);
                self.overlays.remove(index);
            }
        }
    }

    fn detach_crop_overlay(&mut self) {
        if !self.crop_attached {
            return;
        }
        if let Some(overlay) = self.crop_overlay.as_ref() {
            self.surface.detach_overlay(overlay.id);
        }
        self.crop_attached = false;
    }
}

fn update_draw_shape(overlay: &mut Overlay, kind: ShapeKind, start: Point, current: Point) {
    match kind {
        ShapeKind::Rectangle => {
            overlay.shape = Some(Shape::Rectangle(RectShape::from_drag(start, current)));
        }
        ShapeKind::Ellipse => {
            overlay.shape = Some(Shape::Ellipse(EllipseShape::from_drag(start, current)));
        }
        ShapeKind::Line => {
            overlay.shape = Some(Shape::Line(LineShape::new(start, current)));
        }
        ShapeKind::Polyline => match overlay.shape.as_mut() {
            Some(Shape::Polyline(polyline)) => polyline.extend_to(current),
            _ => {
                // A polyline is an open stroke; suppress the fill.
                overlay.style.background_opacity = 0.0;
                let mut polyline = PolylineShape::new(start);
                polyline.extend_to(current);
                overlay.shape = Some(Shape::Polyline(polyline));
            }
        },
    }
}
