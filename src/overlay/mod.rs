//! The interaction overlay engine: gesture-driven overlays above the image,
//! their persistence as annotations, and the signal wiring between the two.

mod controller;
mod session;

pub use controller::{CompletedGesture, GestureStateError, InteractionMode, OverlayController};
pub use session::AnnotationSession;

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use crate::bus::{Signal, SignalBus, SignalKind, SubscriptionToken};
use crate::clipboard::ClipboardBackend;
use crate::config::ViewerConfig;
use crate::geometry::{Color, Point, RectShape, Shape, ShapeKind};
use crate::notification;
use crate::snapshot;
use crate::store::RecordStore;

pub type OverlayId = u64;

/// Presentation attributes carried by a live overlay and persisted with its
/// annotation (thickness excluded; it is recomputed from the zoom level).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub border_color: Color,
    pub thickness: f64,
    pub background_color: Color,
    pub background_opacity: f64,
}

impl OverlayStyle {
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self {
            border_color: config.border_color,
            thickness: config.thickness_coefficient,
            background_color: config.background_color,
            background_opacity: config.background_opacity,
        }
    }
}

/// One transient visual above the image, backing a shape during or after a
/// gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub id: OverlayId,
    pub shape: Option<Shape>,
    pub style: OverlayStyle,
}

/// Capability provided by the windowing toolkit's image surface: overlay
/// layer management plus the clip-region setter used by the crop command.
pub trait RenderSurface {
    fn attach_overlay(&self, overlay: &Overlay);
    fn detach_overlay(&self, id: OverlayId);
    fn invalidate_overlay(&self, overlay: &Overlay);
    fn set_clip(&self, clip: Option<RectShape>);
}

/// Owns the controller and session and routes pointer events, bus signals,
/// and the crop/copy/save commands between them. All collaborators arrive
/// through the constructor; there is no ambient service lookup.
pub struct OverlayEngine {
    controller: OverlayController,
    session: AnnotationSession,
    store: Rc<dyn RecordStore>,
    clipboard: Rc<dyn ClipboardBackend>,
}

impl OverlayEngine {
    pub fn new(
        surface: Rc<dyn RenderSurface>,
        store: Rc<dyn RecordStore>,
        clipboard: Rc<dyn ClipboardBackend>,
        config: &ViewerConfig,
    ) -> Self {
        Self {
            controller: OverlayController::new(surface, OverlayStyle::from_config(config)),
            session: AnnotationSession::new(Rc::clone(&store)),
            store,
            clipboard,
        }
    }

    pub fn controller(&self) -> &OverlayController {
        &self.controller
    }

    pub fn current_image(&self) -> Option<crate::model::ImageId> {
        self.session.current_image()
    }

    pub fn set_mode(&mut self, mode: InteractionMode) {
        self.controller.set_mode(mode);
    }

    pub fn set_shape_kind(&mut self, kind: ShapeKind) {
        self.controller.set_shape_kind(kind);
    }

    pub fn set_border_color(&mut self, color: Color) {
        self.controller.set_border_color(color);
    }

    pub fn set_background_color(&mut self, color: Color) {
        self.controller.set_background_color(color);
    }

    pub fn set_background_opacity(&mut self, opacity: f64) {
        self.controller.set_background_opacity(opacity);
    }

    pub fn pointer_down(&mut self, point: Point) {
        self.controller.pointer_down(point);
    }

    pub fn pointer_moved(&mut self, point: Point, primary_held: bool) {
        self.controller.pointer_moved(point, primary_held);
    }

    pub fn pointer_released(&mut self) {
        if let Some(gesture) = self.controller.pointer_up() {
            if let Err(err) = self.session.record_shape(&gesture) {
                tracing::warn!(%err, "failed to persist completed shape; overlay stays visible");
            }
        }
    }

    pub fn secondary_button_down(&mut self, overlay_id: OverlayId) {
        if self.controller.remove_overlay(overlay_id) {
            if let Err(err) = self.session.forget_shape(overlay_id) {
                tracing::warn!(overlay_id, %err, "failed to delete annotation record");
            }
        }
    }

    pub fn handle_signal(&mut self, signal: &Signal) {
        match signal {
            Signal::ImageSelected(image_id) => {
                self.session.show_image(*image_id, &mut self.controller);
            }
            Signal::ThicknessChanged(thickness) => self.controller.apply_thickness(*thickness),
            Signal::CropRequested => self.controller.commit_crop(),
            Signal::CropCleared => self.controller.clear_crop(),
            Signal::SaveRequested(dest) => self.save_snapshot(dest),
            Signal::CopyRequested => self.copy_snapshot(),
        }
    }

    fn save_snapshot(&self, dest: &Path) {
        let Some(rendered) = self.render_visible() else {
            return;
        };
        match snapshot::save_png(&rendered, dest) {
            Ok(()) => {
                tracing::info!(path = %dest.display(), "snapshot saved");
                notification::send("Image saved", format!("Saved {}", dest.display()));
            }
            Err(err) => {
                tracing::warn!(%err, "failed to save snapshot");
                notification::send("Save failed", err.to_string());
            }
        }
    }

    fn copy_snapshot(&self) {
        let Some(rendered) = self.render_visible() else {
            return;
        };
        let encoded = match snapshot::encode_png(&rendered) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(%err, "failed to encode snapshot");
                return;
            }
        };
        match self.clipboard.copy_png(&encoded) {
            Ok(()) => notification::send("Image copied", "Visible region copied to clipboard"),
            Err(err) => {
                tracing::warn!(%err, "failed to copy snapshot to clipboard");
                notification::send("Copy failed", err.to_string());
            }
        }
    }

    /// Current image file with the committed crop applied. Every failure is
    /// logged and collapses to `None`: the command is dropped, the session
    /// keeps running.
    fn render_visible(&self) -> Option<image::DynamicImage> {
        let Some(image_id) = self.session.current_image() else {
            tracing::warn!("snapshot requested with no image selected");
            return None;
        };
        let record = match self.store.image(image_id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::warn!(image_id, "snapshot requested for unknown image");
                return None;
            }
            Err(err) => {
                tracing::warn!(image_id, %err, "failed to read image record for snapshot");
                return None;
            }
        };
        let source = match snapshot::load_source(Path::new(&record.full_path)) {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!(%err, "failed to load image for snapshot");
                return None;
            }
        };
        match snapshot::apply_clip(&source, self.controller.clip()) {
            Ok(rendered) => Some(rendered),
            Err(err) => {
                tracing::warn!(%err, "failed to clip image for snapshot");
                None
            }
        }
    }
}

/// Subscribes the engine to every signal kind it reacts to. The returned
/// tokens unsubscribe it again on teardown.
pub fn connect_engine(
    bus: &SignalBus,
    engine: &Rc<RefCell<OverlayEngine>>,
) -> Vec<SubscriptionToken> {
    SignalKind::ALL
        .into_iter()
        .map(|kind| {
            let engine = Rc::clone(engine);
            bus.subscribe(kind, move |signal| engine.borrow_mut().handle_signal(signal))
        })
        .collect()
}

#[cfg(test)]
impl OverlayStyle {
    pub(crate) fn test_default() -> Self {
        Self {
            border_color: Color::new(255, 0, 255),
            thickness: 5.0,
            background_color: Color::new(255, 255, 255),
            background_opacity: 1.0,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{RecordingClipboard, RecordingStore, RecordingSurface};
    use super::*;
    use crate::model::{AnnotationRecord, ImageRecord};

    struct Fixture {
        bus: Rc<SignalBus>,
        engine: Rc<RefCell<OverlayEngine>>,
        store: Rc<RecordingStore>,
        surface: Rc<RecordingSurface>,
        clipboard: Rc<RecordingClipboard>,
        tokens: Vec<SubscriptionToken>,
    }

    fn fixture() -> Fixture {
        let bus = Rc::new(SignalBus::new());
        let store = Rc::new(RecordingStore::default());
        let surface = Rc::new(RecordingSurface::default());
        let clipboard = Rc::new(RecordingClipboard::default());
        let engine = Rc::new(RefCell::new(OverlayEngine::new(
            Rc::clone(&surface) as Rc<dyn RenderSurface>,
            Rc::clone(&store) as Rc<dyn RecordStore>,
            Rc::clone(&clipboard) as Rc<dyn ClipboardBackend>,
            &ViewerConfig::default(),
        )));
        let tokens = connect_engine(&bus, &engine);
        Fixture {
            bus,
            engine,
            store,
            surface,
            clipboard,
            tokens,
        }
    }

    fn stored_annotation(store: &RecordingStore, image_id: i64, path: &str) {
        store
            .insert_annotation(&AnnotationRecord::new(
                image_id,
                path,
                Color::new(1, 2, 3),
                Color::new(4, 5, 6),
                0.5,
            ))
            .expect("recording store insert should succeed");
    }

    fn drag(engine: &Rc<RefCell<OverlayEngine>>, from: Point, to: Point) {
        let mut engine = engine.borrow_mut();
        engine.pointer_down(from);
        engine.pointer_moved(to, true);
        engine.pointer_released();
    }

    #[test]
    fn image_selected_signal_rebuilds_the_overlay_set() {
        let fx = fixture();
        stored_annotation(&fx.store, 1, "R 0 0 10 10");
        stored_annotation(&fx.store, 1, "L 0 0 4 4");
        stored_annotation(&fx.store, 2, "E 1 1 2 2");

        fx.bus.publish(&Signal::ImageSelected(1));
        assert_eq!(fx.engine.borrow().controller().overlays().len(), 2);

        fx.bus.publish(&Signal::ImageSelected(2));
        assert_eq!(fx.engine.borrow().controller().overlays().len(), 1);
        assert_eq!(fx.surface.attached_ids().len(), 1);
    }

    #[test]
    fn thickness_signal_rescales_previously_attached_overlays() {
        let fx = fixture();
        fx.bus.publish(&Signal::ImageSelected(1));
        drag(&fx.engine, Point::new(0.0, 0.0), Point::new(5.0, 5.0));
        drag(&fx.engine, Point::new(10.0, 0.0), Point::new(15.0, 5.0));

        // coefficient 5, vertical scale 2.0
        fx.bus.publish(&Signal::ThicknessChanged(5.0 / 2.0));

        let engine = fx.engine.borrow();
        assert_eq!(engine.controller().overlays().len(), 2);
        for overlay in engine.controller().overlays() {
            assert_eq!(overlay.style.thickness, 2.5);
        }
    }

    #[test]
    fn completed_gesture_is_persisted_and_deletable() {
        let fx = fixture();
        fx.bus.publish(&Signal::ImageSelected(3));

        drag(&fx.engine, Point::new(1.0, 2.0), Point::new(4.0, 6.0));

        let stored = fx.store.annotations(3).expect("read should succeed");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].path, "R 1 2 3 4");

        let overlay_id = fx.engine.borrow().controller().overlays()[0].id;
        fx.engine.borrow_mut().secondary_button_down(overlay_id);

        assert!(fx.store.annotations(3).expect("read should succeed").is_empty());
        assert!(fx.engine.borrow().controller().overlays().is_empty());
        assert_eq!(fx.store.remove_annotation_calls.get(), 1);
    }

    #[test]
    fn empty_click_is_not_persisted_and_deletes_without_a_gateway_call() {
        let fx = fixture();
        fx.bus.publish(&Signal::ImageSelected(3));

        {
            let mut engine = fx.engine.borrow_mut();
            engine.pointer_down(Point::new(4.0, 4.0));
            engine.pointer_released();
        }
        assert_eq!(fx.store.insert_annotation_calls.get(), 0);

        let overlay_id = fx.engine.borrow().controller().overlays()[0].id;
        fx.engine.borrow_mut().secondary_button_down(overlay_id);

        assert!(fx.engine.borrow().controller().overlays().is_empty());
        assert_eq!(fx.store.remove_annotation_calls.get(), 0);
    }

    #[test]
    fn persistence_failure_keeps_the_overlay_visible() {
        let fx = fixture();
        fx.bus.publish(&Signal::ImageSelected(3));
        fx.store.fail_writes.set(true);

        drag(&fx.engine, Point::new(0.0, 0.0), Point::new(5.0, 5.0));

        assert_eq!(fx.engine.borrow().controller().overlays().len(), 1);
        assert_eq!(fx.surface.attached_ids().len(), 1);
    }

    #[test]
    fn crop_signals_commit_and_clear_the_clip() {
        let fx = fixture();
        fx.engine.borrow_mut().set_mode(InteractionMode::CropSelect);
        {
            let mut engine = fx.engine.borrow_mut();
            engine.pointer_down(Point::new(2.0, 2.0));
            engine.pointer_moved(Point::new(6.0, 6.0), true);
            engine.pointer_released();
        }

        fx.bus.publish(&Signal::CropRequested);
        assert_eq!(
            fx.engine.borrow().controller().clip(),
            Some(RectShape::new(2.0, 2.0, 4.0, 4.0))
        );

        fx.bus.publish(&Signal::CropCleared);
        assert_eq!(fx.engine.borrow().controller().clip(), None);
    }

    #[test]
    fn copy_command_renders_the_clipped_image_to_the_clipboard() {
        let fx = fixture();

        let mut source_path = std::env::temp_dir();
        source_path.push("markview_engine_copy_source.png");
        snapshot::save_png(
            &image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
                10,
                8,
                image::Rgba([9, 9, 9, 255]),
            )),
            &source_path,
        )
        .expect("fixture image should save");

        let image_id = fx
            .store
            .insert_image(&ImageRecord::new(source_path.display().to_string()))
            .expect("insert should succeed");
        fx.bus.publish(&Signal::ImageSelected(image_id));

        fx.engine.borrow_mut().set_mode(InteractionMode::CropSelect);
        {
            let mut engine = fx.engine.borrow_mut();
            engine.pointer_down(Point::new(2.0, 2.0));
            engine.pointer_moved(Point::new(6.0, 5.0), true);
            engine.pointer_released();
        }
        fx.bus.publish(&Signal::CropRequested);
        fx.bus.publish(&Signal::CopyRequested);

        let payloads = fx.clipboard.payloads.borrow();
        assert_eq!(payloads.len(), 1);
        let copied = image::load_from_memory(&payloads[0]).expect("payload should be a PNG");
        assert_eq!(copied.width(), 4);
        assert_eq!(copied.height(), 3);

        let _ = std::fs::remove_file(&source_path);
    }

    #[test]
    fn save_command_writes_the_visible_region_to_disk() {
        let fx = fixture();

        let mut source_path = std::env::temp_dir();
        source_path.push("markview_engine_save_source.png");
        snapshot::save_png(
            &image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
                6,
                6,
                image::Rgba([1, 2, 3, 255]),
            )),
            &source_path,
        )
        .expect("fixture image should save");

        let image_id = fx
            .store
            .insert_image(&ImageRecord::new(source_path.display().to_string()))
            .expect("insert should succeed");
        fx.bus.publish(&Signal::ImageSelected(image_id));

        let mut dest = std::env::temp_dir();
        dest.push("markview_engine_save_out.png");
        fx.bus.publish(&Signal::SaveRequested(dest.clone()));

        let saved = snapshot::load_source(&dest).expect("saved snapshot should load");
        assert_eq!(saved.width(), 6);
        assert_eq!(saved.height(), 6);

        let _ = std::fs::remove_file(&source_path);
        let _ = std::fs::remove_file(&dest);
    }

    #[test]
    fn copy_with_no_image_selected_is_dropped() {
        let fx = fixture();
        fx.bus.publish(&Signal::CopyRequested);
        assert!(fx.clipboard.payloads.borrow().is_empty());
    }

    #[test]
    fn unsubscribed_engine_stops_reacting() {
        let fx = fixture();
        fx.bus.publish(&Signal::ImageSelected(1));
        drag(&fx.engine, Point::new(0.0, 0.0), Point::new(5.0, 5.0));

        for token in &fx.tokens {
            assert!(fx.bus.unsubscribe(*token));
        }
        fx.bus.publish(&Signal::ThicknessChanged(2.5));

        let engine = fx.engine.borrow();
        assert_eq!(engine.controller().overlays()[0].style.thickness, 5.0);
    }
}
