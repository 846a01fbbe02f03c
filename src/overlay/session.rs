use std::collections::HashMap;
use std::rc::Rc;

use super::{CompletedGesture, OverlayController, OverlayId, OverlayStyle};
use crate::codec;
use crate::model::{AnnotationId, AnnotationRecord, ImageId};
use crate::store::{RecordStore, StorageResult};

/// Keeps the live overlay set in 1:1 correspondence with the stored
/// annotations of the current image and bridges completed gestures to the
/// persistence gateway.
pub struct AnnotationSession {
    store: Rc<dyn RecordStore>,
    current_image: Option<ImageId>,
    records: HashMap<OverlayId, AnnotationId>,
}

impl AnnotationSession {
    pub fn new(store: Rc<dyn RecordStore>) -> Self {
        Self {
            store,
            current_image: None,
            records: HashMap::new(),
        }
    }

    pub fn current_image(&self) -> Option<ImageId> {
        self.current_image
    }

    /// Rebuilds the overlay set for `image_id`: existing overlays are
    /// discarded, stored annotations are rehydrated and attached. Calling
    /// this twice with the same id yields the same overlay count.
    ///
    /// A gateway failure surfaces as an empty annotation set; a missing
    /// annotation store must not block viewing the image.
    pub fn show_image(&mut self, image_id: ImageId, controller: &mut OverlayController) {
        controller.clear_overlays();
        self.records.clear();
        self.current_image = Some(image_id);

        let stored = match self.store.annotations(image_id) {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(image_id, %err, "failed to load annotations; showing none");
                return;
            }
        };

        let thickness = controller.style().thickness;
        for record in stored {
            let shape = match codec::deserialize(&record.path) {
                Ok(shape) => shape,
                Err(err) => {
                    tracing::warn!(annotation = record.id, %err, "skipping annotation with malformed path");
                    continue;
                }
            };
            let style = OverlayStyle {
                border_color: record.border_color,
                thickness,
                background_color: record.background_color,
                background_opacity: record.background_opacity,
            };
            let overlay_id = controller.install_overlay(shape, style);
            self.records.insert(overlay_id, record.id);
        }
    }

    /// Persists a completed gesture for the current image and remembers its
    /// record id for a later delete gesture.
    pub fn record_shape(&mut self, gesture: &CompletedGesture) -> StorageResult<()> {
        let Some(image_id) = self.current_image else {
            tracing::warn!("draw gesture completed with no image selected; not persisting");
            return Ok(());
        };

        let record = AnnotationRecord::new(
            image_id,
            codec::serialize(&gesture.shape),
            gesture.style.border_color,
            gesture.style.background_color,
            gesture.style.background_opacity,
        );
        let annotation_id = self.store.insert_annotation(&record)?;
        self.records.insert(gesture.overlay_id, annotation_id);
        tracing::debug!(annotation = annotation_id, image_id, "annotation persisted");
        Ok(())
    }

    /// Deletes the record backing `overlay_id`, if any. An overlay without a
    /// record (an empty-geometry click) is a gateway no-op.
    pub fn forget_shape(&mut self, overlay_id: OverlayId) -> StorageResult<()> {
        match self.records.remove(&overlay_id) {
            Some(annotation_id) => self.store.remove_annotation(annotation_id),
            None => Ok(()),
        }
    }
}
