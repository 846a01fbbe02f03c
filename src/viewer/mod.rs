//! The image collection and page layer: imports, removal, zoom and rotate
//! commands, panel visibility, selection, and window-state commit. Talks to
//! the overlay engine only through published signals.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::bus::{Signal, SignalBus};
use crate::config::ViewerConfig;
use crate::model::{ImageId, ImageRecord, PageState, WindowState};
use crate::store::{RecordStore, StorageResult};

const SCALE_IN: f64 = 1.1;
const SCALE_OUT: f64 = 0.9;
const ROTATION_STEP_DEGREES: f64 = 90.0;

const SUPPORTED_EXTENSIONS: [&str; 9] = [
    "jpg", "jpeg", "gif", "tiff", "ico", "png", "heif", "exif", "bmp",
];

pub struct ViewerPage {
    store: Rc<dyn RecordStore>,
    bus: Rc<SignalBus>,
    thickness_coefficient: f64,
    images: Vec<ImageRecord>,
    page: PageState,
}

impl ViewerPage {
    /// Loads the collection and page state. Records whose file is gone are
    /// dropped from the store; the page row is created on first run.
    pub fn load(
        store: Rc<dyn RecordStore>,
        bus: Rc<SignalBus>,
        config: &ViewerConfig,
    ) -> StorageResult<Self> {
        let mut images = store.images()?;
        images.retain(|record| {
            let exists = Path::new(&record.full_path).exists();
            if !exists {
                tracing::warn!(path = %record.full_path, "dropping image whose file is gone");
                if let Err(err) = store.remove_image(record.id) {
                    tracing::warn!(image = record.id, %err, "failed to remove stale image record");
                }
            }
            exists
        });

        let mut page = match store.page()? {
            Some(page) => page,
            None => {
                let mut page = PageState::new();
                page.id = store.insert_page(&page)?;
                page
            }
        };
        if let Some(current) = page.image_id {
            if !images.iter().any(|record| record.id == current) {
                page.image_id = None;
            }
        }

        Ok(Self {
            store,
            bus,
            thickness_coefficient: config.thickness_coefficient,
            images,
            page,
        })
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn page(&self) -> &PageState {
        &self.page
    }

    pub fn current_image(&self) -> Option<&ImageRecord> {
        let id = self.page.image_id?;
        self.images.iter().find(|record| record.id == id)
    }

    /// Imports image files, skipping unsupported extensions and paths that
    /// already have a record. Returns the number of records created.
    pub fn add_images<I, P>(&mut self, paths: I) -> StorageResult<usize>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut added = 0;
        for path in paths {
            let path = path.as_ref();
            if !has_supported_extension(path) {
                tracing::debug!(path = %path.display(), "skipping unsupported file");
                continue;
            }
            let mut record = ImageRecord::new(path.to_string_lossy().into_owned());
            if self.images.iter().any(|existing| existing.same_source(&record)) {
                continue;
            }
            record.id = self.store.insert_image(&record)?;
            self.images.push(record);
            added += 1;
        }
        Ok(added)
    }

    /// Removes the image and, through the gateway, all of its annotations.
    /// Removing the displayed image falls back to the first remaining one.
    pub fn remove_image(&mut self, id: ImageId) -> StorageResult<()> {
        self.store.remove_image(id)?;
        self.images.retain(|record| record.id != id);

        if self.page.image_id == Some(id) {
            match self.images.first().map(|record| record.id) {
                Some(next) => self.select_image(next)?,
                None => {
                    self.page.image_id = None;
                    self.store.update_page(&self.page)?;
                }
            }
        }
        Ok(())
    }

    pub fn select_image(&mut self, id: ImageId) -> StorageResult<()> {
        if !self.images.iter().any(|record| record.id == id) {
            tracing::warn!(image = id, "ignoring selection of unknown image");
            return Ok(());
        }
        self.page.image_id = Some(id);
        self.store.update_page(&self.page)?;
        self.announce_selection();
        Ok(())
    }

    /// Publishes the current selection and its thickness. Called once after
    /// the overlay engine is wired, and again on every switch.
    pub fn announce_selection(&self) {
        let Some(record) = self.current_image() else {
            return;
        };
        self.bus.publish(&Signal::ImageSelected(record.id));
        self.publish_thickness(record);
    }

    pub fn zoom_in(&mut self) -> StorageResult<()> {
        self.scale_current(SCALE_IN)
    }

    pub fn zoom_out(&mut self) -> StorageResult<()> {
        self.scale_current(SCALE_OUT)
    }

    pub fn rotate_left(&mut self) -> StorageResult<()> {
        self.rotate_current(-ROTATION_STEP_DEGREES)
    }

    pub fn rotate_right(&mut self) -> StorageResult<()> {
        self.rotate_current(ROTATION_STEP_DEGREES)
    }

    pub fn toggle_list_visibility(&mut self) -> StorageResult<()> {
        self.page.list_visible = !self.page.list_visible;
        self.store.update_page(&self.page)
    }

    pub fn toggle_edit_bar_visibility(&mut self) -> StorageResult<()> {
        self.page.edit_bar_visible = !self.page.edit_bar_visible;
        self.store.update_page(&self.page)
    }

    pub fn request_crop(&self) {
        self.bus.publish(&Signal::CropRequested);
    }

    pub fn request_clear_crop(&self) {
        self.bus.publish(&Signal::CropCleared);
    }

    pub fn request_copy(&self) {
        self.bus.publish(&Signal::CopyRequested);
    }

    pub fn request_save(&self, dest: PathBuf) {
        self.bus.publish(&Signal::SaveRequested(dest));
    }

    /// Insert-or-update of the singleton window row, committed at close time
    /// to avoid write amplification.
    pub fn commit_window_state(&self, mut window: WindowState) -> StorageResult<()> {
        match self.store.window()? {
            Some(existing) => {
                window.id = existing.id;
                self.store.update_window(&window)
            }
            None => self.store.insert_window(&window).map(|_| ()),
        }
    }

    fn scale_current(&mut self, factor: f64) -> StorageResult<()> {
        let Some(updated) = self.mutate_current(|record| {
            record.scale_x *= factor;
            record.scale_y *= factor;
        }) else {
            return Ok(());
        };
        self.store.update_image(&updated)?;
        self.publish_thickness(&updated);
        Ok(())
    }

    fn rotate_current(&mut self, delta: f64) -> StorageResult<()> {
        let Some(updated) = self.mutate_current(|record| {
            record.angle += delta;
        }) else {
            return Ok(());
        };
        self.store.update_image(&updated)
    }

    fn mutate_current(&mut self, apply: impl FnOnce(&mut ImageRecord)) -> Option<ImageRecord> {
        let id = self.page.image_id?;
        let record = self.images.iter_mut().find(|record| record.id == id)?;
        apply(record);
        Some(record.clone())
    }

    fn publish_thickness(&self, record: &ImageRecord) {
        self.bus.publish(&Signal::ThicknessChanged(
            self.thickness_coefficient / record.scale_y,
        ));
    }
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|candidate| extension.eq_ignore_ascii_case(candidate))
        })
}
