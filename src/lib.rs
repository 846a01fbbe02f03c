pub mod bus;
pub mod clipboard;
pub mod codec;
pub mod config;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod model;
pub mod notification;
pub mod overlay;
pub mod snapshot;
pub mod store;
pub mod viewer;

pub use error::{AppError, AppResult};

use std::cell::RefCell;
use std::rc::Rc;

use bus::{SignalBus, SubscriptionToken};
use clipboard::ClipboardBackend;
use overlay::{OverlayEngine, RenderSurface};
use store::RecordStore;
use viewer::ViewerPage;

/// A fully wired viewer session, as assembled for a hosting toolkit.
pub struct ViewerSession {
    pub bus: Rc<SignalBus>,
    pub engine: Rc<RefCell<OverlayEngine>>,
    pub page: ViewerPage,
    subscriptions: Vec<SubscriptionToken>,
}

impl ViewerSession {
    /// Composition root: every component receives its collaborators here,
    /// explicitly. The engine is connected to the bus before the page
    /// announces its restored selection, so the stored annotations of the
    /// last-viewed image come up with the window.
    pub fn assemble(
        store: Rc<dyn RecordStore>,
        surface: Rc<dyn RenderSurface>,
        clipboard: Rc<dyn ClipboardBackend>,
    ) -> AppResult<Self> {
        let config = config::load_viewer_config();
        let bus = Rc::new(SignalBus::new());
        let engine = Rc::new(RefCell::new(OverlayEngine::new(
            surface,
            Rc::clone(&store),
            clipboard,
            &config,
        )));
        let subscriptions = overlay::connect_engine(&bus, &engine);

        let page = ViewerPage::load(store, Rc::clone(&bus), &config)?;
        page.announce_selection();

        Ok(Self {
            bus,
            engine,
            page,
            subscriptions,
        })
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        for token in self.subscriptions.drain(..) {
            self.bus.unsubscribe(token);
        }
    }
}
