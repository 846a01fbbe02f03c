//! Synchronous broadcast bus decoupling the page layer from the overlay
//! engine.
//!
//! Dispatch is keyed by signal kind and runs on the publisher's thread, in
//! registration order, before `publish` returns. Registrations are not
//! deduplicated; subscribers unsubscribe by token on teardown.

use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::rc::Rc;

use crate::model::ImageId;

#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    ImageSelected(ImageId),
    /// New border thickness for all live overlays, already divided by the
    /// current vertical scale.
    ThicknessChanged(f64),
    SaveRequested(PathBuf),
    CropRequested,
    CropCleared,
    CopyRequested,
}

impl Signal {
    pub const fn kind(&self) -> SignalKind {
        match self {
            Self::ImageSelected(_) => SignalKind::ImageSelected,
            Self::ThicknessChanged(_) => SignalKind::ThicknessChanged,
            Self::SaveRequested(_) => SignalKind::SaveRequested,
            Self::CropRequested => SignalKind::CropRequested,
            Self::CropCleared => SignalKind::CropCleared,
            Self::CopyRequested => SignalKind::CopyRequested,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    ImageSelected,
    ThicknessChanged,
    SaveRequested,
    CropRequested,
    CropCleared,
    CopyRequested,
}

impl SignalKind {
    pub const ALL: [SignalKind; 6] = [
        Self::ImageSelected,
        Self::ThicknessChanged,
        Self::SaveRequested,
        Self::CropRequested,
        Self::CropCleared,
        Self::CopyRequested,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionToken(u64);

type Handler = Rc<dyn Fn(&Signal)>;

struct Registration {
    token: SubscriptionToken,
    handler: Handler,
}

#[derive(Default)]
struct BusState {
    handlers: HashMap<SignalKind, Vec<Registration>>,
    next_token: u64,
}

#[derive(Default)]
pub struct SignalBus {
    inner: RefCell<BusState>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        kind: SignalKind,
        handler: impl Fn(&Signal) + 'static,
    ) -> SubscriptionToken {
        let mut state = self.inner.borrow_mut();
        state.next_token += 1;
        let token = SubscriptionToken(state.next_token);
        state.handlers.entry(kind).or_default().push(Registration {
            token,
            handler: Rc::new(handler),
        });
        token
    }

    /// Returns whether the token was still registered.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut state = self.inner.borrow_mut();
        for registrations in state.handlers.values_mut() {
            if let Some(index) = registrations
                .iter()
                .position(|registration| registration.token == token)
            {
                registrations.remove(index);
                return true;
            }
        }
        false
    }

    /// Fire-and-forget fan-out. A panicking subscriber is isolated and
    /// reported; the remaining subscribers still run.
    pub fn publish(&self, signal: &Signal) {
        let handlers: Vec<Handler> = {
            let state = self.inner.borrow();
            state
                .handlers
                .get(&signal.kind())
                .map(|registrations| {
                    registrations
                        .iter()
                        .map(|registration| Rc::clone(&registration.handler))
                        .collect()
                })
                .unwrap_or_default()
        };

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(signal))).is_err() {
                tracing::error!(kind = ?signal.kind(), "signal subscriber panicked during dispatch");
            }
        }
    }
}

#[cfg(test)]
impl SignalBus {
    fn subscriber_count(&self, kind: SignalKind) -> usize {
        self.inner
            .borrow()
            .handlers
            .get(&kind)
            .map_or(0, Vec::len)
    }
}
