//! Shared state for share handlers.

use std::sync::Arc;

use super::credential::UnlockSigner;
use super::gate::{GatePolicy, PasswordGate};
use super::render::ReportRenderer;
use super::storage::ShareStore;

pub struct ShareState {
    store: Arc<dyn ShareStore>,
    gate: PasswordGate,
    signer: UnlockSigner,
    renderer: Arc<dyn ReportRenderer>,
}

impl ShareState {
    #[must_use]
    pub fn new(
        store: Arc<dyn ShareStore>,
        policy: GatePolicy,
        signer: UnlockSigner,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        Self {
            gate: PasswordGate::new(store.clone(), policy),
            store,
            signer,
            renderer,
        }
    }

    #[must_use]
    pub fn store(&self) -> &dyn ShareStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn gate(&self) -> &PasswordGate {
        &self.gate
    }

    #[must_use]
    pub fn signer(&self) -> &UnlockSigner {
        &self.signer
    }

    #[must_use]
    pub fn renderer(&self) -> &dyn ReportRenderer {
        self.renderer.as_ref()
    }
}
