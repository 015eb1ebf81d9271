//! Shared state for the control surface

use std::sync::Arc;

use crate::application::stepper::BatchStepper;
use crate::server::nonce::NonceStore;

#[derive(Clone)]
pub struct AppState {
    pub stepper: Arc<BatchStepper>,
    pub nonces: NonceStore,
    pub api_token: String,
}

impl AppState {
    pub fn new(stepper: Arc<BatchStepper>, api_token: String) -> Self {
        Self {
            stepper,
            nonces: NonceStore::default(),
            api_token,
        }
    }
}
