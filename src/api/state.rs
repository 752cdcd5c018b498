use std::sync::Arc;

use crate::rounds::RoundController;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<RoundController>,
}

impl AppState {
    pub fn new(controller: Arc<RoundController>) -> Self {
        Self { controller }
    }
}
