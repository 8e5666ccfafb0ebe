//! Application state shared across handlers

use std::sync::Arc;

use crate::batch::{BatchExecutor, ExecutorSettings};
use crate::config::AppConfig;
use crate::device::{SessionBuilder, SessionOpener};
use crate::gateway::GatewayManager;
use crate::inventory::Inventory;

pub struct AppState {
    pub inventory: Arc<Inventory>,
    pub gateway: Arc<GatewayManager>,
    pub executor: Arc<BatchExecutor>,
}

impl AppState {
    /// Wire the SSH-backed gateway and session builder around `inventory`
    pub fn new(config: &AppConfig, inventory: Arc<Inventory>) -> Self {
        let gateway = Arc::new(GatewayManager::with_ssh(inventory.clone(), &config.gateway));
        let opener: Arc<dyn SessionOpener> = Arc::new(SessionBuilder::new(
            inventory.clone(),
            gateway.clone(),
            &config.batch,
        ));
        let executor = Arc::new(BatchExecutor::new(
            inventory.clone(),
            opener,
            ExecutorSettings::from(&config.batch),
        ));
        Self::with_components(inventory, gateway, executor)
    }

    pub fn with_components(
        inventory: Arc<Inventory>,
        gateway: Arc<GatewayManager>,
        executor: Arc<BatchExecutor>,
    ) -> Self {
        Self {
            inventory,
            gateway,
            executor,
        }
    }
}
