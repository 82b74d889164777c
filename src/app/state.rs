use super::{ComponentState, ReelcamOrchestrator};
use std::collections::HashMap;
use tracing::debug;

impl ReelcamOrchestrator {
    /// Update component state
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        let mut states = self.component_states.lock().await;
        states.insert(component.to_string(), state.clone());
        debug!("Component '{}' state changed to: {:?}", component, state);
    }

    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        let states = self.component_states.lock().await;
        states.get(component).cloned()
    }

    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        let states = self.component_states.lock().await;
        states.clone()
    }

    /// Components this run mode manages, in start order
    pub(super) fn components(&self) -> Vec<&'static str> {
        let mut components = match self.mode {
            super::RunMode::Feed => vec!["feed", "players"],
            super::RunMode::Camera => vec!["camera_view"],
        };
        if self.keyboard_enabled {
            components.push("keyboard");
        }
        components
    }
}
