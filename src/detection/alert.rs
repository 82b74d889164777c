use crate::detection::types::Detection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertTransition {
    Raised,
    Cleared,
}

/// Edge-triggered presence alert for one label: fires once on appearance, clears on disappearance
#[derive(Debug, Clone)]
pub struct AlertLatch {
    label: String,
    min_confidence: f32,
    active: bool,
}

impl AlertLatch {
    pub fn new<S: Into<String>>(label: S, min_confidence: f32) -> Self {
        Self {
            label: label.into(),
            min_confidence,
            active: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn update(&mut self, detections: &[Detection]) -> Option<AlertTransition> {
        let present = detections
            .iter()
            .any(|d| d.label == self.label && d.confidence >= self.min_confidence);

        match (self.active, present) {
            (false, true) => {
                self.active = true;
                Some(AlertTransition::Raised)
            }
            (true, false) => {
                self.active = false;
                Some(AlertTransition::Cleared)
            }
            _ => None,
        }
    }
}
