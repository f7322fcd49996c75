use super::traits::Stage;
use crate::error::Result;
use crate::model::AudioBuffer;

/// Ordered list of stages applied one after another
#[derive(Default)]
pub struct StageSequence {
    stages: Vec<Box<dyn Stage>>,
}

impl StageSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage
    pub fn then<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    /// Run every stage in order; the first failure stops the chain
    pub fn apply(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        let mut current = input.clone();
        for stage in &self.stages {
            log::trace!("Applying stage {}", stage.name());
            current = stage.apply(&current)?;
        }
        Ok(current)
    }
}

impl std::fmt::Debug for StageSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
