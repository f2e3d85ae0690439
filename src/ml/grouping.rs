//! Partitioning of observations by compressor model

use crate::domain::CompressorObservation;
use std::collections::HashMap;

/// All observations sharing one model identifier
#[derive(Debug, Clone, PartialEq)]
pub struct ModelGroup {
    pub model: String,
    pub observations: Vec<CompressorObservation>,
}

impl ModelGroup {
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Split observations into one group per model identifier.
///
/// Groups come out in first-seen order of their identifier and keep the input
/// order of their members.
pub fn group_by_model<I>(observations: I) -> Vec<ModelGroup>
where
    I: IntoIterator<Item = CompressorObservation>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<ModelGroup> = Vec::new();

    for observation in observations {
        match index.get(observation.model()) {
            Some(&i) => groups[i].observations.push(observation),
            None => {
                let model = observation.model().to_string();
                index.insert(model.clone(), groups.len());
                groups.push(ModelGroup {
                    model,
                    observations: vec![observation],
                });
            }
        }
    }

    groups
}
