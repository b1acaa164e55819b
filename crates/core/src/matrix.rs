//! The run matrix: every (model, prompt, iteration) cell to execute.

use crate::types::RunIdentity;

/// Ordered, read-only list of runs.
///
/// Order is models outer, prompts middle, iterations inner, so all
/// repetitions of one prompt on one model run back to back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunMatrix {
    cells: Vec<RunIdentity>,
    model_count: usize,
    prompt_count: usize,
    iterations: u32,
}

impl RunMatrix {
    pub fn build(models: &[String], prompt_count: usize, iterations: u32) -> Self {
        let mut cells =
            Vec::with_capacity(models.len() * prompt_count * iterations as usize);

        for model in models {
            for prompt_index in 0..prompt_count {
                for iteration_index in 0..iterations {
                    cells.push(RunIdentity {
                        model_name: model.clone(),
                        prompt_index,
                        iteration_index,
                    });
                }
            }
        }

        Self {
            cells,
            model_count: models.len(),
            prompt_count,
            iterations,
        }
    }

    pub fn cells(&self) -> &[RunIdentity] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn model_count(&self) -> usize {
        self.model_count
    }

    pub fn prompt_count(&self) -> usize {
        self.prompt_count
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}
