//! Test utilities shared by unit and integration tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::embedding::Embedder;
use crate::error::{EngineError, Result};
use crate::extractor::CompletionProvider;

/// Completion provider that replays scripted answers in order.
///
/// Once the script is exhausted it errors, which exercises the
/// extractor's raw-input fallback. Use [`ScriptedCompletion::fixed`] to
/// repeat one answer forever.
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<Value>>,
    repeat: Option<Value>,
}

impl ScriptedCompletion {
    pub fn new(script: Vec<Value>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
        }
    }

    pub fn fixed(value: Value) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(value),
        }
    }

    /// Provider that always errors; the extractor falls back to the raw
    /// input.
    pub fn failing() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete_json(&self, _system: &str, _user: &str) -> Result<Value> {
        if let Some(value) = self
            .script
            .lock()
            .expect("script mutex poisoned")
            .pop_front()
        {
            return Ok(value);
        }
        match &self.repeat {
            Some(value) => Ok(value.clone()),
            None => Err(EngineError::Provider("script exhausted".to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// A unit embedding along one axis of the given dimension. Handy for
/// constructing exactly-orthogonal corpora in tests.
pub fn axis_embedding(dimension: usize, axis: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dimension];
    v[axis] = 1.0;
    v
}

/// Embedder that answers every text with the same vector, letting tests
/// steer the query geometry precisely.
pub struct FixedEmbedder {
    vector: Vec<f32>,
}

impl FixedEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.vector.clone())
    }

    fn dimension(&self) -> usize {
        self.vector.len()
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}
