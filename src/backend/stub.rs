//! Canned backend for tests. Counts builds and replays fixed responses.

use super::{InferenceBackend, Pipeline, PipelineInput};
use crate::error::{Error, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub enum Reply {
    Value(Value),
    Fail(String),
    /// Answers with the id of the model the pipeline was built for.
    EchoModel,
    /// Blocks until `release` fires (or its sender is dropped), then answers.
    Hold(Value, Arc<Mutex<Receiver<()>>>),
}

#[derive(Default)]
pub struct StubBackend {
    builds: Mutex<Vec<String>>,
    invocations: Arc<AtomicUsize>,
    replies: Mutex<Vec<(String, Reply)>>,
    fail_build: Mutex<Option<String>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pipeline built for `task` answers with `value`.
    pub fn reply(self, task: &str, value: Value) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push((task.to_string(), Reply::Value(value)));
        self
    }

    /// Pipelines built for `task` label their result with their model id.
    pub fn echo_model(self, task: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push((task.to_string(), Reply::EchoModel));
        self
    }

    /// Pipelines built for `task` wait on `release` before answering with `value`.
    pub fn hold(self, task: &str, value: Value, release: Receiver<()>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push((task.to_string(), Reply::Hold(value, Arc::new(Mutex::new(release)))));
        self
    }

    pub fn fail_invoke(self, task: &str, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push((task.to_string(), Reply::Fail(message.to_string())));
        self
    }

    pub fn fail_build(self, message: &str) -> Self {
        *self.fail_build.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn build_count(&self, task: &str) -> usize {
        self.builds.lock().unwrap().iter().filter(|t| *t == task).count()
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn load(&self, task: &str, model_id: &str) -> Result<Box<dyn Pipeline>> {
        self.builds.lock().unwrap().push(task.to_string());

        if let Some(message) = self.fail_build.lock().unwrap().clone() {
            return Err(Error::DownloadFailed(message));
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .iter()
            .find(|(t, _)| t == task)
            .map(|(_, r)| r.clone())
            .ok_or_else(|| Error::ConfigError(format!("Unsupported task: {}", task)))?;

        Ok(Box::new(StubPipeline {
            model_id: model_id.to_string(),
            reply,
            invocations: self.invocations.clone(),
        }))
    }
}

struct StubPipeline {
    model_id: String,
    reply: Reply,
    invocations: Arc<AtomicUsize>,
}

impl Pipeline for StubPipeline {
    fn invoke(&mut self, _input: PipelineInput) -> Result<Value> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Reply::Value(value) => Ok(value.clone()),
            Reply::Fail(message) => Err(Error::InvalidInput(message.clone())),
            Reply::EchoModel => Ok(serde_json::json!([{"label": self.model_id, "score": 1.0}])),
            Reply::Hold(value, release) => {
                let _ = release.lock().unwrap().recv();
                Ok(value.clone())
            }
        }
    }
}
