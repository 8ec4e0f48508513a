//! Scripted collaborators for dispatcher and fetcher tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use switchyard_core::{
    Capability, CapabilityInvoker, CapabilityOutput, CapabilityRequest, Classifier,
    ClassifierError, ClassifierRequest, ContextError, ContextSource, Decision, InvokeError,
    InvokerKind, TenantId,
};

/// A classifier that returns a sequence of scripted decisions.
///
/// Each call to `classify` returns the next entry in the queue.
/// Panics if more calls are made than decisions provided.
pub struct ScriptedClassifier {
    decisions: Mutex<VecDeque<Result<Decision, ClassifierError>>>,
    requests: Mutex<Vec<ClassifierRequest>>,
    delay: Duration,
}

impl ScriptedClassifier {
    pub fn new(decisions: Vec<Result<Decision, ClassifierError>>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into()),
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn respond(reply: &str) -> Self {
        Self::new(vec![Ok(Decision::respond(reply))])
    }

    pub fn delegate(capability: Capability, reply: &str) -> Self {
        Self::new(vec![Ok(Decision::delegate(capability, reply))])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ClassifierRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn classify(&self, request: ClassifierRequest) -> Result<Decision, ClassifierError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedClassifier: no more decisions (call #{call})"))
    }
}

/// An invoker that plays back scripted outcomes, then repeats a fallback.
pub struct ScriptedInvoker {
    script: Mutex<VecDeque<Result<CapabilityOutput, InvokeError>>>,
    fallback: Result<CapabilityOutput, InvokeError>,
    calls: Mutex<Vec<(Capability, CapabilityRequest)>>,
    delay: Duration,
}

impl ScriptedInvoker {
    pub fn new(
        script: Vec<Result<CapabilityOutput, InvokeError>>,
        fallback: Result<CapabilityOutput, InvokeError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(Vec::new(), Ok(CapabilityOutput::PlainText(text.into())))
    }

    pub fn failing(error: InvokeError) -> Self {
        Self::new(Vec::new(), Err(error))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(Capability, CapabilityRequest)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CapabilityInvoker for ScriptedInvoker {
    fn kind(&self) -> InvokerKind {
        InvokerKind::Local
    }

    async fn invoke(
        &self,
        capability: Capability,
        request: CapabilityRequest,
    ) -> Result<CapabilityOutput, InvokeError> {
        self.calls.lock().unwrap().push((capability, request));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// A context source that plays back scripted answers, then repeats a fallback.
pub struct ScriptedContextSource {
    script: Mutex<VecDeque<Result<String, ContextError>>>,
    fallback: Result<String, ContextError>,
    calls: Mutex<Vec<TenantId>>,
    delay: Duration,
}

impl ScriptedContextSource {
    pub fn new(
        script: Vec<Result<String, ContextError>>,
        fallback: Result<String, ContextError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn answering(context: &str) -> Self {
        Self::new(Vec::new(), Ok(context.into()))
    }

    pub fn failing() -> Self {
        Self::new(Vec::new(), Err(ContextError::Status(503)))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ContextSource for ScriptedContextSource {
    async fn fetch(&self, tenant_id: TenantId) -> Result<String, ContextError> {
        self.calls.lock().unwrap().push(tenant_id);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
