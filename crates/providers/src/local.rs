//! In-process capability invoker backed by a handler registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use switchyard_core::{
    Capability, CapabilityInvoker, CapabilityOutput, CapabilityRequest, InvokeError, InvokerKind,
};

/// A capability implemented inside this process.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    async fn handle(&self, request: CapabilityRequest) -> Result<CapabilityOutput, InvokeError>;
}

/// Routes each capability to its registered handler.
#[derive(Default, Clone)]
pub struct LocalInvoker {
    handlers: HashMap<Capability, Arc<dyn CapabilityHandler>>,
}

impl LocalInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, capability: Capability, handler: Arc<dyn CapabilityHandler>) -> Self {
        self.handlers.insert(capability, handler);
        self
    }

    /// Registered capabilities, in a stable order.
    pub fn capabilities(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.handlers.contains_key(c))
            .collect()
    }
}

#[async_trait]
impl CapabilityInvoker for LocalInvoker {
    fn kind(&self) -> InvokerKind {
        InvokerKind::Local
    }

    async fn invoke(
        &self,
        capability: Capability,
        request: CapabilityRequest,
    ) -> Result<CapabilityOutput, InvokeError> {
        let handler = self
            .handlers
            .get(&capability)
            .ok_or_else(|| InvokeError::Unavailable(capability.to_string()))?;
        handler.handle(request).await
    }
}
