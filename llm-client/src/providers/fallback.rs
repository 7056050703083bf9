//! Primary/alternate request-shape fallback
//!
//! Callers see one provider. When the primary rejects the request shape the
//! same request is replayed against the alternate; every other error is
//! returned as-is.

use async_trait::async_trait;
use log::warn;

use crate::error::Result;
use crate::provider::{LlmProvider, LlmRequest, LlmResponse};

pub struct FallbackProvider {
    primary: Box<dyn LlmProvider>,
    alternate: Box<dyn LlmProvider>,
}

impl FallbackProvider {
    pub fn new(primary: Box<dyn LlmProvider>, alternate: Box<dyn LlmProvider>) -> Self {
        Self { primary, alternate }
    }
}

#[async_trait]
impl LlmProvider for FallbackProvider {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        match self.primary.complete(request.clone()).await {
            Err(e) if e.is_request_rejected() => {
                warn!(
                    "{} rejected the request ({}), retrying with {}",
                    self.primary.name(),
                    e,
                    self.alternate.name()
                );
                self.alternate.complete(request).await
            }
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        self.primary.name()
    }
}
