use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::InvocationError;
use crate::invocation::{Invocation, InvocationOutput};

/// Performs a single capability invocation.
#[async_trait]
pub trait CapabilityClient: Send + Sync {
  /// Issue the call and wait at most `timeout` for the reply.
  async fn invoke(
    &self,
    invocation: &Invocation,
    timeout: Duration,
  ) -> Result<InvocationOutput, InvocationError>;
}

#[async_trait]
impl<C: CapabilityClient + ?Sized> CapabilityClient for Arc<C> {
  async fn invoke(
    &self,
    invocation: &Invocation,
    timeout: Duration,
  ) -> Result<InvocationOutput, InvocationError> {
    (**self).invoke(invocation, timeout).await
  }
}
