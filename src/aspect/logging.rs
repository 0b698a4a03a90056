use crate::aspect::{Interceptor, Invocation};
use crate::di::MethodResult;
use async_trait::async_trait;
use serde_json::Value;

/// An interceptor that logs method calls and their timing
#[derive(Clone, Default)]
pub struct LoggingInterceptor;

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn before(&self, call: &mut Invocation) -> anyhow::Result<()> {
        tracing::info!("--> {}.{} ({} args)", call.class(), call.method(), call.args().len());
        Ok(())
    }

    async fn after(&self, call: &Invocation, value: Value) -> MethodResult {
        tracing::info!(
            "<-- {}.{} {:?}",
            call.class(),
            call.method(),
            call.started().elapsed()
        );
        Ok(value)
    }

    async fn catch(&self, call: &Invocation, error: anyhow::Error) -> MethodResult {
        tracing::warn!(
            "<-- {}.{} ERROR: {} {:?}",
            call.class(),
            call.method(),
            error,
            call.started().elapsed()
        );
        Err(error)
    }
}
