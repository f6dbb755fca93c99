//! User-facing notices derived from gateway failures and local validation.

use crate::gateway::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeContext {
    Auth,
    Validation,
    Resource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    context: NoticeContext,
    text: String,
}

impl Notice {
    pub fn validation(text: impl Into<String>) -> Self {
        Self {
            context: NoticeContext::Validation,
            text: text.into(),
        }
    }

    /// One short message per failed operation; the `RequestFailed` rendering
    /// ("failed to load channels", "failed to send message", ...) comes from
    /// the operation's display form.
    pub fn from_gateway_failure(err: &GatewayError) -> Self {
        let context = match err {
            GatewayError::Unauthenticated | GatewayError::AuthRejected(_) => NoticeContext::Auth,
            GatewayError::RequestFailed(_) => NoticeContext::Resource,
        };
        Self {
            context,
            text: err.to_string(),
        }
    }

    pub fn context(&self) -> NoticeContext {
        self.context
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
