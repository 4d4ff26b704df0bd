//! The operator path: one message in, one reply out.
//!
//! route -> normalize -> resolve -> confirm -> dispatch -> remember.
//! Expected outcomes (not found, ambiguous, aborted, unrecognized) come
//! back as `OpsError` and render to plain text; nothing here panics on
//! operator input.

use std::sync::{Arc, Mutex, MutexGuard};

use aiops_protocol::ResourceKind;

use crate::context::SessionContext;
use crate::dispatcher::ActionDispatcher;
use crate::error::{OpsError, OpsResult};
use crate::inference::InferenceEngine;
use crate::normalizer;
use crate::registry::Handler;
use crate::safety::{ConfirmationProvider, SafetyGate};

const EMPTY_INVENTORY_HINT: &str = "No instances detected. Would you like to 'create a new instance'?";
const MISSING_TARGET_HINT: &str =
    "I need a specific Instance ID or Name to proceed. Please try: 'Stop [Instance Name]'";

/// One operator conversation.
pub struct ChatOps {
    engine: Box<dyn InferenceEngine>,
    dispatcher: Arc<ActionDispatcher>,
    gate: SafetyGate,
    context: Mutex<SessionContext>,
}

impl ChatOps {
    pub fn new(engine: Box<dyn InferenceEngine>, dispatcher: Arc<ActionDispatcher>) -> Self {
        let gate = SafetyGate::new(dispatcher.registry().clone());
        Self {
            engine,
            dispatcher,
            gate,
            context: Mutex::new(SessionContext::new()),
        }
    }

    pub fn dispatcher(&self) -> &Arc<ActionDispatcher> {
        &self.dispatcher
    }

    fn context(&self) -> MutexGuard<'_, SessionContext> {
        self.context.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn context_snapshot(&self) -> SessionContext {
        self.context().clone()
    }

    pub fn reset_context(&self) {
        self.context().reset();
        tracing::info!("session context cleared");
    }

    /// Handle one operator message.
    pub async fn handle(
        &self,
        text: &str,
        confirmation: &dyn ConfirmationProvider,
    ) -> OpsResult<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(OpsError::UnrecognizedIntent("empty request".into()));
        }

        let routed = self
            .engine
            .parse(text)
            .await
            .ok_or_else(|| OpsError::UnrecognizedIntent(text.to_string()))?;
        let spec = *self
            .dispatcher
            .registry()
            .lookup(&routed.candidate.action)
            .ok_or_else(|| OpsError::UnrecognizedIntent(routed.candidate.action.clone()))?;
        tracing::info!(tier = %routed.tier, action = spec.name, "request routed");

        let context = self.context_snapshot();
        let normalized = normalizer::normalize(text, &spec, &routed.candidate.args, &context);
        let mut prepared = self.dispatcher.prepare(&spec, normalized.args).await?;
        if let Some(injected) = &normalized.injected {
            prepared
                .notes
                .push(format!("Using {} from earlier in this session.", injected.id));
        }

        self.gate
            .check(&spec, &prepared.target_label(), confirmation)
            .await?;

        let outcome = self.dispatcher.execute(&prepared).await?;
        if let Some(affected) = outcome.affected.clone() {
            self.context().remember(affected);
        }

        let mut reply = prepared.notes.join("\n");
        if !reply.is_empty() {
            reply.push('\n');
        }
        reply.push_str(&outcome.summary);
        if spec.handler == Handler::ListInstances
            && outcome.data.as_array().is_some_and(|rows| rows.is_empty())
        {
            reply.push('\n');
            reply.push_str(EMPTY_INVENTORY_HINT);
        }
        Ok(reply)
    }

    /// Like [`handle`](Self::handle), with errors rendered for the operator.
    pub async fn respond(&self, text: &str, confirmation: &dyn ConfirmationProvider) -> String {
        match self.handle(text, confirmation).await {
            Ok(reply) => reply,
            Err(e) => render_error(&e),
        }
    }
}

/// Operator-facing text for an error, with a usage hint where one helps.
pub fn render_error(err: &OpsError) -> String {
    match err {
        OpsError::NotFound { kind, query, .. }
            if query.is_empty() && *kind == ResourceKind::Instance =>
        {
            format!("{err}\n{MISSING_TARGET_HINT}")
        }
        OpsError::Aborted { .. } => format!("Cancelled: {err}"),
        _ => format!("Error: {err}"),
    }
}
