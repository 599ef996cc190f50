//! In-process call-context store: maps a call-id to the personalization
//! record seeded by an inbound webhook or outbound-call initiation, and
//! consumed exactly once by the bridge on the media stream's `start` event.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

/// A dynamic-variable value coerced from a dialer's string-typed wire
/// parameters. Booleans are recognized from the literal strings `"true"`
/// and `"false"`; everything else that doesn't parse as a number passes
/// through as a string.
#[derive(Debug, Clone, PartialEq)]
pub enum DynValue {
    Str(String),
    Bool(bool),
    Num(f64),
}

impl DynValue {
    /// Coerce a raw wire-level string into a typed dynamic variable. Only
    /// the literals `"true"`/`"false"` are recognized as booleans; anything
    /// else, including numeric-looking strings like a phone number, stays
    /// a string. Numeric dynamic variables only ever arise from values a
    /// plugin constructs directly (e.g. `DynValue::Num(..)`), never from
    /// wire-string coercion.
    pub fn coerce(raw: &str) -> Self {
        match raw {
            "true" => DynValue::Bool(true),
            "false" => DynValue::Bool(false),
            _ => DynValue::Str(raw.to_string()),
        }
    }
}

impl From<DynValue> for serde_json::Value {
    fn from(v: DynValue) -> Self {
        match v {
            DynValue::Str(s) => serde_json::Value::String(s),
            DynValue::Bool(b) => serde_json::Value::Bool(b),
            DynValue::Num(n) => serde_json::json!(n),
        }
    }
}

/// Personalization record for a single call, seeded before the media
/// stream connects and consumed exactly once on `start`.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub agent_id: String,
    pub dynamic_variables: HashMap<String, DynValue>,
}

impl CallContext {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            dynamic_variables: HashMap::new(),
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: DynValue) -> Self {
        self.dynamic_variables.insert(key.into(), value);
        self
    }
}

/// Error returned when a `start` event arrives for a call-id with no
/// stored context, or for one already consumed (I2).
#[derive(Debug, thiserror::Error)]
#[error("no call context for call_id '{0}'")]
pub struct ContextMissing(pub String);

/// Mutex-guarded in-process store, single producer / single consumer per
/// call-id (I1). Consuming a context removes it, so a second `start` for
/// the same call-id observes it as missing (I2).
#[derive(Clone, Default)]
pub struct CallContextStore {
    inner: Arc<Mutex<HashMap<String, CallContext>>>,
}

impl CallContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn store(&self, call_id: impl Into<String>, context: CallContext) {
        let call_id = call_id.into();
        tracing::info!(call_id = %call_id, "stored call context");
        self.inner.lock().await.insert(call_id, context);
    }

    /// Peek without consuming — used by handlers that need to read context
    /// ahead of the bridge's actual `start` consumption (e.g. logging).
    pub async fn peek(&self, call_id: &str) -> Option<CallContext> {
        self.inner.lock().await.get(call_id).cloned()
    }

    /// Consume the context for a call-id. Removing it here is what
    /// enforces I2: a second `start` for the same call-id will find
    /// nothing and must be treated as an error by the caller.
    pub async fn consume(&self, call_id: &str) -> Result<CallContext, ContextMissing> {
        let mut guard = self.inner.lock().await;
        match guard.remove(call_id) {
            Some(ctx) => {
                tracing::debug!(call_id = %call_id, "consumed call context");
                Ok(ctx)
            }
            None => Err(ContextMissing(call_id.to_string())),
        }
    }

    /// Remove a context without requiring it existed; used on error paths
    /// that need to guarantee cleanup (I5) regardless of whether `start`
    /// ever arrived.
    pub async fn delete(&self, call_id: &str) {
        if self.inner.lock().await.remove(call_id).is_some() {
            tracing::debug!(call_id = %call_id, "deleted call context");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_then_consume_once() {
        let store = CallContextStore::new();
        store
            .store("CA1", CallContext::new("agent_1"))
            .await;
        let ctx = store.consume("CA1").await.unwrap();
        assert_eq!(ctx.agent_id, "agent_1");

        // second start for the same call-id observes it as missing (I2)
        let err = store.consume("CA1").await.unwrap_err();
        assert_eq!(err.0, "CA1");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = CallContextStore::new();
        store.delete("missing").await;
        store.store("CA2", CallContext::new("agent_2")).await;
        store.delete("CA2").await;
        store.delete("CA2").await;
        assert!(store.peek("CA2").await.is_none());
    }

    #[test]
    fn dyn_value_coercion() {
        assert_eq!(DynValue::coerce("true"), DynValue::Bool(true));
        assert_eq!(DynValue::coerce("false"), DynValue::Bool(false));
        assert_eq!(
            DynValue::coerce("42"),
            DynValue::Str("42".to_string())
        );
        assert_eq!(
            DynValue::coerce("+15550100"),
            DynValue::Str("+15550100".to_string())
        );
    }
}
