//! Request/response surface for exposing a [`MemoryManager`] as a service.
//!
//! Requests are JSON objects tagged by `method` with an optional `params`
//! object:
//!
//! ```text
//! {"method":"add_memory","params":{"content":"Prefers tabs","type":"preference"}}
//! {"method":"get_context_for_prompt"}
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conversation::ContextUpdate;
use crate::error::Result;
use crate::manager::MemoryManager;
use crate::memory::{MemoryType, NewMemory, RetrievalQuery};

/// A single service call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum Request {
    AddMemory {
        content: String,
        #[serde(rename = "type")]
        kind: MemoryType,
        #[serde(default)]
        importance: Option<f64>,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default)]
        source_conversation: Option<String>,
    },
    RetrieveMemories {
        query: String,
        #[serde(default)]
        types: Option<Vec<MemoryType>>,
        #[serde(default)]
        limit: Option<usize>,
        #[serde(default)]
        min_importance: Option<f64>,
    },
    StartConversation {
        #[serde(default)]
        topic: Option<String>,
    },
    UpdateContext {
        question: String,
        response: String,
        #[serde(default)]
        entities: Vec<String>,
        #[serde(default)]
        key_points: Vec<String>,
        #[serde(default)]
        preferences: BTreeMap<String, Value>,
    },
    BuildContextWindow {
        query: String,
    },
    GetContextForPrompt,
    LearnFromConversation,
    ClearAll,
    Export,
    Import {
        data: String,
    },
    Forget {
        id: String,
    },
    Stats,
}

impl Request {
    pub fn method(&self) -> &'static str {
        match self {
            Self::AddMemory { .. } => "add_memory",
            Self::RetrieveMemories { .. } => "retrieve_memories",
            Self::StartConversation { .. } => "start_conversation",
            Self::UpdateContext { .. } => "update_context",
            Self::BuildContextWindow { .. } => "build_context_window",
            Self::GetContextForPrompt => "get_context_for_prompt",
            Self::LearnFromConversation => "learn_from_conversation",
            Self::ClearAll => "clear_all",
            Self::Export => "export",
            Self::Import { .. } => "import",
            Self::Forget { .. } => "forget",
            Self::Stats => "stats",
        }
    }
}

/// Outcome of a service call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Execute `request` against `manager`. Errors become failed responses.
pub fn dispatch(manager: &MemoryManager, request: Request) -> Response {
    let method = request.method();
    match execute(manager, request) {
        Ok(result) => Response::success(result),
        Err(e) => {
            tracing::warn!(event = "rpc.failed", method = method, error = %e);
            Response::failure(e.to_string())
        }
    }
}

fn execute(manager: &MemoryManager, request: Request) -> Result<Value> {
    let value = match request {
        Request::AddMemory {
            content,
            kind,
            importance,
            tags,
            source_conversation,
        } => {
            let opts = NewMemory {
                importance,
                tags,
                source_conversation,
            };
            serde_json::to_value(manager.add_memory(&content, kind, opts)?)?
        }
        Request::RetrieveMemories {
            query,
            types,
            limit,
            min_importance,
        } => {
            let mut q = RetrievalQuery::new(query);
            q.types = types;
            if let Some(limit) = limit {
                q = q.with_limit(limit);
            }
            if let Some(min) = min_importance {
                q = q.with_min_importance(min);
            }
            serde_json::to_value(manager.retrieve_memories(&q)?)?
        }
        Request::StartConversation { topic } => {
            serde_json::to_value(manager.start_conversation(topic.as_deref())?)?
        }
        Request::UpdateContext {
            question,
            response,
            entities,
            key_points,
            preferences,
        } => {
            let update = ContextUpdate {
                entities,
                key_points,
                preferences,
            };
            serde_json::to_value(manager.update_context(&question, &response, &update)?)?
        }
        Request::BuildContextWindow { query } => {
            serde_json::to_value(manager.build_context_window(&query)?)?
        }
        Request::GetContextForPrompt => Value::String(manager.get_context_for_prompt()),
        Request::LearnFromConversation => {
            serde_json::to_value(manager.learn_from_conversation()?)?
        }
        Request::ClearAll => {
            manager.clear()?;
            Value::Bool(true)
        }
        Request::Export => Value::String(manager.export_memories()?),
        Request::Import { data } => Value::Bool(manager.import_memories(&data)),
        Request::Forget { id } => serde_json::to_value(manager.forget(&id)?)?,
        Request::Stats => serde_json::to_value(manager.stats())?,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecallConfig;
    use serde_json::json;

    fn manager() -> MemoryManager {
        MemoryManager::in_memory(RecallConfig::default())
    }

    #[test]
    fn test_parse_unit_method_without_params() {
        let r: Request = serde_json::from_str(r#"{"method":"get_context_for_prompt"}"#).unwrap();
        assert_eq!(r, Request::GetContextForPrompt);
    }

    #[test]
    fn test_parse_add_memory_defaults() {
        let r: Request = serde_json::from_value(json!({
            "method": "add_memory",
            "params": {"content": "likes tea", "type": "preference"}
        }))
        .unwrap();
        match r {
            Request::AddMemory {
                kind, tags, importance, ..
            } => {
                assert_eq!(kind, MemoryType::Preference);
                assert!(tags.is_empty());
                assert!(importance.is_none());
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn test_unknown_method_rejected() {
        assert!(serde_json::from_str::<Request>(r#"{"method":"drop_tables"}"#).is_err());
    }

    #[test]
    fn test_dispatch_add_then_retrieve() {
        let m = manager();
        let add = dispatch(
            &m,
            Request::AddMemory {
                content: "deploys with terraform modules".into(),
                kind: MemoryType::Fact,
                importance: Some(0.7),
                tags: vec!["infra".into()],
                source_conversation: None,
            },
        );
        assert!(add.ok);
        assert_eq!(add.result.unwrap()["type"], "fact");

        let hits = dispatch(
            &m,
            Request::RetrieveMemories {
                query: "terraform".into(),
                types: None,
                limit: Some(5),
                min_importance: None,
            },
        );
        assert!(hits.ok);
        assert_eq!(hits.result.unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_dispatch_forget_missing_fails_softly() {
        let r = dispatch(&manager(), Request::Forget { id: "nope".into() });
        assert!(!r.ok);
        assert!(r.error.unwrap().contains("memory not found"));
    }

    #[test]
    fn test_dispatch_import_malformed_is_false() {
        let r = dispatch(&manager(), Request::Import { data: "{oops".into() });
        assert!(r.ok);
        assert_eq!(r.result, Some(Value::Bool(false)));
    }

    #[test]
    fn test_response_omits_empty_fields() {
        let json = serde_json::to_string(&Response::success(Value::Bool(true))).unwrap();
        assert_eq!(json, r#"{"ok":true,"result":true}"#);
    }
}
