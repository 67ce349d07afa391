use serde::{Deserialize, Serialize};

fn default_model_object() -> String {
    "model".to_string()
}

/// A model as reported by the upstream `/models` endpoint.
///
/// Upstream entries carry more (capabilities, aliases, ...); only the keys
/// needed for the OpenAI shape are decoded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default = "default_model_object")]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub owned_by: String,
}

/// Upstream `/models` envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamModelList {
    #[serde(default)]
    pub data: Vec<ModelInfo>,
}

/// A model entry as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

impl From<ModelInfo> for ModelEntry {
    fn from(value: ModelInfo) -> Self {
        Self {
            id: value.id,
            object: value.object,
            created: value.created,
            owned_by: value.owned_by,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListObjectType {
    #[serde(rename = "list")]
    List,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelList {
    /// Always "list".
    pub object: ListObjectType,
    pub data: Vec<ModelEntry>,
}

impl ModelList {
    pub fn new(data: Vec<ModelEntry>) -> Self {
        Self {
            object: ListObjectType::List,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reshapes_upstream_models_in_order() {
        let upstream: UpstreamModelList = serde_json::from_value(json!({
            "object": "list",
            "data": [
                {"id": "mistral-small-latest", "object": "model", "created": 1, "owned_by": "mistralai",
                 "capabilities": {"completion_chat": true}, "aliases": []},
                {"id": "codestral-latest", "created": 2, "owned_by": "mistralai"}
            ]
        }))
        .unwrap();

        let list = ModelList::new(upstream.data.into_iter().map(ModelEntry::from).collect());
        let value = serde_json::to_value(&list).unwrap();

        assert_eq!(value["object"], "list");
        assert_eq!(value["data"][0]["id"], "mistral-small-latest");
        assert_eq!(value["data"][1]["object"], "model");
        assert!(value["data"][0].get("capabilities").is_none());
    }
}
