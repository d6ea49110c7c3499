use serde::{Deserialize, Serialize};

// Body of the metafield update endpoint. Every field is required.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct MetafieldRequest {
    pub id: String,
    pub namespace: String,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_input: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ChatResponse {
    pub response: String,
}
