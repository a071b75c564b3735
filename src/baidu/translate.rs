//! Text translation endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::BaiduClient;
use crate::translate::Translator;

const TRANSLATE_PATH: &str = "rpc/2.0/mt/texttrans/v1";

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    result: Option<TranslateResult>,
}

#[derive(Debug, Deserialize)]
struct TranslateResult {
    #[serde(default)]
    trans_result: Vec<TranslatedLine>,
}

#[derive(Debug, Deserialize)]
struct TranslatedLine {
    dst: String,
}

pub struct BaiduTranslator {
    client: Arc<BaiduClient>,
    target: String,
}

impl BaiduTranslator {
    /// `target` is a Baidu language code such as `zh` or `en`.
    pub fn new(client: Arc<BaiduClient>, target: impl Into<String>) -> Self {
        Self {
            client,
            target: target.into(),
        }
    }
}

#[async_trait]
impl Translator for BaiduTranslator {
    async fn translate(&self, text: &str) -> Option<String> {
        if text.trim().is_empty() {
            return Some(text.to_string());
        }

        let body = json!({ "from": "auto", "to": self.target, "q": text });
        let resp: TranslateResponse = self.client.post_json(TRANSLATE_PATH, &body).await?;
        let lines = resp.result?.trans_result;
        if lines.is_empty() {
            return None;
        }
        Some(
            lines
                .into_iter()
                .map(|l| l.dst)
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}
