use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use super::{TranslationFuture, TranslationProvider};

const API_HOST: &str = "https://api.deepl.com";
const FREE_API_HOST: &str = "https://api-free.deepl.com";

/// DeepL REST API client. Free-plan keys (suffix ":fx") are routed to the
/// free host automatically.
pub struct DeepL {
    key: String,
    client: reqwest::Client,
}

impl DeepL {
    pub fn new(key: String) -> Self {
        Self {
            key,
            client: reqwest::Client::new(),
        }
    }
}

/// Picks the API key from the explicit override or the `DEEPL_API_KEY`
/// environment variable.
pub(crate) fn resolve_key(override_key: Option<&str>) -> Result<String> {
    if let Some(key) = override_key {
        if !key.trim().is_empty() {
            return Ok(key.to_string());
        }
    }
    std::env::var("DEEPL_API_KEY")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("no DeepL API key found (set DEEPL_API_KEY or pass --key)"))
}

fn host_for_key(key: &str) -> &'static str {
    if key.trim_end().ends_with(":fx") {
        FREE_API_HOST
    } else {
        API_HOST
    }
}

/// Maps our lowercase language codes onto DeepL target codes. Plain "en"
/// is ambiguous to DeepL and mapped to British English.
fn deepl_lang_code(target_lang: &str) -> String {
    let trimmed = target_lang.trim();
    if trimmed.eq_ignore_ascii_case("en") {
        return "EN-GB".to_string();
    }
    trimmed.to_uppercase()
}

fn extract_translation(body: &str) -> Result<String> {
    let value: Value =
        serde_json::from_str(body).with_context(|| "failed to parse DeepL response")?;
    value
        .get("translations")
        .and_then(Value::as_array)
        .and_then(|translations| translations.first())
        .and_then(|translation| translation.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("DeepL response carries no translation: {}", body.trim()))
}

impl TranslationProvider for DeepL {
    fn name(&self) -> &'static str {
        "deepl"
    }

    fn translate(&self, text: &str, target_lang: &str) -> TranslationFuture {
        let client = self.client.clone();
        let key = self.key.clone();
        let url = format!("{}/v2/translate", host_for_key(&self.key));
        let text = text.to_string();
        let lang = deepl_lang_code(target_lang);
        Box::pin(async move {
            let response = client
                .post(&url)
                .header("Authorization", format!("DeepL-Auth-Key {key}"))
                .form(&[("text", text.as_str()), ("target_lang", lang.as_str())])
                .send()
                .await
                .with_context(|| "DeepL request failed")?;
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(anyhow!("DeepL API error ({}): {}", status, body.trim()));
            }
            extract_translation(&body)
        })
    }
}
