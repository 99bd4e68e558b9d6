use crate::env;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use webinsight_core::{
    Error, Result, Summarizer, NO_CONTENT_FALLBACK, SUMMARIZE_FAILED_FALLBACK,
    SUMMARIZE_TIMEOUT_FALLBACK,
};

/// Input cap before the model call; bounds cost/latency and respects model
/// input limits.
pub const MAX_INPUT_CHARS: usize = 500_000;
/// Appended whenever the input was cut at [`MAX_INPUT_CHARS`].
pub const TRUNCATION_MARKER: &str = "\n[content truncated]";

fn gemini_api_key_from_env() -> Option<String> {
    env("WEBINSIGHT_GEMINI_API_KEY")
        .or_else(|| env("GEMINI_API_KEY"))
        .or_else(|| env("GOOGLE_API_KEY"))
}

fn gemini_model_from_env() -> String {
    env("WEBINSIGHT_GEMINI_MODEL").unwrap_or_else(|| "gemini-2.0-flash".to_string())
}

fn gemini_base_url_from_env() -> String {
    env("WEBINSIGHT_GEMINI_BASE_URL")
        .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string())
}

fn gemini_timeout_ms_from_env() -> u64 {
    env("WEBINSIGHT_GEMINI_TIMEOUT_MS")
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(60_000)
        .clamp(1_000, 300_000)
}

/// Query-focused summarization via the Generative Language API.
///
/// `summarize` never errors: every failure mode degrades to one of the fixed
/// fallback strings. The request timeout is a genuine cancellation bound —
/// hitting it aborts the in-flight call.
#[derive(Debug, Clone)]
pub struct GeminiSummarizer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout_ms: u64,
}

impl GeminiSummarizer {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = gemini_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing WEBINSIGHT_GEMINI_API_KEY (or GEMINI_API_KEY)".to_string())
        })?;
        Ok(Self {
            client,
            api_key,
            model: gemini_model_from_env(),
            base_url: gemini_base_url_from_env(),
            timeout_ms: gemini_timeout_ms_from_env(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{base}/v1beta/models/{model}:generateContent?key={key}",
            base = self.base_url.trim_end_matches('/'),
            model = self.model,
            key = self.api_key
        )
    }
}

fn system_instruction(query: &str) -> String {
    format!(
        "You summarize web page content for the search query: \"{query}\". \
         Extract and summarize only the information relevant to that query. \
         If the content is unrelated to the query, state that explicitly. \
         Be factual and concise; do not add information that is not in the content."
    )
}

fn truncate_to_chars(s: &str, max_chars: usize) -> (String, bool) {
    let mut out = String::new();
    let mut n = 0usize;
    for ch in s.chars() {
        if n >= max_chars {
            return (out, true);
        }
        out.push(ch);
        n += 1;
    }
    (out, false)
}

/// Bound the page text before the model call. When cut, the result is exactly
/// [`MAX_INPUT_CHARS`] characters plus the marker, never the full original.
pub fn truncate_input(text: &str) -> (String, bool) {
    let (mut out, clipped) = truncate_to_chars(text, MAX_INPUT_CHARS);
    if clipped {
        out.push_str(TRUNCATION_MARKER);
    }
    (out, clipped)
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    system_instruction: ReqContent,
    contents: Vec<ReqContent>,
    generation_config: GenCfg,
}

#[derive(Debug, Serialize)]
struct ReqContent {
    parts: Vec<ReqPart>,
}

#[derive(Debug, Serialize)]
struct ReqPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenCfg {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

fn first_candidate_text(resp: GenerateResponse) -> String {
    let Some(cand) = resp.candidates.into_iter().next() else {
        return String::new();
    };
    let Some(content) = cand.content else {
        return String::new();
    };
    let mut out = String::new();
    for part in content.parts {
        if let Some(t) = part.text {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&t);
        }
    }
    out.trim().to_string()
}

#[async_trait::async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, text: &str, query: &str) -> String {
        if text.chars().all(char::is_whitespace) {
            // Nothing to send; skip the model call entirely.
            return NO_CONTENT_FALLBACK.to_string();
        }

        let (input, truncated) = truncate_input(text);
        if truncated {
            debug!(chars = MAX_INPUT_CHARS, "summarizer input truncated");
        }

        let req = GenerateRequest {
            system_instruction: ReqContent {
                parts: vec![ReqPart {
                    text: system_instruction(query),
                }],
            },
            contents: vec![ReqContent {
                parts: vec![ReqPart { text: input }],
            }],
            generation_config: GenCfg {
                temperature: 0.2,
                max_output_tokens: 1024,
            },
        };

        let resp = match self
            .client
            .post(self.endpoint())
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&req)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!(timeout_ms = self.timeout_ms, "summarization timed out");
                return SUMMARIZE_TIMEOUT_FALLBACK.to_string();
            }
            Err(e) => {
                warn!(error = %e, "summarization request failed");
                return SUMMARIZE_FAILED_FALLBACK.to_string();
            }
        };

        let status = resp.status();
        if !status.is_success() {
            warn!(%status, "summarization HTTP error");
            return SUMMARIZE_FAILED_FALLBACK.to_string();
        }

        // The total request timeout also covers the body read.
        match resp.json::<GenerateResponse>().await {
            Ok(parsed) => first_candidate_text(parsed),
            Err(e) if e.is_timeout() => {
                warn!(timeout_ms = self.timeout_ms, "summarization timed out");
                SUMMARIZE_TIMEOUT_FALLBACK.to_string()
            }
            Err(e) => {
                warn!(error = %e, "summarization response unreadable");
                SUMMARIZE_FAILED_FALLBACK.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router};
    use proptest::prelude::*;
    use std::net::SocketAddr;

    fn test_summarizer(base_url: String, timeout_ms: u64) -> GeminiSummarizer {
        GeminiSummarizer {
            client: reqwest::Client::new(),
            api_key: "test-key".to_string(),
            model: "gemini-2.0-flash".to_string(),
            base_url,
            timeout_ms,
        }
    }

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[test]
    fn truncation_is_char_exact() {
        let long: String = "x".repeat(MAX_INPUT_CHARS + 1_000);
        let (out, clipped) = truncate_input(&long);
        assert!(clipped);
        assert_eq!(
            out.chars().count(),
            MAX_INPUT_CHARS + TRUNCATION_MARKER.chars().count()
        );
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn short_input_is_untouched() {
        let (out, clipped) = truncate_input("hello");
        assert!(!clipped);
        assert_eq!(out, "hello");
    }

    proptest! {
        #[test]
        fn truncate_to_chars_never_exceeds_cap(s in any::<String>(), cap in 0usize..256) {
            let (out, clipped) = truncate_to_chars(&s, cap);
            prop_assert!(out.chars().count() <= cap);
            prop_assert_eq!(clipped, s.chars().count() > cap);
            if !clipped {
                prop_assert_eq!(out, s);
            }
        }
    }

    #[test]
    fn parses_candidate_parts() {
        let js = r#"
        {
          "candidates": [
            {"content": {"parts": [{"text": "part one"}, {"text": "part two"}]}}
          ]
        }
        "#;
        let parsed: GenerateResponse = serde_json::from_str(js).unwrap();
        assert_eq!(first_candidate_text(parsed), "part one\npart two");
    }

    #[test]
    fn empty_candidates_yield_empty_text() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(first_candidate_text(parsed), "");
    }

    #[tokio::test]
    async fn empty_input_short_circuits_without_a_model_call() {
        // Unroutable base URL: any network attempt would fail loudly.
        let s = test_summarizer("http://127.0.0.1:1".to_string(), 1_000);
        assert_eq!(s.summarize("   \n ", "anything").await, NO_CONTENT_FALLBACK);
    }

    #[tokio::test]
    async fn returns_model_summary_on_success() {
        let app = Router::new().fallback(|Json(body): Json<serde_json::Value>| async move {
            let sys = body["system_instruction"]["parts"][0]["text"]
                .as_str()
                .unwrap_or("");
            assert!(sys.contains("quarterly earnings"));
            let user = body["contents"][0]["parts"][0]["text"].as_str().unwrap_or("");
            assert!(user.contains("revenue rose"));
            Json(serde_json::json!({
                "candidates": [
                    {"content": {"parts": [{"text": "  Revenue rose 12% year over year.  "}]}}
                ]
            }))
        });
        let addr = serve(app).await;

        let s = test_summarizer(format!("http://{addr}"), 5_000);
        let out = s
            .summarize("The filing shows revenue rose 12%.", "quarterly earnings")
            .await;
        assert_eq!(out, "Revenue rose 12% year over year.");
    }

    #[tokio::test]
    async fn http_error_degrades_to_fixed_fallback() {
        let app = Router::new().fallback(|| async {
            (axum::http::StatusCode::TOO_MANY_REQUESTS, "quota")
        });
        let addr = serve(app).await;

        let s = test_summarizer(format!("http://{addr}"), 5_000);
        let out = s.summarize("some text", "query").await;
        assert_eq!(out, SUMMARIZE_FAILED_FALLBACK);
    }

    #[tokio::test]
    async fn timeout_degrades_to_distinct_fallback() {
        let app = Router::new().fallback(|| async {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            "too late"
        });
        let addr = serve(app).await;

        let s = test_summarizer(format!("http://{addr}"), 200);
        let t0 = std::time::Instant::now();
        let out = s.summarize("some text", "query").await;
        assert!(t0.elapsed() < std::time::Duration::from_secs(5));
        assert_eq!(out, SUMMARIZE_TIMEOUT_FALLBACK);
    }

    #[tokio::test]
    async fn blank_model_output_is_returned_empty_for_caller_substitution() {
        let app = Router::new().fallback(|| async {
            Json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "   "}]}}]
            }))
        });
        let addr = serve(app).await;

        let s = test_summarizer(format!("http://{addr}"), 5_000);
        assert_eq!(s.summarize("some text", "query").await, "");
    }
}
