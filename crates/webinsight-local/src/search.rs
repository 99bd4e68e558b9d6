use crate::env;
use serde::Deserialize;
use webinsight_core::{Error, Result, SearchBackend, SearchHit, SearchQuery};

/// Default downstream fan-out width; small on purpose.
pub const DEFAULT_RESULT_COUNT: usize = 3;
/// Hard provider limit for `num`.
pub const MAX_RESULT_COUNT: usize = 10;

fn timeout_ms_from_query(q: &SearchQuery) -> u64 {
    // Provider requests can hang indefinitely without an explicit timeout.
    // Keep a conservative cap even if callers pass something huge.
    q.timeout_ms.unwrap_or(20_000).clamp(1_000, 60_000)
}

fn google_api_key_from_env() -> Option<String> {
    env("WEBINSIGHT_GOOGLE_API_KEY").or_else(|| env("GOOGLE_API_KEY"))
}

fn google_cx_from_env() -> Option<String> {
    env("WEBINSIGHT_GOOGLE_CX").or_else(|| env("GOOGLE_CSE_ID"))
}

fn google_endpoint_from_env() -> Option<String> {
    env("WEBINSIGHT_GOOGLE_ENDPOINT")
}

/// Google Programmable Search (Custom Search JSON API) adapter.
///
/// A pure translation boundary: provider-specific fields (escaped titles,
/// cache ids, pagemap noise) are dropped here, and the ranked order of
/// `items` is preserved verbatim. No retries at this layer.
#[derive(Debug, Clone)]
pub struct GoogleSearchBackend {
    client: reqwest::Client,
    api_key: String,
    cx: String,
}

impl GoogleSearchBackend {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = google_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing WEBINSIGHT_GOOGLE_API_KEY (or GOOGLE_API_KEY)".to_string())
        })?;
        let cx = google_cx_from_env().ok_or_else(|| {
            Error::NotConfigured("missing WEBINSIGHT_GOOGLE_CX (or GOOGLE_CSE_ID)".to_string())
        })?;
        Ok(Self {
            client,
            api_key,
            cx,
        })
    }

    fn endpoint() -> String {
        // Docs: https://developers.google.com/custom-search/v1/using_rest
        google_endpoint_from_env()
            .unwrap_or_else(|| "https://www.googleapis.com/customsearch/v1".to_string())
    }

    fn result_count(q: &SearchQuery) -> usize {
        q.max_results
            .unwrap_or(DEFAULT_RESULT_COUNT)
            .clamp(1, MAX_RESULT_COUNT)
    }
}

#[derive(Debug, Deserialize)]
struct GoogleSearchResponse {
    items: Option<Vec<GoogleItem>>,
}

#[derive(Debug, Deserialize)]
struct GoogleItem {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
    pagemap: Option<GooglePageMap>,
}

#[derive(Debug, Deserialize)]
struct GooglePageMap {
    cse_thumbnail: Option<Vec<GoogleImageRef>>,
    cse_image: Option<Vec<GoogleImageRef>>,
}

#[derive(Debug, Deserialize)]
struct GoogleImageRef {
    src: Option<String>,
}

fn first_src(refs: Option<&Vec<GoogleImageRef>>) -> Option<String> {
    refs.and_then(|v| v.first()).and_then(|r| r.src.clone())
}

fn hit_from_item(item: GoogleItem) -> Option<SearchHit> {
    let url = item.link?;
    let (thumbnail_url, full_image_url) = match item.pagemap.as_ref() {
        Some(pm) => (
            first_src(pm.cse_thumbnail.as_ref()),
            first_src(pm.cse_image.as_ref()),
        ),
        None => (None, None),
    };
    Some(SearchHit {
        title: item.title.unwrap_or_default(),
        url,
        snippet: item.snippet.unwrap_or_default(),
        thumbnail_url,
        full_image_url,
    })
}

#[async_trait::async_trait]
impl SearchBackend for GoogleSearchBackend {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn search(&self, q: &SearchQuery) -> Result<Vec<SearchHit>> {
        let timeout_ms = timeout_ms_from_query(q);
        let num = Self::result_count(q);

        let mut req = self.client.get(Self::endpoint()).query(&[
            ("key", self.api_key.as_str()),
            ("cx", self.cx.as_str()),
            ("q", q.query.as_str()),
        ]);
        req = req.query(&[("num", num.to_string())]);
        if let Some(cr) = q.country.as_deref() {
            req = req.query(&[("cr", cr)]);
        }
        if let Some(gl) = q.locale.as_deref() {
            req = req.query(&[("gl", gl)]);
        }
        if let Some(site) = q.site.as_deref() {
            req = req.query(&[("siteSearch", site)]);
        }
        if let Some(exact) = q.exact_terms.as_deref() {
            req = req.query(&[("exactTerms", exact)]);
        }
        if let Some(dr) = q.date_restrict.as_deref() {
            req = req.query(&[("dateRestrict", dr)]);
        }

        let resp = req
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("google search HTTP {status}")));
        }

        let parsed: GoogleSearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        // No `items` at all is how the provider spells "no results".
        let mut out = Vec::new();
        if let Some(items) = parsed.items {
            for item in items.into_iter().take(num) {
                if let Some(hit) = hit_from_item(item) {
                    out.push(hit);
                }
            }
        }
        Ok(out)
    }
}
