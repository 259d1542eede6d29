//! Document models: one paginated manual in the viewer.
//!
//! Documents are identified by a hash of their source URL, so the same
//! manual discovered twice by the listing crawl maps to one checkpoint key.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// Query parameter the viewer uses to select a page.
const PAGE_PARAM: &str = "p";

/// One extractable manual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable key derived from `source_locator`.
    pub id: String,
    /// Classification tag (e.g. "laptops").
    pub category: String,
    /// Secondary tag, usually the manufacturer.
    pub group: String,
    /// Human readable name (model).
    pub display_name: String,
    /// Address of page 1.
    pub source_locator: String,
}

impl Document {
    /// Create a document, deriving its id from the source URL.
    pub fn new(
        category: impl Into<String>,
        group: impl Into<String>,
        display_name: impl Into<String>,
        source_locator: impl Into<String>,
    ) -> Self {
        let source_locator = source_locator.into();
        Self {
            id: Self::compute_id(&source_locator),
            category: category.into(),
            group: group.into(),
            display_name: display_name.into(),
            source_locator,
        }
    }

    /// First 16 hex characters of the SHA-256 of the URL.
    pub fn compute_id(source_locator: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source_locator.trim().as_bytes());
        let digest = hex::encode(hasher.finalize());
        digest[..16].to_string()
    }

    /// Locator for a given page: the base address for page 1, `?p=N` otherwise.
    pub fn page_locator(&self, page_number: u32) -> String {
        if page_number <= 1 {
            return self.source_locator.clone();
        }

        match Url::parse(&self.source_locator) {
            Ok(mut url) => {
                let kept: Vec<(String, String)> = url
                    .query_pairs()
                    .filter(|(k, _)| k != PAGE_PARAM)
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
                url.query_pairs_mut()
                    .clear()
                    .extend_pairs(kept)
                    .append_pair(PAGE_PARAM, &page_number.to_string());
                url.to_string()
            }
            Err(_) => {
                let sep = if self.source_locator.contains('?') {
                    '&'
                } else {
                    '?'
                };
                format!(
                    "{}{}{}={}",
                    self.source_locator, sep, PAGE_PARAM, page_number
                )
            }
        }
    }
}

/// Entry in the listing crawl's URL cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedManual {
    pub url: String,
    pub brand: String,
    pub model: String,
}

/// URL cache as written by the listing crawl: `{category: [manual, ...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlCache(pub BTreeMap<String, Vec<CachedManual>>);

impl UrlCache {
    /// Read a cache file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read URL cache {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse URL cache {}", path.display()))
    }

    /// Build the worklist, optionally filtered by categories and brand.
    ///
    /// Duplicate URLs within a category are dropped; order follows the cache.
    pub fn documents(&self, categories: &[String], brand: Option<&str>) -> Vec<Document> {
        let mut seen = std::collections::HashSet::new();
        let mut docs = Vec::new();

        for (category, manuals) in &self.0 {
            if !categories.is_empty() && !categories.iter().any(|c| c.eq_ignore_ascii_case(category))
            {
                continue;
            }
            for manual in manuals {
                if let Some(b) = brand {
                    if !manual.brand.eq_ignore_ascii_case(b) {
                        continue;
                    }
                }
                let doc = Document::new(
                    category.clone(),
                    manual.brand.clone(),
                    manual.model.clone(),
                    manual.url.clone(),
                );
                if seen.insert((doc.category.clone(), doc.id.clone())) {
                    docs.push(doc);
                }
            }
        }

        docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(url: &str) -> Document {
        Document::new("laptops", "HP", "EliteBook 840", url)
    }

    #[test]
    fn test_page_locator_first_page_is_base() {
        let d = doc("https://www.manua.ls/hp/elitebook-840/manual");
        assert_eq!(d.page_locator(1), "https://www.manua.ls/hp/elitebook-840/manual");
    }

    #[test]
    fn test_page_locator_appends_query() {
        let d = doc("https://www.manua.ls/hp/elitebook-840/manual");
        assert_eq!(
            d.page_locator(7),
            "https://www.manua.ls/hp/elitebook-840/manual?p=7"
        );
    }

    #[test]
    fn test_page_locator_replaces_existing_page_param() {
        let d = doc("https://example.com/manual?lang=en&p=3");
        assert_eq!(d.page_locator(4), "https://example.com/manual?lang=en&p=4");
    }

    #[test]
    fn test_id_is_stable_and_short() {
        let a = doc("https://example.com/a");
        let b = doc("https://example.com/a");
        let c = doc("https://example.com/b");
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.id.len(), 16);
    }

    #[test]
    fn test_url_cache_filters() {
        let cache: UrlCache = serde_json::from_str(
            r#"{
                "laptops": [
                    {"url": "https://e.com/1", "brand": "HP", "model": "A"},
                    {"url": "https://e.com/2", "brand": "Atari", "model": "B"},
                    {"url": "https://e.com/1", "brand": "HP", "model": "A"}
                ],
                "desktops": [
                    {"url": "https://e.com/3", "brand": "hp", "model": "C"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(cache.documents(&[], None).len(), 3);
        assert_eq!(cache.documents(&[], Some("HP")).len(), 2);
        let laptops = cache.documents(&["LAPTOPS".to_string()], Some("hp"));
        assert_eq!(laptops.len(), 1);
        assert_eq!(laptops[0].display_name, "A");
    }
}
