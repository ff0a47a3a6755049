//! dev.to adapter.
//!
//! Authenticates with the `api-key` header. Listing walks
//! `GET /articles/me/all?page=N` from page 1 until a page comes back empty;
//! drafts are created with `POST /articles` and `published: false`.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::contract::{Fetched, Silo, SiloPost};
use crate::error::SiloError;
use crate::syndication::{Post, SyndicationId};

pub const DEFAULT_BASE_URL: &str = "https://dev.to/api";

const SILO_NAME: &str = "dev";

pub struct DevSilo {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl DevSilo {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn api_key(&self) -> Result<&str, SiloError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| SiloError::MissingCredential {
                silo: SILO_NAME.to_string(),
            })
    }

    async fn fetch_page(&self, api_key: &str, page: u32) -> Result<Vec<SiloPost>, SiloError> {
        let url = format!("{}/articles/me/all", self.base_url);
        debug!(url = %url, page, "[DEV] Fetching page of posts");
        let resp = self
            .client
            .get(&url)
            .query(&[("page", page)])
            .header("api-key", api_key)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(status = %status, url = %url, page, "[DEV] Listing posts failed. Response body: {body}");
            return Err(SiloError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json::<Vec<SiloPost>>().await?)
    }
}

/// The `article` payload for a new draft.
///
/// Only the body is sent; the header is mapped onto dev.to's own fields so a
/// `published: true` in the post can never publish the draft.
fn article_for(post: &Post) -> Value {
    let header = &post.frontmatter.header;
    let mut article = Map::new();
    article.insert("title".into(), json!(post.title()));
    article.insert("body_markdown".into(), json!(post.frontmatter.body));
    article.insert("published".into(), json!(false));

    match header.get("tags") {
        Some(serde_yaml::Value::Sequence(tags)) => {
            let tags: Vec<&str> = tags.iter().filter_map(serde_yaml::Value::as_str).collect();
            article.insert("tags".into(), json!(tags));
        }
        Some(serde_yaml::Value::String(tags)) => {
            let tags: Vec<&str> = tags
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect();
            article.insert("tags".into(), json!(tags));
        }
        _ => {}
    }

    for (from, to) in [
        ("description", "description"),
        ("canonical_url", "canonical_url"),
        ("series", "series"),
        ("cover_image", "main_image"),
    ] {
        if let Some(value) = header.get(from).and_then(serde_yaml::Value::as_str) {
            article.insert(to.into(), json!(value));
        }
    }

    Value::Object(article)
}

#[async_trait]
impl Silo for DevSilo {
    fn name(&self) -> String {
        SILO_NAME.to_string()
    }

    fn check_credential(&self) -> Result<(), SiloError> {
        self.api_key().map(|_| ())
    }

    async fn fetch(&self, id: Option<SyndicationId>) -> Result<Fetched, SiloError> {
        let api_key = self.api_key()?;
        let mut collected = Vec::new();
        let mut page = 1;
        loop {
            let posts = self.fetch_page(api_key, page).await?;
            if posts.is_empty() {
                break;
            }
            match &id {
                Some(wanted) => {
                    if let Some(found) = posts.into_iter().find(|p| &p.id == wanted) {
                        info!(id = %wanted, page, "[DEV] Found post");
                        return Ok(Fetched::One(found));
                    }
                }
                None => collected.extend(posts),
            }
            page += 1;
        }

        match id {
            Some(wanted) => {
                warn!(id = %wanted, pages = page - 1, "[DEV] No post with this id");
                Ok(Fetched::NotFound)
            }
            None => {
                info!(count = collected.len(), "[DEV] Listed posts");
                Ok(Fetched::All(collected))
            }
        }
    }

    async fn draft(&self, post: &Post) -> Result<Option<SyndicationId>, SiloError> {
        let api_key = self.api_key()?;
        if post.frontmatter.is_empty() {
            return Err(SiloError::EmptyPost);
        }

        let url = format!("{}/articles", self.base_url);
        info!(path = %post.path, title = %post.title(), "[DEV] Creating draft");
        let resp = self
            .client
            .post(&url)
            .header("api-key", api_key)
            .json(&json!({ "article": article_for(post) }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(status = %status, path = %post.path, "[DEV] Failed to create draft: {body}");
            return Ok(None);
        }

        let created: Value = match resp.json().await {
            Ok(created) => created,
            Err(e) => {
                error!(error = ?e, path = %post.path, "[DEV] Draft response was not JSON");
                return Ok(None);
            }
        };
        match created.get("id").and_then(SyndicationId::from_json) {
            Some(id) => {
                info!(path = %post.path, id = %id, "[DEV] Draft created");
                Ok(Some(id))
            }
            None => {
                error!(path = %post.path, response = %created, "[DEV] Draft response carried no usable id");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::Frontmatter;

    #[test]
    fn article_maps_header_fields() {
        let post = Post::new(
            "posts/hello.md",
            Frontmatter::parse(
                "---\ntitle: Hello\npublished: true\ntags: rust, ci\ncover_image: https://x/y.png\n---\nBody\n",
            )
            .unwrap(),
        );
        let article = article_for(&post);
        assert_eq!(article["title"], "Hello");
        assert_eq!(article["body_markdown"], "Body\n");
        assert_eq!(article["published"], false);
        assert_eq!(article["tags"], json!(["rust", "ci"]));
        assert_eq!(article["main_image"], "https://x/y.png");
        assert!(article.get("description").is_none());
    }
}
