//! Serde-deserializable types matching Contentful GraphQL responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::GraphQlErrorMessage;
use super::types::{Article, TalentProfile};

// ============================================================================
// Envelope
// ============================================================================

#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a> {
  pub query: &'a str,
  pub variables: &'a Value,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlEnvelope {
  pub data: Option<Value>,
  pub errors: Option<Vec<GraphQlErrorMessage>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCollection<T> {
  pub total: u64,
  pub items: Vec<T>,
}

// ============================================================================
// Common nested field types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSys {
  pub id: String,
  pub published_at: Option<DateTime<Utc>>,
  pub first_published_at: Option<DateTime<Utc>>,
}

impl ApiSys {
  fn published(&self) -> Option<DateTime<Utc>> {
    self.first_published_at.or(self.published_at)
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiAuthor {
  pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiRichText {
  pub json: Value,
}

// ============================================================================
// Entries
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiArticle {
  pub sys: ApiSys,
  #[serde(default)]
  pub slug: Option<String>,
  #[serde(default)]
  pub title: Option<String>,
  pub excerpt: Option<String>,
  pub author: Option<ApiAuthor>,
  pub content: Option<ApiRichText>,
}

impl From<ApiArticle> for Article {
  fn from(api: ApiArticle) -> Self {
    let published_at = api.sys.published();
    Article {
      slug: api.slug.unwrap_or_else(|| api.sys.id.clone()),
      id: api.sys.id,
      title: api.title.unwrap_or_default(),
      excerpt: api.excerpt,
      author: api.author.and_then(|a| a.name),
      published_at,
      body: api.content.map(|c| rich_text_to_plain(&c.json)),
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTalent {
  pub sys: ApiSys,
  #[serde(default)]
  pub slug: Option<String>,
  #[serde(default)]
  pub name: Option<String>,
  pub job_title: Option<String>,
  pub location: Option<String>,
  pub bio: Option<ApiRichText>,
}

impl From<ApiTalent> for TalentProfile {
  fn from(api: ApiTalent) -> Self {
    let published_at = api.sys.published();
    TalentProfile {
      slug: api.slug.unwrap_or_else(|| api.sys.id.clone()),
      id: api.sys.id,
      name: api.name.unwrap_or_default(),
      role: api.job_title,
      location: api.location,
      published_at,
      bio: api.bio.map(|b| rich_text_to_plain(&b.json)),
    }
  }
}

// ============================================================================
// Rich text
// ============================================================================

/// Flatten a Contentful rich text document into plain text.
///
/// Block-level nodes are separated by blank lines; list items get a bullet.
pub fn rich_text_to_plain(document: &Value) -> String {
  let mut blocks = Vec::new();
  collect_blocks(document, &mut blocks);
  blocks.join("\n\n")
}

fn collect_blocks(node: &Value, blocks: &mut Vec<String>) {
  let node_type = node.get("nodeType").and_then(Value::as_str).unwrap_or("");
  let children = node.get("content").and_then(Value::as_array);

  match node_type {
    "document" | "unordered-list" | "ordered-list" | "blockquote" => {
      for child in children.into_iter().flatten() {
        collect_blocks(child, blocks);
      }
    }
    "list-item" => {
      let mut inner = Vec::new();
      for child in children.into_iter().flatten() {
        collect_blocks(child, &mut inner);
      }
      blocks.push(format!("• {}", inner.join(" ")));
    }
    "hr" => blocks.push("---".to_string()),
    _ => {
      let mut text = String::new();
      collect_text(node, &mut text);
      if !text.trim().is_empty() {
        blocks.push(text);
      }
    }
  }
}

fn collect_text(node: &Value, out: &mut String) {
  if let Some(value) = node.get("value").and_then(Value::as_str) {
    out.push_str(value);
  }
  if let Some(children) = node.get("content").and_then(Value::as_array) {
    for child in children {
      collect_text(child, out);
    }
  }
}
