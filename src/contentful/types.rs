use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content types served by the listing resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
  Article,
  Talent,
}

impl ResourceType {
  /// Stable identifier used in cache keys
  pub fn as_str(&self) -> &'static str {
    match self {
      ResourceType::Article => "article",
      ResourceType::Talent => "talent",
    }
  }

  /// Plural label for messages and titles
  pub fn plural(&self) -> &'static str {
    match self {
      ResourceType::Article => "articles",
      ResourceType::Talent => "talent",
    }
  }
}

impl fmt::Display for ResourceType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Blog article, as returned by the CMS at fetch time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
  pub id: String,
  pub slug: String,
  pub title: String,
  pub excerpt: Option<String>,
  pub author: Option<String>,
  pub published_at: Option<DateTime<Utc>>,
  /// Plain-text body, only present on single-item fetches
  pub body: Option<String>,
}

/// Talent profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TalentProfile {
  pub id: String,
  pub slug: String,
  pub name: String,
  pub role: Option<String>,
  pub location: Option<String>,
  pub published_at: Option<DateTime<Utc>>,
  pub bio: Option<String>,
}

/// One page of a list query.
///
/// Pages are 1-based; `skip` is derived as `(page - 1) * page_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingRequest {
  pub resource: ResourceType,
  pub page: u32,
  pub page_size: u32,
}

impl ListingRequest {
  /// Page 0 is treated as page 1 and a zero page size as 1.
  pub fn new(resource: ResourceType, page: u32, page_size: u32) -> Self {
    Self {
      resource,
      page: page.max(1),
      page_size: page_size.max(1),
    }
  }

  pub fn skip(&self) -> u64 {
    u64::from(self.page - 1) * u64::from(self.page_size)
  }
}

/// Normalized result of a listing query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingResponse<T> {
  /// Items in CMS order (newest first)
  pub items: Vec<T>,
  pub total: u64,
  pub skip: u64,
  pub limit: u32,
  pub has_more: bool,
}

impl<T> ListingResponse<T> {
  pub fn new(items: Vec<T>, total: u64, skip: u64, limit: u32) -> Self {
    let has_more = has_more(skip, items.len(), total);
    Self {
      items,
      total,
      skip,
      limit,
      has_more,
    }
  }

  pub fn total_pages(&self) -> u64 {
    total_pages(self.total, self.limit)
  }
}

/// Whether items exist past the returned window.
pub fn has_more(skip: u64, returned: usize, total: u64) -> bool {
  skip.saturating_add(returned as u64) < total
}

/// `ceil(total / page_size)`; zero when there is nothing to page through.
pub fn total_pages(total: u64, page_size: u32) -> u64 {
  if page_size == 0 {
    return 0;
  }
  total.div_ceil(u64::from(page_size))
}
