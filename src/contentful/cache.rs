//! Cache keys for Contentful queries.

use sha2::{Digest, Sha256};

use crate::cache::QueryKey;

use super::types::{ListingRequest, ResourceType};

/// Query key types for Contentful API calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentQueryKey {
  /// One page of a listing
  Page {
    resource: ResourceType,
    page: u32,
    page_size: u32,
    preview: bool,
  },
  /// A single item by slug
  Item {
    resource: ResourceType,
    slug: String,
    preview: bool,
  },
}

impl ContentQueryKey {
  pub fn page(request: &ListingRequest, preview: bool) -> Self {
    Self::Page {
      resource: request.resource,
      page: request.page,
      page_size: request.page_size,
      preview,
    }
  }

  pub fn item(resource: ResourceType, slug: &str, preview: bool) -> Self {
    Self::Item {
      resource,
      slug: slug.to_string(),
      preview,
    }
  }
}

impl QueryKey for ContentQueryKey {
  fn cache_hash(&self) -> String {
    let input = match self {
      Self::Page {
        resource,
        page,
        page_size,
        preview,
      } => format!(
        "page:{}:{}:{}:{}",
        resource,
        page,
        page_size,
        api_name(*preview)
      ),
      Self::Item {
        resource,
        slug,
        preview,
      } => format!("item:{}:{}:{}", resource, slug, api_name(*preview)),
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  fn description(&self) -> String {
    match self {
      Self::Page {
        resource,
        page,
        page_size,
        preview,
      } => format!(
        "{} page {} (size {}, {})",
        resource.plural(),
        page,
        page_size,
        api_name(*preview)
      ),
      Self::Item {
        resource,
        slug,
        preview,
      } => format!("{} {} ({})", resource, slug, api_name(*preview)),
    }
  }
}

fn api_name(preview: bool) -> &'static str {
  if preview {
    "preview"
  } else {
    "delivery"
  }
}
