use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::future::Future;

use super::api_types::{ApiArticle, ApiCollection, ApiTalent};
use super::client::ContentfulClient;
use super::error::ContentfulError;
use super::queries;
use super::types::{Article, ListingResponse, ResourceType, TalentProfile};

/// A CMS content type that can be listed and looked up by slug.
pub trait Resource: Sized + Send + Sync + 'static {
  /// Wire representation of one collection item
  type Api: DeserializeOwned + Into<Self>;

  const TYPE: ResourceType;

  /// Name of the collection field in the GraphQL `data` object
  const COLLECTION: &'static str;

  /// Listing rows carry every field the detail view shows
  const FULL_LISTING: bool;

  fn list_query() -> String;

  fn by_slug_query() -> String;

  fn slug(&self) -> &str;

  /// One window of this resource, newest first.
  fn fetch_listing(
    resolver: &ContentResolver,
    limit: u32,
    preview: bool,
    skip: u64,
  ) -> impl Future<Output = Result<ListingResponse<Self>, ContentfulError>> + Send;

  fn fetch_by_slug(
    resolver: &ContentResolver,
    slug: &str,
    preview: bool,
  ) -> impl Future<Output = Result<Option<Self>, ContentfulError>> + Send;
}

impl Resource for Article {
  type Api = ApiArticle;
  const TYPE: ResourceType = ResourceType::Article;
  const COLLECTION: &'static str = "articleCollection";
  // The body is only requested by slug
  const FULL_LISTING: bool = false;

  fn list_query() -> String {
    queries::article_collection()
  }

  fn by_slug_query() -> String {
    queries::article_by_slug()
  }

  fn slug(&self) -> &str {
    &self.slug
  }

  fn fetch_listing(
    resolver: &ContentResolver,
    limit: u32,
    preview: bool,
    skip: u64,
  ) -> impl Future<Output = Result<ListingResponse<Self>, ContentfulError>> + Send {
    resolver.get_all_articles(limit, preview, skip)
  }

  fn fetch_by_slug(
    resolver: &ContentResolver,
    slug: &str,
    preview: bool,
  ) -> impl Future<Output = Result<Option<Self>, ContentfulError>> + Send {
    resolver.get_article(slug, preview)
  }
}

impl Resource for TalentProfile {
  type Api = ApiTalent;
  const TYPE: ResourceType = ResourceType::Talent;
  const COLLECTION: &'static str = "talentCollection";
  const FULL_LISTING: bool = true;

  fn list_query() -> String {
    queries::talent_collection()
  }

  fn by_slug_query() -> String {
    queries::talent_by_slug()
  }

  fn slug(&self) -> &str {
    &self.slug
  }

  fn fetch_listing(
    resolver: &ContentResolver,
    limit: u32,
    preview: bool,
    skip: u64,
  ) -> impl Future<Output = Result<ListingResponse<Self>, ContentfulError>> + Send {
    resolver.get_all_talent(limit, preview, skip)
  }

  fn fetch_by_slug(
    resolver: &ContentResolver,
    slug: &str,
    preview: bool,
  ) -> impl Future<Output = Result<Option<Self>, ContentfulError>> + Send {
    resolver.get_talent(slug, preview)
  }
}

/// Builds listing and single-item queries on top of the fetch adapter.
#[derive(Clone)]
pub struct ContentResolver {
  client: ContentfulClient,
}

impl ContentResolver {
  pub fn new(client: ContentfulClient) -> Self {
    Self { client }
  }

  pub fn client(&self) -> &ContentfulClient {
    &self.client
  }

  /// Fetch `limit` items starting at `skip`, newest first, with the total count.
  pub async fn list<R: Resource>(
    &self,
    limit: u32,
    preview: bool,
    skip: u64,
  ) -> Result<ListingResponse<R>, ContentfulError> {
    let variables = json!({ "limit": limit, "skip": skip, "preview": preview });
    let data = self
      .client
      .fetch_graphql(&R::list_query(), &variables, preview)
      .await?;

    let collection = extract_collection::<R>(data)?;
    let items: Vec<R> = collection.items.into_iter().map(Into::into).collect();

    tracing::debug!(
      resource = %R::TYPE,
      skip,
      limit,
      returned = items.len(),
      total = collection.total,
      "listing resolved"
    );

    Ok(ListingResponse::new(items, collection.total, skip, limit))
  }

  /// Look up one item by exact slug. `None` means no such item.
  pub async fn by_slug<R: Resource>(
    &self,
    slug: &str,
    preview: bool,
  ) -> Result<Option<R>, ContentfulError> {
    let variables = json!({ "slug": slug, "preview": preview });
    let data = self
      .client
      .fetch_graphql(&R::by_slug_query(), &variables, preview)
      .await?;

    let collection = extract_collection::<R>(data)?;
    Ok(collection.items.into_iter().next().map(Into::into))
  }

  pub async fn get_all_articles(
    &self,
    limit: u32,
    preview: bool,
    skip: u64,
  ) -> Result<ListingResponse<Article>, ContentfulError> {
    self.list(limit, preview, skip).await
  }

  pub async fn get_article(
    &self,
    slug: &str,
    preview: bool,
  ) -> Result<Option<Article>, ContentfulError> {
    self.by_slug(slug, preview).await
  }

  pub async fn get_all_talent(
    &self,
    limit: u32,
    preview: bool,
    skip: u64,
  ) -> Result<ListingResponse<TalentProfile>, ContentfulError> {
    self.list(limit, preview, skip).await
  }

  pub async fn get_talent(
    &self,
    slug: &str,
    preview: bool,
  ) -> Result<Option<TalentProfile>, ContentfulError> {
    self.by_slug(slug, preview).await
  }
}

/// Pull `data.<collection>` out of a response.
///
/// A missing or undecodable collection is an error; an empty `items` array is not.
fn extract_collection<R: Resource>(
  mut data: Value,
) -> Result<ApiCollection<R::Api>, ContentfulError> {
  let raw = data
    .get_mut(R::COLLECTION)
    .map(Value::take)
    .filter(|v| v.is_object())
    .ok_or_else(|| ContentfulError::malformed(R::TYPE.plural()))?;

  serde_json::from_value(raw).map_err(|e| {
    tracing::warn!(resource = %R::TYPE, error = %e, "collection did not decode");
    ContentfulError::malformed(R::TYPE.plural())
  })
}
