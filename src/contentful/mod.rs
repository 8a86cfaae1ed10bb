pub mod api_types;
pub mod cache;
pub mod cached_client;
pub mod client;
pub mod error;
pub mod queries;
pub mod resolver;
pub mod types;

pub use cached_client::CachedContentClient;
pub use error::ContentfulError;
pub use resolver::Resource;
pub use types::{Article, ListingResponse, ResourceType, TalentProfile};
