//! Error taxonomy for talking to the Contentful GraphQL API.

use serde::Deserialize;
use std::fmt;

/// A single entry of a GraphQL `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GraphQlErrorMessage {
  pub message: String,
}

/// Errors raised by the fetch adapter and the listing resolver.
///
/// The type is `Clone` so a single in-flight fetch can be shared between
/// several waiters in the cache layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContentfulError {
  /// A required token or space id is not configured.
  #[error("Missing Contentful credentials: {0}")]
  MissingCredentials(&'static str),

  /// The endpoint answered with a non-2xx status.
  #[error("Network response was not ok: {status} {status_text}")]
  Network { status: u16, status_text: String },

  /// The request succeeded at the transport layer but carried GraphQL errors.
  #[error("GraphQL error: {}", join_messages(.errors))]
  GraphQl { errors: Vec<GraphQlErrorMessage> },

  /// The response lacked the expected collection.
  #[error("{0}")]
  Malformed(String),

  /// Anything else: DNS, connect, timeout, undecodable body.
  #[error("Failed to fetch data from Contentful: {cause}")]
  Fetch { cause: String },
}

/// Coarse classification used by the UI to pick a message style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Configuration,
  Network,
  GraphQl,
  Malformed,
  Transport,
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      ErrorKind::Configuration => "configuration",
      ErrorKind::Network => "network",
      ErrorKind::GraphQl => "graphql",
      ErrorKind::Malformed => "malformed response",
      ErrorKind::Transport => "transport",
    };
    f.write_str(label)
  }
}

impl ContentfulError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      ContentfulError::MissingCredentials(_) => ErrorKind::Configuration,
      ContentfulError::Network { .. } => ErrorKind::Network,
      ContentfulError::GraphQl { .. } => ErrorKind::GraphQl,
      ContentfulError::Malformed(_) => ErrorKind::Malformed,
      ContentfulError::Fetch { .. } => ErrorKind::Transport,
    }
  }

  pub(crate) fn fetch(cause: impl fmt::Display) -> Self {
    ContentfulError::Fetch {
      cause: cause.to_string(),
    }
  }

  pub(crate) fn malformed(resource_plural: &str) -> Self {
    ContentfulError::Malformed(format!(
      "Failed to extract {} from response",
      resource_plural
    ))
  }
}

fn join_messages(errors: &[GraphQlErrorMessage]) -> String {
  errors
    .iter()
    .map(|e| e.message.as_str())
    .collect::<Vec<_>>()
    .join("; ")
}
