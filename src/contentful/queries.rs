//! GraphQL documents sent to the Contentful delivery and preview APIs.
//!
//! Listing queries request items and `total` in the same round trip.

const ARTICLE_SUMMARY_FIELDS: &str = r#"
  sys { id publishedAt firstPublishedAt }
  slug
  title
  excerpt
  author { name }
"#;

/// Profiles are short, so listings carry the whole record including `bio`.
const TALENT_FIELDS: &str = r#"
  sys { id publishedAt firstPublishedAt }
  slug
  name
  jobTitle
  location
  bio { json }
"#;

pub fn article_collection() -> String {
  format!(
    r#"query ArticleCollection($limit: Int!, $skip: Int!, $preview: Boolean!) {{
  articleCollection(limit: $limit, skip: $skip, preview: $preview, order: sys_firstPublishedAt_DESC) {{
    total
    items {{{}}}
  }}
}}"#,
    ARTICLE_SUMMARY_FIELDS
  )
}

pub fn article_by_slug() -> String {
  format!(
    r#"query ArticleBySlug($slug: String!, $preview: Boolean!) {{
  articleCollection(where: {{ slug: $slug }}, limit: 1, preview: $preview) {{
    total
    items {{{}
      content {{ json }}
    }}
  }}
}}"#,
    ARTICLE_SUMMARY_FIELDS
  )
}

pub fn talent_collection() -> String {
  format!(
    r#"query TalentCollection($limit: Int!, $skip: Int!, $preview: Boolean!) {{
  talentCollection(limit: $limit, skip: $skip, preview: $preview, order: sys_firstPublishedAt_DESC) {{
    total
    items {{{}}}
  }}
}}"#,
    TALENT_FIELDS
  )
}

pub fn talent_by_slug() -> String {
  format!(
    r#"query TalentBySlug($slug: String!, $preview: Boolean!) {{
  talentCollection(where: {{ slug: $slug }}, limit: 1, preview: $preview) {{
    total
    items {{{}}}
  }}
}}"#,
    TALENT_FIELDS
  )
}
