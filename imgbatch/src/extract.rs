//! Image locator extraction from card exports.
//!
//! A card export is a JSON document listing its cards under `data.cards.edges`, each edge node holding the path of the card
//! image, usually relative to the card website:
//!
//! ```json
//! { "data": { "cards": { "edges": [ { "node": { "imageUrl": "/img/cards/en/a.png?v=2" } } ] } } }
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// An unreadable or malformed card export.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Invalid JSON or missing field.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct Document {
    data: Data,
}

#[derive(Debug, Deserialize)]
struct Data {
    cards: Cards,
}

#[derive(Debug, Deserialize)]
struct Cards {
    edges: Vec<Edge>,
}

#[derive(Debug, Deserialize)]
struct Edge {
    node: Node,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Node {
    image_url: String,
}

/// Read the card export at `path` and return its image URLs, in document order.
pub async fn from_path(path: impl AsRef<Path>, domain_prefix: &str) -> Result<Vec<String>, ExtractError> {
    let document = tokio::fs::read_to_string(path).await?;

    locators(&document, domain_prefix)
}

/// Return the image URLs of a card export, in document order.
///
/// Duplicates are kept.
pub fn locators(document: &str, domain_prefix: &str) -> Result<Vec<String>, ExtractError> {
    let document: Document = serde_json::from_str(document)?;

    Ok(document
        .data
        .cards
        .edges
        .iter()
        .map(|edge| absolute_url(domain_prefix, &edge.node.image_url))
        .collect())
}

/// Make `path` absolute against `domain_prefix`, over HTTPS unless the prefix brings its own scheme.
///
/// Already absolute HTTP(S) URLs are returned as is.
pub fn absolute_url(domain_prefix: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_owned();
    }

    let domain = domain_prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if domain.contains("://") {
        format!("{domain}/{path}")
    } else {
        format!("https://{domain}/{path}")
    }
}
