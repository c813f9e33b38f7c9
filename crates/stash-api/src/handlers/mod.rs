//! HTTP handlers, one module per resource.

pub mod favorites;
pub mod files;
pub mod health;
pub mod search;

use serde::Deserialize;

/// `?q=` name filter shared by the listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
}
