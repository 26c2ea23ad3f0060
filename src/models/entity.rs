//! Persisted entity kinds and their table metadata

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every table the data-access layer is allowed to touch.
///
/// Table names never come from user input; they are looked up here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    User,
    Vendor,
    Product,
    Collection,
    Article,
    ShippingMethod,
    Review,
    NewsletterSubscriber,
    Like,
    Bookmark,
    ProductView,
}

impl EntityKind {
    pub const ALL: [EntityKind; 11] = [
        EntityKind::User,
        EntityKind::Vendor,
        EntityKind::Product,
        EntityKind::Collection,
        EntityKind::Article,
        EntityKind::ShippingMethod,
        EntityKind::Review,
        EntityKind::NewsletterSubscriber,
        EntityKind::Like,
        EntityKind::Bookmark,
        EntityKind::ProductView,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Vendor => "vendors",
            EntityKind::Product => "products",
            EntityKind::Collection => "collections",
            EntityKind::Article => "articles",
            EntityKind::ShippingMethod => "shipping_methods",
            EntityKind::Review => "reviews",
            EntityKind::NewsletterSubscriber => "newsletter_subscribers",
            EntityKind::Like => "likes",
            EntityKind::Bookmark => "bookmarks",
            EntityKind::ProductView => "product_views",
        }
    }

    /// URL segment, e.g. `shipping-methods`
    pub fn slug(&self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Vendor => "vendors",
            EntityKind::Product => "products",
            EntityKind::Collection => "collections",
            EntityKind::Article => "articles",
            EntityKind::ShippingMethod => "shipping-methods",
            EntityKind::Review => "reviews",
            EntityKind::NewsletterSubscriber => "newsletter-subscribers",
            EntityKind::Like => "likes",
            EntityKind::Bookmark => "bookmarks",
            EntityKind::ProductView => "product-views",
        }
    }

    /// Column holding the resource-level owner identity, if the entity has one
    pub fn owner_column(&self) -> Option<&'static str> {
        match self {
            EntityKind::Vendor | EntityKind::Product => Some("owner_id"),
            EntityKind::Article => Some("author_id"),
            EntityKind::Review | EntityKind::Like | EntityKind::Bookmark | EntityKind::ProductView => {
                Some("user_id")
            }
            _ => None,
        }
    }

    /// Whether the table carries the lifecycle envelope (`is_active`, `is_deleted`, ...)
    pub fn has_lifecycle(&self) -> bool {
        !matches!(
            self,
            EntityKind::Like | EntityKind::Bookmark | EntityKind::ProductView
        )
    }
}

/// Query string for record listings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordListQuery {
    #[serde(default)]
    pub include_deleted: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl RecordListQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 200)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.slug() == s || k.table() == s)
            .ok_or_else(|| format!("unknown entity: {}", s))
    }
}
