// Post domain types
//
// The social feed: newest first, paginated, sorted by created_at at the
// gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SyncOptions;
use crate::entity::{Entity, OwnerId};
use crate::pet::non_blank;
use crate::query::Query;
use crate::sync::EntitySync;

/// Default number of posts per feed page
pub const DEFAULT_FEED_PAGE_SIZE: usize = 20;

/// Maximum post length in characters
pub const MAX_POST_LENGTH: usize = 2000;

/// Who can see a post
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Friends,
    Private,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Friends => write!(f, "friends"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

impl From<&str> for Visibility {
    fn from(s: &str) -> Self {
        match s {
            "friends" => Visibility::Friends,
            "private" => Visibility::Private,
            _ => Visibility::Public,
        }
    }
}

/// Kind of post
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    #[default]
    Update,
    Question,
    Event,
    Adoption,
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostType::Update => write!(f, "update"),
            PostType::Question => write!(f, "question"),
            PostType::Event => write!(f, "event"),
            PostType::Adoption => write!(f, "adoption"),
        }
    }
}

impl From<&str> for PostType {
    fn from(s: &str) -> Self {
        match s {
            "question" => PostType::Question,
            "event" => PostType::Event,
            "adoption" => PostType::Adoption,
            _ => PostType::Update,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub content: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub post_type: PostType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub like_count: u32,
    #[serde(default)]
    pub comment_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Post {
    type Id = Uuid;
    const COLLECTION: &'static str = "posts";

    fn id(&self) -> &Uuid {
        &self.id
    }

    fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    fn sync_options() -> SyncOptions {
        SyncOptions::feed(DEFAULT_FEED_PAGE_SIZE)
    }
}

/// Sync hook over the post feed
pub type PostsSync = EntitySync<Post>;

/// Feed filters; `limit` is the page size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_type: Option<PostType>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_FEED_PAGE_SIZE
}

impl Default for PostFilters {
    fn default() -> Self {
        Self {
            visibility: None,
            post_type: None,
            limit: DEFAULT_FEED_PAGE_SIZE,
        }
    }
}

impl PostFilters {
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_type(mut self, post_type: PostType) -> Self {
        self.post_type = Some(post_type);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

impl From<PostFilters> for Query {
    fn from(filters: PostFilters) -> Self {
        Query::new()
            .filter_opt("visibility", filters.visibility)
            .filter_opt("post_type", filters.post_type)
            .limit(filters.limit.max(1))
    }
}

/// Unsaved post as composed by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDraft {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub post_type: PostType,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl PostDraft {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn into_post(self, owner: OwnerId) -> Post {
        let now = Utc::now();
        Post {
            id: Uuid::now_v7(),
            owner_id: owner,
            content: self.content.trim().to_string(),
            visibility: self.visibility,
            post_type: self.post_type,
            image_url: non_blank(self.image_url),
            like_count: 0,
            comment_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
