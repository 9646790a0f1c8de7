//! Persisted records and the composites handed to the feed.

use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub profile_image_url: String,
    pub created_at: OffsetDateTime,
}

impl UserRecord {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            profile_image_url: self.profile_image_url.clone(),
        }
    }
}

/// Public face of a user: what the feed shows next to a post and what the
/// composer shows for the signed-in author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub profile_image_url: String,
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
    pub expires_at: Option<OffsetDateTime>,
    pub revoked_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// A post together with its author, in feed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub post: PostRecord,
    pub author: UserProfile,
}
