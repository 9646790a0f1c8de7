use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreatePostParams, PostsRepo, PostsWriteRepo, RepoError};
use crate::domain::entities::{FeedEntry, PostRecord, UserProfile};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(FromRow)]
struct PostRow {
    id: Uuid,
    author_id: Uuid,
    content: String,
    created_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct FeedRow {
    id: Uuid,
    author_id: Uuid,
    content: String,
    created_at: OffsetDateTime,
    username: String,
    profile_image_url: String,
}

impl From<FeedRow> for FeedEntry {
    fn from(row: FeedRow) -> Self {
        Self {
            post: PostRecord {
                id: row.id,
                author_id: row.author_id,
                content: row.content,
                created_at: row.created_at,
            },
            author: UserProfile {
                id: row.author_id,
                username: row.username,
                profile_image_url: row.profile_image_url,
            },
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_recent(&self, limit: u32) -> Result<Vec<FeedEntry>, RepoError> {
        let rows = sqlx::query_as::<_, FeedRow>(
            r#"
            SELECT p.id, p.author_id, p.content, p.created_at,
                   u.username, u.profile_image_url
            FROM posts p
            JOIN users u ON u.id = p.author_id
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(FeedEntry::from).collect())
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (id, author_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, author_id, content, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(params.author_id)
        .bind(params.content.as_str())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }
}
