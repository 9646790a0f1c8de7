//! Request and response types shared by the chirp procedure endpoints.
//!
//! Every procedure answers with either [`RpcSuccess`] or [`RpcFailure`]. The
//! same DTOs are used when the server dehydrates its query cache into a page,
//! so a client can hydrate from either source with one decoder.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Procedure paths, as mounted under `/api/rpc/`.
pub mod procedures {
    pub const POSTS_GET_ALL: &str = "posts.getAll";
    pub const POSTS_CREATE: &str = "posts.create";
}

/// Error codes carried in [`RpcErrorBody::code`].
pub mod codes {
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const TOO_MANY_REQUESTS: &str = "TOO_MANY_REQUESTS";
    pub const CONFLICT: &str = "CONFLICT";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePostInput {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDto {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorDto {
    pub id: Uuid,
    pub username: String,
    pub profile_image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntryDto {
    pub post: PostDto,
    pub author: AuthorDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSuccess<T> {
    pub result: RpcResult<T>,
}

impl<T> RpcSuccess<T> {
    pub fn new(data: T) -> Self {
        Self {
            result: RpcResult { data },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResult<T> {
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcFailure {
    pub error: RpcErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<RpcErrorData>,
}

impl RpcErrorBody {
    /// First message recorded against `field`, if any.
    pub fn first_field_error(&self, field: &str) -> Option<&str> {
        self.data
            .as_ref()?
            .field_errors
            .get(field)?
            .first()
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcErrorData {
    #[serde(default)]
    pub field_errors: BTreeMap<String, Vec<String>>,
}

/// Snapshot of warm query-cache entries embedded into pre-rendered pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DehydratedState {
    pub queries: Vec<DehydratedQuery>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DehydratedQuery {
    pub key: String,
    pub data: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn field_errors_serialize_in_camel_case() {
        let mut field_errors = BTreeMap::new();
        field_errors.insert("content".to_string(), vec!["Content too long".to_string()]);
        let failure = RpcFailure {
            error: RpcErrorBody {
                code: codes::BAD_REQUEST.to_string(),
                message: "Invalid input".to_string(),
                data: Some(RpcErrorData { field_errors }),
            },
        };

        let value = serde_json::to_value(&failure).expect("serialize failure");
        assert_eq!(
            value,
            json!({
                "error": {
                    "code": "BAD_REQUEST",
                    "message": "Invalid input",
                    "data": { "fieldErrors": { "content": ["Content too long"] } }
                }
            })
        );
    }

    #[test]
    fn first_field_error_ignores_missing_data() {
        let body = RpcErrorBody {
            code: codes::TOO_MANY_REQUESTS.to_string(),
            message: "Slow down".to_string(),
            data: None,
        };
        assert_eq!(body.first_field_error("content"), None);
    }

    #[test]
    fn post_timestamps_use_rfc3339() {
        let post = PostDto {
            id: Uuid::nil(),
            author_id: Uuid::nil(),
            content: "🎉".to_string(),
            created_at: datetime!(2024-05-01 12:00 UTC),
        };
        let value = serde_json::to_value(&post).expect("serialize post");
        assert_eq!(value["createdAt"], json!("2024-05-01T12:00:00Z"));
        assert_eq!(value["authorId"], json!(Uuid::nil()));
    }
}
