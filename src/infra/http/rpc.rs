//! JSON surface for the procedures, mounted at `/api/rpc/<path>`.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chirp_api_types::{
    CreatePostInput, FeedEntryDto, PostDto, RpcErrorBody, RpcErrorData, RpcFailure, RpcSuccess,
    codes,
};

use crate::application::{error::ErrorReport, procedures::ProcedureError};

use super::{HttpState, procedure_context};

pub(super) async fn posts_get_all(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    let ctx = procedure_context(&state, &headers).await;
    match state.api.posts_get_all(&ctx).await {
        Ok(entries) => {
            let data: Vec<FeedEntryDto> = entries.iter().map(FeedEntryDto::from).collect();
            Json(RpcSuccess::new(data)).into_response()
        }
        Err(err) => {
            let mut response = failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL_SERVER_ERROR,
                "Internal server error",
                None,
            );
            ErrorReport::from_error(
                "infra::http::rpc::posts_get_all",
                StatusCode::INTERNAL_SERVER_ERROR,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

pub(super) async fn posts_create(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let input: CreatePostInput = match serde_json::from_slice(&body) {
        Ok(input) => input,
        Err(err) => {
            let mut response = failure(
                StatusCode::BAD_REQUEST,
                codes::BAD_REQUEST,
                "Malformed input",
                None,
            );
            ErrorReport::from_error(
                "infra::http::rpc::posts_create",
                StatusCode::BAD_REQUEST,
                &err,
            )
            .attach(&mut response);
            return response;
        }
    };

    let ctx = procedure_context(&state, &headers).await;
    match state.api.create_post(&ctx, input).await {
        Ok(post) => {
            state.api.invalidate_posts();
            Json(RpcSuccess::new(PostDto::from(&post))).into_response()
        }
        Err(err) => procedure_failure("infra::http::rpc::posts_create", &err),
    }
}

fn procedure_failure(source: &'static str, err: &ProcedureError) -> Response {
    let status = err.status();
    let data = err.field_errors().map(|errors| RpcErrorData {
        field_errors: errors.clone().into_map(),
    });
    let mut response = failure(status, err.code(), err.public_message(), data);

    if let ProcedureError::TooManyRequests { retry_after_secs } = err
        && let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string())
    {
        response.headers_mut().insert(RETRY_AFTER, value);
    }

    ErrorReport::from_error(source, status, err).attach(&mut response);
    response
}

fn failure(
    status: StatusCode,
    code: &str,
    message: &str,
    data: Option<RpcErrorData>,
) -> Response {
    let body = RpcFailure {
        error: RpcErrorBody {
            code: code.to_string(),
            message: message.to_string(),
            data,
        },
    };
    (status, Json(body)).into_response()
}
