use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::application::composer::ComposerState;
use crate::application::error::HttpError;
use crate::application::feed::FeedState;
use crate::application::page::PageState;
use crate::config::SiteSettings;
use crate::domain::entities::{FeedEntry, UserProfile};
use crate::infra::assets::{FAVICON_PATH, STYLESHEET_PATH};

use super::relative_time::relative_time;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

/// Render `template` to a string, tagging failures with `source`.
pub fn render_html<T: Template>(
    source: &'static str,
    template: &T,
) -> Result<String, TemplateRenderError> {
    template
        .render()
        .map_err(|err| TemplateRenderError::new(source, "Template rendering failed", err))
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_html("presentation::views::render_template_response", &template) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
    pub description: String,
    pub stylesheet_href: &'static str,
    pub favicon_href: &'static str,
    pub datastar_script_url: String,
}

impl PageMetaView {
    pub fn from_site(site: &SiteSettings) -> Self {
        Self {
            title: site.title.clone(),
            description: site.description.clone(),
            stylesheet_href: STYLESHEET_PATH,
            favicon_href: FAVICON_PATH,
            datastar_script_url: site.datastar_script_url.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthorView {
    pub handle: String,
    pub profile_image_url: String,
    pub alt: String,
}

impl From<&UserProfile> for AuthorView {
    fn from(user: &UserProfile) -> Self {
        Self {
            handle: format!("@{}", user.username),
            profile_image_url: user.profile_image_url.clone(),
            alt: format!("@{}'s profile image", user.username),
        }
    }
}

#[derive(Clone)]
pub struct PostRowView {
    pub dom_id: String,
    pub author: AuthorView,
    pub content: String,
    pub relative_time: String,
    pub timestamp: String,
}

impl PostRowView {
    pub fn new(entry: &FeedEntry, now: OffsetDateTime) -> Self {
        Self {
            dom_id: format!("post-{}", entry.post.id),
            author: AuthorView::from(&entry.author),
            content: entry.post.content.clone(),
            relative_time: relative_time(entry.post.created_at, now),
            timestamp: entry
                .post
                .created_at
                .format(&Rfc3339)
                .unwrap_or_default(),
        }
    }
}

#[derive(Clone, Default)]
pub struct FeedView {
    pub loading: bool,
    pub unavailable: bool,
    pub posts: Vec<PostRowView>,
}

impl FeedView {
    pub fn from_state(state: &FeedState, now: OffsetDateTime) -> Self {
        match state {
            FeedState::Loading => Self {
                loading: true,
                ..Self::default()
            },
            FeedState::Unavailable => Self {
                unavailable: true,
                ..Self::default()
            },
            FeedState::Ready(entries) => Self {
                posts: entries
                    .iter()
                    .map(|entry| PostRowView::new(entry, now))
                    .collect(),
                ..Self::default()
            },
        }
    }
}

#[derive(Clone)]
pub struct ComposerView {
    pub author: AuthorView,
    pub shows_submit: bool,
    pub input_disabled: bool,
    pub shows_spinner: bool,
}

impl ComposerView {
    pub fn new(user: &UserProfile, state: &ComposerState) -> Self {
        Self {
            author: AuthorView::from(user),
            shows_submit: state.shows_submit(),
            input_disabled: state.input_disabled(),
            shows_spinner: state.shows_spinner(),
        }
    }
}

#[derive(Clone)]
pub struct ShellView {
    pub pending: bool,
    pub retry_pending: bool,
    pub sign_in_url: Option<String>,
    pub composer: Option<ComposerView>,
    pub feed_html: String,
}

impl ShellView {
    pub fn new(page: &PageState, sign_in_url: &str, feed_html: String) -> Self {
        Self {
            pending: !page.renders_content(),
            retry_pending: true,
            sign_in_url: page.shows_sign_in().then(|| sign_in_url.to_string()),
            composer: page
                .composer_user()
                .map(|user| ComposerView::new(user, &ComposerState::default())),
            feed_html,
        }
    }

    /// A pending placeholder that stays put instead of asking again.
    pub fn without_retry(self) -> Self {
        Self {
            retry_pending: false,
            ..self
        }
    }
}

#[derive(Clone)]
pub struct ToastItemView {
    pub id: String,
    pub kind: &'static str,
    pub text: String,
    pub ttl_ms: u64,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub meta: PageMetaView,
    pub shell_html: String,
    pub hydration_json: Option<String>,
}

#[derive(Template)]
#[template(path = "partials/shell.html")]
pub struct ShellTemplate {
    pub shell: ShellView,
}

#[derive(Template)]
#[template(path = "partials/feed.html")]
pub struct FeedTemplate {
    pub feed: FeedView,
}

#[derive(Template)]
#[template(path = "partials/toasts.html")]
pub struct ToastStackTemplate {
    pub toasts: Vec<ToastItemView>,
}

/// Make JSON safe to embed inside a `<script>` element.
pub fn script_safe_json(json: &str) -> String {
    json.replace("</", "<\\/")
}
