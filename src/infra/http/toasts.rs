//! Transient notices rendered into the toast stack.

use std::time::Duration;

use uuid::Uuid;

use crate::application::error::HttpError;
use crate::application::stream::StreamBuilder;
use crate::presentation::views::{self, ToastItemView, ToastStackTemplate};

use super::selectors::TOAST_STACK;

const ERROR_TTL: Duration = Duration::from_secs(6);

/// A rejected-submission notice. The composer only ever reports failures,
/// so every toast renders with the error style.
#[derive(Debug, Clone)]
pub(super) struct Toast {
    id: Uuid,
    text: String,
    ttl: Duration,
}

impl Toast {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            ttl: ERROR_TTL,
        }
    }

    fn view(&self) -> ToastItemView {
        ToastItemView {
            id: self.id.simple().to_string(),
            kind: "error",
            text: self.text.clone(),
            ttl_ms: u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Replace the toast stack with `toasts`, newest last.
pub(super) fn push_toasts(stream: &mut StreamBuilder, toasts: &[Toast]) -> Result<(), HttpError> {
    let template = ToastStackTemplate {
        toasts: toasts.iter().map(Toast::view).collect(),
    };
    let html = views::render_html("infra::http::toasts::push_toasts", &template)?;
    stream.replace(TOAST_STACK, html);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toast_stack_renders_each_notice() {
        let mut stream = StreamBuilder::new();
        push_toasts(
            &mut stream,
            &[Toast::error("Only emojis are allowed"), Toast::error("Content too long")],
        )
        .expect("toasts render");
        assert_eq!(stream.len(), 1);

        let html = views::render_html(
            "tests",
            &ToastStackTemplate {
                toasts: vec![Toast::error("Content too long").view()],
            },
        )
        .expect("render");
        assert!(html.contains("toast-error"));
        assert!(html.contains("Content too long"));
        assert!(html.contains("6000"));
    }
}
