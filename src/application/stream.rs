//! Datastar SSE responses.
//!
//! Handlers queue element patches and signal patches, then turn the builder
//! into one `text/event-stream` response. Events are sent in queue order.

use std::convert::Infallible;

use async_stream::stream;
use axum::response::{
    IntoResponse, Response,
    sse::{Event, Sse},
};
use datastar::prelude::{ElementPatchMode, PatchElements, PatchSignals};
use serde::Serialize;

#[derive(Default)]
pub struct StreamBuilder {
    events: Vec<Event>,
}

impl StreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patch(&mut self, html: String, selector: &str, mode: ElementPatchMode) -> &mut Self {
        let event = PatchElements::new(html)
            .selector(selector)
            .mode(mode)
            .write_as_axum_sse_event();
        self.events.push(event);
        self
    }

    /// Replace the element matched by `selector` with `html`.
    pub fn replace(&mut self, selector: &str, html: String) -> &mut Self {
        self.patch(html, selector, ElementPatchMode::Replace)
    }

    /// Replace the children of the element matched by `selector`.
    pub fn fill(&mut self, selector: &str, html: String) -> &mut Self {
        self.patch(html, selector, ElementPatchMode::Inner)
    }

    /// Merge `signals` into the client's signal store.
    pub fn signals<T: Serialize>(&mut self, signals: &T) -> Result<&mut Self, serde_json::Error> {
        let payload = serde_json::to_string(signals)?;
        self.events
            .push(PatchSignals::new(payload).write_as_axum_sse_event());
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_response(self) -> Response {
        let events = self.events;
        let stream = stream! {
            for event in events {
                yield Ok::<Event, Infallible>(event);
            }
        };
        Sse::new(stream).into_response()
    }
}
