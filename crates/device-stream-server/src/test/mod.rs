//! Shared helpers for handler and end-to-end tests.

mod flow_test;

use axum::{body::Body, http::Request, response::Response, Router};
use futures::{Stream, StreamExt};
use tower::ServiceExt;

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.expect("router is infallible")
}

/// Next server-sent event from a streaming body, skipping keep-alive comments.
pub async fn read_frame<S, E>(body: &mut S) -> String
where
    S: Stream<Item = Result<axum::body::Bytes, E>> + Unpin,
    E: std::fmt::Debug,
{
    loop {
        let chunk = body
            .next()
            .await
            .expect("stream ended")
            .expect("stream chunk");
        let text = String::from_utf8(chunk.to_vec()).expect("utf-8 frame");
        if text.starts_with(':') {
            continue;
        }
        return text;
    }
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let mut body = response.into_body().into_data_stream();
    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        bytes.extend_from_slice(&chunk.expect("body chunk"));
    }
    serde_json::from_slice(&bytes).expect("json body")
}
