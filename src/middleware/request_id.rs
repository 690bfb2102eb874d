use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Reuses a caller-supplied request ID when it is a valid header value,
/// otherwise mints one, and echoes it on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let header_value = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .cloned()
        .unwrap_or_else(|| {
            HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
        });
    let request_id = header_value.to_str().unwrap_or("unknown").to_string();

    request.extensions_mut().insert(RequestId(request_id.clone()));
    tracing::Span::current().record("request_id", request_id.as_str());

    let mut response = next.run(request).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    response
}
