use crate::api::handlers::{health, post_login};
use utoipa::OpenApi;

/// `OpenAPI` document for every routed endpoint; `info` comes from Cargo metadata.
#[derive(OpenApi)]
#[openapi(
    paths(health::health, post_login::begin, post_login::resume),
    tags(
        (name = "post-login", description = "Consent redirect and resume for the post-login flow"),
        (name = "health", description = "Service status"),
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
