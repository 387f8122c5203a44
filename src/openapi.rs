use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::auth::TokenPairs;
use crate::error::JsonResponse;
use crate::models::{Meme, NewMeme, UpdateMeme};
use crate::routes::{Credentials, StatusResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::home,
        crate::routes::authenticate,
        crate::routes::refresh_token,
        crate::routes::logout,
        crate::routes::list_memes,
        crate::routes::get_meme,
        crate::routes::insert_meme,
        crate::routes::update_meme,
        crate::routes::delete_meme,
    ),
    components(schemas(
        Meme, NewMeme, UpdateMeme, Credentials, StatusResponse, TokenPairs, JsonResponse
    )),
    modifiers(&BearerScheme),
    tags(
        (name = "memes", description = "Meme catalog"),
        (name = "auth", description = "Token issuance and refresh"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by the admin routes.
struct BearerScheme;

impl Modify for BearerScheme {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = ApiDoc::openapi();
        let expected = [
            "/",
            "/authenticate",
            "/refresh",
            "/logout",
            "/items",
            "/items/{id}",
            "/admin/items",
            "/admin/items/{id}",
        ];
        for path in expected {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let schemes = doc.components.expect("components").security_schemes;
        assert!(schemes.contains_key("bearer"));
    }
}
