//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::handlers::{invite, session, system};

/// Path of the generated OpenAPI JSON.
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// OpenAPI description of every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "meetup-gateway",
        description = "Invite, confirm and track two-person meetups at hotspots and events."
    ),
    paths(
        invite::send_invite,
        invite::get_invite,
        invite::accept_invite,
        invite::decline_invite,
        invite::expire_invite,
        invite::confirm_going,
        session::get_session,
        session::update_location,
        session::complete_meetup,
        system::health_handler,
        system::meetup_config_handler,
    ),
    tags(
        (name = "Invites", description = "Invite lifecycle and the going-together handshake"),
        (name = "Sessions", description = "Live check-ins and meetup completion"),
        (name = "System", description = "Health and policy"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/invites",
            "/api/v1/invites/{id}",
            "/api/v1/invites/{id}/confirm",
            "/api/v1/sessions/{id}/location",
            "/api/v1/sessions/{id}/complete",
            "/health",
            "/config/meetup",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
