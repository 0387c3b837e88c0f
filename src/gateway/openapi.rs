//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::account::{
    AccountProfile, AuthResponse, ForgotPasswordRequest, LoginRequest, RegisterRequest,
    ResendVerificationRequest, ResetPasswordRequest,
};
use crate::card::{CardRequest, CardStatus, CardView, IssuedCard};
use crate::gateway::handlers::{HealthResponse, MessageData};
use crate::notification::{Notification, NotificationStatus, NotificationType};
use crate::transaction::{RequestMoneyRequest, SendMoneyRequest, TransactionAccepted, TransactionView};

/// JWT bearer authentication (token from `/users/login`)
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bankly API",
        version = "1.0.0",
        description = "Peer-to-peer transfers with email verification and asynchronous settlement.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        // Users
        crate::gateway::handlers::auth::register,
        crate::gateway::handlers::auth::login,
        crate::gateway::handlers::auth::verify_email,
        crate::gateway::handlers::auth::resend_email_verification,
        crate::gateway::handlers::auth::forgot_password,
        crate::gateway::handlers::auth::reset_password,
        crate::gateway::handlers::auth::me,
        // Transactions
        crate::gateway::handlers::transactions::send_money,
        crate::gateway::handlers::transactions::verify_transfer,
        crate::gateway::handlers::transactions::request_money,
        crate::gateway::handlers::transactions::approve_request,
        crate::gateway::handlers::transactions::reject_request,
        crate::gateway::handlers::transactions::resend_verification,
        crate::gateway::handlers::transactions::list_completed,
        crate::gateway::handlers::transactions::list_requested,
        crate::gateway::handlers::transactions::get_transaction,
        // Cards
        crate::gateway::handlers::cards::request_card,
        crate::gateway::handlers::cards::get_card,
        crate::gateway::handlers::cards::verify_card,
        // Notifications
        crate::gateway::handlers::notifications::list_notifications,
        crate::gateway::handlers::notifications::mark_read,
    ),
    components(
        schemas(
            HealthResponse,
            MessageData,
            RegisterRequest,
            LoginRequest,
            ResendVerificationRequest,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            AccountProfile,
            AuthResponse,
            SendMoneyRequest,
            RequestMoneyRequest,
            TransactionAccepted,
            TransactionView,
            CardRequest,
            CardStatus,
            CardView,
            IssuedCard,
            Notification,
            NotificationType,
            NotificationStatus,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Users", description = "Registration, login, email verification, password reset"),
        (name = "Transactions", description = "Transfers and money requests (auth required except verify)"),
        (name = "Cards", description = "Card requests confirmed by emailed link (auth required except verify)"),
        (name = "Notifications", description = "Per-user notification feed (auth required)"),
        (name = "System", description = "Health checks and system info")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn test_openapi_document_generates() {
        let doc = ApiDoc::openapi();
        assert_eq!(doc.info.title, "Bankly API");
        assert!(doc.to_json().is_ok());
    }

    #[test]
    fn test_endpoints_registered() {
        let paths = ApiDoc::openapi().paths.paths;
        assert!(paths.contains_key("/api/v1/health"));
        assert!(paths.contains_key("/api/v1/users/register"));
        assert!(paths.contains_key("/api/v1/transactions/send"));
        assert!(paths.contains_key("/api/v1/transactions/verify/{token}"));
        assert!(paths.contains_key("/api/v1/notifications/{id}/read"));
        assert!(paths.contains_key("/api/v1/users/resend-verification"));
        assert!(paths.contains_key("/api/v1/users/me"));
        assert!(paths.contains_key("/api/v1/cards"));
        assert!(paths.contains_key("/api/v1/cards/verify/{token}"));
    }

    #[test]
    fn test_every_handler_documented() {
        let doc = ApiDoc::openapi();
        let operations: usize = doc
            .paths
            .paths
            .values()
            .map(|item| {
                [&item.get, &item.post, &item.put, &item.delete]
                    .iter()
                    .filter(|op| op.is_some())
                    .count()
            })
            .sum();
        assert_eq!(operations, 22);
    }

    #[test]
    fn test_security_scheme_registered() {
        let components = ApiDoc::openapi().components.expect("should have components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
