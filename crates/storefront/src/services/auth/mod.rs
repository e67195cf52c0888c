//! Authentication service.
//!
//! Owns the session signal: a `watch` channel carrying the signed-in user, or
//! `None`. The cart sync subscribes to it; this service is the only writer.

mod error;

pub use error::AuthError;

use secrecy::SecretString;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use freshcart_core::{Email, SessionUser};

use crate::api::{ApiClient, ApiError};
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};

/// Authentication service.
///
/// Handles session restore at start-up, password login and logout.
pub struct AuthService {
    api: ApiClient,
    session: watch::Sender<Option<SessionUser>>,
}

impl AuthService {
    /// Create a signed-out authentication service.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let (session, _) = watch::channel(None);
        Self { api, session }
    }

    /// Subscribe to the session signal.
    #[must_use]
    pub fn session(&self) -> watch::Receiver<Option<SessionUser>> {
        self.session.subscribe()
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<SessionUser> {
        self.session.borrow().clone()
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Pick up an existing session (e.g. a cookie from an earlier login).
    ///
    /// A failed session check counts as signed out.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Option<SessionUser> {
        let user = match self.api.current_user().await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Session check failed, continuing signed out");
                None
            }
        };
        self.publish(user.clone());
        user
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::InvalidCredentials` if the server refuses the login.
    /// Returns `AuthError::Api` if the server cannot be reached.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<SessionUser, AuthError> {
        let email = Email::parse(email)?;

        self.api
            .login(&email, password)
            .await
            .map_err(|e| match e {
                ApiError::Rejected(message) => AuthError::InvalidCredentials(message),
                other => AuthError::Api(other),
            })?;

        let user = self
            .api
            .current_user()
            .await?
            .ok_or(AuthError::SessionNotEstablished)?;

        info!(user = %user.id, "Signed in");
        self.publish(Some(user.clone()));
        Ok(user)
    }

    /// End the session.
    ///
    /// The session signal only changes if the server confirms the logout.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Api` if the server refuses or cannot be reached.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.api.logout().await?;
        info!("Signed out");
        self.publish(None);
        Ok(())
    }

    fn publish(&self, user: Option<SessionUser>) {
        match &user {
            Some(user) => {
                set_sentry_user(&user.id, Some(&user.email));
                add_breadcrumb("auth", "Signed in", Some(&[("user_id", user.id.as_str())]));
            }
            None => {
                clear_sentry_user();
                add_breadcrumb("auth", "Signed out", None);
            }
        }
        self.session.send_replace(user);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;

    fn service() -> AuthService {
        let config = ApiConfig::new("http://127.0.0.1:9/".parse().unwrap());
        AuthService::new(ApiClient::new(&config).unwrap())
    }

    #[tokio::test]
    async fn test_login_rejects_malformed_email_before_any_request() {
        let auth = service();
        let err = auth
            .login("not-an-email", &SecretString::from("pw".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidEmail(_)));
        assert!(auth.current_user().is_none());
    }

    #[test]
    fn test_publish_notifies_subscribers() {
        let auth = service();
        let rx = auth.session();

        auth.publish(Some(SessionUser {
            id: "u1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            cart_items: freshcart_core::Cart::new(),
        }));

        assert!(rx.has_changed().unwrap());
        assert_eq!(auth.current_user().unwrap().id.as_str(), "u1");
    }
}
