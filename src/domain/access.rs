use crate::domain::{Config, VisitorId};

/// What a session is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Browse the catalog and submit requests.
    Visitor,
    /// Everything a visitor can do, plus managing the catalog and requests.
    Admin,
}

/// An authenticated caller.
///
/// Every caller has a visitor identity, used to attribute requests. Sessions
/// start as anonymous visitors and are elevated with [`Session::sign_in`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    visitor: VisitorId,
    role: Role,
}

impl Session {
    /// An anonymous visitor session.
    #[must_use]
    pub const fn visitor(visitor: VisitorId) -> Self {
        Self {
            visitor,
            role: Role::Visitor,
        }
    }

    /// Sign in as an administrator by presenting the configured token.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::AdminDisabled`] if no token is configured, or
    /// [`AccessError::InvalidCredentials`] if `token` does not match.
    pub fn sign_in(config: &Config, visitor: VisitorId, token: &str) -> Result<Self, AccessError> {
        match config.verify_admin_token(token) {
            None => Err(AccessError::AdminDisabled),
            Some(false) => {
                tracing::warn!(%visitor, "rejected administrator sign-in");
                Err(AccessError::InvalidCredentials)
            }
            Some(true) => {
                tracing::info!(%visitor, "administrator signed in");
                Ok(Self {
                    visitor,
                    role: Role::Admin,
                })
            }
        }
    }

    /// The caller's visitor identity.
    #[must_use]
    pub const fn visitor_id(&self) -> &VisitorId {
        &self.visitor
    }

    /// The caller's role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Whether the caller is an administrator.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Fail unless the caller is an administrator.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Forbidden`] for visitor sessions.
    pub const fn require_admin(&self, action: &'static str) -> Result<(), AccessError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AccessError::Forbidden(action))
        }
    }
}

/// Authentication and authorization failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// No administrator token is configured.
    #[error("administrator access is not configured")]
    AdminDisabled,
    /// The presented token is wrong.
    #[error("invalid administrator token")]
    InvalidCredentials,
    /// The caller lacks the administrator role.
    #[error("administrator access required to {0}")]
    Forbidden(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_token(token: &str) -> Config {
        let mut config = Config::default();
        config.set_admin_token(token);
        config
    }

    #[test]
    fn visitors_are_not_admins() {
        let session = Session::visitor(VisitorId::generate());
        assert!(!session.is_admin());
        assert_eq!(
            session.require_admin("delete requests"),
            Err(AccessError::Forbidden("delete requests"))
        );
    }

    #[test]
    fn correct_token_grants_admin() {
        let visitor = VisitorId::generate();
        let session =
            Session::sign_in(&config_with_token("open sesame"), visitor.clone(), "open sesame")
                .unwrap();

        assert_eq!(session.role(), Role::Admin);
        assert_eq!(session.visitor_id(), &visitor);
        assert!(session.require_admin("anything").is_ok());
    }

    #[test]
    fn wrong_token_is_rejected() {
        let result = Session::sign_in(&config_with_token("right"), VisitorId::generate(), "wrong");
        assert_eq!(result, Err(AccessError::InvalidCredentials));
    }

    #[test]
    fn sign_in_without_configured_token_is_disabled() {
        let result = Session::sign_in(&Config::default(), VisitorId::generate(), "admin");
        assert_eq!(result, Err(AccessError::AdminDisabled));
    }
}
