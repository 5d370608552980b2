use crate::auth::jwt::{TokenCodec, TokenKind};
use crate::auth::password::PasswordHasher;
use crate::db::{NewUser, UserPatch, UserStore};
use crate::types::{AppError, AuthSession, ProfileUpdate, ProfileUpdateRequest, PublicUser, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Registration, login, profile update and token verification.
///
/// Holds no per-user state: every call resolves users through the injected
/// store and mints fresh tokens through the codec.
pub struct AuthService {
    store: Arc<dyn UserStore>,
    codec: TokenCodec,
    hasher: PasswordHasher,
}

fn normalise_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn normalise_name(name: &str) -> String {
    name.trim().to_string()
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>, codec: TokenCodec) -> Self {
        Self {
            store,
            codec,
            hasher: PasswordHasher::new(),
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Creates an account and signs the new user in.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<AuthSession> {
        let name = normalise_name(name);
        let email = normalise_email(email);
        let password = password.trim().to_string();

        if name.is_empty() || email.is_empty() || password.is_empty() {
            warn!(has_name = !name.is_empty(), has_email = !email.is_empty(), "incomplete registration");
            return Err(AppError::Validation(
                "Name, email and password are required.".to_string(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters.",
                MIN_PASSWORD_LEN
            )));
        }

        // Fail fast before paying for the hash; the store re-checks on write.
        if self.store.find_by_email(&email).await?.is_some() {
            warn!("registration attempt with an existing email");
            return Err(AppError::Conflict("Email already registered.".to_string()));
        }

        let password_hash = self.hash_password(password).await?;
        let user = self
            .store
            .create(NewUser {
                name,
                email,
                password_hash,
            })
            .await?;

        info!(user_id = user.id, "user registered");
        self.open_session(user.to_public())
    }

    /// Checks credentials and signs the user in.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        let email = normalise_email(email);
        let password = password.trim().to_string();

        if email.is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required.".to_string(),
            ));
        }

        let user = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

        if !self.verify_password(password, user.password_hash.clone()).await? {
            warn!(user_id = user.id, "failed login");
            return Err(AppError::InvalidCredentials("Invalid credentials.".to_string()));
        }

        info!(user_id = user.id, "user logged in");
        self.open_session(user.to_public())
    }

    /// Applies a profile change and re-mints the access token with the new claims.
    pub async fn update(&self, user_id: i64, patch: ProfileUpdateRequest) -> Result<ProfileUpdate> {
        let current = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

        let name = patch
            .name
            .as_deref()
            .map(normalise_name)
            .unwrap_or_else(|| current.name.clone());
        let email = patch
            .email
            .as_deref()
            .map(normalise_email)
            .unwrap_or_else(|| current.email.clone());

        if name.is_empty() {
            return Err(AppError::Validation("Name is required.".to_string()));
        }
        if email.is_empty() {
            return Err(AppError::Validation("Email is required.".to_string()));
        }

        let updated = self
            .store
            .update(
                user_id,
                UserPatch {
                    name: Some(name),
                    email: Some(email),
                },
            )
            .await?;

        let user = updated.to_public();
        let token = self.codec.issue_access_token(&user)?;

        info!(user_id, "profile updated");
        Ok(ProfileUpdate { user, token })
    }

    /// Resolves the user behind an access token.
    ///
    /// A cryptographically valid token whose subject no longer exists fails
    /// with `AppError::NotFound`.
    pub async fn verify(&self, token: &str) -> Result<PublicUser> {
        let user_id = self
            .codec
            .verify_subject(token, TokenKind::Access)
            .ok_or(AppError::InvalidToken)?;

        self.store
            .find_by_id(user_id)
            .await?
            .map(|u| u.to_public())
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
    }

    /// Mints a new access token from a refresh token. The refresh token itself is not reissued.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let user_id = self
            .codec
            .verify_subject(refresh_token, TokenKind::Refresh)
            .ok_or(AppError::InvalidToken)?;

        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

        self.codec.issue_access_token(&user.to_public())
    }

    fn open_session(&self, user: PublicUser) -> Result<AuthSession> {
        let token = self.codec.issue_access_token(&user)?;
        let refresh_token = self.codec.issue_refresh_token(user.id)?;

        Ok(AuthSession {
            user,
            token,
            refresh_token,
        })
    }

    async fn hash_password(&self, password: String) -> Result<String> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))
    }

    async fn verify_password(&self, password: String, encoded: String) -> Result<bool> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.verify(&password, &encoded))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::traits::MockUserStore;
    use crate::db::MemoryUserStore;

    fn create_test_service() -> AuthService {
        AuthService::new(
            Arc::new(MemoryUserStore::new()),
            TokenCodec::new("test-secret-key-that-is-at-least-32-chars", 3600, 604800),
        )
    }

    #[tokio::test]
    async fn test_register_normalises_inputs() {
        let service = create_test_service();

        let session = service
            .register("  Ana  ", "  Ana@Example.COM ", "secret1")
            .await
            .expect("should register");

        assert_eq!(session.user.id, 1);
        assert_eq!(session.user.name, "Ana");
        assert_eq!(session.user.email, "ana@example.com");
        assert!(!session.token.is_empty());
        assert_ne!(session.token, session.refresh_token);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let service = create_test_service();

        let missing = service.register("", "ana@example.com", "secret1").await;
        assert!(matches!(missing, Err(AppError::Validation(_))));

        let blank = service.register("Ana", "   ", "secret1").await;
        assert!(matches!(blank, Err(AppError::Validation(_))));

        let short = service.register("Ana", "ana@example.com", "12345").await;
        assert!(matches!(short, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_register_duplicate_email_is_case_insensitive() {
        let service = create_test_service();
        service
            .register("Ana", "ana@x.com", "secret1")
            .await
            .expect("first registration");

        let second = service.register("Other Ana", "Ana@X.com", "secret2").await;

        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_login_outcomes() {
        let service = create_test_service();
        let registered = service
            .register("Ana", "ana@example.com", "secret1")
            .await
            .unwrap();

        let session = service
            .login("ANA@example.com", "secret1")
            .await
            .expect("should log in");
        assert_eq!(session.user, registered.user);
        assert_ne!(session.token, registered.token, "login mints a fresh token");

        let wrong = service.login("ana@example.com", "secret2").await;
        assert!(matches!(wrong, Err(AppError::InvalidCredentials(_))));

        let unknown = service.login("nobody@example.com", "secret1").await;
        assert!(matches!(unknown, Err(AppError::NotFound(_))));

        let empty = service.login("", "secret1").await;
        assert!(matches!(empty, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_verify_resolves_current_record() {
        let service = create_test_service();
        let session = service
            .register("Ana", "ana@example.com", "secret1")
            .await
            .unwrap();

        service
            .update(
                session.user.id,
                ProfileUpdateRequest {
                    name: None,
                    email: Some("ana.maria@example.com".to_string()),
                },
            )
            .await
            .expect("should update");

        // The token minted before the update still names the same identity
        let user = service.verify(&session.token).await.expect("should verify");
        assert_eq!(user.id, session.user.id);
        assert_eq!(user.email, "ana.maria@example.com");
    }

    #[tokio::test]
    async fn test_update_remints_token_with_new_claims() {
        let service = create_test_service();
        let session = service
            .register("Ana", "ana@example.com", "secret1")
            .await
            .unwrap();

        let updated = service
            .update(
                session.user.id,
                ProfileUpdateRequest {
                    name: Some(" Ana Maria ".to_string()),
                    email: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.user.name, "Ana Maria");
        assert_eq!(updated.user.email, "ana@example.com");
        assert_ne!(updated.token, session.token);

        let claims = service.codec().verify(&updated.token).unwrap();
        assert_eq!(claims["name"], "Ana Maria");
    }

    #[tokio::test]
    async fn test_update_failures() {
        let service = create_test_service();
        service.register("Ana", "ana@x.com", "secret1").await.unwrap();
        service.register("Rui", "rui@x.com", "secret1").await.unwrap();

        let empty_name = service
            .update(
                1,
                ProfileUpdateRequest {
                    name: Some("  ".to_string()),
                    email: None,
                },
            )
            .await;
        assert!(matches!(empty_name, Err(AppError::Validation(_))));

        let taken = service
            .update(
                1,
                ProfileUpdateRequest {
                    name: None,
                    email: Some("RUI@x.com".to_string()),
                },
            )
            .await;
        assert!(matches!(taken, Err(AppError::Conflict(_))));

        let missing = service.update(99, ProfileUpdateRequest::default()).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_verify_rejects_bad_tokens() {
        let service = create_test_service();
        let session = service
            .register("Ana", "ana@example.com", "secret1")
            .await
            .unwrap();

        assert!(matches!(
            service.verify("garbage").await,
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(
            service.verify(&session.refresh_token).await,
            Err(AppError::InvalidToken)
        ));

        // Valid signature, unknown subject
        let ghost = service
            .codec()
            .issue_access_token(&PublicUser {
                id: 404,
                name: "Ghost".to_string(),
                email: "ghost@example.com".to_string(),
            })
            .unwrap();
        assert!(matches!(
            service.verify(&ghost).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_mints_access_token() {
        let service = create_test_service();
        let session = service
            .register("Ana", "ana@example.com", "secret1")
            .await
            .unwrap();

        let token = service
            .refresh(&session.refresh_token)
            .await
            .expect("should refresh");
        let user = service.verify(&token).await.expect("new token should verify");
        assert_eq!(user, session.user);

        assert!(matches!(
            service.refresh(&session.token).await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let mut store = MockUserStore::new();
        store
            .expect_find_by_email()
            .returning(|_| Err(AppError::Database("disk full".to_string())));
        store.expect_create().never();

        let service = AuthService::new(
            Arc::new(store),
            TokenCodec::new("test-secret-key-that-is-at-least-32-chars", 3600, 604800),
        );

        let result = service.register("Ana", "ana@example.com", "secret1").await;
        assert!(matches!(result, Err(AppError::Database(_))));
    }
}
