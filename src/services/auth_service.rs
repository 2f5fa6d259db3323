use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use tracing::{error, instrument};

use crate::models::{
    AuthResponse, AuthenticatedUser, LoginRequest, RegisterRequest, RegisterResponse,
    RepositoryError, Role, ServiceError, ServiceResult, SessionClaims, User, Validate,
};
use crate::repositories::UserRepository;

pub const CREDENTIALS_REQUIRED: &str = "Both email and password are required";

/// Outcome of [`AuthService::ensure_admin`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminSeed {
    Created { user_id: String },
    /// The email is registered already; the account is left untouched
    Existing,
}

/// Registration, credential login and session tokens
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    session_secret: String,
    token_ttl: Duration,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, session_secret: String, token_ttl: Duration) -> Self {
        Self {
            users,
            session_secret,
            token_ttl,
        }
    }

    #[instrument(skip(self, request))]
    pub async fn register(&self, request: RegisterRequest) -> ServiceResult<RegisterResponse> {
        if request.email.trim().is_empty() || request.password.is_empty() {
            return Err(ServiceError::invalid_request(CREDENTIALS_REQUIRED));
        }
        request.validate()?;

        let email = normalize_email(&request.email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::DuplicateEmail { email });
        }

        let password_hash = hash_password(&request.password)?;
        let user = match self
            .users
            .create(User::new(&email, password_hash, Role::User))
            .await
        {
            Ok(user) => user,
            // Lost a race with a concurrent registration of the same address
            Err(RepositoryError::ConditionFailed) => {
                return Err(ServiceError::DuplicateEmail { email })
            }
            Err(e) => return Err(e.into()),
        };

        crate::info_with_trace!(user_id = %user.id, "User registered");
        Ok(RegisterResponse {
            message: "User registration successfull!".to_string(),
            user_id: user.id,
        })
    }

    /// Creates an admin account for `email` unless one is registered.
    /// Safe to run on every start.
    #[instrument(skip(self, email, password))]
    pub async fn ensure_admin(&self, email: &str, password: &str) -> ServiceResult<AdminSeed> {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
        .validate()?;

        let email = normalize_email(email);
        if let Some(user) = self.users.find_by_email(&email).await? {
            if !user.role.is_admin() {
                crate::warn_with_trace!(user_id = %user.id, "Seed admin email belongs to a non-admin account");
            }
            return Ok(AdminSeed::Existing);
        }

        let password_hash = hash_password(password)?;
        match self
            .users
            .create(User::new(&email, password_hash, Role::Admin))
            .await
        {
            Ok(user) => {
                crate::info_with_trace!(user_id = %user.id, "Admin account seeded");
                Ok(AdminSeed::Created { user_id: user.id })
            }
            // Another instance seeded it first
            Err(RepositoryError::ConditionFailed) => Ok(AdminSeed::Existing),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> ServiceResult<AuthResponse> {
        if request.email.trim().is_empty() || request.password.is_empty() {
            return Err(ServiceError::invalid_request(CREDENTIALS_REQUIRED));
        }

        let email = normalize_email(&request.email);
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        if !verify_password(&request.password, &user.password_hash) {
            crate::warn_with_trace!(user_id = %user.id, "Login rejected: wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        let (token, claims) = self.issue_token(&user)?;
        crate::info_with_trace!(user_id = %user.id, "User logged in");

        Ok(AuthResponse {
            token,
            user_id: user.id,
            email: user.email,
            role: user.role,
            expires_at: chrono::DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now),
        })
    }

    /// Signs an HS256 session token for `user`
    pub fn issue_token(&self, user: &User) -> ServiceResult<(String, SessionClaims)> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.token_ttl).timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.session_secret.as_bytes()),
        )
        .map_err(|e| {
            error!(error = %e, "Failed to sign session token");
            ServiceError::Configuration {
                message: "Unable to sign session token".to_string(),
            }
        })?;

        Ok((token, claims))
    }

    /// Resolves a bearer token to the caller; any failure is `Unauthorized`
    pub fn verify_token(&self, token: &str) -> ServiceResult<AuthenticatedUser> {
        let decoding_key = DecodingKey::from_secret(self.session_secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);

        decode::<SessionClaims>(token, &decoding_key, &validation)
            .map(|data| AuthenticatedUser::from(data.claims))
            .map_err(|e| ServiceError::unauthorized(e.to_string()))
    }

    /// Admin check on top of [`AuthService::verify_token`]
    pub fn require_admin(&self, user: &AuthenticatedUser) -> ServiceResult<()> {
        if user.role.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::unauthorized("admin role required"))
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!(error = %e, "Password hashing failed");
            ServiceError::Configuration {
                message: "Unable to hash password".to_string(),
            }
        })
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mocks::MockUserRepo;
    use mockall::predicate::eq;

    const SECRET: &str = "session-secret-for-tests";

    fn service(users: MockUserRepo) -> AuthService {
        AuthService::new(Arc::new(users), SECRET.to_string(), Duration::days(30))
    }

    fn stored_user(password: &str, role: Role) -> User {
        let mut user = User::new("ada@example.com", hash_password(password).unwrap(), role);
        user.id = "U1".to_string();
        user
    }

    #[tokio::test]
    async fn test_register_creates_user_role() {
        let mut users = MockUserRepo::new();
        users
            .expect_find_by_email()
            .with(eq("ada@example.com"))
            .times(1)
            .returning(|_| Ok(None));
        users
            .expect_create()
            .withf(|u| u.role == Role::User && u.password_hash.starts_with("$argon2"))
            .times(1)
            .returning(Ok);

        let response = service(users)
            .register(RegisterRequest {
                email: " Ada@Example.com ".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(response.message, "User registration successfull!");
        assert!(response.user_id.starts_with('U'));
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let mut users = MockUserRepo::new();
        users
            .expect_find_by_email()
            .returning(|_| Ok(Some(User::new("ada@example.com", "x".to_string(), Role::User))));
        users.expect_create().never();

        let result = service(users)
            .register(RegisterRequest {
                email: "ada@example.com".to_string(),
                password: "correct horse".to_string(),
            })
            .await;

        match result {
            Err(e @ ServiceError::DuplicateEmail { .. }) => {
                assert_eq!(e.to_string(), "Email is already taken")
            }
            other => panic!("Expected DuplicateEmail, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_conflicting_write_is_duplicate_email() {
        // The index has not caught up with a concurrent registration yet
        let mut users = MockUserRepo::new();
        users.expect_find_by_email().times(1).returning(|_| Ok(None));
        users
            .expect_create()
            .times(1)
            .returning(|_| Err(RepositoryError::ConditionFailed));

        let result = service(users)
            .register(RegisterRequest {
                email: "ada@example.com".to_string(),
                password: "correct horse".to_string(),
            })
            .await;

        match result {
            Err(ServiceError::DuplicateEmail { email }) => assert_eq!(email, "ada@example.com"),
            other => panic!("Expected DuplicateEmail, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ensure_admin_creates_admin_account() {
        let mut users = MockUserRepo::new();
        users
            .expect_find_by_email()
            .with(eq("root@imageshop.test"))
            .times(1)
            .returning(|_| Ok(None));
        users
            .expect_create()
            .withf(|u| {
                u.role == Role::Admin
                    && u.email == "root@imageshop.test"
                    && verify_password("admin-password", &u.password_hash)
            })
            .times(1)
            .returning(Ok);

        let outcome = service(users)
            .ensure_admin(" Root@ImageShop.test", "admin-password")
            .await
            .unwrap();

        assert!(matches!(outcome, AdminSeed::Created { user_id } if user_id.starts_with('U')));
    }

    #[tokio::test]
    async fn test_ensure_admin_leaves_existing_account() {
        let mut users = MockUserRepo::new();
        users
            .expect_find_by_email()
            .returning(|_| Ok(Some(stored_user("whatever-password", Role::Admin))));
        users.expect_create().never();

        let outcome = service(users)
            .ensure_admin("ada@example.com", "admin-password")
            .await
            .unwrap();
        assert_eq!(outcome, AdminSeed::Existing);
    }

    #[tokio::test]
    async fn test_ensure_admin_tolerates_concurrent_seed() {
        let mut users = MockUserRepo::new();
        users.expect_find_by_email().returning(|_| Ok(None));
        users
            .expect_create()
            .times(1)
            .returning(|_| Err(RepositoryError::ConditionFailed));

        let outcome = service(users)
            .ensure_admin("root@imageshop.test", "admin-password")
            .await
            .unwrap();
        assert_eq!(outcome, AdminSeed::Existing);
    }

    #[tokio::test]
    async fn test_ensure_admin_rejects_weak_password() {
        let mut users = MockUserRepo::new();
        users.expect_find_by_email().never();

        let result = service(users).ensure_admin("root@imageshop.test", "short").await;
        assert!(matches!(result, Err(ServiceError::ValidationError { .. })));
    }

    #[tokio::test]
    async fn test_register_requires_both_fields() {
        let mut users = MockUserRepo::new();
        users.expect_find_by_email().never();

        let result = service(users)
            .register(RegisterRequest {
                email: "ada@example.com".to_string(),
                password: String::new(),
            })
            .await;

        match result {
            Err(ServiceError::InvalidRequest { message }) => {
                assert_eq!(message, CREDENTIALS_REQUIRED)
            }
            other => panic!("Expected InvalidRequest, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_rejects_malformed_email() {
        let result = service(MockUserRepo::new())
            .register(RegisterRequest {
                email: "not-an-email".to_string(),
                password: "correct horse".to_string(),
            })
            .await;

        assert!(matches!(result, Err(ServiceError::ValidationError { .. })));
    }

    #[tokio::test]
    async fn test_login_issues_verifiable_token() {
        let user = stored_user("correct horse", Role::Admin);
        let mut users = MockUserRepo::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(user.clone())));

        let service = service(users);
        let response = service
            .login(LoginRequest {
                email: "ada@example.com".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(response.user_id, "U1");
        assert_eq!(response.role, Role::Admin);

        let caller = service.verify_token(&response.token).unwrap();
        assert_eq!(caller.user_id, "U1");
        assert_eq!(caller.role, Role::Admin);
        assert!(service.require_admin(&caller).is_ok());
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let user = stored_user("correct horse", Role::User);
        let mut users = MockUserRepo::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(user.clone())));

        let result = service(users)
            .login(LoginRequest {
                email: "ada@example.com".to_string(),
                password: "battery staple".to_string(),
            })
            .await;

        assert!(matches!(result, Err(ServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let mut users = MockUserRepo::new();
        users.expect_find_by_email().returning(|_| Ok(None));

        let result = service(users)
            .login(LoginRequest {
                email: "nobody@example.com".to_string(),
                password: "whatever1".to_string(),
            })
            .await;

        assert!(matches!(result, Err(ServiceError::InvalidCredentials)));
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let user = stored_user("correct horse", Role::User);
        let other = AuthService::new(
            Arc::new(MockUserRepo::new()),
            "another-secret".to_string(),
            Duration::days(1),
        );
        let (token, _) = other.issue_token(&user).unwrap();

        let result = service(MockUserRepo::new()).verify_token(&token);
        assert!(matches!(result, Err(ServiceError::Unauthorized { .. })));
    }

    #[test]
    fn test_expired_token_rejected() {
        let user = stored_user("correct horse", Role::User);
        let expired = AuthService::new(
            Arc::new(MockUserRepo::new()),
            SECRET.to_string(),
            Duration::hours(-2),
        );
        let (token, _) = expired.issue_token(&user).unwrap();

        assert!(expired.verify_token(&token).is_err());
    }

    #[test]
    fn test_require_admin_rejects_user() {
        let caller = AuthenticatedUser {
            user_id: "U1".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::User,
        };
        assert!(matches!(
            service(MockUserRepo::new()).require_admin(&caller),
            Err(ServiceError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }
}
