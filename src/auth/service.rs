use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::password::{
    generate_reset_token, hash_password, is_valid_email, verify_password,
};
use crate::auth::{
    AuthError, AuthResponse, ChangePasswordRequest, JwtService, LoginRequest, MessageResponse,
    RefreshTokenRequest, RegisterRequest, ResetPasswordRequest, TokenResponse, UserInfo, UserRole,
    UserSession,
};

/// User row as stored in the `users` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AuthService {
    jwt_service: JwtService,
    db: PgPool,
}

impl AuthService {
    pub fn new(db: PgPool, jwt_secret: &str) -> Self {
        Self {
            jwt_service: JwtService::new(jwt_secret),
            db,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt_service
    }

    /// Register a new user and create the matching profile row
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        if !is_valid_email(&request.email) {
            return Err(AuthError::EmailValidation(
                "email address is not well-formed".to_string(),
            ));
        }

        if self.get_user_by_email(&request.email).await?.is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = hash_password(&request.password)
            .map_err(|e| AuthError::PasswordValidation(e.to_string()))?;
        let role = request.role.unwrap_or(UserRole::Client);
        let now = Utc::now();

        // User and profile are created together or not at all
        let mut tx = self.db.begin().await.map_err(AuthError::Database)?;

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, password_hash, full_name, phone, role, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING id, email, password_hash, full_name, phone, role, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(&request.email)
        .bind(&password_hash)
        .bind(&request.full_name)
        .bind(&request.phone)
        .bind(&role)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(AuthError::Database)?;

        match role {
            UserRole::Client => {
                sqlx::query(
                    "INSERT INTO client_profiles (id, user_id, created_at, updated_at)
                     VALUES ($1, $2, $3, $3)",
                )
                .bind(Uuid::new_v4())
                .bind(user.id)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(AuthError::Database)?;
            }
            UserRole::Trainer => {
                sqlx::query(
                    "INSERT INTO trainer_profiles (id, user_id, created_at, updated_at)
                     VALUES ($1, $2, $3, $3)",
                )
                .bind(Uuid::new_v4())
                .bind(user.id)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(AuthError::Database)?;
            }
            UserRole::Admin => {}
        }

        tx.commit().await.map_err(AuthError::Database)?;

        let (access_token, refresh_token) =
            self.jwt_service
                .create_token_pair(user.id, &user.email, role.clone())?;

        self.store_refresh_token(user.id, &refresh_token).await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
            user: UserInfo {
                id: user.id,
                email: user.email,
                full_name: user.full_name,
                role,
                created_at: user.created_at,
            },
        })
    }

    /// Login user
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let user = self
            .get_user_by_email(&request.email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let (access_token, refresh_token) =
            self.jwt_service
                .create_token_pair(user.id, &user.email, user.role.clone())?;

        self.store_refresh_token(user.id, &refresh_token).await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
            user: UserInfo {
                id: user.id,
                email: user.email,
                full_name: user.full_name,
                role: user.role,
                created_at: user.created_at,
            },
        })
    }

    /// Refresh access token
    pub async fn refresh_token(
        &self,
        request: RefreshTokenRequest,
    ) -> Result<TokenResponse, AuthError> {
        let claims = self.jwt_service.validate_token(&request.refresh_token)?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        if !self
            .is_refresh_token_valid(user_id, &request.refresh_token)
            .await?
        {
            return Err(AuthError::InvalidToken);
        }

        let access_token =
            self.jwt_service
                .create_access_token(user_id, &claims.email, claims.role)?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
        })
    }

    /// Logout user: blacklist the access token and revoke stored refresh tokens
    pub async fn logout(&self, token: &str) -> Result<MessageResponse, AuthError> {
        let claims = self.jwt_service.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        let expires_at =
            DateTime::<Utc>::from_timestamp(claims.exp as i64, 0).unwrap_or_else(Utc::now);

        sqlx::query(
            "INSERT INTO token_blacklist (jti, expires_at, created_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(&claims.jti)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(AuthError::Database)?;

        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(AuthError::Database)?;

        Ok(MessageResponse::ok("Logged out successfully"))
    }

    /// Validate a bearer token into a session, rejecting blacklisted tokens
    pub async fn validate_session(&self, token: &str) -> Result<UserSession, AuthError> {
        let session = self.jwt_service.extract_user_session(token)?;

        let blacklisted: Option<(String,)> =
            sqlx::query_as("SELECT jti FROM token_blacklist WHERE jti = $1")
                .bind(&session.jti)
                .fetch_optional(&self.db)
                .await
                .map_err(AuthError::Database)?;

        if blacklisted.is_some() {
            return Err(AuthError::TokenRevoked);
        }

        Ok(session)
    }

    /// Start the forgot-password flow.
    ///
    /// Returns the user and the plaintext token when the email is known so the
    /// caller can send the reset mail. Callers must answer the HTTP request
    /// identically either way.
    pub async fn forgot_password(&self, email: &str) -> Result<Option<(User, String)>, AuthError> {
        let Some(user) = self.get_user_by_email(email).await? else {
            return Ok(None);
        };

        let token = generate_reset_token();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO password_reset_tokens (id, user_id, token, expires_at, used, created_at)
             VALUES ($1, $2, $3, $4, FALSE, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(&token)
        .bind(now + Duration::hours(1))
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(AuthError::Database)?;

        Ok(Some((user, token)))
    }

    /// Complete the forgot-password flow
    pub async fn reset_password(
        &self,
        request: ResetPasswordRequest,
    ) -> Result<MessageResponse, AuthError> {
        let row: Option<(Uuid, Uuid)> = sqlx::query_as(
            "SELECT id, user_id FROM password_reset_tokens
             WHERE token = $1 AND used = FALSE AND expires_at > $2",
        )
        .bind(&request.token)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await
        .map_err(AuthError::Database)?;

        let Some((token_id, user_id)) = row else {
            return Err(AuthError::InvalidResetToken);
        };

        let password_hash = hash_password(&request.new_password)
            .map_err(|e| AuthError::PasswordValidation(e.to_string()))?;

        let mut tx = self.db.begin().await.map_err(AuthError::Database)?;

        sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(user_id)
            .bind(&password_hash)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(AuthError::Database)?;

        sqlx::query("UPDATE password_reset_tokens SET used = TRUE WHERE id = $1")
            .bind(token_id)
            .execute(&mut *tx)
            .await
            .map_err(AuthError::Database)?;

        // A password reset invalidates every open session
        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(AuthError::Database)?;

        tx.commit().await.map_err(AuthError::Database)?;

        Ok(MessageResponse::ok("Password reset successfully"))
    }

    /// Change password for an authenticated user
    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<MessageResponse, AuthError> {
        let user = self
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password(&request.current_password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let password_hash = hash_password(&request.new_password)
            .map_err(|e| AuthError::PasswordValidation(e.to_string()))?;

        sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(user_id)
            .bind(&password_hash)
            .bind(Utc::now())
            .execute(&self.db)
            .await
            .map_err(AuthError::Database)?;

        Ok(MessageResponse::ok("Password changed successfully"))
    }

    /// Fetch the profile info for an authenticated user
    pub async fn me(&self, user_id: Uuid) -> Result<UserInfo, AuthError> {
        let user = self
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(UserInfo {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            created_at: user.created_at,
        })
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, full_name, phone, role, created_at, updated_at
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(AuthError::Database)
    }

    pub async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, full_name, phone, role, created_at, updated_at
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(AuthError::Database)
    }

    async fn store_refresh_token(&self, user_id: Uuid, token: &str) -> Result<(), AuthError> {
        let expires_at =
            Utc::now() + Duration::seconds(self.jwt_service.refresh_token_expires_in_seconds() as i64);

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, revoked, created_at)
             VALUES ($1, $2, $3, $4, FALSE, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(hash_token(token))
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(AuthError::Database)?;

        Ok(())
    }

    async fn is_refresh_token_valid(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<bool, AuthError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM refresh_tokens
             WHERE user_id = $1 AND token_hash = $2 AND revoked = FALSE AND expires_at > $3",
        )
        .bind(user_id)
        .bind(hash_token(token))
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await
        .map_err(AuthError::Database)?;

        Ok(row.is_some())
    }
}

/// Refresh tokens are stored hashed; the database never sees the plaintext
fn hash_token(token: &str) -> String {
    let digest = ring::digest::digest(&ring::digest::SHA256, token.as_bytes());
    hex::encode(digest.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_hash_is_stable_and_hex() {
        let a = hash_token("refresh-token");
        let b = hash_token("refresh-token");
        let c = hash_token("other-token");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }
}
