//! Accounts, sessions and the guest admin unlock.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use shared::{
    domain::UserSummary,
    error::{ApiError, ErrorCode},
    protocol::{AuthResponse, Credentials, MeResponse, ProfileUpdateRequest},
};
use storage::StoredSession;
use tracing::info;

use crate::{internal, ApiContext, Requester};

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::new(ErrorCode::Internal, format!("failed to hash password: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Creates an account and signs the requester in as that user.
pub async fn signup(
    ctx: &ApiContext,
    requester: &Requester,
    credentials: &Credentials,
) -> Result<(AuthResponse, StoredSession), ApiError> {
    let username = credentials.username.trim();
    if username.is_empty() || credentials.password.is_empty() {
        return Err(ApiError::validation("Username and password required"));
    }
    if ctx
        .storage
        .user_by_username(username)
        .await
        .map_err(internal)?
        .is_some()
    {
        return Err(ApiError::conflict("Username already exists"));
    }

    let password_hash = hash_password(&credentials.password)?;
    let user_id = ctx
        .storage
        .create_user(username, &password_hash)
        .await
        .map_err(internal)?;
    info!(user_id = user_id.0, "user registered");

    let session = bind_session(ctx, requester, Some(user_id)).await?;
    Ok((
        AuthResponse {
            message: "Registered successfully".into(),
            user: UserSummary {
                id: user_id,
                username: username.to_string(),
            },
        },
        session,
    ))
}

pub async fn login(
    ctx: &ApiContext,
    requester: &Requester,
    credentials: &Credentials,
) -> Result<(AuthResponse, StoredSession), ApiError> {
    let user = ctx
        .storage
        .user_by_username(credentials.username.trim())
        .await
        .map_err(internal)?
        .filter(|user| verify_password(&credentials.password, &user.password_hash))
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "Invalid credentials"))?;

    let session = bind_session(ctx, requester, Some(user.id)).await?;
    Ok((
        AuthResponse {
            message: "Login successful".into(),
            user: UserSummary {
                id: user.id,
                username: user.username,
            },
        },
        session,
    ))
}

pub async fn logout(ctx: &ApiContext, requester: &Requester) -> Result<(), ApiError> {
    let Some(session) = requester.session.as_ref().filter(|s| s.user_id.is_some()) else {
        return Err(ApiError::new(ErrorCode::Unauthorized, "Not logged in"));
    };
    ctx.storage
        .delete_session(&session.token)
        .await
        .map_err(internal)
}

pub async fn me(ctx: &ApiContext, requester: &Requester) -> Result<MeResponse, ApiError> {
    let user = match requester.user_id() {
        Some(user_id) => ctx.storage.user_by_id(user_id).await.map_err(internal)?,
        None => None,
    };
    Ok(MeResponse {
        authenticated: user.is_some(),
        user: user.map(|u| UserSummary {
            id: u.id,
            username: u.username,
        }),
        admin_mode: requester.is_admin_mode(),
    })
}

pub async fn update_profile(
    ctx: &ApiContext,
    requester: &Requester,
    request: &ProfileUpdateRequest,
) -> Result<AuthResponse, ApiError> {
    let user_id = requester
        .user_id()
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "Not logged in"))?;
    let Some(current_password) = request.current_password.as_deref().filter(|p| !p.is_empty())
    else {
        return Err(ApiError::validation("Current password is required"));
    };

    let user = ctx
        .storage
        .user_by_id(user_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "Not logged in"))?;
    if !verify_password(current_password, &user.password_hash) {
        return Err(ApiError::new(
            ErrorCode::Unauthorized,
            "Incorrect current password",
        ));
    }

    let new_username = request
        .username
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != user.username);
    if let Some(name) = new_username {
        if ctx
            .storage
            .user_by_username(name)
            .await
            .map_err(internal)?
            .is_some()
        {
            return Err(ApiError::conflict("Username already taken"));
        }
    }

    let new_hash = match request.new_password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    ctx.storage
        .update_user(user_id, new_username, new_hash.as_deref())
        .await
        .map_err(internal)?;

    Ok(AuthResponse {
        message: "Profile updated successfully".into(),
        user: UserSummary {
            id: user_id,
            username: new_username.unwrap_or(&user.username).to_string(),
        },
    })
}

/// Elevates the requester's session to admin mode when the password matches
/// the configured admin password. No account is created.
pub async fn verify_admin(
    ctx: &ApiContext,
    requester: &Requester,
    password: &str,
) -> Result<StoredSession, ApiError> {
    let Some(expected) = ctx.admin_password.as_deref() else {
        return Err(ApiError::forbidden("Admin mode is not configured"));
    };
    if password != expected {
        return Err(ApiError::new(ErrorCode::Unauthorized, "Incorrect password"));
    }

    let session = match &requester.session {
        Some(session) => {
            ctx.storage
                .update_session(&session.token, session.user_id, true)
                .await
                .map_err(internal)?;
            StoredSession {
                is_admin_mode: true,
                ..session.clone()
            }
        }
        None => ctx
            .storage
            .create_session(None, true)
            .await
            .map_err(internal)?,
    };
    info!("admin mode unlocked for session");
    Ok(session)
}

pub async fn exit_admin(ctx: &ApiContext, requester: &Requester) -> Result<(), ApiError> {
    if let Some(session) = &requester.session {
        ctx.storage
            .update_session(&session.token, session.user_id, false)
            .await
            .map_err(internal)?;
    }
    Ok(())
}

/// Issues a fresh token on every sign-in and revokes the caller's previous
/// one. An unlocked admin mode carries over.
async fn bind_session(
    ctx: &ApiContext,
    requester: &Requester,
    user_id: Option<shared::domain::UserId>,
) -> Result<StoredSession, ApiError> {
    let is_admin_mode = requester.is_admin_mode();
    if let Some(previous) = &requester.session {
        ctx.storage
            .delete_session(&previous.token)
            .await
            .map_err(internal)?;
    }
    ctx.storage
        .create_session(user_id, is_admin_mode)
        .await
        .map_err(internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UploadStore;
    use storage::Storage;

    async fn context(admin_password: Option<&str>) -> (ApiContext, tempfile::TempDir) {
        let uploads = tempfile::tempdir().expect("tempdir");
        let storage = Storage::new("sqlite::memory:").await.expect("db");
        let ctx = ApiContext {
            storage,
            uploads: UploadStore::new(uploads.path()),
            admin_password: admin_password.map(Into::into),
        };
        (ctx, uploads)
    }

    fn credentials(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    #[test]
    fn password_hashes_verify_only_their_password() {
        let hash = hash_password("hunter2").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn signup_then_login_binds_the_session() {
        let (ctx, _dir) = context(None).await;
        let (response, session) = signup(&ctx, &Requester::anonymous(), &credentials("alice", "pw"))
            .await
            .expect("signup");
        assert_eq!(response.user.username, "alice");
        assert_eq!(session.user_id, Some(response.user.id));

        let err = signup(&ctx, &Requester::anonymous(), &credentials("alice", "pw"))
            .await
            .expect_err("duplicate");
        assert_eq!(err.code, ErrorCode::Conflict);

        let err = login(&ctx, &Requester::anonymous(), &credentials("alice", "wrong"))
            .await
            .expect_err("bad password");
        assert_eq!(err.code, ErrorCode::Unauthorized);

        let (_, login_session) = login(&ctx, &Requester::anonymous(), &credentials("alice", "pw"))
            .await
            .expect("login");
        let requester = Requester::from_session(login_session);
        let status = me(&ctx, &requester).await.expect("me");
        assert!(status.authenticated);
        assert_eq!(status.user.map(|u| u.username).as_deref(), Some("alice"));
        assert!(!status.admin_mode);

        logout(&ctx, &requester).await.expect("logout");
        let token = requester.session.as_ref().map(|s| s.token.clone()).expect("token");
        assert!(ctx.storage.session(&token).await.expect("load").is_none());
    }

    #[tokio::test]
    async fn login_rotates_the_session_and_keeps_admin_mode() {
        let (ctx, _dir) = context(Some("secret")).await;
        signup(&ctx, &Requester::anonymous(), &credentials("bob", "pw"))
            .await
            .expect("signup");
        let admin = verify_admin(&ctx, &Requester::anonymous(), "secret")
            .await
            .expect("admin");

        let (_, session) = login(&ctx, &Requester::from_session(admin.clone()), &credentials("bob", "pw"))
            .await
            .expect("login");
        assert_ne!(session.token, admin.token);
        assert!(session.is_admin_mode);
        assert!(ctx.storage.session(&admin.token).await.expect("load").is_none());
        let stored = ctx
            .storage
            .session(&session.token)
            .await
            .expect("load")
            .expect("exists");
        assert!(stored.is_admin_mode);
        assert!(stored.user_id.is_some());
    }

    #[tokio::test]
    async fn signup_replaces_a_token_the_caller_already_held() {
        let (ctx, _dir) = context(None).await;
        let planted = ctx.storage.create_session(None, false).await.expect("session");

        let (_, session) = signup(
            &ctx,
            &Requester::from_session(planted.clone()),
            &credentials("alice", "pw"),
        )
        .await
        .expect("signup");
        assert_ne!(session.token, planted.token);
        assert!(!session.is_admin_mode);
        assert!(ctx.storage.session(&planted.token).await.expect("load").is_none());
    }

    #[tokio::test]
    async fn admin_unlock_checks_configured_password() {
        let (ctx, _dir) = context(Some("secret")).await;
        let err = verify_admin(&ctx, &Requester::anonymous(), "guess")
            .await
            .expect_err("wrong");
        assert_eq!(err.code, ErrorCode::Unauthorized);
        assert_eq!(err.message, "Incorrect password");

        let session = verify_admin(&ctx, &Requester::anonymous(), "secret")
            .await
            .expect("admin");
        assert!(session.is_admin_mode);
        assert_eq!(session.user_id, None);

        let requester = Requester::from_session(session.clone());
        exit_admin(&ctx, &requester).await.expect("exit");
        let stored = ctx
            .storage
            .session(&session.token)
            .await
            .expect("load")
            .expect("exists");
        assert!(!stored.is_admin_mode);

        let (unconfigured, _dir) = context(None).await;
        let err = verify_admin(&unconfigured, &Requester::anonymous(), "secret")
            .await
            .expect_err("unconfigured");
        assert_eq!(err.code, ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn profile_update_requires_current_password() {
        let (ctx, _dir) = context(None).await;
        signup(&ctx, &Requester::anonymous(), &credentials("carol", "old"))
            .await
            .expect("signup");
        signup(&ctx, &Requester::anonymous(), &credentials("dave", "pw"))
            .await
            .expect("signup");
        let (_, session) = login(&ctx, &Requester::anonymous(), &credentials("carol", "old"))
            .await
            .expect("login");
        let requester = Requester::from_session(session);

        let err = update_profile(
            &ctx,
            &requester,
            &ProfileUpdateRequest {
                username: Some("caroline".into()),
                new_password: None,
                current_password: Some("nope".into()),
            },
        )
        .await
        .expect_err("wrong password");
        assert_eq!(err.code, ErrorCode::Unauthorized);

        let err = update_profile(
            &ctx,
            &requester,
            &ProfileUpdateRequest {
                username: Some("dave".into()),
                new_password: None,
                current_password: Some("old".into()),
            },
        )
        .await
        .expect_err("taken");
        assert_eq!(err.code, ErrorCode::Conflict);

        let updated = update_profile(
            &ctx,
            &requester,
            &ProfileUpdateRequest {
                username: Some("caroline".into()),
                new_password: Some("new".into()),
                current_password: Some("old".into()),
            },
        )
        .await
        .expect("update");
        assert_eq!(updated.user.username, "caroline");

        login(&ctx, &Requester::anonymous(), &credentials("caroline", "new"))
            .await
            .expect("login with new credentials");
    }
}
