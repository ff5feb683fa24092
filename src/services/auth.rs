use crate::crypto::password::{hash_password, verify_password};
use crate::error::{AppError, Result};
use crate::models::user::{NewUser, Role, User};
use crate::repositories::user::UserStore;
use crate::services::qr::{QrArtifact, QrService};
use crate::validation::auth::RegistrationForm;

/// The outcome of a committed registration.
#[derive(Debug)]
pub struct Registered {
    pub user: User,
    /// The QR code issued for a student; teachers get none.
    pub qr: Option<QrArtifact>,
}

/// Registers a user from an already validated form.
///
/// Students get their QR code issued before this returns, with the username
/// used as both student id and name. The image is encoded before the user is
/// inserted.
///
/// # Returns
///
/// A `Result` containing the committed user, or `AppError::DuplicateUsername`
/// if the username is taken.
pub async fn register(
    users: &dyn UserStore,
    qr: &QrService,
    form: &RegistrationForm,
) -> Result<Registered> {
    tracing::debug!("🔐 Creating user: {}", form.username);
    let role = form.role();
    let rendered = match role {
        Role::Student => Some(qr.render(&form.username, &form.username)?),
        Role::Teacher => None,
    };
    let password_hash = hash_password(&form.password)?;

    let user = users
        .insert_if_absent(NewUser {
            username: form.username.clone(),
            password_hash,
            role,
        })
        .await?
        .ok_or_else(|| {
            tracing::info!("❌ Username already exists: {}", form.username);
            AppError::DuplicateUsername(form.username.clone())
        })?;

    tracing::info!("✅ User created: {} ({})", user.username, user.role);

    // A failed write leaves the user committed; the student's QR page
    // issues the image again.
    let qr = match rendered {
        Some(rendered) => Some(qr.store(rendered).await?),
        None => None,
    };

    Ok(Registered { user, qr })
}

/// Authenticates a user.
///
/// Unknown usernames and wrong passwords produce the same error.
pub async fn authenticate(users: &dyn UserStore, username: &str, password: &str) -> Result<User> {
    tracing::debug!("🔐 Authenticating user: {}", username);

    let user = users
        .find_by_username(username)
        .await?
        .ok_or_else(|| AppError::Authentication("Invalid username or password!".to_string()))?;

    if !verify_password(password, &user.password_hash)? {
        return Err(AppError::Authentication(
            "Invalid username or password!".to_string(),
        ));
    }

    tracing::info!("✅ User authenticated: {}", user.username);

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::user::MemoryUserStore;

    fn form(username: &str, password: &str, role: &str) -> RegistrationForm {
        RegistrationForm {
            username: username.to_string(),
            password: password.to_string(),
            confirm_password: password.to_string(),
            role: role.to_string(),
            csrf_token: String::new(),
        }
    }

    #[tokio::test]
    async fn test_student_registration_issues_qr() {
        let dir = tempfile::tempdir().unwrap();
        let users = MemoryUserStore::new();
        let qr = QrService::new(dir.path());

        let registered = register(&users, &qr, &form("alice", "pw", "student")).await.unwrap();
        assert_eq!(registered.user.role, Role::Student);
        let artifact = registered.qr.expect("students get a QR code");
        assert_eq!(artifact.url, "/qr_codes/alice.png");
        assert!(artifact.path.exists());
    }

    #[tokio::test]
    async fn test_teacher_registration_has_no_qr() {
        let dir = tempfile::tempdir().unwrap();
        let users = MemoryUserStore::new();
        let qr = QrService::new(dir.path());

        let registered = register(&users, &qr, &form("bob", "pw", "teacher")).await.unwrap();
        assert!(registered.qr.is_none());
        assert!(!dir.path().join("bob.png").exists());
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let users = MemoryUserStore::new();
        let qr = QrService::new(dir.path());

        register(&users, &qr, &form("alice", "first", "student")).await.unwrap();
        let err = register(&users, &qr, &form("alice", "second", "teacher"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateUsername(ref name) if name == "alice"));

        let user = authenticate(&users, "alice", "first").await.unwrap();
        assert_eq!(user.role, Role::Student);
    }

    #[tokio::test]
    async fn test_unencodable_student_is_not_committed() {
        let dir = tempfile::tempdir().unwrap();
        let users = MemoryUserStore::new();
        let qr = QrService::new(dir.path());

        assert!(register(&users, &qr, &form("bad/id", "pw", "student")).await.is_err());
        assert!(users.find_by_username("bad/id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_qr_write_recovers_on_reissue() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("qr_codes");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let users = MemoryUserStore::new();
        let qr = QrService::new(&blocker);

        let err = register(&users, &qr, &form("alice", "pw", "student")).await.unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
        assert!(users.find_by_username("alice").await.unwrap().is_some());

        std::fs::remove_file(&blocker).unwrap();
        let artifact = qr.ensure("alice", "alice").await.unwrap();
        assert_eq!(artifact.url, "/qr_codes/alice.png");
        assert!(artifact.path.exists());
    }

    #[tokio::test]
    async fn test_authenticate_rejects_bad_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let users = MemoryUserStore::new();
        let qr = QrService::new(dir.path());
        register(&users, &qr, &form("bob", "secret", "teacher")).await.unwrap();

        assert!(matches!(
            authenticate(&users, "bob", "wrong").await,
            Err(AppError::Authentication(_))
        ));
        assert!(matches!(
            authenticate(&users, "nobody", "secret").await,
            Err(AppError::Authentication(_))
        ));
        assert_eq!(authenticate(&users, "bob", "secret").await.unwrap().username, "bob");
    }
}
