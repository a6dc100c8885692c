use crate::credentials::{Credentials, Identity};
use crate::database::{self, UserDb};
use crate::error::{Error, Result};
use crate::gate::ensure_role;
use crate::model::{Id, Role, User, UserProfile};
use chrono::Utc;
use log::{debug, info};
use serde::Deserialize;
use validator::{Validate, ValidationErrors};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAccount {
    #[validate(email(message = "Valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileChanges {
    pub name: Option<String>,
    #[validate(email(message = "Valid email is required"))]
    pub email: Option<String>,
}

/// A user together with a freshly issued token.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserProfile,
    pub token: String,
}

/// First failing field's message, email before password.
fn rejected(errors: ValidationErrors) -> Error {
    let fields = errors.field_errors();
    let message = ["email", "password"]
        .iter()
        .filter_map(|field| fields.get(*field))
        .flat_map(|errors| errors.iter())
        .find_map(|error| error.message.as_ref().map(|message| message.to_string()));
    match message {
        Some(message) => Error::InvalidInput(message),
        None => Error::invalid(&errors),
    }
}

pub struct Accounts<D> {
    db: D,
    credentials: Credentials,
}

impl<D: UserDb> Accounts<D> {
    pub fn new(db: D, credentials: Credentials) -> Self {
        Accounts { db, credentials }
    }

    fn session(&self, user: &User) -> Result<Session> {
        Ok(Session {
            user: user.into(),
            token: self.credentials.issue_token(&user.into())?,
        })
    }

    fn insert(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
        role: Role,
    ) -> Result<User> {
        let now = Utc::now();
        let user = User {
            id: 0,
            email: email.to_owned(),
            password_hash: self.credentials.hash_password(password)?,
            name,
            role,
            created_at: now,
            updated_at: now,
        };
        match self.db.add_user(user) {
            Ok(user) => Ok(user),
            Err(database::Error::UniqueViolation(_)) => Err(Error::EmailTaken),
            Err(err) => Err(err.into()),
        }
    }

    pub fn signup(&self, account: NewAccount) -> Result<Session> {
        account.validate().map_err(rejected)?;
        let user = self.insert(&account.email, &account.password, account.name, Role::User)?;
        info!("user {} signed up", user.id);
        self.session(&user)
    }

    /// Unknown email and wrong password fail the same way.
    pub fn login(&self, email: &str, password: &str) -> Result<Session> {
        if email.is_empty() || password.is_empty() {
            return Err(Error::invalid("Email and password are required"));
        }
        let user = match self.db.get_user_by_email(email)? {
            Some(user) => user,
            None => {
                debug!("login for unknown email");
                return Err(Error::InvalidCredentials);
            }
        };
        if !self.credentials.verify_password(password, &user.password_hash)? {
            debug!("wrong password for user {}", user.id);
            return Err(Error::InvalidCredentials);
        }
        self.session(&user)
    }

    pub fn profile(&self, user_id: Id) -> Result<UserProfile> {
        self.db
            .get_user(user_id)?
            .map(|user| UserProfile::from(&user))
            .ok_or(Error::UserNotFound(user_id))
    }

    pub fn update_profile(&self, user_id: Id, changes: ProfileChanges) -> Result<UserProfile> {
        changes.validate().map_err(rejected)?;
        let mut user = self
            .db
            .get_user(user_id)?
            .ok_or(Error::UserNotFound(user_id))?;
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(name) = changes.name {
            user.name = Some(name);
        }
        user.updated_at = Utc::now();
        match self.db.update_user(&user) {
            Ok(()) => {
                info!("user {} updated their profile", user_id);
                Ok(UserProfile::from(&user))
            }
            Err(database::Error::NotFound) => Err(Error::UserNotFound(user_id)),
            Err(database::Error::UniqueViolation(_)) => Err(Error::EmailTaken),
            Err(err) => Err(err.into()),
        }
    }

    /// Newest first. Admin only.
    pub fn list(&self, caller: &Identity) -> Result<Vec<UserProfile>> {
        ensure_role(caller, Role::Admin)?;
        let mut users = self.db.list_users()?;
        users.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(users.iter().map(UserProfile::from).collect())
    }

    /// Any account by id. Admin only.
    pub fn get(&self, caller: &Identity, user_id: Id) -> Result<UserProfile> {
        ensure_role(caller, Role::Admin)?;
        self.profile(user_id)
    }

    /// Returns the account registered under `email`, creating it as an admin first if
    /// needed. An existing account keeps its password and role.
    pub fn ensure_admin(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> Result<UserProfile> {
        if let Some(user) = self.db.get_user_by_email(email)? {
            return Ok(UserProfile::from(&user));
        }
        match self.insert(email, password, name, Role::Admin) {
            Ok(user) => {
                info!("admin account {} created", user.id);
                Ok(UserProfile::from(&user))
            }
            Err(Error::EmailTaken) => self
                .db
                .get_user_by_email(email)?
                .map(|user| UserProfile::from(&user))
                .ok_or_else(|| Error::internal(format_args!("user {:?} vanished", email))),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::tests::credentials;

    fn accounts() -> Accounts<sled::Db> {
        Accounts::new(
            sled::Config::new().temporary(true).open().unwrap(),
            credentials(),
        )
    }

    fn new_account(email: &str, password: &str) -> NewAccount {
        NewAccount {
            email: email.to_owned(),
            password: password.to_owned(),
            name: None,
        }
    }

    #[test]
    fn signup_then_login() {
        let accounts = accounts();
        let session = accounts
            .signup(NewAccount {
                name: Some("Alice".to_owned()),
                ..new_account("alice@example.com", "hunter22")
            })
            .unwrap();
        assert_eq!(session.user.role, Role::User);
        let identity = credentials().verify_token(&session.token).unwrap();
        assert_eq!(identity.id, session.user.id);

        let again = accounts.login("alice@example.com", "hunter22").unwrap();
        assert_eq!(again.user, session.user);
    }

    #[test]
    fn signup_validates_and_rejects_duplicates() {
        let accounts = accounts();
        for email in &["nope", "a@b..io", "a@-b.io", "\"@b.io", "a b@c.io", "a@b@c.io"] {
            match accounts.signup(new_account(email, "hunter22")) {
                Err(Error::InvalidInput(message)) => {
                    assert_eq!(message, "Valid email is required")
                }
                other => panic!("{:?} accepted: {:?}", email, other),
            }
        }
        match accounts.signup(new_account("alice@example.com", "short")) {
            Err(Error::InvalidInput(message)) => {
                assert_eq!(message, "Password must be at least 6 characters")
            }
            other => panic!("unexpected {:?}", other),
        }
        accounts.signup(new_account("alice@example.com", "hunter22")).unwrap();
        assert!(matches!(
            accounts.signup(new_account("alice@example.com", "other-password")),
            Err(Error::EmailTaken)
        ));
    }

    #[test]
    fn login_failures_look_alike() {
        let accounts = accounts();
        accounts.signup(new_account("alice@example.com", "hunter22")).unwrap();
        assert!(matches!(
            accounts.login("alice@example.com", "wrong!!"),
            Err(Error::InvalidCredentials)
        ));
        assert!(matches!(
            accounts.login("bob@example.com", "hunter22"),
            Err(Error::InvalidCredentials)
        ));
    }

    #[test]
    fn profile_updates() {
        let accounts = accounts();
        let alice = accounts
            .signup(new_account("alice@example.com", "hunter22"))
            .unwrap()
            .user;
        accounts.signup(new_account("bob@example.com", "hunter22")).unwrap();

        assert!(matches!(
            accounts.update_profile(
                alice.id,
                ProfileChanges {
                    email: Some("bob@example.com".to_owned()),
                    ..ProfileChanges::default()
                }
            ),
            Err(Error::EmailTaken)
        ));
        let updated = accounts
            .update_profile(
                alice.id,
                ProfileChanges {
                    name: Some("Alice".to_owned()),
                    ..ProfileChanges::default()
                },
            )
            .unwrap();
        assert_eq!(updated.email, "alice@example.com");
        assert!(matches!(
            accounts.update_profile(
                alice.id,
                ProfileChanges {
                    email: Some("alice@".to_owned()),
                    ..ProfileChanges::default()
                }
            ),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(updated.name.as_deref(), Some("Alice"));
        assert_eq!(accounts.profile(alice.id).unwrap(), updated);
        assert!(matches!(
            accounts.profile(9999),
            Err(Error::UserNotFound(9999))
        ));
    }

    #[test]
    fn ensure_admin_is_idempotent() {
        let accounts = accounts();
        let first = accounts
            .ensure_admin("admin@example.com", "admin123", None)
            .unwrap();
        let second = accounts
            .ensure_admin("admin@example.com", "different", None)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.role, Role::Admin);
        accounts.login("admin@example.com", "admin123").unwrap();
    }

    #[test]
    fn listing_users_is_admin_only() {
        let accounts = accounts();
        let admin = accounts
            .ensure_admin("admin@example.com", "admin123", None)
            .unwrap();
        let alice = accounts
            .signup(new_account("alice@example.com", "hunter22"))
            .unwrap()
            .user;
        assert!(matches!(
            accounts.list(&Identity::from(&alice)),
            Err(Error::Forbidden)
        ));
        let users = accounts.list(&Identity::from(&admin)).unwrap();
        assert_eq!(users, vec![alice, admin]);
    }

    #[test]
    fn getting_a_user_is_admin_only() {
        let accounts = accounts();
        let admin = accounts
            .ensure_admin("admin@example.com", "admin123", None)
            .unwrap();
        let alice = accounts
            .signup(new_account("alice@example.com", "hunter22"))
            .unwrap()
            .user;
        assert!(matches!(
            accounts.get(&Identity::from(&alice), admin.id),
            Err(Error::Forbidden)
        ));
        assert_eq!(accounts.get(&Identity::from(&admin), alice.id).unwrap(), alice);
        assert!(matches!(
            accounts.get(&Identity::from(&admin), 9999),
            Err(Error::UserNotFound(9999))
        ));
    }
}
