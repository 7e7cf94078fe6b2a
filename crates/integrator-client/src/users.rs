//! User management surface
//!
//! [`UserPanel`] tracks the listed users plus the last success message and the
//! last error message shown to the operator. Every failure ends up as a
//! readable string: the backend's `detail` when it sent one, a per-action
//! fallback otherwise.

use crate::api_client::ApiClient;
use async_trait::async_trait;
use integrator_core::error::SELF_DELETE_MESSAGE;
use integrator_core::{Error, NewUser, PasswordChange, Result, User, UserRef};
use parking_lot::Mutex;
use std::fmt;
use tracing::{info, warn};

/// Success message after creating a user
pub const USER_CREATED: &str = "User created successfully";
/// Success message after deleting a user
pub const USER_DELETED: &str = "User deleted successfully";
/// Success message after a password change
pub const PASSWORD_CHANGED: &str = "Password changed successfully";

const FETCH_USERS_FAILED: &str = "Failed to fetch users";
const CREATE_USER_FAILED: &str = "Failed to create user";
const DELETE_USER_REJECTED: &str = "Failed to delete user";
const DELETE_USER_FAILED: &str = "Error deleting user";
const CHANGE_PASSWORD_FAILED: &str = "Failed to change password";
const ADMIN_ONLY: &str = "Only administrators can manage users";

/// User endpoints the panel needs
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// All accounts
    async fn list_users(&self) -> Result<Vec<User>>;
    /// Create an account
    async fn create_user(&self, user: &NewUser) -> Result<()>;
    /// Delete an account
    async fn delete_user(&self, target: &UserRef) -> Result<()>;
    /// Change the caller's password
    async fn change_password(&self, change: &PasswordChange) -> Result<()>;
}

#[async_trait]
impl UserDirectory for ApiClient {
    async fn list_users(&self) -> Result<Vec<User>> {
        Self::list_users(self).await
    }

    async fn create_user(&self, user: &NewUser) -> Result<()> {
        Self::create_user(self, user).await
    }

    async fn delete_user(&self, target: &UserRef) -> Result<()> {
        Self::delete_user(self, target).await
    }

    async fn change_password(&self, change: &PasswordChange) -> Result<()> {
        Self::change_password(self, change).await
    }
}

#[derive(Debug, Default)]
struct PanelState {
    users: Vec<User>,
    message: Option<String>,
    error: Option<String>,
    pending_delete: Option<UserRef>,
    deleting: bool,
}

/// User list with operator feedback for one logged-in account
pub struct UserPanel<D> {
    directory: D,
    current: User,
    state: Mutex<PanelState>,
}

impl<D> fmt::Debug for UserPanel<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPanel")
            .field("current", &self.current.username)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl<D: UserDirectory> UserPanel<D> {
    /// Panel acting as `current`
    pub fn new(directory: D, current: User) -> Self {
        Self {
            directory,
            current,
            state: Mutex::new(PanelState::default()),
        }
    }

    /// Account the panel acts as
    pub const fn current_user(&self) -> &User {
        &self.current
    }

    /// Users from the last refresh, minus local deletions
    pub fn users(&self) -> Vec<User> {
        self.state.lock().users.clone()
    }

    /// Last success message
    pub fn message(&self) -> Option<String> {
        self.state.lock().message.clone()
    }

    /// Last error message
    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    /// User awaiting delete confirmation
    pub fn pending_delete(&self) -> Option<UserRef> {
        self.state.lock().pending_delete.clone()
    }

    /// Whether a delete request is running
    pub fn is_deleting(&self) -> bool {
        self.state.lock().deleting
    }

    /// Reload the user list
    ///
    /// # Errors
    ///
    /// [`Error::Authorization`] for non-admins, or the directory's error.
    pub async fn refresh(&self) -> Result<()> {
        self.require_admin()?;
        match self.directory.list_users().await {
            Ok(users) => {
                self.state.lock().users = users;
                Ok(())
            }
            Err(e) => Err(self.fail(e, FETCH_USERS_FAILED)),
        }
    }

    /// Create a user, then reload the list
    ///
    /// A failed reload after a successful create keeps the success message and
    /// only records the fetch error; the call still succeeds.
    ///
    /// # Errors
    ///
    /// [`Error::Authorization`] for non-admins, [`Error::Validation`] for an
    /// incomplete form, or the directory's error from the create itself.
    pub async fn create_user(&self, user: &NewUser) -> Result<()> {
        self.require_admin()?;
        if let Err(e) = self.directory.create_user(user).await {
            return Err(self.fail(e, CREATE_USER_FAILED));
        }
        info!(username = %user.username, "user created");
        self.succeed(USER_CREATED);

        match self.directory.list_users().await {
            Ok(users) => {
                self.state.lock().users = users;
            }
            Err(e) => self.record_error(&e, FETCH_USERS_FAILED),
        }
        Ok(())
    }

    /// Ask for confirmation before deleting `target`
    ///
    /// # Errors
    ///
    /// [`Error::Authorization`] for non-admins, or [`Error::SelfAction`] when
    /// `target` is the current account.
    pub fn request_delete(&self, target: UserRef) -> Result<()> {
        self.require_admin()?;
        self.reject_self(&target)?;
        let mut state = self.state.lock();
        state.error = None;
        state.pending_delete = Some(target);
        Ok(())
    }

    /// Drop the pending deletion
    pub fn cancel_delete(&self) {
        self.state.lock().pending_delete = None;
    }

    /// Delete the pending user and remove it from the local list
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] while another delete runs
    /// - [`Error::NotFound`] when nothing is pending
    /// - [`Error::SelfAction`] when the target is the current account
    /// - the directory's error
    pub async fn confirm_delete(&self) -> Result<UserRef> {
        let target = {
            let mut state = self.state.lock();
            if state.deleting {
                return Err(Error::busy("user deletion"));
            }
            let target = state
                .pending_delete
                .take()
                .ok_or_else(|| Error::not_found("pending user deletion"))?;
            state.deleting = true;
            target
        };
        let _deleting = DeletingGuard(&self.state);

        self.reject_self(&target)?;

        match self.directory.delete_user(&target).await {
            Ok(()) => {
                self.state.lock().users.retain(|u| !u.matches(&target));
                info!(user = %target, "user deleted");
                self.succeed(USER_DELETED);
                Ok(target)
            }
            Err(e) => {
                let fallback = if matches!(e, Error::Api { .. }) {
                    DELETE_USER_REJECTED
                } else {
                    DELETE_USER_FAILED
                };
                Err(self.fail(e, fallback))
            }
        }
    }

    /// Change the current account's password
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for empty fields, or the directory's error.
    pub async fn change_password(&self, change: &PasswordChange) -> Result<()> {
        match self.directory.change_password(change).await {
            Ok(()) => {
                self.succeed(PASSWORD_CHANGED);
                Ok(())
            }
            Err(e) => Err(self.fail(e, CHANGE_PASSWORD_FAILED)),
        }
    }

    fn require_admin(&self) -> Result<()> {
        if self.current.is_admin {
            Ok(())
        } else {
            Err(self.fail(Error::Authorization(ADMIN_ONLY.to_string()), ADMIN_ONLY))
        }
    }

    /// `target` may be an id the current account object lacks; resolve it
    /// through the listed users before comparing.
    fn reject_self(&self, target: &UserRef) -> Result<()> {
        let is_self = self.current.matches(target)
            || self
                .state
                .lock()
                .users
                .iter()
                .any(|u| u.matches(target) && u.email.eq_ignore_ascii_case(&self.current.email));
        if is_self {
            Err(self.fail(Error::SelfAction(SELF_DELETE_MESSAGE.to_string()), SELF_DELETE_MESSAGE))
        } else {
            Ok(())
        }
    }

    fn succeed(&self, message: &str) {
        let mut state = self.state.lock();
        state.message = Some(message.to_string());
        state.error = None;
    }

    fn fail(&self, error: Error, fallback: &str) -> Error {
        self.record_error(&error, fallback);
        self.state.lock().message = None;
        error
    }

    fn record_error(&self, error: &Error, fallback: &str) {
        let shown = error.user_message(fallback);
        warn!(error = %error, shown = %shown, "user action failed");
        self.state.lock().error = Some(shown);
    }
}

struct DeletingGuard<'a>(&'a Mutex<PanelState>);

impl Drop for DeletingGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().deleting = false;
    }
}
