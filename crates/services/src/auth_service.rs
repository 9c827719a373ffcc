use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use exam_api::AuthApi;
use exam_core::model::{Credentials, NewUser, User};

use crate::error::AuthError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Account handling: login, registration, token verification.
///
/// The bearer token itself lives inside the API adapter; this service only
/// tracks who is currently signed in.
pub struct AuthService {
    api: Arc<dyn AuthApi>,
    current: Mutex<Option<User>>,
}

impl AuthService {
    #[must_use]
    pub fn new(api: Arc<dyn AuthApi>) -> Self {
        Self {
            api,
            current: Mutex::new(None),
        }
    }

    /// Exchange credentials for a session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for a rejected login.
    pub async fn login(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let session = self.api.login(credentials).await?;
        *lock(&self.current) = Some(session.user.clone());
        Ok(session.user)
    }

    /// Create an account. The caller still has to log in afterwards.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Api` if the backend rejects the registration.
    pub async fn register(&self, new_user: &NewUser) -> Result<(), AuthError> {
        Ok(self.api.register(new_user).await?)
    }

    /// Re-validate a previously installed token, restoring the signed-in
    /// user on success.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotLoggedIn` when the token is missing or stale.
    pub async fn verify(&self) -> Result<User, AuthError> {
        match self.api.verify().await {
            Ok(user) => {
                *lock(&self.current) = Some(user.clone());
                Ok(user)
            }
            Err(err) => {
                *lock(&self.current) = None;
                self.api.logout();
                match err {
                    exam_api::ApiError::Unauthorized => Err(AuthError::NotLoggedIn),
                    other => Err(AuthError::Api(other)),
                }
            }
        }
    }

    pub fn logout(&self) {
        *lock(&self.current) = None;
        self.api.logout();
    }

    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        lock(&self.current).clone()
    }
}
