use crate::client::api::{ApiClient, ClientError};
use crate::handlers::auth::AuthToken;
use crate::models::User;
use crate::users::{LoginUser, RegisterUser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Anonymous,
    Authenticating,
    Authenticated,
}

pub struct AuthStore {
    api: ApiClient,
    pub user: Option<User>,
    pub status: AuthStatus,
    pub loading: bool,
    pub error: Option<String>,
}

impl AuthStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            user: None,
            status: AuthStatus::Anonymous,
            loading: false,
            error: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated && self.api.session().has_token()
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<(), ClientError> {
        let body = LoginUser {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        };
        self.begin();
        let result = self.api.post::<_, AuthToken>("/login", &body).await;
        self.finish(result, "Login failed")
    }

    pub async fn register(&mut self, name: &str, email: &str, password: &str) -> Result<(), ClientError> {
        let body = RegisterUser {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        };
        self.begin();
        let result = self.api.post::<_, AuthToken>("/register", &body).await;
        self.finish(result, "Registration failed")
    }

    /// Restores the user from a persisted token, e.g. on startup.
    pub async fn fetch_user(&mut self) -> Result<(), ClientError> {
        if !self.api.session().has_token() {
            self.reset();
            return Ok(());
        }

        self.loading = true;
        self.error = None;
        let result = self.api.get::<User>("/user", &[]).await;
        self.loading = false;

        match result {
            Ok(user) => {
                self.user = Some(user);
                self.status = AuthStatus::Authenticated;
                Ok(())
            }
            Err(err) => {
                self.error = Some(err.message_or("Session expired"));
                self.reset();
                Err(err)
            }
        }
    }

    /// Local state is cleared even when the server call fails.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        self.loading = true;
        let result = self.api.post_empty("/logout").await;
        self.loading = false;

        if let Err(err) = &result {
            tracing::warn!(error = %err, "Logout request failed, clearing local session anyway");
        }
        self.api.session().clear()?;
        self.reset();
        result
    }

    fn begin(&mut self) {
        self.loading = true;
        self.error = None;
        self.status = AuthStatus::Authenticating;
    }

    fn finish(&mut self, result: Result<AuthToken, ClientError>, fallback: &str) -> Result<(), ClientError> {
        self.loading = false;
        let outcome = result.and_then(|auth| {
            self.api.session().set_token(&auth.token)?;
            Ok(auth.user)
        });

        match outcome {
            Ok(user) => {
                self.user = Some(user);
                self.status = AuthStatus::Authenticated;
                Ok(())
            }
            Err(err) => {
                self.error = Some(err.message_or(fallback));
                self.user = None;
                self.status = AuthStatus::Anonymous;
                Err(err)
            }
        }
    }

    fn reset(&mut self) {
        self.user = None;
        self.status = AuthStatus::Anonymous;
    }
}
