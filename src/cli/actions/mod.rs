pub mod admin;
pub mod auth;
pub mod context;
pub mod profile;
pub mod tools;

// Internal "interpreter" for `Action`.
mod run;

use crate::cli::globals::GlobalArgs;

#[derive(Debug)]
pub enum Action {
    SignIn(auth::SignInArgs),
    SignUp(auth::SignUpArgs),
    SignOut(GlobalArgs),
    Status(GlobalArgs),
    Profile(profile::ProfileArgs),
    Password(profile::PasswordArgs),
    Tools(GlobalArgs),
    AdminUsers(admin::ListArgs),
    AdminUpdate(admin::UpdateArgs),
    AdminDelete(admin::DeleteArgs),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
