use crate::cli::actions::{admin, auth, profile, tools, Action};
use anyhow::Result;

/// Execute the provided action.
// This is the single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::SignIn(args) => auth::sign_in(args).await,
        Action::SignUp(args) => auth::sign_up(args).await,
        Action::SignOut(globals) => auth::sign_out(&globals).await,
        Action::Status(globals) => auth::status(&globals).await,
        Action::Profile(args) => profile::update(args).await,
        Action::Password(args) => profile::change_password(args).await,
        Action::Tools(globals) => tools::list(&globals).await,
        Action::AdminUsers(args) => admin::list(args).await,
        Action::AdminUpdate(args) => admin::update(args).await,
        Action::AdminDelete(args) => admin::delete(args).await,
    }
}
