use crate::{
    cli::{
        actions::context::{print_json, Session},
        globals::GlobalArgs,
    },
    gateway::client,
};
use anyhow::{Context, Result};

/// # Errors
/// Returns an error if nobody is signed in or the backend call fails.
pub async fn list(globals: &GlobalArgs) -> Result<()> {
    let session = Session::open(globals).await?;
    let result = match session.require_identity() {
        Ok(_) => client::list_tools(session.gateway.as_ref())
            .await
            .context("Failed to load tools"),
        Err(err) => Err(err),
    };
    session.close();
    print_json(&result?)
}
