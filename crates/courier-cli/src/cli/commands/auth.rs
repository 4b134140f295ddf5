//! Session command handlers.

use anyhow::{Context as _, Result, bail};
use courier_core::session::redact_token;
use courier_types::LoginRequest;

use super::Context;

pub async fn login(ctx: &Context, email: String, password: String) -> Result<()> {
    let grant = ctx
        .client
        .login(&LoginRequest { email, password })
        .await
        .context("login failed")?;

    ctx.store()
        .save(grant.user_id, &grant.access_token, &grant.refresh_token)?;
    tracing::info!(user_id = grant.user_id, "Logged in");
    println!("Logged in as user {}", grant.user_id);
    Ok(())
}

pub fn logout(ctx: &Context) -> Result<()> {
    ctx.store().clear()?;
    println!("Logged out");
    Ok(())
}

pub fn status(ctx: &Context) {
    let state = ctx.store().snapshot();
    if !state.is_logged_in {
        println!("Not logged in");
        return;
    }

    if let Some(user_id) = state.user_id {
        println!("User:          {user_id}");
    }
    if let Some(token) = state.access_token.as_deref() {
        println!("Access token:  {}", redact_token(token));
    }
    match state.refresh_token.as_deref() {
        Some(token) => println!("Refresh token: {}", redact_token(token)),
        None => println!("Refresh token: (none)"),
    }
}

pub fn set_access(ctx: &Context, token: &str) -> Result<()> {
    ctx.store().update_access_token(token)?;
    println!("Access token updated");
    Ok(())
}

pub fn set_refresh(ctx: &Context, token: &str) -> Result<()> {
    ctx.store().update_refresh_token(token)?;
    println!("Refresh token updated");
    Ok(())
}

/// Trades the stored refresh token for a new pair and stores both.
pub async fn refresh(ctx: &Context) -> Result<()> {
    let Some(refresh_token) = ctx.store().refresh_token() else {
        bail!("No refresh token stored. Run `courier login` first.");
    };
    if !ctx.store().is_logged_in() {
        bail!("Not logged in. Run `courier login` first.");
    }

    let pair = ctx
        .client
        .refresh(&refresh_token)
        .await
        .context("token refresh failed")?;

    if !ctx.store().apply_refresh(&refresh_token, &pair)? {
        bail!("Session changed while refreshing; new tokens were discarded");
    }
    println!("Tokens refreshed");
    Ok(())
}
