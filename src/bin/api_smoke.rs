//! Live smoke check against a configured deployment.
//!
//! Reads `ClientConfig` from the environment. With `SOCIAL_API_EMAIL` and
//! `SOCIAL_API_PASSWORD` set it logs in, resolves the identity, fetches the
//! profile and logs out again.

use std::env;

use anyhow::Context;
use social_api::{logging, ApiClient, ClientConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = ClientConfig::from_env();
    tracing::info!(base_url = %config.base_url, web_base_url = %config.web_base_url, "smoke config");
    let client = ApiClient::new(config).context("failed to build client")?;

    let (Ok(email), Ok(password)) = (
        env::var("SOCIAL_API_EMAIL"),
        env::var("SOCIAL_API_PASSWORD"),
    ) else {
        println!("Client initialized. Set credentials env vars to run live smoke.");
        println!("Required for live auth: SOCIAL_API_EMAIL and SOCIAL_API_PASSWORD");
        return Ok(());
    };

    let identity = client.login(&email, &password).await.context("login failed")?;
    println!(
        "logged in as {} (id {}{})",
        identity.username,
        identity.id,
        if identity.temporary { ", unresolved" } else { "" }
    );

    if !identity.temporary {
        let profile = client
            .user_profile(&identity.username)
            .await
            .context("profile fetch failed")?;
        println!(
            "profile: {} followers, {} following",
            profile.followers_count, profile.following_count
        );
    }

    client.logout().await.context("logout failed")?;
    println!("logged out");
    Ok(())
}
