use chrono::Duration;
use serde_json::json;

use crate::auth::TokenAuthenticator;
use crate::cli::utils::{connect_store, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::models::UserInput;
use crate::database::Store;

pub async fn handle(username: &str, ttl_hours: Option<i64>, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let tokens = TokenAuthenticator::new(config.require_jwt_secret()?, config.security.jwt_expiry_hours)?;
    let store = connect_store(&config).await?;

    let username = UserInput::normalize_username(username)
        .map_err(|e| anyhow::anyhow!("Invalid telegram username '{}': {}", username, e))?;
    let user = store
        .find_user_by_username(&username)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User '{}' not found", username))?;

    let token = match ttl_hours {
        Some(hours) if hours > 0 => {
            tokens.issue_with_ttl(user.id, user.role, &user.telegram_username, Duration::hours(hours))?
        }
        Some(hours) => anyhow::bail!("--ttl-hours must be positive, got {hours}"),
        None => tokens.issue(&user)?,
    };

    match output_format {
        OutputFormat::Json => output_success(
            output_format,
            &format!("Token issued for {}", user.telegram_username),
            Some(json!({ "token": token, "user_id": user.id, "role": user.role })),
        ),
        OutputFormat::Text => {
            // Bare token on stdout so it can be captured by scripts
            println!("{}", token);
            Ok(())
        }
    }
}
