use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{connect_store, output_empty_collection, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::models::{Role, UserInput};
use crate::database::{DatabaseError, Store};

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "List all users")]
    List,

    #[command(about = "Create a user")]
    Create {
        #[arg(help = "Telegram username (leading @ optional)")]
        username: String,
        #[arg(long, default_value = "user", help = "Role: admin or user")]
        role: String,
        #[arg(long, help = "Full name")]
        full_name: Option<String>,
        #[arg(long, help = "Phone number")]
        phone: Option<String>,
    },
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let store = connect_store(&config).await?;

    match cmd {
        UserCommands::List => {
            let users = store.list_users().await?;
            if users.is_empty() {
                return output_empty_collection(output_format, "users", "No users");
            }

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "users": users }))?);
                }
                OutputFormat::Text => {
                    println!("{:<6} {:<24} {:<6} {}", "ID", "USERNAME", "ROLE", "FULL NAME");
                    println!("{}", "-".repeat(60));
                    for user in &users {
                        println!(
                            "{:<6} {:<24} {:<6} {}",
                            user.id,
                            user.telegram_username,
                            user.role,
                            user.full_name.as_deref().unwrap_or("")
                        );
                    }
                }
            }
            Ok(())
        }
        UserCommands::Create {
            username,
            role,
            full_name,
            phone,
        } => {
            let username = UserInput::normalize_username(&username)
                .map_err(|e| anyhow::anyhow!("Invalid telegram username '{}': {}", username, e))?;
            let role: Role = role.parse()?;

            let input = UserInput {
                telegram_username: username.clone(),
                full_name,
                phone,
                role,
                additional_info: None,
            };

            let user = match store.create_user(&input).await {
                Ok(user) => user,
                Err(DatabaseError::UniqueViolation(_)) => anyhow::bail!("User '{}' already exists", username),
                Err(e) => return Err(e.into()),
            };

            output_success(
                output_format,
                &format!("Created {} '{}' (id {})", user.role, user.telegram_username, user.id),
                Some(json!({ "user": user })),
            )
        }
    }
}
