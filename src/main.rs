use anyhow::{Context, Result};
use dialoguer::Password;
use reqwest::Method;

use fieldops_session::config::{Command, Config};
use fieldops_session::http_client::{RequestDescriptor, ResponseType};
use fieldops_session::SessionClient;

#[tokio::main]
async fn main() -> Result<()> {
    let (config, command) = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(
        base_url = %config.base_url,
        store = %config.store_file.display(),
        "Configuration loaded"
    );

    let client = SessionClient::from_config(config).await?;

    match command {
        Command::Login { username, password } => {
            let password = match password {
                Some(password) => password,
                None => Password::new()
                    .with_prompt(format!("Password for {}", username))
                    .interact()
                    .context("Failed to read password")?,
            };

            let creds = client.login(&username, &password).await?;
            println!("✅ Logged in as {}", username);
            println!("  Privileges:  {}", creds.privileges.join(", "));
        }

        Command::Logout => {
            client.logout().await?;
            println!("👋 Logged out");
        }

        Command::Status => print_status(&client).await,

        Command::Request {
            method,
            path,
            data,
            raw,
        } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .with_context(|| format!("Invalid HTTP method: {}", method))?;

            let mut request = RequestDescriptor::new(method, client.url(&path));
            if let Some(data) = data {
                let body: serde_json::Value =
                    serde_json::from_str(&data).context("--data must be valid JSON")?;
                request = request.json(body);
            }
            if raw {
                request = request.response_type(ResponseType::Text);
            }

            match client.request(request).await {
                Ok(response) => {
                    tracing::info!(status = response.status, "Request completed");
                    match &response.data {
                        serde_json::Value::String(text) if raw => println!("{}", text),
                        data => println!("{}", serde_json::to_string_pretty(data)?),
                    }
                }
                Err(e) if e.is_auth() => {
                    tracing::error!("❌ {}", e);
                    eprintln!("Session ended, run `fieldops-session login` to sign in again");
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

/// Print the stored session
async fn print_status(client: &SessionClient) {
    let creds = client.credentials().await;

    if !creds.is_authenticated() {
        println!("Not logged in");
        return;
    }

    let expires = creds
        .access_token
        .as_deref()
        .and_then(fieldops_session::auth::token::expires_at)
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());
    let expired = creds
        .access_token
        .as_deref()
        .map(|token| client.pipeline().tokens().is_expired(token))
        .unwrap_or(true);

    println!("  Logged in:   yes");
    println!("  Expires:     {}{}", expires, if expired { " (expired)" } else { "" });
    println!(
        "  Refresh:     {}",
        if creds.refresh_token.is_some() {
            "available"
        } else {
            "none"
        }
    );
    println!("  Privileges:  {}", creds.privileges.join(", "));
    if let Some(profile) = &creds.user_profile {
        println!(
            "  Profile:     {}",
            serde_json::to_string(profile).unwrap_or_default()
        );
    }
}
