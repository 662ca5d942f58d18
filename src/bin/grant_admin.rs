//! Выдает или снимает флаг администратора. Флаг попадает в токен при
//! следующем входе пользователя.

use anyhow::Context;
use clap::Parser;
use malling_bio::{config::Config, open_store, services::auth::AuthService};

#[derive(Debug, Parser)]
#[command(name = "grant-admin", about = "Grant or revoke the admin claim of a user")]
struct Args {
    /// Email of the account
    #[arg(long)]
    email: String,

    /// PostgreSQL connection string (overrides configuration)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Remove the claim instead of granting it
    #[arg(long)]
    revoke: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter("malling_bio=info")
        .init();

    let args = Args::parse();
    let mut config = Config::load().context("invalid configuration")?;
    if args.database_url.is_some() {
        config.database.url = args.database_url;
    }

    let store = open_store(&config).await?;
    let auth = AuthService::new(store, None, &config.jwt);

    let user = auth
        .set_admin(&args.email, !args.revoke)
        .await
        .with_context(|| format!("failed to update {}", args.email))?;

    if user.is_admin {
        println!("{} is now an administrator", user.email);
    } else {
        println!("{} is no longer an administrator", user.email);
    }
    Ok(())
}
