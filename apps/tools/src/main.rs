use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use server_api::auth::hash_password;
use shared::domain::UserId;
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/repertoire.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateUser {
        username: String,
        password: String,
    },
    ListUsers,
    /// Lists one user's openings, or the public ones without `--user-id`.
    ListOpenings {
        #[arg(long)]
        user_id: Option<i64>,
        #[arg(long)]
        favorites: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateUser { username, password } => {
            let username = username.trim();
            if username.is_empty() || password.is_empty() {
                bail!("username and password are required");
            }
            if storage.user_by_username(username).await?.is_some() {
                bail!("username '{username}' already exists");
            }
            let user_id = storage
                .create_user(username, &hash_password(&password)?)
                .await?;
            println!("created user_id={}", user_id.0);
        }
        Command::ListUsers => {
            for (user_id, username) in storage.list_users().await? {
                println!("{user_id}\t{username}");
            }
        }
        Command::ListOpenings { user_id, favorites } => {
            let openings = storage
                .list_openings(user_id.map(UserId), favorites)
                .await?;
            for opening in openings {
                let favorite = if opening.is_favorite { "*" } else { "" };
                println!(
                    "{}\t{}\t{}{favorite}\t{} variations",
                    opening.id,
                    opening.side,
                    opening.name,
                    opening.variations.len()
                );
            }
        }
    }

    Ok(())
}
