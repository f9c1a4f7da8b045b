mod render;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    ActionOutcome, DragItem, HttpRepertoireApi, RepertoireApi, RepertoireController, ViewMode,
    ViewerMode,
};
use shared::{
    domain::{OpeningId, Side, VariationId},
    protocol::{Credentials, ImageUpload, VariationForm},
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "repertoire", about = "Manage a chess opening repertoire")]
struct Cli {
    #[arg(long, global = true, default_value = "http://127.0.0.1:5000")]
    server_url: String,
    /// Sign in and work on your own repertoire instead of the public one.
    #[arg(long, global = true)]
    username: Option<String>,
    #[arg(long, global = true)]
    password: Option<String>,
    /// Unlocks edits to the public repertoire.
    #[arg(long, global = true)]
    admin_password: Option<String>,
    /// Skip delete confirmations.
    #[arg(long, short = 'y', global = true)]
    yes: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print openings and their variations.
    List {
        #[arg(long)]
        side: Option<Side>,
        #[arg(long)]
        favorites: bool,
    },
    /// Create an opening, or add a variation to an existing one.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        side: Side,
        #[arg(long)]
        moves: String,
        #[arg(long)]
        variation_name: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long = "tutorial")]
        tutorials: Vec<String>,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Replace a variation's moves, notes, tutorials or image.
    Edit {
        variation_id: i64,
        #[arg(long)]
        moves: String,
        #[arg(long)]
        variation_name: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long = "tutorial")]
        tutorials: Vec<String>,
        #[arg(long, conflicts_with = "delete_image")]
        image: Option<PathBuf>,
        #[arg(long)]
        delete_image: bool,
    },
    Rename {
        opening_id: i64,
        name: String,
    },
    /// Delete openings and variations; a single id is deleted directly,
    /// several go through one batch request.
    Delete {
        #[arg(long = "opening")]
        openings: Vec<i64>,
        #[arg(long = "variation")]
        variations: Vec<i64>,
    },
    Favorite {
        opening_id: i64,
    },
    /// Move an opening into the slot of another opening of the same side.
    MoveOpening {
        opening_id: i64,
        #[arg(long)]
        to: i64,
    },
    /// Move a variation into the slot of a sibling variation.
    MoveVariation {
        variation_id: i64,
        #[arg(long)]
        to: i64,
    },
    /// Copy public openings into your repertoire.
    Import {
        #[arg(required = true)]
        opening_ids: Vec<i64>,
    },
    Signup,
    Whoami,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let cli = Cli::parse();

    let api = HttpRepertoireApi::new(cli.server_url.clone())?;
    let viewer = sign_in(&api, &cli).await?;
    debug!(?viewer, server = api.server_url(), "connected");

    if let Command::Whoami = cli.command {
        let me = api.me().await?;
        match me.user {
            Some(user) => println!("signed in as {} (id {})", user.username, user.id),
            None => println!("not signed in"),
        }
        if me.admin_mode {
            println!("admin mode is active");
        }
        return Ok(());
    }
    if let Command::Signup = cli.command {
        return Ok(());
    }

    let mut controller = RepertoireController::new(api, viewer);
    controller.refresh().await;
    run(&mut controller, &cli).await
}

async fn sign_in(api: &HttpRepertoireApi, cli: &Cli) -> Result<ViewerMode> {
    let Some(username) = cli.username.clone() else {
        if let Command::Signup = cli.command {
            bail!("signup needs --username and --password");
        }
        return Ok(ViewerMode::Guest {
            admin_unlocked: false,
        });
    };
    let password = cli
        .password
        .clone()
        .ok_or_else(|| anyhow!("--password is required with --username"))?;
    let credentials = Credentials { username, password };

    let response = if let Command::Signup = cli.command {
        api.signup(&credentials).await?
    } else {
        api.login(&credentials).await?
    };
    println!("{}", response.message);
    Ok(ViewerMode::Owner)
}

async fn run<A: RepertoireApi>(controller: &mut RepertoireController<A>, cli: &Cli) -> Result<()> {
    let admin_password = cli.admin_password.as_deref();
    match &cli.command {
        Command::List { side, favorites } => {
            if let Some(side) = side {
                controller.set_view_mode(ViewMode::Single(*side));
            }
            controller.set_favorites_only(*favorites).await;
            for side in controller.visible_sides() {
                print!(
                    "{}",
                    render::side_outline(side, &controller.openings_for_side(side))
                );
            }
        }
        Command::Add {
            name,
            side,
            moves,
            variation_name,
            notes,
            tutorials,
            image,
        } => {
            let form = VariationForm {
                name: Some(name.clone()),
                side: Some(*side),
                moves: moves.clone(),
                notes: notes.clone(),
                variation_name: variation_name.clone(),
                tutorials: tutorials.clone(),
                image: load_image(image.as_deref()).await?,
                delete_image: false,
            };
            let outcome = controller.submit_new_opening(form).await;
            settle(controller, outcome, admin_password).await?;
            println!("saved");
        }
        Command::Edit {
            variation_id,
            moves,
            variation_name,
            notes,
            tutorials,
            image,
            delete_image,
        } => {
            let form = VariationForm {
                name: None,
                side: None,
                moves: moves.clone(),
                notes: notes.clone(),
                variation_name: variation_name.clone(),
                tutorials: tutorials.clone(),
                image: load_image(image.as_deref()).await?,
                delete_image: *delete_image,
            };
            let outcome = controller
                .submit_variation_edit(VariationId(*variation_id), form)
                .await;
            settle(controller, outcome, admin_password).await?;
            println!("updated variation {variation_id}");
        }
        Command::Rename { opening_id, name } => {
            let outcome = controller.rename_opening(OpeningId(*opening_id), name).await;
            settle(controller, outcome, admin_password).await?;
            println!("renamed opening {opening_id}");
        }
        Command::Delete {
            openings,
            variations,
        } => {
            let outcome = request_delete(controller, openings, variations)?;
            let outcome = settle(controller, outcome, admin_password).await?;
            if outcome == ActionOutcome::AwaitingConfirmation {
                if !cli.yes && !confirm("Delete the selected items?").await? {
                    controller.cancel_delete();
                    println!("cancelled");
                    return Ok(());
                }
                let outcome = controller.confirm_delete().await;
                settle(controller, outcome, admin_password).await?;
            }
            println!("deleted");
        }
        Command::Favorite { opening_id } => {
            let opening_id = OpeningId(*opening_id);
            let outcome = controller.toggle_favorite(opening_id).await;
            settle(controller, outcome, admin_password).await?;
            let is_favorite = controller.opening(opening_id).is_some_and(|o| o.is_favorite);
            println!(
                "opening {opening_id} is {}a favorite",
                if is_favorite { "now " } else { "no longer " }
            );
        }
        Command::MoveOpening { opening_id, to } => {
            let dragged = DragItem::Opening(OpeningId(*opening_id));
            let target = DragItem::Opening(OpeningId(*to));
            drag_and_drop(controller, dragged, target, admin_password).await?;
            println!("moved opening {opening_id}");
        }
        Command::MoveVariation { variation_id, to } => {
            let variation_id = VariationId(*variation_id);
            let opening_id = controller
                .openings()
                .iter()
                .find(|o| o.variation(variation_id).is_some())
                .map(|o| o.id)
                .ok_or_else(|| anyhow!("variation {variation_id} not found"))?;
            let dragged = DragItem::Variation {
                id: variation_id,
                opening_id,
            };
            let target = DragItem::Variation {
                id: VariationId(*to),
                opening_id,
            };
            drag_and_drop(controller, dragged, target, admin_password).await?;
            println!("moved variation {variation_id}");
        }
        Command::Import { opening_ids } => {
            let ids: Vec<OpeningId> = opening_ids.iter().copied().map(OpeningId).collect();
            let outcome = controller.import_public(&ids).await;
            settle(controller, outcome, admin_password).await?;
            if let Some(notice) = controller.notice() {
                println!("{notice}");
            }
        }
        Command::Signup | Command::Whoami => {}
    }
    Ok(())
}

fn request_delete<A: RepertoireApi>(
    controller: &mut RepertoireController<A>,
    openings: &[i64],
    variations: &[i64],
) -> Result<ActionOutcome> {
    match (openings, variations) {
        ([], []) => bail!("nothing to delete; pass --opening or --variation"),
        ([opening_id], []) => Ok(controller.request_delete_opening(OpeningId(*opening_id))),
        ([], [variation_id]) => Ok(controller.request_delete_variation(VariationId(*variation_id))),
        _ => {
            controller.enter_selection_mode();
            for opening_id in openings {
                controller.toggle_group_selection(OpeningId(*opening_id));
            }
            for variation_id in variations {
                controller.toggle_item_selection(VariationId(*variation_id));
            }
            Ok(controller.request_batch_delete())
        }
    }
}

async fn drag_and_drop<A: RepertoireApi>(
    controller: &mut RepertoireController<A>,
    dragged: DragItem,
    target: DragItem,
    admin_password: Option<&str>,
) -> Result<()> {
    if !controller.can_mutate() {
        let password =
            admin_password.ok_or_else(|| anyhow!("moving public openings needs --admin-password"))?;
        let outcome = controller.unlock_admin(password).await;
        settle(controller, outcome, None).await?;
    }
    if !controller.begin_drag(dragged) {
        bail!("cannot start moving this item");
    }
    let outcome = controller.drop_on(target).await;
    if outcome == ActionOutcome::Ignored {
        bail!("items can only move within the same side or opening");
    }
    settle(controller, outcome, admin_password).await?;
    Ok(())
}

/// Resolves the admin prompt if needed and turns a rejection into an error.
async fn settle<A: RepertoireApi>(
    controller: &mut RepertoireController<A>,
    outcome: ActionOutcome,
    admin_password: Option<&str>,
) -> Result<ActionOutcome> {
    let outcome = match outcome {
        ActionOutcome::AdminPasswordRequired => {
            let password = admin_password
                .ok_or_else(|| anyhow!("editing the public repertoire needs --admin-password"))?;
            controller.unlock_admin(password).await
        }
        other => other,
    };
    if outcome == ActionOutcome::Rejected {
        let message = controller
            .banner()
            .map(|banner| banner.message().to_string())
            .unwrap_or_else(|| "request was rejected".to_string());
        bail!(message);
    }
    Ok(outcome)
}

async fn load_image(path: Option<&Path>) -> Result<Option<ImageUpload>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read image '{}'", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("image path '{}' has no file name", path.display()))?
        .to_string();
    Ok(Some(ImageUpload { filename, bytes }))
}

async fn confirm(question: &str) -> Result<bool> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(format!("{question} [y/N] ").as_bytes()).await?;
    stdout.flush().await?;
    let mut answer = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut answer)
        .await?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
