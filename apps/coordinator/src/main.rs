use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{config::load_settings_from, handler_fn, load_settings, CoordinationCore};
use serde_json::{json, Value};
use shared::{ComponentState, EventId, OwnerId, RouteState, Status};
use tracing::info;

#[derive(Parser, Debug)]
struct Cli {
    /// Settings file. Defaults to coordination.toml in the working directory.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replays navigations and loads a `page` component on every route.
    Navigate { urls: Vec<String> },
    /// Delivers one event to a logging handler registered for every event.
    Dispatch {
        event: String,
        #[arg(long, default_value = "null")]
        payload: String,
        #[arg(long)]
        send: bool,
        #[arg(long)]
        max_handlers: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => load_settings_from(path),
        None => load_settings(),
    };
    let core = CoordinationCore::new(settings);

    match cli.command {
        Command::Navigate { urls } => navigate(&core, &urls).await?,
        Command::Dispatch {
            event,
            payload,
            send,
            max_handlers,
        } => {
            let payload: Value = serde_json::from_str(&payload).context("payload is not JSON")?;
            dispatch(&core, event, payload, send, max_handlers).await?;
        }
    }

    core.dispose().await;
    Ok(())
}

async fn navigate(core: &CoordinationCore, urls: &[String]) -> Result<()> {
    let components = core.components();
    for url in urls {
        let route = RouteState::from_url(url);
        core.router().record_navigation(route.clone());
        let pruned = components.prune_for_navigation(&route);

        let page: ComponentState = components
            .init("page", &route)
            .first()
            .await
            .context("component service closed")?
            .into_component();
        let loaded = components.load(&page);
        components.update(
            page.with_status(Status::Loaded)
                .with_data_entry("url", json!(url)),
        );
        let model = loaded.first().await.context("component service closed")?;

        info!(url = %url, pruned, "route loaded");
        println!("{}", serde_json::to_string(&model)?);
    }

    let stored = components.with_store_snapshot(|store| store.len());
    println!("component states kept: {stored}");
    Ok(())
}

async fn dispatch(
    core: &CoordinationCore,
    event: String,
    payload: Value,
    send: bool,
    max_handlers: Option<usize>,
) -> Result<()> {
    let owner = OwnerId::next();
    let printer = handler_fn(|event| async move {
        println!("{} <- {}", event.id, event.payload);
        anyhow::Ok(())
    });
    core.registry()
        .register(&[EventId::all()], printer, Some(owner), None);

    if send {
        let outcome = core.dispatcher().send(event, payload, max_handlers).await?;
        println!("handlers invoked: {}", outcome.invoked);
    } else {
        let receipt = core.dispatcher().post(event, payload, max_handlers);
        core.dispatcher().flush().await;
        println!("handlers scheduled: {}", receipt.scheduled());
    }

    core.registry().unregister_owner(owner);
    Ok(())
}
