use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use client_core::{
    ChatClient, ClientEvent, DurableCredentialStore, GatewayConfig, HttpGateway,
};

/// Command-line driver for the chat client data layer. Signs in (or resumes
/// a stored session), prints the resulting selection, and optionally sends a
/// single message before exiting.
#[derive(Parser, Debug)]
struct Args {
    /// Auth endpoint, e.g. http://localhost:8787/auth
    #[arg(long)]
    auth_url: String,
    /// Resource endpoint, e.g. http://localhost:8787/api
    #[arg(long)]
    api_url: String,
    /// Directory holding the local credential database.
    #[arg(long, default_value = ".")]
    data_dir: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    password: Option<String>,
    /// Register a new account instead of logging in; requires --email,
    /// --password and --username.
    #[arg(long)]
    register: bool,
    #[arg(long)]
    username: Option<String>,
    /// Message to send to the default channel after signing in.
    #[arg(long)]
    send: Option<String>,
    /// Clear the stored session and exit.
    #[arg(long)]
    logout: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let database_url = storage::Storage::sqlite_url_for_data_dir(std::path::Path::new(&args.data_dir));
    let credentials = DurableCredentialStore::initialize(&database_url).await?;
    let config = GatewayConfig::new(&args.auth_url, &args.api_url)?;
    let gateway = Arc::new(HttpGateway::new(config, credentials.clone()));
    let client = ChatClient::new(gateway, credentials);

    let mut events = client.subscribe_events();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let ClientEvent::Notice(notice) = event {
                eprintln!("[{:?}] {}", notice.context(), notice.text());
            }
        }
    });

    if args.logout {
        client.logout().await?;
        println!("Signed out.");
        printer.abort();
        return Ok(());
    }

    let resumed = client.resume().await?;
    if !resumed {
        let (Some(email), Some(password)) = (&args.email, &args.password) else {
            bail!("no stored session; pass --email and --password to sign in");
        };
        if args.register {
            let Some(username) = &args.username else {
                bail!("--register requires --username");
            };
            client.register(email, username, password).await?;
        } else {
            client.login(email, password).await?;
        }
    }

    let snapshot = client.snapshot().await;
    if let Some(user) = &snapshot.user {
        println!("Signed in as {}", user.username);
    } else if resumed {
        println!("Resumed stored session");
    }
    println!("Servers:");
    for server in &snapshot.servers {
        let marker = if Some(&server.id) == snapshot.selected_server.as_ref() {
            "*"
        } else {
            " "
        };
        println!("  {marker} {} {}", server.icon, server.name);
    }
    println!("Channels:");
    for channel in &snapshot.channels {
        let marker = if Some(&channel.id) == snapshot.selected_channel.as_ref() {
            "*"
        } else {
            " "
        };
        println!("  {marker} #{} ({:?})", channel.name, channel.kind);
    }
    for message in &snapshot.messages {
        println!("  <{}> {}", message.author, message.content);
    }
    println!(
        "{} member(s) online",
        snapshot.members.iter().filter(|m| m.online).count()
    );

    if let Some(text) = &args.send {
        client.send_message(text).await?;
        if let Some(sent) = client.snapshot().await.messages.last() {
            println!("Sent: <{}> {}", sent.author, sent.content);
        }
    }

    printer.abort();
    Ok(())
}
