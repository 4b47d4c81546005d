//! Operator CLI over the extraction engine.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use snspulse::model::Platform;
use snspulse::{Engine, Settings};

#[derive(Parser)]
#[command(name = "snspulse")]
#[command(about = "Engagement metric extraction for social media accounts")]
#[command(version)]
struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Extract metrics for one account
    Scrape {
        /// Platform: tiktok, instagram, youtube or facebook
        platform: Platform,
        /// Account handle on that platform
        username: String,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage manual login sessions
    Login {
        #[command(subcommand)]
        action: LoginAction,
    },
    /// Show configuration details
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum LoginAction {
    /// Open a visible browser at the platform's login page
    Open { platform: Platform },
    /// Capture cookies from the open login browser and persist them
    Close { platform: Platform },
    /// Show which platforms have a stored session
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file path in use
    Path,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Scrape {
            platform,
            username,
            json,
        } => {
            let engine = Engine::new(settings);
            let snapshot = engine.scrape(platform, &username).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print_snapshot(&snapshot);
            }
        }
        Commands::Login { action } => {
            let engine = Engine::new(settings);
            match action {
                LoginAction::Open { platform } => {
                    engine.open_login_browser(platform).await?;
                    println!("Login browser opened for {platform}. Sign in, then run `snspulse login close {platform}`.");
                }
                LoginAction::Close { platform } => {
                    engine.close_login_browser(platform).await?;
                    println!("Session saved for {platform}.");
                }
                LoginAction::Status => {
                    for platform in Platform::ALL {
                        if platform.is_session_gated() {
                            let state = if engine.has_login_session(platform) {
                                "stored"
                            } else {
                                "none"
                            };
                            println!("{platform}: {state}");
                        }
                    }
                }
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Path => {
                let path = cli
                    .config
                    .or_else(Settings::default_config_path)
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(defaults, no file)".to_string());
                println!("{path}");
            }
        },
    }

    Ok(())
}

fn print_snapshot(snap: &snspulse::Snapshot) {
    let fmt_count = |v: Option<i64>| v.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string());
    println!("{} @{}", snap.platform, snap.username);
    println!("  followers:   {}", fmt_count(snap.followers));
    println!(
        "  last post:   {}",
        snap.last_post_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("  views:       {}", fmt_count(snap.last_post_views));
    println!("  likes:       {}", fmt_count(snap.last_post_likes));
    println!("  saves:       {}", fmt_count(snap.last_post_saves));
    if snap.session == snspulse::model::SessionState::Expired {
        println!("  (login session expired; run `snspulse login open {}`)", snap.platform);
    }
}
