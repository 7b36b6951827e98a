use anyhow::Result;
use clap::Parser;
use gmail_labeler::auth;
use gmail_labeler::cli::{self, Cli, Commands};
use gmail_labeler::config::Config;
use gmail_labeler::error::GmailError;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        eprintln!("\nFor help, run: gmail-labeler --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Several dependencies pull in rustls; pick the provider explicitly.
    // aws-lc-rs everywhere but Windows, where ring avoids the NASM/CMake toolchain
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gmail_labeler=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gmail_labeler=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Auth { force } => {
            tracing::info!("Authenticating with Gmail API...");

            if let Some(parent) = cli.token_cache.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            if force && cli.token_cache.exists() {
                tokio::fs::remove_file(&cli.token_cache).await?;
                tracing::info!("Removed existing token cache");
            }

            let hub = auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache).await?;
            auth::secure_token_file(&cli.token_cache).await?;

            println!("Successfully authenticated with Gmail API");
            println!("Token cached at: {:?}", cli.token_cache);

            // Explicit scope so the profile call reuses the cached token
            let (_, profile) = hub
                .users()
                .get_profile("me")
                .add_scope(auth::REQUIRED_SCOPES[0])
                .doit()
                .await?;
            println!(
                "Connected to account: {}",
                profile.email_address.unwrap_or_default()
            );

            Ok(())
        }

        Commands::Run { dry_run, rule, json } => {
            if let Some(parent) = cli.token_cache.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let report = cli::run_labeler(&cli, dry_run, rule).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", cli::format_report(&report));
            }

            if report.has_failures() {
                anyhow::bail!("Run {} finished with failures", report.run_id);
            }
            Ok(())
        }

        Commands::Classify { rule, file } => {
            let config = Config::load(&cli.config).await?;
            let result = cli::classify_file(&config, rule, &file).await?;

            match result.label_path {
                Some(path) => println!("label:     {}", path),
                None => println!("label:     (none)"),
            }
            println!("important: {}", result.important);
            Ok(())
        }

        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                return Err(GmailError::ConfigError(format!(
                    "Configuration file already exists at {:?}. Use --force to overwrite.",
                    output
                ))
                .into());
            }

            Config::create_example(&output).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nKey settings to review:");
            println!("  - search.max_threads: threads fetched per rule and run");
            println!("  - rules.<name>.enabled: which providers are processed");
            println!("  - rules.gitlab.host: mail domain of your GitLab instance");

            Ok(())
        }
    }
}
