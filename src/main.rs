use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keyring_gnome::config::{default_config_path, Config};
use keyring_gnome::credentials::CredentialBackend;
use secrecy::{ExposeSecret, SecretString};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "keyring-gnome")]
#[command(about = "Store and look up passwords in GNOME Keyring")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether the backend can be used in this session
    Supported,
    /// Print the stored password
    Get { service: String, username: String },
    /// Store a password
    Set {
        service: String,
        username: String,
        /// Read the password from stdin instead of prompting
        #[arg(long)]
        stdin: bool,
    },
    /// Delete a stored password
    Delete { service: String, username: String },
}

fn init_tracing(config: &Config) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .init();
}

fn read_password(from_stdin: bool) -> Result<SecretString> {
    if from_stdin {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read password from stdin")?;
        let password = input.strip_suffix('\n').unwrap_or(&input);
        let password = password.strip_suffix('\r').unwrap_or(password);
        return Ok(SecretString::from(password.to_string()));
    }

    use dialoguer::console::Term;
    use dialoguer::{theme::ColorfulTheme, Password};

    let password = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Password")
        .interact_on(&Term::stderr())
        .context("Failed to prompt for password")?;
    Ok(SecretString::from(password))
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = Config::load_or_default(&config_path)?;
    init_tracing(&config);

    let backend = config.credentials.build();

    match cli.command {
        Command::Supported => {
            return match backend.check_supported() {
                Ok(()) => {
                    println!("{}: supported", backend.name());
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    println!("{}: unsupported ({err})", backend.name());
                    Ok(ExitCode::FAILURE)
                }
            };
        }
        Command::Get { service, username } => {
            ensure_supported(backend.as_ref())?;
            match backend.get_password(&service, &username)? {
                Some(password) => println!("{}", password.expose_secret()),
                None => {
                    eprintln!("No password stored for {username} at {service}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Command::Set {
            service,
            username,
            stdin,
        } => {
            ensure_supported(backend.as_ref())?;
            let password = read_password(stdin)?;
            backend
                .set_password(&service, &username, &password)
                .with_context(|| format!("Failed to store password for {username} at {service}"))?;
        }
        Command::Delete { service, username } => {
            ensure_supported(backend.as_ref())?;
            backend
                .delete_password(&service, &username)
                .with_context(|| format!("Failed to delete password for {username} at {service}"))?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn ensure_supported(backend: &dyn CredentialBackend) -> Result<()> {
    backend
        .check_supported()
        .with_context(|| format!("{} backend is not usable here", backend.name()))
}
