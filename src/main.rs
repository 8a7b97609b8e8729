use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
mod auth;
use sealstream::config::Config;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "sealstream")]
#[command(
    version,
    about = "Password-sealed streaming file encryption. No integrity protection."
)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, value_name = "PATH", env = "SEALSTREAM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Encrypts a file
    #[command(arg_required_else_help = true)]
    Encrypt {
        input: PathBuf,
        output: PathBuf,
        /// Replace OUTPUT if it exists
        #[arg(short, long)]
        force: bool,
    },

    /// Decrypts a file
    #[command(arg_required_else_help = true)]
    Decrypt {
        input: PathBuf,
        output: PathBuf,
        /// Replace OUTPUT if it exists
        #[arg(short, long)]
        force: bool,
    },

    /// Decrypts separately encrypted chunks into one file, in the given order
    #[command(arg_required_else_help = true)]
    DecryptChunks {
        output: PathBuf,
        #[arg(required = true)]
        chunks: Vec<PathBuf>,
        /// Replace OUTPUT if it exists
        #[arg(short, long)]
        force: bool,
    },

    /// Re-encrypts a file under a new password (in place unless OUTPUT is given)
    #[command(arg_required_else_help = true)]
    Rekey {
        input: PathBuf,
        output: Option<PathBuf>,
        /// Replace OUTPUT if it exists
        #[arg(short, long)]
        force: bool,
    },

    /// Tells whether a file looks encrypted (no password needed)
    #[command(arg_required_else_help = true)]
    Check { input: PathBuf },

    /// Checks the password against a file's header
    #[command(arg_required_else_help = true)]
    Verify { input: PathBuf },
}

fn init_logging(config: &Config) {
    // RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

fn ensure_writable(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        bail!(
            "{} already exists (use --force to replace it)",
            path.display()
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_with_env(cli.config.as_deref()).context("loading configuration")?;
    init_logging(&config);
    debug!(command = ?cli.command, "sealstream starting");

    match cli.command {
        Commands::Encrypt {
            input,
            output,
            force,
        } => {
            ensure_writable(&output, force || config.overwrite)?;
            let password = auth::read_password()?;
            let n = sealstream::encrypt_file(&input, &output, &password)?;
            println!("encrypted {n} bytes into {}", output.display());
        }
        Commands::Decrypt {
            input,
            output,
            force,
        } => {
            ensure_writable(&output, force || config.overwrite)?;
            let password = auth::read_password()?;
            let n = sealstream::decrypt_file(&input, &output, &password)?;
            println!("decrypted {n} bytes into {}", output.display());
        }
        Commands::DecryptChunks {
            output,
            chunks,
            force,
        } => {
            ensure_writable(&output, force || config.overwrite)?;
            let password = auth::read_password()?;
            let n = sealstream::decrypt_file_chunks(&chunks, &output, &password)?;
            println!(
                "decrypted {n} bytes from {} chunks into {}",
                chunks.len(),
                output.display()
            );
        }
        Commands::Rekey {
            input,
            output,
            force,
        } => {
            let output = match output {
                Some(path) => {
                    ensure_writable(&path, force || config.overwrite)?;
                    path
                }
                None => input.clone(),
            };
            let old = auth::read_password()?;
            // Fail on a wrong old password before asking for the new one.
            if !sealstream::validate_file_password(&input, &old)? {
                bail!("invalid key: password does not match {}", input.display());
            }
            let new = auth::read_new_password_with_confirmation()?;
            sealstream::re_encrypt_file(&input, &output, &old, &new)?;
            println!("re-encrypted {}", output.display());
        }
        Commands::Check { input } => {
            if sealstream::is_encrypted_file(&input) {
                println!("encrypted");
            } else {
                println!("not encrypted");
            }
        }
        Commands::Verify { input } => {
            let password = auth::read_password()?;
            if !sealstream::validate_file_password(&input, &password)? {
                bail!("invalid key: password does not match {}", input.display());
            }
            println!("password ok");
        }
    }

    Ok(())
}
