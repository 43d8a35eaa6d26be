// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

mod config;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::os::fd::RawFd;
use std::path::PathBuf;
use std::process::ExitCode;
use xattrkit_core::{AttributeAccess, Target, XattrOptions, XattrSys};
use xattrkit_logging::CliLoggingArgs;

#[derive(Parser, Debug)]
#[command(author, version, about = "Read and write extended attributes on macOS")]
struct Cli {
    /// Configuration file (defaults to <config dir>/xattrkit/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    logging: CliLoggingArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
struct TargetArgs {
    /// File system path of the target object
    #[arg(long)]
    path: Option<PathBuf>,
    /// Already open file descriptor inherited from the caller
    #[arg(long)]
    fd: Option<RawFd>,
}

impl TargetArgs {
    fn target(&self) -> Target<'_> {
        match (&self.path, self.fd) {
            (Some(path), _) => Target::Path(path),
            (None, Some(fd)) => Target::Descriptor(fd),
            // clap enforces exactly one of the two
            (None, None) => Target::Path(std::path::Path::new("")),
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
struct OptionArgs {
    /// Act on a symbolic link itself
    #[arg(long)]
    nofollow: bool,
    /// Fail if the attribute already exists (set only)
    #[arg(long)]
    create: bool,
    /// Fail if the attribute does not exist (set only)
    #[arg(long)]
    replace: bool,
    /// Include the HFS compression attributes
    #[arg(long)]
    show_compression: bool,
    /// Extra raw option bits, passed to the kernel unchanged
    #[arg(long, value_parser = parse_bits)]
    options: Option<u32>,
}

impl OptionArgs {
    fn resolve(&self, defaults: XattrOptions) -> XattrOptions {
        let mut options = defaults | XattrOptions::from_raw(self.options.unwrap_or(0));
        for (enabled, flag) in [
            (self.nofollow, XattrOptions::NOFOLLOW),
            (self.create, XattrOptions::CREATE),
            (self.replace, XattrOptions::REPLACE),
            (self.show_compression, XattrOptions::SHOW_COMPRESSION),
        ] {
            if enabled {
                options |= flag;
            }
        }
        options
    }
}

fn parse_bits(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid option bits '{s}': {e}"))
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Print the value of an attribute
    Get {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        options: OptionArgs,
        /// Attribute name
        name: String,
        /// Print the value as hex instead of text
        #[arg(long)]
        hex: bool,
    },
    /// Create or replace an attribute
    Set {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        options: OptionArgs,
        name: String,
        /// Value as text
        #[arg(long, conflicts_with = "hex_value", required_unless_present = "hex_value")]
        value: Option<String>,
        /// Value as hex bytes
        #[arg(long)]
        hex_value: Option<String>,
    },
    /// Remove an attribute
    Rm {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        options: OptionArgs,
        name: String,
        /// Succeed when the attribute or object is already gone
        #[arg(long)]
        force: bool,
    },
    /// List attribute names (one per line)
    Ls {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Print the size of an attribute value in bytes
    Size {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        options: OptionArgs,
        name: String,
    },
    /// Exit 0 if the attribute exists, 1 if it does not
    Exists {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        options: OptionArgs,
        name: String,
    },
    /// Print the bit width of attribute sizes on the containing volume
    SizeBits {
        #[command(flatten)]
        target: TargetArgs,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("xattrkit: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    // The log level may come from the config file, so it is read first.
    let config = config::load(cli.config.as_deref())?;
    start_logging(&cli.logging, &config)?;

    let platform = xattrkit_core::ensure_ready().context("extended attributes are unavailable")?;
    tracing::debug!(os = platform.os, "attribute syscalls ready");
    let defaults = config.default_options()?;

    #[cfg(target_os = "macos")]
    {
        let access = AttributeAccess::native_with_config(config.access_config())?;
        let stdout = std::io::stdout();
        execute(&access, cli.command, defaults, &mut stdout.lock())
    }
    #[cfg(not(target_os = "macos"))]
    {
        let _ = defaults;
        Err(anyhow!(xattrkit_core::InitError::UnsupportedPlatform))
    }
}

fn start_logging(logging: &CliLoggingArgs, config: &config::CliConfig) -> Result<()> {
    logging
        .init("xattrkit-cli", config.log_level.unwrap_or_default())
        .context("failed to initialize logging")?;
    tracing::debug!(?config, "configuration resolved");
    Ok(())
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn execute<S: XattrSys, W: Write>(
    access: &AttributeAccess<S>,
    command: Command,
    defaults: XattrOptions,
    out: &mut W,
) -> Result<ExitCode> {
    match command {
        Command::Get {
            target,
            options,
            name,
            hex,
        } => {
            let value = access.get(target.target(), &name, options.resolve(defaults))?;
            if hex {
                writeln!(out, "{}", hex::encode(&value))?;
            } else {
                match std::str::from_utf8(&value) {
                    Ok(text) => writeln!(out, "{text}")?,
                    Err(_) => writeln!(out, "0x{}", hex::encode(&value))?,
                }
            }
        }
        Command::Set {
            target,
            options,
            name,
            value,
            hex_value,
        } => {
            let bytes = match (value, hex_value) {
                (Some(text), _) => text.into_bytes(),
                (None, Some(encoded)) => {
                    hex::decode(encoded.trim_start_matches("0x")).context("invalid --hex-value")?
                }
                (None, None) => return Err(anyhow!("either --value or --hex-value is required")),
            };
            access.set(target.target(), &name, &bytes, options.resolve(defaults))?;
        }
        Command::Rm {
            target,
            options,
            name,
            force,
        } => {
            access.remove(target.target(), &name, options.resolve(defaults), force)?;
        }
        Command::Ls { target, options } => {
            for name in access.list(target.target(), options.resolve(defaults))? {
                writeln!(out, "{name}")?;
            }
        }
        Command::Size {
            target,
            options,
            name,
        } => {
            let size = access.size(target.target(), &name, options.resolve(defaults))?;
            writeln!(out, "{size}")?;
        }
        Command::Exists {
            target,
            options,
            name,
        } => {
            let found = access.exists(target.target(), &name, options.resolve(defaults))?;
            let code = if found {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            };
            return Ok(code);
        }
        Command::SizeBits { target } => {
            writeln!(out, "{}", access.size_bits(target.target())?)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
