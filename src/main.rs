//! ciprovision CLI Entry Point
//!
//! Provisions the Python environment for a CI job, or tears it down.
//!
//! # Usage
//!
//! ```bash
//! # Provision and apply the environment to the calling shell
//! eval "$(ciprovision)"
//!
//! # Provision, writing the environment changes to a file
//! ciprovision provision --env-file "$HOME/.ciprovision.env"
//!
//! # At the end of the job
//! ciprovision cleanup
//! ```

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use colored::Colorize;
use log::{debug, info};

use ciprovision::config::{resolve_config, settings_from_context};
use ciprovision::environment::{EnvChange, ProvisionContext};
use ciprovision::execution::{HttpDownloader, Provisioner, SystemRunner};
use ciprovision::{APP_NAME, VERSION};

/// Subcommand to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Provision,
    Cleanup,
}

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    action: Action,
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            action: Action::Provision,
            config_path: None,
            env_file: None,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| match record.level() {
            log::Level::Warn | log::Level::Error => {
                writeln!(buf, "[{}] {}", record.level(), record.args())
            }
            _ => writeln!(buf, "{}", record.args()),
        })
        .init();
}

/// Prints the application banner to stderr; stdout may carry shell statements.
fn print_banner() {
    eprintln!("{} v{}", APP_NAME, VERSION);
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: ciprovision [provision|cleanup] [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  provision           Set up the Python environment (default)");
    println!("  cleanup             Remove the conda environment created by provision");
    println!();
    println!("Options:");
    println!("  --config PATH       YAML overrides (default: $TRAVIS_BUILD_DIR/ciprovision.yaml)");
    println!("  --env-file PATH     Write environment changes to PATH instead of stdout");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Environment:");
    println!("  TRAVIS_OS_NAME      osx | linux | windows");
    println!("  TRAVIS_BUILD_DIR    Build workspace root");
    println!("  PYTHON_VERSION      Python version or prefix, e.g. 3.8");
    println!("  DISTRIB             conda | default");
    println!("  COVERAGE            true to install coverage and lint tooling");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut action_seen = false;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("--config requires a path argument".to_string());
                }
                config.config_path = Some(PathBuf::from(&args[i]));
            }
            "--env-file" => {
                i += 1;
                if i >= args.len() {
                    return Err("--env-file requires a path argument".to_string());
                }
                config.env_file = Some(PathBuf::from(&args[i]));
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            "provision" | "cleanup" if !action_seen => {
                config.action = if arg.as_str() == "cleanup" {
                    Action::Cleanup
                } else {
                    Action::Provision
                };
                action_seen = true;
            }
            _ => return Err(format!("Unexpected argument: {}", arg)),
        }
        i += 1;
    }

    Ok(config)
}

/// Renders environment changes as a sourceable shell script.
fn render_env_script(changes: &[EnvChange]) -> String {
    let mut script = format!(
        "# {} {} {}\n",
        APP_NAME,
        VERSION,
        chrono::Local::now().to_rfc3339()
    );
    for change in changes {
        script.push_str(&change.to_shell());
        script.push('\n');
    }
    script
}

/// Writes the script to `env_file`, or to stdout when `to_stdout` is set.
fn emit_env(
    changes: &[EnvChange],
    env_file: Option<&PathBuf>,
    to_stdout: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let script = render_env_script(changes);

    match env_file {
        Some(path) => {
            fs::write(path, script)?;
            info!("Wrote {} environment changes to {}", changes.len(), path.display());
        }
        None if to_stdout => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(script.as_bytes())?;
            stdout.flush()?;
        }
        None => {}
    }
    Ok(())
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let config = match parse_arguments(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Run '{} --help' for usage.", APP_NAME);
            std::process::exit(1);
        }
    };

    setup_logging(config.verbose);
    print_banner();

    let ctx = ProvisionContext::from_process();
    let settings = settings_from_context(&ctx, &env::current_dir()?)?;
    let provision_config = resolve_config(config.config_path.as_deref(), &settings.build_dir)?;

    info!("Build directory: {}", settings.build_dir.display());

    let mut provisioner = Provisioner::new(settings, provision_config, &SystemRunner, &HttpDownloader);

    let result = match config.action {
        Action::Provision => provisioner.provision(ctx.clone()),
        Action::Cleanup => {
            let mut stdout = io::stdout().lock();
            provisioner.cleanup(ctx.clone(), &mut stdout)
        }
    };

    debug!("{}", provisioner.timeline().report());
    let updated = result?;

    let changes = updated.diff(&ctx);
    emit_env(&changes, config.env_file.as_ref(), config.action == Action::Provision)?;

    if config.action == Action::Provision {
        eprintln!("{} Python environment ready", "✓".green());
    }

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
