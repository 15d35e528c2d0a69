use anyhow::Result;
use clap::Parser;
use privvy_formula::{
    caveats, formula::Formula, info::info, install::install, layout::InstallLayout,
    runtime::RealRuntime, smoke::run_tests, uninstall::uninstall,
};
use std::path::PathBuf;

/// privvy-formula - installer for the Privvy language
///
/// Fetches the Privvy source archive, verifies its SHA-256, installs the
/// interpreter files into a private libexec directory and generates the
/// `privvy` and `privvy-db` launchers.
///
/// Examples:
///   privvy-formula install --sha256 <HEX>    # Install into ~/.local
///   privvy-formula --prefix /opt/privvy test  # Smoke-test an install
#[derive(Parser, Debug)]
#[command(author, version = env!("PRIVVY_FORMULA_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Install prefix (defaults to ~/.local, or /usr/local as root)
    #[arg(long, env = "PRIVVY_PREFIX", value_name = "PATH", global = true)]
    pub prefix: Option<PathBuf>,

    /// JSON formula to use instead of the built-in Privvy formula
    #[arg(long, env = "PRIVVY_FORMULA", value_name = "FILE", global = true)]
    pub formula: Option<PathBuf>,

    /// Interpreter to run the installed drivers with (skips the PATH lookup)
    #[arg(long, env = "PRIVVY_INTERPRETER", value_name = "PATH", global = true)]
    pub interpreter: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Download, verify and install the formula
    Install(InstallArgs),

    /// Run the formula's post-install checks against the installed launchers
    Test,

    /// Remove every file recorded by the last install
    Uninstall,

    /// Show what the formula installs and whether it is installed
    Info,

    /// Print the post-install notes for the selected prefix
    Caveats,
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Source archive URL (http(s)://, file:// or a local path)
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Expected SHA-256 of the source archive
    #[arg(long, value_name = "HEX")]
    pub sha256: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = RealRuntime;
    let formula = Formula::load_or_builtin(&runtime, cli.formula.as_deref())?;

    match cli.command {
        Commands::Install(args) => {
            let formula = formula.with_source(args.url, args.sha256);
            install(runtime, formula, cli.prefix, cli.interpreter).await?
        }
        Commands::Test => {
            let layout = InstallLayout::resolve(&runtime, cli.prefix, &formula.name)?;
            run_tests(&runtime, &formula, &layout)?
        }
        Commands::Uninstall => {
            let layout = InstallLayout::resolve(&runtime, cli.prefix, &formula.name)?;
            let receipt = uninstall(&runtime, &layout, &formula.name)?;
            println!(
                "   uninstalled {} {} {}",
                receipt.name,
                receipt.version,
                layout.prefix.display()
            );
        }
        Commands::Info => {
            let layout = InstallLayout::resolve(&runtime, cli.prefix, &formula.name)?;
            info(&runtime, &formula, &layout)?
        }
        Commands::Caveats => {
            let layout = InstallLayout::resolve(&runtime, cli.prefix, &formula.name)?;
            match caveats::render(&formula, &layout) {
                Some(text) => println!("{}", text),
                None => println!("{} has no caveats.", formula.name),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_install_parsing() {
        let cli = Cli::try_parse_from([
            "privvy-formula",
            "install",
            "--url",
            "file:///tmp/privvy.tar.gz",
            "--sha256",
            "abc",
        ])
        .unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.url.as_deref(), Some("file:///tmp/privvy.tar.gz"));
                assert_eq!(args.sha256.as_deref(), Some("abc"));
            }
            _ => panic!("Expected Install command"),
        }
    }

    #[test]
    fn test_cli_install_without_overrides() {
        let cli = Cli::try_parse_from(["privvy-formula", "install"]).unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert!(args.url.is_none());
                assert!(args.sha256.is_none());
            }
            _ => panic!("Expected Install command"),
        }
    }

    #[test]
    fn test_cli_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "privvy-formula",
            "test",
            "--prefix",
            "/opt/privvy",
            "--interpreter",
            "/usr/bin/python3.11",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Test));
        assert_eq!(cli.prefix, Some(PathBuf::from("/opt/privvy")));
        assert_eq!(cli.interpreter, Some(PathBuf::from("/usr/bin/python3.11")));
    }

    #[test]
    fn test_cli_global_options_before_subcommand() {
        let cli = Cli::try_parse_from([
            "privvy-formula",
            "--formula",
            "tool.json",
            "uninstall",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Uninstall));
        assert_eq!(cli.formula, Some(PathBuf::from("tool.json")));
    }

    #[test]
    fn test_cli_info_and_caveats() {
        let cli = Cli::try_parse_from(["privvy-formula", "info"]).unwrap();
        assert!(matches!(cli.command, Commands::Info));
        let cli = Cli::try_parse_from(["privvy-formula", "caveats"]).unwrap();
        assert!(matches!(cli.command, Commands::Caveats));
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        let result = Cli::try_parse_from(["privvy-formula"]);
        assert!(result.is_err());
    }
}
