use super::{AssetDir, Dependency, Formula, Manifest, TestCommand, WrapperSpec};

const CAVEATS: &str = "\
Privvy has been installed!

Quick Start:
  privvy create-project my-api
  cd my-api
  python3 privvy.py migrate.pv
  python3 privvy.py src/main.pv

Commands:
  privvy create-project <name>  # Create new project
  privvy run <file>              # Run a file
  privvy migrate                 # Run migrations
  privvy-db init                 # Initialize database

Documentation:
  {doc}

Examples:
  {share}/privvy/examples/

Learn more:
  privvy help
  cat {doc}/QUICK_START.md
";

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub(super) fn privvy() -> Formula {
    Formula {
        name: "privvy".into(),
        desc: "The Easiest Backend Programming Language with Built-in ORM".into(),
        homepage: "https://github.com/yourname/privvy".into(),
        url: "https://github.com/yourname/privvy/archive/v1.0.0.tar.gz".into(),
        // No published release archive to pin against yet.
        sha256: String::new(),
        license: "MIT".into(),
        version: "1.0.0".into(),
        runtime: Dependency {
            name: "python".into(),
            version: "3.11".into(),
            module_path_var: "PYTHONPATH".into(),
        },
        manifest: Manifest {
            libexec: strings(&[
                "privvy.py",
                "lexer.py",
                "parser.py",
                "interpreter.py",
                "ast_nodes.py",
                "token_types.py",
                "privvy-cli.py",
                "privvy-db.py",
            ]),
            doc: strings(&[
                "README.md",
                "QUICK_START.md",
                "ORM_GUIDE.md",
                "DATABASE_GUIDE.md",
                "CLI_GUIDE.md",
            ]),
            share: vec![
                AssetDir::new("examples"),
                AssetDir::new("vscode-privvy"),
                AssetDir::new("project-template"),
            ],
        },
        wrappers: vec![
            WrapperSpec {
                name: "privvy".into(),
                script: "privvy-cli.py".into(),
            },
            WrapperSpec {
                name: "privvy-db".into(),
                script: "privvy-db.py".into(),
            },
        ],
        test: vec![
            TestCommand {
                bin: "privvy".into(),
                args: strings(&["version"]),
            },
            TestCommand {
                bin: "privvy".into(),
                args: strings(&["help"]),
            },
        ],
        caveats: Some(CAVEATS.to_string()),
    }
}
