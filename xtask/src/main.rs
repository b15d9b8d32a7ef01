//! Build automation tasks for the mongo-pool workspace.
//!
//! Run with `cargo xtask <command>`.
//!
//! ## Available Commands
//!
//! - `ci`: Run format, lint, test and doc checks
//! - `fmt`: Check/apply code formatting
//! - `clippy`: Run clippy lints
//! - `test`: Run unit and mock tests, optionally the MongoDB-backed ones
//! - `doc`: Generate documentation
//! - `mongo-up` / `mongo-down`: Start or remove a local MongoDB container
//! - `example`: Run the counters example against `MONGODB_URI`
//! - `clean`: Clean build artifacts

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

/// Name of the container managed by `mongo-up` / `mongo-down`.
const MONGO_CONTAINER: &str = "mongo-pool-dev";
/// Image used for local integration runs; matches the testing crate.
const MONGO_IMAGE: &str = "mongo:7.0";
const DEFAULT_URI: &str = "mongodb://localhost:27017";

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for mongo-pool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run format, lint, test and doc checks
    Ci,
    /// Run cargo fmt (--check by default, --fix to apply)
    Fmt {
        /// Apply formatting fixes
        #[arg(long)]
        fix: bool,
    },
    /// Run clippy on all targets
    Clippy {
        /// Apply clippy suggestions
        #[arg(long)]
        fix: bool,
    },
    /// Run unit and mock-backed tests
    Test {
        /// Test a specific package
        #[arg(short, long)]
        package: Option<String>,
        /// Also run tests that need a MongoDB server (uses MONGODB_URI)
        #[arg(long)]
        integration: bool,
    },
    /// Generate documentation
    Doc {
        /// Open documentation in browser
        #[arg(long)]
        open: bool,
    },
    /// Start a MongoDB container for the ignored integration tests
    MongoUp {
        /// Host port to publish
        #[arg(long, default_value_t = 27017)]
        port: u16,
    },
    /// Stop and remove the MongoDB container
    MongoDown,
    /// Run the counters example
    Example,
    /// Clean build artifacts
    Clean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    let root = workspace_root(&sh)?;
    sh.change_dir(&root);

    match cli.command {
        Command::Ci => {
            println!("Running CI checks (fmt, clippy, test, doc)...");
            fmt(&sh, false)?;
            clippy(&sh, false)?;
            test(&sh, None, false)?;
            doc(&sh, false)?;
            println!("\n✅ CI checks passed.");
        }
        Command::Fmt { fix } => fmt(&sh, fix)?,
        Command::Clippy { fix } => clippy(&sh, fix)?,
        Command::Test {
            package,
            integration,
        } => test(&sh, package.as_deref(), integration)?,
        Command::Doc { open } => doc(&sh, open)?,
        Command::MongoUp { port } => mongo_up(&sh, port)?,
        Command::MongoDown => mongo_down(&sh)?,
        Command::Example => example(&sh)?,
        Command::Clean => clean(&sh)?,
    }

    Ok(())
}

/// Directory holding the root `Cargo.toml`.
fn workspace_root(sh: &Shell) -> Result<PathBuf> {
    let manifest = cmd!(sh, "cargo locate-project --workspace --message-format=plain")
        .quiet()
        .read()
        .context("cargo locate-project failed")?;
    PathBuf::from(manifest.trim())
        .parent()
        .map(PathBuf::from)
        .context("workspace manifest has no parent directory")
}

fn fmt(sh: &Shell, fix: bool) -> Result<()> {
    if fix {
        println!("Applying formatting...");
        cmd!(sh, "cargo fmt --all").run()?;
        println!("✅ Formatting applied.");
    } else {
        println!("Checking formatting...");
        cmd!(sh, "cargo fmt --all -- --check").run()?;
        println!("✅ Formatting check passed.");
    }
    Ok(())
}

fn clippy(sh: &Shell, fix: bool) -> Result<()> {
    if fix {
        println!("Applying clippy suggestions...");
        cmd!(sh, "cargo clippy --all-targets --fix --allow-dirty").run()?;
        println!("✅ Clippy suggestions applied.");
    } else {
        println!("Running clippy...");
        cmd!(sh, "cargo clippy --all-targets -- -D warnings").run()?;
        println!("✅ Clippy check passed.");
    }
    Ok(())
}

fn test(sh: &Shell, package: Option<&str>, integration: bool) -> Result<()> {
    println!("Running tests...");

    let mut args = vec!["test"];
    if let Some(pkg) = package {
        args.extend(["-p", pkg]);
    } else {
        args.push("--workspace");
    }
    let args_ref = &args;
    cmd!(sh, "cargo {args_ref...}").run()?;

    if integration {
        let uri = mongodb_uri(sh);
        println!("Running MongoDB-backed tests against {uri}...");
        cmd!(sh, "cargo {args...} -- --ignored")
            .env("MONGODB_URI", &uri)
            .run()?;
    }

    println!("✅ All tests passed.");
    Ok(())
}

fn doc(sh: &Shell, open: bool) -> Result<()> {
    println!("Generating documentation...");
    if open {
        cmd!(sh, "cargo doc --workspace --no-deps --open").run()?;
    } else {
        cmd!(sh, "cargo doc --workspace --no-deps").run()?;
    }
    println!("✅ Documentation generated.");
    Ok(())
}

fn mongodb_uri(sh: &Shell) -> String {
    sh.var("MONGODB_URI").unwrap_or_else(|_| DEFAULT_URI.to_string())
}

fn mongo_up(sh: &Shell, port: u16) -> Result<()> {
    println!("Starting {MONGO_IMAGE} as {MONGO_CONTAINER} on port {port}...");
    let publish = format!("{port}:27017");
    cmd!(
        sh,
        "docker run -d --rm --name {MONGO_CONTAINER} -p {publish} {MONGO_IMAGE}"
    )
    .run()
    .context("failed to start MongoDB container (is Docker running?)")?;
    println!("✅ MongoDB listening. export MONGODB_URI=mongodb://localhost:{port}");
    Ok(())
}

fn mongo_down(sh: &Shell) -> Result<()> {
    println!("Stopping {MONGO_CONTAINER}...");
    cmd!(sh, "docker rm -f {MONGO_CONTAINER}")
        .run()
        .context("failed to remove MongoDB container")?;
    println!("✅ MongoDB container removed.");
    Ok(())
}

fn example(sh: &Shell) -> Result<()> {
    let uri = mongodb_uri(sh);
    println!("Running counters example against {uri}...");
    cmd!(sh, "cargo run -p mongo-pool --example counters")
        .env("MONGODB_URI", &uri)
        .env("RUST_LOG", "mongo_pool=debug")
        .run()?;
    Ok(())
}

fn clean(sh: &Shell) -> Result<()> {
    println!("Cleaning build artifacts...");
    cmd!(sh, "cargo clean").run()?;
    println!("✅ Clean complete.");
    Ok(())
}
