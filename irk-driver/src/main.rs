//! irk IR builder driver
//!
//! Builds IR modules from JSON descriptions (or a built-in demo), verifies
//! them and writes textual IR or a JSON summary.

mod build;
mod desc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use irk_ir::{
    ArenaConfig, BinaryOp, ContextId, HandleArena, ModuleSummary, VerificationResult, VerifierAction,
};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use crate::desc::ModuleDesc;

#[derive(Parser)]
#[command(name = "irk")]
#[command(about = "Build and verify IR modules")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Arena configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, verify and print `i32 @add(i32, i32)`
    Demo {
        /// Output file for the generated IR
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build a module from a JSON description
    Build {
        /// Input module description
        input: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// What to write
        #[arg(long, value_enum, default_value_t = Emit::Text)]
        emit: Emit,

        /// Abort the process on the first invalid function
        #[arg(long)]
        abort_on_invalid: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    Text,
    Summary,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let config = match &cli.config {
        Some(path) => ArenaConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => ArenaConfig::default(),
    };
    let mut arena = HandleArena::with_config(config);

    match cli.command {
        Commands::Demo { output } => run_demo(&mut arena, output.as_deref()),
        Commands::Build { input, output, emit, abort_on_invalid } => {
            let action = if abort_on_invalid { VerifierAction::PrintAndAbort } else { VerifierAction::ReturnStatus };
            run_build(&mut arena, &input, output.as_deref(), emit, action)
        }
    }
}

fn run_demo(arena: &mut HandleArena, output: Option<&Path>) -> Result<()> {
    let ctx = arena.create_context_named("demo");
    let i32_ty = arena.types().get_integer(ctx, 32)?;
    let signature = arena.types().get_function_signature(i32_ty, &[i32_ty, i32_ty], false)?;
    let add = arena.values().declare_function(ctx, "add", signature)?;
    let entry = arena.functions().append_basic_block(add, "entry")?;

    let before = arena.verifier().verify(add, VerifierAction::ReturnStatus)?;
    println!("Before terminating the entry block:");
    report(&before);

    let a = arena.functions().get_parameter(add, 0)?;
    let b = arena.functions().get_parameter(add, 1)?;
    arena.values().set_name(a, "a")?;
    arena.values().set_name(b, "b")?;
    let sum = arena.instructions().build_binary(entry, BinaryOp::Add, a, b, "sum")?;
    arena.instructions().build_return(entry, Some(sum))?;

    let after = arena.verifier().verify(add, VerifierAction::ReturnStatus)?;
    println!("\nAfter adding `ret`:");
    report(&after);

    let text = String::from_utf8(arena.emit_module(ctx)?)?;
    println!("\nGenerated IR:");
    write_output(output, &text)
}

fn run_build(
    arena: &mut HandleArena,
    input: &Path,
    output: Option<&Path>,
    emit: Emit,
    action: VerifierAction,
) -> Result<()> {
    let content = fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let desc: ModuleDesc =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", input.display()))?;
    let ctx = build::build_module(arena, &desc)?;
    info!("Built module '{}' from {}", desc.module, input.display());

    let result = arena.verifier().verify_module(ctx, action)?;
    match emit {
        Emit::Summary => {
            let summary = ModuleSummary::collect(arena, ctx)?;
            write_output(output, &serde_json::to_string_pretty(&summary)?)?;
        }
        Emit::Text if result.is_valid() => {
            let text = String::from_utf8(arena.emit_module(ctx)?)?;
            write_output(output, &text)?;
        }
        Emit::Text => {}
    }
    fail_if_invalid(&desc.module, arena, ctx, &result)
}

fn fail_if_invalid(module: &str, arena: &mut HandleArena, ctx: ContextId, result: &VerificationResult) -> Result<()> {
    if result.is_valid() {
        return Ok(());
    }
    for reason in result.reasons() {
        eprintln!("  {reason}");
    }
    arena.destroy_context(ctx)?;
    bail!("module '{module}' failed verification with {} error(s)", result.reasons().len())
}

fn report(result: &VerificationResult) {
    match result {
        VerificationResult::Verified => println!("  verified"),
        VerificationResult::Invalid(reasons) => {
            println!("  invalid:");
            for reason in reasons {
                println!("    {reason}");
            }
        }
    }
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            println!("Output written to: {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
