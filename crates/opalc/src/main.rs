//! Opal compiler CLI.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opal_core::{Compiler, CompilerOptions};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "opalc")]
#[command(author, version, about = "Opal compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile source files to a wasm module
    Compile {
        /// Input file(s) to compile
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output path (defaults to the first input with a .wasm extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target word size in bytes (4 or 8)
        #[arg(long, default_value_t = 4)]
        word_size: u8,
    },

    /// Check source files for errors
    Check {
        /// Input file(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Parse a file and dump its AST as JSON
    Ast {
        /// Input file to parse
        file: PathBuf,

        /// Pretty print
        #[arg(short, long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            files,
            output,
            word_size,
        } => compile(files, output, word_size),
        Commands::Check { files } => check(files),
        Commands::Ast { file, pretty } => dump_ast(file, pretty),
    }
}

fn load(compiler: &mut Compiler, files: &[PathBuf]) -> Result<()> {
    for file in files {
        if let Err(e) = compiler.load_file(file) {
            eprintln!("{}", compiler.render_diagnostics());
            return Err(anyhow::anyhow!("failed to load {}: {}", file.display(), e));
        }
    }
    Ok(())
}

fn compile(files: Vec<PathBuf>, output: Option<PathBuf>, word_size: u8) -> Result<()> {
    let mut compiler = Compiler::with_options(CompilerOptions { word_size })
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    load(&mut compiler, &files)?;

    let bytes = match compiler.compile() {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("{}", compiler.render_diagnostics());
            return Err(anyhow::anyhow!("{}", e));
        }
    };

    let output = output.unwrap_or_else(|| files[0].with_extension("wasm"));
    fs::write(&output, &bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;

    eprintln!("wrote {} ({} bytes)", output.display(), bytes.len());
    Ok(())
}

fn check(files: Vec<PathBuf>) -> Result<()> {
    let mut compiler = Compiler::new();

    load(&mut compiler, &files)?;

    match compiler.compile() {
        Ok(_) => {
            eprintln!("OK: {} file(s) checked", files.len());
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", compiler.render_diagnostics());
            Err(anyhow::anyhow!("{}", e))
        }
    }
}

fn dump_ast(file: PathBuf, pretty: bool) -> Result<()> {
    let source = fs::read_to_string(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let ast = opal_core::parse(&source).map_err(|e| anyhow::anyhow!("parse error: {}", e))?;

    if pretty {
        println!(
            "{}",
            serde_json::to_string_pretty(&ast).context("failed to serialize AST")?
        );
    } else {
        println!(
            "{}",
            serde_json::to_string(&ast).context("failed to serialize AST")?
        );
    }

    Ok(())
}
