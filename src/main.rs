use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser as ClapParser;
use log::info;

use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::reporter::Reporter;
use lox::resolver::Resolver;
use lox::scanner::Scanner;
use lox::stmt::Stmt;
use lox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Script to run; starts an interactive prompt when omitted.
    script: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,

        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;
            return Ok(());
        }

        Err(_) => {
            eprintln!("Usage: lox [script]");
            process::exit(1);
        }
    };

    match cli.script {
        Some(path) => run_file(&path),
        None => run_prompt(),
    }
}

fn run_file(path: &Path) -> anyhow::Result<()> {
    let source: Vec<u8> =
        fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

    info!("running {} ({} bytes)", path.display(), source.len());

    let mut interpreter = Interpreter::new();
    let mut reporter = Reporter::new();

    // Keep the program alive until exit; the interpreter's resolution
    // table is keyed by AST node addresses.
    let _program = run(&source, &mut interpreter, &mut reporter);

    if reporter.had_error() || reporter.had_runtime_error() {
        process::exit(1);
    }

    Ok(())
}

fn run_prompt() -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut interpreter = Interpreter::new();
    let mut reporter = Reporter::new();

    // Closures and classes defined on earlier lines stay callable, so
    // every line's statements must outlive the loop iteration.
    let mut history: Vec<Vec<Stmt>> = Vec::new();

    let mut line = String::new();

    loop {
        eprint!("> ");
        io::stderr().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        if line.trim().is_empty() {
            continue;
        }

        history.push(run(line.as_bytes(), &mut interpreter, &mut reporter));
        reporter.reset();
    }

    Ok(())
}

/// One trip through the pipeline: scan, parse, resolve, interpret. Static
/// errors stop the pipeline before execution; runtime errors abort the
/// batch. Returns the parsed statements so the caller can keep them alive.
fn run(source: &[u8], interpreter: &mut Interpreter, reporter: &mut Reporter) -> Vec<Stmt> {
    let mut tokens: Vec<Token> = Vec::new();

    for result in Scanner::new(source) {
        match result {
            Ok(token) => tokens.push(token),
            Err(e) => reporter.report(&e),
        }
    }

    let statements = Parser::new(tokens, reporter).parse();

    if reporter.had_error() {
        return statements;
    }

    Resolver::new(interpreter, reporter).resolve(&statements);

    if reporter.had_error() {
        return statements;
    }

    if let Err(e) = interpreter.interpret(&statements) {
        reporter.report(&e);
    }

    statements
}
