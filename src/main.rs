use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use tackyc::{compile_to_stage, Stage};

/// A small ahead-of-time compiler for a C subset, emitting x86-64 assembly.
#[derive(ClapParser, Debug)]
#[command(name = "tackyc", version, about)]
struct Cli {
    /// Source file to compile.
    source: PathBuf,

    /// Stop after lexing and print the token stream.
    #[arg(long)]
    lex: bool,

    /// Stop after parsing and print the AST.
    #[arg(long)]
    parse: bool,

    /// Stop after semantic validation and print the resolved AST.
    #[arg(long)]
    validate: bool,

    /// Stop after TACKY lowering and print the IR.
    #[arg(long)]
    tacky: bool,

    /// Stop after code generation and print the assembly IR's text.
    #[arg(long)]
    codegen: bool,

    /// Write output to this file instead of standard output.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Raise logging verbosity; repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn stage(&self) -> Option<Stage> {
        if self.lex {
            Some(Stage::Lex)
        } else if self.parse {
            Some(Stage::Parse)
        } else if self.validate {
            Some(Stage::Validate)
        } else if self.tacky {
            Some(Stage::Tacky)
        } else if self.codegen {
            Some(Stage::Codegen)
        } else {
            None
        }
    }
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let source = match fs::read_to_string(&cli.source) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("failed to read {}: {err}", cli.source.display());
            return ExitCode::from(1);
        }
    };

    match compile_to_stage(&source, cli.stage()) {
        Ok(output) => {
            let text = output.to_string();
            match cli.output {
                Some(path) => {
                    if let Err(err) = fs::write(&path, text) {
                        eprintln!("failed to write {}: {err}", path.display());
                        return ExitCode::from(1);
                    }
                }
                None => println!("{text}"),
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            // -1 as an i32, passed through as a process exit code.
            ExitCode::from((-1i32) as u8)
        }
    }
}
