use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use sprig::{Interpreter, RecordingBridge, Repl, ReplConfig, SprigError};

#[derive(Parser)]
#[command(author, version, about = "sprig Lisp interpreter")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
    /// Scripts loaded, in order, before the shell starts
    files: Vec<PathBuf>,
    /// Exit after loading FILES instead of opening the shell
    #[arg(long)]
    no_repl: bool,
    #[command(flatten)]
    shell: ShellArgs,
}

#[derive(ClapArgs, Clone)]
struct ShellArgs {
    /// History file for the interactive shell
    #[arg(long, value_name = "PATH", global = true)]
    history: Option<PathBuf>,
    /// Keep history in memory only
    #[arg(long, global = true, conflicts_with = "history")]
    no_history: bool,
    /// Skip the startup banner
    #[arg(long, short, global = true)]
    quiet: bool,
}

impl ShellArgs {
    fn into_config(self) -> ReplConfig {
        let defaults = ReplConfig::default();
        ReplConfig {
            history: if self.no_history {
                None
            } else {
                self.history.or(defaults.history)
            },
            banner: !self.quiet,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Load a script file form by form
    Run { script: PathBuf },
    /// Start an interactive shell session
    Repl,
    /// Evaluate a snippet and print its value
    Eval { source: String },
}

fn main() -> Result<(), SprigError> {
    init_tracing();
    let args = Args::parse();
    let interpreter = Interpreter::with_bridge(host_bridge());

    match args.command {
        Some(Command::Run { script }) => {
            interpreter.load_file(interpreter.global_env(), &script)?;
            Ok(())
        }
        Some(Command::Eval { source }) => match interpreter.eval_source(&source) {
            Ok(value) => {
                println!("{}", interpreter.render(&value));
                Ok(())
            }
            Err(SprigError::Diagnostic(diag)) => {
                eprint!("{}", diag.render(&source));
                std::process::exit(1)
            }
            Err(err) => Err(err),
        },
        Some(Command::Repl) => Repl::new(interpreter, args.shell.into_config()).run(),
        None => {
            for path in &args.files {
                if let Err(err) = interpreter.load_file(interpreter.global_env(), path) {
                    eprintln!("error: {err}");
                }
            }
            if args.no_repl {
                return Ok(());
            }
            Repl::new(interpreter, args.shell.into_config()).run()
        }
    }
}

/// Stand-in host with the usual framework singletons bound by name.
fn host_bridge() -> RecordingBridge {
    [
        ("gSystem", "System"),
        ("gInterpreter", "Interpreter"),
        ("gROOT", "Root"),
        ("gFile", "File"),
        ("gPad", "Pad"),
        ("gDirectory", "Directory"),
        ("gRandom", "Random"),
    ]
    .into_iter()
    .fold(RecordingBridge::new().with_echo(true), |bridge, (name, class)| {
        bridge.with_global_object(name, class)
    })
    .with_global_method("dump", "Dump")
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let Some(directives) = std::env::var("SPRIG_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
    else {
        return;
    };
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .with(EnvFilter::new(directives))
        .init();
}
