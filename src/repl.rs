use std::path::PathBuf;

use rustyline::{error::ReadlineError, Config, DefaultEditor};

use crate::{
    diagnostics::{Result, SprigError},
    runtime::Interpreter,
};

const PROMPT: &str = "sprig> ";
const HISTORY_SIZE: usize = 500;

/// Shell settings collected from the command line.
#[derive(Debug, Clone)]
pub struct ReplConfig {
    /// Where line history persists between sessions; `None` keeps it in memory.
    pub history: Option<PathBuf>,
    pub banner: bool,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            history: default_history_path(),
            banner: true,
        }
    }
}

pub fn default_history_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".sprig_history"))
}

pub struct Repl {
    interpreter: Interpreter,
    config: ReplConfig,
}

impl Repl {
    pub fn new(interpreter: Interpreter, config: ReplConfig) -> Self {
        Self {
            interpreter,
            config,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let editor_config = Config::builder()
            .max_history_size(HISTORY_SIZE)?
            .auto_add_history(false)
            .build();
        let mut editor = DefaultEditor::with_config(editor_config)?;
        if let Some(path) = &self.config.history {
            if editor.load_history(path).is_err() {
                tracing::debug!(path = %path.display(), "no previous history");
            }
        }
        if self.config.banner {
            println!("sprig {}", env!("CARGO_PKG_VERSION"));
            println!("Press Ctrl+C or type :quit to exit\n");
        }

        loop {
            match editor.readline(PROMPT) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed == ":quit" || trimmed == ":exit" {
                        break;
                    }
                    if trimmed.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(trimmed).ok();
                    match self.interpreter.eval_source(trimmed) {
                        Ok(value) => println!("{}", self.interpreter.render(&value)),
                        Err(SprigError::Diagnostic(diag)) => eprint!("{}", diag.render(trimmed)),
                        Err(other) => eprintln!("error: {other}"),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }

        if let Some(path) = &self.config.history {
            if let Err(err) = editor.save_history(path) {
                tracing::warn!(path = %path.display(), %err, "could not save history");
            }
        }
        Ok(())
    }
}
