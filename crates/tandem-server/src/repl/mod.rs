//! Interactive shell loop with line editing and history.

use std::borrow::Cow;
use std::path::PathBuf;

use anyhow::Result;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, EditMode, Editor, Helper};

use crate::config::ServerConfig;
use crate::shell::{Reply, Shell, COMMAND_NAMES};

/// Completes command names in the first word of a line.
struct ReplHelper;

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let word = &line[..pos];
        if word.contains(char::is_whitespace) {
            return Ok((pos, Vec::new()));
        }

        let matches = COMMAND_NAMES
            .iter()
            .filter(|name| name.starts_with(word))
            .map(|name| Pair {
                display: (*name).to_string(),
                replacement: (*name).to_string(),
            })
            .collect();
        Ok((0, matches))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;
}

impl Highlighter for ReplHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Borrowed(line)
    }
}

impl Validator for ReplHelper {}

impl Helper for ReplHelper {}

/// Interactive loop over a [`Shell`].
pub struct Repl {
    shell: Shell,
    editor: Editor<ReplHelper, DefaultHistory>,
    prompt: String,
    history_file: Option<PathBuf>,
}

impl Repl {
    /// Creates the loop, loading history if configured.
    pub fn new(shell: Shell, config: &ServerConfig) -> Result<Self> {
        let rl_config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .max_history_size(1000)?
            .build();

        let mut editor = Editor::with_config(rl_config)?;
        editor.set_helper(Some(ReplHelper));

        if let Some(path) = &config.history_file {
            if path.exists() {
                if let Err(e) = editor.load_history(path) {
                    tracing::debug!("Failed to load history: {}", e);
                }
            }
        }

        Ok(Self {
            shell,
            editor,
            prompt: config.prompt.clone(),
            history_file: config.history_file.clone(),
        })
    }

    /// Reads and runs lines until `quit` or end of input.
    pub fn run(&mut self) -> Result<()> {
        println!("Tandem v{}", env!("CARGO_PKG_VERSION"));
        println!("Type 'help' for commands, 'quit' to leave.\n");

        loop {
            match self.editor.readline(&self.prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(line);

                    if !print_reply(self.shell.execute_line(line)) {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    tracing::error!("Readline error: {}", e);
                    break;
                }
            }
        }

        self.save_history();
        Ok(())
    }

    fn save_history(&mut self) {
        if let Some(path) = &self.history_file {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(e) = self.editor.save_history(path) {
                tracing::debug!("Failed to save history: {}", e);
            }
        }
    }
}

/// Prints a reply. Returns false when the shell should stop.
pub fn print_reply(reply: Reply) -> bool {
    match reply {
        Reply::Output(text) => println!("{text}"),
        Reply::Error(text) => eprintln!("{text}"),
        Reply::Empty => {}
        Reply::Quit => return false,
    }
    true
}
