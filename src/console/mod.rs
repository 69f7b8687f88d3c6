//! Line-oriented command interpreter driving a single queue handle.
//!
//! Every command runs against the real queue and against a plain `VecDeque`
//! model; after each change the two must agree and the queue's own
//! bookkeeping must check out. Allocations go through a [`Harness`] so leaks
//! and refused allocations are visible.

pub mod parser;
pub mod tokens;

use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use ansi_term::Color;
use tracing::{debug, info};

use crate::config::{OptionKey, Options};
use crate::error::{CommandError, QueueError};
use crate::handle::QueueHandle;
use crate::memory::{FailPolicy, Harness};
use crate::queue::Queue;
use parser::{help_lines, Command, Parser, Statement};
use tokens::tokenize;

pub type HarnessQueue = Queue<Arc<Harness>>;

pub struct Console<W: Write> {
    queue: Option<HarnessQueue>,
    model: VecDeque<Vec<u8>>,
    harness: Arc<Harness>,
    options: Options,
    out: W,
    errors: usize,
    quit: bool,
}

impl<W: Write> Console<W> {
    pub fn new(options: Options, out: W) -> Console<W> {
        let harness = Arc::new(Harness::with_seed(options.seed));
        let console = Console {
            queue: None,
            model: VecDeque::new(),
            harness,
            options,
            out,
            errors: 0,
            quit: false,
        };
        console.apply_fail_policy();
        console
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn has_quit(&self) -> bool {
        self.quit
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn harness(&self) -> &Harness {
        &self.harness
    }

    pub fn queue(&self) -> Option<&HarnessQueue> {
        self.queue.as_ref()
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Parses and runs every command in `source`.
    ///
    /// Command failures are reported and counted; only reaching the error
    /// limit, or a source that does not parse, stops the run early.
    pub fn run_source(&mut self, source: &str, filename: &str) -> Result<(), CommandError> {
        let tokens = tokenize(source, filename)?;
        let statements = Parser::new(tokens, filename).parse()?;
        for statement in statements {
            if self.quit {
                break;
            }
            self.run_statement(&statement)?;
        }
        Ok(())
    }

    /// Runs one interactively typed line. Parse errors are reported and
    /// counted like failed commands instead of being returned.
    pub fn run_line(&mut self, line: &str) -> Result<(), CommandError> {
        match self.run_source(line, "stdin") {
            Ok(()) => Ok(()),
            Err(err @ (CommandError::ErrorLimit(_) | CommandError::Io(_))) => Err(err),
            Err(err) => {
                self.report(&err)?;
                if self.errors >= self.options.error_limit {
                    return Err(CommandError::ErrorLimit(self.options.error_limit));
                }
                Ok(())
            }
        }
    }

    pub fn run_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), CommandError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        info!(path = %path.display(), "running script");
        self.run_source(&source, &path.display().to_string())
    }

    fn run_statement(&mut self, statement: &Statement) -> Result<(), CommandError> {
        if self.options.echo {
            writeln!(self.out, "cmd> {}", statement.text)?;
        }
        let result = self
            .execute(&statement.command)
            .and_then(|_| self.verify(&statement.command));
        match result {
            Ok(()) => Ok(()),
            // the error limit of a nested script must stop the outer one too
            Err(CommandError::ErrorLimit(limit)) => Err(CommandError::ErrorLimit(limit)),
            Err(err) => {
                debug!(line = statement.line, error = %err, "command failed");
                self.report(&err)?;
                if self.errors >= self.options.error_limit {
                    return Err(CommandError::ErrorLimit(self.options.error_limit));
                }
                Ok(())
            }
        }
    }

    /// Reports a suspicious but permitted command without counting an error.
    fn warn(&mut self, message: &str) -> Result<(), CommandError> {
        writeln!(
            self.out,
            "{}: {}",
            Color::Yellow.bold().paint("Warning"),
            message
        )?;
        Ok(())
    }

    fn report(&mut self, err: &CommandError) -> Result<(), CommandError> {
        self.errors += 1;
        writeln!(
            self.out,
            "{}: {}",
            Color::Red.bold().paint("ERROR"),
            Color::White.bold().paint(err.to_string())
        )?;
        Ok(())
    }

    pub fn execute(&mut self, command: &Command) -> Result<(), CommandError> {
        match command {
            Command::New => {
                if self.queue.is_some() {
                    self.free_queue()?;
                }
                self.queue = Some(Queue::with_allocator(Arc::clone(&self.harness))?);
                self.model.clear();
            }
            Command::Free => self.free_queue()?,
            Command::InsertHead { value, count } => self.insert(value, *count, true)?,
            Command::InsertTail { value, count } => self.insert(value, *count, false)?,
            Command::RemoveHead { expected } => self.remove(expected.as_deref())?,
            Command::RemoveHeadQuiet => {
                self.queue.q_remove_head(None)?;
                self.model.pop_front();
            }
            Command::Reverse => {
                if self.queue.is_none() {
                    return self.warn("Calling reverse on null queue");
                }
                self.queue.q_reverse();
                self.model.make_contiguous().reverse();
            }
            Command::Sort => {
                if self.queue.is_none() {
                    return self.warn("Calling sort on null queue");
                }
                self.queue.q_sort();
                self.model.make_contiguous().sort();
            }
            Command::Size { expected } => {
                let size = self.queue.q_size();
                if self.options.verbose > 0 {
                    writeln!(self.out, "Queue size = {}", size)?;
                }
                if let Some(expected) = expected {
                    if *expected != size {
                        return Err(CommandError::Check(format!(
                            "Computed queue size as {}, but expected {}",
                            size, expected
                        )));
                    }
                }
            }
            Command::Show => self.show()?,
            Command::Option { name, value } => self.option(name.as_deref(), *value)?,
            Command::Source(path) => self.run_file(path)?,
            Command::Help => {
                for line in help_lines() {
                    writeln!(self.out, "\t{}", line)?;
                }
            }
            Command::Quit => {
                self.quit = true;
            }
        }
        Ok(())
    }

    fn require_queue(&self) -> Result<(), CommandError> {
        match self.queue {
            Some(_) => Ok(()),
            None => Err(QueueError::InvalidHandle.into()),
        }
    }

    fn insert(&mut self, value: &str, count: usize, at_head: bool) -> Result<(), CommandError> {
        let bytes = value.as_bytes();
        for _ in 0..count {
            let result = if at_head {
                self.queue.q_insert_head(bytes)
            } else {
                self.queue.q_insert_tail(bytes)
            };
            match result {
                Ok(()) => {
                    if at_head {
                        self.model.push_front(bytes.to_vec());
                    } else {
                        self.model.push_back(bytes.to_vec());
                    }
                }
                // refused on purpose by the harness: not a queue error
                Err(err) if err.is_allocation_failure() && self.options.fail_percent > 0 => {
                    if self.options.verbose > 1 {
                        writeln!(self.out, "Insertion of {} refused: {}", value, err)?;
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn remove(&mut self, expected: Option<&str>) -> Result<(), CommandError> {
        let mut buffer = vec![0xffu8; self.options.length];
        let copied = self.queue.q_remove_head(Some(&mut buffer))?;
        let removed = self.model.pop_front().unwrap_or_default();

        if !buffer.is_empty() && buffer[copied] != 0 {
            return Err(CommandError::Check(
                "Removed value was not NUL terminated".into(),
            ));
        }
        let got = &buffer[..copied];
        let limit = buffer.len().saturating_sub(1);
        let want = &removed[..removed.len().min(limit)];
        let got_text = String::from_utf8_lossy(got).into_owned();
        if self.options.verbose > 0 {
            writeln!(self.out, "Removed {} from queue", got_text)?;
        }
        if got != want {
            return Err(CommandError::Check(format!(
                "Removed value {} does not match the head of the queue {}",
                got_text,
                String::from_utf8_lossy(want)
            )));
        }
        if let Some(expected) = expected {
            if got_text != expected {
                return Err(CommandError::Check(format!(
                    "Removed value {} does not match expected value {}",
                    got_text, expected
                )));
            }
        }
        Ok(())
    }

    fn free_queue(&mut self) -> Result<(), CommandError> {
        self.require_queue()?;
        self.queue.q_free();
        self.model.clear();
        self.harness.check_leaks()?;
        Ok(())
    }

    fn show(&mut self) -> Result<(), CommandError> {
        let rendered = match &self.queue {
            None => "q = NULL".to_string(),
            Some(q) => {
                let items: Vec<_> = q.iter().map(String::from_utf8_lossy).collect();
                format!("q = [{}]", items.join(" "))
            }
        };
        writeln!(self.out, "{}", rendered)?;
        Ok(())
    }

    fn option(&mut self, name: Option<&str>, value: Option<i64>) -> Result<(), CommandError> {
        match (name, value) {
            (None, _) => {
                writeln!(self.out, "Options:")?;
                for name in Options::names() {
                    let info = Options::lookup(name)?;
                    let current = self.options.get(name)?;
                    writeln!(self.out, "\t{}\t{}\t{}", name, current, info.description)?;
                }
            }
            (Some(name), None) => {
                let current = self.options.get(name)?;
                writeln!(self.out, "{} = {}", name, current)?;
            }
            (Some(name), Some(value)) => match self.options.set(name, value)? {
                OptionKey::Malloc => self.apply_fail_policy(),
                OptionKey::Seed => self.harness.reseed(self.options.seed),
                _ => {}
            },
        }
        Ok(())
    }

    fn apply_fail_policy(&self) {
        let policy = match self.options.fail_percent {
            0 => FailPolicy::Never,
            p => FailPolicy::Percent(p),
        };
        self.harness.set_policy(policy);
    }

    /// Checks the queue against the model after a command that may change it.
    fn verify(&mut self, command: &Command) -> Result<(), CommandError> {
        if !command.mutates() {
            return Ok(());
        }
        if let Some(q) = &self.queue {
            q.check_invariants()?;
            if q.len() != self.model.len() || !q.iter().eq(self.model.iter().map(Vec::as_slice)) {
                return Err(CommandError::Check(format!(
                    "Queue contents {:?} differ from expected {:?}",
                    q,
                    self.model
                        .iter()
                        .map(|s| String::from_utf8_lossy(s))
                        .collect::<Vec<_>>()
                )));
            }
            if matches!(command, Command::Sort) && !is_sorted(q) {
                return Err(CommandError::Check("Queue is not sorted in ascending order".into()));
            }
        }
        if self.options.verbose > 1 {
            self.show()?;
        }
        Ok(())
    }

    /// Frees any remaining queue and checks that nothing leaked.
    pub fn finish(&mut self) -> Result<usize, CommandError> {
        self.queue.q_free();
        self.model.clear();
        if let Err(err) = self.harness.check_leaks() {
            self.report(&CommandError::from(err))?;
        }
        let stats = self.harness.stats();
        info!(
            acquired = stats.acquired,
            released = stats.released,
            refused = stats.refused,
            errors = self.errors,
            "console finished"
        );
        Ok(self.errors)
    }
}

fn is_sorted(q: &HarnessQueue) -> bool {
    let mut previous: Option<&[u8]> = None;
    for current in q.iter() {
        if let Some(previous) = previous {
            if previous > current {
                return false;
            }
        }
        previous = Some(current);
    }
    true
}
