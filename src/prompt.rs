// SPDX-License-Identifier: GPL-3.0-only

//! Interactive questions
//!
//! Every question the tool asks goes through [`Prompter`], so the flow can be
//! driven from a terminal or from a script in tests.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Source of answers to interactive questions
pub trait Prompter {
    /// Ask for a free-form value. An empty answer is returned as-is; callers
    /// substitute their own default.
    fn ask(&mut self, question: &str, default: &str) -> io::Result<String>;

    /// Ask a yes/no question
    fn confirm(&mut self, question: &str, default_yes: bool) -> io::Result<bool>;
}

/// Prompter reading from stdin and writing to stdout
pub struct TerminalPrompter {
    /// Answer every confirmation with its default without asking
    pub assume_defaults: bool,
}

impl TerminalPrompter {
    pub fn new(assume_defaults: bool) -> Self {
        Self { assume_defaults }
    }

    fn read_line(&self) -> io::Result<String> {
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "standard input closed",
            ));
        }
        Ok(line.trim().to_string())
    }
}

impl Prompter for TerminalPrompter {
    fn ask(&mut self, question: &str, default: &str) -> io::Result<String> {
        if default.is_empty() {
            print!("{}: ", question);
        } else {
            print!("{} [{}]: ", question, default);
        }
        io::stdout().flush()?;
        self.read_line()
    }

    fn confirm(&mut self, question: &str, default_yes: bool) -> io::Result<bool> {
        let hint = if default_yes { "Y/n" } else { "y/N" };
        if self.assume_defaults {
            println!("{} [{}]: {}", question, hint, if default_yes { "y" } else { "n" });
            return Ok(default_yes);
        }

        print!("{} [{}]: ", question, hint);
        io::stdout().flush()?;
        let answer = self.read_line()?;
        Ok(parse_yes_no(&answer).unwrap_or(default_yes))
    }
}

/// Interpret a yes/no answer; `None` for empty or unrecognised input
pub fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Prompter answering from a fixed script
///
/// Free-form answers and confirmations are consumed from separate queues.
/// Running out of answers is reported as end of input.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    confirmations: VecDeque<bool>,
    /// Every question asked, in order
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I, confirmations: impl IntoIterator<Item = bool>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            confirmations: confirmations.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    fn exhausted() -> io::Error {
        io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted")
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str, _default: &str) -> io::Result<String> {
        self.asked.push(question.to_string());
        self.answers.pop_front().ok_or_else(Self::exhausted)
    }

    fn confirm(&mut self, question: &str, _default_yes: bool) -> io::Result<bool> {
        self.asked.push(question.to_string());
        self.confirmations.pop_front().ok_or_else(Self::exhausted)
    }
}
