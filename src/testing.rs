//! Test doubles for the external command seam.

use crate::exec::{Command, CommandRunner, Error, Output};
use crate::settings::Settings;
use std::cell::RefCell;

type Responder = Box<dyn Fn(&Command) -> Option<Result<Output, Error>>>;

/// Records every command and answers from scripted responders.
/// Commands no responder claims succeed with empty output.
#[derive(Default)]
pub struct FakeRunner {
    calls: RefCell<Vec<Command>>,
    responders: Vec<Responder>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responders are consulted in registration order; the first `Some` wins.
    pub fn respond(
        mut self,
        responder: impl Fn(&Command) -> Option<Result<Output, Error>> + 'static,
    ) -> Self {
        self.responders.push(Box::new(responder));
        self
    }

    /// Fail every command whose command line contains `pattern`.
    pub fn fail_on(self, pattern: &'static str, stderr: &'static str) -> Self {
        self.respond(move |cmd| line(cmd).contains(pattern).then(|| Err(failure(cmd, stderr))))
    }

    pub fn calls(&self) -> Vec<Command> {
        self.calls.borrow().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(line).collect()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, command: &Command) -> Result<Output, Error> {
        self.calls.borrow_mut().push(command.clone());
        self.responders
            .iter()
            .find_map(|responder| responder(command))
            .unwrap_or_else(|| Ok(Output::default()))
    }
}

/// Unredacted command line.
pub fn line(command: &Command) -> String {
    std::iter::once(command.program.as_str())
        .chain(command.args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn failure(command: &Command, stderr: &str) -> Error {
    Error::Failed {
        command: command.to_string(),
        code: Some(1),
        stderr: stderr.to_string(),
    }
}

/// Default settings without the leader-election pause.
pub fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.wait.leader_election_grace_secs = 0;
    settings
}
