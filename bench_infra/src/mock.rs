// Copyright © 2026 The node-bench Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! A scripted [`Executor`] for exercising the runners without touching the
//! host. Queued outcomes are consumed first, then every further command is
//! answered by the responder (an empty successful output unless replaced).

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::exec::{ExecError, Executor, ToolCommand, ToolOutput};

type Responder = Box<dyn Fn(&ToolCommand) -> Result<ToolOutput, ExecError> + Send + Sync>;

pub struct ScriptedExecutor {
    script: Mutex<VecDeque<Result<ToolOutput, ExecError>>>,
    responder: Responder,
    calls: Mutex<Vec<ToolCommand>>,
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::responding(|_| Ok(ToolOutput::ok("")))
    }
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn responding<F>(responder: F) -> Self
    where
        F: Fn(&ToolCommand) -> Result<ToolOutput, ExecError> + Send + Sync + 'static,
    {
        ScriptedExecutor {
            script: Mutex::new(VecDeque::new()),
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, outcome: Result<ToolOutput, ExecError>) -> &Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    pub fn push_output(&self, output: ToolOutput) -> &Self {
        self.push(Ok(output))
    }

    /// Every command seen so far, in invocation order.
    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Commands rendered as command lines, handy for assertions.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.to_string())
            .collect()
    }
}

impl Executor for ScriptedExecutor {
    fn output(&self, command: &ToolCommand) -> Result<ToolOutput, ExecError> {
        self.calls.lock().unwrap().push(command.clone());
        let scripted = self.script.lock().unwrap().pop_front();
        match scripted {
            Some(outcome) => outcome,
            None => (self.responder)(command),
        }
    }
}
