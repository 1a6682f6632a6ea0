//! Test engine that replays scripted replies.

use super::{CompileOptions, Engine, EngineError, EngineOutput, EvalRequest, ModuleSource};
use crate::error::CompileError;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

pub(crate) enum Reply {
    Output(EngineOutput),
    Error(EngineError),
    Sleep(Duration),
    Panic(&'static str),
}

#[derive(Default)]
pub(crate) struct ScriptedEngine {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<EvalRequest>>,
    compile_error: Option<CompileError>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, reply: Reply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn failing_compile(mut self, err: CompileError) -> Self {
        self.compile_error = Some(err);
        self
    }

    pub fn requests(&self) -> Vec<EvalRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Engine for ScriptedEngine {
    type Modules = Vec<String>;

    fn compile(
        &self,
        modules: &[ModuleSource<'_>],
        _options: CompileOptions<'_>,
    ) -> Result<Vec<String>, CompileError> {
        if let Some(err) = &self.compile_error {
            return Err(err.clone());
        }
        Ok(modules.iter().map(|m| m.name.to_string()).collect())
    }

    fn evaluate(
        &self,
        _modules: &Vec<String>,
        request: EvalRequest,
    ) -> Result<EngineOutput, EngineError> {
        self.requests.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::Error(err)) => Err(err),
            Some(Reply::Sleep(duration)) => {
                std::thread::sleep(duration);
                Ok(EngineOutput::default())
            }
            Some(Reply::Panic(msg)) => panic!("{msg}"),
            None => Ok(EngineOutput::default()),
        }
    }
}
