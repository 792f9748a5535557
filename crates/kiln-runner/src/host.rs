//! Host state and import linking.
//!
//! Every module imports the `rt` functions. Library imports are linked per
//! module from its import section, each one dispatching into
//! [`libraries::call`].

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use kiln_codegen::types::{MSG_BUDGET_EXHAUSTED, RT_MODULE};
use tracing::trace;
use wasmi::{Caller, Func, Linker, Memory, Module, StoreLimits, Val};

use crate::error::ExecutionError;
use crate::guest::Guest;
use crate::libraries;
use crate::tasks::TaskQueue;
use crate::value::Value;

/// Per-execution data carried by the wasmi store.
#[derive(Debug)]
pub struct HostState {
    pub(crate) limits: StoreLimits,
    pub(crate) deadline: Instant,
    pub(crate) deadline_ms: u64,
    /// Upper bound, in bytes, on any value the host reads or builds.
    pub(crate) max_value_bytes: usize,
    pub(crate) memory: Option<Memory>,
    pub(crate) alloc: Option<Func>,
    /// Function exports by name, for `task.spawn`.
    pub(crate) exports: BTreeMap<String, Func>,
    pub(crate) tasks: TaskQueue,
    /// The first failure a host function reported.
    pub(crate) failure: Option<ExecutionError>,
}

impl HostState {
    pub fn new(limits: StoreLimits, deadline: Duration, max_value_bytes: usize) -> Self {
        Self {
            limits,
            deadline: Instant::now() + deadline,
            deadline_ms: deadline.as_millis() as u64,
            max_value_bytes,
            memory: None,
            alloc: None,
            exports: BTreeMap::new(),
            tasks: TaskQueue::new(),
            failure: None,
        }
    }

    /// Restart the wall clock.
    pub fn start_clock(&mut self) {
        self.deadline = Instant::now() + Duration::from_millis(self.deadline_ms);
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn timed_out(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Record `error` unless something failed earlier, and turn it into a
    /// wasmi error that unwinds the guest.
    pub fn fail(&mut self, error: ExecutionError) -> wasmi::Error {
        let message = error.to_string();
        self.failure.get_or_insert(error);
        wasmi::Error::new(message)
    }

    pub fn take_failure(&mut self) -> Option<ExecutionError> {
        self.failure.take()
    }
}

/// Run `f` against the caller's memory, recording any failure.
fn with_guest<R>(
    caller: &mut Caller<'_, HostState>,
    f: impl FnOnce(&mut Guest<&mut Caller<'_, HostState>>) -> Result<R, ExecutionError>,
) -> Result<R, wasmi::Error> {
    let result = Guest::new(&mut *caller).and_then(|mut guest| f(&mut guest));
    result.map_err(|error| caller.data_mut().fail(error))
}

/// Link the `rt` imports.
pub fn link_runtime(linker: &mut Linker<HostState>) -> Result<(), ExecutionError> {
    linker
        .func_wrap(
            RT_MODULE,
            "trap",
            |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> Result<(), wasmi::Error> {
                let message = with_guest(&mut caller, |guest| guest.read_bytes(ptr, len))?;
                let message = String::from_utf8_lossy(&message).into_owned();
                let error = if message == MSG_BUDGET_EXHAUSTED {
                    ExecutionError::BudgetExhausted
                } else {
                    ExecutionError::Panicked(message)
                };
                Err(caller.data_mut().fail(error))
            },
        )
        .map_err(link_error)?;

    linker
        .func_wrap(
            RT_MODULE,
            "deadline",
            |mut caller: Caller<'_, HostState>| -> Result<(), wasmi::Error> {
                let state = caller.data_mut();
                if state.timed_out() {
                    let error = ExecutionError::Timeout(state.deadline_ms);
                    return Err(state.fail(error));
                }
                Ok(())
            },
        )
        .map_err(link_error)?;

    linker
        .func_wrap(
            RT_MODULE,
            "to_string",
            |mut caller: Caller<'_, HostState>, v: i32| -> Result<i32, wasmi::Error> {
                with_guest(&mut caller, |guest| {
                    let text = guest.read(v)?.to_string();
                    guest.write(&Value::Str(text))
                })
            },
        )
        .map_err(link_error)?;

    linker
        .func_wrap(
            RT_MODULE,
            "concat",
            |mut caller: Caller<'_, HostState>, a: i32, b: i32| -> Result<i32, wasmi::Error> {
                with_guest(&mut caller, |guest| {
                    let text = format!("{}{}", guest.read(a)?, guest.read(b)?);
                    guest.write(&Value::Str(text))
                })
            },
        )
        .map_err(link_error)?;

    linker
        .func_wrap(
            RT_MODULE,
            "equals",
            |mut caller: Caller<'_, HostState>, a: i32, b: i32| -> Result<i32, wasmi::Error> {
                with_guest(&mut caller, |guest| {
                    Ok(i32::from(guest.read(a)?.equals(&guest.read(b)?)))
                })
            },
        )
        .map_err(link_error)?;

    Ok(())
}

/// Link one host function per library import of `module`.
pub fn link_libraries(linker: &mut Linker<HostState>, module: &Module) -> Result<(), ExecutionError> {
    for import in module.imports() {
        let (library, name) = (import.module(), import.name());
        if library == RT_MODULE {
            continue;
        }
        let Some(ty) = import.ty().func().cloned() else {
            return Err(ExecutionError::InvalidArtifact(format!(
                "import '{library}.{name}' is not a function"
            )));
        };
        if !libraries::provides(library, name, ty.params().len()) {
            return Err(ExecutionError::InvalidArtifact(format!(
                "no host function '{library}.{name}' with {} parameter(s)",
                ty.params().len()
            )));
        }
        trace!(library, name, "linking host function");

        let (lib, func) = (library.to_string(), name.to_string());
        linker
            .func_new(
                library,
                name,
                ty,
                move |mut caller: Caller<'_, HostState>,
                      params: &[Val],
                      results: &mut [Val]|
                      -> Result<(), wasmi::Error> {
                    let args: Vec<i32> = params.iter().filter_map(Val::i32).collect();
                    let ptr =
                        with_guest(&mut caller, |guest| libraries::call(guest, &lib, &func, &args))?;
                    if let Some(slot) = results.first_mut() {
                        *slot = Val::I32(ptr);
                    }
                    Ok(())
                },
            )
            .map_err(link_error)?;
    }
    Ok(())
}

fn link_error(error: impl std::fmt::Display) -> ExecutionError {
    ExecutionError::InvalidArtifact(error.to_string())
}
