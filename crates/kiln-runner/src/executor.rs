//! Loading and running one artifact.

use std::collections::BTreeMap;
use std::time::Instant;

use kiln_binder::EntryPoint;
use kiln_codegen::types::{EXPORT_ALLOC, EXPORT_GAS_LIMIT, EXPORT_MEMORY};
use kiln_codegen::CompiledArtifact;
use tracing::{debug, warn};
use wasmi::core::TrapCode;
use wasmi::{Config, Engine, Func, Instance, Linker, Module, Store, StoreLimitsBuilder, Val};

use crate::config::ExecutorConfig;
use crate::console;
use crate::error::ExecutionError;
use crate::guest::Guest;
use crate::host::{self, HostState};
use crate::result::ExecutionResult;
use crate::value::Value;

/// Runs compiled artifacts in-process under [`ExecutorConfig`] limits.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Load `artifact`, call its entry point with `args` and report what it
    /// printed. The console is captured only while the guest runs.
    pub fn execute(
        &self,
        artifact: &CompiledArtifact,
        args: &[String],
    ) -> Result<ExecutionResult, ExecutionError> {
        if artifact.is_empty() {
            return Err(ExecutionError::EmptyArtifact);
        }
        let entry = artifact.entry().cloned();

        let mut engine_config = Config::default();
        if self.config.fuel.is_some() {
            engine_config.consume_fuel(true);
        }
        let engine = Engine::new(&engine_config);
        let module = Module::new(&engine, artifact.bytes())
            .map_err(|e| ExecutionError::InvalidArtifact(e.to_string()))?;

        let mut store = self.new_store(&engine)?;
        let instance = self.instantiate(&engine, &module, &mut store)?;

        let (entry, func) = locate_entry(entry, &instance, &store)?;
        debug!(
            export = %entry.export,
            params = entry.params,
            returns_task = entry.returns_task,
            "calling entry point"
        );

        let capture = console::capture();
        store.data_mut().start_clock();
        let started = Instant::now();
        let outcome = invoke(&mut store, func, &entry, args);
        let elapsed = started.elapsed();
        let output = capture.finish();

        match outcome {
            Ok(()) => {
                debug!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    output_bytes = output.len(),
                    "execution finished"
                );
                Ok(ExecutionResult::success(output, elapsed.as_millis() as i64))
            }
            Err(error) => {
                warn!(%error, "guest execution failed");
                Err(error)
            }
        }
    }

    fn new_store(&self, engine: &Engine) -> Result<Store<HostState>, ExecutionError> {
        let limits = StoreLimitsBuilder::new()
            .memory_size(self.config.max_memory_bytes())
            .build();
        let mut store = Store::new(engine, HostState::new(
            limits,
            self.config.deadline,
            self.config.max_memory_bytes(),
        ));
        store.limiter(|state| &mut state.limits);
        if let Some(fuel) = self.config.fuel {
            store
                .set_fuel(fuel)
                .map_err(|e| ExecutionError::InvalidArtifact(e.to_string()))?;
        }
        Ok(store)
    }

    fn instantiate(
        &self,
        engine: &Engine,
        module: &Module,
        store: &mut Store<HostState>,
    ) -> Result<Instance, ExecutionError> {
        let mut linker = Linker::<HostState>::new(engine);
        host::link_runtime(&mut linker)?;
        host::link_libraries(&mut linker, module)?;
        let instance = linker
            .instantiate(&mut *store, module)
            .and_then(|pre| pre.start(&mut *store))
            .map_err(|e| ExecutionError::InvalidArtifact(e.to_string()))?;

        let exports: BTreeMap<String, Func> = instance
            .exports(&*store)
            .filter_map(|export| {
                let name = export.name().to_string();
                export.into_func().map(|func| (name, func))
            })
            .collect();
        let memory = instance.get_memory(&*store, EXPORT_MEMORY);
        let alloc = instance.get_func(&*store, EXPORT_ALLOC);
        let state = store.data_mut();
        state.memory = memory;
        state.alloc = alloc;
        state.exports = exports;

        if let Some(gas_limit) = instance.get_global(&*store, EXPORT_GAS_LIMIT) {
            gas_limit
                .set(&mut *store, Val::I32(self.config.gas_limit as i32))
                .map_err(|e| ExecutionError::InvalidArtifact(e.to_string()))?;
        }
        Ok(instance)
    }
}

/// The entry descriptor and its export, checked against each other.
fn locate_entry(
    entry: Option<EntryPoint>,
    instance: &Instance,
    store: &Store<HostState>,
) -> Result<(EntryPoint, Func), ExecutionError> {
    let entry = entry.ok_or(ExecutionError::EntryPointMissing)?;
    let func = instance
        .get_func(store, &entry.export)
        .ok_or(ExecutionError::EntryPointMissing)?;
    let ty = func.ty(store);
    if ty.params().len() != entry.params as usize || ty.results().len() != 1 {
        return Err(ExecutionError::EntryPointMissing);
    }
    Ok((entry, func))
}

fn invoke(
    store: &mut Store<HostState>,
    func: Func,
    entry: &EntryPoint,
    args: &[String],
) -> Result<(), ExecutionError> {
    let mut params = Vec::new();
    if entry.params == 1 {
        let list = Value::List(args.iter().cloned().map(Value::Str).collect());
        let ptr = Guest::new(&mut *store)
            .and_then(|mut guest| guest.write(&list))
            .map_err(|e| settle(store, e))?;
        params.push(Val::I32(ptr));
    }

    let mut results = [Val::I32(0)];
    func.call(&mut *store, &params, &mut results)
        .map_err(|e| classify(store, e))?;

    if entry.returns_task {
        let ptr = results[0].i32().unwrap_or(0);
        let returned = Guest::new(&mut *store).and_then(|guest| guest.read(ptr))?;
        if let Value::Task(id) = returned {
            drive_tasks(store, id)?;
        }
    }
    Ok(())
}

/// Run queued tasks in order until `target` has completed.
fn drive_tasks(store: &mut Store<HostState>, target: u32) -> Result<(), ExecutionError> {
    while !store.data().tasks.is_done(target) {
        let Some((id, func)) = store.data_mut().tasks.next() else {
            break;
        };
        let mut results = [Val::I32(0)];
        func.call(&mut *store, &[], &mut results)
            .map_err(|e| classify(store, e))?;
        store
            .data_mut()
            .tasks
            .complete(id, results[0].i32().unwrap_or(0));
        debug!(task = id, "task completed");
    }
    Ok(())
}

/// A failure a host function recorded wins over the error it caused.
fn settle(store: &mut Store<HostState>, error: ExecutionError) -> ExecutionError {
    store.data_mut().take_failure().unwrap_or(error)
}

fn classify(store: &mut Store<HostState>, error: wasmi::Error) -> ExecutionError {
    if let Some(failure) = store.data_mut().take_failure() {
        return failure;
    }
    if error.as_trap_code() == Some(TrapCode::OutOfFuel) || matches!(store.get_fuel(), Ok(0)) {
        return ExecutionError::BudgetExhausted;
    }
    ExecutionError::Trap(error.to_string())
}
