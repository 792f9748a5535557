//! Host implementations of the standard libraries.
//!
//! List mutators work on guest cells in place so every alias of a list sees
//! the change. Everything else reads its arguments into [`Value`]s, computes
//! a result and writes it back as a fresh cell.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use kiln_types::LINE_TERMINATOR;
use tracing::debug;

use crate::console;
use crate::error::ExecutionError;
use crate::guest::{Guest, HostContext};
use crate::host::HostState;
use crate::value::Value;

/// Largest list `list.range` will build.
pub const MAX_RANGE: usize = 1_000_000;

/// `(library, function, arity)` for every function the host provides.
pub const HOST_FUNCTIONS: &[(&str, &str, usize)] = &[
    ("core", "print", 1),
    ("core", "println", 1),
    ("core", "panic", 1),
    ("core", "len", 1),
    ("core", "str", 1),
    ("core", "type_of", 1),
    ("string", "length", 1),
    ("string", "upper", 1),
    ("string", "lower", 1),
    ("string", "trim", 1),
    ("string", "contains", 2),
    ("string", "starts_with", 2),
    ("string", "split", 2),
    ("string", "replace", 3),
    ("string", "slice", 3),
    ("string", "byte_at", 2),
    ("list", "length", 1),
    ("list", "get", 2),
    ("list", "push", 2),
    ("list", "set", 3),
    ("list", "range", 2),
    ("list", "join", 2),
    ("list", "reverse", 1),
    ("convert", "to_number", 1),
    ("convert", "to_string", 1),
    ("math", "abs", 1),
    ("math", "sqrt", 1),
    ("math", "floor", 1),
    ("math", "ceil", 1),
    ("math", "round", 1),
    ("math", "pow", 2),
    ("math", "min", 2),
    ("math", "max", 2),
    ("fmt", "fixed", 2),
    ("fmt", "pad_left", 3),
    ("fmt", "pad_right", 3),
    ("time", "now_ms", 0),
    ("time", "sleep", 1),
    ("task", "spawn", 1),
    ("task", "completed", 1),
];

/// Whether the host implements `library.name` with `arity` parameters.
pub fn provides(library: &str, name: &str, arity: usize) -> bool {
    HOST_FUNCTIONS
        .iter()
        .any(|&(l, n, a)| l == library && n == name && a == arity)
}

/// Call a host library function on guest value pointers.
pub fn call<C: HostContext>(
    guest: &mut Guest<C>,
    library: &str,
    name: &str,
    args: &[i32],
) -> Result<i32, ExecutionError> {
    match (library, name, args) {
        ("list", "get", &[list, index]) => list_get(guest, list, index),
        ("list", "push", &[list, item]) => {
            let mut items = guest.list_items(list)?;
            items.push(item);
            guest.replace_items(list, &items)?;
            Ok(list)
        }
        ("list", "set", &[list, index, item]) => {
            let count = guest.list_items(list)?.len();
            let index = list_index(&guest.read(index)?, count)?;
            guest.set_item(list, index as i32, item)?;
            guest.write(&Value::Nil)
        }
        ("list", "reverse", &[list]) => {
            let mut items = guest.list_items(list)?;
            items.reverse();
            guest.new_list(&items)
        }
        ("time", "sleep", &[ms]) => {
            let ms = number_arg(&guest.read(ms)?, "time.sleep")?;
            sleep(guest.state(), ms)?;
            guest.write(&Value::Nil)
        }
        ("task", "spawn", &[function]) => {
            let name = guest.read(function)?;
            let id = spawn(guest, &name)?;
            guest.write(&Value::Task(id))
        }
        ("task", "completed", &[task]) => match guest.read(task)? {
            Value::Task(id) if guest.state().tasks.exists(id) => {
                let done = guest.state().tasks.is_done(id);
                guest.write(&Value::Bool(done))
            }
            other => Err(type_error("task.completed", "a task", &other)),
        },
        _ => {
            let values = args
                .iter()
                .map(|&ptr| guest.read(ptr))
                .collect::<Result<Vec<_>, _>>()?;
            let limit = guest.state().max_value_bytes;
            let result = call_pure(library, name, &values, limit)?;
            guest.write(&result)
        }
    }
}

/// Functions that only read their arguments. Strings they build may not
/// exceed `limit` bytes.
fn call_pure(
    library: &str,
    name: &str,
    args: &[Value],
    limit: usize,
) -> Result<Value, ExecutionError> {
    let qualified = format!("{library}.{name}");
    let value = match (library, name, args) {
        // ── core ─────────────────────────────────────────────────────────
        ("core", "print", [v]) => {
            console::write(&v.to_string());
            Value::Nil
        }
        ("core", "println", [v]) => {
            console::write(&format!("{v}{LINE_TERMINATOR}"));
            Value::Nil
        }
        ("core", "panic", [v]) => return Err(ExecutionError::Panicked(v.to_string())),
        ("core", "len", [v]) | ("string", "length", [v]) | ("list", "length", [v]) => match v {
            Value::Str(s) if library != "list" => Value::Number(s.chars().count() as f64),
            Value::List(items) if library != "string" => Value::Number(items.len() as f64),
            other => return Err(type_error(&qualified, "a string or list", other)),
        },
        ("core", "str", [v]) | ("convert", "to_string", [v]) => Value::Str(v.to_string()),
        ("core", "type_of", [v]) => Value::Str(v.type_name().to_string()),

        // ── string ───────────────────────────────────────────────────────
        ("string", "upper", [s]) => Value::Str(str_arg(s, &qualified)?.to_uppercase()),
        ("string", "lower", [s]) => Value::Str(str_arg(s, &qualified)?.to_lowercase()),
        ("string", "trim", [s]) => Value::Str(str_arg(s, &qualified)?.trim().to_string()),
        ("string", "contains", [s, sub]) => {
            Value::Bool(str_arg(s, &qualified)?.contains(str_arg(sub, &qualified)?))
        }
        ("string", "starts_with", [s, prefix]) => {
            Value::Bool(str_arg(s, &qualified)?.starts_with(str_arg(prefix, &qualified)?))
        }
        ("string", "split", [s, sep]) => {
            let (s, sep) = (str_arg(s, &qualified)?, str_arg(sep, &qualified)?);
            let parts: Vec<Value> = if sep.is_empty() {
                s.chars().map(|c| Value::Str(c.to_string())).collect()
            } else {
                s.split(sep).map(|p| Value::Str(p.to_string())).collect()
            };
            Value::List(parts)
        }
        ("string", "replace", [s, from, to]) => {
            let s = str_arg(s, &qualified)?;
            let from = str_arg(from, &qualified)?;
            let to = str_arg(to, &qualified)?;
            if from.is_empty() {
                Value::Str(s.to_string())
            } else {
                let grown = s.matches(from).count().saturating_mul(to.len());
                ensure_fits(&qualified, s.len().saturating_add(grown), limit)?;
                Value::Str(s.replace(from, to))
            }
        }
        ("string", "slice", [s, start, end]) => {
            let chars: Vec<char> = str_arg(s, &qualified)?.chars().collect();
            let clamp = |v: &Value| -> Result<usize, ExecutionError> {
                let n = number_arg(v, &qualified)?;
                Ok(n.max(0.0).min(chars.len() as f64) as usize)
            };
            let (start, end) = (clamp(start)?, clamp(end)?);
            if start >= end {
                Value::Str(String::new())
            } else {
                Value::Str(chars[start..end].iter().collect())
            }
        }
        ("string", "byte_at", [s, index]) => {
            let s = str_arg(s, &qualified)?;
            let index = number_arg(index, &qualified)?;
            if index < 0.0 || index.fract() != 0.0 {
                Value::Nil
            } else {
                s.as_bytes()
                    .get(index as usize)
                    .map_or(Value::Nil, |&b| Value::Number(f64::from(b)))
            }
        }

        // ── list ─────────────────────────────────────────────────────────
        ("list", "range", [start, end]) => {
            let start = number_arg(start, &qualified)?.floor();
            let end = number_arg(end, &qualified)?.floor();
            let count = (end - start).max(0.0);
            if count > MAX_RANGE as f64 {
                return Err(ExecutionError::Trap(format!(
                    "list.range: more than {MAX_RANGE} elements"
                )));
            }
            Value::List(
                (0..count as usize)
                    .map(|i| Value::Number(start + i as f64))
                    .collect(),
            )
        }
        ("list", "join", [list, sep]) => {
            let Value::List(items) = list else {
                return Err(type_error(&qualified, "a list", list));
            };
            let sep = str_arg(sep, &qualified)?;
            let parts: Vec<String> = items.iter().map(Value::to_string).collect();
            let separators = parts.len().saturating_sub(1).saturating_mul(sep.len());
            let total = parts
                .iter()
                .fold(separators, |acc, part| acc.saturating_add(part.len()));
            ensure_fits(&qualified, total, limit)?;
            Value::Str(parts.join(sep))
        }

        // ── convert ──────────────────────────────────────────────────────
        ("convert", "to_number", [v]) => match v {
            Value::Number(n) => Value::Number(*n),
            Value::Bool(b) => Value::Number(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => s.trim().parse::<f64>().map_or(Value::Nil, Value::Number),
            _ => Value::Nil,
        },

        // ── math ─────────────────────────────────────────────────────────
        ("math", "abs", [n]) => Value::Number(number_arg(n, &qualified)?.abs()),
        ("math", "sqrt", [n]) => Value::Number(number_arg(n, &qualified)?.sqrt()),
        ("math", "floor", [n]) => Value::Number(number_arg(n, &qualified)?.floor()),
        ("math", "ceil", [n]) => Value::Number(number_arg(n, &qualified)?.ceil()),
        ("math", "round", [n]) => Value::Number(number_arg(n, &qualified)?.round()),
        ("math", "pow", [a, b]) => {
            Value::Number(number_arg(a, &qualified)?.powf(number_arg(b, &qualified)?))
        }
        ("math", "min", [a, b]) => {
            Value::Number(number_arg(a, &qualified)?.min(number_arg(b, &qualified)?))
        }
        ("math", "max", [a, b]) => {
            Value::Number(number_arg(a, &qualified)?.max(number_arg(b, &qualified)?))
        }

        // ── fmt ──────────────────────────────────────────────────────────
        ("fmt", "fixed", [n, digits]) => {
            let n = number_arg(n, &qualified)?;
            let digits = number_arg(digits, &qualified)?.clamp(0.0, 20.0) as usize;
            Value::Str(format!("{n:.digits$}"))
        }
        ("fmt", "pad_left", [v, width, fill]) => {
            Value::Str(pad(v, width, fill, true, &qualified, limit)?)
        }
        ("fmt", "pad_right", [v, width, fill]) => {
            Value::Str(pad(v, width, fill, false, &qualified, limit)?)
        }

        // ── time ─────────────────────────────────────────────────────────
        ("time", "now_ms", []) => {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as f64)
                .unwrap_or(0.0);
            Value::Number(now)
        }

        _ => {
            return Err(ExecutionError::InvalidArtifact(format!(
                "no host function '{qualified}' taking {} argument(s)",
                args.len()
            )))
        }
    };
    Ok(value)
}

// ══════════════════════════════════════════════════════════════════════════════
// Stateful functions
// ══════════════════════════════════════════════════════════════════════════════

fn list_get<C: HostContext>(
    guest: &mut Guest<C>,
    list: i32,
    index: i32,
) -> Result<i32, ExecutionError> {
    let items = guest.list_items(list)?;
    let index = list_index(&guest.read(index)?, items.len())?;
    Ok(items[index])
}

/// Validate a list index against `len`.
fn list_index(index: &Value, len: usize) -> Result<usize, ExecutionError> {
    let n = number_arg(index, "list index")?;
    if n.fract() != 0.0 || n < 0.0 || n >= len as f64 {
        return Err(ExecutionError::Trap(format!(
            "index {index} out of range for list of length {len}"
        )));
    }
    Ok(n as usize)
}

/// Sleep for `ms`, but never past the deadline.
fn sleep(state: &HostState, ms: f64) -> Result<(), ExecutionError> {
    let requested = Duration::from_millis(ms.max(0.0) as u64);
    let remaining = state.remaining();
    if requested > remaining {
        std::thread::sleep(remaining);
        return Err(ExecutionError::Timeout(state.deadline_ms));
    }
    std::thread::sleep(requested);
    Ok(())
}

/// Queue the exported zero-parameter function named by `name`.
fn spawn<C: HostContext>(guest: &mut Guest<C>, name: &Value) -> Result<u32, ExecutionError> {
    let Value::Str(name) = name else {
        return Err(type_error("task.spawn", "a function name", name));
    };
    let Some(function) = guest.state().exports.get(name.as_str()).copied() else {
        return Err(ExecutionError::Trap(format!(
            "task.spawn: no function named '{name}'"
        )));
    };
    if !function.ty(guest.context()).params().is_empty() {
        return Err(ExecutionError::Trap(format!(
            "task.spawn: '{name}' must take no parameters"
        )));
    }
    let id = guest.state_mut().tasks.spawn(function);
    debug!(task = id, function = %name, "task spawned");
    Ok(id)
}

// ══════════════════════════════════════════════════════════════════════════════
// Argument helpers
// ══════════════════════════════════════════════════════════════════════════════

fn str_arg<'v>(value: &'v Value, function: &str) -> Result<&'v str, ExecutionError> {
    value
        .as_str()
        .ok_or_else(|| type_error(function, "a string", value))
}

fn number_arg(value: &Value, function: &str) -> Result<f64, ExecutionError> {
    value
        .as_number()
        .ok_or_else(|| type_error(function, "a number", value))
}

fn pad(
    value: &Value,
    width: &Value,
    fill: &Value,
    left: bool,
    function: &str,
    limit: usize,
) -> Result<String, ExecutionError> {
    let text = value.to_string();
    let width = number_arg(width, function)?.max(0.0) as usize;
    let fill = str_arg(fill, function)?.chars().next().unwrap_or(' ');
    let missing = width.saturating_sub(text.chars().count());
    ensure_fits(
        function,
        missing.saturating_mul(fill.len_utf8()).saturating_add(text.len()),
        limit,
    )?;
    let padding: String = std::iter::repeat(fill).take(missing).collect();
    Ok(if left {
        padding + &text
    } else {
        text + &padding
    })
}

/// Reject a result of `bytes` before building it.
fn ensure_fits(function: &str, bytes: usize, limit: usize) -> Result<(), ExecutionError> {
    if bytes > limit {
        return Err(ExecutionError::Trap(format!(
            "{function}: result too large ({bytes} bytes, limit {limit})"
        )));
    }
    Ok(())
}

fn type_error(function: &str, expected: &str, got: &Value) -> ExecutionError {
    ExecutionError::Trap(format!(
        "{function} expected {expected}, got {}",
        got.type_name()
    ))
}
