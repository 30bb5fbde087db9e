//! Remote script fetching and sandboxed evaluation.
//!
//! Intervention sources are published as executable JavaScript whose
//! completion value is an array of records. The payload is evaluated inside
//! a boa interpreter that exposes nothing of the host: no module system, no
//! filesystem, no network. The few globals the scripts expect are stubbed
//! so that dynamic pattern generation degrades to "no patterns" instead of
//! throwing:
//!
//! - `module` is an empty object,
//! - `require(...)` yields a function that returns `[]`,
//! - `InterventionHelpers.matchPatternsForGoogle` / `matchPatternsForTLDs`
//!   return `[]`.
//!
//! Evaluation runs on its own thread under a wall-clock budget; a hung or
//! panicking script fails that import pair without taking the process down.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use boa_engine::object::builtins::JsArray;
use boa_engine::object::{FunctionObjectBuilder, ObjectInitializer};
use boa_engine::property::Attribute;
use boa_engine::{js_string, Context, JsResult, JsValue, NativeFunction, Source};

use crate::error::{Error, Result};
use crate::import::Intervention;

/// Bug reference meaning "no tracked bug"; such records are noise.
pub const UNTRACKED_BUG: &str = "0000000";

// Generous bound on script loops so a runaway source cannot spin the
// sandbox thread forever even past the wall-clock budget.
const LOOP_ITERATION_LIMIT: u64 = 1_000_000;
const RECURSION_LIMIT: usize = 256;

pub fn agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .build()
}

/// Fetch one source URL and evaluate its payload into valid records.
pub fn fetch_and_evaluate(
    agent: &ureq::Agent,
    url: &str,
    eval_timeout: Duration,
) -> Result<Vec<Intervention>> {
    log::debug!("fetching and importing {url}");

    let payload = agent
        .get(url)
        .call()
        .map_err(|e| Error::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .into_string()
        .map_err(|e| Error::Fetch {
            url: url.to_string(),
            reason: format!("failed to read response body: {e}"),
        })?;

    evaluate(&payload, eval_timeout).map_err(|reason| Error::Evaluation {
        url: url.to_string(),
        reason,
    })
}

/// Evaluate a script payload into records, bounded by `timeout`.
///
/// The interpreter is confined to a dedicated thread so that neither a
/// stuck script nor a panic inside the engine can escape into the caller.
fn evaluate(payload: &str, timeout: Duration) -> std::result::Result<Vec<Intervention>, String> {
    let payload = payload.to_string();
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("intervention-eval".to_string())
        .spawn(move || {
            let _ = tx.send(eval_in_sandbox(&payload));
        })
        .map_err(|e| format!("failed to spawn evaluation thread: {e}"))?;

    let value = match rx.recv_timeout(timeout) {
        Ok(result) => result?,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            return Err(format!(
                "evaluation exceeded time budget of {}",
                humantime::format_duration(timeout)
            ));
        }
        // sender dropped without a result: the sandbox thread panicked
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            return Err("evaluation aborted inside the sandbox".to_string());
        }
    };

    let records: Vec<Intervention> = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)
            .map_err(|e| format!("script did not yield the expected record shape: {e}"))?,
        other => {
            return Err(format!(
                "script evaluated to {} instead of an array",
                type_name(&other)
            ));
        }
    };

    Ok(records
        .into_iter()
        .filter(|record| record.bug != UNTRACKED_BUG)
        .collect())
}

fn eval_in_sandbox(payload: &str) -> std::result::Result<serde_json::Value, String> {
    let mut context = Context::default();
    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(LOOP_ITERATION_LIMIT);
    context
        .runtime_limits_mut()
        .set_recursion_limit(RECURSION_LIMIT);

    install_stubs(&mut context).map_err(|e| e.to_string())?;

    let value = context
        .eval(Source::from_bytes(payload))
        .map_err(|e| e.to_string())?;

    if value.is_undefined() {
        return Err("script did not produce a value".to_string());
    }

    value.to_json(&mut context).map_err(|e| e.to_string())
}

fn install_stubs(context: &mut Context) -> JsResult<()> {
    let module = ObjectInitializer::new(context).build();
    context.register_global_property(js_string!("module"), module, Attribute::all())?;

    context.register_global_callable(
        js_string!("require"),
        0,
        NativeFunction::from_fn_ptr(require_stub),
    )?;

    let helpers = ObjectInitializer::new(context)
        .function(
            NativeFunction::from_fn_ptr(empty_patterns),
            js_string!("matchPatternsForGoogle"),
            0,
        )
        .function(
            NativeFunction::from_fn_ptr(empty_patterns),
            js_string!("matchPatternsForTLDs"),
            0,
        )
        .build();
    context.register_global_property(js_string!("InterventionHelpers"), helpers, Attribute::all())?;

    Ok(())
}

// require("anything") -> a function that returns []
fn require_stub(_this: &JsValue, _args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let f = FunctionObjectBuilder::new(
        context.realm(),
        NativeFunction::from_fn_ptr(empty_patterns),
    )
    .build();
    Ok(f.into())
}

fn empty_patterns(_this: &JsValue, _args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    Ok(JsArray::new(context).into())
}

fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
