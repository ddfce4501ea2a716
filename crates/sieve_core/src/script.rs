//! Step scripts: turning user-authored body text into callables and back.
//!
//! A step body is a Rhai script. It runs with three variables in scope:
//!
//! - `element` / `e` - the current array element
//! - `index` / `i` - the element's position
//! - `list` / `l` - the whole array being processed
//!
//! `select` steps run their body with all three bound to unit and use the
//! returned value as a property name or array index.
//!
//! ```rhai
//! return e.x > 1;
//! ```
//!
//! The body text is the durable form of a step. The compiled program is a
//! cache derived from it and never leaves the process.

use std::fmt;
use std::sync::Arc;

use rhai::{Dynamic, Engine, EvalAltResult, Scope, AST, INT};
use serde::Serialize;
use serde_json::Value;
use sieve_logging::{sieve_debug, sieve_info};

use crate::CompileError;

/// Body installed on every freshly added step.
pub const DEFAULT_BODY: &str = "return element;";

const BINDINGS: [(&str, &str); 3] = [("element", "e"), ("index", "i"), ("list", "l")];

/// The compiled form of a step body, or the reason it has none.
#[derive(Clone)]
enum Program {
    Compiled(Arc<AST>),
    Broken(CompileError),
}

/// A step's transform: its source body plus the program compiled from it.
#[derive(Clone)]
pub struct Transform {
    body: String,
    program: Program,
}

impl Transform {
    /// Keeps the text of a body that failed to compile so it can still be
    /// persisted and edited. Broken transforms are skipped by the executor.
    pub(crate) fn broken(body: impl Into<String>, error: CompileError) -> Self {
        Self {
            body: body.into(),
            program: Program::Broken(error),
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn compiled(&self) -> Option<&AST> {
        match &self.program {
            Program::Compiled(ast) => Some(ast),
            Program::Broken(_) => None,
        }
    }

    pub fn compile_error(&self) -> Option<&CompileError> {
        match &self.program {
            Program::Compiled(_) => None,
            Program::Broken(error) => Some(error),
        }
    }

    pub fn is_broken(&self) -> bool {
        matches!(self.program, Program::Broken(_))
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("body", &self.body)
            .field("broken", &self.is_broken())
            .finish()
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        self.body == other.body && self.is_broken() == other.is_broken()
    }
}

/// Returns the executable body text of a transform, trimmed.
pub fn encode(transform: &Transform) -> String {
    transform.body.trim().to_string()
}

/// Owns the Rhai engine used to compile and run every step.
///
/// One instance is created at startup and shared by reference for the
/// lifetime of the process.
pub struct ScriptEngine {
    engine: Engine,
}

impl ScriptEngine {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.on_print(|text| sieve_info!("step print: {text}"));
        engine.on_debug(|text, source, pos| {
            sieve_debug!("step debug {source:?} {pos}: {text}");
        });
        Self { engine }
    }

    /// Compiles body text into a transform.
    pub fn decode(&self, body: &str) -> Result<Transform, CompileError> {
        let ast = self.engine.compile(body).map_err(|err| CompileError {
            message: err.to_string(),
        })?;
        Ok(Transform {
            body: body.to_string(),
            program: Program::Compiled(Arc::new(ast)),
        })
    }

    /// Like [`ScriptEngine::decode`], but keeps a broken transform around
    /// instead of failing, so one bad step does not sink the others.
    pub fn decode_isolated(&self, body: &str) -> (Transform, Option<CompileError>) {
        match self.decode(body) {
            Ok(transform) => (transform, None),
            Err(error) => (Transform::broken(body, error.clone()), Some(error)),
        }
    }

    pub(crate) fn call_element(
        &self,
        ast: &AST,
        element: Dynamic,
        index: usize,
        list: &Dynamic,
    ) -> Result<Dynamic, Box<EvalAltResult>> {
        let index = Dynamic::from(INT::try_from(index).unwrap_or(INT::MAX));
        self.eval(ast, [element, index, list.clone()])
    }

    pub(crate) fn call_accessor(&self, ast: &AST) -> Result<Dynamic, Box<EvalAltResult>> {
        self.eval(ast, [Dynamic::UNIT, Dynamic::UNIT, Dynamic::UNIT])
    }

    fn eval(&self, ast: &AST, arguments: [Dynamic; 3]) -> Result<Dynamic, Box<EvalAltResult>> {
        let mut scope = Scope::new();
        for ((name, alias), value) in BINDINGS.into_iter().zip(arguments) {
            scope.push_dynamic(name, value.clone());
            scope.push_dynamic(alias, value);
        }
        self.engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, ast)
            .map(Dynamic::flatten)
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptEngine").finish_non_exhaustive()
    }
}

pub(crate) fn to_script_value<T: Serialize + ?Sized>(
    value: &T,
) -> Result<Dynamic, Box<EvalAltResult>> {
    rhai::serde::to_dynamic(value)
}

pub(crate) fn from_script_value(value: &Dynamic) -> Result<Value, Box<EvalAltResult>> {
    rhai::serde::from_dynamic(value)
}
