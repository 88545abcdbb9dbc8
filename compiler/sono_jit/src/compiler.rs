//! The full twelve-stage compiler.
//!
//! One `Compiler` value is one compiler instance: it owns its settings
//! and builds a fresh context (namespace handler, type registry) per
//! unit, so concurrent instances are fully isolated. Compilation is
//! synchronous on the calling thread and is expected to run on a
//! background thread, never the audio callback.

use sono_compile::{check_unit, expand_inliners, run_frontend, CompilerContext, CompilerSettings, Pass};
use sono_diagnostic::Result;
use sono_lexer::Definitions;
use tracing::{debug, debug_span};

use crate::backend;
use crate::object::CompiledProgram;

#[derive(Debug, Default)]
pub struct Compiler {
    settings: CompilerSettings,
}

impl Compiler {
    pub fn new(settings: CompilerSettings) -> Self {
        Compiler { settings }
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// Editor-time validation: stages 1–7 (through TypeCheck), no code
    /// generation. Returns the first error encountered, if any.
    pub fn check(&self, source: &str, definitions: &Definitions) -> Result<()> {
        let mut ctx = CompilerContext::new();
        check_unit(source, definitions, &self.settings, &mut ctx).map(|_| ())
    }

    /// Full compilation: all twelve stages. On success the returned
    /// program's root constructor has already run, so the data section
    /// is initialized and every function is callable.
    pub fn compile(
        &self,
        source: &str,
        definitions: &Definitions,
    ) -> Result<CompiledProgram> {
        let mut ctx = CompilerContext::new();
        let mut unit = run_frontend(source, definitions, &self.settings, &mut ctx)?;

        let program = {
            let _s = debug_span!("pass", name = Pass::FunctionCompilation.name()).entered();
            expand_inliners(&mut ctx, &mut unit, &self.settings)?;
            backend::compile_unit(&ctx, &unit, &self.settings)?
        };

        {
            let _s = debug_span!("pass", name = Pass::RootConstructorExecution.name()).entered();
            program.run_root_constructor();
        }
        debug!("compilation finished");
        Ok(program)
    }
}
