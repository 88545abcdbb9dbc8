//! Native code backend and runtime calling interface.
//!
//! Consumes the type-checked unit the frontend produced, lowers every
//! function to machine code through Cranelift, and exposes the result
//! as a [`CompiledProgram`]: typed function handles with bind-time
//! signature checking, a writable data section, and a lock-free
//! [`ArtifactSlot`] for handing freshly compiled artifacts to a running
//! audio thread.
//!
//! The generated code upholds the real-time contract: no allocation, no
//! locks, no unwinding anywhere on a call path. All signature and type
//! errors surface at bind time; a bound call cannot fail.

mod backend;
mod compiler;
mod intrinsics;
mod object;
mod runtime;
mod swap;

pub use compiler::Compiler;
pub use object::{CompiledProgram, FunctionEntry, ParamSig};
pub use runtime::{
    FunctionHandle, NativeValue, ProcessData, StructLayout, TypedFn0, TypedFn1, TypedFn2,
    TypedFn3,
};
pub use swap::ArtifactSlot;

pub use sono_compile::{CompilerSettings, OptimizationFlags};
pub use sono_lexer::Definitions;
