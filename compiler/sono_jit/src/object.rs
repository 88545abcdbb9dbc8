//! The compiled artifact.

use rustc_hash::FxHashMap;
use sono_diagnostic::{Error, Result};

use cranelift_jit::JITModule;

/// Wire-level description of one argument or return slot, resolved
/// from `TypeInfo` when the program is built. Bind-time signature
/// checks compare against these.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ParamSig {
    I32,
    F32,
    F64,
    Bool,
    Void,
    /// Pointer to a fixed-size float span.
    SpanF32 { len: u32 },
    /// Pointer to a registered struct, matched by name.
    StructPtr { name: String },
}

impl ParamSig {
    pub fn describe(&self) -> String {
        match self {
            ParamSig::I32 => "int".to_owned(),
            ParamSig::F32 => "float".to_owned(),
            ParamSig::F64 => "double".to_owned(),
            ParamSig::Bool => "bool".to_owned(),
            ParamSig::Void => "void".to_owned(),
            ParamSig::SpanF32 { len } => format!("span<float, {len}>&"),
            ParamSig::StructPtr { name } => format!("{name}&"),
        }
    }
}

/// One finished function: native entry point plus its declared
/// signature.
#[derive(Clone, Debug)]
pub struct FunctionEntry {
    pub name: String,
    pub params: Vec<ParamSig>,
    pub ret: ParamSig,
    pub(crate) ptr: *const u8,
}

/// A finished compilation: native code, the data section it addresses,
/// and the function map. Owned by whoever compiled it; handed to the
/// audio thread through an [`crate::ArtifactSlot`].
///
/// Code memory is freed when the program drops. The artifact slot
/// guarantees no audio callback is still inside the old code when that
/// happens; anyone bypassing the slot takes on that proof obligation.
pub struct CompiledProgram {
    module: Option<JITModule>,
    functions: FxHashMap<String, FunctionEntry>,
    data_ptr: *mut u8,
    data_len: usize,
    ctor: Option<*const u8>,
}

// The raw pointers inside are into the JIT's own allocations, owned by
// this value; moving it across threads is sound.
// Safety: all mutation of the data section happens through generated
// code invoked by at most one thread at a time per the swap protocol.
unsafe impl Send for CompiledProgram {}
unsafe impl Sync for CompiledProgram {}

impl CompiledProgram {
    pub(crate) fn new(
        module: JITModule,
        functions: FxHashMap<String, FunctionEntry>,
        data_ptr: *mut u8,
        data_len: usize,
        ctor: Option<*const u8>,
    ) -> Self {
        CompiledProgram {
            module: Some(module),
            functions,
            data_ptr,
            data_len,
            ctor,
        }
    }

    /// Look up a compiled function by its (mangled) name.
    pub fn function(&self, name: &str) -> Result<crate::FunctionHandle<'_>> {
        self.functions
            .get(name)
            .map(crate::FunctionHandle::new)
            .ok_or_else(|| {
                Error::signature_mismatch(format!("no compiled function named '{name}'"))
            })
    }

    /// Names of all compiled functions, for host-side listings.
    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The root data section (globals, spans, struct instances).
    pub fn data(&self) -> &[u8] {
        if self.data_len == 0 {
            return &[];
        }
        // Safety: data_ptr/data_len come from the JIT's finalized data
        // object and stay valid until the module is freed on drop.
        unsafe { std::slice::from_raw_parts(self.data_ptr, self.data_len) }
    }

    /// Run the root constructor once. Called by the compiler as the
    /// final pipeline stage, on the compiling thread.
    pub(crate) fn run_root_constructor(&self) {
        if let Some(ctor) = self.ctor {
            // Safety: the pointer came out of the JIT for a function
            // compiled with signature `extern "C" fn()`.
            let ctor: extern "C" fn() = unsafe { std::mem::transmute(ctor) };
            ctor();
        }
    }
}

impl Drop for CompiledProgram {
    fn drop(&mut self) {
        if let Some(module) = self.module.take() {
            // Safety: dropping the program is only reachable once no
            // thread can call into the generated code (enforced by the
            // artifact slot's quiescence wait).
            unsafe { module.free_memory() };
        }
    }
}

impl std::fmt::Debug for CompiledProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledProgram")
            .field("functions", &self.functions.len())
            .field("data_len", &self.data_len)
            .finish_non_exhaustive()
    }
}
