//! The typed calling interface.
//!
//! Argument marshalling resolves once at bind time: `typed*` checks the
//! host-requested signature structurally against the compiled one and
//! fails with `SignatureMismatchError` if they differ. The returned
//! typed wrapper is a bare function pointer; `call` allocates nothing,
//! takes no locks and cannot unwind, which is what lets the audio
//! callback use it directly.

use std::marker::PhantomData;

use sono_diagnostic::{Error, Result};

use crate::object::{FunctionEntry, ParamSig};

/// A compiled function, found by name, not yet bound to host types.
pub struct FunctionHandle<'p> {
    entry: &'p FunctionEntry,
}

/// Host-side value types that can cross into compiled code.
///
/// The ABI type is what actually travels over the call; the signature
/// describes what the compiled side must have declared.
pub trait NativeValue: sealed::Sealed {
    type Abi: Copy;
    fn signature() -> ParamSig;
    fn to_abi(self) -> Self::Abi;
    fn from_abi(abi: Self::Abi) -> Self;
}

mod sealed {
    pub trait Sealed {}
}

macro_rules! scalar_native {
    ($ty:ty, $abi:ty, $sig:expr) => {
        impl sealed::Sealed for $ty {}
        impl NativeValue for $ty {
            type Abi = $abi;
            fn signature() -> ParamSig {
                $sig
            }
            #[inline(always)]
            fn to_abi(self) -> $abi {
                self as $abi
            }
            #[inline(always)]
            fn from_abi(abi: $abi) -> Self {
                abi as $ty
            }
        }
    };
}

scalar_native!(i32, i32, ParamSig::I32);
scalar_native!(f32, f32, ParamSig::F32);
scalar_native!(f64, f64, ParamSig::F64);

impl sealed::Sealed for bool {}
impl NativeValue for bool {
    type Abi = i8;
    fn signature() -> ParamSig {
        ParamSig::Bool
    }
    #[inline(always)]
    fn to_abi(self) -> i8 {
        i8::from(self)
    }
    #[inline(always)]
    fn from_abi(abi: i8) -> Self {
        abi != 0
    }
}

impl sealed::Sealed for () {}
impl NativeValue for () {
    type Abi = ();
    fn signature() -> ParamSig {
        ParamSig::Void
    }
    #[inline(always)]
    fn to_abi(self) {}
    #[inline(always)]
    fn from_abi(_: ()) {}
}

/// Fixed-size sample buffers bind as pointer arguments to
/// `span<float, N>&` parameters; the length is part of the checked
/// signature.
impl<const N: usize> sealed::Sealed for &mut [f32; N] {}
impl<const N: usize> NativeValue for &mut [f32; N] {
    type Abi = *mut f32;
    fn signature() -> ParamSig {
        ParamSig::SpanF32 {
            len: u32::try_from(N).unwrap_or(u32::MAX),
        }
    }
    #[inline(always)]
    fn to_abi(self) -> *mut f32 {
        self.as_mut_ptr()
    }
    fn from_abi(_: *mut f32) -> Self {
        // Pointers never come back out of compiled code.
        unreachable!("span pointers are argument-only")
    }
}

/// Marker for host structs whose layout was registered with the type
/// system under `NAME`.
///
/// # Safety
/// Implementors guarantee the Rust layout matches the registered
/// member offsets exactly; the compiled code dereferences by offset
/// with no checks.
pub unsafe trait StructLayout {
    const NAME: &'static str;
}

impl<T: StructLayout> sealed::Sealed for &mut T {}
impl<T: StructLayout> NativeValue for &mut T {
    type Abi = *mut T;
    fn signature() -> ParamSig {
        ParamSig::StructPtr {
            name: T::NAME.to_owned(),
        }
    }
    #[inline(always)]
    fn to_abi(self) -> *mut T {
        self
    }
    fn from_abi(_: *mut T) -> Self {
        unreachable!("struct pointers are argument-only")
    }
}

/// The audio-block descriptor registered by the built-in library:
/// two channel pointers plus the frame count. The audio callback fills
/// one of these and binds `&mut ProcessData` to a
/// `void process(ProcessData& d)` entry point.
#[repr(C)]
pub struct ProcessData {
    pub left: *mut f32,
    pub right: *mut f32,
    pub num_frames: i32,
}

// Safety: layout registered in the built-in library is
// { left: float* @0, right: float* @8, num_frames: int @16 }, which is
// exactly this repr(C) struct on 64-bit targets.
unsafe impl StructLayout for ProcessData {
    const NAME: &'static str = "ProcessData";
}

impl<'p> FunctionHandle<'p> {
    pub(crate) fn new(entry: &'p FunctionEntry) -> Self {
        FunctionHandle { entry }
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn param_count(&self) -> usize {
        self.entry.params.len()
    }

    fn check_signature(&self, params: &[ParamSig], ret: &ParamSig) -> Result<*const u8> {
        if self.entry.params.as_slice() != params {
            let want: Vec<String> = params.iter().map(ParamSig::describe).collect();
            let have: Vec<String> = self.entry.params.iter().map(ParamSig::describe).collect();
            return Err(Error::signature_mismatch(format!(
                "'{}' takes ({}), host requested ({})",
                self.entry.name,
                have.join(", "),
                want.join(", "),
            )));
        }
        if &self.entry.ret != ret {
            return Err(Error::signature_mismatch(format!(
                "'{}' returns {}, host requested {}",
                self.entry.name,
                self.entry.ret.describe(),
                ret.describe(),
            )));
        }
        Ok(self.entry.ptr)
    }

    /// Bind as a zero-argument function.
    pub fn typed0<R: NativeValue>(&self) -> Result<TypedFn0<R>> {
        let ptr = self.check_signature(&[], &R::signature())?;
        Ok(TypedFn0 {
            ptr,
            _marker: PhantomData,
        })
    }

    pub fn typed1<A: NativeValue, R: NativeValue>(&self) -> Result<TypedFn1<A, R>> {
        let ptr = self.check_signature(&[A::signature()], &R::signature())?;
        Ok(TypedFn1 {
            ptr,
            _marker: PhantomData,
        })
    }

    pub fn typed2<A: NativeValue, B: NativeValue, R: NativeValue>(
        &self,
    ) -> Result<TypedFn2<A, B, R>> {
        let ptr = self.check_signature(&[A::signature(), B::signature()], &R::signature())?;
        Ok(TypedFn2 {
            ptr,
            _marker: PhantomData,
        })
    }

    pub fn typed3<A: NativeValue, B: NativeValue, C: NativeValue, R: NativeValue>(
        &self,
    ) -> Result<TypedFn3<A, B, C, R>> {
        let ptr = self.check_signature(
            &[A::signature(), B::signature(), C::signature()],
            &R::signature(),
        )?;
        Ok(TypedFn3 {
            ptr,
            _marker: PhantomData,
        })
    }
}

// The typed wrappers. Each is a checked function pointer; `call` is the
// entire hot path.

pub struct TypedFn0<R> {
    ptr: *const u8,
    _marker: PhantomData<fn() -> R>,
}

impl<R: NativeValue> TypedFn0<R> {
    #[inline(always)]
    pub fn call(&self) -> R {
        // Safety: signature checked structurally at bind time against
        // the compiled function's declared types.
        let f: extern "C" fn() -> R::Abi = unsafe { std::mem::transmute(self.ptr) };
        R::from_abi(f())
    }
}

pub struct TypedFn1<A, R> {
    ptr: *const u8,
    _marker: PhantomData<fn(A) -> R>,
}

impl<A: NativeValue, R: NativeValue> TypedFn1<A, R> {
    #[inline(always)]
    pub fn call(&self, a: A) -> R {
        // Safety: see `TypedFn0::call`.
        let f: extern "C" fn(A::Abi) -> R::Abi = unsafe { std::mem::transmute(self.ptr) };
        R::from_abi(f(a.to_abi()))
    }
}

pub struct TypedFn2<A, B, R> {
    ptr: *const u8,
    _marker: PhantomData<fn(A, B) -> R>,
}

impl<A: NativeValue, B: NativeValue, R: NativeValue> TypedFn2<A, B, R> {
    #[inline(always)]
    pub fn call(&self, a: A, b: B) -> R {
        // Safety: see `TypedFn0::call`.
        let f: extern "C" fn(A::Abi, B::Abi) -> R::Abi =
            unsafe { std::mem::transmute(self.ptr) };
        R::from_abi(f(a.to_abi(), b.to_abi()))
    }
}

pub struct TypedFn3<A, B, C, R> {
    ptr: *const u8,
    _marker: PhantomData<fn(A, B, C) -> R>,
}

impl<A: NativeValue, B: NativeValue, C: NativeValue, R: NativeValue> TypedFn3<A, B, C, R> {
    #[inline(always)]
    pub fn call(&self, a: A, b: B, c: C) -> R {
        // Safety: see `TypedFn0::call`.
        let f: extern "C" fn(A::Abi, B::Abi, C::Abi) -> R::Abi =
            unsafe { std::mem::transmute(self.ptr) };
        R::from_abi(f(a.to_abi(), b.to_abi(), c.to_abi()))
    }
}
