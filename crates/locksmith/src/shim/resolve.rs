//! Next-Symbol Resolution
//!
//! Each wrapped entry point keeps a lazily resolved pointer to the real
//! implementation, looked up from the next object in the loader's search
//! order. Failure to resolve is fatal at first use: a shim that cannot
//! reach the real primitives cannot let the program limp along.

use std::ffi::{c_void, CStr};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicPtr, Ordering};

use locksmith_core::DiagCode;

use crate::sink;

/// A lazily resolved pointer to a real thread-library entry point.
///
/// `T` must be an `extern "C"` function pointer type of the symbol's
/// true signature.
pub(crate) struct LazyFn<T> {
    ptr: AtomicPtr<c_void>,
    _marker: PhantomData<T>,
}

impl<T: Copy> LazyFn<T> {
    pub(crate) const fn new() -> Self {
        Self {
            ptr: AtomicPtr::new(std::ptr::null_mut()),
            _marker: PhantomData,
        }
    }

    /// The real function, resolving it on first use.
    ///
    /// `name` is the null-terminated symbol name. Two threads racing the
    /// first resolution both ask the loader and store the same answer,
    /// which is harmless.
    pub(crate) fn get(&self, name: &'static [u8]) -> T {
        debug_assert_eq!(std::mem::size_of::<T>(), std::mem::size_of::<*mut c_void>());
        let mut sym = self.ptr.load(Ordering::Acquire);
        if sym.is_null() {
            sym = resolve_next(name);
            self.ptr.store(sym, Ordering::Release);
        }
        // A function pointer round-trips through *mut c_void on every
        // platform the loader seam supports.
        unsafe { std::mem::transmute_copy(&sym) }
    }
}

/// Look up `name` in the next object of the loader's search order.
///
/// Aborts the process when the symbol cannot be found: `NULL` is not a
/// valid address for anything we wrap, so a null result is treated as a
/// loader failure outright.
fn resolve_next(name: &'static [u8]) -> *mut c_void {
    debug_assert_eq!(name.last(), Some(&0), "symbol name must be null-terminated");
    let sym = unsafe { libc::dlsym(libc::RTLD_NEXT, name.as_ptr().cast()) };
    if sym.is_null() {
        // dlerror text is not thread-safe on every platform; this is
        // best-effort text on the way to an abort.
        let detail = unsafe {
            let err = libc::dlerror();
            if err.is_null() {
                "no loader diagnostic".to_string()
            } else {
                CStr::from_ptr(err).to_string_lossy().into_owned()
            }
        };
        let symbol = String::from_utf8_lossy(&name[..name.len() - 1]);
        sink::fatal(
            DiagCode::LoaderFailed,
            &format!("unable to resolve '{symbol}': {detail}"),
        );
    }
    sym
}
