//! Raw FFI bindings to the DeepFilterNet C API (`libdf`).
//!
//! The library is located through the `DF_LIB_PATH` environment variable at
//! build time. Set `DF_STATIC` to link it statically.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_float};
use std::marker::{PhantomData, PhantomPinned};

/// Opaque DeepFilterNet model state.
#[repr(C)]
pub struct DFState {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

unsafe extern "C" {
    /// Loads the model archive at `path`. Returns null on failure.
    ///
    /// `log_level` may be null to disable logging.
    pub fn df_create(path: *const c_char, atten_lim: c_float, log_level: *const c_char) -> *mut DFState;

    /// Processes one frame of `df_get_frame_length` samples at 48 kHz.
    /// Returns the local SNR estimate of the frame.
    pub fn df_process_frame(st: *mut DFState, input: *mut c_float, output: *mut c_float) -> c_float;

    pub fn df_get_frame_length(st: *mut DFState) -> usize;

    pub fn df_free(st: *mut DFState);

    pub fn df_set_atten_lim(st: *mut DFState, lim_db: c_float);
}
