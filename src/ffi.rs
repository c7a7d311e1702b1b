//! FFI bindings for Synheart Drive
//!
//! This module provides C-compatible functions for driving the telemetry engine
//! from other languages. Snapshots cross the boundary as JSON C strings that must
//! be freed by the caller using `drive_free_string`.

use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::PipelineConfig;
use crate::engine::TelemetryEngine;
use crate::error::PipelineError;
use crate::pipeline::simulate_cycle;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Build a config from C integers, rejecting negative values.
///
/// A negative seed means "seed from entropy".
fn config_from_c(
    tick_interval_ms: i64,
    window_size: i32,
    sample_spacing_ms: i64,
    seed: i64,
) -> Result<PipelineConfig, PipelineError> {
    let non_negative = |value: i64, name: &str| {
        u64::try_from(value)
            .map_err(|_| PipelineError::InvalidConfig(format!("{name} must be positive")))
    };

    let config = PipelineConfig {
        tick_interval_ms: non_negative(tick_interval_ms, "tick_interval_ms")?,
        window_size: non_negative(window_size as i64, "window_size")? as usize,
        sample_spacing_ms: non_negative(sample_spacing_ms, "sample_spacing_ms")?,
        seed: u64::try_from(seed).ok(),
    };
    config.validate()?;
    Ok(config)
}

// ============================================================================
// Stateless API
// ============================================================================

/// Compute one snapshot for `now_ms` and return it as JSON.
///
/// `seed` follows the same convention as `drive_engine_new`: a negative seed
/// draws from entropy.
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `drive_free_string`.
/// - Returns NULL on error; call `drive_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn drive_simulate_json(
    now_ms: i64,
    window_size: i32,
    sample_spacing_ms: i64,
    seed: i64,
) -> *mut c_char {
    clear_last_error();

    // The tick interval plays no part in a single cycle
    let config = match config_from_c(1, window_size, sample_spacing_ms, seed) {
        Ok(c) => c,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let result = simulate_cycle(&config, now_ms, &mut rng)
        .and_then(|snapshot| snapshot.to_json().map_err(PipelineError::from));

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Engine API
// ============================================================================

/// Opaque handle to a TelemetryEngine and the configuration it starts with
pub struct DriveEngineHandle {
    engine: TelemetryEngine,
    config: PipelineConfig,
}

/// Create an engine. Nothing runs until `drive_engine_start`.
///
/// # Safety
/// - Returns a pointer to a newly allocated engine.
/// - Must be freed with `drive_engine_free`.
/// - Returns NULL on an invalid configuration; call `drive_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn drive_engine_new(
    tick_interval_ms: i64,
    window_size: i32,
    sample_spacing_ms: i64,
    seed: i64,
) -> *mut DriveEngineHandle {
    clear_last_error();

    match config_from_c(tick_interval_ms, window_size, sample_spacing_ms, seed) {
        Ok(config) => Box::into_raw(Box::new(DriveEngineHandle {
            engine: TelemetryEngine::new(),
            config,
        })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Start the periodic pipeline.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `drive_engine_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn drive_engine_start(engine: *mut DriveEngineHandle) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    let handle = &mut *engine;
    match handle.engine.start(handle.config.clone()) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Stop the periodic pipeline, waiting for an in-flight cycle. Idempotent.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `drive_engine_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn drive_engine_stop(engine: *mut DriveEngineHandle) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    (*engine).engine.stop();
    0
}

/// Return the most recent snapshot as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `drive_engine_new`.
/// - Returns a newly allocated string that must be freed with `drive_free_string`.
/// - Returns NULL when no cycle has run yet or on error; `drive_last_error`
///   distinguishes the two.
#[no_mangle]
pub unsafe extern "C" fn drive_engine_latest_json(
    engine: *const DriveEngineHandle,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let Some(snapshot) = (*engine).engine.latest() else {
        return ptr::null_mut();
    };

    match snapshot.to_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Stop and free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `drive_engine_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn drive_engine_free(engine: *mut DriveEngineHandle) {
    if !engine.is_null() {
        let mut handle = Box::from_raw(engine);
        handle.engine.stop();
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Drive functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Drive function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn drive_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Drive function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn drive_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Drive library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn drive_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_ffi_simulate_json() {
        unsafe {
            let result = drive_simulate_json(1_700_000_000_000, 50, 200, 7);
            assert!(!result.is_null());

            let json = CStr::from_ptr(result).to_str().unwrap();
            let value: serde_json::Value = serde_json::from_str(json).unwrap();
            assert_eq!(value["window"]["samples"].as_array().unwrap().len(), 50);
            assert_eq!(value["producer"]["name"], "synheart-drive");

            drive_free_string(result);
        }
    }

    unsafe fn simulate_value(now_ms: i64, seed: i64) -> serde_json::Value {
        let result = drive_simulate_json(now_ms, 10, 200, seed);
        assert!(!result.is_null());
        let value = serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
        drive_free_string(result);
        value
    }

    #[test]
    fn test_ffi_simulate_seed_convention() {
        unsafe {
            let a = simulate_value(1_700_000_000_000, 99);
            let b = simulate_value(1_700_000_000_000, 99);
            assert_eq!(a["window"], b["window"]);
            assert_eq!(a["state"], b["state"]);
            assert_eq!(a["vector"], b["vector"]);

            // Negative seeds draw from entropy instead of failing
            let c = simulate_value(1_700_000_000_000, -1);
            assert_eq!(c["window"]["samples"].as_array().unwrap().len(), 10);
        }
    }

    #[test]
    fn test_ffi_simulate_rejects_unrepresentable_now() {
        unsafe {
            assert!(drive_simulate_json(i64::MIN + 1000, 50, 200, 1).is_null());
            let error = CStr::from_ptr(drive_last_error()).to_str().unwrap();
            assert!(error.contains("Reference time out of range"));
        }
    }

    #[test]
    fn test_ffi_rejects_invalid_config() {
        unsafe {
            assert!(drive_engine_new(0, 50, 200, 1).is_null());
            assert!(drive_engine_new(1000, -1, 200, 1).is_null());
            assert!(drive_engine_new(1000, 50, -200, 1).is_null());

            let error = drive_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("sample_spacing_ms"));

            assert!(drive_simulate_json(0, 0, 200, 1).is_null());
        }
    }

    #[test]
    fn test_ffi_engine_lifecycle() {
        unsafe {
            let engine = drive_engine_new(5, 10, 200, 42);
            assert!(!engine.is_null());

            assert!(drive_engine_latest_json(engine).is_null());
            assert!(drive_last_error().is_null());

            assert_eq!(drive_engine_start(engine), 0);
            assert_ne!(drive_engine_start(engine), 0);

            thread::sleep(Duration::from_millis(50));
            assert_eq!(drive_engine_stop(engine), 0);
            assert_eq!(drive_engine_stop(engine), 0);

            let latest = drive_engine_latest_json(engine);
            assert!(!latest.is_null());
            let json = CStr::from_ptr(latest).to_str().unwrap();
            assert!(json.contains("\"vector\""));

            drive_free_string(latest);
            drive_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_null_engine() {
        unsafe {
            assert_eq!(drive_engine_start(ptr::null_mut()), -1);
            assert_eq!(drive_engine_stop(ptr::null_mut()), -1);
            assert!(drive_engine_latest_json(ptr::null()).is_null());
            assert!(!drive_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = drive_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
