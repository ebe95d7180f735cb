//! FFI bindings for the concern point transform
//!
//! C-compatible functions so the surrounding service can call the transform
//! in-process. All functions take and return null-terminated UTF-8 JSON;
//! returned strings are owned by the caller and must be released with
//! `poc_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::{FieldConflictPolicy, TransformConfig, DEFAULT_QUANTUM_MINUTES};
use crate::error::ComputeError;
use crate::pipeline::{discreet_to_duration_json, duration_to_discreet_json, PointTransformer};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Read the JSON argument, run `transform`, and hand back an owned C string
unsafe fn run_json<F>(json: *const c_char, transform: F) -> *mut c_char
where
    F: FnOnce(String) -> Result<String, ComputeError>,
{
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match transform(json_str) {
        Ok(result) => string_to_cstr(&result),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Convert a JSON array of discreet points into a JSON array of duration points.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `poc_free_string`.
/// - Returns NULL on error; call `poc_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn poc_discreet_to_duration(json: *const c_char) -> *mut c_char {
    run_json(json, discreet_to_duration_json)
}

/// Convert a JSON array of duration points into a JSON array of discreet points.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `poc_free_string`.
/// - Returns NULL on error; call `poc_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn poc_duration_to_discreet(json: *const c_char) -> *mut c_char {
    run_json(json, duration_to_discreet_json)
}

// ============================================================================
// Configured Transformer API
// ============================================================================

/// Opaque handle to a PointTransformer
pub struct PointTransformerHandle {
    transformer: PointTransformer,
}

/// Create a transformer.
///
/// `quantum_minutes <= 0` selects the default 5 minute quantum. A non-zero
/// `first_write_wins` keeps the earliest descriptive fields when intervals
/// merge instead of the latest.
///
/// # Safety
/// - Returns a pointer that must be freed with `poc_transformer_free`.
#[no_mangle]
pub unsafe extern "C" fn poc_transformer_new(
    quantum_minutes: i32,
    first_write_wins: i32,
) -> *mut PointTransformerHandle {
    clear_last_error();

    let quantum_minutes = if quantum_minutes <= 0 {
        DEFAULT_QUANTUM_MINUTES
    } else {
        i64::from(quantum_minutes)
    };
    let field_policy = if first_write_wins != 0 {
        FieldConflictPolicy::FirstWriteWins
    } else {
        FieldConflictPolicy::LastWriteWins
    };

    match PointTransformer::with_config(TransformConfig {
        quantum_minutes,
        field_policy,
    }) {
        Ok(transformer) => Box::into_raw(Box::new(PointTransformerHandle { transformer })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a transformer.
///
/// # Safety
/// - `handle` must be a pointer returned by `poc_transformer_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn poc_transformer_free(handle: *mut PointTransformerHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Discreet → duration with a configured transformer.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `poc_transformer_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `poc_free_string`.
#[no_mangle]
pub unsafe extern "C" fn poc_transformer_to_duration(
    handle: *const PointTransformerHandle,
    json: *const c_char,
) -> *mut c_char {
    if handle.is_null() {
        set_last_error("Null transformer pointer");
        return ptr::null_mut();
    }
    let handle = &*handle;
    run_json(json, |s| handle.transformer.discreet_to_duration_json(&s))
}

/// Duration → discreet with a configured transformer.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `poc_transformer_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `poc_free_string`.
#[no_mangle]
pub unsafe extern "C" fn poc_transformer_to_discreet(
    handle: *const PointTransformerHandle,
    json: *const c_char,
) -> *mut c_char {
    if handle.is_null() {
        set_last_error("Null transformer pointer");
        return ptr::null_mut();
    }
    let handle = &*handle;
    run_json(json, |s| handle.transformer.duration_to_discreet_json(&s))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by a `poc_` function.
///
/// # Safety
/// - `ptr` must be a pointer returned by a `poc_` function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn poc_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next `poc_` call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn poc_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn poc_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_discreet_json() -> CString {
        CString::new(
            r#"[
                {"id": 1, "caseId": 5, "latitude": 10.0, "longitude": 20.0, "time": "2020-05-01T18:00:00Z"},
                {"id": 2, "caseId": 5, "latitude": 10.0, "longitude": 20.0, "time": "2020-05-01T18:05:00Z"},
                {"id": 3, "caseId": 5, "latitude": 10.0, "longitude": 20.0, "time": "2020-05-01T18:10:00Z"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_ffi_discreet_to_duration() {
        let json = sample_discreet_json();

        unsafe {
            let result = poc_discreet_to_duration(json.as_ptr());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            let value: serde_json::Value = serde_json::from_str(result_str).unwrap();
            assert_eq!(value[0]["duration"], 15);

            poc_free_string(result);
        }
    }

    #[test]
    fn test_ffi_transformer_lifecycle() {
        unsafe {
            let handle = poc_transformer_new(0, 0);
            assert!(!handle.is_null());

            let json = sample_discreet_json();
            let durations = poc_transformer_to_duration(handle, json.as_ptr());
            assert!(!durations.is_null());

            let ticks = poc_transformer_to_discreet(handle, durations);
            assert!(!ticks.is_null());

            let ticks_str = CStr::from_ptr(ticks).to_str().unwrap();
            let value: serde_json::Value = serde_json::from_str(ticks_str).unwrap();
            assert_eq!(value.as_array().map(|a| a.len()), Some(3));

            poc_free_string(durations);
            poc_free_string(ticks);
            poc_transformer_free(handle);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid_json = CString::new("not json").unwrap();
            let result = poc_duration_to_discreet(invalid_json.as_ptr());
            assert!(result.is_null());

            let error = poc_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("Invalid JSON"));

            let result = poc_transformer_to_duration(ptr::null(), invalid_json.as_ptr());
            assert!(result.is_null());
        }
    }

    #[test]
    fn test_ffi_out_of_range_duration_reports_error() {
        let json = CString::new(
            r#"[
                {"latitude": 10.0, "longitude": 20.0, "time": "2020-05-01T00:00:00Z", "duration": 9223372036854775807},
                {"latitude": 10.0, "longitude": 20.0, "time": "2020-05-01T00:05:00Z", "duration": 5}
            ]"#,
        )
        .unwrap();

        unsafe {
            let result = poc_duration_to_discreet(json.as_ptr());
            assert!(result.is_null());

            let error_str = CStr::from_ptr(poc_last_error()).to_str().unwrap();
            assert!(error_str.contains("index 0"));
        }
    }

    #[test]
    fn test_ffi_rejects_oversized_quantum() {
        unsafe {
            let handle = poc_transformer_new(i32::MAX, 0);
            assert!(handle.is_null());
            assert!(!poc_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = poc_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
