//! FFI bindings for Pawflux
//!
//! This module provides C-compatible functions for calling Pawflux from other languages.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `pawflux_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::PawfluxConfig;
use crate::error::FluxError;
use crate::pipeline::{document_to_report, tsv_to_app_history, InputFormat, PawfluxProcessor};

/// `format` argument: detect from content
pub const PAWFLUX_FORMAT_AUTO: i32 = 0;
/// `format` argument: activity document
pub const PAWFLUX_FORMAT_DOCUMENT: i32 = 1;
/// `format` argument: TSV interchange
pub const PAWFLUX_FORMAT_TSV: i32 = 2;

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
        Err(_) => {
            set_last_error("Output contains an interior NUL byte");
            ptr::null_mut()
        }
    }
}

fn result_to_cstr(result: Result<String, FluxError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

fn resolve_format(format: i32, text: &str) -> Option<InputFormat> {
    match format {
        PAWFLUX_FORMAT_AUTO => Some(InputFormat::detect(text)),
        PAWFLUX_FORMAT_DOCUMENT => Some(InputFormat::Document),
        PAWFLUX_FORMAT_TSV => Some(InputFormat::Tsv),
        _ => None,
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Extract an activity document and return the report JSON.
///
/// # Safety
/// - `text` must be a valid null-terminated UTF-8 C string.
/// - Returns a newly allocated string that must be freed with `pawflux_free_string`.
/// - Returns NULL on error; call `pawflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pawflux_document_to_report(text: *const c_char) -> *mut c_char {
    clear_last_error();

    let Some(text) = cstr_to_string(text) else {
        set_last_error("Invalid text pointer");
        return ptr::null_mut();
    };

    result_to_cstr(document_to_report(text))
}

/// Read a TSV export and return app-history JSON.
///
/// # Safety
/// - `text` must be a valid null-terminated UTF-8 C string.
/// - Returns a newly allocated string that must be freed with `pawflux_free_string`.
/// - Returns NULL on error; call `pawflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pawflux_tsv_to_app_history(text: *const c_char) -> *mut c_char {
    clear_last_error();

    let Some(text) = cstr_to_string(text) else {
        set_last_error("Invalid text pointer");
        return ptr::null_mut();
    };

    result_to_cstr(tsv_to_app_history(text))
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a PawfluxProcessor
pub struct PawfluxProcessorHandle {
    processor: PawfluxProcessor,
}

/// Create a processor from a JSON configuration, or the defaults when `config_json` is NULL.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Must be freed with `pawflux_processor_free`.
/// - Returns NULL on error; call `pawflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pawflux_processor_new(
    config_json: *const c_char,
) -> *mut PawfluxProcessorHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        Ok(PawfluxConfig::default())
    } else {
        match cstr_to_string(config_json) {
            Some(json) => PawfluxConfig::from_json(&json),
            None => Err(FluxError::ConfigError("config is not valid UTF-8".to_string())),
        }
    };

    match config.and_then(PawfluxProcessor::with_config) {
        Ok(processor) => Box::into_raw(Box::new(PawfluxProcessorHandle { processor })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pawflux_processor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pawflux_processor_free(processor: *mut PawfluxProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Build a report with a configured processor.
///
/// `format` is one of `PAWFLUX_FORMAT_AUTO`, `PAWFLUX_FORMAT_DOCUMENT` or
/// `PAWFLUX_FORMAT_TSV`.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pawflux_processor_new`.
/// - `text` must be a valid null-terminated UTF-8 C string.
/// - Returns a newly allocated string that must be freed with `pawflux_free_string`.
/// - Returns NULL on error; call `pawflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pawflux_processor_report(
    processor: *const PawfluxProcessorHandle,
    text: *const c_char,
    format: i32,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }
    let handle = &*processor;

    let Some(text) = cstr_to_string(text) else {
        set_last_error("Invalid text pointer");
        return ptr::null_mut();
    };
    let Some(format) = resolve_format(format, &text) else {
        set_last_error("Unknown input format");
        return ptr::null_mut();
    };

    let report = handle.processor.report(&text, format);
    result_to_cstr(handle.processor.encoder().encode_report(&report, false))
}

/// Build a timeline with a configured processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pawflux_processor_new`.
/// - `text` must be a valid null-terminated UTF-8 C string.
/// - Returns a newly allocated string that must be freed with `pawflux_free_string`.
/// - Returns NULL on error; call `pawflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pawflux_processor_timeline(
    processor: *const PawfluxProcessorHandle,
    text: *const c_char,
    format: i32,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }
    let handle = &*processor;

    let Some(text) = cstr_to_string(text) else {
        set_last_error("Invalid text pointer");
        return ptr::null_mut();
    };
    let Some(format) = resolve_format(format, &text) else {
        set_last_error("Unknown input format");
        return ptr::null_mut();
    };

    let timeline = handle.processor.timeline(&text, format);
    result_to_cstr(serde_json::to_string(&timeline).map_err(FluxError::JsonError))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Pawflux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Pawflux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pawflux_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Pawflux function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn pawflux_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Pawflux library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn pawflux_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
