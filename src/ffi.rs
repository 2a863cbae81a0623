//! FFI bindings for Synheart Interaction
//!
//! This module provides C-compatible functions for hosts that capture input
//! events natively and deliver them to a live session. All functions use C
//! strings (null-terminated) and return allocated memory that must be freed by
//! the caller using `interaction_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::EngineConfig;
use crate::pipeline::events_to_features;
use crate::schema::RawEvent;
use crate::session::Session;

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

fn to_json<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Replay a JSON array of raw events and return the feature vector as JSON.
///
/// # Safety
/// - `json` and `user_id` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `interaction_free_string`.
/// - Returns NULL on error; call `interaction_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn interaction_events_to_features(
    json: *const c_char,
    user_id: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let user_str = match cstr_to_string(user_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid user_id string pointer");
            return ptr::null_mut();
        }
    };

    match events_to_features(&json_str, &user_str) {
        Ok(features) => to_json(&features),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Live Session API
// ============================================================================

/// Opaque handle to a tracking session
pub struct SessionHandle {
    session: Session,
}

/// Start a tracking session.
///
/// # Safety
/// - `user_id` must be a valid null-terminated C string (may be empty).
/// - `config_json` may be NULL for the default configuration.
/// - Returns a pointer that must be freed with `interaction_session_free`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn interaction_session_new(
    user_id: *const c_char,
    started_at_ms: f64,
    config_json: *const c_char,
) -> *mut SessionHandle {
    clear_last_error();

    let user_str = match cstr_to_string(user_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid user_id string pointer");
            return ptr::null_mut();
        }
    };

    let config = if config_json.is_null() {
        EngineConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match EngineConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let session = Session::new(user_str, &config, started_at_ms);
    Box::into_raw(Box::new(SessionHandle { session }))
}

/// Free a session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `interaction_session_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn interaction_session_free(session: *mut SessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Push one raw event encoded as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `interaction_session_new`.
/// - `event_json` must be a valid null-terminated C string.
/// - Returns 0 when the event reached the analyzers, 1 when it was dropped
///   (out of order, malformed or late), -1 on error.
#[no_mangle]
pub unsafe extern "C" fn interaction_session_push_event(
    session: *mut SessionHandle,
    event_json: *const c_char,
) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }

    let handle = &mut *session;

    let json_str = match cstr_to_string(event_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid event string pointer");
            return -1;
        }
    };

    let event: RawEvent = match serde_json::from_str(&json_str) {
        Ok(event) => event,
        Err(e) => {
            set_last_error(&e.to_string());
            return -1;
        }
    };

    if handle.session.ingest(&event) {
        0
    } else {
        1
    }
}

/// Run the periodic idle poll.
///
/// # Safety
/// - `session` must be a valid pointer returned by `interaction_session_new`.
/// - Returns the idle seconds added, or a negative value on error.
#[no_mangle]
pub unsafe extern "C" fn interaction_session_tick(session: *mut SessionHandle, now_ms: f64) -> f64 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1.0;
    }

    let handle = &mut *session;
    handle.session.tick(now_ms)
}

/// Finalize the session and return the feature vector as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `interaction_session_new`.
/// - Returns a newly allocated string that must be freed with `interaction_free_string`.
/// - Returns NULL on error (validation failure, already finalized); call
///   `interaction_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn interaction_session_finalize(
    session: *mut SessionHandle,
    ended_at_ms: f64,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let handle = &mut *session;

    match handle.session.finalize(ended_at_ms) {
        Ok(features) => to_json(&features),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Serialize the finalized vector as a two-line delimited table.
///
/// # Safety
/// - `session` must be a valid pointer returned by `interaction_session_new`.
/// - Returns a newly allocated string that must be freed with `interaction_free_string`.
/// - Returns NULL if the session is not finalized or failed validation.
#[no_mangle]
pub unsafe extern "C" fn interaction_session_serialize(session: *mut SessionHandle) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let handle = &*session;

    match handle.session.export_table() {
        Ok(table) => string_to_cstr(&table),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Return the session's drop counters as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `interaction_session_new`.
/// - Returns a newly allocated string that must be freed with `interaction_free_string`.
#[no_mangle]
pub unsafe extern "C" fn interaction_session_diagnostics(
    session: *mut SessionHandle,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let handle = &*session;
    to_json(&handle.session.diagnostics())
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Interaction functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an Interaction function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn interaction_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Interaction function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn interaction_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn interaction_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
