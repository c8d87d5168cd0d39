//! FFI hosting of the native solver shared library.
//!
//! The library exports `init_tables()` and `find_best_move(u64) -> int`.
//! Loading happens through `dlopen`/`dlsym` at a caller-supplied path, so
//! the host builds without the library being present.

use std::ffi::{CStr, CString, c_int, c_void};
use std::io::{self, Write as _};
use std::os::fd::RawFd;
use std::os::unix::ffi::OsStrExt as _;
use std::path::Path;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum NativeError {
    #[display("invalid library path")]
    InvalidPath,
    #[display("failed to load solver library: {reason}")]
    Load {
        #[error(not(source))]
        reason: String,
    },
    #[display("solver library lacks symbol {symbol}")]
    MissingSymbol {
        #[error(not(source))]
        symbol: &'static str,
    },
}

type InitTablesFn = unsafe extern "C" fn();
type FindBestMoveFn = unsafe extern "C" fn(u64) -> c_int;

/// A loaded native solver. `init_tables` has already run by the time
/// [`NativeSolver::load`] returns.
pub struct NativeSolver {
    handle: *mut c_void,
    find_best_move: FindBestMoveFn,
}

impl std::fmt::Debug for NativeSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeSolver").finish_non_exhaustive()
    }
}

fn last_dl_error() -> String {
    // Safety: dlerror returns a static, thread-local message or null.
    let message = unsafe { libc::dlerror() };
    if message.is_null() {
        "unknown dlopen error".to_owned()
    } else {
        unsafe { CStr::from_ptr(message) }
            .to_string_lossy()
            .into_owned()
    }
}

impl NativeSolver {
    pub fn load(path: &Path) -> Result<Self, NativeError> {
        let c_path =
            CString::new(path.as_os_str().as_bytes()).map_err(|_| NativeError::InvalidPath)?;

        // Safety: plain dlopen of a caller-chosen library; a null handle is
        // the only failure mode.
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW) };
        if handle.is_null() {
            return Err(NativeError::Load {
                reason: last_dl_error(),
            });
        }

        let init_tables = lookup(handle, c"init_tables", "init_tables")?;
        let find_best_move = lookup(handle, c"find_best_move", "find_best_move")?;

        // Safety: symbol signatures are part of the solver's ABI contract.
        let init_tables: InitTablesFn = unsafe { std::mem::transmute(init_tables) };
        let find_best_move: FindBestMoveFn = unsafe { std::mem::transmute(find_best_move) };
        unsafe { init_tables() };

        Ok(Self {
            handle,
            find_best_move,
        })
    }

    /// Runs the native search. The solver may print diagnostics; callers
    /// that share fd 1 with a protocol stream must hold a [`StdoutGate`].
    #[must_use]
    pub fn best_move(&self, packed: u64) -> i32 {
        unsafe { (self.find_best_move)(packed) }
    }
}

fn lookup(
    handle: *mut c_void,
    name: &CStr,
    symbol: &'static str,
) -> Result<*mut c_void, NativeError> {
    let address = unsafe { libc::dlsym(handle, name.as_ptr()) };
    if address.is_null() {
        Err(NativeError::MissingSymbol { symbol })
    } else {
        Ok(address)
    }
}

impl Drop for NativeSolver {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

/// Scoped redirection of fd 1 to `/dev/null`.
///
/// While the gate is alive anything the native layer prints to stdout goes
/// nowhere; dropping it flushes and restores the original descriptor, also
/// on error paths. Streams are flushed on both edges so no buffered bytes
/// cross the boundary.
#[derive(Debug)]
pub struct StdoutGate {
    saved_fd: RawFd,
    null_fd: RawFd,
}

impl StdoutGate {
    pub fn redirect() -> io::Result<Self> {
        let _ = io::stdout().flush();
        unsafe { libc::fflush(std::ptr::null_mut()) };

        let null_fd = unsafe { libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY) };
        if null_fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let saved_fd = unsafe { libc::dup(1) };
        if saved_fd < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(null_fd) };
            return Err(err);
        }
        if unsafe { libc::dup2(null_fd, 1) } < 0 {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(saved_fd);
                libc::close(null_fd);
            }
            return Err(err);
        }
        Ok(Self { saved_fd, null_fd })
    }
}

impl Drop for StdoutGate {
    fn drop(&mut self) {
        unsafe {
            libc::fflush(std::ptr::null_mut());
            libc::dup2(self.saved_fd, 1);
            libc::close(self.saved_fd);
            libc::close(self.null_fd);
        }
    }
}
