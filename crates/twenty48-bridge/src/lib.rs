//! Supervision of an external high-performance 2048 solver.
//!
//! The solver itself is a native shared library; it runs inside a separate
//! worker process ([`worker`], shipped as the `twenty48-worker` binary) so
//! that a native hang or crash can never block the host's decision loop.
//! [`ExternalEngine`] owns at most one such worker and talks to it over
//! length-delimited JSON frames on the child's stdin/stdout, with a
//! startup handshake and a per-call deadline. Any
//! failure tears the worker down; the next request spawns a fresh one.

pub use self::{frame::*, protocol::*, supervisor::*};

mod frame;
pub mod native;
mod protocol;
mod supervisor;
pub mod worker;
