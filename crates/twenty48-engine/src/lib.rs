//! Board model and game session for 4x4 sliding-tile 2048.
//!
//! The crate is split into two layers:
//!
//! - [`Board`] - pure value type with the move transition function, random
//!   tile spawning, and terminal checks
//! - [`GameSession`] - multi-turn session that owns the board, the RNG, and
//!   the score bookkeeping
//!
//! A typical game progresses as follows:
//!
//! 1. Create a [`GameSession`] (empty grid plus two initial spawns)
//! 2. Apply a [`Direction`] with [`GameSession::shift`]
//! 3. On a changed board, the session adds the merge gain to the score and
//!    spawns a random tile
//! 4. Repeat until no legal move remains
//!
//! ```
//! use twenty48_engine::{Direction, GameSession};
//!
//! let mut session = GameSession::new();
//! let outcome = session.shift(Direction::Left);
//! if outcome.moved {
//!     println!("score: {}", session.score());
//! }
//! ```

pub use self::{board::*, session::*};

mod board;
mod session;
