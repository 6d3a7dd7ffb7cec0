mod clock;
mod middleware;
mod password;
mod session;
mod token;

pub use clock::{Clock, SystemClock};
pub use middleware::RequireUser;
pub use password::PasswordHasher;
pub use session::{SessionEngine, SessionPair};
pub use token::{AccessTokenCodec, Claims, generate_refresh_value};

#[cfg(test)]
pub use clock::test::FixedClock;
