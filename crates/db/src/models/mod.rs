pub mod room;
pub mod session;
pub mod user;

pub use room::Room;
pub use session::Session;
pub use user::{User, UserRole};
