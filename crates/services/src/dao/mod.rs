pub mod base;
pub mod room;
pub mod session;
pub mod user;

pub use base::{DaoError, DaoResult};
pub use room::RoomDao;
pub use session::SessionDao;
pub use user::UserDao;
