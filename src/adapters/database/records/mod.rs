pub mod session;
pub mod user;

pub(crate) use session::SessionRecord;
pub(crate) use user::UserRecord;
