pub mod health;
pub use self::health::health;

pub mod post_login;
pub use self::post_login::{begin, resume};
