//! Database entities.

pub mod post;
pub mod updoot;
pub mod user;

pub use post::Entity as Post;
pub use updoot::Entity as Updoot;
pub use user::Entity as User;
