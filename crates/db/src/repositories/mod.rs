//! Database repositories.

pub mod post;
pub mod updoot;
pub mod user;

pub use post::PostRepository;
pub use updoot::UpdootRepository;
pub use user::UserRepository;
