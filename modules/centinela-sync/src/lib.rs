pub mod comments;
pub mod map;
pub mod moderation;
pub mod notify;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
