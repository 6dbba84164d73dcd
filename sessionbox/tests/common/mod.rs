pub mod observer;
pub mod test_backend;
