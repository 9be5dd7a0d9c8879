pub mod cached_field;
pub mod deferred;
pub mod http;
