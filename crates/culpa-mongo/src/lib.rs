pub mod connection;
pub mod record;
pub mod source;

pub use connection::connect;
pub use source::MongoSource;
