pub mod ip;

pub use ip::client_ip;
