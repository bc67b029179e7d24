mod simple_server;

pub use simple_server::SimpleServer;
