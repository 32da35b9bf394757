mod http;

pub use http::HttpWarmer;
