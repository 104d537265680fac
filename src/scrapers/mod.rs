pub mod ftxu_rest; // REST client for historical trade pages

pub use ftxu_rest::FtxuRestClient;
