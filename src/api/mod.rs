//! The `metric_nexus::api` module which contains code useful for interacting with a metric nexus
//! server from another process.

pub mod client;

pub use client::{Client, TLSConfig, TLSConfigBuilder};

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub method: String,
    pub url: String,
    pub response_status: u16,
    pub response_data: String,
}

impl HttpResponse {
    pub fn print_debug_info(&self) {
        println!("URL: {} {}", self.method, self.url);
        print!("Code: {}.", self.response_status);
        if self.response_status >= 400 {
            println!(" Error:");
        } else {
            println!();
        }

        if !self.response_data.is_empty() {
            println!("{}", self.response_data);
        }
    }
}
