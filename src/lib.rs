pub mod analysis;
pub mod config;
pub mod error;
pub mod experiment;
pub mod net;
pub mod qos;
pub mod substrate;
pub mod time;
pub mod traffic;

#[cfg(test)]
mod test;
