pub mod amount;
pub mod decoder;
pub mod source;
pub mod timestamps;
pub mod types;

#[cfg(test)]
pub mod mock;
