pub mod batch;
pub mod decoders;
pub mod response;
pub mod session;

#[cfg(test)]
pub(crate) mod mock;
