pub mod identity;
pub mod locks;
pub mod profiles;
pub mod storage;
pub mod trips;

#[cfg(test)]
pub(crate) mod testing;
