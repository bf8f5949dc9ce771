#![warn(missing_docs)]

//! Ludo League domain logic, independent of the hosting platform.
//!
//! The worker (`ll_worker`) supplies a [`store::Store`] over the managed database and exposes
//! these operations over HTTP.

pub mod availability;
pub mod db;
pub mod notification;
pub mod retention;
pub mod role;
pub mod store;
pub mod subscription;
pub mod wallet;
