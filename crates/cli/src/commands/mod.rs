//! Command implementations.

mod deliver;
mod info;
mod run;
mod validate;

pub use deliver::run_deliver;
pub use info::run_info;
pub use run::run_relay;
pub use validate::run_validate;
