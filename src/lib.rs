//! Vitrina content modules
//!
//! Posts, products and services for the marketing site, each a kernel
//! [`Module`](vitrina_kernel::Module) with its own routes, live view and
//! OpenAPI fragment, plus the bootstrap shared by the server and the CLI.

pub mod bootstrap;
pub mod modules;
pub mod utils;

pub use bootstrap::App;
