//! CLI command implementations.
//!
//! | Module    | Commands handled   |
//! |-----------|--------------------|
//! | `serve`   | `Serve`, `InitDb`  |
//! | `user`    | `User`             |
//! | `config`  | `Config`           |

pub mod config;
pub mod serve;
pub mod user;

pub use config::cmd_config;
pub use serve::{ServeOverrides, cmd_init_db, cmd_serve};
pub use user::cmd_user;
