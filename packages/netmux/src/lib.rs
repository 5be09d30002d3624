//! netmux - expose an interactive program over TCP
//!
//! The relay spawns one child process and accepts any number of TCP clients.
//! Bytes from a client go to the child's stdin (and are copied to the
//! operator's terminal); the child's output goes back to whichever client
//! sent data most recently.
//!
//! # Example
//!
//! ```no_run
//! use netmux::{ChildProcess, ListenOptions, Operator, Relay, RelayConfig, bind_and_listen};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), netmux::RelayError> {
//!     let config = RelayConfig::default();
//!     let child = ChildProcess::spawn("/bin/cat", &[])?;
//!     let listener = bind_and_listen(7000, &ListenOptions::default())?;
//!
//!     let shutdown = Relay::new(config, Operator::stdio(), listener, child)
//!         .run()
//!         .await?;
//!     println!("relay stopped: {:?}", shutdown);
//!     Ok(())
//! }
//! ```

pub mod config;
mod error;
pub mod listener;
pub mod multiplexer;
pub mod operator;
pub mod registry;
pub mod router;
pub mod spawner;
mod write;

pub use config::RelayConfig;
pub use error::RelayError;
pub use listener::{ListenOptions, bind_and_listen, format_peer_address};
pub use multiplexer::{Relay, Shutdown};
pub use operator::{Operator, TerminalOut};
pub use registry::{ClientId, ClientRegistry, ClientState};
pub use router::{ActiveClient, RouteError};
pub use spawner::ChildProcess;
