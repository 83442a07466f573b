//! Event types published to UI collaborators.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a host can
//! forward them over whatever bus it uses (IPC, websocket, log lines).

pub mod events;
