//! Inter-worker clause sharing fabric and worker-pool coordinator for the psat portfolio SAT
//! solver (§4.9, §4.10, §5).
//!
//! `psat-core` defines the single-worker search loop and the [`psat_core::worker::SharingEndpoint`]
//! trait it talks to; this crate is the other side of that seam — the rings, the pairwise export
//! limits, the answer board, the deterministic-mode barrier, and the thread pool that ties them
//! all to a fleet of [`psat_core::Worker`]s.

pub mod answer;
pub mod barrier;
pub mod coordinator;
pub mod fabric;
pub mod limits;
pub mod resource;
pub mod ring;

pub use answer::{Answer, AnswerBoard};
pub use coordinator::{solve, FleetStats, Outcome, SolveOptions, SolveOutput};
pub use fabric::{SharingFabric, WorkerHandle};
pub use limits::ControlMode;
