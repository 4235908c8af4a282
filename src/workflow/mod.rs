//! Playback scheduling: per-clip decode state machines, per-track scheduling, the session
//! aggregator and the deferred edit queue.

pub mod action;
pub mod clip_workflow;
pub mod events;
pub mod main_workflow;
pub mod track_workflow;
