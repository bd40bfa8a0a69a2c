//! quizcam library crate.
//!
//! Hands-free capture of exam questions: a stability detector decides when
//! the camera is steady, captures are queued and scored one at a time, and
//! shots and answers are correlated across devices over a session channel.

pub mod bus;
pub mod camera;
pub mod capture;
pub mod cli;
pub mod config;
pub mod correlation;
pub mod dispatch;
pub mod event_loop;
pub mod job;
pub mod scoring;
pub mod stability;
pub mod status;
