//! A Media over QUIC transport core.
//!
//! The control plane is a bidirectional stream of framed messages driving
//! setup, announces, subscriptions, fetches and track status. The data
//! plane multiplexes track objects over unidirectional streams and
//! datagrams, scheduled by priority with per-object TTLs, cached per track
//! for replay, and fanned out relay-style from one publisher to many
//! subscribers.
//!
//! The crate does not implement QUIC itself; it drives a
//! [web_transport::Session].

pub mod cache;
pub mod coding;
pub mod data;
pub mod message;
pub mod metrics;
pub mod relay;
pub mod serve;
pub mod session;
pub mod setup;
pub mod track;
pub mod transport;
pub mod watch;
