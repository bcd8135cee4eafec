//! Reservation core for a class-booking service.
//!
//! Members reserve seats in scheduled classes and fall onto a FIFO waitlist
//! once the seats are gone. Cancelling a confirmed seat promotes the
//! waitlist head into it, and after a class has been held the instructor
//! records who showed up. Every operation runs as one atomic,
//! version-checked transaction against the record store, so a class can
//! never be oversold and class and member records cannot drift apart under
//! concurrent requests.
//!
//! The crate is laid out hexagonally: [`domain`] holds the records and their
//! transitions, [`ports`] the storage trait the core consumes, [`adapters`]
//! the in-memory reference store, and [`commands`] the coordinator that
//! exposes `reserve`, `cancel`, and `record_attendance` as
//! [`tower::Service`] implementations.

pub mod adapters;
pub mod commands;
pub mod domain;
pub mod ports;
