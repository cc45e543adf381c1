//! Timetable upstream client: windowed event fetches with retry/backoff,
//! plus division/program/group discovery for subscription setup.

mod cache;
mod client;

pub use cache::TtlCache;
pub use client::{Division, Group, Program, TimetableClient};
