//! Admission control: the per-request decision function.

mod gate;

pub use gate::{AdmissionGate, Rejection};
