//! Feature extraction: raw run data in, named scalar metrics out.
//!
//! Both extractors are pure functions of their inputs. Every key they can
//! produce is always present in the output map, valued `None` when there is
//! no data, so all records of a run share one schema.

pub mod generation;
pub mod system;
