// Core domain types for Tapline
//
// This crate defines the attendance event model and the device-to-service
// wire contract. It has no dependency on storage or HTTP frameworks.

pub mod error;
pub mod events;
pub mod submission;

pub use error::{FailureKind, IngestError};
pub use events::{
    AttendanceEvent, CardStatus, DeviceStatus, Direction, EmployeeStatus, EntrySource,
};
pub use submission::{EventAccepted, EventSubmission, FailureBody, PendingAssignment};
