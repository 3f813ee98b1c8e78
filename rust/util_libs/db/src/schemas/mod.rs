//! Entity schemas for the CRM collections.
//!
//! Every entity is a flat document: domain fields in camelCase, the tenant in
//! `company_id`, and the lifecycle fields from [`metadata`] owned by the
//! repository.

pub mod application;
pub mod attendance;
pub mod contact;
pub mod deal;
pub mod entity;
pub mod history;
pub mod invoice;
pub mod lead;
pub mod meeting;
pub mod metadata;
pub mod property;
pub mod shared;
pub mod todo;

pub use application::{Application, ApplicationStatus, APPLICATION_COLLECTION_NAME};
pub use attendance::{Attendance, AttendanceStatus, ATTENDANCE_COLLECTION_NAME};
pub use contact::{Contact, ContactStatus, CONTACT_COLLECTION_NAME};
pub use deal::{Deal, DealStage, DEAL_COLLECTION_NAME};
pub use entity::{entity_from_row, Entity, IntoIndexes, Record};
pub use history::{History, HistoryAction, HISTORY_COLLECTION_NAME};
pub use invoice::{Invoice, InvoiceStatus, Payment, INVOICE_COLLECTION_NAME};
pub use lead::{Lead, LeadStatus, LEAD_COLLECTION_NAME};
pub use meeting::{Attendee, AttendeeResponse, Meeting, MeetingStatus, MEETING_COLLECTION_NAME};
pub use metadata::Metadata;
pub use property::{Property, PropertyStatus, PROPERTY_COLLECTION_NAME};
pub use shared::{Activity, Address, Note};
pub use todo::{Todo, TodoPriority, TodoStatus, TODO_COLLECTION_NAME};

/// Name of the main database for the CRM
pub const DATABASE_NAME: &str = "estate_crm";
