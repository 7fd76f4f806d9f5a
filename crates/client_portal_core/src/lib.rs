pub mod access;
pub mod billing;
pub mod catalog;
pub mod domain;
pub mod error;
pub mod files;
pub mod ports;
pub mod validation;

pub use access::{authorize, Authorization, Principal, Requirement};
pub use domain::{
    AccessAction, AccessLogEntry, Bill, BillStatus, Document, DocumentCategory, Payment, Role,
    User, UserType,
};
pub use error::{DomainError, DomainResult};
pub use ports::{
    ByteStream, DatabaseService, EmailMessage, EmailService, FileStorage, PortError, PortResult,
};
