pub mod approval;
pub mod employee;
pub mod notification;
pub mod payload;
pub mod request_type;
