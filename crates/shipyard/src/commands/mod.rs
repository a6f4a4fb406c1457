pub mod checklist;
pub mod provision;
pub mod validate;
