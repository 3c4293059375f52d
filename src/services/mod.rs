pub mod email_service;
pub mod link_service;
pub mod normalizer;
pub mod sync_service;
