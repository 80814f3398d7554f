// Business domains
pub mod approval;
pub mod registration;
pub mod subscription;
