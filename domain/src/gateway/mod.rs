//! Gateways to the external CRM platforms.

pub mod crm;
