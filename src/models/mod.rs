pub mod code_executions;
pub mod email_templates;
pub mod jobs;
pub mod oauth;
pub mod provider_configs;
pub mod schema;
pub mod tenants;
