// Opsmon web frontend setup wizard and e2e page objects
// Main library entry point

pub mod config_file;
pub mod db;
pub mod i18n;
pub mod prereq;
pub mod session;
pub mod testkit;
pub mod utils;
pub mod vault;
pub mod wizard;

pub use wizard::request::SetupRequest;
pub use wizard::view::WizardResponse;
pub use wizard::SetupWizard;
