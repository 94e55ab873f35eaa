//! Database seeding functionality
//!
//! Rows that must exist before the API or the provisioning workflow can run.

pub mod provider;

pub use provider::{
    EUCALYPTUS_LOCATION, EUCALYPTUS_SLUG, OPENSTACK_LOCATION, OPENSTACK_SLUG, seed_providers,
};
