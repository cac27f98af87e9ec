//! Policy for Data that matches no PIT entry.

use crate::face::FaceScope;

pub trait UnsolicitedDataPolicy {
    /// Whether unsolicited Data arriving on a face of `ingress_scope` goes
    /// into the content store.
    fn admit(&self, ingress_scope: FaceScope) -> bool;
}

/// The default: unsolicited Data is never cached.
pub struct DropAllPolicy;

impl UnsolicitedDataPolicy for DropAllPolicy {
    fn admit(&self, _ingress_scope: FaceScope) -> bool {
        false
    }
}

/// Cache unsolicited Data from local applications only.
pub struct AdmitLocalPolicy;

impl UnsolicitedDataPolicy for AdmitLocalPolicy {
    fn admit(&self, ingress_scope: FaceScope) -> bool {
        ingress_scope == FaceScope::Local
    }
}

/// Cache unsolicited Data from the network only.
pub struct AdmitNetworkPolicy;

impl UnsolicitedDataPolicy for AdmitNetworkPolicy {
    fn admit(&self, ingress_scope: FaceScope) -> bool {
        ingress_scope == FaceScope::NonLocal
    }
}

/// Cache all unsolicited Data.
pub struct AdmitAllPolicy;

impl UnsolicitedDataPolicy for AdmitAllPolicy {
    fn admit(&self, _ingress_scope: FaceScope) -> bool {
        true
    }
}

/// Resolves a policy by its configuration name.
pub fn make_policy(name: &str) -> Option<Box<dyn UnsolicitedDataPolicy>> {
    match name {
        "drop-all" => Some(Box::new(DropAllPolicy)),
        "admit-local" => Some(Box::new(AdmitLocalPolicy)),
        "admit-network" => Some(Box::new(AdmitNetworkPolicy)),
        "admit-all" => Some(Box::new(AdmitAllPolicy)),
        _ => None,
    }
}
