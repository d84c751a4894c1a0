//! Resource catalog expansion.

use crate::types::{
    ActionExpectation, ActionOverrides, IamProfile, ResourceCatalog, ResourceDescriptor,
    ResourceKind,
};

/// Return a copy of `profile` that declares every resource of `catalog`.
///
/// Missing resources are added as folders carrying a copy of `defaults`. A profile
/// whose own catalog is invalid is returned unchanged.
pub fn expand(
    profile: &IamProfile,
    catalog: &[String],
    defaults: &ActionExpectation,
) -> IamProfile {
    let mut expanded = profile.clone();
    if let ResourceCatalog::Declared(resources) = &mut expanded.resources {
        for name in catalog {
            if resources.iter().any(|r| &r.path == name) {
                continue;
            }
            resources.push(ResourceDescriptor::new(
                name.as_str(),
                ResourceKind::Folder,
                ActionOverrides::Declared(defaults.clone()),
            ));
        }
    }
    expanded
}
