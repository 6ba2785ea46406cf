//! Permission scope resolution.
//!
//! Derives the minimal scope set the enabled endpoints need, then drops
//! read scopes that are implied by a matching read-write scope.

use std::collections::BTreeSet;

use regex::{Regex, RegexBuilder};

use crate::model::EndpointDefinition;

/// Higher scopes and the lower scopes they imply.
pub const SCOPE_HIERARCHY: &[(&str, &[&str])] = &[
    ("Mail.ReadWrite", &["Mail.Read"]),
    ("Calendars.ReadWrite", &["Calendars.Read"]),
    ("Files.ReadWrite", &["Files.Read"]),
    ("Tasks.ReadWrite", &["Tasks.Read"]),
    ("Contacts.ReadWrite", &["Contacts.Read"]),
];

/// Compile a case-insensitive name filter.
///
/// An invalid pattern is logged and treated as no filter.
pub fn compile_name_filter(pattern: Option<&str>) -> Option<Regex> {
    let pattern = pattern.filter(|p| !p.is_empty())?;
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::warn!("Invalid tool filter pattern {:?}, ignoring filter: {}", pattern, e);
            None
        }
    }
}

/// Resolve the scopes required by `endpoints`.
pub fn resolve_scopes(
    endpoints: &[EndpointDefinition],
    include_org_scopes: bool,
    name_pattern: Option<&str>,
) -> BTreeSet<String> {
    let filter = compile_name_filter(name_pattern);
    let mut scopes = BTreeSet::new();

    for endpoint in endpoints {
        if let Some(filter) = &filter {
            if !filter.is_match(&endpoint.name) {
                continue;
            }
        }
        if !include_org_scopes && endpoint.is_org_only() {
            continue;
        }

        scopes.extend(endpoint.scopes.iter().cloned());
        if include_org_scopes {
            scopes.extend(endpoint.org_scopes.iter().cloned());
        }
    }

    reduce_hierarchy(&mut scopes);

    if name_pattern.is_some() {
        tracing::info!("Built {} scopes for filtered tools", scopes.len());
    }
    scopes
}

/// Remove lower scopes covered by a present higher scope.
pub fn reduce_hierarchy(scopes: &mut BTreeSet<String>) {
    for (higher, lowers) in SCOPE_HIERARCHY {
        if scopes.contains(*higher) && lowers.iter().all(|l| scopes.contains(*l)) {
            for lower in *lowers {
                scopes.remove(*lower);
            }
        }
    }
}
