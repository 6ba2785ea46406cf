//! Integration tests for scope resolution and registry filtering.
//!
//! These tests verify that the same catalog yields:
//! - The minimal scope set for the enabled endpoints
//! - A registry honoring read-only, org-mode and name filters
//! - Preset patterns that select the expected tools

use graphbridge_core::{
    Catalog, EndpointDefinition, HttpMethod, RegistryOptions, ToolRegistry, combined_preset_pattern,
    resolve_scopes,
};

fn catalog() -> Catalog {
    Catalog::new(vec![
        EndpointDefinition::new("list-mail-messages", HttpMethod::Get, "/me/messages").with_scopes(&["Mail.Read"]),
        EndpointDefinition::new("send-mail", HttpMethod::Post, "/me/sendMail").with_scopes(&["Mail.Send"]),
        EndpointDefinition::new("delete-mail-message", HttpMethod::Delete, "/me/messages/{message-id}")
            .with_scopes(&["Mail.ReadWrite"]),
        EndpointDefinition::new("list-calendar-events", HttpMethod::Get, "/me/events")
            .with_scopes(&["Calendars.Read"]),
        EndpointDefinition::new("list-joined-teams", HttpMethod::Get, "/me/joinedTeams")
            .with_org_scopes(&["Team.ReadBasic.All"]),
        EndpointDefinition::new("list-users", HttpMethod::Get, "/users").with_org_scopes(&["User.Read.All"]),
    ])
    .unwrap()
}

fn names(registry: &ToolRegistry) -> Vec<&str> {
    registry.list().iter().map(|e| e.name()).collect()
}

#[test]
fn test_hierarchy_reduces_mail_read() {
    let scopes = resolve_scopes(catalog().endpoints(), false, None);
    let scopes: Vec<&str> = scopes.iter().map(String::as_str).collect();

    assert_eq!(scopes, vec!["Calendars.Read", "Mail.ReadWrite", "Mail.Send"]);
}

#[test]
fn test_org_scopes_only_in_org_mode() {
    let personal = resolve_scopes(catalog().endpoints(), false, None);
    assert!(!personal.contains("Team.ReadBasic.All"));

    let org = resolve_scopes(catalog().endpoints(), true, None);
    assert!(org.contains("Team.ReadBasic.All"));
    assert!(org.contains("User.Read.All"));
}

#[test]
fn test_name_pattern_restricts_scopes() {
    let scopes = resolve_scopes(catalog().endpoints(), false, Some("calendar"));
    assert_eq!(scopes.into_iter().collect::<Vec<_>>(), vec!["Calendars.Read"]);
}

#[test]
fn test_invalid_pattern_means_no_filter() {
    let unfiltered = resolve_scopes(catalog().endpoints(), true, None);
    let invalid = resolve_scopes(catalog().endpoints(), true, Some("mail("));
    assert_eq!(unfiltered, invalid);

    let registry = ToolRegistry::build(
        &catalog(),
        &RegistryOptions {
            enabled_tools: Some("[".to_string()),
            ..Default::default()
        },
    );
    assert_eq!(registry.len(), 4);
}

#[test]
fn test_read_only_keeps_only_gets() {
    let registry = ToolRegistry::build(
        &catalog(),
        &RegistryOptions {
            read_only: true,
            org_mode: true,
            ..Default::default()
        },
    );

    assert_eq!(
        names(&registry),
        vec!["list-mail-messages", "list-calendar-events", "list-joined-teams", "list-users"]
    );
    assert!(registry.get("send-mail").is_none());
}

#[test]
fn test_org_only_tools_hidden_without_org_mode() {
    let registry = ToolRegistry::build(&catalog(), &RegistryOptions::default());
    assert!(registry.get("list-joined-teams").is_none());
    assert!(registry.get("list-users").is_none());
    assert!(registry.get("delete-mail-message").is_some());
}

#[test]
fn test_enabled_tools_case_insensitive() {
    let registry = ToolRegistry::build(
        &catalog(),
        &RegistryOptions {
            enabled_tools: Some("MAIL".to_string()),
            ..Default::default()
        },
    );
    assert_eq!(
        names(&registry),
        vec!["list-mail-messages", "send-mail", "delete-mail-message"]
    );
}

#[test]
fn test_preset_pattern_selects_tools() {
    let pattern = combined_preset_pattern(&["calendar"]).unwrap();
    let registry = ToolRegistry::build(
        &catalog(),
        &RegistryOptions {
            enabled_tools: Some(pattern),
            ..Default::default()
        },
    );
    assert_eq!(names(&registry), vec!["list-calendar-events"]);
}
