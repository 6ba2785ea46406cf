//! Named tool categories and presets.
//!
//! A category is a case-insensitive pattern over tool names. Presets are
//! comma-separated category names combined into one enabled-tools pattern.

use regex::RegexBuilder;

use crate::error::ConfigError;

/// A named group of tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub name: &'static str,
    pub description: &'static str,
    pub pattern: &'static str,
    /// Tools in this category only work for organizational accounts.
    pub requires_org_mode: bool,
}

impl Category {
    /// Whether `tool_name` belongs to this category.
    pub fn matches(&self, tool_name: &str) -> bool {
        RegexBuilder::new(self.pattern)
            .case_insensitive(true)
            .build()
            .map(|re| re.is_match(tool_name))
            .unwrap_or(false)
    }
}

pub const CATEGORIES: &[Category] = &[
    Category {
        name: "mail",
        description: "Outlook mail: messages, folders, drafts and attachments",
        pattern: "mail|draft|attachment",
        requires_org_mode: false,
    },
    Category {
        name: "calendar",
        description: "Calendars and events",
        pattern: "calendar|event",
        requires_org_mode: false,
    },
    Category {
        name: "files",
        description: "OneDrive files and folders",
        pattern: "drive|file|upload|download",
        requires_org_mode: false,
    },
    Category {
        name: "personal",
        description: "Everything available to personal accounts",
        pattern: "mail|draft|attachment|calendar|event|drive|file|contact|todo|task|onenote|notebook|excel|workbook|me$",
        requires_org_mode: false,
    },
    Category {
        name: "work",
        description: "Teams, chats, SharePoint, Planner and directory tools",
        pattern: "team|channel|chat|sharepoint|site|planner|meeting|user",
        requires_org_mode: true,
    },
    Category {
        name: "excel",
        description: "Excel workbooks, worksheets, ranges and charts",
        pattern: "excel|workbook|worksheet|range|chart",
        requires_org_mode: false,
    },
    Category {
        name: "contacts",
        description: "Outlook contacts",
        pattern: "contact",
        requires_org_mode: false,
    },
    Category {
        name: "tasks",
        description: "To Do lists, tasks and Planner",
        pattern: "todo|task|planner",
        requires_org_mode: false,
    },
    Category {
        name: "onenote",
        description: "OneNote notebooks, sections and pages",
        pattern: "onenote|notebook|section|page",
        requires_org_mode: false,
    },
    Category {
        name: "search",
        description: "Microsoft Search queries",
        pattern: "search",
        requires_org_mode: false,
    },
    Category {
        name: "users",
        description: "Directory users",
        pattern: "user",
        requires_org_mode: true,
    },
    Category {
        name: "all",
        description: "Every tool",
        pattern: ".*",
        requires_org_mode: false,
    },
];

/// Look up a category by name (case-insensitive).
pub fn find_category(name: &str) -> Option<&'static Category> {
    CATEGORIES
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
}

/// Combine preset names into one enabled-tools pattern.
pub fn combined_preset_pattern<S: AsRef<str>>(names: &[S]) -> Result<String, ConfigError> {
    let mut patterns = Vec::with_capacity(names.len());
    for name in names {
        let category = find_category(name.as_ref()).ok_or_else(|| ConfigError::UnknownPreset {
            name: name.as_ref().to_string(),
        })?;
        if category.name == "all" {
            return Ok(category.pattern.to_string());
        }
        patterns.push(format!("(?:{})", category.pattern));
    }
    Ok(patterns.join("|"))
}

/// Whether the named preset needs org mode. Unknown names do not.
pub fn preset_requires_org_mode(name: &str) -> bool {
    find_category(name).is_some_and(|c| c.requires_org_mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_lookup_ignores_case() {
        assert_eq!(find_category("Mail").unwrap().name, "mail");
        assert!(find_category("nope").is_none());
    }

    #[test]
    fn test_every_category_pattern_compiles() {
        for category in CATEGORIES {
            assert!(
                RegexBuilder::new(category.pattern).build().is_ok(),
                "{} has an invalid pattern",
                category.name
            );
        }
    }

    #[test]
    fn test_combined_pattern_matches_each_preset() {
        let pattern = combined_preset_pattern(&["mail", "calendar"]).unwrap();
        let re = RegexBuilder::new(&pattern).case_insensitive(true).build().unwrap();
        assert!(re.is_match("list-mail-messages"));
        assert!(re.is_match("get-calendar-view"));
        assert!(!re.is_match("list-contacts"));
    }

    #[test]
    fn test_all_preset_short_circuits() {
        assert_eq!(combined_preset_pattern(&["mail", "all"]).unwrap(), ".*");
    }

    #[test]
    fn test_unknown_preset_is_config_error() {
        let err = combined_preset_pattern(&["mail", "bogus"]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPreset { ref name } if name == "bogus"));
    }

    #[test]
    fn test_org_mode_presets() {
        assert!(preset_requires_org_mode("work"));
        assert!(preset_requires_org_mode("users"));
        assert!(!preset_requires_org_mode("mail"));
        assert!(!preset_requires_org_mode("unknown"));
    }
}
