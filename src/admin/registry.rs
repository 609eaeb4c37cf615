use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::Serialize;

/// One titled group of fields on a detail or add screen.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSet {
    pub title: Option<&'static str>,
    pub classes: &'static [&'static str],
    pub fields: &'static [&'static str],
}

/// Declarative admin configuration for one model. Handlers project rows and
/// detail payloads through this record; nothing here executes queries.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelAdmin {
    pub model: &'static str,
    pub list_display: &'static [&'static str],
    pub list_filter: &'static [&'static str],
    pub search_fields: &'static [&'static str],
    pub ordering: &'static [&'static str],
    pub fieldsets: &'static [FieldSet],
    pub add_fieldsets: &'static [FieldSet],
}

pub const USER_ADMIN: ModelAdmin = ModelAdmin {
    model: "users",
    list_display: &["email", "name", "is_admin"],
    list_filter: &["is_admin", "name"],
    search_fields: &["email", "name"],
    ordering: &["email"],
    fieldsets: &[
        FieldSet {
            title: None,
            classes: &[],
            fields: &["email", "password"],
        },
        FieldSet {
            title: Some("Personal info"),
            classes: &[],
            fields: &["name"],
        },
        FieldSet {
            title: Some("Permissions"),
            classes: &[],
            fields: &["is_admin", "is_staff", "is_active"],
        },
    ],
    add_fieldsets: &[FieldSet {
        title: None,
        classes: &["wide"],
        fields: &["email", "password1", "password2"],
    }],
};

/// The stock group-permission entry every default registry starts with.
const GROUP_ADMIN: ModelAdmin = ModelAdmin {
    model: "groups",
    list_display: &["name"],
    list_filter: &[],
    search_fields: &["name"],
    ordering: &["name"],
    fieldsets: &[FieldSet {
        title: None,
        classes: &[],
        fields: &["name", "permissions"],
    }],
    add_fieldsets: &[],
};

/// Immutable-after-bootstrap mapping from model name to its admin config.
#[derive(Debug, Default)]
pub struct AdminRegistry {
    entries: BTreeMap<&'static str, ModelAdmin>,
}

impl AdminRegistry {
    fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register(GROUP_ADMIN);
        registry
    }

    fn register(&mut self, admin: ModelAdmin) {
        self.entries.insert(admin.model, admin);
    }

    fn unregister(&mut self, model: &str) -> Option<ModelAdmin> {
        self.entries.remove(model)
    }

    pub fn get(&self, model: &str) -> Option<&ModelAdmin> {
        self.entries.get(model)
    }

    pub fn contains(&self, model: &str) -> bool {
        self.entries.contains_key(model)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ModelAdmin> {
        self.entries.values()
    }
}

static REGISTRY: OnceLock<AdminRegistry> = OnceLock::new();

/// Builds the process-wide admin registry exactly once. This application
/// does not use group permissions, so the stock group entry is unregistered
/// before the user model takes its place.
pub fn bootstrap() -> &'static AdminRegistry {
    REGISTRY.get_or_init(|| {
        let mut registry = AdminRegistry::with_defaults();
        registry.unregister("groups");
        registry.register(USER_ADMIN);
        tracing::debug!(
            models = registry.entries.len(),
            "Admin registry initialized"
        );
        registry
    })
}

/// The bootstrapped registry. Safe to call from any handler; initializes on
/// first use if `main` has not already done so.
pub fn registry() -> &'static AdminRegistry {
    bootstrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_removes_group_permissions() {
        let registry = bootstrap();
        assert!(!registry.contains("groups"));
        assert!(registry.contains("users"));
        assert_eq!(registry.entries().count(), 1);
    }

    #[test]
    fn user_admin_list_configuration() {
        let admin = registry().get("users").expect("users registered");
        assert_eq!(admin.list_display, ["email", "name", "is_admin"]);
        assert_eq!(admin.list_filter, ["is_admin", "name"]);
        assert_eq!(admin.search_fields, ["email", "name"]);
        assert_eq!(admin.ordering, ["email"]);
    }

    #[test]
    fn user_admin_fieldsets() {
        let admin = registry().get("users").expect("users registered");

        assert_eq!(admin.fieldsets.len(), 3);
        assert_eq!(admin.fieldsets[0].title, None);
        assert_eq!(admin.fieldsets[0].fields, ["email", "password"]);
        assert_eq!(admin.fieldsets[1].title, Some("Personal info"));
        assert_eq!(admin.fieldsets[2].title, Some("Permissions"));
        assert_eq!(
            admin.fieldsets[2].fields,
            ["is_admin", "is_staff", "is_active"]
        );

        assert_eq!(admin.add_fieldsets.len(), 1);
        assert_eq!(admin.add_fieldsets[0].classes, ["wide"]);
        assert_eq!(
            admin.add_fieldsets[0].fields,
            ["email", "password1", "password2"]
        );
    }

    #[test]
    fn registry_serializes_for_the_config_endpoint() {
        let admin = registry().get("users").expect("users registered");
        let value = serde_json::to_value(admin).expect("serializes");
        assert_eq!(value["model"], "users");
        assert_eq!(value["ordering"][0], "email");
        assert_eq!(value["add_fieldsets"][0]["classes"][0], "wide");
    }
}
