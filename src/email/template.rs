use std::collections::HashMap;

/// The raw (un-rendered) strings of an email template. Placeholders use
/// `{{key}}` syntax and are substituted from the caller's variables map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDefinition {
    pub subject: String,
    pub body: String,
    pub html: String,
}

/// Rendered output ready to hand to an email provider.
#[derive(Debug, Clone)]
pub struct RenderedTemplate {
    pub subject: String,
    pub body: String,
    pub html: String,
}

/// Names of the built-in templates, used when listing alongside a tenant's
/// custom rows.
pub const DEFAULT_TEMPLATE_NAMES: [&str; 4] =
    ["welcome", "login_alert", "password_reset", "magic_link"];

/// Returns the built-in template for `name`, if one exists. Built-ins act as
/// fallbacks when a tenant has not stored a custom override.
pub fn default_template(name: &str) -> Option<TemplateDefinition> {
    let def = match name {
        "welcome" => TemplateDefinition {
            subject: "Welcome to {{service_name}}".to_string(),
            body: "Hi {{user_name}},\n\nWelcome to {{service_name}}! We're glad to have you.\n\nBest,\nThe {{service_name}} Team"
                .to_string(),
            html: "<p>Hi {{user_name}},</p><p>Welcome to <strong>{{service_name}}</strong>! We're glad to have you.</p><p>Best,<br>The {{service_name}} Team</p>"
                .to_string(),
        },
        "login_alert" => TemplateDefinition {
            subject: "New sign-in to your {{service_name}} account".to_string(),
            body: "Hi {{user_name}},\n\nWe detected a new sign-in to your {{service_name}} account. If this was you, no action is needed.\n\nIf you did not sign in, please secure your account immediately."
                .to_string(),
            html: "<p>Hi {{user_name}},</p><p>We detected a new sign-in to your <strong>{{service_name}}</strong> account. If this was you, no action is needed.</p><p>If you did not sign in, please secure your account immediately.</p>"
                .to_string(),
        },
        "password_reset" => TemplateDefinition {
            subject: "Reset your {{service_name}} password".to_string(),
            body: "Hi {{user_name}},\n\nClick the link below to reset your password:\n{{reset_link}}\n\nThis link expires in {{expires_in}}."
                .to_string(),
            html: r##"<p>Hi {{user_name}},</p><p>Click the link below to reset your password:</p><p><a href="{{reset_link}}">Reset Password</a></p><p>This link expires in {{expires_in}}.</p>"##
                .to_string(),
        },
        "magic_link" => TemplateDefinition {
            subject: "Your {{service_name}} sign-in link".to_string(),
            body: "Hi {{user_name}},\n\nUse the link below to sign in:\n{{magic_link}}\n\nThis link expires in {{expires_in}}."
                .to_string(),
            html: r##"<p>Hi {{user_name}},</p><p>Use the link below to sign in:</p><p><a href="{{magic_link}}">Sign In</a></p><p>This link expires in {{expires_in}}.</p>"##
                .to_string(),
        },
        _ => return None,
    };
    Some(def)
}

/// Renders a template against the variables map. Unknown placeholders are
/// left as-is; extra variables are ignored.
pub fn render(
    def: &TemplateDefinition,
    variables: &HashMap<String, serde_json::Value>,
) -> RenderedTemplate {
    RenderedTemplate {
        subject: interpolate(&def.subject, variables),
        body: interpolate(&def.body, variables),
        html: interpolate(&def.html, variables),
    }
}

fn interpolate(template: &str, variables: &HashMap<String, serde_json::Value>) -> String {
    let mut out = template.to_string();
    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        let replacement = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out = out.replace(&placeholder, &replacement);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, serde_json::Value)]) -> HashMap<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn all_default_names_resolve() {
        for name in DEFAULT_TEMPLATE_NAMES {
            assert!(default_template(name).is_some(), "missing default {}", name);
        }
        assert!(default_template("no_such_template").is_none());
    }

    #[test]
    fn renders_placeholders() {
        let def = default_template("welcome").unwrap();
        let rendered = render(
            &def,
            &vars(&[
                ("service_name", json!("Acme")),
                ("user_name", json!("Ada")),
            ]),
        );
        assert_eq!(rendered.subject, "Welcome to Acme");
        assert!(rendered.body.contains("Hi Ada,"));
        assert!(rendered.html.contains("<strong>Acme</strong>"));
    }

    #[test]
    fn non_string_variables_are_stringified() {
        let def = TemplateDefinition {
            subject: "You have {{count}} new messages".to_string(),
            body: String::new(),
            html: String::new(),
        };
        let rendered = render(&def, &vars(&[("count", json!(3))]));
        assert_eq!(rendered.subject, "You have 3 new messages");
    }

    #[test]
    fn unknown_placeholders_are_left_alone() {
        let def = TemplateDefinition {
            subject: "Hello {{nobody}}".to_string(),
            body: String::new(),
            html: String::new(),
        };
        let rendered = render(&def, &HashMap::new());
        assert_eq!(rendered.subject, "Hello {{nobody}}");
    }
}
