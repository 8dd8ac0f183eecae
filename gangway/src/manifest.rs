//! Rendering job descriptions with resolved credentials.

use gangway_common::prelude::*;
use gangway_common::secrets::DashboardCredentials;
use handlebars::Handlebars;

/// Parameters available inside a job description template.
#[derive(Serialize)]
struct JobDescriptionParams<'a> {
    dashboard: &'a DashboardCredentials,
}

/// Render a job description template, filling in the dashboard credentials
/// using [Handlebars][].
///
/// Strict mode is on: a placeholder with no matching value is an error, not
/// silence, because silently shipping an empty basic-auth line would lock
/// everyone out of the dashboard.
///
/// [Handlebars]: https://handlebarsjs.com/
pub fn render_job_description(
    template: &str,
    dashboard: &DashboardCredentials,
) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);

    // The description is HCL or JSON; assume values land inside
    // double-quoted strings.
    handlebars.register_escape_fn(quoted_escape);

    let params = JobDescriptionParams { dashboard };
    handlebars
        .render_template(template, &params)
        .context("error rendering job description")
}

/// Escape a string for use inside a double-quoted HCL or JSON string.
fn quoted_escape(s: &str) -> String {
    let mut result = String::new();
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '\"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => result.push_str(&format!("\\u{:04x}", c as u32)),
            c => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dashboard() -> DashboardCredentials {
        DashboardCredentials {
            username: "admin".to_owned(),
            password: "hunt\"er2".to_owned(),
            auth: "admin:$apr1$abcdef$ghijkl".to_owned(),
        }
    }

    #[test]
    fn quoted_escape_handles_common_chars() {
        let examples = &[
            ("abc 123", "abc 123"),
            ("$apr1$x", "$apr1$x"),
            ("\\", "\\\\"),
            ("\"", "\\\""),
            ("\n", "\\n"),
            ("\t", "\\t"),
            ("\u{0007}", "\\u0007"),
        ];
        for &(input, expected) in examples {
            assert_eq!(quoted_escape(input), expected);
        }
    }

    #[test]
    fn renders_dashboard_credentials_into_the_description() {
        let template = concat!(
            "job \"webproxy\" {\n",
            "  auth = \"{{dashboard.auth}}\"\n",
            "  user = \"{{dashboard.username}}:{{dashboard.password}}\"\n",
            "}\n"
        );
        let rendered = render_job_description(template, &dashboard()).unwrap();
        assert!(rendered.contains("auth = \"admin:$apr1$abcdef$ghijkl\""));
        assert!(rendered.contains("user = \"admin:hunt\\\"er2\""));
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let template = r#"auth = "{{dashboard.certificate}}""#;
        assert!(render_job_description(template, &dashboard()).is_err());
    }
}
