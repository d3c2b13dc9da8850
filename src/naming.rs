//! Name templates for new VMs and snapshots.
//!
//! A template is literal text with `{{ Func "arg" }}` placeholders drawn
//! from a fixed registry:
//!
//! | Function     | Arguments            | Value                                   |
//! |--------------|----------------------|-----------------------------------------|
//! | `Env`        | variable name        | environment variable (empty when unset) |
//! | `Now`        | optional Joda format | local time                              |
//! | `UtcNow`     | optional Joda format | UTC time                                |
//! | `Username`   |                      | OS user's display name, trimmed at `@`  |
//! | `VsUsername` |                      | vSphere user, trimmed at `@`            |

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Local, TimeZone, Utc};
use regex::Regex;
use tracing::error;
use uuid::Uuid;

pub const VM_NAME_TEMPLATE: &str = "{{ Username }} - {{ Now }}";
pub const SNAPSHOT_NAME_TEMPLATE: &str = "Snapshot - {{ Username }} - {{ Now }}";
pub const DEFAULT_TIME_FORMAT: &str = "YYYY-MM-dd hh:mm:ss";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateError(String);

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TemplateError {}

/// Values the registry reads besides the clock and the environment.
#[derive(Debug, Clone, Default)]
pub struct NameContext {
    pub os_username: String,
    pub vsphere_username: String,
}

impl NameContext {
    pub fn new(vsphere_username: impl Into<String>) -> Self {
        Self {
            os_username: os_username(),
            vsphere_username: vsphere_username.into(),
        }
    }
}

/// The current user's display name (the first GECOS field on unix), or
/// the login name when the account has none.
#[cfg(unix)]
fn os_username() -> String {
    use nix::unistd::{getuid, User};

    match User::from_uid(getuid()) {
        Ok(Some(user)) => display_name(&user.gecos.to_string_lossy()).unwrap_or(user.name),
        _ => login_name(),
    }
}

#[cfg(not(unix))]
fn os_username() -> String {
    login_name()
}

fn login_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "Unknown user".to_string())
}

/// Full name out of a GECOS field (`Full Name,Room,Phone,...`).
fn display_name(gecos: &str) -> Option<String> {
    let name = gecos.split(',').next().unwrap_or_default().trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Render `template`, or `default` when none was given.
///
/// Any template failure is logged and a random UUID is used instead.
pub fn generate_name(template: Option<&str>, default: &str, ctx: &NameContext) -> String {
    let template = template.unwrap_or(default);
    match render(template, ctx) {
        Ok(name) => name,
        Err(e) => {
            error!("Failed to evaluate name template '{template}': {e}; using a random name");
            Uuid::new_v4().to_string()
        }
    }
}

pub fn render(template: &str, ctx: &NameContext) -> Result<String, TemplateError> {
    render_at(template, ctx, Utc::now())
}

/// Render against a fixed instant.
pub fn render_at(template: &str, ctx: &NameContext, now: DateTime<Utc>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| TemplateError(format!("unclosed action at offset {}", template.len() - rest.len() + start)))?;
        out.push_str(&evaluate(&after[..end], ctx, now)?);
        rest = &after[end + 2..];
    }
    if rest.contains("}}") {
        return Err(TemplateError("unexpected '}}'".to_string()));
    }
    out.push_str(rest);
    Ok(out)
}

fn action_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^\s*([A-Za-z][A-Za-z0-9]*)((?:\s+"(?:[^"\\]|\\.)*")*)\s*$"#)
            .expect("action pattern is valid")
    })
}

fn argument_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#""((?:[^"\\]|\\.)*)""#).expect("argument pattern is valid")
    })
}

fn evaluate(action: &str, ctx: &NameContext, now: DateTime<Utc>) -> Result<String, TemplateError> {
    let caps = action_pattern()
        .captures(action)
        .ok_or_else(|| TemplateError(format!("malformed action '{}'", action.trim())))?;
    let name = &caps[1];
    let args: Vec<String> = argument_pattern()
        .captures_iter(caps.get(2).map_or("", |m| m.as_str()))
        .map(|c| unescape(&c[1]))
        .collect();

    match (name, args.as_slice()) {
        ("Env", [var]) => Ok(std::env::var(var).unwrap_or_default()),
        ("Now", []) => Ok(format_time(&now.with_timezone(&Local), DEFAULT_TIME_FORMAT)),
        ("Now", [format]) => Ok(format_time(&now.with_timezone(&Local), format)),
        ("UtcNow", []) => Ok(format_time(&now, DEFAULT_TIME_FORMAT)),
        ("UtcNow", [format]) => Ok(format_time(&now, format)),
        ("Username", []) => Ok(trim_domain(&ctx.os_username).to_string()),
        ("VsUsername", []) => Ok(trim_domain(&ctx.vsphere_username).to_string()),
        ("Env" | "Now" | "UtcNow" | "Username" | "VsUsername", _) => {
            Err(TemplateError(format!("wrong number of args for {name}: got {}", args.len())))
        }
        _ => Err(TemplateError(format!("function \"{name}\" not defined"))),
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn trim_domain(user: &str) -> &str {
    user.split('@').next().unwrap_or(user)
}

fn format_time<Tz: TimeZone>(time: &DateTime<Tz>, joda: &str) -> String
where
    Tz::Offset: fmt::Display,
{
    time.format(&joda_to_strftime(joda)).to_string()
}

/// Translate a Joda-style pattern (`YYYY-MM-dd hh:mm:ss`) to strftime.
///
/// Letters without a mapping and anything inside single quotes are
/// emitted literally; `''` is a literal quote.
pub fn joda_to_strftime(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }
        i += run;

        let directive = match (c, run) {
            ('Y' | 'y', 2) => "%y",
            ('Y' | 'y', _) => "%Y",
            ('M', 1) => "%-m",
            ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', 1) => "%-d",
            ('d', _) => "%d",
            ('D', _) => "%j",
            ('H', 1) => "%-H",
            ('H', _) => "%H",
            ('h', 1) => "%-I",
            ('h', _) => "%I",
            ('m', 1) => "%-M",
            ('m', _) => "%M",
            ('s', 1) => "%-S",
            ('s', _) => "%S",
            ('S', _) => "%3f",
            ('a', _) => "%p",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            ('Z', _) => "%z",
            ('z', _) => "%Z",
            _ => {
                for _ in 0..run {
                    push_literal(&mut out, c);
                }
                continue;
            }
        };
        out.push_str(directive);
    }
    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn ctx() -> NameContext {
        NameContext {
            os_username: "jdoe@CORP".into(),
            vsphere_username: "administrator@vsphere.local".into(),
        }
    }

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 15, 4, 5).unwrap()
    }

    #[test]
    fn joda_translation() {
        assert_eq!(joda_to_strftime("YYYY-MM-dd hh:mm:ss"), "%Y-%m-%d %I:%M:%S");
        assert_eq!(joda_to_strftime("yyyyMMdd'T'HHmm"), "%Y%m%dT%H%M");
        assert_eq!(joda_to_strftime("d MMM yy, 100%"), "%-d %b %y, 100%%");
        assert_eq!(joda_to_strftime("'it''s' HH"), "its %H");
        assert_eq!(joda_to_strftime("h:mm a"), "%-I:%M %p");
    }

    #[test]
    fn utc_time_with_and_without_format() {
        let name = render_at("{{ UtcNow }}", &ctx(), instant()).unwrap();
        assert_eq!(name, "2024-03-07 03:04:05");

        let name = render_at(r#"build-{{ UtcNow "yyyyMMdd-HHmm" }}"#, &ctx(), instant()).unwrap();
        assert_eq!(name, "build-20240307-1504");
    }

    #[test]
    fn usernames_are_trimmed_at_the_domain() {
        let name = render_at("{{Username}}/{{ VsUsername }}", &ctx(), instant()).unwrap();
        assert_eq!(name, "jdoe/administrator");
    }

    #[test]
    fn display_name_is_the_first_gecos_field() {
        assert_eq!(display_name("Jane Doe,Room 4,555-0100,"), Some("Jane Doe".to_string()));
        assert_eq!(display_name("Build Agent"), Some("Build Agent".to_string()));
        assert_eq!(display_name(",,,"), None);
        assert_eq!(display_name(""), None);
    }

    #[test]
    #[serial]
    fn env_lookup() {
        std::env::set_var("VCON_NAMING_TEST", "ci");
        let name = render_at(r#"{{ Env "VCON_NAMING_TEST" }}-vm"#, &ctx(), instant()).unwrap();
        std::env::remove_var("VCON_NAMING_TEST");
        assert_eq!(name, "ci-vm");

        let name = render_at(r#"[{{ Env "VCON_NAMING_TEST" }}]"#, &ctx(), instant()).unwrap();
        assert_eq!(name, "[]");
    }

    #[test]
    fn template_errors() {
        assert!(render_at("{{ Hostname }}", &ctx(), instant()).is_err());
        assert!(render_at("{{ Env }}", &ctx(), instant()).is_err());
        assert!(render_at("{{ Username \"x\" }}", &ctx(), instant()).is_err());
        assert!(render_at("{{ Now", &ctx(), instant()).is_err());
        assert!(render_at("Now }}", &ctx(), instant()).is_err());
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(render_at("web-01", &ctx(), instant()).unwrap(), "web-01");
    }

    #[test]
    fn failure_falls_back_to_a_uuid() {
        let name = generate_name(Some("{{ Broken"), VM_NAME_TEMPLATE, &ctx());
        assert!(Uuid::parse_str(&name).is_ok());
    }

    #[test]
    fn default_template_is_used_without_one() {
        let name = generate_name(None, SNAPSHOT_NAME_TEMPLATE, &ctx());
        assert!(name.starts_with("Snapshot - jdoe - "), "{name}");
    }
}
