use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use super::TransformArgs;
use crate::config::scaffold::slugify;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Trim and collapse inner runs of whitespace (listing markup is full of newlines).
pub fn trim(value: &str) -> Option<String> {
    Some(WHITESPACE.replace_all(value.trim(), " ").into_owned())
}

pub fn slug(value: &str) -> Option<String> {
    let slug = slugify(value);
    (!slug.is_empty()).then_some(slug)
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Invalid transform pattern '{}': {}", pattern, e);
            None
        }
    }
}

/// `{pattern, group?}`: the capture group (1 by default, 0 without groups) of the first match.
pub fn extract_text(value: &str, args: &TransformArgs) -> Option<String> {
    let Some(pattern) = args.str("pattern") else {
        warn!("extract-text transform has no 'pattern' param");
        return Some(value.to_string());
    };
    let re = compile(pattern)?;
    let caps = re.captures(value)?;
    let default_group = if caps.len() > 1 { 1 } else { 0 };
    let group = args.usize("group").unwrap_or(default_group);
    caps.get(group).map(|m| m.as_str().trim().to_string())
}

/// `{pattern, replacement?}`: replace every match, removing it when no replacement is given.
pub fn regex_replace(value: &str, args: &TransformArgs) -> Option<String> {
    let Some(pattern) = args.str("pattern") else {
        warn!("regex transform has no 'pattern' param");
        return Some(value.to_string());
    };
    let re = compile(pattern)?;
    let replacement = args.str("replacement").unwrap_or("");
    Some(re.replace_all(value, replacement).into_owned())
}
