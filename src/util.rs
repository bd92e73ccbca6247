//! Text and path helpers shared by the dispatcher and handlers.

use std::sync::OnceLock;

use chrono::{FixedOffset, Utc};
use regex::Regex;

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap())
}

/// Strip markup from a status body, leaving plain text.
pub fn html_to_text(html: &str) -> String {
    html_tag_re().replace_all(html, " ").into_owned()
}

/// Today's calendar date (`YYYY-MM-DD`) in the configured offset.
pub fn today_ymd(tz: &FixedOffset) -> String {
    Utc::now().with_timezone(tz).format("%Y-%m-%d").to_string()
}

/// Wall-clock timestamp (`YYYY-MM-DD HH:MM:SS`) in the configured offset.
pub fn now_stamp(tz: &FixedOffset) -> String {
    Utc::now()
        .with_timezone(tz)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// How a runner is addressed in replies, per the `아이디_표기` setting.
///
/// `hidden` shows the nickname when present, otherwise the handle;
/// `parens` shows `nickname(@handle)`; `replace` behaves like `hidden`.
pub fn build_user_label(handle: &str, nickname: &str, mode: &str) -> String {
    let nn = nickname.trim();
    match mode {
        "parens" => {
            if nn.is_empty() {
                format!("@{handle}")
            } else {
                format!("{nn}(@{handle})")
            }
        }
        _ => {
            if nn.is_empty() {
                handle.to_string()
            } else {
                nn.to_string()
            }
        }
    }
}

/// Normalize a slash-delimited path: trim outer slashes and whitespace,
/// collapse duplicate separators.
pub fn normalize_path(token: &str) -> String {
    token
        .trim()
        .trim_matches('/')
        .split('/')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Parent of a normalized path; root maps to the empty path.
pub fn path_parent(path: &str) -> String {
    let p = normalize_path(path);
    match p.rsplit_once('/') {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}

/// Last segment of a path (the current node); empty for the root.
pub fn path_last(path: &str) -> String {
    let p = normalize_path(path);
    p.rsplit('/').next().unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags() {
        assert_eq!(
            html_to_text("<p>hello <span>world</span></p>").split_whitespace().collect::<Vec<_>>(),
            vec!["hello", "world"]
        );
    }

    #[test]
    fn label_modes() {
        assert_eq!(build_user_label("alice", "앨리스", "hidden"), "앨리스");
        assert_eq!(build_user_label("alice", "", "hidden"), "alice");
        assert_eq!(build_user_label("alice", "앨리스", "parens"), "앨리스(@alice)");
        assert_eq!(build_user_label("alice", "", "parens"), "@alice");
        assert_eq!(build_user_label("alice", "앨리스", "replace"), "앨리스");
        assert_eq!(build_user_label("alice", "", "replace"), "alice");
    }

    #[test]
    fn path_normalization() {
        assert_eq!(normalize_path(" /숲/ 동굴 / "), "숲/동굴");
        assert_eq!(normalize_path("//"), "");
        assert_eq!(normalize_path("숲"), "숲");
    }

    #[test]
    fn path_parent_and_last() {
        assert_eq!(path_parent("숲/동굴"), "숲");
        assert_eq!(path_parent("숲"), "");
        assert_eq!(path_parent(""), "");
        assert_eq!(path_last("숲/동굴"), "동굴");
        assert_eq!(path_last(""), "");
    }
}
