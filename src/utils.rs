use chrono::{DateTime, NaiveDateTime, Utc};
use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Profile mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

impl Profile {
    fn app_name(self) -> &'static str {
        match self {
            Profile::Dev => "tally-dev",
            Profile::Prod => "tally",
        }
    }
}

/// Get the configuration directory path
/// If profile is Dev, uses "tally-dev" instead of "tally"
pub fn get_config_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "tally", profile.app_name())
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the data directory path
/// If profile is Dev, uses "tally-dev" instead of "tally"
pub fn get_data_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "tally", profile.app_name())
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse a date string in ISO 8601 format (YYYY-MM-DD)
pub fn parse_date(date_str: &str) -> Result<chrono::NaiveDate, chrono::ParseError> {
    chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
}

/// Parse a timestamp written either as RFC 3339 or as "YYYY-MM-DD HH:MM:SS" (UTC)
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(_) => NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
            .map(|naive| naive.and_utc()),
    }
}

/// Parse tags from a comma-separated string
pub fn parse_tags(tags: &str) -> Vec<String> {
    normalize_tags(tags.split(','))
}

/// Trim tags, drop empty ones and duplicates, keeping first-seen order
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tags_trims_and_dedups() {
        assert_eq!(parse_tags(" work, home ,,work"), vec!["work", "home"]);
        assert!(parse_tags("  ").is_empty());
    }

    #[test]
    fn parse_timestamp_accepts_both_layouts() {
        let js = parse_timestamp("2024-03-01T08:30:00.000Z").unwrap();
        let plain = parse_timestamp("2024-03-01 08:30:00").unwrap();
        assert_eq!(js, plain);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn expand_path_leaves_absolute_paths() {
        assert_eq!(expand_path("/tmp/app.db"), PathBuf::from("/tmp/app.db"));
    }
}
