//! Locations and redirects.

use std::fmt;

/// An in-app location: a path plus optional query string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    path: String,
    query: Option<String>,
}

impl Location {
    /// Parse `"/path?query"`. A missing leading slash is added.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (path, query) = match raw.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string()).filter(|q| !q.is_empty())),
            None => (raw, None),
        };
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        Self { path, query }
    }

    /// The landing page.
    pub fn home() -> Self {
        Self::parse("/")
    }

    /// Path component.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query string without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.query {
            Some(query) => write!(f, "{}?{}", self.path, query),
            None => f.write_str(&self.path),
        }
    }
}

/// Instruction to navigate away, remembering where the user was headed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Where to go now.
    pub to: Location,
    /// The location that was originally requested.
    pub from: Option<Location>,
}

impl Redirect {
    /// Send the user to sign-in, to come back to `from` afterwards.
    pub fn to_sign_in(sign_in_path: &str, from: Option<Location>) -> Self {
        Self {
            to: Location::parse(sign_in_path),
            from,
        }
    }

    /// Where a successful sign-in should land.
    ///
    /// Never the sign-in page itself.
    pub fn resume_target(&self) -> Location {
        match &self.from {
            Some(from) if from.path() != self.to.path() => from.clone(),
            _ => Location::home(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let location = Location::parse("dashboard/users?page=2");
        assert_eq!(location.path(), "/dashboard/users");
        assert_eq!(location.query(), Some("page=2"));
        assert_eq!(location.to_string(), "/dashboard/users?page=2");
    }

    #[test]
    fn test_parse_drops_empty_query() {
        assert_eq!(Location::parse("/news?").to_string(), "/news");
    }

    #[test]
    fn test_resume_target_returns_origin() {
        let redirect = Redirect::to_sign_in("/login", Some(Location::parse("/add-article")));
        assert_eq!(redirect.to.path(), "/login");
        assert_eq!(redirect.resume_target(), Location::parse("/add-article"));
    }

    #[test]
    fn test_resume_target_avoids_sign_in_loop() {
        let redirect = Redirect::to_sign_in("/login", Some(Location::parse("/login?x=1")));
        assert_eq!(redirect.resume_target(), Location::home());

        let redirect = Redirect::to_sign_in("/login", None);
        assert_eq!(redirect.resume_target(), Location::home());
    }
}
