//! `response_type` parsing.

/// The set of response types named by a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseTypes {
    pub code: bool,
    pub token: bool,
    pub none: bool,
}

impl ResponseTypes {
    /// Parse a whitespace-separated list. Unknown members and invalid
    /// combinations yield `None`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut types = Self::default();
        for word in text.split_whitespace() {
            match word {
                "code" => types.code = true,
                "token" => types.token = true,
                "none" => types.none = true,
                _ => return None,
            }
        }
        types.is_valid().then_some(types)
    }

    /// `none` must stand alone; otherwise at least one of `code` and `token`.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        if self.none { !self.code && !self.token } else { self.code || self.token }
    }

    /// The only combination this server completes.
    #[must_use]
    pub const fn is_code_only(self) -> bool {
        self.code && !self.token && !self.none
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_sets() {
        let code = ResponseTypes::parse("code").unwrap();
        assert!(code.is_code_only());

        let hybrid = ResponseTypes::parse("code  token").unwrap();
        assert!(hybrid.code && hybrid.token);
        assert!(!hybrid.is_code_only());

        let none = ResponseTypes::parse("none").unwrap();
        assert!(none.none && !none.is_code_only());
    }

    #[test]
    fn test_parse_invalid_sets() {
        assert_eq!(ResponseTypes::parse(""), None);
        assert_eq!(ResponseTypes::parse("code none"), None);
        assert_eq!(ResponseTypes::parse("id_token"), None);
        assert_eq!(ResponseTypes::parse("code bogus"), None);
    }
}
