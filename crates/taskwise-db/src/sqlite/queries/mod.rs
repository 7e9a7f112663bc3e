pub mod access_tokens;
pub mod activities;
pub mod attachments;
pub mod comments;
pub mod journals;
pub mod tasks;
pub mod users;

use rusqlite::types::ToSql;

/// Positional parameters for dynamically assembled statements.
#[derive(Default)]
pub(crate) struct Params {
    values: Vec<Box<dyn ToSql>>,
}

impl Params {
    /// Push a value and return its `?N` placeholder.
    pub(crate) fn push(&mut self, value: impl ToSql + 'static) -> String {
        self.values.push(Box::new(value));
        format!("?{}", self.values.len())
    }

    pub(crate) fn as_refs(&self) -> Vec<&dyn ToSql> {
        self.values.iter().map(|p| p.as_ref()).collect()
    }
}

/// `%term%` for a LIKE comparison, with the wildcard characters escaped.
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_number_placeholders_in_order() {
        let mut p = Params::default();
        assert_eq!(p.push(1i64), "?1");
        assert_eq!(p.push("x".to_string()), "?2");
        assert_eq!(p.as_refs().len(), 2);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" budi "), "%budi%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
