// Aggregate errors
// Several failures reported as one

use std::collections::HashSet;
use std::error::Error as StdError;
use std::fmt;

use crate::coder::CoderRegistry;
use crate::stack::StackError;
use crate::BoxError;

/// A non-empty list of errors
#[derive(Debug, Clone)]
pub struct Aggregate {
    errors: Vec<StackError>,
}

impl Aggregate {
    /// Collect errors, returning `None` when there are none
    pub fn new<I, E>(registry: &CoderRegistry, errors: I) -> Option<Self>
    where
        I: IntoIterator<Item = E>,
        E: Into<BoxError>,
    {
        let errors: Vec<StackError> = errors
            .into_iter()
            .map(|e| StackError::from_error(registry, e))
            .collect();

        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    /// Collect the failures from a batch of results
    pub fn from_results<T, E, I>(registry: &CoderRegistry, results: I) -> Option<Self>
    where
        I: IntoIterator<Item = Result<T, E>>,
        E: Into<BoxError>,
    {
        Self::new(registry, results.into_iter().filter_map(Result::err))
    }

    pub fn errors(&self) -> &[StackError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> Vec<StackError> {
        self.errors
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut seen = HashSet::new();
        let messages: Vec<String> = self
            .errors
            .iter()
            .map(ToString::to_string)
            .filter(|m| seen.insert(m.clone()))
            .collect();

        if messages.len() == 1 {
            write!(f, "{}", messages[0])
        } else {
            write!(f, "[{}]", messages.join(", "))
        }
    }
}

impl StdError for Aggregate {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codes, ModuleInfo};

    fn registry() -> CoderRegistry {
        CoderRegistry::new(ModuleInfo::new("batch"))
    }

    #[test]
    fn test_empty_is_none() {
        let registry = registry();
        assert!(Aggregate::new(&registry, Vec::<StackError>::new()).is_none());
        let all_ok: Vec<Result<(), StackError>> = vec![Ok(()), Ok(())];
        assert!(Aggregate::from_results(&registry, all_ok).is_none());
    }

    #[test]
    fn test_single_message_is_bare() {
        let registry = registry();
        let errors = vec![StackError::wrap(&registry, codes::VALIDATION, "a")];
        let agg = Aggregate::new(&registry, errors).unwrap();
        assert_eq!(agg.to_string(), "Validation failed.:a");
    }

    #[test]
    fn test_duplicates_are_collapsed() {
        let registry = registry();
        let results: Vec<Result<(), StackError>> = vec![
            Err(StackError::wrap(&registry, codes::VALIDATION, "a")),
            Ok(()),
            Err(StackError::wrap(&registry, codes::VALIDATION, "a")),
            Err(StackError::wrap(&registry, codes::BIND, "b")),
        ];

        let agg = Aggregate::from_results(&registry, results).unwrap();
        assert_eq!(agg.len(), 3);
        assert_eq!(
            agg.to_string(),
            "[Validation failed.:a, Error occurred while binding the request body to the struct.:b]"
        );
    }
}
