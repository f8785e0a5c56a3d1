use docsession_core::{Result, SaveCodes, SessionError};

/// Outcome of [`DocumentProxy::save`](super::DocumentProxy::save) and
/// [`DocumentProxy::save_as`](super::DocumentProxy::save_as).
///
/// Non-zero host codes are reported here rather than as an error, so callers
/// can inspect warnings of a successful save.
///
/// # Examples
///
/// ```
/// use docsession::document::SaveResult;
/// use docsession_core::SaveCodes;
///
/// let result = SaveResult::from(SaveCodes { accepted: true, errors: 0, warnings: 0x4 });
/// assert!(result.succeeded);
/// assert_eq!(result.warnings, 0x4);
///
/// let failed = SaveResult::from(SaveCodes { accepted: false, errors: 0x1, warnings: 0 });
/// assert!(failed.into_result().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveResult {
    pub succeeded: bool,
    pub errors: i32,
    pub warnings: i32,
}

impl SaveResult {
    /// Turns a failed save into [`SessionError::Save`].
    pub fn into_result(self) -> Result<Self> {
        if self.succeeded {
            Ok(self)
        } else {
            Err(SessionError::Save {
                errors: self.errors,
                warnings: self.warnings,
            })
        }
    }
}

impl From<SaveCodes> for SaveResult {
    fn from(codes: SaveCodes) -> Self {
        Self {
            succeeded: codes.accepted && codes.errors == 0,
            errors: codes.errors,
            warnings: codes.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsession_core::ErrorClass;

    #[test]
    fn test_accepted_with_errors_is_failure() {
        let result = SaveResult::from(SaveCodes {
            accepted: true,
            errors: 0x2,
            warnings: 0,
        });
        assert!(!result.succeeded);
        let err = result.into_result().unwrap_err();
        assert_eq!(err.class(), ErrorClass::SaveFailure);
    }

    #[test]
    fn test_ok_codes() {
        let result = SaveResult::from(SaveCodes::ok());
        assert_eq!(result.into_result().unwrap(), result);
    }
}
