//! CLI enum types for capture and answer modes.

use clap::ValueEnum;

use crate::capture::CaptureMode;
use crate::scoring::AnswerKind;

/// What triggers a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
    #[default]
    Auto,
    Periodic,
    Manual,
}

impl From<Mode> for CaptureMode {
    fn from(m: Mode) -> Self {
        match m {
            Mode::Auto => CaptureMode::Auto,
            Mode::Periodic => CaptureMode::Periodic,
            Mode::Manual => CaptureMode::Manual,
        }
    }
}

/// Question type hint sent to the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AnswerMode {
    #[default]
    #[value(name = "MC", alias = "mc")]
    Mc,
    #[value(name = "VF", alias = "vf")]
    Vf,
}

impl From<AnswerMode> for AnswerKind {
    fn from(m: AnswerMode) -> Self {
        match m {
            AnswerMode::Mc => AnswerKind::MultipleChoice,
            AnswerMode::Vf => AnswerKind::TrueFalse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_to_capture_mode() {
        assert_eq!(CaptureMode::from(Mode::Auto), CaptureMode::Auto);
        assert_eq!(CaptureMode::from(Mode::Periodic), CaptureMode::Periodic);
        assert_eq!(CaptureMode::from(Mode::Manual), CaptureMode::Manual);
    }

    #[test]
    fn test_answer_mode_to_kind() {
        assert_eq!(AnswerKind::from(AnswerMode::Mc), AnswerKind::MultipleChoice);
        assert_eq!(AnswerKind::from(AnswerMode::Vf), AnswerKind::TrueFalse);
    }

    #[test]
    fn test_answer_mode_parses_either_case() {
        assert_eq!(AnswerMode::from_str("VF", false), Ok(AnswerMode::Vf));
        assert_eq!(AnswerMode::from_str("mc", false), Ok(AnswerMode::Mc));
    }
}
