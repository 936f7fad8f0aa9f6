//! Styled console output.
//!
//! Styling is applied only when stdout is a colour-capable terminal, so piped
//! and `--json` output stays plain.

use owo_colors::{OwoColorize, Style, colors::css};

/// Listings drop secondary columns below this width.
const NARROW_COLUMNS: u16 = 60;

/// How a piece of output should read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Success,
    Warning,
    Error,
    Muted,
    /// Requests that have been dealt with.
    Actioned,
}

impl Tone {
    fn style(self) -> Style {
        match self {
            Self::Success => Style::new().fg::<css::Green>(),
            Self::Warning => Style::new().fg::<css::Orange>(),
            Self::Error => Style::new().fg::<css::Red>(),
            Self::Muted => Style::new().dimmed(),
            Self::Actioned => Style::new().strikethrough().dimmed(),
        }
    }
}

fn color_enabled() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

fn paint(text: &str, tone: Tone, color: bool) -> String {
    if color {
        text.style(tone.style()).to_string()
    } else {
        text.to_owned()
    }
}

fn narrow(width: Option<u16>) -> bool {
    width.is_some_and(|columns| columns < NARROW_COLUMNS)
}

/// Whether stdout is a terminal too narrow for the full listing layout.
pub fn is_narrow() -> bool {
    narrow(terminal_size::terminal_size().map(|(width, _)| width.0))
}

/// Print a success notification for a completed mutation.
pub fn notify(message: &str) {
    println!("{}", paint(&format!("✅ {message}"), Tone::Success, color_enabled()));
}

/// Print a failure notification to stderr.
pub fn notify_error(message: &str) {
    eprintln!("{}", paint(&format!("❌ {message}"), Tone::Error, color_enabled()));
}

/// Styling for anything that reads as text.
pub trait Colorize {
    /// Positive outcome.
    fn success(&self) -> String;
    /// Needs attention.
    fn warning(&self) -> String;
    /// Failure.
    fn error(&self) -> String;
    /// Secondary detail.
    fn dim(&self) -> String;
    /// An actioned request.
    fn struck(&self) -> String;
}

impl<T: AsRef<str> + ?Sized> Colorize for T {
    fn success(&self) -> String {
        paint(self.as_ref(), Tone::Success, color_enabled())
    }

    fn warning(&self) -> String {
        paint(self.as_ref(), Tone::Warning, color_enabled())
    }

    fn error(&self) -> String {
        paint(self.as_ref(), Tone::Error, color_enabled())
    }

    fn dim(&self) -> String {
        paint(self.as_ref(), Tone::Muted, color_enabled())
    }

    fn struck(&self) -> String {
        paint(self.as_ref(), Tone::Actioned, color_enabled())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(Tone::Success)]
    #[test_case(Tone::Warning)]
    #[test_case(Tone::Error)]
    #[test_case(Tone::Muted)]
    #[test_case(Tone::Actioned)]
    fn plain_output_is_unchanged(tone: Tone) {
        assert_eq!(paint("Heat", tone, false), "Heat");
    }

    #[test]
    fn styled_output_wraps_the_text() {
        let painted = paint("Heat", Tone::Actioned, true);

        assert!(painted.starts_with('\u{1b}'));
        assert!(painted.contains("Heat"));
        assert_ne!(painted, paint("Heat", Tone::Success, true));
    }

    #[test_case(None => false; "unknown width")]
    #[test_case(Some(40) => true; "narrow")]
    #[test_case(Some(60) => false; "threshold")]
    #[test_case(Some(120) => false; "wide")]
    fn narrow_layout_threshold(width: Option<u16>) -> bool {
        narrow(width)
    }
}
