//! Output rendering for streamed chat replies.
//!
//! The session controller never touches the display directly. It drives a
//! [`Renderer`], and reads the viewport back from it to decide whether the
//! view should follow new content. [`PlainTextRenderer`] is the terminal
//! implementation used by the `streamchat` binary.

use std::io::{self, Write};

use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::format::{FormattedLine, FormattedText};
use crate::scroll::ViewportState;

/// ANSI escape code for bold text (used for ordinal lines).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for dim text (used for timestamps and hints).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for blue text (used for the user label).
const ANSI_BLUE: &str = "\x1b[34m";

/// ANSI escape code for green text (used for the assistant label).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Return to column zero and erase the line.
const ANSI_CLEAR_LINE: &str = "\r\x1b[2K";

/// Notice shown in place of a reply the user cancelled.
pub const CANCELLED_NOTICE: &str = "Message interrupted";

/// Display surface driven by the session controller.
///
/// Calls arrive strictly in order from a single task.
pub trait Renderer: Send {
    /// Show the prompt the user just sent.
    fn show_user_message(&mut self, text: &str);

    /// Show a loading indicator where the reply will appear.
    fn show_assistant_placeholder(&mut self);

    /// Replace the in-progress reply with `text`, the formatting of the whole
    /// reply so far. `follow` is true when the view should scroll to keep the
    /// newest content visible.
    fn update_assistant_message(&mut self, text: &FormattedText, follow: bool);

    /// Called once a reply has streamed to completion.
    fn finish_response(&mut self) {}

    /// Show an error in place of, or after, the partial reply.
    fn show_assistant_error(&mut self, message: &str);

    /// Replace the in-progress reply with a neutral cancellation notice.
    fn show_cancelled_notice(&mut self);

    /// Enable or disable prompt input.
    fn set_input_enabled(&mut self, enabled: bool);

    /// Switch the send control between "send" and "cancel".
    fn set_send_control_mode(&mut self, sending: bool);

    /// Current scroll metrics of the message area.
    fn viewport_state(&self) -> ViewportState {
        ViewportState::default()
    }

    /// Returns true, once, if the user scrolled since the last call.
    fn take_user_scroll(&mut self) -> bool {
        false
    }
}

/// Terminal renderer with optional ANSI styling.
///
/// With color enabled the line being streamed is redrawn in place. Without
/// color (for piping), each line is written once it is complete.
pub struct PlainTextRenderer {
    out: Box<dyn Write + Send>,
    use_color: bool,
    offset: UtcOffset,
    committed: usize,
    live_line: bool,
    latest: FormattedText,
    input_enabled: bool,
    sending: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(use_color, io::stdout())
    }

    /// Creates a renderer that writes to `out` instead of stdout.
    pub fn with_writer(use_color: bool, out: impl Write + Send + 'static) -> Self {
        Self {
            out: Box::new(out),
            use_color,
            offset: UtcOffset::UTC,
            committed: 0,
            live_line: false,
            latest: FormattedText::default(),
            input_enabled: true,
            sending: false,
        }
    }

    /// Sets the offset message timestamps are shown in.
    ///
    /// The local offset can only be read reliably while the process is
    /// single-threaded, so callers capture it before starting a runtime.
    pub fn with_offset(mut self, offset: UtcOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Returns true if the prompt should accept input.
    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    /// Returns true while a reply is in flight.
    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// Print an error message outside of any reply.
    pub fn print_error(&mut self, error: &str) {
        self.end_live_line();
        self.flush();
        if self.use_color {
            eprintln!("{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("Error: {error}");
        }
    }

    /// Print an informational message outside of any reply.
    pub fn print_info(&mut self, info: &str) {
        self.end_live_line();
        self.line(info);
        self.flush();
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
    }

    fn raw(&mut self, text: &str) {
        let _ = write!(self.out, "{text}");
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }

    fn header(&self, sender: &str, color: &str) -> String {
        let stamp = clock(OffsetDateTime::now_utc().to_offset(self.offset));
        if self.use_color {
            format!("{color}{sender}{ANSI_RESET} {ANSI_DIM}{stamp}{ANSI_RESET}")
        } else {
            format!("{sender} {stamp}")
        }
    }

    fn styled(&self, line: &FormattedLine) -> String {
        match line {
            FormattedLine::Ordinal { .. } if self.use_color => {
                format!("{ANSI_BOLD}{line}{ANSI_RESET}")
            }
            _ => line.to_string(),
        }
    }

    fn end_live_line(&mut self) {
        if self.live_line {
            self.line("");
            self.live_line = false;
        }
    }

    fn clear_live_line(&mut self) {
        if self.live_line {
            if self.use_color {
                self.raw(ANSI_CLEAR_LINE);
            } else {
                self.line("");
            }
            self.live_line = false;
        }
    }

    fn write_remaining_lines(&mut self) {
        if self.committed == 0 && self.latest.is_empty() {
            // Only the placeholder is showing.
            self.clear_live_line();
            return;
        }
        if self.use_color {
            self.end_live_line();
            return;
        }
        let latest = std::mem::take(&mut self.latest);
        for line in &latest.lines()[self.committed.min(latest.lines().len())..] {
            let styled = self.styled(line);
            self.line(&styled);
        }
        self.committed = latest.lines().len();
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn show_user_message(&mut self, text: &str) {
        self.end_live_line();
        let header = self.header("You", ANSI_BLUE);
        self.line(&header);
        self.line(text);
        self.flush();
    }

    fn show_assistant_placeholder(&mut self) {
        self.end_live_line();
        self.committed = 0;
        self.latest = FormattedText::default();
        let header = self.header("Assistant", ANSI_GREEN);
        self.line(&header);
        if self.use_color {
            self.raw(&format!("{ANSI_DIM}...{ANSI_RESET}"));
            self.live_line = true;
        }
        self.flush();
    }

    fn update_assistant_message(&mut self, text: &FormattedText, _follow: bool) {
        // A terminal always follows; `follow` matters only to scrollable views.
        let lines = text.lines();
        let Some(last) = lines.len().checked_sub(1) else {
            return;
        };
        while self.committed < last {
            let line = self.styled(&lines[self.committed]);
            self.clear_live_line();
            self.line(&line);
            self.committed += 1;
        }
        if self.use_color {
            let line = self.styled(&lines[last]);
            self.raw(&format!("{ANSI_CLEAR_LINE}{line}"));
            self.live_line = true;
        }
        self.latest = text.clone();
        self.flush();
    }

    fn finish_response(&mut self) {
        self.write_remaining_lines();
        self.flush();
    }

    fn show_assistant_error(&mut self, message: &str) {
        self.write_remaining_lines();
        if self.use_color {
            self.line(&format!("{ANSI_RED}Error: {message}{ANSI_RESET}"));
        } else {
            self.line(&format!("Error: {message}"));
        }
        self.flush();
    }

    fn show_cancelled_notice(&mut self) {
        self.clear_live_line();
        self.latest = FormattedText::default();
        if self.use_color {
            self.line(&format!("{ANSI_DIM}[{CANCELLED_NOTICE}]{ANSI_RESET}"));
        } else {
            self.line(&format!("[{CANCELLED_NOTICE}]"));
        }
        self.flush();
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
    }

    fn set_send_control_mode(&mut self, sending: bool) {
        self.sending = sending;
    }
}

fn clock(at: OffsetDateTime) -> String {
    at.format(format_description!("[hour]:[minute]"))
        .unwrap_or_default()
}
