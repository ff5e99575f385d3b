use crate::{printer_client::ConsolePage, session::AUTH_FAILURE_MARKER};
use std::time::Duration;

/// Name of the implicit first step every run starts with.
pub const LOGIN_STEP: &str = "login";

/// Total number of step results a completed run reports (login included).
pub const TOTAL_STEP_COUNT: usize = PIPELINE.len() + 1;

/// Markers the console embeds in a 2xx body when it silently dropped the
/// session and bounced the request back to the login form.
const SESSION_LOST_MARKERS: &[&str] = &[AUTH_FAILURE_MARKER];

/// One console form submission.
///
/// `fields` is the exact payload the firmware expects: positional numeric
/// keys, magic values, and order all matter. These pairs were captured from a
/// live console session and must be replayed byte for byte.
#[derive(Clone, Copy, Debug)]
pub struct ConfigStep {
    pub name: &'static str,
    pub page: ConsolePage,
    pub fields: &'static [(&'static str, &'static str)],
    /// How long the printer needs to apply this change before it will accept
    /// the next request. Submitting too early corrupts the pending change.
    pub settle: Duration,
    pub failure_markers: &'static [&'static str],
}

impl ConfigStep {
    pub fn form_fields(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }
}

/// The fixed configuration sequence, replayed in order after login.
///
/// Field meaning, as far as the firmware documents it: media-setup selects
/// mark-sensing continuous media at 832 dots width and 3048 dots length;
/// general-setup sets darkness 26.0 and tear-off mode; the later general-setup
/// submission flips field 6 to cutter mode. The feed and test-print pages use
/// a single positional field as their submit button.
pub const PIPELINE: [ConfigStep; 6] = [
    ConfigStep {
        name: "media-setup",
        page: ConsolePage::MediaSetup,
        fields: &[
            ("0", "1"),
            ("1", "1"),
            ("2", "1"),
            ("3", "0"),
            ("4", "832"),
            ("5", "3048"),
            ("submit", "Submit Changes"),
        ],
        settle: Duration::ZERO,
        failure_markers: SESSION_LOST_MARKERS,
    },
    ConfigStep {
        name: "general-setup",
        page: ConsolePage::GeneralSetup,
        fields: &[
            ("2", "0"),
            ("4", "26.0"),
            ("6", "4"),
            ("5", "0"),
            ("7", "2"),
            ("8", "0"),
            ("submit", "Submit Changes"),
        ],
        settle: Duration::from_secs(1),
        failure_markers: SESSION_LOST_MARKERS,
    },
    ConfigStep {
        name: "feed",
        page: ConsolePage::FeedControl,
        fields: &[("1", "submit")],
        settle: Duration::from_secs(2),
        failure_markers: SESSION_LOST_MARKERS,
    },
    ConfigStep {
        name: "cutter-mode",
        page: ConsolePage::GeneralSetup,
        fields: &[("6", "1"), ("submit", "Submit Changes")],
        settle: Duration::from_secs(2),
        failure_markers: SESSION_LOST_MARKERS,
    },
    ConfigStep {
        name: "test-print",
        page: ConsolePage::TestPrint,
        fields: &[("4", "submit")],
        settle: Duration::ZERO,
        failure_markers: SESSION_LOST_MARKERS,
    },
    ConfigStep {
        name: "save",
        page: ConsolePage::Settings,
        fields: &[("0", "Save Current Configuration")],
        settle: Duration::ZERO,
        failure_markers: SESSION_LOST_MARKERS,
    },
];
