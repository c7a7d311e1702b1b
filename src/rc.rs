//! RC command link
//!
//! Vehicles receive control vectors as short ASCII lines over a serial link:
//!
//! ```text
//! F085,R-12,H000\n
//! ```
//!
//! - `F`: forward (+) / reverse (-), integer in [-100, 100]
//! - `R`: right (+) / left (-), integer in [-100, 100]
//! - `H`: height, integer in [0, 100]
//!
//! [`RcReceiver`] models the vehicle side, including its command timeout.

use crate::error::{PipelineError, SubscriberError};
use crate::subscriber::Subscriber;
use crate::types::{ControlVector, Snapshot};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Receiver stops driving after this long without a command (milliseconds)
pub const DEFAULT_COMMAND_TIMEOUT_MS: i64 = 1000;

const DRIVE_RANGE: (i32, i32) = (-100, 100);
const HEIGHT_RANGE: (i32, i32) = (0, 100);

/// Integer command as sent over the link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RcCommand {
    pub forward: i32,
    pub right: i32,
    pub height: i32,
}

/// Values present in one received line; absent codes keep their previous value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RcUpdate {
    pub forward: Option<i32>,
    pub right: Option<i32>,
    pub height: Option<i32>,
}

impl RcUpdate {
    pub fn apply_to(&self, previous: RcCommand) -> RcCommand {
        RcCommand {
            forward: self.forward.unwrap_or(previous.forward),
            right: self.right.unwrap_or(previous.right),
            height: self.height.unwrap_or(previous.height),
        }
    }
}

impl RcCommand {
    pub fn new(forward: i32, right: i32, height: i32) -> Self {
        Self {
            forward: forward.clamp(DRIVE_RANGE.0, DRIVE_RANGE.1),
            right: right.clamp(DRIVE_RANGE.0, DRIVE_RANGE.1),
            height: height.clamp(HEIGHT_RANGE.0, HEIGHT_RANGE.1),
        }
    }

    /// Scale a control vector to link units
    pub fn from_vector(vector: &ControlVector) -> Self {
        let scale = |v: f64| (v * 100.0).round() as i32;
        Self::new(
            scale(vector.forward()),
            scale(vector.lateral()),
            scale(vector.vertical()),
        )
    }

    pub fn to_vector(&self) -> ControlVector {
        ControlVector::new(
            self.forward as f64 / 100.0,
            self.right as f64 / 100.0,
            self.height as f64 / 100.0,
        )
    }

    /// Render as a link line, without the trailing newline
    pub fn encode(&self) -> String {
        format!("F{:03},R{:03},H{:03}", self.forward, self.right, self.height)
    }

    /// Parse a full line, treating absent codes as zero
    pub fn parse(line: &str) -> Result<Self, PipelineError> {
        Ok(Self::parse_update(line)?.apply_to(RcCommand::default()))
    }

    /// Parse the codes present in a line.
    ///
    /// Codes may come in any order; unknown codes are skipped and values are
    /// constrained to their ranges. A line without any known code is an error.
    pub fn parse_update(line: &str) -> Result<RcUpdate, PipelineError> {
        let mut update = RcUpdate::default();
        let mut recognised = false;

        for field in line.trim().split(',') {
            let field = field.trim();
            let mut chars = field.chars();
            let Some(code) = chars.next() else {
                continue;
            };
            let raw = chars.as_str().trim();

            let slot = match code {
                'F' => (&mut update.forward, DRIVE_RANGE),
                'R' => (&mut update.right, DRIVE_RANGE),
                'H' => (&mut update.height, HEIGHT_RANGE),
                _ => continue,
            };

            let value: i64 = raw.parse().map_err(|_| {
                PipelineError::CommandParseError(format!("bad value for {code}: {raw:?}"))
            })?;
            let (lo, hi) = slot.1;
            *slot.0 = Some(value.clamp(lo as i64, hi as i64) as i32);
            recognised = true;
        }

        if !recognised {
            return Err(PipelineError::CommandParseError(format!(
                "no F/R/H values in {line:?}"
            )));
        }
        Ok(update)
    }
}

/// Vehicle-side command state
#[derive(Debug, Clone)]
pub struct RcReceiver {
    current: RcCommand,
    last_command_ms: i64,
    timeout_ms: i64,
}

impl RcReceiver {
    pub fn new(now_ms: i64) -> Self {
        Self::with_timeout(now_ms, DEFAULT_COMMAND_TIMEOUT_MS)
    }

    pub fn with_timeout(now_ms: i64, timeout_ms: i64) -> Self {
        Self {
            current: RcCommand::default(),
            last_command_ms: now_ms,
            timeout_ms,
        }
    }

    pub fn current(&self) -> RcCommand {
        self.current
    }

    /// Apply one received line.
    ///
    /// Returns the acknowledgement (`ACK:f,r,h`) when the command changed, or
    /// `None` when the line repeated the current state.
    pub fn receive(&mut self, line: &str, now_ms: i64) -> Result<Option<String>, PipelineError> {
        let update = RcCommand::parse_update(line)?;
        self.last_command_ms = now_ms;

        let next = update.apply_to(self.current);
        if next == self.current {
            return Ok(None);
        }
        self.current = next;
        Ok(Some(format!(
            "ACK:{},{},{}",
            next.forward, next.right, next.height
        )))
    }

    /// Stop driving if the link has gone quiet.
    ///
    /// Zeroes forward and right but holds height so an airborne vehicle can
    /// descend under control. Returns true when it stopped the vehicle.
    ///
    /// The on-vehicle firmware also fires when only height is nonzero, zeroing
    /// nothing but reporting a stop. Here a hover with no drive command is not a
    /// stop and returns false.
    pub fn check_timeout(&mut self, now_ms: i64) -> bool {
        if now_ms - self.last_command_ms <= self.timeout_ms {
            return false;
        }
        if self.current.forward == 0 && self.current.right == 0 {
            return false;
        }
        self.current.forward = 0;
        self.current.right = 0;
        true
    }
}

/// Subscriber that writes one RC line per snapshot
pub struct RcLinkSubscriber<W> {
    writer: W,
}

impl<W: Write + Send> RcLinkSubscriber<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Subscriber for RcLinkSubscriber<W> {
    fn on_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), SubscriberError> {
        let line = RcCommand::from_vector(&snapshot.vector).encode();
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::pipeline::simulate_cycle;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_encode_formats() {
        assert_eq!(RcCommand::new(100, 50, 75).encode(), "F100,R050,H075");
        assert_eq!(RcCommand::new(-85, -5, 0).encode(), "F-85,R-05,H000");
        assert_eq!(RcCommand::new(-100, 0, 100).encode(), "F-100,R000,H100");
    }

    #[test]
    fn test_from_vector_scales_and_rounds() {
        let cmd = RcCommand::from_vector(&ControlVector::new(0.856, -0.704, 0.05));
        assert_eq!(cmd, RcCommand::new(86, -70, 5));
    }

    #[test]
    fn test_parse_any_order_and_constrains() {
        let cmd = RcCommand::parse("H150,F-250,R 42").unwrap();
        assert_eq!(cmd, RcCommand::new(-100, 42, 100));

        let cmd = RcCommand::parse("H-10").unwrap();
        assert_eq!(cmd.height, 0);
    }

    #[test]
    fn test_parse_skips_unknown_codes() {
        let cmd = RcCommand::parse("X9,F010").unwrap();
        assert_eq!(cmd, RcCommand::new(10, 0, 0));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            RcCommand::parse(""),
            Err(PipelineError::CommandParseError(_))
        ));
        assert!(RcCommand::parse("X1,Y2").is_err());
        assert!(RcCommand::parse("Fabc").is_err());
    }

    #[test]
    fn test_encoded_line_parses_back() {
        let cmd = RcCommand::new(-85, 12, 99);
        assert_eq!(RcCommand::parse(&cmd.encode()).unwrap(), cmd);
    }

    #[test]
    fn test_receiver_acknowledges_changes_only() {
        let mut rx = RcReceiver::new(0);
        assert_eq!(
            rx.receive("F100,R050,H075", 10).unwrap(),
            Some("ACK:100,50,75".to_string())
        );
        assert_eq!(rx.receive("F100,R050,H075", 20).unwrap(), None);

        // Partial update keeps the other values
        assert_eq!(
            rx.receive("R-20", 30).unwrap(),
            Some("ACK:100,-20,75".to_string())
        );
    }

    #[test]
    fn test_receiver_timeout_holds_height() {
        let mut rx = RcReceiver::new(0);
        rx.receive("F080,R-30,H060", 100).unwrap();

        assert!(!rx.check_timeout(1100));
        assert!(rx.check_timeout(1101));
        assert_eq!(rx.current(), RcCommand::new(0, 0, 60));

        // Already stopped; nothing more to do
        assert!(!rx.check_timeout(5000));
    }

    #[test]
    fn test_receiver_timeout_ignores_hover_only() {
        let mut rx = RcReceiver::new(0);
        rx.receive("H040", 10).unwrap();

        assert!(!rx.check_timeout(2000));
        assert_eq!(rx.current(), RcCommand::new(0, 0, 40));
    }

    #[test]
    fn test_link_subscriber_writes_lines() {
        let mut rng = StdRng::seed_from_u64(8);
        let snapshot = simulate_cycle(&PipelineConfig::default(), 0, &mut rng).unwrap();

        let mut sub = RcLinkSubscriber::new(Vec::new());
        sub.on_snapshot(&snapshot).unwrap();
        sub.on_snapshot(&snapshot).unwrap();

        let out = String::from_utf8(sub.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            RcCommand::parse(lines[0]).unwrap(),
            RcCommand::from_vector(&snapshot.vector)
        );
    }
}
