use serde::{Deserialize, Serialize};

/// The body side an event or gait metric refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// The context string used for this side in capture files.
    pub fn context(&self) -> &'static str {
        match self {
            Side::Left => "Left",
            Side::Right => "Right",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// When an event occurred, as recorded in the capture file.
///
/// The C3D event specification stores either a frame number or a time in
/// seconds; storing exactly one of the two here makes the "one or the other"
/// rule unrepresentable to break.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EventTiming {
    Frame(u32),
    Time(f64),
}

/// A labeled timing event within a trial, e.g. "Foot Strike" / "Left".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub label: String,
    /// The side or context the event belongs to ("Left", "Right", "General").
    pub context: String,
    pub timing: EventTiming,
    pub description: Option<String>,
}

impl Event {
    pub fn from_time(label: impl Into<String>, context: impl Into<String>, time: f64) -> Self {
        Self {
            label: label.into(),
            context: context.into(),
            timing: EventTiming::Time(time),
            description: None,
        }
    }

    pub fn from_frame(label: impl Into<String>, context: impl Into<String>, frame: u32) -> Self {
        Self {
            label: label.into(),
            context: context.into(),
            timing: EventTiming::Frame(frame),
            description: None,
        }
    }

    /// The event's frame number, deriving it from the time when the file
    /// stored a time instead.
    pub fn frame(&self, point_rate: f64) -> u32 {
        match self.timing {
            EventTiming::Frame(frame) => frame,
            EventTiming::Time(time) => (time * point_rate).max(0.0) as u32,
        }
    }

    /// The event's time in seconds, deriving it from the frame number when
    /// the file stored a frame instead.
    pub fn time(&self, point_rate: f64) -> f64 {
        match self.timing {
            EventTiming::Time(time) => time,
            EventTiming::Frame(frame) => frame as f64 / point_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_and_time_convert_both_ways() {
        let by_time = Event::from_time("Foot Strike", "Left", 1.5);
        assert_eq!(by_time.frame(100.0), 150);
        assert_eq!(by_time.time(100.0), 1.5);

        let by_frame = Event::from_frame("Foot Off", "Right", 240);
        assert_eq!(by_frame.frame(120.0), 240);
        assert!((by_frame.time(120.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn sides_know_their_context_strings() {
        assert_eq!(Side::Left.context(), "Left");
        assert_eq!(Side::Right.opposite(), Side::Left);
    }
}
