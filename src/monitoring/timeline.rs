//! Provisioning Timeline
//!
//! Records when each provisioning phase starts, completes or fails, and
//! renders a timing report for the build log.

use std::time::{Duration, Instant};

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Started,
    Completed,
    Failed,
}

/// A single event in the timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    pub phase: String,
    pub event_type: EventType,
    pub timestamp: Instant,
}

/// Outcome and duration of one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTiming {
    pub phase: String,
    pub duration: Duration,
    pub failed: bool,
}

/// Ordered record of phase events.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    start_time: Instant,
}

impl ExecutionTimeline {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Records an event for a phase.
    pub fn add_event(&mut self, phase: impl Into<String>, event_type: EventType) {
        self.events.push(TimelineEvent {
            phase: phase.into(),
            event_type,
            timestamp: Instant::now(),
        });
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Time since the timeline was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Finished phases in the order they started.
    ///
    /// A phase that started but never finished is left out.
    pub fn phases(&self) -> Vec<PhaseTiming> {
        let mut timings = Vec::new();

        for (i, start) in self.events.iter().enumerate() {
            if start.event_type != EventType::Started {
                continue;
            }

            let end = self.events[i + 1..]
                .iter()
                .find(|e| e.phase == start.phase && e.event_type != EventType::Started);

            if let Some(end) = end {
                timings.push(PhaseTiming {
                    phase: start.phase.clone(),
                    duration: end.timestamp.duration_since(start.timestamp),
                    failed: end.event_type == EventType::Failed,
                });
            }
        }

        timings
    }

    /// Renders one line per finished phase plus the total.
    pub fn report(&self) -> String {
        let mut output = String::from("Provisioning timeline:\n");

        for timing in self.phases() {
            output.push_str(&format!(
                "  {:14} {:>8} ms{}\n",
                truncate(&timing.phase, 14),
                timing.duration.as_millis(),
                if timing.failed { "  FAILED" } else { "" }
            ));
        }

        output.push_str(&format!("  {:14} {:>8} ms\n", "total", self.elapsed().as_millis()));
        output
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
