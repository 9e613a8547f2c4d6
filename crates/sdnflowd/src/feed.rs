//! Newline-delimited JSON event feed.
//!
//! One [`ControllerEvent`] per line, internally tagged by `"event"`:
//!
//! ```text
//! {"event":"switch_join","dpid":1,"ports":[1,2]}
//! {"event":"link_up","src":1,"dst":2,"src_port":2,"dst_port":1}
//! {"event":"frame_arrived","dpid":1,"in_port":1,"src":"00:00:00:00:00:0a","dst":"00:00:00:00:00:0b"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use crate::error::{DaemonError, Result};
use sdnflow_core::ControllerEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Parses one feed line. `Ok(None)` for lines carrying no event.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<ControllerEvent>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|source| DaemonError::EventParse {
            line: line_no,
            source,
        })
}

/// Counters for one pass over a feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub lines: usize,
    pub events: usize,
    pub malformed: usize,
}

/// Reads `reader` to the end and forwards every event to `tx`.
///
/// Malformed lines are logged and skipped. Stops early if the receiving
/// side went away.
#[instrument(skip_all)]
pub async fn pump<R>(reader: R, tx: mpsc::Sender<ControllerEvent>) -> Result<FeedStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = FeedStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        stats.lines += 1;
        match parse_line(stats.lines, &line) {
            Ok(Some(event)) => {
                debug!(line = stats.lines, event = event.kind(), "event read");
                if tx.send(event).await.is_err() {
                    debug!("event loop closed, stopping feed");
                    break;
                }
                stats.events += 1;
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "skipping malformed event");
                stats.malformed += 1;
            }
        }
    }

    info!(
        lines = stats.lines,
        events = stats.events,
        malformed = stats.malformed,
        "event feed finished"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sdnflow_core::{DatapathId, PortNo};

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        assert!(parse_line(1, "").unwrap().is_none());
        assert!(parse_line(2, "   ").unwrap().is_none());
        assert!(parse_line(3, "# two switch lab").unwrap().is_none());
    }

    #[test]
    fn test_parse_switch_join() {
        let event = parse_line(1, r#"{"event":"switch_join","dpid":1,"ports":[1,2]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            ControllerEvent::SwitchJoin {
                dpid: DatapathId::new(1),
                ports: vec![PortNo::new(1), PortNo::new(2)],
            }
        );
    }

    #[test]
    fn test_parse_error_carries_line() {
        let err = parse_line(7, r#"{"event":"warp_drive"}"#).unwrap_err();
        assert!(matches!(err, DaemonError::EventParse { line: 7, .. }));
    }

    #[tokio::test]
    async fn test_pump_forwards_events() {
        let input = concat!(
            "# lab\n",
            "{\"event\":\"switch_join\",\"dpid\":1}\n",
            "\n",
            "not json\n",
            "{\"event\":\"switch_leave\",\"dpid\":1}\n",
        );
        let (tx, mut rx) = mpsc::channel(8);
        let stats = pump(input.as_bytes(), tx).await.unwrap();

        assert_eq!(
            stats,
            FeedStats {
                lines: 5,
                events: 2,
                malformed: 1,
            }
        );
        assert_eq!(rx.recv().await.unwrap().kind(), "switch_join");
        assert_eq!(rx.recv().await.unwrap().kind(), "switch_leave");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_pump_stops_when_receiver_dropped() {
        let input = "{\"event\":\"switch_join\",\"dpid\":1}\n{\"event\":\"switch_join\",\"dpid\":2}\n";
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let stats = pump(input.as_bytes(), tx).await.unwrap();
        assert_eq!(stats.events, 0);
    }
}
