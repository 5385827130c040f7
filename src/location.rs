//! Location sampling.
//!
//! Wraps a gpsd daemon as the fix source and exposes it as a stream the
//! session subscribes to while running. Dropping the stream releases the
//! underlying connection.

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// A single reported geographic position sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub lat: f64,
    pub lon: f64,
}

/// Where position fixes come from.
#[derive(Debug, Clone)]
pub enum LocationSource {
    /// gpsd daemon address, e.g. "127.0.0.1:2947".
    Gpsd(String),
    /// No fixes at all; the timer and shuttle counter still work.
    Disabled,
    /// Hands a fresh fix sender to the test for every subscription.
    #[cfg(test)]
    Channel(mpsc::UnboundedSender<mpsc::UnboundedSender<Fix>>),
}

/// Command that switches gpsd into streaming JSON mode.
const WATCH_COMMAND: &str = "?WATCH={\"enable\":true,\"json\":true};\n";

/// A live subscription to position fixes.
///
/// Dropping the stream aborts the reader task, which closes the gpsd
/// connection; gpsd stops reporting once the watcher disconnects.
pub struct FixStream {
    rx: mpsc::UnboundedReceiver<Fix>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl FixStream {
    /// Wait for the next fix. Pends forever once the source has ended, so
    /// this is safe to hold in a select loop alongside other branches.
    pub async fn next_fix(&mut self) -> Fix {
        loop {
            match self.rx.recv().await {
                Some(fix) => return fix,
                None => futures::future::pending::<()>().await,
            }
        }
    }
}

impl Drop for FixStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl LocationSource {
    /// Open a new subscription. Called on every entry into the running state.
    pub async fn subscribe(&self) -> Result<FixStream> {
        match self {
            LocationSource::Gpsd(addr) => subscribe_gpsd(addr).await,
            LocationSource::Disabled => {
                // Receiver with no sender: next_fix() pends forever.
                let (_tx, rx) = mpsc::unbounded_channel();
                Ok(FixStream { rx, task: None })
            }
            #[cfg(test)]
            LocationSource::Channel(out) => {
                let (tx, rx) = mpsc::unbounded_channel();
                out.send(tx).context("test harness dropped its end")?;
                Ok(FixStream { rx, task: None })
            }
        }
    }
}

async fn subscribe_gpsd(addr: &str) -> Result<FixStream> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("connect to gpsd at {addr}"))?;
    let (read_half, mut write_half) = stream.into_split();
    write_half
        .write_all(WATCH_COMMAND.as_bytes())
        .await
        .context("send WATCH command to gpsd")?;

    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        // Keep the write half alive so gpsd keeps the session open.
        let _write_half = write_half;
        let mut lines = BufReader::new(read_half).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(fix) = parse_report(&line) {
                if tx.send(fix).is_err() {
                    break;
                }
            }
        }
    });

    Ok(FixStream {
        rx,
        task: Some(task),
    })
}

/// gpsd time-position-velocity report; only the fields we care about.
#[derive(Debug, Deserialize)]
struct TpvReport {
    class: String,
    mode: Option<i64>,
    lat: Option<f64>,
    lon: Option<f64>,
}

/// Parse one line of gpsd JSON into a fix.
///
/// Non-TPV classes (VERSION, WATCH, SKY, ...) and TPV reports without a 2D
/// position are dropped silently; "no fix yet" is not an error.
fn parse_report(line: &str) -> Option<Fix> {
    let report: TpvReport = serde_json::from_str(line).ok()?;
    if report.class != "TPV" || report.mode? < 2 {
        return None;
    }
    Some(Fix {
        lat: report.lat?,
        lon: report.lon?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_report_accepts_2d_tpv() {
        let line = r#"{"class":"TPV","device":"/dev/ttyACM0","mode":3,"lat":59.3293,"lon":18.0686,"alt":12.0}"#;
        assert_eq!(
            parse_report(line),
            Some(Fix {
                lat: 59.3293,
                lon: 18.0686
            })
        );
    }

    #[test]
    fn parse_report_drops_no_fix_mode() {
        let line = r#"{"class":"TPV","device":"/dev/ttyACM0","mode":1}"#;
        assert_eq!(parse_report(line), None);
    }

    #[test]
    fn parse_report_drops_missing_position() {
        let line = r#"{"class":"TPV","mode":2,"lat":59.3293}"#;
        assert_eq!(parse_report(line), None);
    }

    #[test]
    fn parse_report_drops_other_classes() {
        let line = r#"{"class":"SKY","satellites":[]}"#;
        assert_eq!(parse_report(line), None);
        assert_eq!(parse_report("not json"), None);
    }

    #[tokio::test]
    async fn disabled_source_subscribes_but_never_yields() {
        let mut stream = LocationSource::Disabled.subscribe().await.unwrap();
        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            stream.next_fix(),
        )
        .await;
        assert!(waited.is_err(), "Disabled source must not produce fixes");
    }
}
