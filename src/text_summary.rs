use crate::model::{format_distance, Run};

/// Render the run history as fixed-width text lines, newest first.
pub fn history_lines(runs: &[Run]) -> Vec<String> {
    let mut lines = Vec::with_capacity(runs.len() + 2);
    lines.push(format!(
        "{:>5}  {:<10}  {:>8}  {:>8}  {:>10}",
        "id", "date", "duration", "shuttles", "distance"
    ));
    lines.push("-".repeat(49));
    for r in runs {
        lines.push(format!(
            "{:>5}  {:<10}  {:>8}  {:>8}  {:>10}",
            r.id,
            r.date,
            r.duration,
            r.shuttles,
            format_distance(r.distance_in_meters)
        ));
    }
    if runs.is_empty() {
        lines.push("(no runs recorded yet)".into());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_has_placeholder() {
        let lines = history_lines(&[]);
        assert!(lines.iter().any(|l| l.contains("no runs recorded yet")));
    }

    #[test]
    fn rows_preserve_store_order() {
        let runs = vec![
            Run {
                id: 2,
                date: "02/08/2026".into(),
                duration: "01:30:00".into(),
                shuttles: 12,
                distance_in_meters: 1234.0,
            },
            Run {
                id: 1,
                date: "01/08/2026".into(),
                duration: "00:45:10".into(),
                shuttles: 4,
                distance_in_meters: 0.0,
            },
        ];
        let lines = history_lines(&runs);
        let first_row = lines.iter().position(|l| l.contains("01:30:00")).unwrap();
        let second_row = lines.iter().position(|l| l.contains("00:45:10")).unwrap();
        assert!(first_row < second_row);
        assert!(lines[first_row].contains("1.23 km"));
        assert!(lines[second_row].contains("0.0 m"));
    }
}
