//! Reads counter values back out of rendered exposition text.
//!
//! Compiled for tests only; the integration tests include this file too.

use std::collections::HashMap;

type Labels = Vec<(String, String)>;

/// Counter values parsed from Prometheus text.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    samples: HashMap<String, Vec<(Labels, u64)>>,
}

impl MetricsSnapshot {
    /// Parse Prometheus text. Comments, malformed lines and non-integer
    /// samples are skipped.
    pub fn parse(text: &str) -> Self {
        let mut samples: HashMap<String, Vec<_>> = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((name, labels, value)) = parse_sample(line) {
                samples.entry(name).or_default().push((labels, value));
            }
        }
        Self { samples }
    }

    /// Value of the series with exactly these labels, in any order; 0 if absent.
    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let Some(series) = self.samples.get(name) else {
            return 0;
        };
        series
            .iter()
            .find(|(have, _)| {
                have.len() == labels.len()
                    && labels
                        .iter()
                        .all(|(k, v)| have.iter().any(|(hk, hv)| hk == k && hv == v))
            })
            .map(|(_, value)| *value)
            .unwrap_or(0)
    }

    /// Number of labelled series recorded under `name`.
    pub fn series_count(&self, name: &str) -> usize {
        self.samples.get(name).map_or(0, Vec::len)
    }
}

fn parse_sample(line: &str) -> Option<(String, Labels, u64)> {
    let (series, value) = line.rsplit_once(' ')?;
    let value = value.parse::<u64>().ok()?;

    match series.split_once('{') {
        None => Some((series.to_string(), Vec::new(), value)),
        Some((name, rest)) => {
            let labels = parse_labels(rest.strip_suffix('}')?)?;
            Some((name.to_string(), labels, value))
        }
    }
}

fn parse_labels(mut rest: &str) -> Option<Labels> {
    let mut labels = Vec::new();
    while !rest.is_empty() {
        let (key, after) = rest.split_once("=\"")?;
        let mut value = String::new();
        let mut chars = after.char_indices();
        let mut end = None;
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next()?.1 {
                    'n' => value.push('\n'),
                    other => value.push(other),
                },
                '"' => {
                    end = Some(i);
                    break;
                }
                other => value.push(other),
            }
        }
        labels.push((key.trim_start_matches(',').to_string(), value));
        rest = &after[end? + 1..];
    }
    Some(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_escaped_labels() {
        let snapshot = MetricsSnapshot::parse(
            "# TYPE x counter\nx{path=\"/a\\\"b\",code=\"200\"} 3\ny 7\nbroken line here\n",
        );
        assert_eq!(snapshot.counter("x", &[("code", "200"), ("path", "/a\"b")]), 3);
        assert_eq!(snapshot.counter("y", &[]), 7);
        assert_eq!(snapshot.counter("z", &[]), 0);
    }

    #[test]
    fn test_non_integer_samples_are_skipped() {
        let snapshot = MetricsSnapshot::parse("a 1.9\nb{k=\"v\"} 2.5e3\nc NaN\nd 4\n");
        assert_eq!(snapshot.series_count("a"), 0);
        assert_eq!(snapshot.series_count("b"), 0);
        assert_eq!(snapshot.series_count("c"), 0);
        assert_eq!(snapshot.counter("d", &[]), 4);
    }
}
