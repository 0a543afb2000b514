use crate::clock::Timestamp;

/// One timestamped vector of channel readings.
///
/// `sequence` is assigned by the poller, starting from 0 at every start, and
/// lets callers notice samples discarded by the buffer's drop-oldest policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub sequence: u64,
    pub host_time: Timestamp,
    pub device_time: Option<u64>,
    pub values: Vec<f64>,
}

impl Sample {
    pub fn new(values: Vec<f64>, host_time: Timestamp) -> Sample {
        Sample {
            sequence: 0,
            host_time,
            device_time: None,
            values,
        }
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }

    pub fn host_time_secs(&self) -> f64 {
        self.host_time as f64 / 1e6
    }
}

/// Counts how many sequence numbers are missing from `samples`, given the
/// sequence number of the last sample seen by a previous read (if any).
pub fn sequence_gaps(previous: Option<u64>, samples: &[Sample]) -> u64 {
    let (missing, _) = samples
        .iter()
        .fold((0, previous), |(missing, previous), sample| {
            let expected = previous.map(|p| p + 1).unwrap_or(sample.sequence);
            (
                missing + sample.sequence.saturating_sub(expected),
                Some(sample.sequence),
            )
        });

    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_sequence(sequence: u64) -> Sample {
        Sample {
            sequence,
            ..Sample::new(vec![0.0], 0)
        }
    }

    #[test]
    fn no_gaps_in_a_contiguous_run() {
        let samples: Vec<_> = (5..10).map(with_sequence).collect();
        assert_eq!(sequence_gaps(None, &samples), 0);
        assert_eq!(sequence_gaps(Some(4), &samples), 0);
    }

    #[test]
    fn gaps_across_and_within_reads() {
        let samples = vec![with_sequence(3), with_sequence(4), with_sequence(7)];
        // 1 and 2 lost before this read, 5 and 6 lost within it
        assert_eq!(sequence_gaps(Some(0), &samples), 4);
    }

    #[test]
    fn empty_read_has_no_gaps() {
        assert_eq!(sequence_gaps(Some(10), &[]), 0);
    }
}
