use super::stream::{CaptureResult, CaptureStream, ReadOutcome};

/// Upper bound on read attempts per tick. Would-block always ends the loop
/// earlier; the cap only matters for a stream that keeps overrunning.
pub const MAX_READ_ATTEMPTS: usize = 8;

/// What a single [`CaptureBuffer::read_non_blocking`] call achieved.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadReport {
    pub frames: usize,
    pub overruns: u32,
    pub completed: bool,
}

// A ready buffer must be taken before further samples are written.
pub struct CaptureBuffer<S> {
    stream: S,
    raw: Vec<i16>,
    last_complete: Vec<i16>,
    fill: usize,
    ready: bool,
    reprepare: bool,
}

impl<S: CaptureStream> CaptureBuffer<S> {
    pub fn new(stream: S, size: usize) -> Self {
        if stream.is_blocking() {
            log::warn!("Capture stream only supports blocking reads; frames may stall");
        }
        Self {
            stream,
            raw: vec![0; size],
            last_complete: vec![0; size],
            fill: 0,
            ready: false,
            reprepare: false,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.stream.sample_rate()
    }

    /// Most recently completed buffer (zeros before the first one).
    pub fn last_complete(&self) -> &[i16] {
        &self.last_complete
    }

    /// Force a stream reset before the next read, discarding the partially
    /// filled buffer. Used when capture resumes after a pause.
    pub fn request_reset(&mut self) {
        self.reprepare = true;
    }

    /// Consume the ready flag, yielding the completed buffer.
    pub fn take_ready(&mut self) -> Option<&[i16]> {
        if !self.ready {
            return None;
        }
        self.ready = false;
        Some(&self.last_complete)
    }

    /// Pull whatever the stream has without blocking, up to the end of the
    /// current buffer.
    pub fn read_non_blocking(&mut self) -> CaptureResult<ReadReport> {
        let mut report = ReadReport::default();
        if self.ready {
            return Ok(report);
        }

        if self.reprepare {
            self.stream.reset()?;
            self.reprepare = false;
            self.fill = 0;
        }

        for _ in 0..MAX_READ_ATTEMPTS {
            let remaining = &mut self.raw[self.fill..];
            match self.stream.read(remaining)? {
                ReadOutcome::WouldBlock | ReadOutcome::Frames(0) => break,
                ReadOutcome::Frames(n) => {
                    let n = n.min(remaining.len());
                    self.fill += n;
                    report.frames += n;
                    if self.fill == self.raw.len() {
                        self.last_complete.copy_from_slice(&self.raw);
                        self.ready = true;
                        self.fill = 0;
                        report.completed = true;
                        break;
                    }
                }
                ReadOutcome::Overrun => {
                    log::warn!("Capture overrun, resetting stream");
                    self.stream.reset()?;
                    report.overruns += 1;
                }
            }
        }

        if report.frames > 0 && !report.completed {
            log::trace!("Short read: {} frames, {}/{}", report.frames, self.fill, self.raw.len());
        }
        Ok(report)
    }

    pub fn close(&mut self) -> CaptureResult<()> {
        self.stream.close()
    }
}

#[cfg(test)]
impl<S> CaptureBuffer<S> {
    pub(crate) fn stream(&self) -> &S {
        &self.stream
    }

    pub(crate) fn fill_count(&self) -> usize {
        self.fill
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.ready
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::stream::CaptureError;
    use std::collections::VecDeque;

    pub(crate) enum Step {
        Data(Vec<i16>),
        WouldBlock,
        Overrun,
        Fail,
    }

    /// Replays a fixed script of read results.
    #[derive(Default)]
    pub(crate) struct ScriptedStream {
        pub steps: VecDeque<Step>,
        pub resets: usize,
        pub closed: bool,
    }

    impl ScriptedStream {
        pub fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
                ..Default::default()
            }
        }
    }

    impl CaptureStream for ScriptedStream {
        fn read(&mut self, buf: &mut [i16]) -> CaptureResult<ReadOutcome> {
            match self.steps.pop_front() {
                None | Some(Step::WouldBlock) => Ok(ReadOutcome::WouldBlock),
                Some(Step::Overrun) => Ok(ReadOutcome::Overrun),
                Some(Step::Fail) => Err(CaptureError::StreamError("device gone".into())),
                Some(Step::Data(mut data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        self.steps.push_front(Step::Data(data.split_off(n)));
                    }
                    Ok(ReadOutcome::Frames(n))
                }
            }
        }

        fn reset(&mut self) -> CaptureResult<()> {
            self.resets += 1;
            Ok(())
        }

        fn close(&mut self) -> CaptureResult<()> {
            self.closed = true;
            Ok(())
        }

        fn sample_rate(&self) -> u32 {
            44_100
        }
    }

    fn ramp(start: i16, len: usize) -> Vec<i16> {
        (0..len).map(|i| start + i as i16).collect()
    }

    #[test]
    fn test_partial_reads_accumulate() {
        let stream = ScriptedStream::new(vec![
            Step::Data(ramp(0, 3)),
            Step::WouldBlock,
            Step::Data(ramp(3, 2)),
            Step::WouldBlock,
        ]);
        let mut buffer = CaptureBuffer::new(stream, 8);

        let report = buffer.read_non_blocking().unwrap();
        assert_eq!(report.frames, 3);
        assert_eq!(buffer.fill_count(), 3);
        assert!(!buffer.is_ready());

        buffer.read_non_blocking().unwrap();
        assert_eq!(buffer.fill_count(), 5);
        assert!(!buffer.is_ready());
    }

    #[test]
    fn test_fill_count_is_total_mod_size() {
        let chunks = [5usize, 7, 4, 9, 3, 4];
        let size = 16;
        let mut steps = Vec::new();
        for &c in &chunks {
            steps.push(Step::Data(vec![1; c]));
            steps.push(Step::WouldBlock);
        }
        let mut buffer = CaptureBuffer::new(ScriptedStream::new(steps), size);

        let mut total = 0;
        for &c in &chunks {
            buffer.read_non_blocking().unwrap();
            total += c;
            assert_eq!(buffer.fill_count(), total % size);
            assert_eq!(buffer.is_ready(), total % size == 0);
            buffer.take_ready();
        }
        assert_eq!(total, 32);
    }

    #[test]
    fn test_ready_snapshot_and_consume() {
        let stream = ScriptedStream::new(vec![Step::Data(ramp(10, 4)), Step::Data(ramp(20, 4))]);
        let mut buffer = CaptureBuffer::new(stream, 4);

        let report = buffer.read_non_blocking().unwrap();
        assert!(report.completed);
        assert!(buffer.is_ready());
        assert_eq!(buffer.fill_count(), 0);

        // Unconsumed ready buffer blocks further writes
        let report = buffer.read_non_blocking().unwrap();
        assert_eq!(report.frames, 0);

        assert_eq!(buffer.take_ready().unwrap(), &[10, 11, 12, 13]);
        assert!(buffer.take_ready().is_none());

        buffer.read_non_blocking().unwrap();
        assert_eq!(buffer.take_ready().unwrap(), &[20, 21, 22, 23]);
        assert_eq!(buffer.last_complete(), &[20, 21, 22, 23]);
    }

    #[test]
    fn test_read_stops_at_buffer_end() {
        let stream = ScriptedStream::new(vec![Step::Data(ramp(0, 6))]);
        let mut buffer = CaptureBuffer::new(stream, 4);

        let report = buffer.read_non_blocking().unwrap();
        assert_eq!(report.frames, 4);
        assert!(buffer.is_ready());
        buffer.take_ready();

        buffer.read_non_blocking().unwrap();
        assert_eq!(buffer.fill_count(), 2);
    }

    #[test]
    fn test_overrun_resets_and_retries() {
        let stream = ScriptedStream::new(vec![
            Step::Data(ramp(0, 2)),
            Step::Overrun,
            Step::Data(ramp(2, 2)),
        ]);
        let mut buffer = CaptureBuffer::new(stream, 8);

        let report = buffer.read_non_blocking().unwrap();
        assert_eq!(report.overruns, 1);
        assert_eq!(report.frames, 4);
        assert_eq!(buffer.fill_count(), 4);
        assert_eq!(buffer.stream.resets, 1);
    }

    #[test]
    fn test_persistent_overrun_is_capped() {
        let steps = (0..20).map(|_| Step::Overrun).collect();
        let mut buffer = CaptureBuffer::new(ScriptedStream::new(steps), 8);

        let report = buffer.read_non_blocking().unwrap();
        assert_eq!(report.overruns as usize, MAX_READ_ATTEMPTS);
        assert_eq!(buffer.stream.steps.len(), 20 - MAX_READ_ATTEMPTS);
    }

    #[test]
    fn test_would_block_makes_no_progress() {
        let mut buffer = CaptureBuffer::new(ScriptedStream::new(vec![Step::WouldBlock]), 8);
        let report = buffer.read_non_blocking().unwrap();
        assert_eq!(report, ReadReport::default());
        assert_eq!(buffer.fill_count(), 0);
    }

    #[test]
    fn test_resume_resets_before_next_read() {
        let stream = ScriptedStream::new(vec![
            Step::Data(ramp(0, 3)),
            Step::WouldBlock,
            Step::Data(ramp(50, 2)),
        ]);
        let mut buffer = CaptureBuffer::new(stream, 8);
        buffer.read_non_blocking().unwrap();
        assert_eq!(buffer.fill_count(), 3);

        buffer.request_reset();
        assert_eq!(buffer.stream.resets, 0);

        buffer.read_non_blocking().unwrap();
        assert_eq!(buffer.stream.resets, 1);
        assert_eq!(buffer.fill_count(), 2);
        assert_eq!(&buffer.raw[..2], &[50, 51]);
    }

    #[test]
    fn test_stream_failure_propagates() {
        let mut buffer = CaptureBuffer::new(ScriptedStream::new(vec![Step::Fail]), 8);
        assert!(matches!(
            buffer.read_non_blocking(),
            Err(CaptureError::StreamError(_))
        ));
    }

    #[test]
    fn test_close_releases_stream() {
        let mut buffer = CaptureBuffer::new(ScriptedStream::default(), 8);
        buffer.close().unwrap();
        assert!(buffer.stream.closed);
    }
}
