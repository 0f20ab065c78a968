//! Chunker (spec §4.4, first half of C4): accumulates consumed PCM bytes
//! into time-sized, sequence-numbered chunks.
//!
//! A chunk is emitted when (a) its size reaches the target, (b) a segment
//! boundary from the VAD gate arrives and `flush_on_boundary` is set, or
//! (c) the session is stopping (final partial chunk, `is_final = true`).

const BYTES_PER_SAMPLE: u64 = 2;

#[derive(Debug, Clone)]
pub struct Chunk {
    pub sequence_no: u64,
    pub session_id: String,
    pub captured_at_unix_ms: u64,
    pub payload: Vec<u8>,
    pub duration_ms: u64,
    pub is_final: bool,
}

pub struct Chunker {
    session_id: String,
    sample_rate: u32,
    target_bytes: usize,
    flush_on_boundary: bool,
    buf: Vec<u8>,
    buf_started_at_ms: Option<u64>,
    next_sequence_no: u64,
    finished: bool,
}

impl Chunker {
    pub fn new(
        session_id: String,
        sample_rate: u32,
        target_bytes: usize,
        flush_on_boundary: bool,
    ) -> Self {
        Self {
            session_id,
            sample_rate,
            target_bytes: target_bytes.max(1),
            flush_on_boundary,
            buf: Vec::with_capacity(target_bytes),
            buf_started_at_ms: None,
            next_sequence_no: 1,
            finished: false,
        }
    }

    fn duration_ms(&self, payload_len: usize) -> u64 {
        let samples = payload_len as u64 / BYTES_PER_SAMPLE;
        samples * 1000 / self.sample_rate.max(1) as u64
    }

    fn seal(&mut self, payload: Vec<u8>, captured_at: u64, is_final: bool) -> Chunk {
        let duration_ms = self.duration_ms(payload.len());
        let chunk = Chunk {
            sequence_no: self.next_sequence_no,
            session_id: self.session_id.clone(),
            captured_at_unix_ms: captured_at,
            payload,
            duration_ms,
            is_final,
        };
        self.next_sequence_no += 1;
        chunk
    }

    /// Feeds newly-gated bytes in. `now_ms` timestamps the chunk that
    /// buffering began at, not the call itself.
    pub fn push(&mut self, bytes: &[u8], now_ms: u64) -> Vec<Chunk> {
        if self.finished || bytes.is_empty() {
            return Vec::new();
        }
        if self.buf.is_empty() {
            self.buf_started_at_ms = Some(now_ms);
        }
        self.buf.extend_from_slice(bytes);

        let mut out = Vec::new();
        while self.buf.len() >= self.target_bytes {
            let payload: Vec<u8> = self.buf.drain(..self.target_bytes).collect();
            let captured_at = self.buf_started_at_ms.unwrap_or(now_ms);
            out.push(self.seal(payload, captured_at, false));
            self.buf_started_at_ms = if self.buf.is_empty() { None } else { Some(now_ms) };
        }
        out
    }

    /// Flushes the partial chunk on a VAD segment boundary, if enabled
    /// and there is anything buffered.
    pub fn on_segment_boundary(&mut self, now_ms: u64) -> Option<Chunk> {
        if !self.flush_on_boundary || self.finished || self.buf.is_empty() {
            return None;
        }
        let payload = std::mem::take(&mut self.buf);
        let captured_at = self.buf_started_at_ms.take().unwrap_or(now_ms);
        Some(self.seal(payload, captured_at, false))
    }

    /// Emits the final chunk (possibly empty) and marks the chunker done.
    /// Idempotent: calling again after finishing returns `None`.
    pub fn finish(&mut self, now_ms: u64) -> Option<Chunk> {
        if self.finished {
            return None;
        }
        self.finished = true;
        let payload = std::mem::take(&mut self.buf);
        let captured_at = self.buf_started_at_ms.take().unwrap_or(now_ms);
        Some(self.seal(payload, captured_at, true))
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_chunker(target_bytes: usize) -> Chunker {
        Chunker::new("sess-1".to_string(), 16_000, target_bytes, false)
    }

    #[test]
    fn emits_chunk_once_target_reached() {
        let mut chunker = new_chunker(10);
        let chunks = chunker.push(&[0u8; 10], 1000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sequence_no, 1);
        assert!(!chunks[0].is_final);
    }

    #[test]
    fn sequence_numbers_are_monotone_and_contiguous() {
        let mut chunker = new_chunker(4);
        let mut seqs = Vec::new();
        for chunk in chunker.push(&[0u8; 16], 0) {
            seqs.push(chunk.sequence_no);
        }
        assert_eq!(seqs, vec![1, 2, 3, 4]);
    }

    #[test]
    fn finish_emits_final_chunk_even_when_empty() {
        let mut chunker = new_chunker(10);
        let chunk = chunker.finish(5000).unwrap();
        assert!(chunk.is_final);
        assert!(chunk.payload.is_empty());
        assert!(chunker.finish(5001).is_none());
    }

    #[test]
    fn finish_flushes_partial_buffer_as_final() {
        let mut chunker = new_chunker(100);
        chunker.push(&[1u8, 2, 3, 4], 10);
        let chunk = chunker.finish(20).unwrap();
        assert!(chunk.is_final);
        assert_eq!(chunk.payload, vec![1, 2, 3, 4]);
    }

    #[test]
    fn segment_boundary_flush_only_when_enabled() {
        let mut chunker = Chunker::new("sess".to_string(), 16_000, 100, true);
        chunker.push(&[1u8, 2, 3, 4], 0);
        let flushed = chunker.on_segment_boundary(50);
        assert!(flushed.is_some());
        assert!(!flushed.unwrap().is_final);
    }

    #[test]
    fn duration_matches_spec_example() {
        // 2000ms chunk at 16kHz mono s16 = 64000 bytes.
        let mut chunker = new_chunker(64_000);
        let chunk = chunker.push(&vec![0u8; 64_000], 0).pop().unwrap();
        assert_eq!(chunk.duration_ms, 2000);
    }
}
