// Sink contract. A sink is a state machine plus a
// render path: `process_msg` handles control-thread requests over the
// asyncmsgq, `process_render` pulls from its inputs and mixes, and
// `process_rewind` walks a pending rewind request back against the
// virtual playback clock, propagating it to every connected input.

use crate::asyncmsgq::{Message, MSG_SHUTDOWN};
use crate::clock;
use crate::kernels;
use crate::kernels::mix::MixInfo;
use crate::memory::{Memblock, Memchunk};
use crate::sample::{CVolume, SampleSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Idle,
    Running,
    Suspended,
    /// Terminal: the sink has been detached from its owning module and
    /// will not process any further messages.
    Unlinked,
}

impl SinkState {
    /// `Unlinked` is terminal: once a sink reaches it, no further state
    /// transition is accepted. Every other transition, including
    /// self-transitions, is allowed.
    fn can_transition_to(self, _target: SinkState) -> bool {
        !matches!(self, SinkState::Unlinked)
    }
}

pub const MSG_SET_STATE: i32 = 0;
pub const MSG_GET_LATENCY: i32 = 1;
pub const MSG_REWIND: i32 = 2;
pub const MSG_UPDATE_REQUESTED_LATENCY: i32 = 3;

/// An upstream feed into a sink's mix. Mirrors the peek/drop contract
/// real sink inputs use to hand over rendered audio without copying it
/// until mix time.
pub trait SinkInput: Send {
    /// Up to `length` bytes of the next audio to mix, or `None` if this
    /// input has nothing ready (treated as silence for this render).
    fn peek(&mut self, length: usize) -> Option<Memchunk>;
    /// Consume `length` bytes previously returned by `peek`.
    fn drop_samples(&mut self, length: usize);
    /// Walk the input's own read position back by `nbytes`, so it
    /// re-offers audio already consumed. Called with the amount the
    /// sink actually rewound, never more than the input can satisfy.
    fn rewind(&mut self, nbytes: usize);
    fn volume(&self) -> CVolume;
}

pub struct Sink {
    pub spec: SampleSpec,
    state: SinkState,
    master_volume: CVolume,
    requested_latency_usec: u64,
    max_rewind_bytes: usize,
    /// Wall-clock deadline (in `clock::now_usec` units) up to which
    /// audio has already been rendered and handed off.
    virtual_timestamp: u64,
    /// Bytes requested by the most recent unconsumed `MSG_REWIND`.
    rewind_nbytes: usize,
}

impl Sink {
    pub fn new(spec: SampleSpec, requested_latency_usec: u64, max_rewind_bytes: usize) -> Self {
        Self {
            spec,
            state: SinkState::Idle,
            master_volume: CVolume::norm(spec.channels),
            requested_latency_usec,
            max_rewind_bytes,
            virtual_timestamp: clock::now_usec(),
            rewind_nbytes: 0,
        }
    }

    pub fn state(&self) -> SinkState {
        self.state
    }

    pub fn requested_latency_usec(&self) -> u64 {
        self.requested_latency_usec
    }

    pub fn virtual_timestamp(&self) -> u64 {
        self.virtual_timestamp
    }

    /// Bytes requested by a rewind that hasn't been applied yet. The
    /// device thread checks this before deciding whether to call
    /// `process_rewind`.
    pub fn rewind_nbytes(&self) -> usize {
        self.rewind_nbytes
    }

    /// Mix `length` bytes from every input into a freshly allocated
    /// block and advance the virtual playback clock by the same
    /// duration. Inputs that run dry before `length` bytes are reached
    /// contribute silence for the remainder, matching `pa_mix`'s own
    /// short-stream handling: the return length is driven by `length`,
    /// not by the shortest input.
    pub fn process_render(&mut self, inputs: &mut [Box<dyn SinkInput>], length: usize) -> Memblock {
        let mut streams = Vec::with_capacity(inputs.len());
        for input in inputs.iter_mut() {
            if let Some(chunk) = input.peek(length) {
                streams.push(MixInfo {
                    chunk,
                    volume: input.volume(),
                });
            }
        }

        let mut block = Memblock::new(length);
        let written = kernels::mix(&streams, block.make_mut(), &self.spec, &self.master_volume);
        if written < length {
            kernels::silence::silence_memory(&mut block.make_mut()[written..], &self.spec);
        }

        for input in inputs.iter_mut() {
            input.drop_samples(length);
        }

        self.virtual_timestamp += self.spec.bytes_to_usec(length);
        block
    }

    /// Apply the pending rewind request, if any and if there's buffered
    /// audio to rewind into: rewinds `min(R, bytes_in_buffer)` where
    /// `bytes_in_buffer` is however far `virtual_timestamp` is still
    /// ahead of `now`, propagates that amount to every connected input,
    /// and pulls `virtual_timestamp` back by the rewound duration.
    pub fn process_rewind(&mut self, now: u64, inputs: &mut [Box<dyn SinkInput>]) {
        let requested = self.rewind_nbytes;
        self.rewind_nbytes = 0;
        if requested == 0 || self.virtual_timestamp <= now {
            return;
        }

        let bytes_in_buffer = self.spec.usec_to_bytes(self.virtual_timestamp - now);
        let actual = requested.min(bytes_in_buffer);
        if actual == 0 {
            return;
        }

        for input in inputs.iter_mut() {
            input.rewind(actual);
        }
        self.virtual_timestamp -= self.spec.bytes_to_usec(actual);
    }

    pub fn update_requested_latency(&mut self, usec: u64) {
        self.requested_latency_usec = usec;
    }

    /// Handle one message from the control asyncmsgq. Returns the reply
    /// value `done()` should be called with.
    pub fn process_msg(&mut self, msg: &Message) -> i64 {
        match msg.command {
            MSG_SHUTDOWN => {
                self.state = SinkState::Unlinked;
                0
            }
            MSG_SET_STATE => {
                let target = decode_state(msg.offset);
                assert!(
                    self.state.can_transition_to(target),
                    "invalid sink state transition {:?} -> {:?}",
                    self.state,
                    target
                );
                self.state = target;
                if target == SinkState::Running {
                    self.virtual_timestamp = clock::now_usec();
                }
                0
            }
            MSG_GET_LATENCY => {
                let now = clock::now_usec();
                self.virtual_timestamp.saturating_sub(now) as i64
            }
            MSG_REWIND => {
                let nbytes = msg.offset as usize;
                assert!(
                    nbytes <= self.max_rewind_bytes,
                    "rewind request of {nbytes} bytes exceeds max_rewind_bytes {}",
                    self.max_rewind_bytes
                );
                self.rewind_nbytes = nbytes;
                0
            }
            MSG_UPDATE_REQUESTED_LATENCY => {
                self.update_requested_latency(msg.offset as u64);
                0
            }
            other => panic!("sink received unknown message command {other}"),
        }
    }
}

fn decode_state(offset: i64) -> SinkState {
    match offset {
        0 => SinkState::Idle,
        1 => SinkState::Running,
        2 => SinkState::Suspended,
        3 => SinkState::Unlinked,
        other => panic!("invalid encoded sink state {other}"),
    }
}

pub fn encode_state(state: SinkState) -> i64 {
    match state {
        SinkState::Idle => 0,
        SinkState::Running => 1,
        SinkState::Suspended => 2,
        SinkState::Unlinked => 3,
    }
}

/// A `SinkInput` that always has `length` bytes of silence ready.
/// Used by the null sink demo and by tests that just need the render
/// path exercised without a real upstream stream.
pub struct SilenceInput {
    spec: SampleSpec,
    volume: CVolume,
}

impl SilenceInput {
    pub fn new(spec: SampleSpec) -> Self {
        let volume = CVolume::norm(spec.channels);
        Self { spec, volume }
    }
}

impl SinkInput for SilenceInput {
    fn peek(&mut self, length: usize) -> Option<Memchunk> {
        let mut block = Memblock::new(length);
        kernels::silence::silence_block(&mut block, &self.spec);
        Some(Memchunk::whole(block))
    }

    fn drop_samples(&mut self, _length: usize) {}

    /// Silence has no read position to walk back.
    fn rewind(&mut self, _nbytes: usize) {}

    fn volume(&self) -> CVolume {
        self.volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleFormat;

    fn spec() -> SampleSpec {
        SampleSpec::new(SampleFormat::S16Ne, 2, 44100)
    }

    /// A `SinkInput` that counts how many bytes it's asked to rewind,
    /// for asserting `process_rewind` actually propagates to inputs.
    struct RewindSpy {
        spec: SampleSpec,
        rewound: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl SinkInput for RewindSpy {
        fn peek(&mut self, length: usize) -> Option<Memchunk> {
            let mut block = Memblock::new(length);
            kernels::silence::silence_block(&mut block, &self.spec);
            Some(Memchunk::whole(block))
        }
        fn drop_samples(&mut self, _length: usize) {}
        fn rewind(&mut self, nbytes: usize) {
            self.rewound.fetch_add(nbytes, std::sync::atomic::Ordering::SeqCst);
        }
        fn volume(&self) -> CVolume {
            CVolume::norm(self.spec.channels)
        }
    }

    #[test]
    fn render_from_silence_input_produces_full_length_silence() {
        let mut sink = Sink::new(spec(), 20_000, 4096);
        let mut inputs: Vec<Box<dyn SinkInput>> = vec![Box::new(SilenceInput::new(spec()))];
        let block = sink.process_render(&mut inputs, 64);
        assert_eq!(block.len(), 64);
        assert!(block.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn render_with_no_inputs_is_all_silence() {
        let mut sink = Sink::new(spec(), 20_000, 4096);
        let mut inputs: Vec<Box<dyn SinkInput>> = Vec::new();
        let block = sink.process_render(&mut inputs, 32);
        assert_eq!(block.len(), 32);
        assert!(block.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn render_advances_virtual_timestamp_by_the_chunk_duration() {
        let mut sink = Sink::new(spec(), 20_000, 4096);
        let mut inputs: Vec<Box<dyn SinkInput>> = vec![Box::new(SilenceInput::new(spec()))];
        let before = sink.virtual_timestamp();
        let length = spec().usec_to_bytes(10_000);
        sink.process_render(&mut inputs, length);
        assert_eq!(sink.virtual_timestamp() - before, 10_000);
    }

    #[test]
    fn set_state_message_transitions_and_acks() {
        let mut sink = Sink::new(spec(), 20_000, 4096);
        let msg = Message {
            command: MSG_SET_STATE,
            offset: encode_state(SinkState::Running),
            data: None,
        };
        sink.process_msg(&msg);
        assert_eq!(sink.state(), SinkState::Running);
    }

    #[test]
    fn set_state_to_running_resets_virtual_timestamp_to_now() {
        let mut sink = Sink::new(spec(), 20_000, 4096);
        let mut inputs: Vec<Box<dyn SinkInput>> = vec![Box::new(SilenceInput::new(spec()))];
        sink.process_render(&mut inputs, spec().usec_to_bytes(50_000));
        let before_reset = sink.virtual_timestamp();

        sink.process_msg(&Message {
            command: MSG_SET_STATE,
            offset: encode_state(SinkState::Running),
            data: None,
        });

        assert!(sink.virtual_timestamp() < before_reset);
    }

    #[test]
    #[should_panic]
    fn set_state_rejects_transitions_out_of_unlinked() {
        let mut sink = Sink::new(spec(), 20_000, 4096);
        sink.process_msg(&Message {
            command: MSG_SET_STATE,
            offset: encode_state(SinkState::Unlinked),
            data: None,
        });
        sink.process_msg(&Message {
            command: MSG_SET_STATE,
            offset: encode_state(SinkState::Running),
            data: None,
        });
    }

    #[test]
    fn get_latency_is_zero_immediately_after_transitioning_to_running() {
        let mut sink = Sink::new(spec(), 15_000, 4096);
        sink.process_msg(&Message {
            command: MSG_SET_STATE,
            offset: encode_state(SinkState::Running),
            data: None,
        });
        let reply = sink.process_msg(&Message {
            command: MSG_GET_LATENCY,
            offset: 0,
            data: None,
        });
        assert!(reply >= 0);
        assert!(reply < 10_000);
    }

    #[test]
    fn get_latency_reports_buffered_duration_after_rendering_ahead() {
        let mut sink = Sink::new(spec(), 15_000, 4096);
        sink.process_msg(&Message {
            command: MSG_SET_STATE,
            offset: encode_state(SinkState::Running),
            data: None,
        });
        let mut inputs: Vec<Box<dyn SinkInput>> = vec![Box::new(SilenceInput::new(spec()))];
        sink.process_render(&mut inputs, spec().usec_to_bytes(10_000));

        let reply = sink.process_msg(&Message {
            command: MSG_GET_LATENCY,
            offset: 0,
            data: None,
        });
        assert!(reply > 0);
    }

    #[test]
    fn update_requested_latency_message_updates_field() {
        let mut sink = Sink::new(spec(), 15_000, 4096);
        sink.process_msg(&Message {
            command: MSG_UPDATE_REQUESTED_LATENCY,
            offset: 30_000,
            data: None,
        });
        assert_eq!(sink.requested_latency_usec(), 30_000);
    }

    #[test]
    #[should_panic]
    fn rewind_request_beyond_max_rewind_panics() {
        let mut sink = Sink::new(spec(), 20_000, 128);
        sink.process_msg(&Message {
            command: MSG_REWIND,
            offset: 256,
            data: None,
        });
    }

    #[test]
    fn process_rewind_is_a_no_op_without_a_pending_request() {
        let mut sink = Sink::new(spec(), 20_000, 4096);
        let rewound = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut inputs: Vec<Box<dyn SinkInput>> = vec![Box::new(RewindSpy {
            spec: spec(),
            rewound: rewound.clone(),
        })];
        let vt_before = sink.virtual_timestamp();
        sink.process_rewind(clock::now_usec(), &mut inputs);
        assert_eq!(sink.virtual_timestamp(), vt_before);
        assert_eq!(rewound.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn process_rewind_clamps_to_buffered_amount_and_propagates_to_inputs() {
        let mut sink = Sink::new(spec(), 20_000, 4096);
        sink.process_msg(&Message {
            command: MSG_SET_STATE,
            offset: encode_state(SinkState::Running),
            data: None,
        });
        let now = sink.virtual_timestamp();

        let rewound = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut inputs: Vec<Box<dyn SinkInput>> = vec![Box::new(RewindSpy {
            spec: spec(),
            rewound: rewound.clone(),
        })];
        // Render 20ms ahead of `now`, then ask to rewind more than that
        // (but still within max_rewind_bytes) — the request should clamp
        // to what's actually buffered.
        let rendered_bytes = spec().usec_to_bytes(20_000);
        sink.process_render(&mut inputs, rendered_bytes);
        sink.process_msg(&Message {
            command: MSG_REWIND,
            offset: 4096,
            data: None,
        });

        let vt_before = sink.virtual_timestamp();
        sink.process_rewind(now, &mut inputs);

        assert_eq!(rewound.load(std::sync::atomic::Ordering::SeqCst), rendered_bytes);
        assert!(sink.virtual_timestamp() < vt_before);
        assert!(sink.virtual_timestamp() >= now);
    }

    #[test]
    fn shutdown_message_unlinks_the_sink() {
        let mut sink = Sink::new(spec(), 20_000, 4096);
        sink.process_msg(&Message {
            command: MSG_SHUTDOWN,
            offset: 0,
            data: None,
        });
        assert_eq!(sink.state(), SinkState::Unlinked);
    }
}
