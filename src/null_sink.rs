// Clocked null sink. The illustration device: a sink with
// nowhere to actually write audio, whose entire purpose is pacing
// itself against a virtual playback clock the way a real device thread
// paces itself against hardware. Grounded in `module-null-sink.c`'s
// `thread_func`: render ahead by one chunk, then sleep until either a
// control message arrives or it's time for the next chunk.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::asyncmsgq::{AsyncMsgq, Message, MSG_SHUTDOWN};
use crate::clock;
use crate::error::DeviceError;
use crate::modargs::NullSinkArgs;
use crate::rtpoll::{Rtpoll, PRIORITY_NORMAL};
use crate::sample::SampleSpec;
use crate::sink::{Sink, SinkInput, SinkState, SilenceInput};

pub struct NullSink {
    queue: Arc<AsyncMsgq>,
    handle: Option<JoinHandle<()>>,
}

impl NullSink {
    /// Spawn the device thread. Mirrors `pa__init`: validate arguments,
    /// build the sink, hand back a handle the host can talk to and
    /// later tear down.
    pub fn open(spec: SampleSpec, args: &NullSinkArgs) -> Result<Self, DeviceError> {
        let queue = Arc::new(AsyncMsgq::new().map_err(|e| DeviceError::BadArgument {
            key: "queue".to_string(),
            reason: e.to_string(),
        })?);
        let requested_latency_usec = args.latency_msec * 1_000;
        let max_rewind_bytes = spec.usec_to_bytes(requested_latency_usec);

        let thread_queue = queue.clone();
        let handle = std::thread::Builder::new()
            .name(format!("nullsink-{}", args.sink_name))
            .spawn(move || {
                device_thread(spec, thread_queue, requested_latency_usec, max_rewind_bytes)
            })
            .map_err(|e| DeviceError::ThreadJoin(e.to_string()))?;

        Ok(Self {
            queue,
            handle: Some(handle),
        })
    }

    pub fn queue(&self) -> &Arc<AsyncMsgq> {
        &self.queue
    }

    pub fn set_state(&self, state: SinkState) {
        self.queue
            .send(crate::sink::MSG_SET_STATE, crate::sink::encode_state(state), None);
    }

    pub fn latency_usec(&self) -> u64 {
        self.queue.send(crate::sink::MSG_GET_LATENCY, 0, None) as u64
    }
}

impl Drop for NullSink {
    /// Mirrors `pa__done`: tell the device thread to shut down and wait
    /// for it to actually exit before this struct disappears.
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.queue.post(MSG_SHUTDOWN, 0, None);
            let _ = handle.join();
        }
    }
}

fn device_thread(
    spec: SampleSpec,
    queue: Arc<AsyncMsgq>,
    requested_latency_usec: u64,
    max_rewind_bytes: usize,
) {
    let sink = Arc::new(Mutex::new(Sink::new(spec, requested_latency_usec, max_rewind_bytes)));
    let mut inputs: Vec<Box<dyn SinkInput>> = vec![Box::new(SilenceInput::new(spec))];
    let shutdown = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let mut poll = Rtpoll::new();
    let dispatch_sink = sink.clone();
    let dispatch_queue = queue.clone();
    let dispatch_shutdown = shutdown.clone();
    poll.new_item_for_asyncmsgq_read(PRIORITY_NORMAL, queue.clone(), move |msg| {
        let is_shutdown = msg.command == MSG_SHUTDOWN;
        let reply = dispatch_sink.lock().unwrap().process_msg(&msg);
        dispatch_queue.done(reply as i32);
        if is_shutdown {
            dispatch_shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
        }
        1
    });

    // Start running immediately; a real device would wait for an
    // explicit SET_STATE(Running) from its owner, but the standalone
    // demo binary has no owner to send one.
    sink.lock().unwrap().process_msg(&Message {
        command: crate::sink::MSG_SET_STATE,
        offset: crate::sink::encode_state(SinkState::Running),
        data: None,
    });

    loop {
        {
            let mut s = sink.lock().unwrap();
            if s.state() == SinkState::Running {
                let now = clock::now_usec();
                if s.rewind_nbytes() > 0 {
                    s.process_rewind(now, &mut inputs);
                }
                if s.virtual_timestamp() <= now {
                    let length = spec.usec_to_bytes(requested_latency_usec);
                    let _rendered = s.process_render(&mut inputs, length);
                }
                poll.set_timer(Some(s.virtual_timestamp()));
            } else {
                poll.disable_timer();
            }
        }

        if poll.run().is_err() {
            log::error!("rtpoll run failed in null sink device thread, shutting down");
            break;
        }

        if shutdown.load(std::sync::atomic::Ordering::SeqCst) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleFormat;

    #[test]
    fn open_and_drop_shuts_the_thread_down_cleanly() {
        let spec = SampleSpec::new(SampleFormat::S16Ne, 2, 44100);
        let args = NullSinkArgs::default();
        let sink = NullSink::open(spec, &args).unwrap();
        drop(sink);
    }

    #[test]
    fn get_latency_stays_within_the_configured_rendered_window() {
        let spec = SampleSpec::new(SampleFormat::S16Ne, 2, 44100);
        let mut args = NullSinkArgs::default();
        args.latency_msec = 30;
        let sink = NullSink::open(spec, &args).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let latency = sink.latency_usec();
        assert!(latency <= 30_000, "latency {latency} exceeds the configured window");
    }

    #[test]
    fn set_state_roundtrips_through_the_device_thread() {
        let spec = SampleSpec::new(SampleFormat::S16Ne, 1, 8000);
        let sink = NullSink::open(spec, &NullSinkArgs::default()).unwrap();
        sink.set_state(SinkState::Suspended);
        sink.set_state(SinkState::Running);
    }
}
