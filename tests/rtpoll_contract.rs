// Cross-module integration: rtpoll driving a sink's control queue and
// render path without spawning a real device thread, exercising the
// same wiring `null_sink::device_thread` uses internally.

use std::sync::{Arc, Mutex};
use std::collections::VecDeque;

use sinkcore::asyncmsgq::{AsyncMsgq, Message, MSG_SHUTDOWN};
use sinkcore::rtpoll::{Rtpoll, PRIORITY_NORMAL};
use sinkcore::sample::{SampleFormat, SampleSpec};
use sinkcore::sink::{encode_state, SilenceInput, Sink, SinkInput, SinkState, MSG_SET_STATE};

#[test]
fn queued_messages_are_drained_one_per_rtpoll_iteration() {
    let spec = SampleSpec::new(SampleFormat::S16Ne, 1, 8000);
    let mut sink = Sink::new(spec, 20_000, 4096);
    let queue = Arc::new(AsyncMsgq::new().unwrap());

    queue.post(MSG_SET_STATE, encode_state(SinkState::Running), None);
    queue.post(MSG_SET_STATE, encode_state(SinkState::Suspended), None);

    let mut poll = Rtpoll::new();
    let pending: Arc<Mutex<VecDeque<Message>>> = Arc::new(Mutex::new(VecDeque::new()));
    let p = pending.clone();
    poll.new_item_for_asyncmsgq_read(PRIORITY_NORMAL, queue.clone(), move |msg| {
        p.lock().unwrap().push_back(msg);
        1
    });

    // Each run() dispatches exactly one queued message; draining both
    // requires two iterations.
    poll.run().unwrap();
    assert_eq!(pending.lock().unwrap().len(), 1);
    poll.run().unwrap();
    assert_eq!(pending.lock().unwrap().len(), 2);

    while let Some(msg) = pending.lock().unwrap().pop_front() {
        sink.process_msg(&msg);
        queue.done(0);
    }

    assert_eq!(sink.state(), SinkState::Suspended);
}

#[test]
fn shutdown_message_is_observed_through_rtpoll() {
    let spec = SampleSpec::new(SampleFormat::S16Ne, 1, 8000);
    let mut sink = Sink::new(spec, 20_000, 4096);
    let queue = Arc::new(AsyncMsgq::new().unwrap());
    queue.post(MSG_SHUTDOWN, 0, None);

    let mut poll = Rtpoll::new();
    let pending: Arc<Mutex<VecDeque<Message>>> = Arc::new(Mutex::new(VecDeque::new()));
    let p = pending.clone();
    poll.new_item_for_asyncmsgq_read(PRIORITY_NORMAL, queue.clone(), move |msg| {
        p.lock().unwrap().push_back(msg);
        1
    });

    poll.run().unwrap();
    let msg = pending.lock().unwrap().pop_front().unwrap();
    assert_eq!(msg.command, MSG_SHUTDOWN);
    sink.process_msg(&msg);
    assert_eq!(sink.state(), SinkState::Unlinked);
}

#[test]
fn render_path_consumes_from_a_silence_input_end_to_end() {
    let spec = SampleSpec::new(SampleFormat::S16Ne, 2, 44100);
    let mut sink = Sink::new(spec, 20_000, 4096);
    let mut inputs: Vec<Box<dyn SinkInput>> = vec![Box::new(SilenceInput::new(spec))];
    let block = sink.process_render(&mut inputs, 256);
    assert_eq!(block.len(), 256);
}
